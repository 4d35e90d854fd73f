/// Outbound message queue for one connection.
///
/// Messages for a viewport are merged as they arrive so that a flush never
/// carries two messages describing the same row positions:
///
/// - a `Rowset` absorbs the still-valid rows of earlier rowsets for its
///   viewport and drops earlier updates for rows it carries
/// - an `Update` is applied to the rows of a pending rowset, or merged into a
///   pending update, for the same viewport
/// - `FilterData` merges with earlier filter data by IDX
use std::collections::HashSet;

use log::debug;

use crate::column::ColumnValue;
use crate::messages::ServerMessage;
use crate::metadata::Meta;
use crate::rowset::{RowData, RowUpdate};
use crate::table::Row;

/// Responses to direct requests, flushed on the fast interval.
pub const PRIORITY_HIGH: u8 = 1;
/// Deltas from table changes.
pub const PRIORITY_NORMAL: u8 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub priority: u8,
    pub message: ServerMessage,
}

#[derive(Debug, Default)]
pub struct MessageQueue {
    queue: Vec<QueuedMessage>,
}

fn row_idx(row: &[ColumnValue], idx_slot: usize) -> Option<usize> {
    row.get(idx_slot)?.as_i64().map(|i| i as usize)
}

/// IDX bounds `[low, high)` a snapshot speaks for: its buffered window,
/// clipped to the rows that exist.
fn snapshot_bounds(data: &RowData) -> (usize, usize) {
    let window = data.range.full();
    let low = window.lo + data.offset;
    let high = (window.hi + data.offset).min(data.size + data.offset);
    (low, high)
}

impl MessageQueue {
    pub fn new() -> Self {
        MessageQueue::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn messages(&self) -> impl Iterator<Item = &ServerMessage> {
        self.queue.iter().map(|q| &q.message)
    }

    /// Queue a message. `meta` is the row layout of the viewport; rowsets,
    /// updates and filter data without it are queued unmerged.
    pub fn push(&mut self, priority: u8, message: ServerMessage, meta: Option<&Meta>) {
        let message = match (message, meta) {
            (ServerMessage::Rowset { viewport, mut data }, Some(meta)) => {
                if data.rows.is_empty() && data.size > 0 {
                    return;
                }
                self.merge_rowset(&viewport, &mut data, meta.idx);
                ServerMessage::Rowset { viewport, data }
            }
            (ServerMessage::Update { viewport, updates }, Some(meta)) => {
                let updates = self.merge_updates(&viewport, updates, meta.idx);
                if updates.is_empty() {
                    return;
                }
                ServerMessage::Update { viewport, updates }
            }
            (ServerMessage::FilterData { viewport, mut data }, Some(meta)) => {
                self.merge_filter_data(&viewport, &mut data, meta.idx);
                ServerMessage::FilterData { viewport, data }
            }
            (message, _) => message,
        };
        self.queue.push(QueuedMessage { priority, message });
    }

    fn merge_rowset(&mut self, viewport: &str, data: &mut RowData, idx_slot: usize) {
        let (low, high) = snapshot_bounds(data);
        let fresh: HashSet<usize> = data.rows.iter().filter_map(|r| row_idx(r, idx_slot)).collect();
        let mut kept: Vec<Row> = Vec::new();
        let before = self.queue.len();

        self.queue.retain_mut(|queued| match &mut queued.message {
            ServerMessage::Rowset { viewport: vp, data: old } if vp == viewport => {
                kept.extend(old.rows.drain(..).filter(|r| {
                    row_idx(r, idx_slot).is_some_and(|i| i >= low && i < high && !fresh.contains(&i))
                }));
                false
            }
            ServerMessage::Update { viewport: vp, updates } if vp == viewport => {
                updates.retain(|u| u.idx >= low && u.idx < high && !fresh.contains(&u.idx));
                !updates.is_empty()
            }
            ServerMessage::Size { viewport: vp, .. } if vp == viewport => false,
            _ => true,
        });

        if before != self.queue.len() {
            debug!("{}: rowset purged {} queued messages", viewport, before - self.queue.len());
        }
        if !kept.is_empty() {
            data.rows.extend(kept);
            data.rows.sort_by_key(|r| row_idx(r, idx_slot));
        }
    }

    /// Fold updates into the latest pending rowset or update of the
    /// viewport. Returns the updates that still need a message of their own.
    fn merge_updates(&mut self, viewport: &str, mut updates: Vec<RowUpdate>, idx_slot: usize) -> Vec<RowUpdate> {
        let latest = self
            .queue
            .iter_mut()
            .rev()
            .find(|q| q.message.viewport() == Some(viewport));
        match latest.map(|q| &mut q.message) {
            Some(ServerMessage::Rowset { data, .. }) => {
                let (low, high) = snapshot_bounds(data);
                let rows = &mut data.rows;
                updates.retain(|u| {
                    if let Some(row) = rows.iter_mut().find(|r| row_idx(r, idx_slot) == Some(u.idx)) {
                        for (column, value) in &u.changes {
                            if let Some(cell) = row.get_mut(*column) {
                                *cell = value.clone();
                            }
                        }
                        return false;
                    }
                    u.idx >= low && u.idx < high
                });
                updates
            }
            Some(ServerMessage::Update { updates: pending, .. }) => {
                for update in updates {
                    match pending.iter_mut().find(|p| p.idx == update.idx) {
                        Some(existing) => existing.merge(&update),
                        None => pending.push(update),
                    }
                }
                Vec::new()
            }
            _ => updates,
        }
    }

    fn merge_filter_data(&mut self, viewport: &str, data: &mut RowData, idx_slot: usize) {
        let (low, high) = snapshot_bounds(data);
        let fresh: HashSet<usize> = data.rows.iter().filter_map(|r| row_idx(r, idx_slot)).collect();
        let mut kept: Vec<Row> = Vec::new();
        self.queue.retain_mut(|queued| match &mut queued.message {
            ServerMessage::FilterData { viewport: vp, data: old } if vp == viewport => {
                kept.extend(old.rows.drain(..).filter(|r| {
                    row_idx(r, idx_slot).is_some_and(|i| i >= low && i < high && !fresh.contains(&i))
                }));
                false
            }
            _ => true,
        });
        if !kept.is_empty() {
            data.rows.extend(kept);
            data.rows.sort_by_key(|r| row_idx(r, idx_slot));
        }
    }

    /// Drop everything queued for a viewport.
    pub fn purge_viewport(&mut self, viewport: &str) {
        self.queue.retain(|q| q.message.viewport() != Some(viewport));
    }

    /// Remove and return the messages of one priority, in queue order.
    pub fn extract(&mut self, priority: u8) -> Vec<ServerMessage> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.queue)
            .into_iter()
            .partition(|q| q.priority == priority);
        self.queue = rest;
        taken.into_iter().map(|q| q.message).collect()
    }

    /// Remove and return every message, in queue order.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        std::mem::take(&mut self.queue).into_iter().map(|q| q.message).collect()
    }
}

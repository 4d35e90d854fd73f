/// One client's viewport on one table.
///
/// A subscription owns its `DataView` and turns view requests and view
/// deltas into outbound messages on the connection's queue. Responses to
/// requests go out at `PRIORITY_HIGH`; deltas collected from table changes at
/// `PRIORITY_NORMAL`.
use log::{debug, info};

use crate::error::Result;
use crate::messages::{ClientRequest, ServerMessage};
use crate::metadata::Meta;
use crate::queue::{MessageQueue, PRIORITY_HIGH, PRIORITY_NORMAL};
use crate::range::Range;
use crate::rowset::{filter_picker_meta, RowData, RowUpdate};
use crate::table::Table;
use crate::view::{DataType, DataView, ViewOptions, ViewUpdate};

pub struct Subscription {
    viewport: String,
    table: String,
    client_id: u64,
    view: DataView,
    filter_meta: Meta,
}

impl Subscription {
    /// Open a view and queue `Subscribed` followed by the first window.
    pub fn new(
        viewport: impl Into<String>,
        client_id: u64,
        table: &Table,
        request_id: Option<String>,
        range: Range,
        options: ViewOptions,
        queue: &mut MessageQueue,
    ) -> Result<Self> {
        let viewport = viewport.into();
        let mut view = DataView::new(table, options)?;
        let data = view.set_range(table, range, false, DataType::RowData);
        let meta = *view.meta();

        queue.push(
            PRIORITY_HIGH,
            ServerMessage::Subscribed {
                request_id,
                viewport: viewport.clone(),
                table: table.name().to_string(),
                size: view.size(),
                offset: view.offset(),
                meta,
            },
            None,
        );
        if let Some(data) = data {
            queue.push(
                PRIORITY_HIGH,
                ServerMessage::Rowset {
                    viewport: viewport.clone(),
                    data,
                },
                Some(&meta),
            );
        }
        info!(
            "client {} subscribed {} to {} ({} rows)",
            client_id,
            viewport,
            table.name(),
            view.size()
        );

        Ok(Subscription {
            viewport,
            table: table.name().to_string(),
            client_id,
            view,
            filter_meta: filter_picker_meta(),
        })
    }

    pub fn viewport(&self) -> &str {
        &self.viewport
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    pub fn view(&self) -> &DataView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut DataView {
        &mut self.view
    }

    fn push_rowset(&self, queue: &mut MessageQueue, data: RowData) {
        queue.push(
            PRIORITY_HIGH,
            ServerMessage::Rowset {
                viewport: self.viewport.clone(),
                data,
            },
            Some(self.view.meta()),
        );
    }

    fn push_filter_data(&self, queue: &mut MessageQueue, data: RowData) {
        queue.push(
            PRIORITY_HIGH,
            ServerMessage::FilterData {
                viewport: self.viewport.clone(),
                data,
            },
            Some(&self.filter_meta),
        );
    }

    /// Apply a view request and queue its response.
    pub fn invoke(&mut self, table: &Table, request: &ClientRequest, queue: &mut MessageQueue) -> Result<()> {
        match request {
            ClientRequest::SetViewRange {
                range,
                use_delta,
                data_type,
                ..
            } => {
                if let Some(data) = self.view.set_range(table, *range, *use_delta, *data_type) {
                    match data_type {
                        DataType::RowData => self.push_rowset(queue, data),
                        DataType::FilterData => self.push_filter_data(queue, data),
                    }
                }
            }
            ClientRequest::Sort { sort_criteria, .. } => {
                let data = self.view.sort(table, sort_criteria)?;
                self.push_rowset(queue, data);
            }
            ClientRequest::Filter {
                filter,
                data_type,
                incremental,
                ..
            } => {
                let (row_data, filter_data) = self.view.filter(table, filter.clone(), *data_type, *incremental)?;
                if let Some(data) = row_data {
                    self.push_rowset(queue, data);
                }
                if let Some(data) = filter_data {
                    self.push_filter_data(queue, data);
                }
            }
            ClientRequest::GroupBy { group_by, .. } => {
                let data = self.view.group_by(table, group_by.as_deref().unwrap_or(&[]))?;
                self.push_rowset(queue, data);
            }
            ClientRequest::SetGroupState { group_state, .. } => {
                if let Some(data) = self.view.set_group_state(table, group_state.clone()) {
                    self.push_rowset(queue, data);
                }
            }
            ClientRequest::Select {
                idx,
                range_select,
                keep_existing_selection,
                ..
            } => {
                let updates = self.view.select(table, *idx, *range_select, *keep_existing_selection);
                self.push_selected(queue, updates);
            }
            ClientRequest::SelectAll { .. } => {
                let updates = self.view.select_all(table, true);
                self.push_selected(queue, updates);
            }
            ClientRequest::SelectNone { .. } => {
                let updates = self.view.select_all(table, false);
                self.push_selected(queue, updates);
            }
            ClientRequest::GetFilterData {
                column,
                search_text,
                range,
                ..
            } => {
                let data = self.view.get_filter_data(table, column, search_text.as_deref(), *range)?;
                self.push_filter_data(queue, data);
            }
            other => debug!("{}: nothing to do for {:?}", self.viewport, other),
        }
        Ok(())
    }

    fn push_selected(&self, queue: &mut MessageQueue, updates: Vec<RowUpdate>) {
        if updates.is_empty() {
            return;
        }
        queue.push(
            PRIORITY_HIGH,
            ServerMessage::Selected {
                viewport: self.viewport.clone(),
                updates,
            },
            None,
        );
    }

    /// Move deltas produced by table changes into the queue.
    pub fn collect_updates(&mut self, queue: &mut MessageQueue) {
        let meta = *self.view.meta();
        for update in self.view.take_updates() {
            let viewport = self.viewport.clone();
            let message = match update {
                ViewUpdate::Update(updates) => ServerMessage::Update { viewport, updates },
                ViewUpdate::Rowset(data) => ServerMessage::Rowset { viewport, data },
                ViewUpdate::Size { size, offset } => ServerMessage::Size { viewport, size, offset },
            };
            queue.push(PRIORITY_NORMAL, message, Some(&meta));
        }
    }

    /// Release the view. Anything still queued for the viewport is the
    /// caller's to purge.
    pub fn cancel(self) {
        info!("client {} unsubscribed {} from {}", self.client_id, self.viewport, self.table);
    }
}

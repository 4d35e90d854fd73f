/// Registry of tables and live subscriptions.
///
/// `ServiceContext` is the one owner of every table and every viewport.
/// Transports hand it parsed requests together with the requesting
/// connection's `MessageQueue`; it answers into that queue. Table mutations
/// are fanned out to every subscription on the table, whose deltas wait in
/// their views until the owning connection calls `collect_updates`.
use std::collections::HashMap;

use log::{debug, info, warn};

use crate::changeset::IncrementalView;
use crate::column::ColumnValue;
use crate::error::{Error, Result};
use crate::messages::{ClientRequest, ServerMessage};
use crate::queue::{MessageQueue, PRIORITY_HIGH};
use crate::subscription::Subscription;
use crate::table::Table;

#[derive(Default)]
pub struct ServiceContext {
    tables: HashMap<String, Table>,
    subscriptions: HashMap<String, Subscription>,
    client_viewports: HashMap<u64, Vec<String>>,
    next_client_id: u64,
    next_viewport_id: u64,
}

impl ServiceContext {
    pub fn new() -> Self {
        ServiceContext::default()
    }

    /// Register a table under its own name, replacing any table of that name.
    pub fn add_table(&mut self, table: Table) {
        info!("table {} registered with {} rows", table.name(), table.len());
        self.tables.insert(table.name().to_string(), table);
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables.get(name).ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn subscription(&self, viewport: &str) -> Option<&Subscription> {
        self.subscriptions.get(viewport)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Allocate an id for a new connection and queue its `Welcome`.
    pub fn register_client(&mut self, queue: &mut MessageQueue) -> u64 {
        self.next_client_id += 1;
        let client_id = self.next_client_id;
        self.client_viewports.insert(client_id, Vec::new());
        queue.push(PRIORITY_HIGH, ServerMessage::Welcome { client_id }, None);
        debug!("client {} connected", client_id);
        client_id
    }

    /// Parse and handle one text frame. Failures are answered with an
    /// `Error` message rather than returned.
    pub fn handle_text(&mut self, client_id: u64, text: &str, queue: &mut MessageQueue) {
        let request: ClientRequest = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(e) => {
                warn!("client {}: malformed message: {}", client_id, e);
                queue.push(PRIORITY_HIGH, ServerMessage::Error { message: e.to_string() }, None);
                return;
            }
        };
        if let Err(e) = self.handle(client_id, request, queue) {
            warn!("client {}: request failed: {}", client_id, e);
            queue.push(PRIORITY_HIGH, ServerMessage::Error { message: e.to_string() }, None);
        }
    }

    pub fn handle(&mut self, client_id: u64, request: ClientRequest, queue: &mut MessageQueue) -> Result<()> {
        match request {
            ClientRequest::GetTableList { request_id } => {
                queue.push(
                    PRIORITY_HIGH,
                    ServerMessage::TableList {
                        request_id,
                        tables: self.table_names(),
                    },
                    None,
                );
            }
            ClientRequest::GetTableMeta { request_id, table } => {
                let columns = self.table(&table)?.columns().to_vec();
                queue.push(
                    PRIORITY_HIGH,
                    ServerMessage::TableMeta {
                        request_id,
                        table,
                        columns,
                    },
                    None,
                );
            }
            ClientRequest::CreateViewport {
                request_id,
                table,
                range,
                options,
            } => {
                let table = self.tables.get(&table).ok_or(Error::UnknownTable(table))?;
                let viewport = format!("vp-{}", self.next_viewport_id + 1);
                let subscription = Subscription::new(viewport.clone(), client_id, table, request_id, range, options, queue)?;
                self.next_viewport_id += 1;
                self.subscriptions.insert(viewport.clone(), subscription);
                self.client_viewports.entry(client_id).or_default().push(viewport);
            }
            ClientRequest::TerminateViewport { viewport } => {
                self.owned(client_id, &viewport)?;
                if let Some(subscription) = self.subscriptions.remove(&viewport) {
                    subscription.cancel();
                }
                if let Some(viewports) = self.client_viewports.get_mut(&client_id) {
                    viewports.retain(|vp| vp != &viewport);
                }
                queue.purge_viewport(&viewport);
                queue.push(PRIORITY_HIGH, ServerMessage::Unsubscribed { viewport }, None);
            }
            ClientRequest::InsertRow { table, row } => {
                self.insert_row(&table, row)?;
            }
            ClientRequest::UpdateRow { table, key, changes } => {
                let changes: Vec<(&str, ColumnValue)> = changes.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
                self.update_row(&table, &key, &changes)?;
            }
            request => {
                let viewport = request.viewport().unwrap_or_default().to_string();
                self.owned(client_id, &viewport)?;
                let subscription = self
                    .subscriptions
                    .get_mut(&viewport)
                    .ok_or_else(|| Error::UnknownViewport(viewport.clone()))?;
                let table = self
                    .tables
                    .get(subscription.table_name())
                    .ok_or_else(|| Error::UnknownTable(subscription.table_name().to_string()))?;
                subscription.invoke(table, &request, queue)?;
            }
        }
        Ok(())
    }

    /// Viewports are only addressable by the client that opened them.
    fn owned(&self, client_id: u64, viewport: &str) -> Result<()> {
        match self.subscriptions.get(viewport) {
            Some(subscription) if subscription.client_id() == client_id => Ok(()),
            _ => Err(Error::UnknownViewport(viewport.to_string())),
        }
    }

    pub fn insert_row(&mut self, table: &str, row: HashMap<String, ColumnValue>) -> Result<usize> {
        let index = self
            .tables
            .get_mut(table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))?
            .insert_named(row)?;
        self.publish(table);
        Ok(index)
    }

    pub fn update_row(&mut self, table: &str, key: &ColumnValue, changes: &[(&str, ColumnValue)]) -> Result<usize> {
        let result = self
            .tables
            .get_mut(table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))?
            .update_by_key(key, changes);
        if let Err(Error::UnknownKey(key)) = &result {
            warn!("{}: update for unknown key {}", table, key);
        }
        let index = result?;
        self.publish(table);
        Ok(index)
    }

    /// Hand the table's recorded changes to every subscription on it.
    fn publish(&mut self, table_name: &str) {
        let Some(table) = self.tables.get_mut(table_name) else {
            return;
        };
        let changes = table.drain_changes();
        if changes.is_empty() {
            return;
        }
        let table = &*table;
        let mut notified = 0;
        for subscription in self.subscriptions.values_mut().filter(|s| s.table_name() == table_name) {
            subscription.view_mut().apply_changes(table, &changes);
            notified += 1;
        }
        debug!("{}: {} changes to {} subscriptions", table_name, changes.len(), notified);
    }

    /// Move the pending deltas of every viewport of a client into its queue.
    pub fn collect_updates(&mut self, client_id: u64, queue: &mut MessageQueue) {
        let Some(viewports) = self.client_viewports.get(&client_id) else {
            return;
        };
        for viewport in viewports {
            if let Some(subscription) = self.subscriptions.get_mut(viewport) {
                subscription.collect_updates(queue);
            }
        }
    }

    /// Close every viewport of a disconnecting client.
    pub fn unsubscribe_all(&mut self, client_id: u64, queue: &mut MessageQueue) {
        let viewports = self.client_viewports.remove(&client_id).unwrap_or_default();
        for viewport in &viewports {
            if let Some(subscription) = self.subscriptions.remove(viewport) {
                subscription.cancel();
            }
            queue.purge_viewport(viewport);
        }
        debug!("client {} disconnected, {} viewports closed", client_id, viewports.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::PRIORITY_NORMAL;
    use crate::test_data::test_table;
    use serde_json::json;

    fn context() -> ServiceContext {
        let mut ctx = ServiceContext::new();
        ctx.add_table(test_table());
        ctx
    }

    fn send(ctx: &mut ServiceContext, client_id: u64, queue: &mut MessageQueue, request: serde_json::Value) {
        ctx.handle_text(client_id, &request.to_string(), queue);
    }

    fn subscribe(ctx: &mut ServiceContext, client_id: u64, queue: &mut MessageQueue) -> String {
        send(
            ctx,
            client_id,
            queue,
            json!({"type": "CreateViewport", "table": "test", "range": {"lo": 0, "hi": 10}}),
        );
        let viewport = queue
            .messages()
            .find_map(|m| match m {
                ServerMessage::Subscribed { viewport, .. } => Some(viewport.clone()),
                _ => None,
            })
            .unwrap();
        queue.drain();
        viewport
    }

    #[test]
    fn test_welcome_and_table_list() {
        let mut ctx = context();
        let mut queue = MessageQueue::new();
        let client = ctx.register_client(&mut queue);
        send(&mut ctx, client, &mut queue, json!({"type": "GetTableList", "request_id": "a"}));
        send(&mut ctx, client, &mut queue, json!({"type": "GetTableMeta", "table": "test"}));
        let messages = queue.drain();
        assert_eq!(messages[0], ServerMessage::Welcome { client_id: client });
        assert_eq!(
            messages[1],
            ServerMessage::TableList {
                request_id: Some("a".to_string()),
                tables: vec!["test".to_string()],
            }
        );
        assert!(matches!(&messages[2], ServerMessage::TableMeta { columns, .. } if columns.len() == 6));
    }

    #[test]
    fn test_errors_are_answered() {
        let mut ctx = context();
        let mut queue = MessageQueue::new();
        let client = ctx.register_client(&mut queue);
        queue.drain();

        ctx.handle_text(client, "not json", &mut queue);
        send(&mut ctx, client, &mut queue, json!({"type": "CreateViewport", "table": "nope"}));
        send(&mut ctx, client, &mut queue, json!({"type": "SelectAll", "viewport": "vp-9"}));
        let messages = queue.drain();
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| matches!(m, ServerMessage::Error { .. })));
        assert_eq!(
            messages[1],
            ServerMessage::Error {
                message: "Table 'nope' not found".to_string()
            }
        );
    }

    #[test]
    fn test_mutations_reach_every_subscriber() {
        let mut ctx = context();
        let mut queue_a = MessageQueue::new();
        let mut queue_b = MessageQueue::new();
        let a = ctx.register_client(&mut queue_a);
        let b = ctx.register_client(&mut queue_b);
        let vp_a = subscribe(&mut ctx, a, &mut queue_a);
        let vp_b = subscribe(&mut ctx, b, &mut queue_b);
        assert_ne!(vp_a, vp_b);

        send(
            &mut ctx,
            a,
            &mut queue_a,
            json!({"type": "UpdateRow", "table": "test", "key": "key03", "changes": {"Qty": 7}}),
        );
        ctx.collect_updates(a, &mut queue_a);
        ctx.collect_updates(b, &mut queue_b);
        for (queue, viewport) in [(&mut queue_a, &vp_a), (&mut queue_b, &vp_b)] {
            let messages = queue.extract(PRIORITY_NORMAL);
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].viewport(), Some(viewport.as_str()));
        }

        let err = ctx.update_row("test", &"key99".into(), &[("Qty", 1.into())]).unwrap_err();
        assert!(matches!(err, Error::UnknownKey(_)));
    }

    #[test]
    fn test_viewports_belong_to_their_client() {
        let mut ctx = context();
        let mut queue_a = MessageQueue::new();
        let mut queue_b = MessageQueue::new();
        let a = ctx.register_client(&mut queue_a);
        let b = ctx.register_client(&mut queue_b);
        let vp = subscribe(&mut ctx, a, &mut queue_a);
        queue_b.drain();

        send(&mut ctx, b, &mut queue_b, json!({"type": "TerminateViewport", "viewport": vp}));
        assert!(matches!(queue_b.drain()[0], ServerMessage::Error { .. }));
        assert_eq!(ctx.subscription_count(), 1);

        send(&mut ctx, a, &mut queue_a, json!({"type": "TerminateViewport", "viewport": vp}));
        assert_eq!(queue_a.drain(), vec![ServerMessage::Unsubscribed { viewport: vp }]);
        assert_eq!(ctx.subscription_count(), 0);
    }

    #[test]
    fn test_unsubscribe_all_purges_queue() {
        let mut ctx = context();
        let mut queue = MessageQueue::new();
        let client = ctx.register_client(&mut queue);
        subscribe(&mut ctx, client, &mut queue);
        subscribe(&mut ctx, client, &mut queue);
        send(
            &mut ctx,
            client,
            &mut queue,
            json!({"type": "InsertRow", "table": "test", "row": {"Key": "key25", "Qty": 1}}),
        );
        ctx.collect_updates(client, &mut queue);
        assert_eq!(queue.len(), 2);

        ctx.unsubscribe_all(client, &mut queue);
        assert!(queue.is_empty());
        assert_eq!(ctx.subscription_count(), 0);
        assert_eq!(ctx.table("test").unwrap().len(), 25);
    }
}

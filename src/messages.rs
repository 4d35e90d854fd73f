/// Wire message types for client-server communication
///
/// Requests and responses are JSON objects tagged by `type`. Projected rows
/// travel as flat arrays laid out by the `meta` a client receives once with
/// `Subscribed`.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::column::{Column, ColumnValue};
use crate::filter::Filter;
use crate::group::GroupState;
use crate::metadata::{Meta, SortCriterion};
use crate::range::Range;
use crate::rowset::{RowData, RowUpdate};
use crate::view::{DataType, ViewOptions};

fn default_true() -> bool {
    true
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientRequest {
    /// Names of every table
    GetTableList {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Column definitions of one table
    GetTableMeta {
        #[serde(default)]
        request_id: Option<String>,
        table: String,
    },

    /// Open a view on a table; the server assigns the viewport id
    CreateViewport {
        #[serde(default)]
        request_id: Option<String>,
        table: String,
        #[serde(default)]
        range: Range,
        #[serde(flatten)]
        options: ViewOptions,
    },

    TerminateViewport { viewport: String },

    SetViewRange {
        viewport: String,
        range: Range,
        #[serde(default = "default_true")]
        use_delta: bool,
        #[serde(default)]
        data_type: DataType,
    },

    Sort {
        viewport: String,
        sort_criteria: Vec<SortCriterion>,
    },

    /// Row filter, or filter picker search when `data_type` is `filterData`
    Filter {
        viewport: String,
        filter: Option<Filter>,
        #[serde(default)]
        data_type: DataType,
        #[serde(default)]
        incremental: bool,
    },

    /// Group by columns; `null` or an empty list ungroups
    GroupBy {
        viewport: String,
        #[serde(default)]
        group_by: Option<Vec<SortCriterion>>,
    },

    SetGroupState {
        viewport: String,
        group_state: GroupState,
    },

    /// Select the leaf at displayed position `idx`
    Select {
        viewport: String,
        idx: usize,
        #[serde(default)]
        range_select: bool,
        #[serde(default)]
        keep_existing_selection: bool,
    },

    SelectAll { viewport: String },

    SelectNone { viewport: String },

    GetFilterData {
        viewport: String,
        column: String,
        #[serde(default)]
        search_text: Option<String>,
        #[serde(default)]
        range: Option<Range>,
    },

    /// Insert a row given as column name to value
    InsertRow {
        table: String,
        row: HashMap<String, ColumnValue>,
    },

    /// Change cells of the row with primary key `key`
    UpdateRow {
        table: String,
        key: ColumnValue,
        changes: HashMap<String, ColumnValue>,
    },
}

impl ClientRequest {
    /// Viewport addressed by a view request.
    pub fn viewport(&self) -> Option<&str> {
        match self {
            ClientRequest::TerminateViewport { viewport }
            | ClientRequest::SetViewRange { viewport, .. }
            | ClientRequest::Sort { viewport, .. }
            | ClientRequest::Filter { viewport, .. }
            | ClientRequest::GroupBy { viewport, .. }
            | ClientRequest::SetGroupState { viewport, .. }
            | ClientRequest::Select { viewport, .. }
            | ClientRequest::SelectAll { viewport }
            | ClientRequest::SelectNone { viewport }
            | ClientRequest::GetFilterData { viewport, .. } => Some(viewport),
            ClientRequest::GetTableList { .. }
            | ClientRequest::GetTableMeta { .. }
            | ClientRequest::CreateViewport { .. }
            | ClientRequest::InsertRow { .. }
            | ClientRequest::UpdateRow { .. } => None,
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Sent once when a connection opens
    Welcome { client_id: u64 },

    TableList {
        request_id: Option<String>,
        tables: Vec<String>,
    },

    TableMeta {
        request_id: Option<String>,
        table: String,
        columns: Vec<Column>,
    },

    /// Viewport opened; `meta` is the row layout for its lifetime
    Subscribed {
        request_id: Option<String>,
        viewport: String,
        table: String,
        size: usize,
        offset: usize,
        meta: Meta,
    },

    /// Rows of the window, replacing what the client holds at their IDX
    Rowset { viewport: String, data: RowData },

    /// Cell changes of displayed rows
    Update {
        viewport: String,
        updates: Vec<RowUpdate>,
    },

    /// Row count or IDX offset changed outside the window
    Size {
        viewport: String,
        size: usize,
        offset: usize,
    },

    /// Filter picker rows
    FilterData { viewport: String, data: RowData },

    /// SELECTED changes of displayed rows
    Selected {
        viewport: String,
        updates: Vec<RowUpdate>,
    },

    Unsubscribed { viewport: String },

    /// Error occurred
    Error { message: String },
}

impl ServerMessage {
    pub fn viewport(&self) -> Option<&str> {
        match self {
            ServerMessage::Subscribed { viewport, .. }
            | ServerMessage::Rowset { viewport, .. }
            | ServerMessage::Update { viewport, .. }
            | ServerMessage::Size { viewport, .. }
            | ServerMessage::FilterData { viewport, .. }
            | ServerMessage::Selected { viewport, .. }
            | ServerMessage::Unsubscribed { viewport } => Some(viewport),
            ServerMessage::Welcome { .. }
            | ServerMessage::TableList { .. }
            | ServerMessage::TableMeta { .. }
            | ServerMessage::Error { .. } => None,
        }
    }
}

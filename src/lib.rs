/// LiveGrid - Incrementally Updatable Row Sets for Live Data Grids
///
/// A table of fixed-shape rows feeds any number of views. Each view keeps its
/// own sort, filter and grouping over the table and answers for a window of
/// rows; table inserts and updates are patched into every view and surface
/// as minimal deltas (cell updates, size changes or replacement windows),
/// which a per-connection queue merges before they are sent.

pub mod error;
pub mod column;
pub mod metadata;
pub mod changeset;
pub mod table;
pub mod range;
pub mod sort;
pub mod filter;
pub mod group;
pub mod rowset;
pub mod group_rowset;
pub mod view;
pub mod messages;
pub mod queue;
pub mod subscription;
pub mod service;

#[cfg(test)]
mod test_data;

pub use error::{Error, Result};
pub use column::{Aggregate, Column, ColumnType, ColumnValue, FilterType};
pub use metadata::{Meta, SortCriterion, SortDirection};
pub use changeset::{Changeset, IncrementalView, TableChange};
pub use table::{Row, Table};
pub use range::Range;
pub use filter::Filter;
pub use group::GroupState;
pub use rowset::{FilterStats, RowData, RowSet, RowUpdate};
pub use group_rowset::GroupRowSet;
pub use view::{DataType, DataView, ViewOptions, ViewUpdate};
pub use messages::{ClientRequest, ServerMessage};
pub use queue::MessageQueue;
pub use subscription::Subscription;
pub use service::ServiceContext;

// WebSocket server modules - only when server feature is enabled
#[cfg(feature = "server")]
pub mod config;
#[cfg(feature = "server")]
pub mod websocket;
#[cfg(feature = "server")]
pub mod server;

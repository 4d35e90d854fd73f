/// Error type shared by every LiveGrid component.
///
/// Malformed requests and unknown column references fail at the call that received
/// them. Operations that are merely "out of view" (an update to an off-screen row)
/// are not errors; they return `None`.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A sort criterion that is neither a column name nor a `[name, direction]` pair.
    #[error("Malformed sort criteria: {0}")]
    MalformedSortCriteria(String),

    /// Unknown filter node type or a node missing its fields.
    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    #[error("Malformed group state: {0}")]
    MalformedGroupState(String),

    /// A filter, sort, group-by or projection names a column the view does not know.
    #[error("Column '{0}' not found")]
    UnknownColumn(String),

    #[error("Table '{0}' not found")]
    UnknownTable(String),

    #[error("Viewport '{0}' not found")]
    UnknownViewport(String),

    /// Insert rejected because a row with the same primary key already exists.
    #[error("Duplicate primary key '{0}'")]
    DuplicateKey(String),

    #[error("No row with primary key '{0}'")]
    UnknownKey(String),

    #[error("Row index {index} out of range (table has {len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    #[error("Row has {found} values, table expects {expected}")]
    RowLength { expected: usize, found: usize },

    #[error("Type mismatch in column '{column}': expected {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    /// A server setting that does not parse.
    #[error("Invalid value '{value}' for {name}")]
    InvalidConfig { name: String, value: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Changeset - Incremental Change Propagation for LiveGrid
///
/// Tables record what each mutation did as a `TableChange`. Views observe the
/// changes in order and patch their own sort, filter and group state instead of
/// rebuilding it.
///
/// # Usage Pattern
///
/// 1. `Table::insert` / `Table::update` push `TableChange` events
/// 2. Changes accumulate in the table's changeset buffer
/// 3. The owner drains the buffer and hands each change to every view over the table
/// 4. Each view updates its derived state and queues a delta for its client

use crate::column::ColumnValue;
use crate::table::Table;

/// Represents a single change to a table
#[derive(Debug, Clone, PartialEq)]
pub enum TableChange {
    /// A row was appended at the given storage index
    RowInserted { index: usize },

    /// Cells of a row changed in place
    /// Contains: (storage index, [(storage slot, new value)])
    RowUpdated {
        index: usize,
        changes: Vec<(usize, ColumnValue)>,
    },
}

impl TableChange {
    /// Returns the storage index affected by this change
    pub fn row_index(&self) -> usize {
        match self {
            TableChange::RowInserted { index } => *index,
            TableChange::RowUpdated { index, .. } => *index,
        }
    }
}

/// A collection of changes that can be applied to views
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    changes: Vec<TableChange>,
    /// Generation counter - incremented each time changeset is drained
    generation: u64,
}

impl Changeset {
    pub fn new() -> Self {
        Changeset::default()
    }

    /// Add a change to the changeset
    pub fn push(&mut self, change: TableChange) {
        self.changes.push(change);
    }

    /// Returns all changes since the last drain
    pub fn changes(&self) -> &[TableChange] {
        &self.changes
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Drain changes, returning ownership and clearing the buffer
    pub fn drain(&mut self) -> Vec<TableChange> {
        self.generation += 1;
        std::mem::take(&mut self.changes)
    }
}

/// Views that patch themselves from table changes
pub trait IncrementalView {
    /// Apply one change. `table` already reflects it.
    fn apply_change(&mut self, table: &Table, change: &TableChange);

    /// Apply changes in the order they happened
    fn apply_changes(&mut self, table: &Table, changes: &[TableChange]) {
        for change in changes {
            self.apply_change(table, change);
        }
    }
}

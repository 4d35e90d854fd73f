/// LiveGrid Table - the canonical row store
///
/// A Table owns fixed-shape rows in storage order plus an index from primary
/// key to storage slot. Rows are appended by `insert` and changed in place by
/// `update`; they are never physically removed. Every mutation is recorded in
/// the table's changeset so that views can patch themselves.
///
/// # Examples
///
/// ```
/// use livegrid::{Column, ColumnType, ColumnValue, Table};
///
/// let mut table = Table::new(
///     "instruments",
///     vec![
///         Column::new("Symbol").typed(ColumnType::String),
///         Column::new("Price").typed(ColumnType::Float64),
///     ],
///     "Symbol",
/// )
/// .unwrap();
///
/// table.insert(vec!["AAPL".into(), 180.5.into()]).unwrap();
/// table.update_by_key(&"AAPL".into(), &[("Price", 181.0.into())]).unwrap();
///
/// assert_eq!(table.len(), 1);
/// assert_eq!(table.get_value(0, "Price").unwrap(), &ColumnValue::Float64(181.0));
/// assert!(table.insert(vec!["AAPL".into(), 1.0.into()]).is_err());
/// ```

use crate::changeset::{Changeset, TableChange};
use crate::column::{Column, ColumnValue, ValueKey};
use crate::error::{Error, Result};
use crate::metadata::{build_column_map, ColumnMap};
use std::collections::HashMap;

/// A row in storage order, one value per storage slot.
pub type Row = Vec<ColumnValue>;

pub struct Table {
    name: String,
    columns: Vec<Column>,
    column_map: ColumnMap,
    /// Column definition per storage slot
    by_slot: Vec<Option<usize>>,
    primary_key: usize,
    rows: Vec<Row>,
    /// Primary key to storage index
    index: HashMap<ValueKey, usize>,
    /// Tracks changes for incremental view propagation
    changeset: Changeset,
}

impl Table {
    /// Create an empty table. `primary_key` must name one of `columns`.
    pub fn new(name: impl Into<String>, columns: Vec<Column>, primary_key: &str) -> Result<Self> {
        let column_map = build_column_map(&columns);
        let primary_key = column_map.slot(primary_key)?;
        let width = columns
            .iter()
            .enumerate()
            .map(|(i, c)| c.key.unwrap_or(i) + 1)
            .max()
            .unwrap_or(0);
        let mut by_slot = vec![None; width];
        for (i, c) in columns.iter().enumerate() {
            by_slot[c.key.unwrap_or(i)] = Some(i);
        }

        Ok(Table {
            name: name.into(),
            columns,
            column_map,
            by_slot,
            primary_key,
            rows: Vec::new(),
            index: HashMap::new(),
            changeset: Changeset::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_map(&self) -> &ColumnMap {
        &self.column_map
    }

    /// Column definition by name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        let slot = self.column_map.slot(name)?;
        self.column_at(slot)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    /// Column definition stored at a slot.
    pub fn column_at(&self, slot: usize) -> Option<&Column> {
        self.by_slot
            .get(slot)
            .copied()
            .flatten()
            .map(|i| &self.columns[i])
    }

    pub fn primary_key_slot(&self) -> usize {
        self.primary_key
    }

    /// Number of storage slots per row.
    pub fn width(&self) -> usize {
        self.by_slot.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn get_value(&self, index: usize, column: &str) -> Result<&ColumnValue> {
        let slot = self.column_map.slot(column)?;
        let row = self.rows.get(index).ok_or(Error::RowOutOfRange {
            index,
            len: self.rows.len(),
        })?;
        Ok(&row[slot])
    }

    /// Primary key value of the row at a storage index.
    pub fn row_key(&self, index: usize) -> ColumnValue {
        self.rows
            .get(index)
            .map(|row| row[self.primary_key].clone())
            .unwrap_or(ColumnValue::Null)
    }

    /// Storage index of a primary key, O(1).
    pub fn index_of(&self, key: &ColumnValue) -> Option<usize> {
        self.index.get(&ValueKey::of(key)).copied()
    }

    /// Append a row in storage order. Duplicate primary keys are rejected and
    /// leave the table untouched.
    pub fn insert(&mut self, row: Row) -> Result<usize> {
        if row.len() != self.width() {
            return Err(Error::RowLength {
                expected: self.width(),
                found: row.len(),
            });
        }
        let row = row
            .into_iter()
            .enumerate()
            .map(|(slot, value)| match self.column_at(slot) {
                Some(column) => column.coerce(value),
                None => Ok(value),
            })
            .collect::<Result<Row>>()?;

        let key = ValueKey::of(&row[self.primary_key]);
        if self.index.contains_key(&key) {
            return Err(Error::DuplicateKey(row[self.primary_key].to_string()));
        }

        let index = self.rows.len();
        self.rows.push(row);
        self.index.insert(key, index);
        self.changeset.push(TableChange::RowInserted { index });
        Ok(index)
    }

    /// Append a row given as column name to value; absent columns are null.
    pub fn insert_named(&mut self, mut values: HashMap<String, ColumnValue>) -> Result<usize> {
        let mut row = vec![ColumnValue::Null; self.width()];
        for column in &self.columns {
            if let Some(value) = values.remove(&column.name) {
                row[self.column_map.slot(&column.name)?] = value;
            }
        }
        if let Some(unknown) = values.keys().next() {
            return Err(Error::UnknownColumn(unknown.clone()));
        }
        self.insert(row)
    }

    /// Change cells of the row at a storage index.
    ///
    /// Only values that actually differ are recorded; an update that changes
    /// nothing produces no `TableChange`.
    pub fn update(&mut self, index: usize, changes: &[(&str, ColumnValue)]) -> Result<()> {
        if index >= self.rows.len() {
            return Err(Error::RowOutOfRange {
                index,
                len: self.rows.len(),
            });
        }

        let mut resolved = Vec::with_capacity(changes.len());
        for (name, value) in changes {
            let slot = self.column_map.slot(name)?;
            let value = self.column(name)?.coerce(value.clone())?;
            resolved.push((slot, value));
        }

        if let Some((_, new_key)) = resolved.iter().rev().find(|(slot, _)| *slot == self.primary_key) {
            let display = new_key.to_string();
            let new_key = ValueKey::of(new_key);
            let old_key = ValueKey::of(&self.rows[index][self.primary_key]);
            if new_key != old_key {
                if self.index.contains_key(&new_key) {
                    return Err(Error::DuplicateKey(display));
                }
                self.index.remove(&old_key);
                self.index.insert(new_key, index);
            }
        }

        let row = &mut self.rows[index];
        let mut applied: Vec<(usize, ColumnValue)> = Vec::new();
        for (slot, value) in resolved {
            if row[slot] != value {
                row[slot] = value.clone();
                match applied.iter_mut().find(|(s, _)| *s == slot) {
                    Some(entry) => entry.1 = value,
                    None => applied.push((slot, value)),
                }
            }
        }

        if !applied.is_empty() {
            self.changeset.push(TableChange::RowUpdated {
                index,
                changes: applied,
            });
        }
        Ok(())
    }

    /// Change cells of the row with the given primary key; returns its storage index.
    pub fn update_by_key(&mut self, key: &ColumnValue, changes: &[(&str, ColumnValue)]) -> Result<usize> {
        let index = self
            .index_of(key)
            .ok_or_else(|| Error::UnknownKey(key.to_string()))?;
        self.update(index, changes)?;
        Ok(index)
    }

    pub fn changeset(&self) -> &Changeset {
        &self.changeset
    }

    /// Take the changes recorded since the last drain.
    pub fn drain_changes(&mut self) -> Vec<TableChange> {
        self.changeset.drain()
    }
}

/// Column metadata: name-to-slot maps, the metadata tail of projected rows,
/// and sort criteria.
///
/// Every row a view produces is the requested columns' values followed by a
/// fixed tail of bookkeeping slots. The offsets of that tail depend only on the
/// number of projected columns and are computed once per subscription as a
/// [`Meta`] value.

use crate::column::{Column, ColumnValue};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Number of bookkeeping slots appended to every projected row.
pub const META_SLOTS: usize = 9;

/// Column name to storage slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap(HashMap<String, usize>);

impl ColumnMap {
    pub fn get(&self, name: &str) -> Option<usize> {
        self.0.get(name).copied()
    }

    /// Slot of a column, or `Error::UnknownColumn` naming it.
    pub fn slot(&self, name: &str) -> Result<usize> {
        self.get(name).ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Map each column name to its storage slot (`key`, or list position when absent).
pub fn build_column_map(columns: &[Column]) -> ColumnMap {
    ColumnMap(
        columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), c.key.unwrap_or(i)))
            .collect(),
    )
}

/// Offsets of the metadata tail of a projected row.
///
/// Serialized with upper-case slot names so clients can read the layout once
/// per subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Meta {
    pub idx: usize,
    pub depth: usize,
    pub count: usize,
    pub key: usize,
    pub selected: usize,
    pub parent_idx: usize,
    pub idx_pointer: usize,
    pub filter_count: usize,
    pub next_filter_idx: usize,
    /// Total row width, columns plus tail.
    pub width: usize,
}

impl Meta {
    pub fn new(column_count: usize) -> Self {
        let c = column_count;
        Meta {
            idx: c,
            depth: c + 1,
            count: c + 2,
            key: c + 3,
            selected: c + 4,
            parent_idx: c + 5,
            idx_pointer: c + 6,
            filter_count: c + 7,
            next_filter_idx: c + 8,
            width: c + META_SLOTS,
        }
    }

    /// Number of user columns ahead of the tail.
    pub fn column_count(&self) -> usize {
        self.idx
    }
}

/// Metadata layout for a column list.
pub fn metadata(columns: &[Column]) -> Meta {
    Meta::new(columns.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Dsc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "asc" | "ASC" => Ok(SortDirection::Asc),
            "dsc" | "desc" | "DSC" | "DESC" => Ok(SortDirection::Dsc),
            other => Err(Error::MalformedSortCriteria(format!(
                "unknown sort direction '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Dsc => "dsc",
        }
    }

    pub fn flip(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Dsc,
            SortDirection::Dsc => SortDirection::Asc,
        }
    }

    /// Orient an ascending comparison.
    #[inline]
    pub fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ord,
            SortDirection::Dsc => ord.reverse(),
        }
    }
}

/// `(storage slot, direction)`
pub type SortColumn = (usize, SortDirection);

/// A user-facing sort criterion: `"name"` or `["name", "asc" | "dsc"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "JsonValue", into = "JsonValue")]
pub struct SortCriterion {
    pub column: String,
    pub direction: SortDirection,
}

impl SortCriterion {
    pub fn asc(column: impl Into<String>) -> Self {
        SortCriterion {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn dsc(column: impl Into<String>) -> Self {
        SortCriterion {
            column: column.into(),
            direction: SortDirection::Dsc,
        }
    }
}

impl TryFrom<JsonValue> for SortCriterion {
    type Error = Error;

    fn try_from(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::String(column) => Ok(SortCriterion::asc(column)),
            JsonValue::Array(items) => match items.as_slice() {
                [JsonValue::String(column)] => Ok(SortCriterion::asc(column.clone())),
                [JsonValue::String(column), JsonValue::String(dir)] => Ok(SortCriterion {
                    column: column.clone(),
                    direction: SortDirection::parse(dir)?,
                }),
                [JsonValue::String(column), JsonValue::Null] => Ok(SortCriterion::asc(column.clone())),
                _ => Err(Error::MalformedSortCriteria(format!(
                    "expected [name, direction], got {}",
                    JsonValue::Array(items)
                ))),
            },
            other => Err(Error::MalformedSortCriteria(format!(
                "expected a column name or [name, direction], got {}",
                other
            ))),
        }
    }
}

impl From<SortCriterion> for JsonValue {
    fn from(c: SortCriterion) -> Self {
        JsonValue::Array(vec![
            JsonValue::String(c.column),
            JsonValue::String(c.direction.as_str().to_string()),
        ])
    }
}

/// Parse a JSON list of sort criteria, failing on the first malformed entry.
pub fn parse_sort_criteria(value: &JsonValue) -> Result<Vec<SortCriterion>> {
    match value {
        JsonValue::Array(items) => items
            .iter()
            .cloned()
            .map(SortCriterion::try_from)
            .collect(),
        other => Err(Error::MalformedSortCriteria(format!(
            "expected a list of criteria, got {}",
            other
        ))),
    }
}

/// Resolve criteria against a column map into `(slot, direction)` pairs.
pub fn map_sort_criteria(criteria: &[SortCriterion], column_map: &ColumnMap) -> Result<Vec<SortColumn>> {
    criteria
        .iter()
        .map(|c| Ok((column_map.slot(&c.column)?, c.direction)))
        .collect()
}

/// Storage row to projected row.
///
/// Built once per view from the projected column list and the table's column
/// map; every projected row produced through it has the same layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    slots: Vec<usize>,
    meta: Meta,
}

impl Projection {
    pub fn new(columns: &[Column], table_map: &ColumnMap) -> Result<Self> {
        let slots = columns
            .iter()
            .map(|c| table_map.slot(&c.name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Projection {
            slots,
            meta: metadata(columns),
        })
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Storage slots in projected order.
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// Projected position of a storage slot, if the view shows that column.
    pub fn position_of(&self, slot: usize) -> Option<usize> {
        self.slots.iter().position(|&s| s == slot)
    }

    /// Column values followed by a tail of nulls.
    pub fn frame(&self, row: &[ColumnValue]) -> Vec<ColumnValue> {
        let mut out = Vec::with_capacity(self.meta.width);
        out.extend(
            self.slots
                .iter()
                .map(|&s| row.get(s).cloned().unwrap_or(ColumnValue::Null)),
        );
        out.resize(self.meta.width, ColumnValue::Null);
        out
    }

    /// Project a leaf row at absolute position `idx`.
    pub fn leaf(&self, row: &[ColumnValue], idx: usize, key: ColumnValue, selected: bool) -> Vec<ColumnValue> {
        let mut out = self.frame(row);
        let m = &self.meta;
        out[m.idx] = idx.into();
        out[m.depth] = 0i64.into();
        out[m.count] = 0i64.into();
        out[m.key] = key;
        out[m.selected] = (selected as i64).into();
        out
    }
}

/// LiveGrid column definitions and cell values
///
/// A `Column` describes one field of a table or of a projection: its name, the
/// storage slot it reads from, its type, how group rows aggregate it and which
/// kind of filter picker it gets. Cells are `ColumnValue`s.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int32,
    Int64,
    Float32,
    #[serde(alias = "number")]
    Float64,
    String,
    Bool,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Int32 | ColumnType::Int64 | ColumnType::Float32 | ColumnType::Float64
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnType::Int32 | ColumnType::Int64)
    }
}

/// Column value enum to support multiple types
///
/// Serialized untagged, so a projected row is a flat JSON array of scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Float32(f32),
    String(String),
    Bool(bool),
    Null,
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ColumnValue::Int32(v) => Some(*v as i64),
            ColumnValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value; `None` for strings, booleans and null.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Int32(v) => Some(*v as f64),
            ColumnValue::Int64(v) => Some(*v as f64),
            ColumnValue::Float32(v) => Some(*v as f64),
            ColumnValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            ColumnValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ColumnValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            ColumnValue::Int32(_)
            | ColumnValue::Int64(_)
            | ColumnValue::Float32(_)
            | ColumnValue::Float64(_) => 0,
            ColumnValue::String(_) => 1,
            ColumnValue::Bool(_) => 2,
            ColumnValue::Null => 3,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ColumnValue::Int32(_) => "Int32",
            ColumnValue::Int64(_) => "Int64",
            ColumnValue::Float32(_) => "Float32",
            ColumnValue::Float64(_) => "Float64",
            ColumnValue::String(_) => "String",
            ColumnValue::Bool(_) => "Bool",
            ColumnValue::Null => "Null",
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Int32(v) => write!(f, "{}", v),
            ColumnValue::Int64(v) => write!(f, "{}", v),
            ColumnValue::Float32(v) => write!(f, "{}", v),
            ColumnValue::Float64(v) => write!(f, "{}", v),
            ColumnValue::String(v) => f.write_str(v),
            ColumnValue::Bool(v) => write!(f, "{}", v),
            ColumnValue::Null => Ok(()),
        }
    }
}

impl From<i32> for ColumnValue {
    fn from(v: i32) -> Self {
        ColumnValue::Int32(v)
    }
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        ColumnValue::Int64(v)
    }
}

impl From<usize> for ColumnValue {
    fn from(v: usize) -> Self {
        ColumnValue::Int64(v as i64)
    }
}

impl From<f64> for ColumnValue {
    fn from(v: f64) -> Self {
        ColumnValue::Float64(v)
    }
}

impl From<bool> for ColumnValue {
    fn from(v: bool) -> Self {
        ColumnValue::Bool(v)
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        ColumnValue::String(v.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        ColumnValue::String(v)
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ColumnValue::Null)
    }
}

/// Three-way comparison used by every sort in the crate.
///
/// Numbers compare numerically regardless of width, strings lexicographically.
/// `Null` is greater than any defined value and equal to itself. NaN sorts
/// after every other number and equals only NaN. Values of different families
/// order as numbers < strings < booleans < null.
pub fn compare_values(a: &ColumnValue, b: &ColumnValue) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return match (x.is_nan(), y.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        };
    }
    match (a, b) {
        (ColumnValue::String(x), ColumnValue::String(y)) => x.cmp(y),
        (ColumnValue::Bool(x), ColumnValue::Bool(y)) => x.cmp(y),
        _ => a.type_rank().cmp(&b.type_rank()),
    }
}

/// Equality as seen by filters and grouping: `Int32(5) == Float64(5.0)`.
pub fn values_equal(a: &ColumnValue, b: &ColumnValue) -> bool {
    compare_values(a, b) == Ordering::Equal
}

/// Hashable identity of a value, equal exactly when `values_equal` is.
///
/// Numbers collapse across widths (`Int32(1)` and `Float64(1.0)` share a
/// key), all NaNs share one key, and `-0.0` keys as `0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Number(u64),
    Text(String),
    Bool(bool),
    Null,
}

impl ValueKey {
    pub fn of(value: &ColumnValue) -> Self {
        match value {
            ColumnValue::String(s) => ValueKey::Text(s.clone()),
            ColumnValue::Bool(b) => ValueKey::Bool(*b),
            ColumnValue::Null => ValueKey::Null,
            number => match number.as_f64() {
                Some(v) if v == 0.0 => ValueKey::Number(0.0f64.to_bits()),
                Some(v) if !v.is_nan() => ValueKey::Number(v.to_bits()),
                _ => ValueKey::Number(f64::NAN.to_bits()),
            },
        }
    }
}

/// How group rows summarise a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Sum,
    Avg,
}

/// Which filter picker a column gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    /// Distinct values with selected/total counts.
    Set,
    /// Histogram of numeric values.
    Number,
}

/// A column definition.
///
/// `key` is the storage slot of the column in table rows. When it is absent the
/// column's position in its list is used.
///
/// # Examples
///
/// ```
/// use livegrid::{Aggregate, Column, ColumnType, FilterType};
///
/// let qty = Column::new("Qty").typed(ColumnType::Int32).aggregate(Aggregate::Sum);
/// assert_eq!(qty.resolved_filter_type(), FilterType::Number);
///
/// let name = Column::new("Name").typed(ColumnType::String);
/// assert_eq!(name.resolved_filter_type(), FilterType::Set);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<usize>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<ColumnType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterType>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            key: None,
            column_type: None,
            aggregate: None,
            filter: None,
        }
    }

    pub fn typed(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    pub fn keyed(mut self, key: usize) -> Self {
        self.key = Some(key);
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    pub fn filter_type(mut self, filter: FilterType) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Explicit filter override, else a histogram for numeric columns.
    pub fn resolved_filter_type(&self) -> FilterType {
        match (self.filter, self.column_type) {
            (Some(filter), _) => filter,
            (None, Some(t)) if t.is_numeric() => FilterType::Number,
            _ => FilterType::Set,
        }
    }

    /// Validate and convert value to the column's type.
    ///
    /// Integers widen into wider integer and float columns; everything else must
    /// match exactly. Null is accepted everywhere.
    pub fn coerce(&self, value: ColumnValue) -> Result<ColumnValue> {
        let Some(column_type) = self.column_type else {
            return Ok(value);
        };
        match (value, column_type) {
            (ColumnValue::Null, _) => Ok(ColumnValue::Null),
            (v @ ColumnValue::Int32(_), ColumnType::Int32) => Ok(v),
            (ColumnValue::Int32(v), ColumnType::Int64) => Ok(ColumnValue::Int64(v as i64)),
            (v @ ColumnValue::Int64(_), ColumnType::Int64) => Ok(v),
            (v @ ColumnValue::Float32(_), ColumnType::Float32) => Ok(v),
            (ColumnValue::Int32(v), ColumnType::Float32) => Ok(ColumnValue::Float32(v as f32)),
            (ColumnValue::Float64(v), ColumnType::Float32) => Ok(ColumnValue::Float32(v as f32)),
            (v @ ColumnValue::Float64(_), ColumnType::Float64) => Ok(v),
            (ColumnValue::Int32(v), ColumnType::Float64) => Ok(ColumnValue::Float64(v as f64)),
            (ColumnValue::Int64(v), ColumnType::Float64) => Ok(ColumnValue::Float64(v as f64)),
            (ColumnValue::Float32(v), ColumnType::Float64) => Ok(ColumnValue::Float64(v as f64)),
            (v @ ColumnValue::String(_), ColumnType::String) => Ok(v),
            (v @ ColumnValue::Bool(_), ColumnType::Bool) => Ok(v),
            (v, expected) => Err(Error::TypeMismatch {
                column: self.name.clone(),
                expected: format!("{:?}", expected),
                found: v.type_name().to_string(),
            }),
        }
    }
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Column::new(name)
    }
}

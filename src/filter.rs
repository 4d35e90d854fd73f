//! Filter expressions and their compiled predicates.
//!
//! A `Filter` is a declarative tree that travels over the wire as JSON:
//!
//! ```json
//! {"type": "AND", "filters": [
//!     {"type": "EQ", "colName": "Qty", "value": 100},
//!     {"type": "IN", "colName": "Group1", "values": ["G1", "G3"]}
//! ]}
//! ```
//!
//! `functor` compiles a tree once into a closure over storage rows. The
//! structural helpers answer questions about filters without evaluating them,
//! which lets row sets re-filter incrementally.
//!
//! # Examples
//!
//! ```
//! use livegrid::filter::functor;
//! use livegrid::metadata::build_column_map;
//! use livegrid::{Column, ColumnValue, Filter};
//!
//! let map = build_column_map(&[Column::new("Name"), Column::new("Qty")]);
//! let filter = Filter::and(vec![
//!     Filter::starts_with("Name", "go"),
//!     Filter::greater_than("Qty", 10),
//! ]);
//! let test = functor(&map, &filter).unwrap();
//! assert!(test(&[ColumnValue::from("Google"), ColumnValue::from(20)]));
//! assert!(!test(&[ColumnValue::from("Apple"), ColumnValue::from(20)]));
//! ```

use crate::column::{compare_values, values_equal, ColumnValue};
use crate::error::{Error, Result};
use crate::metadata::ColumnMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// Compiled filter: true when a storage row passes.
pub type Predicate = Box<dyn Fn(&[ColumnValue]) -> bool + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Filter {
    #[serde(rename = "EQ", alias = "EQUALS")]
    Equals {
        #[serde(rename = "colName")]
        column: String,
        value: ColumnValue,
    },
    #[serde(rename = "IN")]
    In {
        #[serde(rename = "colName")]
        column: String,
        values: Vec<ColumnValue>,
    },
    #[serde(rename = "NOT_IN")]
    NotIn {
        #[serde(rename = "colName")]
        column: String,
        values: Vec<ColumnValue>,
    },
    /// Case-insensitive text prefix
    #[serde(rename = "SW", alias = "STARTS_WITH")]
    StartsWith {
        #[serde(rename = "colName")]
        column: String,
        value: String,
    },
    #[serde(rename = "NOT_SW", alias = "NOT_STARTS_WITH")]
    NotStartsWith {
        #[serde(rename = "colName")]
        column: String,
        value: String,
    },
    #[serde(rename = "GT", alias = "GREATER_THAN")]
    GreaterThan {
        #[serde(rename = "colName")]
        column: String,
        value: ColumnValue,
    },
    #[serde(rename = "GE", alias = "GREATER_EQ")]
    GreaterEq {
        #[serde(rename = "colName")]
        column: String,
        value: ColumnValue,
    },
    #[serde(rename = "LT", alias = "LESS_THAN")]
    LessThan {
        #[serde(rename = "colName")]
        column: String,
        value: ColumnValue,
    },
    #[serde(rename = "LE", alias = "LESS_EQ")]
    LessEq {
        #[serde(rename = "colName")]
        column: String,
        value: ColumnValue,
    },
    #[serde(rename = "AND")]
    And { filters: Vec<Filter> },
    #[serde(rename = "OR")]
    Or { filters: Vec<Filter> },
}

impl Filter {
    pub fn equals(column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        Filter::Equals {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<ColumnValue>>(column: impl Into<String>, values: Vec<V>) -> Self {
        Filter::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn not_in<V: Into<ColumnValue>>(column: impl Into<String>, values: Vec<V>) -> Self {
        Filter::NotIn {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn starts_with(column: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::StartsWith {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn not_starts_with(column: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::NotStartsWith {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn greater_than(column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        Filter::GreaterThan {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn less_than(column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        Filter::LessThan {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And { filters }
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or { filters }
    }

    /// Decode a filter from JSON, reporting unknown node types as malformed.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        Filter::deserialize(value).map_err(|e| Error::MalformedFilter(e.to_string()))
    }

    /// Column of a leaf node; `None` for AND/OR.
    pub fn column(&self) -> Option<&str> {
        match self {
            Filter::Equals { column, .. }
            | Filter::In { column, .. }
            | Filter::NotIn { column, .. }
            | Filter::StartsWith { column, .. }
            | Filter::NotStartsWith { column, .. }
            | Filter::GreaterThan { column, .. }
            | Filter::GreaterEq { column, .. }
            | Filter::LessThan { column, .. }
            | Filter::LessEq { column, .. } => Some(column),
            Filter::And { .. } | Filter::Or { .. } => None,
        }
    }

    /// Same filter addressed to another column.
    pub fn with_column(&self, name: &str) -> Filter {
        let mut filter = self.clone();
        filter.rename_column(name);
        filter
    }

    fn rename_column(&mut self, name: &str) {
        match self {
            Filter::Equals { column, .. }
            | Filter::In { column, .. }
            | Filter::NotIn { column, .. }
            | Filter::StartsWith { column, .. }
            | Filter::NotStartsWith { column, .. }
            | Filter::GreaterThan { column, .. }
            | Filter::GreaterEq { column, .. }
            | Filter::LessThan { column, .. }
            | Filter::LessEq { column, .. } => *column = name.to_string(),
            Filter::And { filters } | Filter::Or { filters } => {
                filters.iter_mut().for_each(|f| f.rename_column(name))
            }
        }
    }

    /// Every column the filter references.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Filter::And { filters } | Filter::Or { filters } => {
                let mut columns: Vec<&str> = Vec::new();
                for column in filters.iter().flat_map(|f| f.columns()) {
                    if !columns.contains(&column) {
                        columns.push(column);
                    }
                }
                columns
            }
            leaf => leaf.column().into_iter().collect(),
        }
    }

    fn conjuncts(&self) -> Vec<&Filter> {
        match self {
            Filter::And { filters } => filters.iter().flat_map(|f| f.conjuncts()).collect(),
            other => vec![other],
        }
    }
}

fn prefix_matches(value: &ColumnValue, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match value {
        ColumnValue::Null => false,
        v => v.to_string().to_lowercase().starts_with(prefix),
    }
}

fn compare_defined(value: &ColumnValue, bound: &ColumnValue) -> Option<Ordering> {
    if value.is_null() || bound.is_null() {
        None
    } else {
        Some(compare_values(value, bound))
    }
}

/// Compile a filter against a column map. Every referenced column must exist.
pub fn functor(column_map: &ColumnMap, filter: &Filter) -> Result<Predicate> {
    let predicate: Predicate = match filter {
        Filter::Equals { column, value } => {
            let slot = column_map.slot(column)?;
            let value = value.clone();
            Box::new(move |row: &[ColumnValue]| values_equal(&row[slot], &value))
        }
        Filter::In { column, values } => {
            let slot = column_map.slot(column)?;
            let values = values.clone();
            Box::new(move |row: &[ColumnValue]| values.iter().any(|v| values_equal(&row[slot], v)))
        }
        Filter::NotIn { column, values } => {
            let slot = column_map.slot(column)?;
            let values = values.clone();
            Box::new(move |row: &[ColumnValue]| !values.iter().any(|v| values_equal(&row[slot], v)))
        }
        Filter::StartsWith { column, value } => {
            let slot = column_map.slot(column)?;
            let prefix = value.to_lowercase();
            Box::new(move |row: &[ColumnValue]| prefix_matches(&row[slot], &prefix))
        }
        Filter::NotStartsWith { column, value } => {
            let slot = column_map.slot(column)?;
            let prefix = value.to_lowercase();
            Box::new(move |row: &[ColumnValue]| !prefix_matches(&row[slot], &prefix))
        }
        Filter::GreaterThan { column, value } => {
            let slot = column_map.slot(column)?;
            let value = value.clone();
            Box::new(move |row: &[ColumnValue]| compare_defined(&row[slot], &value) == Some(Ordering::Greater))
        }
        Filter::GreaterEq { column, value } => {
            let slot = column_map.slot(column)?;
            let value = value.clone();
            Box::new(move |row: &[ColumnValue]| {
                matches!(compare_defined(&row[slot], &value), Some(Ordering::Greater | Ordering::Equal))
            })
        }
        Filter::LessThan { column, value } => {
            let slot = column_map.slot(column)?;
            let value = value.clone();
            Box::new(move |row: &[ColumnValue]| compare_defined(&row[slot], &value) == Some(Ordering::Less))
        }
        Filter::LessEq { column, value } => {
            let slot = column_map.slot(column)?;
            let value = value.clone();
            Box::new(move |row: &[ColumnValue]| {
                matches!(compare_defined(&row[slot], &value), Some(Ordering::Less | Ordering::Equal))
            })
        }
        Filter::And { filters } => {
            let tests = filters
                .iter()
                .map(|f| functor(column_map, f))
                .collect::<Result<Vec<_>>>()?;
            Box::new(move |row: &[ColumnValue]| tests.iter().all(|t| t(row)))
        }
        Filter::Or { filters } => {
            let tests = filters
                .iter()
                .map(|f| functor(column_map, f))
                .collect::<Result<Vec<_>>>()?;
            Box::new(move |row: &[ColumnValue]| tests.iter().any(|t| t(row)))
        }
    };
    Ok(predicate)
}

fn contains_all(outer: &[ColumnValue], inner: &[ColumnValue]) -> bool {
    inner.iter().all(|v| outer.iter().any(|o| values_equal(o, v)))
}

/// Is `candidate` a narrowing of the single-node filter `existing`?
fn narrows(existing: &Filter, candidate: &Filter) -> bool {
    if existing == candidate {
        return true;
    }
    if existing.column().is_none() || existing.column() != candidate.column() {
        return false;
    }
    match (existing, candidate) {
        (Filter::StartsWith { value: old, .. }, Filter::StartsWith { value: new, .. }) => {
            new.to_lowercase().starts_with(&old.to_lowercase())
        }
        (Filter::NotStartsWith { value: old, .. }, Filter::NotStartsWith { value: new, .. }) => {
            old.to_lowercase().starts_with(&new.to_lowercase())
        }
        (Filter::In { values: old, .. }, Filter::In { values: new, .. }) => contains_all(old, new),
        (Filter::In { values: old, .. }, Filter::Equals { value, .. }) => {
            contains_all(old, std::slice::from_ref(value))
        }
        (Filter::NotIn { values: old, .. }, Filter::NotIn { values: new, .. }) => contains_all(new, old),
        (Filter::GreaterThan { value: old, .. }, Filter::GreaterThan { value: new, .. })
        | (Filter::GreaterEq { value: old, .. }, Filter::GreaterEq { value: new, .. })
        | (Filter::GreaterEq { value: old, .. }, Filter::GreaterThan { value: new, .. }) => {
            compare_values(new, old) != Ordering::Less
        }
        (Filter::GreaterThan { value: old, .. }, Filter::GreaterEq { value: new, .. }) => {
            compare_values(new, old) == Ordering::Greater
        }
        (Filter::LessThan { value: old, .. }, Filter::LessThan { value: new, .. })
        | (Filter::LessEq { value: old, .. }, Filter::LessEq { value: new, .. })
        | (Filter::LessEq { value: old, .. }, Filter::LessThan { value: new, .. }) => {
            compare_values(new, old) != Ordering::Greater
        }
        (Filter::LessThan { value: old, .. }, Filter::LessEq { value: new, .. }) => {
            compare_values(new, old) == Ordering::Less
        }
        _ => false,
    }
}

/// True iff every row admitted by `candidate` is also admitted by `existing`,
/// as far as can be shown structurally.
///
/// Each conjunct of `existing` must be narrowed by some conjunct of
/// `candidate`: a longer `STARTS_WITH` prefix, an `IN` subset, a `NOT_IN`
/// superset, a tighter bound, or an additional `AND` term.
pub fn extends_filter(existing: Option<&Filter>, candidate: Option<&Filter>) -> bool {
    match (existing, candidate) {
        (Some(existing), Some(candidate)) => {
            let narrowing = candidate.conjuncts();
            existing
                .conjuncts()
                .into_iter()
                .all(|e| narrowing.iter().any(|c| narrows(e, c)))
        }
        _ => false,
    }
}

/// Does any node of the filter reference `column`?
pub fn includes_column(filter: Option<&Filter>, column: &str) -> bool {
    match filter {
        None => false,
        Some(Filter::And { filters }) | Some(Filter::Or { filters }) => {
            filters.iter().any(|f| includes_column(Some(f), column))
        }
        Some(leaf) => leaf.column() == Some(column),
    }
}

fn only_references(filter: &Filter, column: &str) -> bool {
    match filter {
        Filter::And { filters } | Filter::Or { filters } => {
            filters.iter().all(|f| only_references(f, column))
        }
        leaf => leaf.column() == Some(column),
    }
}

fn combine(mut filters: Vec<Filter>) -> Option<Filter> {
    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(Filter::And { filters }),
    }
}

/// The part of a filter that constrains `column` alone.
pub fn extract_filter_for_column(filter: Option<&Filter>, column: &str) -> Option<Filter> {
    match filter? {
        Filter::And { filters } => combine(
            filters
                .iter()
                .filter_map(|f| extract_filter_for_column(Some(f), column))
                .collect(),
        ),
        other if only_references(other, column) => Some(other.clone()),
        _ => None,
    }
}

/// The filter with every constraint on `column` dropped. An `OR` that
/// mentions the column is dropped as a whole.
pub fn remove_filter_for_column(filter: Option<&Filter>, column: &str) -> Option<Filter> {
    match filter? {
        Filter::And { filters } => combine(
            filters
                .iter()
                .filter_map(|f| remove_filter_for_column(Some(f), column))
                .collect(),
        ),
        other if includes_column(Some(other), column) => None,
        other => Some(other.clone()),
    }
}

/// Combine `filter` into `existing`, replacing whatever `existing` said about
/// the columns `filter` constrains.
pub fn add_filter(existing: Option<&Filter>, filter: Filter) -> Filter {
    let mut rest = existing.cloned();
    for column in filter.columns() {
        rest = remove_filter_for_column(rest.as_ref(), column);
    }
    match rest {
        None => filter,
        Some(Filter::And { mut filters }) => {
            filters.push(filter);
            Filter::And { filters }
        }
        Some(other) => Filter::And {
            filters: vec![other, filter],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::{test_columns, test_table};
    use crate::metadata::build_column_map;

    fn count(filter: &Filter) -> usize {
        let table = test_table();
        let test = functor(table.column_map(), filter).unwrap();
        table.rows().iter().filter(|r| test(r)).count()
    }

    #[test]
    fn test_equals_and_in() {
        assert_eq!(count(&Filter::equals("Qty", 100)), 14);
        assert_eq!(count(&Filter::equals("Price", 5)), 21);
        assert_eq!(count(&Filter::is_in("Group2", vec!["I2", "O2"])), 12);
        assert_eq!(count(&Filter::not_in("Group2", vec!["I2"])), 17);
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        assert_eq!(count(&Filter::is_in("Group1", Vec::<&str>::new())), 0);
        assert_eq!(count(&Filter::not_in("Group1", Vec::<&str>::new())), 24);
    }

    #[test]
    fn test_starts_with_is_case_insensitive() {
        assert_eq!(count(&Filter::starts_with("Group2", "")), 24);
        assert_eq!(count(&Filter::starts_with("Key", "KEY1")), 10);
        assert_eq!(count(&Filter::starts_with("Qty", "10")), 19);
        assert_eq!(count(&Filter::not_starts_with("Group3", "t3")), 4);
    }

    #[test]
    fn test_comparisons_and_combinators() {
        assert_eq!(count(&Filter::greater_than("Qty", 100)), 6);
        assert_eq!(count(&Filter::less_than("Price", 5)), 2);
        assert_eq!(
            count(&Filter::and(vec![Filter::equals("Qty", 100), Filter::equals("Group1", "G1")])),
            3
        );
        assert_eq!(
            count(&Filter::or(vec![Filter::equals("Price", 9), Filter::equals("Price", 1)])),
            2
        );
    }

    #[test]
    fn test_comparisons_skip_nulls() {
        let map = build_column_map(&test_columns());
        let test = functor(&map, &Filter::greater_than("Qty", 0)).unwrap();
        let mut row = vec![ColumnValue::Null; 6];
        assert!(!test(&row));
        row[4] = 1.into();
        assert!(test(&row));
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let map = build_column_map(&test_columns());
        let err = functor(&map, &Filter::and(vec![Filter::equals("Volume", 1)])).err().unwrap();
        assert!(matches!(err, Error::UnknownColumn(c) if c == "Volume"));
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::json!({
            "type": "AND",
            "filters": [
                {"type": "EQ", "colName": "Qty", "value": 100},
                {"type": "STARTS_WITH", "colName": "Key", "value": "key1"},
                {"type": "IN", "colName": "Group1", "values": ["G1"]}
            ]
        });
        let filter = Filter::from_json(&json).unwrap();
        assert_eq!(
            filter,
            Filter::and(vec![
                Filter::equals("Qty", 100),
                Filter::starts_with("Key", "key1"),
                Filter::is_in("Group1", vec!["G1"]),
            ])
        );
        let back = serde_json::to_value(&filter).unwrap();
        assert_eq!(back["filters"][1]["type"], "SW");

        let err = Filter::from_json(&serde_json::json!({"type": "LIKE", "colName": "Key"})).unwrap_err();
        assert!(matches!(err, Error::MalformedFilter(_)));
    }

    #[test]
    fn test_extends_filter() {
        let sw = |v: &str| Filter::starts_with("Key", v);
        assert!(extends_filter(Some(&sw("key")), Some(&sw("key1"))));
        assert!(!extends_filter(Some(&sw("key1")), Some(&sw("key"))));
        assert!(!extends_filter(None, Some(&sw("key"))));
        assert!(!extends_filter(Some(&sw("key")), None));

        let a = Filter::is_in("Group1", vec!["G1", "G2"]);
        assert!(extends_filter(Some(&a), Some(&Filter::is_in("Group1", vec!["G2"]))));
        assert!(!extends_filter(Some(&a), Some(&Filter::is_in("Group1", vec!["G3"]))));
        assert!(!extends_filter(Some(&a), Some(&Filter::is_in("Group2", vec!["G2"]))));

        assert!(extends_filter(
            Some(&Filter::not_in("Group2", vec!["I2"])),
            Some(&Filter::not_in("Group2", vec!["I2", "O2"]))
        ));

        let qty = Filter::equals("Qty", 100);
        let both = Filter::and(vec![qty.clone(), Filter::equals("Price", 5)]);
        assert!(extends_filter(Some(&qty), Some(&both)));
        assert!(!extends_filter(Some(&both), Some(&qty)));
        assert!(extends_filter(Some(&both), Some(&both)));

        assert!(extends_filter(
            Some(&Filter::greater_than("Qty", 90)),
            Some(&Filter::greater_than("Qty", 100))
        ));
        assert!(!extends_filter(
            Some(&Filter::less_than("Qty", 90)),
            Some(&Filter::less_than("Qty", 100))
        ));
    }

    #[test]
    fn test_column_helpers() {
        let filter = Filter::and(vec![
            Filter::equals("Qty", 100),
            Filter::is_in("Group3", vec!["T3"]),
            Filter::not_in("Group3", vec!["T4"]),
        ]);
        assert!(includes_column(Some(&filter), "Group3"));
        assert!(!includes_column(Some(&filter), "Group1"));
        assert!(!includes_column(None, "Group1"));

        assert_eq!(
            extract_filter_for_column(Some(&filter), "Group3"),
            Some(Filter::and(vec![
                Filter::is_in("Group3", vec!["T3"]),
                Filter::not_in("Group3", vec!["T4"]),
            ]))
        );
        assert_eq!(
            extract_filter_for_column(Some(&filter), "Qty"),
            Some(Filter::equals("Qty", 100))
        );
        assert_eq!(extract_filter_for_column(Some(&filter), "Group1"), None);

        assert_eq!(
            remove_filter_for_column(Some(&filter), "Group3"),
            Some(Filter::equals("Qty", 100))
        );
        assert_eq!(remove_filter_for_column(Some(&Filter::equals("Qty", 1)), "Qty"), None);

        let mixed = Filter::or(vec![Filter::equals("Qty", 1), Filter::equals("Price", 1)]);
        assert_eq!(extract_filter_for_column(Some(&mixed), "Qty"), None);
        assert_eq!(remove_filter_for_column(Some(&mixed), "Qty"), None);
        assert_eq!(remove_filter_for_column(Some(&mixed), "Key"), Some(mixed.clone()));
    }

    #[test]
    fn test_columns_listed_once_in_first_seen_order() {
        let filter = Filter::and(vec![
            Filter::equals("Qty", 100),
            Filter::or(vec![Filter::equals("Group1", "G1"), Filter::equals("Qty", 1)]),
            Filter::equals("Qty", 5),
            Filter::starts_with("Group1", "G"),
        ]);
        assert_eq!(filter.columns(), vec!["Qty", "Group1"]);
        assert_eq!(Filter::equals("Price", 1).columns(), vec!["Price"]);
    }

    #[test]
    fn test_with_column() {
        let f = Filter::and(vec![Filter::is_in("Group3", vec!["T3"])]);
        assert_eq!(
            f.with_column("value"),
            Filter::and(vec![Filter::is_in("value", vec!["T3"])])
        );
    }

    #[test]
    fn test_add_filter_replaces_own_column() {
        let qty = Filter::equals("Qty", 100);
        assert_eq!(add_filter(None, qty.clone()), qty);

        let g3 = Filter::is_in("Group3", vec!["T3"]);
        let both = add_filter(Some(&qty), g3.clone());
        assert_eq!(both, Filter::and(vec![qty.clone(), g3]));

        let narrower = Filter::is_in("Group3", vec!["T4"]);
        assert_eq!(
            add_filter(Some(&both), narrower.clone()),
            Filter::and(vec![qty.clone(), narrower])
        );
        assert_eq!(add_filter(Some(&qty), Filter::equals("Qty", 99)), Filter::equals("Qty", 99));
        assert_eq!(count(&add_filter(Some(&qty), Filter::is_in("Group1", vec!["G2"]))), 8);
    }
}

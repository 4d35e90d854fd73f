/// Grouping: aggregate group rows over a sorted leaf sequence.
///
/// Groups are kept in a flat vector in pre-order: each group is followed by
/// its sub-groups. A group at depth 1 (innermost) points into the leaf sort
/// set where its leaves start; a deeper group points at its first child. The
/// outermost level has depth `levels`.

use crate::column::{compare_values, Aggregate, Column, ColumnValue};
use crate::error::{Error, Result};
use crate::filter::Predicate;
use crate::metadata::{Projection, SortColumn};
use crate::sort::SortEntry;
use crate::table::{Row, Table};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A column summarised by group rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregation {
    pub slot: usize,
    pub method: Aggregate,
    /// Sums of integer columns stay integers
    pub integer: bool,
}

/// Columns with an aggregate, other than the group-by columns.
///
/// A view column's own `aggregate` wins over the table definition.
pub fn find_aggregated_columns(columns: &[Column], table: &Table, groupby: &[SortColumn]) -> Result<Vec<Aggregation>> {
    let mut aggregations = Vec::new();
    for column in columns {
        let slot = table.column_map().slot(&column.name)?;
        if groupby.iter().any(|&(s, _)| s == slot) {
            continue;
        }
        let definition = table.column(&column.name)?;
        if let Some(method) = column.aggregate.or(definition.aggregate) {
            let integer = definition.column_type.map(|t| t.is_integer()).unwrap_or(false);
            aggregations.push(Aggregation { slot, method, integer });
        }
    }
    Ok(aggregations)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    /// One value per storage slot: group values up to this level, aggregates, nulls
    pub values: Vec<ColumnValue>,
    /// Group values from the outermost level down to this one
    pub path: Vec<ColumnValue>,
    pub key: String,
    /// 1 for the innermost level, `levels` for the outermost
    pub depth: usize,
    pub expanded: bool,
    pub count: usize,
    pub filter_count: Option<usize>,
    pub parent: Option<usize>,
    /// Depth 1: sort set index of the first leaf. Otherwise: index of the first child group
    pub child_pointer: usize,
    pub next_filter_idx: Option<usize>,
}

impl GroupRow {
    pub(crate) fn open(
        row: &[ColumnValue],
        level: usize,
        groupby: &[SortColumn],
        parent: Option<usize>,
        child_pointer: usize,
    ) -> Self {
        let mut values = vec![ColumnValue::Null; row.len()];
        let path: Vec<ColumnValue> = groupby[..=level]
            .iter()
            .map(|&(slot, _)| row[slot].clone())
            .collect();
        for (&(slot, _), value) in groupby.iter().zip(&path) {
            values[slot] = value.clone();
        }
        GroupRow {
            values,
            key: group_key(&path),
            path,
            depth: groupby.len() - level,
            expanded: false,
            count: 0,
            filter_count: None,
            parent,
            child_pointer,
            next_filter_idx: None,
        }
    }

    /// Zero-based group-by level (0 = outermost).
    pub fn level(&self) -> usize {
        self.path.len() - 1
    }

    /// Leaves this group shows: filtered count when a filter is active.
    pub fn visible_count(&self) -> usize {
        self.filter_count.unwrap_or(self.count)
    }

    /// Signed depth as carried in the DEPTH slot.
    pub fn signed_depth(&self) -> i64 {
        if self.expanded {
            self.depth as i64
        } else {
            -(self.depth as i64)
        }
    }

    /// Group row in the projected wire shape, at absolute position `idx`.
    pub fn project(&self, projection: &Projection, idx: usize) -> Vec<ColumnValue> {
        let mut out = projection.frame(&self.values);
        let m = projection.meta();
        out[m.idx] = idx.into();
        out[m.depth] = self.signed_depth().into();
        out[m.count] = self.count.into();
        out[m.key] = self.key.clone().into();
        out[m.selected] = 0i64.into();
        out[m.parent_idx] = self.parent.into();
        out[m.idx_pointer] = self.child_pointer.into();
        out[m.filter_count] = self.filter_count.into();
        out[m.next_filter_idx] = self.next_filter_idx.into();
        out
    }
}

/// Slash-joined group values.
pub fn group_key(path: &[ColumnValue]) -> String {
    path.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("/")
}

fn aggregate_value(sum: f64, n: usize, a: &Aggregation) -> ColumnValue {
    match a.method {
        Aggregate::Sum if a.integer => ColumnValue::Int64(sum as i64),
        Aggregate::Sum => ColumnValue::Float64(sum),
        Aggregate::Avg if n == 0 => ColumnValue::Null,
        Aggregate::Avg => ColumnValue::Float64(sum / n as f64),
    }
}

/// Aggregate a depth-1 group over its leaves `sort_set[start..end]`.
///
/// With a filter, only passing leaves feed the aggregates; they are appended
/// to `filter_set` and the group records where they start.
fn aggregate_leaves(
    group: &mut GroupRow,
    rows: &[Row],
    leaves: &[SortEntry],
    aggregations: &[Aggregation],
    filter: Option<&Predicate>,
    mut filter_set: Option<&mut Vec<usize>>,
) {
    let mut sums = vec![0.0; aggregations.len()];
    let mut included = 0;
    let start = filter_set.as_ref().map(|set| set.len());

    for &SortEntry { idx, .. } in leaves {
        let row = &rows[idx];
        let passes = filter.map(|test| test(row)).unwrap_or(true);
        if !passes {
            continue;
        }
        included += 1;
        if let Some(set) = filter_set.as_deref_mut() {
            set.push(idx);
        }
        for (sum, a) in sums.iter_mut().zip(aggregations) {
            *sum += row[a.slot].as_f64().unwrap_or(0.0);
        }
    }

    group.count = leaves.len();
    if filter.is_some() {
        group.filter_count = Some(included);
        group.next_filter_idx = if included > 0 { start } else { None };
    }
    for (sum, a) in sums.into_iter().zip(aggregations) {
        group.values[a.slot] = aggregate_value(sum, included, a);
    }
}

/// Aggregate a deeper group over its already aggregated children.
fn aggregate_children(groups: &mut [GroupRow], gi: usize, aggregations: &[Aggregation], filtered: bool) {
    let depth = groups[gi].depth;
    let mut count = 0;
    let mut filter_count = 0;
    let mut next_filter_idx = None;
    let mut sums = vec![0.0; aggregations.len()];
    let mut weights = 0;

    for child in groups[gi + 1..].iter().take_while(|g| g.depth < depth) {
        if child.depth != depth - 1 {
            continue;
        }
        count += child.count;
        let n = child.visible_count();
        filter_count += n;
        if next_filter_idx.is_none() {
            next_filter_idx = child.next_filter_idx;
        }
        weights += n;
        for (sum, a) in sums.iter_mut().zip(aggregations) {
            let value = child.values[a.slot].as_f64().unwrap_or(0.0);
            *sum += match a.method {
                Aggregate::Sum => value,
                Aggregate::Avg => value * n as f64,
            };
        }
    }

    let group = &mut groups[gi];
    group.count = count;
    if filtered {
        group.filter_count = Some(filter_count);
        group.next_filter_idx = next_filter_idx;
    }
    for (sum, a) in sums.into_iter().zip(aggregations) {
        group.values[a.slot] = aggregate_value(sum, weights, a);
    }
}

/// Result of a grouping pass.
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    pub groups: Vec<GroupRow>,
    /// Leaves passing the filter, in sort set order
    pub filter_set: Option<Vec<usize>>,
}

/// Group `sort_set` (ordered by the group-by columns first) in one pass.
///
/// A cursor per level tracks the open group. The first level at which a
/// leaf's value differs from its open group is the change point: every open
/// group from the innermost level up to it is closed and aggregated, then new
/// groups are opened from the change point down to the innermost level.
pub fn group_rows(
    rows: &[Row],
    sort_set: &[SortEntry],
    groupby: &[SortColumn],
    aggregations: &[Aggregation],
    filter: Option<&Predicate>,
) -> Grouping {
    let levels = groupby.len();
    let mut groups: Vec<GroupRow> = Vec::new();
    let mut filter_set = filter.map(|_| Vec::new());
    let mut open: Vec<Option<usize>> = vec![None; levels];

    if levels == 0 {
        return Grouping { groups, filter_set };
    }

    let close = |groups: &mut Vec<GroupRow>, gi: usize, end: usize, filter_set: &mut Option<Vec<usize>>| {
        if groups[gi].depth == 1 {
            let start = groups[gi].child_pointer;
            aggregate_leaves(
                &mut groups[gi],
                rows,
                &sort_set[start..end],
                aggregations,
                filter,
                filter_set.as_mut(),
            );
        } else {
            aggregate_children(groups, gi, aggregations, filter.is_some());
        }
    };

    for (i, entry) in sort_set.iter().enumerate() {
        let row = &rows[entry.idx];
        let change = (0..levels).find(|&level| match open[level] {
            None => true,
            Some(gi) => {
                let slot = groupby[level].0;
                compare_values(&groups[gi].values[slot], &row[slot]) != Ordering::Equal
            }
        });

        if let Some(level) = change {
            for l in (level..levels).rev() {
                if let Some(gi) = open[l] {
                    close(&mut groups, gi, i, &mut filter_set);
                }
            }
            for l in level..levels {
                let parent = if l == 0 { None } else { open[l - 1] };
                let gi = groups.len();
                let child_pointer = if l == levels - 1 { i } else { gi + 1 };
                groups.push(GroupRow::open(row, l, groupby, parent, child_pointer));
                open[l] = Some(gi);
            }
        }
    }

    for l in (0..levels).rev() {
        if let Some(gi) = open[l] {
            close(&mut groups, gi, sort_set.len(), &mut filter_set);
        }
    }

    Grouping { groups, filter_set }
}

/// Compare a group's path with a row, up to and including `level`.
///
/// Ancestors of the target compare Less and descendants Greater, which
/// matches their pre-order placement.
fn compare_group_to_row(group: &GroupRow, row: &[ColumnValue], groupby: &[SortColumn], level: usize) -> Ordering {
    for (i, &(slot, direction)) in groupby.iter().enumerate().take(level + 1) {
        if i >= group.path.len() {
            return Ordering::Less;
        }
        let ord = direction.apply(compare_values(&group.path[i], &row[slot]));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    group.level().cmp(&level)
}

/// Per level, `Ok(group index)` for an existing group that `row` belongs to,
/// or `Err(insertion point)` from the first missing level down.
pub fn find_group_positions(groups: &[GroupRow], groupby: &[SortColumn], row: &[ColumnValue]) -> Vec<std::result::Result<usize, usize>> {
    let mut positions = Vec::with_capacity(groupby.len());
    for level in 0..groupby.len() {
        if let Some(Err(pos)) = positions.last() {
            positions.push(Err(*pos));
            continue;
        }
        let pos = groups.partition_point(|g| compare_group_to_row(g, row, groupby, level) == Ordering::Less);
        match groups.get(pos) {
            Some(g) if compare_group_to_row(g, row, groupby, level) == Ordering::Equal => positions.push(Ok(pos)),
            _ => positions.push(Err(pos)),
        }
    }
    positions
}

/// Fix group-index references after `count` groups were inserted at `from`.
///
/// Parents at or past `from` move up; the first child of a deeper group
/// always follows it directly.
pub fn adjust_group_indices(groups: &mut [GroupRow], from: usize, count: usize) {
    for (i, group) in groups.iter_mut().enumerate() {
        let inserted = i >= from && i < from + count;
        if let Some(parent) = group.parent.as_mut() {
            if !inserted && *parent >= from {
                *parent += count;
            }
        }
        if group.depth > 1 {
            group.child_pointer = i + 1;
        }
    }
}

/// Shift leaf pointers of depth-1 groups at or past `from`, except `skip`.
pub fn adjust_leaf_idx_pointers(groups: &mut [GroupRow], from: usize, skip: usize) {
    for (i, group) in groups.iter_mut().enumerate() {
        if group.depth == 1 && i != skip && group.child_pointer >= from {
            group.child_pointer += 1;
        }
    }
}

/// Shift filter pointers at or past `from`, except for the groups in `skip`.
pub fn adjust_filter_idx_pointers(groups: &mut [GroupRow], from: usize, skip: &[usize]) {
    for (i, group) in groups.iter_mut().enumerate() {
        if skip.contains(&i) {
            continue;
        }
        if let Some(next) = group.next_filter_idx.as_mut() {
            if *next >= from {
                *next += 1;
            }
        }
    }
}

/// Index one past the last group of the subtree rooted at `gi`.
pub fn subtree_end(groups: &[GroupRow], gi: usize) -> usize {
    let depth = groups[gi].depth;
    groups[gi + 1..]
        .iter()
        .position(|g| g.depth >= depth)
        .map(|p| gi + 1 + p)
        .unwrap_or(groups.len())
}

/// Add one leaf's values to a group's aggregates before its counts are bumped.
pub fn accumulate(group: &mut GroupRow, row: &[ColumnValue], aggregations: &[Aggregation]) {
    let n = group.visible_count();
    for a in aggregations {
        let value = row[a.slot].as_f64().unwrap_or(0.0);
        let current = group.values[a.slot].as_f64().unwrap_or(0.0);
        group.values[a.slot] = match a.method {
            Aggregate::Sum => aggregate_value(current + value, n + 1, a),
            Aggregate::Avg => aggregate_value(current * n as f64 + value, n + 1, a),
        };
    }
}

/// Recompute the aggregates of group `gi` from scratch.
pub fn reaggregate(
    groups: &mut [GroupRow],
    gi: usize,
    rows: &[Row],
    sort_set: &[SortEntry],
    aggregations: &[Aggregation],
    filter: Option<&Predicate>,
) {
    if groups[gi].depth == 1 {
        let start = groups[gi].child_pointer;
        let end = start + groups[gi].count;
        let next = groups[gi].next_filter_idx;
        aggregate_leaves(&mut groups[gi], rows, &sort_set[start..end], aggregations, filter, None);
        if filter.is_some() && groups[gi].filter_count != Some(0) {
            groups[gi].next_filter_idx = next;
        }
    } else {
        aggregate_children(groups, gi, aggregations, filter.is_some());
    }
}

/// New group-by columns are the existing ones plus trailing columns.
pub fn groupby_extends_existing_groupby(groupby: &[SortColumn], existing: &[SortColumn]) -> bool {
    groupby.len() > existing.len() && existing.iter().zip(groupby).all(|(a, b)| a.0 == b.0)
}

/// Fewer group-by columns, all taken from the existing ones, same outermost column.
pub fn groupby_reduces_existing_groupby(groupby: &[SortColumn], existing: &[SortColumn]) -> bool {
    !groupby.is_empty()
        && existing.len() > groupby.len()
        && groupby[0].0 == existing[0].0
        && groupby.iter().all(|(slot, _)| existing.iter().any(|(s, _)| s == slot))
}

/// Same columns in the same order, some direction changed.
pub fn groupby_sort_reversed(groupby: &[SortColumn], existing: &[SortColumn]) -> bool {
    groupby.len() == existing.len()
        && groupby.iter().zip(existing).all(|(a, b)| a.0 == b.0)
        && groupby != existing
}

fn leading_int(key: &str) -> Option<i64> {
    let trimmed = key.trim_start();
    let end = trimmed
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    trimmed[..end].parse().ok()
}

/// Order group-state keys: numerically when every key starts with a number,
/// lexicographically otherwise.
pub fn sort_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut keys: Vec<&str> = keys.into_iter().collect();
    if keys.iter().all(|k| leading_int(k).is_some()) {
        keys.sort_by_key(|k| leading_int(k));
    } else {
        keys.sort_unstable();
    }
    keys
}

/// Expand/collapse state: a tree keyed by group value per level.
///
/// A key present at a level means that group is expanded; its subtree holds
/// the state of its sub-groups. `"*"` stands for every value at its level.
/// On the wire it is a JSON object whose values are `true` or nested objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JsonValue", into = "JsonValue")]
pub struct GroupState {
    children: HashMap<String, GroupState>,
}

pub const WILDCARD: &str = "*";

impl GroupState {
    pub fn new() -> Self {
        GroupState::default()
    }

    /// Every top-level group expanded.
    pub fn expand_all() -> Self {
        let mut state = GroupState::new();
        state.expand(&[WILDCARD]);
        state
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Mark the group at `path` (and its ancestors) expanded.
    pub fn expand(&mut self, path: &[&str]) {
        let mut node = self;
        for key in path {
            node = node.children.entry(key.to_string()).or_default();
        }
    }

    /// Collapse the group at `path`, forgetting the state below it.
    pub fn collapse(&mut self, path: &[&str]) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };
        let mut node = self;
        for key in parents {
            match node.children.get_mut(*key) {
                Some(child) => node = child,
                None => return,
            }
        }
        node.children.remove(*last);
    }

    /// Is the group whose values by level are `path` expanded?
    pub fn is_expanded(&self, path: &[ColumnValue]) -> bool {
        let mut node = self;
        for value in path {
            let key = value.to_string();
            match node.children.get(&key).or_else(|| node.children.get(WILDCARD)) {
                Some(child) => node = child,
                None => return false,
            }
        }
        !path.is_empty()
    }

    /// Drop every level at or below `depth` levels.
    pub fn truncate(&mut self, depth: usize) {
        if depth == 0 {
            self.children.clear();
        } else {
            self.children.values_mut().for_each(|c| c.truncate(depth - 1));
        }
    }

    /// Keys of this level in traversal order.
    pub fn keys(&self) -> Vec<&str> {
        sort_keys(self.children.keys().map(String::as_str))
    }

    pub fn from_json(value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::Null => Ok(GroupState::new()),
            JsonValue::Object(map) => {
                let mut children = HashMap::new();
                for (key, value) in map {
                    match value {
                        JsonValue::Bool(true) => {
                            children.insert(key.clone(), GroupState::new());
                        }
                        JsonValue::Bool(false) | JsonValue::Null => {}
                        JsonValue::Object(_) => {
                            children.insert(key.clone(), GroupState::from_json(value)?);
                        }
                        other => {
                            return Err(Error::MalformedGroupState(format!(
                                "value for '{}' must be true or an object, got {}",
                                key, other
                            )))
                        }
                    }
                }
                Ok(GroupState { children })
            }
            other => Err(Error::MalformedGroupState(format!("expected an object, got {}", other))),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        for key in self.keys() {
            let child = &self.children[key];
            let value = if child.is_empty() {
                JsonValue::Bool(true)
            } else {
                child.to_json()
            };
            map.insert(key.to_string(), value);
        }
        JsonValue::Object(map)
    }
}

impl TryFrom<JsonValue> for GroupState {
    type Error = Error;

    fn try_from(value: JsonValue) -> Result<Self> {
        GroupState::from_json(&value)
    }
}

impl From<GroupState> for JsonValue {
    fn from(state: GroupState) -> Self {
        state.to_json()
    }
}

/// A group whose expansion differs between two states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStateChange {
    pub key: String,
    pub level: usize,
    pub expanded: bool,
}

/// Groups expanded or collapsed going from `old` to `new`, ordered by key.
pub fn get_group_state_changes(new: &GroupState, old: &GroupState) -> Vec<GroupStateChange> {
    let mut changes = Vec::new();
    collect_changes(new, Some(old), "", 0, &mut changes);
    changes.sort_by(|a, b| a.key.cmp(&b.key));
    changes
}

fn collect_changes(new: &GroupState, old: Option<&GroupState>, base: &str, level: usize, out: &mut Vec<GroupStateChange>) {
    for key in new.keys() {
        let path = format!("{}{}", base, key);
        let child = &new.children[key];
        let previous = old.and_then(|o| o.children.get(key));
        if previous.is_none() {
            out.push(GroupStateChange {
                key: path.clone(),
                level,
                expanded: true,
            });
        }
        collect_changes(child, previous, &format!("{}/", path), level + 1, out);
    }
    if let Some(old) = old {
        for key in old.keys() {
            if !new.children.contains_key(key) {
                out.push(GroupStateChange {
                    key: format!("{}{}", base, key),
                    level,
                    expanded: false,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SortDirection::{Asc, Dsc};
    use crate::sort::sort;
    use crate::test_data::{test_columns, test_table};

    fn sorted(table: &Table, cols: &[SortColumn]) -> Vec<SortEntry> {
        let mut set: Vec<SortEntry> = (0..table.len()).map(SortEntry::new).collect();
        sort(&mut set, table.rows(), cols);
        set
    }

    fn aggregations(table: &Table, groupby: &[SortColumn]) -> Vec<Aggregation> {
        find_aggregated_columns(&test_columns(), table, groupby).unwrap()
    }

    #[test]
    fn test_single_level_grouping() {
        let table = test_table();
        let groupby = vec![(1, Asc)];
        let set = sorted(&table, &groupby);
        let grouping = group_rows(table.rows(), &set, &groupby, &aggregations(&table, &groupby), None);

        let groups = &grouping.groups;
        assert_eq!(groups.len(), 3);
        assert_eq!(groups.iter().map(|g| g.count).collect::<Vec<_>>(), vec![8, 8, 8]);
        assert!(groups.iter().all(|g| g.signed_depth() == -1));
        assert_eq!(groups[1].key, "G2");
        assert_eq!(groups.iter().map(|g| g.child_pointer).collect::<Vec<_>>(), vec![0, 8, 16]);
        // Qty sums, Price averages
        assert_eq!(groups[0].values[4], ColumnValue::Int64(749));
        assert_eq!(groups[1].values[4], ColumnValue::Int64(800));
        assert_eq!(groups[0].values[5], ColumnValue::Float64(39.0 / 8.0));
        assert!(grouping.filter_set.is_none());
    }

    #[test]
    fn test_two_level_grouping() {
        let table = test_table();
        let groupby = vec![(1, Asc), (2, Asc)];
        let set = sorted(&table, &groupby);
        let grouping = group_rows(table.rows(), &set, &groupby, &aggregations(&table, &groupby), None);
        let groups = &grouping.groups;

        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["G1", "G1/I2", "G1/U2", "G2", "G2/I2", "G2/O2", "G2/U2", "G3", "G3/A2", "G3/E2", "G3/I2", "G3/O2"]
        );
        assert_eq!(groups[0].depth, 2);
        assert_eq!(groups[1].depth, 1);
        assert_eq!(groups[0].child_pointer, 1);
        assert_eq!(groups[2].parent, Some(0));
        assert_eq!(groups[2].child_pointer, 4);
        assert_eq!(groups[7].count, 8);
        assert_eq!(groups[8].count, 2);
        // outer average weighs child averages by count
        assert_eq!(groups[0].values[5], ColumnValue::Float64(39.0 / 8.0));
    }

    #[test]
    fn test_descending_grouping() {
        let table = test_table();
        let groupby = vec![(1, Dsc)];
        let set = sorted(&table, &groupby);
        let grouping = group_rows(table.rows(), &set, &groupby, &[], None);
        let keys: Vec<&str> = grouping.groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["G3", "G2", "G1"]);
    }

    #[test]
    fn test_filtered_grouping() {
        let table = test_table();
        let groupby = vec![(1, Asc)];
        let set = sorted(&table, &groupby);
        let filter = crate::filter::functor(table.column_map(), &crate::filter::Filter::equals("Qty", 100)).unwrap();
        let grouping = group_rows(table.rows(), &set, &groupby, &aggregations(&table, &groupby), Some(&filter));
        let groups = &grouping.groups;

        assert_eq!(groups.iter().map(|g| g.count).collect::<Vec<_>>(), vec![8, 8, 8]);
        assert_eq!(
            groups.iter().map(|g| g.filter_count).collect::<Vec<_>>(),
            vec![Some(3), Some(8), Some(3)]
        );
        assert_eq!(
            groups.iter().map(|g| g.next_filter_idx).collect::<Vec<_>>(),
            vec![Some(0), Some(3), Some(11)]
        );
        assert_eq!(grouping.filter_set.as_ref().map(|s| s.len()), Some(14));
        assert_eq!(groups[0].values[4], ColumnValue::Int64(300));
    }

    #[test]
    fn test_find_group_positions() {
        let table = test_table();
        let groupby = vec![(1, Asc), (2, Asc)];
        let set = sorted(&table, &groupby);
        let groups = group_rows(table.rows(), &set, &groupby, &[], None).groups;

        let row = crate::test_data::row("x", "G2", "O2", "T3", 1, 1.0);
        assert_eq!(find_group_positions(&groups, &groupby, &row), vec![Ok(3), Ok(5)]);

        let row = crate::test_data::row("x", "G2", "P2", "T3", 1, 1.0);
        assert_eq!(find_group_positions(&groups, &groupby, &row), vec![Ok(3), Err(6)]);

        let row = crate::test_data::row("x", "G0", "A2", "T3", 1, 1.0);
        assert_eq!(find_group_positions(&groups, &groupby, &row), vec![Err(0), Err(0)]);

        let row = crate::test_data::row("x", "G4", "A2", "T3", 1, 1.0);
        assert_eq!(find_group_positions(&groups, &groupby, &row), vec![Err(12), Err(12)]);
    }

    #[test]
    fn test_group_state() {
        let state = GroupState::from_json(&serde_json::json!({
            "G1": true,
            "G2": {"O2": true},
            "G3": false
        }))
        .unwrap();
        assert!(state.is_expanded(&["G1".into()]));
        assert!(!state.is_expanded(&["G1".into(), "U2".into()]));
        assert!(state.is_expanded(&["G2".into(), "O2".into()]));
        assert!(!state.is_expanded(&["G3".into()]));
        assert!(!state.is_expanded(&[]));

        let all = GroupState::expand_all();
        assert!(all.is_expanded(&["anything".into()]));
        assert!(!all.is_expanded(&["anything".into(), "deeper".into()]));

        let err = GroupState::from_json(&serde_json::json!({"G1": 1})).unwrap_err();
        assert!(matches!(err, Error::MalformedGroupState(_)));
        assert!(GroupState::from_json(&serde_json::json!([1])).is_err());

        assert_eq!(state.to_json(), serde_json::json!({"G1": true, "G2": {"O2": true}}));
    }

    #[test]
    fn test_group_state_edit_and_truncate() {
        let mut state = GroupState::new();
        state.expand(&["G2", "O2"]);
        assert!(state.is_expanded(&["G2".into()]));
        state.truncate(1);
        assert!(state.is_expanded(&["G2".into()]));
        assert!(!state.is_expanded(&["G2".into(), "O2".into()]));
        state.collapse(&["G2"]);
        assert!(state.is_empty());
    }

    #[test]
    fn test_sort_keys_rule() {
        assert_eq!(sort_keys(vec!["10", "9", "100"]), vec!["9", "10", "100"]);
        assert_eq!(sort_keys(vec!["b", "10", "9"]), vec!["10", "9", "b"]);
        assert_eq!(sort_keys(vec!["2007 Q1", "199 Q4"]), vec!["199 Q4", "2007 Q1"]);
    }

    #[test]
    fn test_group_state_changes() {
        let old = GroupState::from_json(&serde_json::json!({"G1": true, "G2": {"O2": true}})).unwrap();
        let new = GroupState::from_json(&serde_json::json!({"G2": true, "G3": {"A2": true}})).unwrap();
        let changes = get_group_state_changes(&new, &old);
        assert_eq!(
            changes,
            vec![
                GroupStateChange { key: "G1".into(), level: 0, expanded: false },
                GroupStateChange { key: "G2/O2".into(), level: 1, expanded: false },
                GroupStateChange { key: "G3".into(), level: 0, expanded: true },
                GroupStateChange { key: "G3/A2".into(), level: 1, expanded: true },
            ]
        );
    }

    #[test]
    fn test_groupby_relations() {
        let g1 = vec![(1, Asc)];
        let g12 = vec![(1, Asc), (2, Asc)];
        let g13 = vec![(1, Asc), (3, Asc)];
        let g123 = vec![(1, Asc), (2, Asc), (3, Asc)];
        assert!(groupby_extends_existing_groupby(&g12, &g1));
        assert!(!groupby_extends_existing_groupby(&g1, &g12));
        assert!(groupby_reduces_existing_groupby(&g1, &g12));
        assert!(groupby_reduces_existing_groupby(&g13, &g123));
        assert!(!groupby_reduces_existing_groupby(&[(2, Asc)], &g12));
        assert!(groupby_sort_reversed(&[(1, Dsc), (2, Asc)], &g12));
        assert!(!groupby_sort_reversed(&g12, &g12));
    }

    #[test]
    fn test_project_group_row() {
        let table = test_table();
        let groupby = vec![(1, Asc)];
        let set = sorted(&table, &groupby);
        let groups = group_rows(table.rows(), &set, &groupby, &aggregations(&table, &groupby), None).groups;
        let projection = Projection::new(&test_columns(), table.column_map()).unwrap();
        let row = groups[2].project(&projection, 102);
        let m = projection.meta();
        assert_eq!(row[1], ColumnValue::from("G3"));
        assert_eq!(row[0], ColumnValue::Null);
        assert_eq!(row[m.idx], ColumnValue::Int64(102));
        assert_eq!(row[m.depth], ColumnValue::Int64(-1));
        assert_eq!(row[m.count], ColumnValue::Int64(8));
        assert_eq!(row[m.key], ColumnValue::from("G3"));
        assert_eq!(row[m.idx_pointer], ColumnValue::Int64(16));
        assert_eq!(row[m.parent_idx], ColumnValue::Null);
    }
}

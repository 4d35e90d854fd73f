/// Grouped row sets.
///
/// A `GroupRowSet` orders every leaf by the group-by columns followed by the
/// leaf sort, groups that sequence, and materializes the visible sequence:
/// group rows whose ancestors are all expanded, plus the leaves of expanded
/// innermost groups.

use crate::column::{Column, ColumnValue};
use crate::error::Result;
use crate::filter::{functor, includes_column, Filter, Predicate};
use crate::group::{
    accumulate, adjust_filter_idx_pointers, adjust_group_indices, adjust_leaf_idx_pointers,
    find_aggregated_columns, find_group_positions, get_group_state_changes, group_rows,
    groupby_extends_existing_groupby, groupby_reduces_existing_groupby, groupby_sort_reversed, reaggregate,
    subtree_end, Aggregation, GroupRow, GroupState,
};
use crate::metadata::{ColumnMap, Projection, SortColumn};
use crate::range::{get_delta_range, Range, NULL_RANGE};
use crate::rowset::{InsertResult, RowData, RowUpdate, Selection};
use crate::sort::{compare_keys, sort, sort_extend, sort_position, InsertPolicy, SortEntry, SortSet};
use crate::table::{Row, Table};
use log::debug;

/// One displayed row of a grouped view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibleRow {
    /// Index into the group list
    Group(usize),
    /// Storage index of a leaf
    Leaf(usize),
}

pub struct GroupRowSet {
    projection: Projection,
    column_map: ColumnMap,
    columns: Vec<Column>,
    key_slot: usize,
    offset: usize,
    range: Range,
    groupby: Vec<SortColumn>,
    /// Leaf order inside innermost groups
    sort: Vec<SortColumn>,
    aggregations: Vec<Aggregation>,
    sort_set: SortSet,
    filter: Option<Filter>,
    predicate: Option<Predicate>,
    filter_set: Option<Vec<usize>>,
    groups: Vec<GroupRow>,
    group_state: GroupState,
    visible: Vec<VisibleRow>,
    selection: Selection,
}

impl GroupRowSet {
    pub fn new(
        table: &Table,
        columns: &[Column],
        groupby: Vec<SortColumn>,
        offset: usize,
        filter: Option<Filter>,
        sort: Vec<SortColumn>,
    ) -> Result<Self> {
        let predicate = filter.as_ref().map(|f| functor(table.column_map(), f)).transpose()?;
        let sort = leaf_sort(sort, &groupby);
        let mut rowset = GroupRowSet {
            projection: Projection::new(columns, table.column_map())?,
            column_map: table.column_map().clone(),
            columns: columns.to_vec(),
            key_slot: table.primary_key_slot(),
            offset,
            range: NULL_RANGE,
            aggregations: find_aggregated_columns(columns, table, &groupby)?,
            groupby,
            sort,
            sort_set: (0..table.len()).map(SortEntry::new).collect(),
            filter,
            predicate,
            filter_set: None,
            groups: Vec::new(),
            group_state: GroupState::new(),
            visible: Vec::new(),
            selection: Selection::default(),
        };
        rowset.sort_all(table.rows());
        rowset.regroup(table.rows());
        Ok(rowset)
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn size(&self) -> usize {
        self.visible.len()
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn groupby(&self) -> &[SortColumn] {
        &self.groupby
    }

    pub fn groups(&self) -> &[GroupRow] {
        &self.groups
    }

    pub fn group_state(&self) -> &GroupState {
        &self.group_state
    }

    pub fn current_filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Leaf sort columns (group-by columns excluded).
    pub fn sort_columns(&self) -> &[SortColumn] {
        &self.sort
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn visible(&self) -> &[VisibleRow] {
        &self.visible
    }

    fn sort_cols(&self) -> Vec<SortColumn> {
        self.groupby.iter().chain(&self.sort).copied().collect()
    }

    fn sort_all(&mut self, rows: &[Row]) {
        let cols = self.sort_cols();
        sort(&mut self.sort_set, rows, &cols);
    }

    fn apply_group_state(&mut self) {
        for group in self.groups.iter_mut() {
            group.expanded = self.group_state.is_expanded(&group.path);
        }
    }

    fn rebuild_visible(&mut self) {
        let filtered = self.filter_set.is_some();
        let mut visible = Vec::new();
        let mut i = 0;
        while i < self.groups.len() {
            let group = &self.groups[i];
            if filtered && group.filter_count == Some(0) {
                i = subtree_end(&self.groups, i);
                continue;
            }
            visible.push(VisibleRow::Group(i));
            if !group.expanded {
                i = subtree_end(&self.groups, i);
                continue;
            }
            if group.depth == 1 {
                match (&self.filter_set, group.next_filter_idx, group.filter_count) {
                    (Some(set), Some(start), Some(n)) => {
                        visible.extend(set[start..start + n].iter().map(|&idx| VisibleRow::Leaf(idx)))
                    }
                    (Some(_), _, _) => {}
                    (None, _, _) => {
                        let start = group.child_pointer;
                        visible.extend(
                            self.sort_set[start..start + group.count]
                                .iter()
                                .map(|e| VisibleRow::Leaf(e.idx)),
                        )
                    }
                }
            }
            i += 1;
        }
        self.visible = visible;
    }

    fn regroup(&mut self, rows: &[Row]) {
        let grouping = group_rows(
            rows,
            &self.sort_set,
            &self.groupby,
            &self.aggregations,
            self.predicate.as_ref(),
        );
        self.groups = grouping.groups;
        self.filter_set = grouping.filter_set;
        self.apply_group_state();
        self.rebuild_visible();
        debug!(
            "grouped {} rows by {:?}: {} groups, {} visible",
            self.sort_set.len(),
            self.groupby,
            self.groups.len(),
            self.visible.len()
        );
    }

    fn project(&self, rows: &[Row], pos: usize) -> Option<Row> {
        let idx = pos + self.offset;
        match *self.visible.get(pos)? {
            VisibleRow::Group(gi) => Some(self.groups[gi].project(&self.projection, idx)),
            VisibleRow::Leaf(leaf) => {
                let row = &rows[leaf];
                Some(self.projection.leaf(
                    row,
                    idx,
                    row[self.key_slot].clone(),
                    self.selection.contains(leaf),
                ))
            }
        }
    }

    pub fn slice(&self, rows: &[Row], lo: usize, hi: usize) -> Vec<Row> {
        (lo..hi.min(self.size())).filter_map(|pos| self.project(rows, pos)).collect()
    }

    pub fn set_range(&mut self, rows: &[Row], range: Range, use_delta: bool) -> RowData {
        let window = if use_delta {
            get_delta_range(&self.range, &range)
        } else {
            range.full()
        };
        self.range = range;
        RowData {
            rows: self.slice(rows, window.lo, window.hi),
            range,
            size: self.size(),
            offset: self.offset,
            stats: None,
        }
    }

    pub fn current_range(&self, rows: &[Row]) -> RowData {
        let window = self.range.full();
        RowData {
            rows: self.slice(rows, window.lo, window.hi),
            range: self.range,
            size: self.size(),
            offset: self.offset,
            stats: None,
        }
    }

    /// Change the group-by columns, reusing the current order when the new
    /// columns extend or reduce the existing ones.
    pub fn group_by(&mut self, table: &Table, groupby: Vec<SortColumn>) -> Result<()> {
        let rows = table.rows();
        self.aggregations = find_aggregated_columns(&self.columns, table, &groupby)?;
        let existing = std::mem::replace(&mut self.groupby, groupby);
        self.sort = leaf_sort(std::mem::take(&mut self.sort), &self.groupby);
        let cols = self.sort_cols();
        let groupby = &self.groupby;

        let same_prefix = |short: &[SortColumn], long: &[SortColumn]| long[..short.len()] == *short;
        if groupby_extends_existing_groupby(groupby, &existing) && same_prefix(&existing, groupby) {
            debug!("group by extends {:?}", existing);
            sort_extend(&mut self.sort_set, rows, &existing, &cols);
        } else if groupby_reduces_existing_groupby(groupby, &existing) && same_prefix(groupby, &existing) {
            debug!("group by reduces {:?}", existing);
            sort_extend(&mut self.sort_set, rows, groupby, &cols);
            self.group_state.truncate(groupby.len());
        } else {
            sort(&mut self.sort_set, rows, &cols);
            if groupby_reduces_existing_groupby(groupby, &existing) {
                self.group_state.truncate(1);
            } else if !groupby_sort_reversed(groupby, &existing) {
                self.group_state = GroupState::new();
            }
        }
        self.regroup(rows);
        Ok(())
    }

    /// Sort: criteria on group-by columns set the group direction, the rest
    /// order leaves inside their groups.
    pub fn sort(&mut self, rows: &[Row], cols: Vec<SortColumn>) {
        let mut leaf = Vec::new();
        for (slot, direction) in cols {
            match self.groupby.iter_mut().find(|(s, _)| *s == slot) {
                Some(group) => group.1 = direction,
                None => leaf.push((slot, direction)),
            }
        }
        self.sort = leaf;
        self.sort_all(rows);
        self.regroup(rows);
    }

    pub fn filter(&mut self, rows: &[Row], filter: Filter) -> Result<()> {
        self.predicate = Some(functor(&self.column_map, &filter)?);
        self.filter = Some(filter);
        self.regroup(rows);
        Ok(())
    }

    pub fn clear_filter(&mut self, rows: &[Row]) {
        self.filter = None;
        self.predicate = None;
        self.regroup(rows);
    }

    /// Replace the expand/collapse state. Returns false when nothing changed.
    pub fn set_group_state(&mut self, state: GroupState) -> bool {
        let changes = get_group_state_changes(&state, &self.group_state);
        if changes.is_empty() {
            return false;
        }
        debug!("group state: {} changes", changes.len());
        self.group_state = state;
        self.apply_group_state();
        self.rebuild_visible();
        true
    }

    /// Rebuild from scratch after values the grouping depends on moved.
    pub fn refresh(&mut self, rows: &[Row]) {
        self.sort_all(rows);
        self.regroup(rows);
    }

    /// Do group-by or leaf order depend on storage slot `slot`?
    pub fn depends_on(&self, slot: usize) -> bool {
        self.groupby.iter().chain(&self.sort).any(|&(s, _)| s == slot)
    }

    pub fn filters_on(&self, column: &str) -> bool {
        includes_column(self.filter.as_ref(), column)
    }

    fn is_aggregated(&self, slot: usize) -> bool {
        self.aggregations.iter().any(|a| a.slot == slot)
    }

    /// Visible position of a group or leaf.
    fn position_of(&self, row: VisibleRow) -> Option<usize> {
        self.visible.iter().position(|&v| v == row)
    }

    /// COUNT and aggregate cells of visible group rows inside the window.
    fn group_updates(&self, path: &[usize]) -> Vec<RowUpdate> {
        let window = self.range.full();
        let m = self.projection.meta();
        path.iter()
            .filter_map(|&gi| {
                let pos = self.position_of(VisibleRow::Group(gi))?;
                if !window.contains(pos) {
                    return None;
                }
                let group = &self.groups[gi];
                let mut changes = vec![(m.count, ColumnValue::from(group.count))];
                if group.filter_count.is_some() {
                    changes.push((m.filter_count, group.filter_count.into()));
                }
                for a in &self.aggregations {
                    if let Some(column) = self.projection.position_of(a.slot) {
                        changes.push((column, group.values[a.slot].clone()));
                    }
                }
                Some(RowUpdate::new(pos + self.offset, changes))
            })
            .collect()
    }

    fn filter_insert_point(&self, gi: usize, rows: &[Row], idx: usize) -> usize {
        let group = &self.groups[gi];
        let cols = self.sort_cols();
        let Some(set) = &self.filter_set else {
            return 0;
        };
        if let (Some(start), Some(n)) = (group.next_filter_idx, group.filter_count) {
            let leaves = &set[start..start + n];
            let key = SortEntry::keyed(idx, &rows[idx], &cols);
            let entries: Vec<SortEntry> = leaves.iter().map(|&i| SortEntry::keyed(i, &rows[i], &cols)).collect();
            return start
                + sort_position(&entries, &key, |a, b| compare_keys(&a.keys, &b.keys, &cols), InsertPolicy::LastAvailable);
        }
        self.groups[gi + 1..]
            .iter()
            .filter(|g| g.depth == 1)
            .find_map(|g| g.next_filter_idx)
            .unwrap_or(set.len())
    }

    /// Take a row just appended to the table at storage index `idx`.
    ///
    /// Counts and aggregates of the leaf's groups are bumped in place; new
    /// groups are created when the leaf opens one.
    pub fn insert(&mut self, rows: &[Row], idx: usize) -> Option<InsertResult> {
        let row = &rows[idx];
        let passes = self.predicate.as_ref().map(|test| test(row)).unwrap_or(true);
        let cols = self.sort_cols();
        let entry = SortEntry::keyed(idx, row, &cols);
        let sort_pos = sort_position(
            &self.sort_set,
            &entry,
            |a, b| compare_keys(&a.keys, &b.keys, &cols),
            InsertPolicy::LastAvailable,
        );
        self.sort_set.insert(sort_pos, entry);

        let levels = self.groupby.len();
        let positions = find_group_positions(&self.groups, &self.groupby, row);
        let mut path: Vec<usize> = positions.iter().filter_map(|p| p.ok()).collect();
        if let Some(&Err(at)) = positions.iter().find(|p| p.is_err()) {
            let first = path.len();
            let filtered = self.filter_set.is_some();
            for level in first..levels {
                let parent = match level {
                    0 => None,
                    l if l == first => path.last().copied(),
                    l => Some(at + l - first - 1),
                };
                let child_pointer = if level == levels - 1 {
                    sort_pos
                } else {
                    at + level - first + 1
                };
                let mut group = GroupRow::open(row, level, &self.groupby, parent, child_pointer);
                group.expanded = self.group_state.is_expanded(&group.path);
                if filtered {
                    group.filter_count = Some(0);
                }
                self.groups.insert(at + level - first, group);
            }
            adjust_group_indices(&mut self.groups, at, levels - first);
            path.extend(at..at + levels - first);
        }

        let leaf_group = *path.last()?;
        adjust_leaf_idx_pointers(&mut self.groups, sort_pos, leaf_group);

        if passes {
            if self.filter_set.is_some() {
                let fpos = self.filter_insert_point(leaf_group, rows, idx);
                if let Some(set) = self.filter_set.as_mut() {
                    set.insert(fpos, idx);
                }
                adjust_filter_idx_pointers(&mut self.groups, fpos, &path);
                for &gi in &path {
                    let group = &mut self.groups[gi];
                    group.next_filter_idx = Some(group.next_filter_idx.map_or(fpos, |n| n.min(fpos)));
                }
            }
            for &gi in &path {
                accumulate(&mut self.groups[gi], row, &self.aggregations);
            }
        }
        for &gi in &path {
            let group = &mut self.groups[gi];
            group.count += 1;
            if passes {
                if let Some(n) = group.filter_count.as_mut() {
                    *n += 1;
                }
            }
        }

        let before = self.visible.len();
        self.rebuild_visible();
        let added = self.visible.len() - before;
        let size = self.size();

        if added == 0 {
            return Some(InsertResult {
                size,
                updates: self.group_updates(&path),
                ..Default::default()
            });
        }
        let first_new = path
            .iter()
            .map(|&gi| VisibleRow::Group(gi))
            .chain(std::iter::once(VisibleRow::Leaf(idx)))
            .filter_map(|row| self.position_of(row))
            .find(|&pos| {
                // an existing visible group keeps its place; new rows follow it
                !matches!(self.visible[pos], VisibleRow::Group(gi) if self.groups[gi].count > 1)
            })
            .unwrap_or(size);

        let result = if first_new >= self.range.hi {
            InsertResult {
                size,
                updates: self.group_updates(&path),
                ..Default::default()
            }
        } else if first_new >= self.range.lo || self.offset < added {
            InsertResult {
                size,
                replace: true,
                ..Default::default()
            }
        } else {
            self.offset -= added;
            InsertResult {
                size,
                offset: Some(self.offset),
                updates: self.group_updates(&path),
                ..Default::default()
            }
        };
        Some(result)
    }

    /// Positioned deltas for a changed leaf: the leaf itself when visible in
    /// the window, and its groups when an aggregated column changed.
    pub fn update(&mut self, rows: &[Row], idx: usize, changes: &[(usize, ColumnValue)]) -> Vec<RowUpdate> {
        let mut updates = Vec::new();
        let window = self.range.full();
        if let Some(pos) = self.position_of(VisibleRow::Leaf(idx)).filter(|&p| window.contains(p)) {
            let projected: Vec<(usize, ColumnValue)> = changes
                .iter()
                .filter_map(|(slot, value)| Some((self.projection.position_of(*slot)?, value.clone())))
                .collect();
            if !projected.is_empty() {
                updates.push(RowUpdate::new(pos + self.offset, projected));
            }
        }

        if changes.iter().any(|(slot, _)| self.is_aggregated(*slot)) {
            let path: Vec<usize> = find_group_positions(&self.groups, &self.groupby, &rows[idx])
                .into_iter()
                .filter_map(|p| p.ok())
                .collect();
            for &gi in path.iter().rev() {
                reaggregate(
                    &mut self.groups,
                    gi,
                    rows,
                    &self.sort_set,
                    &self.aggregations,
                    self.predicate.as_ref(),
                );
            }
            updates.extend(self.group_updates(&path));
        }
        updates
    }

    fn selection_updates(&self, changed: &[usize]) -> Vec<RowUpdate> {
        let window = self.range.full();
        let selected = self.projection.meta().selected;
        changed
            .iter()
            .filter_map(|&idx| {
                let pos = self.position_of(VisibleRow::Leaf(idx)).filter(|&p| window.contains(p))?;
                let value = self.selection.contains(idx) as i64;
                Some(RowUpdate::new(pos + self.offset, vec![(selected, value.into())]))
            })
            .collect()
    }

    /// Select the leaf at visible position `pos`; group rows are not selectable.
    pub fn select(&mut self, pos: usize, range_select: bool, keep_existing: bool) -> Vec<RowUpdate> {
        let Some(VisibleRow::Leaf(idx)) = self.visible.get(pos).copied() else {
            return Vec::new();
        };
        let visible = &self.visible;
        let changed = self.selection.select(pos, idx, range_select, keep_existing, |lo, hi| {
            visible
                .iter()
                .skip(lo)
                .take(hi + 1 - lo)
                .filter_map(|v| match v {
                    VisibleRow::Leaf(idx) => Some(*idx),
                    VisibleRow::Group(_) => None,
                })
                .collect()
        });
        self.selection_updates(&changed)
    }

    /// Select every visible leaf (`true`) or none.
    pub fn select_all(&mut self, all: bool) -> Vec<RowUpdate> {
        let leaves: Vec<usize> = if all {
            self.visible
                .iter()
                .filter_map(|v| match v {
                    VisibleRow::Leaf(idx) => Some(*idx),
                    VisibleRow::Group(_) => None,
                })
                .collect()
        } else {
            Vec::new()
        };
        let changed = self.selection.set(leaves);
        self.selection_updates(&changed)
    }

    /// Every leaf in grouped order (group-by columns, then leaf sort).
    pub fn leaf_indices(&self) -> Vec<usize> {
        match &self.filter_set {
            Some(set) => set.clone(),
            None => self.sort_set.iter().map(|e| e.idx).collect(),
        }
    }
}

/// Leaf sort criteria minus the group-by columns.
fn leaf_sort(sort: Vec<SortColumn>, groupby: &[SortColumn]) -> Vec<SortColumn> {
    sort.into_iter()
        .filter(|(slot, _)| !groupby.iter().any(|(g, _)| g == slot))
        .collect()
}

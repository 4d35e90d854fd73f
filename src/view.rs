/// LiveGrid View Implementation
///
/// A `DataView` is what a subscription talks to. It owns the view's columns,
/// the row set for the current mode (flat, or grouped when group-by columns
/// are set), the filter picker for one column, and the deltas produced by
/// table changes until they are collected.
///
/// Table rows are never copied into a view. Every operation borrows the
/// table, so one table can back any number of views.

use crate::changeset::{IncrementalView, TableChange};
use crate::column::{Column, ColumnValue};
use crate::error::{Error, Result};
use crate::filter::{add_filter, Filter};
use crate::group::GroupState;
use crate::group_rowset::GroupRowSet;
use crate::metadata::{map_sort_criteria, metadata, Meta, SortCriterion};
use crate::range::{Range, NULL_RANGE};
use crate::rowset::{FilterRowSet, InsertResult, RowData, RowSet, RowUpdate, DEFAULT_OFFSET};
use crate::table::{Row, Table};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Which row set a range or filter request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    #[default]
    RowData,
    FilterData,
}

/// Initial configuration of a view.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ViewOptions {
    /// Projected columns; every table column when empty.
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub sort_criteria: Vec<SortCriterion>,
    #[serde(default)]
    pub group_by: Vec<SortCriterion>,
    #[serde(default)]
    pub filter: Option<Filter>,
}

/// A delta waiting to be collected.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    /// Changed cells of displayed rows
    Update(Vec<RowUpdate>),
    /// The whole current window, replacing what the client holds
    Rowset(RowData),
    /// Rows were added outside the window
    Size { size: usize, offset: usize },
}

enum Rows {
    Flat(RowSet),
    Grouped(GroupRowSet),
}

pub struct DataView {
    columns: Vec<Column>,
    meta: Meta,
    rows: Rows,
    filter_rowset: Option<FilterRowSet>,
    pending: Vec<ViewUpdate>,
}

/// View columns take type and aggregate from the table unless overridden.
fn resolve_columns(table: &Table, columns: &[Column]) -> Result<Vec<Column>> {
    if columns.is_empty() {
        return Ok(table.columns().to_vec());
    }
    columns
        .iter()
        .map(|c| {
            let mut resolved = table.column(&c.name)?.clone();
            if c.aggregate.is_some() {
                resolved.aggregate = c.aggregate;
            }
            if c.filter.is_some() {
                resolved.filter = c.filter;
            }
            Ok(resolved)
        })
        .collect()
}

fn merge_updates(pending: &mut Vec<RowUpdate>, updates: Vec<RowUpdate>) {
    for update in updates {
        match pending.iter_mut().find(|u| u.idx == update.idx) {
            Some(existing) => existing.merge(&update),
            None => pending.push(update),
        }
    }
}

impl DataView {
    pub fn new(table: &Table, options: ViewOptions) -> Result<Self> {
        let columns = resolve_columns(table, &options.columns)?;
        let sort = map_sort_criteria(&options.sort_criteria, table.column_map())?;
        let rows = if options.group_by.is_empty() {
            let mut rowset = RowSet::new(table, &columns, DEFAULT_OFFSET)?;
            if let Some(filter) = options.filter {
                rowset.filter(table.rows(), filter)?;
            }
            if !sort.is_empty() {
                rowset.sort(table.rows(), sort);
            }
            Rows::Flat(rowset)
        } else {
            let groupby = map_sort_criteria(&options.group_by, table.column_map())?;
            Rows::Grouped(GroupRowSet::new(
                table,
                &columns,
                groupby,
                DEFAULT_OFFSET,
                options.filter,
                sort,
            )?)
        };
        debug!(
            "view on {}: {} columns, {}",
            table.name(),
            columns.len(),
            if options.group_by.is_empty() { "flat" } else { "grouped" }
        );
        Ok(DataView {
            meta: metadata(&columns),
            columns,
            rows,
            filter_rowset: None,
            pending: Vec::new(),
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Metadata slot layout of every row this view produces.
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn size(&self) -> usize {
        match &self.rows {
            Rows::Flat(rs) => rs.size(),
            Rows::Grouped(rs) => rs.size(),
        }
    }

    pub fn offset(&self) -> usize {
        match &self.rows {
            Rows::Flat(rs) => rs.offset(),
            Rows::Grouped(rs) => rs.offset(),
        }
    }

    pub fn range(&self) -> Range {
        match &self.rows {
            Rows::Flat(rs) => rs.range(),
            Rows::Grouped(rs) => rs.range(),
        }
    }

    pub fn is_grouped(&self) -> bool {
        matches!(self.rows, Rows::Grouped(_))
    }

    pub fn current_filter(&self) -> Option<&Filter> {
        match &self.rows {
            Rows::Flat(rs) => rs.current_filter(),
            Rows::Grouped(rs) => rs.current_filter(),
        }
    }

    pub fn group_state(&self) -> Option<&GroupState> {
        match &self.rows {
            Rows::Flat(_) => None,
            Rows::Grouped(rs) => Some(rs.group_state()),
        }
    }

    pub fn filter_rowset(&self) -> Option<&FilterRowSet> {
        self.filter_rowset.as_ref()
    }

    /// The whole current window.
    pub fn current_range(&self, table: &Table) -> RowData {
        match &self.rows {
            Rows::Flat(rs) => rs.current_range(table.rows()),
            Rows::Grouped(rs) => rs.current_range(table.rows()),
        }
    }

    /// Move the window of the row data or of the filter picker. `None` when
    /// filter data is addressed but no picker is open.
    pub fn set_range(&mut self, table: &Table, range: Range, use_delta: bool, data_type: DataType) -> Option<RowData> {
        match data_type {
            DataType::RowData => Some(match &mut self.rows {
                Rows::Flat(rs) => rs.set_range(table.rows(), range, use_delta),
                Rows::Grouped(rs) => rs.set_range(table.rows(), range, use_delta),
            }),
            DataType::FilterData => self
                .filter_rowset
                .as_mut()
                .map(|picker| picker.set_range(range, use_delta)),
        }
    }

    fn reset_range(&mut self, table: &Table) -> RowData {
        let range = self.range().reset();
        match &mut self.rows {
            Rows::Flat(rs) => rs.set_range(table.rows(), range, false),
            Rows::Grouped(rs) => rs.set_range(table.rows(), range, false),
        }
    }

    pub fn sort(&mut self, table: &Table, criteria: &[SortCriterion]) -> Result<RowData> {
        let cols = map_sort_criteria(criteria, table.column_map())?;
        match &mut self.rows {
            Rows::Flat(rs) => {
                if let Some(outcome) = rs.sort(table.rows(), cols) {
                    debug!("sort: {:?}", outcome);
                }
            }
            Rows::Grouped(rs) => rs.sort(table.rows(), cols),
        }
        self.pending.clear();
        Ok(self.current_range(table))
    }

    /// Filter the row data, or search the filter picker.
    ///
    /// For row data the window moves back to the top and, when a picker is
    /// open, its counts are rebuilt and returned as the second element. An
    /// `incremental` row filter replaces only the constraints on its own
    /// columns. For filter data the filter must be a `STARTS_WITH` on the
    /// picker's value column, or `None` to clear the search.
    pub fn filter(
        &mut self,
        table: &Table,
        filter: Option<Filter>,
        data_type: DataType,
        incremental: bool,
    ) -> Result<(Option<RowData>, Option<RowData>)> {
        if data_type == DataType::FilterData {
            let Some(picker) = self.filter_rowset.as_mut() else {
                return Ok((None, None));
            };
            let text = match &filter {
                None => "",
                Some(Filter::StartsWith { value, .. }) => value.as_str(),
                Some(other) => {
                    return Err(Error::MalformedFilter(format!(
                        "filter data search expects STARTS_WITH, got {:?}",
                        other
                    )))
                }
            };
            picker.set_search_text(text)?;
            let range = picker.range().reset();
            return Ok((None, Some(picker.set_range(range, false))));
        }

        let filter = match (filter, incremental) {
            (Some(f), true) => Some(add_filter(self.current_filter(), f)),
            (f, _) => f,
        };
        let rows = table.rows();
        match (&mut self.rows, filter) {
            (Rows::Flat(rs), Some(f)) => rs.filter(rows, f)?,
            (Rows::Flat(rs), None) => rs.clear_filter(rows),
            (Rows::Grouped(rs), Some(f)) => rs.filter(rows, f)?,
            (Rows::Grouped(rs), None) => rs.clear_filter(rows),
        }
        self.pending.clear();
        let row_data = self.reset_range(table);
        let filter_data = self.refresh_filter_rowset(table)?;
        Ok((Some(row_data), filter_data))
    }

    /// Group by `group_by`, or ungroup when it is empty. Filter and leaf sort
    /// carry over.
    pub fn group_by(&mut self, table: &Table, group_by: &[SortCriterion]) -> Result<RowData> {
        let rows = table.rows();
        if group_by.is_empty() {
            if let Rows::Grouped(grouped) = &self.rows {
                let mut rowset = RowSet::new(table, &self.columns, DEFAULT_OFFSET)?;
                if let Some(filter) = grouped.current_filter() {
                    rowset.filter(rows, filter.clone())?;
                }
                if !grouped.sort_columns().is_empty() {
                    rowset.sort(rows, grouped.sort_columns().to_vec());
                }
                debug!("ungrouped");
                self.rows = Rows::Flat(rowset);
            }
        } else {
            let groupby = map_sort_criteria(group_by, table.column_map())?;
            let regrouped = match &mut self.rows {
                Rows::Grouped(grouped) => {
                    grouped.group_by(table, groupby)?;
                    None
                }
                Rows::Flat(rowset) => Some(GroupRowSet::new(
                    table,
                    &self.columns,
                    groupby,
                    DEFAULT_OFFSET,
                    rowset.current_filter().cloned(),
                    rowset.sort_columns().map(<[_]>::to_vec).unwrap_or_default(),
                )?),
            };
            if let Some(grouped) = regrouped {
                self.rows = Rows::Grouped(grouped);
            }
        }
        self.pending.clear();
        Ok(self.reset_range(table))
    }

    /// Replace the expand/collapse state of a grouped view. `None` when the
    /// view is flat or nothing changed.
    pub fn set_group_state(&mut self, table: &Table, state: GroupState) -> Option<RowData> {
        let Rows::Grouped(grouped) = &mut self.rows else {
            return None;
        };
        if !grouped.set_group_state(state) {
            return None;
        }
        self.pending.clear();
        Some(self.current_range(table))
    }

    /// Select the leaf at displayed position `pos`.
    pub fn select(&mut self, table: &Table, pos: usize, range_select: bool, keep_existing: bool) -> Vec<RowUpdate> {
        match &mut self.rows {
            Rows::Flat(rs) => rs.select(table.rows(), pos, range_select, keep_existing),
            Rows::Grouped(rs) => rs.select(pos, range_select, keep_existing),
        }
    }

    pub fn select_all(&mut self, table: &Table, all: bool) -> Vec<RowUpdate> {
        match &mut self.rows {
            Rows::Flat(rs) => rs.select_all(table.rows(), all),
            Rows::Grouped(rs) => rs.select_all(all),
        }
    }

    fn filter_column(&self, table: &Table, name: &str) -> Result<Column> {
        match self.columns.iter().find(|c| c.name == name) {
            Some(column) => Ok(column.clone()),
            None => table.column(name).cloned(),
        }
    }

    fn build_filter_rowset(&self, table: &Table, column: &Column) -> Result<FilterRowSet> {
        let rows = table.rows();
        match &self.rows {
            Rows::Flat(rs) => rs.get_filter_rowset(rows, column),
            Rows::Grouped(grouped) => {
                let mut leaves = RowSet::new(table, &self.columns, 0)?;
                if let Some(filter) = grouped.current_filter() {
                    leaves.filter(rows, filter.clone())?;
                }
                leaves.get_filter_rowset(rows, column)
            }
        }
    }

    /// Open the filter picker for `column`, replacing any open one.
    pub fn get_filter_data(
        &mut self,
        table: &Table,
        column: &str,
        search_text: Option<&str>,
        range: Option<Range>,
    ) -> Result<RowData> {
        let column = self.filter_column(table, column)?;
        let mut picker = self.build_filter_rowset(table, &column)?;
        if let Some(text) = search_text.filter(|t| !t.is_empty()) {
            picker.set_search_text(text)?;
        }
        let data = picker.set_range(range.unwrap_or(NULL_RANGE), false);
        self.filter_rowset = Some(picker);
        Ok(data)
    }

    /// Rebuild the open picker against the current filter, keeping its
    /// search text and window.
    fn refresh_filter_rowset(&mut self, table: &Table) -> Result<Option<RowData>> {
        let Some(old) = self.filter_rowset.take() else {
            return Ok(None);
        };
        let column = self.filter_column(table, old.column_name())?;
        let mut picker = self.build_filter_rowset(table, &column)?;
        if let Some(text) = old.search_text() {
            picker.set_search_text(text)?;
        }
        let data = picker.set_range(old.range(), false);
        self.filter_rowset = Some(picker);
        Ok(Some(data))
    }

    /// Drain deltas produced by table changes since the last call.
    pub fn take_updates(&mut self) -> Vec<ViewUpdate> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_updates(&self) -> bool {
        !self.pending.is_empty()
    }

    fn push(&mut self, update: ViewUpdate) {
        match update {
            ViewUpdate::Rowset(data) => {
                self.pending.clear();
                self.pending.push(ViewUpdate::Rowset(data));
            }
            ViewUpdate::Update(updates) => match self.pending.last_mut() {
                Some(ViewUpdate::Update(existing)) => merge_updates(existing, updates),
                _ => self.pending.push(ViewUpdate::Update(updates)),
            },
            size => self.pending.push(size),
        }
    }

    fn apply_insert(&mut self, table: &Table, size_before: usize, result: InsertResult) {
        if !result.updates.is_empty() {
            self.push(ViewUpdate::Update(result.updates));
        }
        if result.replace {
            let data = self.current_range(table);
            self.push(ViewUpdate::Rowset(data));
        } else if result.size != size_before || result.offset.is_some() {
            self.push(ViewUpdate::Size {
                size: result.size,
                offset: result.offset.unwrap_or_else(|| self.offset()),
            });
        }
    }

    /// Does a change to storage slot `slot` move rows rather than cells?
    fn moves_rows(&self, table: &Table, slot: usize) -> bool {
        let filtered = table
            .column_at(slot)
            .map(|c| match &self.rows {
                Rows::Flat(rs) => rs.filters_on(&c.name),
                Rows::Grouped(rs) => rs.filters_on(&c.name),
            })
            .unwrap_or(false);
        filtered
            || match &self.rows {
                Rows::Flat(rs) => rs.sorts_on(slot),
                Rows::Grouped(rs) => rs.depends_on(slot),
            }
    }

    fn refresh(&mut self, rows: &[Row]) -> Result<()> {
        match &mut self.rows {
            Rows::Flat(rs) => rs.refresh(rows),
            Rows::Grouped(rs) => {
                rs.refresh(rows);
                Ok(())
            }
        }
    }

    fn apply_update(&mut self, table: &Table, index: usize, changes: &[(usize, ColumnValue)]) {
        if changes.iter().any(|(slot, _)| self.moves_rows(table, *slot)) {
            debug!("update of row {} moves rows, refreshing", index);
            if let Err(e) = self.refresh(table.rows()) {
                warn!("refresh after update of row {} failed: {}", index, e);
                return;
            }
            let data = self.current_range(table);
            self.push(ViewUpdate::Rowset(data));
            return;
        }
        let updates = match &mut self.rows {
            Rows::Flat(rs) => {
                let projected: Vec<(usize, ColumnValue)> = changes
                    .iter()
                    .filter_map(|(slot, value)| Some((rs.projection().position_of(*slot)?, value.clone())))
                    .collect();
                if projected.is_empty() {
                    Vec::new()
                } else {
                    rs.update(index, projected).into_iter().collect()
                }
            }
            Rows::Grouped(rs) => rs.update(table.rows(), index, changes),
        };
        if !updates.is_empty() {
            self.push(ViewUpdate::Update(updates));
        }
    }
}

impl IncrementalView for DataView {
    fn apply_change(&mut self, table: &Table, change: &TableChange) {
        match change {
            TableChange::RowInserted { index } => {
                let size_before = self.size();
                let result = match &mut self.rows {
                    Rows::Flat(rs) => rs.insert(table.rows(), *index),
                    Rows::Grouped(rs) => rs.insert(table.rows(), *index),
                };
                if let Some(result) = result {
                    self.apply_insert(table, size_before, result);
                }
            }
            TableChange::RowUpdated { index, changes } => self.apply_update(table, *index, changes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::{row, test_table, text};

    fn view(table: &Table, options: ViewOptions) -> DataView {
        let mut view = DataView::new(table, options).unwrap();
        view.set_range(table, Range::new(0, 10), true, DataType::RowData);
        view
    }

    fn keys(view: &DataView, data: &RowData) -> Vec<String> {
        data.rows.iter().map(|r| text(&r[view.meta().key])).collect()
    }

    fn sync(view: &mut DataView, table: &mut Table) {
        let changes = table.drain_changes();
        view.apply_changes(table, &changes);
    }

    #[test]
    fn test_initial_range() {
        let table = test_table();
        let mut view = DataView::new(&table, ViewOptions::default()).unwrap();
        let data = view.set_range(&table, Range::new(0, 10), true, DataType::RowData).unwrap();
        assert_eq!(data.size, 24);
        assert_eq!(data.rows.len(), 10);
        assert_eq!(text(&data.rows[0][view.meta().idx]), "100");
        assert_eq!(view.meta().idx, 6);
        assert!(view.set_range(&table, Range::new(0, 10), true, DataType::FilterData).is_none());
    }

    #[test]
    fn test_projected_columns_and_unknown_column() {
        let table = test_table();
        let options = ViewOptions {
            columns: vec![Column::new("Key"), Column::new("Qty")],
            ..Default::default()
        };
        let mut view = DataView::new(&table, options).unwrap();
        let data = view.set_range(&table, Range::new(0, 1), true, DataType::RowData).unwrap();
        assert_eq!(data.rows[0].len(), 2 + crate::metadata::META_SLOTS);
        assert_eq!(text(&data.rows[0][1]), "101");

        let bad = ViewOptions {
            columns: vec![Column::new("Nope")],
            ..Default::default()
        };
        assert!(matches!(DataView::new(&table, bad), Err(Error::UnknownColumn(c)) if c == "Nope"));
    }

    #[test]
    fn test_sort_and_filter_reset_range() {
        let table = test_table();
        let mut v = view(&table, ViewOptions::default());
        v.set_range(&table, Range::new(5, 15), true, DataType::RowData);

        let data = v.sort(&table, &[SortCriterion::dsc("Qty")]).unwrap();
        assert_eq!(data.range, Range::new(5, 15));
        assert_eq!(data.rows.len(), 10);

        let (rows, picker) = v
            .filter(&table, Some(Filter::equals("Qty", 100)), DataType::RowData, false)
            .unwrap();
        let rows = rows.unwrap();
        assert!(picker.is_none());
        assert_eq!(rows.size, 14);
        assert_eq!(rows.range.lo, 0);
        assert!(rows.range.reset);
        assert_eq!(text(&rows.rows[0][v.meta().idx]), "100");
    }

    #[test]
    fn test_incremental_filter_keeps_other_columns() {
        let table = test_table();
        let mut v = view(&table, ViewOptions::default());
        v.filter(&table, Some(Filter::equals("Qty", 100)), DataType::RowData, false)
            .unwrap();
        let (rows, _) = v
            .filter(&table, Some(Filter::is_in("Group1", vec!["G2"])), DataType::RowData, true)
            .unwrap();
        assert_eq!(rows.unwrap().size, 8);

        let (rows, _) = v.filter(&table, None, DataType::RowData, false).unwrap();
        assert_eq!(rows.unwrap().size, 24);
        assert!(v.current_filter().is_none());
    }

    #[test]
    fn test_filter_picker_follows_row_filter() {
        let table = test_table();
        let mut v = view(&table, ViewOptions::default());
        let data = v.get_filter_data(&table, "Group3", None, Some(Range::new(0, 10))).unwrap();
        assert_eq!(data.size, 3);
        assert_eq!(data.stats.unwrap().total_selected, 3);

        let (rows, picker) = v
            .filter(&table, Some(Filter::is_in("Group3", vec!["T3"])), DataType::RowData, false)
            .unwrap();
        assert_eq!(rows.unwrap().size, 20);
        let picker = picker.unwrap();
        let selected: Vec<String> = picker.rows.iter().map(|r| text(&r[7])).collect();
        assert_eq!(selected, vec!["1", "0", "0"]);
        assert_eq!(picker.stats.unwrap().total_selected, 1);

        let (rows, found) = v
            .filter(&table, Some(Filter::starts_with("name", "t4")), DataType::FilterData, true)
            .unwrap();
        assert!(rows.is_none());
        let found = found.unwrap();
        assert_eq!(found.size, 1);
        assert!(found.range.reset);
        assert_eq!(text(&found.rows[0][0]), "T4");

        let (_, all) = v.filter(&table, None, DataType::FilterData, true).unwrap();
        assert_eq!(all.unwrap().size, 3);

        let err = v.filter(&table, Some(Filter::equals("name", "T4")), DataType::FilterData, true);
        assert!(matches!(err, Err(Error::MalformedFilter(_))));
    }

    #[test]
    fn test_numeric_filter_data_is_binned() {
        let table = test_table();
        let mut v = view(&table, ViewOptions::default());
        let data = v.get_filter_data(&table, "Qty", None, None).unwrap();
        assert_eq!(data.size, 20);
        let total: i64 = data.rows.iter().filter_map(|r| r[1].as_i64()).sum();
        assert_eq!(total, 24);
    }

    #[test]
    fn test_insert_outside_window_reports_size() {
        let mut table = test_table();
        let mut v = view(&table, ViewOptions::default());
        table.insert(row("key25", "G1", "U2", "T3", 100, 5.0)).unwrap();
        sync(&mut v, &mut table);
        assert_eq!(v.take_updates(), vec![ViewUpdate::Size { size: 25, offset: 100 }]);
        assert!(!v.has_updates());
    }

    #[test]
    fn test_insert_into_window_replaces_rows() {
        let mut table = test_table();
        let options = ViewOptions {
            sort_criteria: vec![SortCriterion::asc("Key")],
            ..Default::default()
        };
        let mut v = view(&table, options);
        table.insert(row("key00", "G1", "U2", "T3", 100, 5.0)).unwrap();
        sync(&mut v, &mut table);
        let updates = v.take_updates();
        assert_eq!(updates.len(), 1);
        match &updates[0] {
            ViewUpdate::Rowset(data) => {
                assert_eq!(data.size, 25);
                assert_eq!(keys(&v, data)[..2], ["key00", "key01"]);
            }
            other => panic!("expected a rowset, got {:?}", other),
        }
    }

    #[test]
    fn test_filtered_out_insert_is_silent() {
        let mut table = test_table();
        let options = ViewOptions {
            filter: Some(Filter::equals("Qty", 100)),
            ..Default::default()
        };
        let mut v = view(&table, options);
        table.insert(row("key25", "G1", "U2", "T3", 99, 5.0)).unwrap();
        sync(&mut v, &mut table);
        assert!(v.take_updates().is_empty());
    }

    #[test]
    fn test_updates_merge_per_row() {
        let mut table = test_table();
        let mut v = view(&table, ViewOptions::default());
        table.update(2, &[("Qty", 7.into())]).unwrap();
        table.update(2, &[("Price", 1.5.into())]).unwrap();
        table.update(20, &[("Qty", 7.into())]).unwrap();
        sync(&mut v, &mut table);
        let updates = v.take_updates();
        assert_eq!(
            updates,
            vec![ViewUpdate::Update(vec![RowUpdate::new(
                102,
                vec![(4, ColumnValue::Int32(7)), (5, ColumnValue::Float64(1.5))]
            )])]
        );
    }

    #[test]
    fn test_update_of_sorted_column_resends_window() {
        let mut table = test_table();
        let options = ViewOptions {
            sort_criteria: vec![SortCriterion::asc("Qty")],
            ..Default::default()
        };
        let mut v = view(&table, options);
        table.update(16, &[("Qty", 1.into())]).unwrap();
        sync(&mut v, &mut table);
        match v.take_updates().as_slice() {
            [ViewUpdate::Rowset(data)] => assert_eq!(keys(&v, data)[0], "key17"),
            other => panic!("expected a rowset, got {:?}", other),
        }
    }

    #[test]
    fn test_group_and_ungroup_keep_filter() {
        let table = test_table();
        let mut v = view(&table, ViewOptions::default());
        v.filter(&table, Some(Filter::equals("Qty", 100)), DataType::RowData, false)
            .unwrap();

        let data = v.group_by(&table, &[SortCriterion::asc("Group1")]).unwrap();
        assert!(v.is_grouped());
        assert_eq!(data.size, 3);
        assert_eq!(text(&data.rows[0][v.meta().filter_count]), "3");

        let state = GroupState::from_json(&serde_json::json!({"G2": true})).unwrap();
        let data = v.set_group_state(&table, state.clone()).unwrap();
        assert_eq!(data.size, 11);
        assert!(v.set_group_state(&table, state).is_none());

        let data = v.group_by(&table, &[]).unwrap();
        assert!(!v.is_grouped());
        assert_eq!(data.size, 14);
        assert!(v.group_state().is_none());
    }

    #[test]
    fn test_grouped_picker_counts_leaves() {
        let table = test_table();
        let options = ViewOptions {
            group_by: vec![SortCriterion::asc("Group1")],
            filter: Some(Filter::equals("Qty", 100)),
            ..Default::default()
        };
        let mut v = view(&table, options);
        let data = v.get_filter_data(&table, "Group1", None, Some(Range::new(0, 5))).unwrap();
        let counts: Vec<String> = data.rows.iter().map(|r| text(&r[1])).collect();
        assert_eq!(counts, vec!["3", "8", "3"]);
    }

    #[test]
    fn test_grouped_update_of_aggregate() {
        let mut table = test_table();
        let options = ViewOptions {
            group_by: vec![SortCriterion::asc("Group1")],
            ..Default::default()
        };
        let mut v = view(&table, options);
        table.update(0, &[("Qty", 1.into())]).unwrap();
        sync(&mut v, &mut table);
        match v.take_updates().as_slice() {
            [ViewUpdate::Update(updates)] => {
                assert_eq!(updates.len(), 1);
                assert_eq!(updates[0].idx, 100);
                assert!(updates[0].changes.contains(&(4, ColumnValue::Int64(649))));
            }
            other => panic!("expected an update, got {:?}", other),
        }
    }

    #[test]
    fn test_selection() {
        let table = test_table();
        let mut v = view(&table, ViewOptions::default());
        let updates = v.select(&table, 2, false, false);
        assert_eq!(updates, vec![RowUpdate::new(102, vec![(10, 1i64.into())])]);
        let updates = v.select_all(&table, false);
        assert_eq!(updates.len(), 1);
    }
}

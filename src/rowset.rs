/// Row sets: a live, windowed projection of a table under sort and filter.
///
/// A `RowSet` never copies table rows. It keeps a sort set (every storage
/// index, ordered by the current sort) and, while filtered, a filter set
/// (passing indices in the same order). Every operation takes the table's
/// rows by reference, so many row sets can read one table.
///
/// `SetFilterRowSet` and `BinFilterRowSet` are the auxiliary row sets behind
/// a column's filter picker.

use crate::column::{Column, ColumnType, ColumnValue, FilterType, ValueKey};
use crate::error::Result;
use crate::filter::{
    extends_filter, extract_filter_for_column, functor, includes_column, remove_filter_for_column, Filter,
    Predicate,
};
use crate::metadata::{metadata, ColumnMap, Meta, Projection, SortColumn, SortDirection};
use crate::range::{get_delta_range, Range, NULL_RANGE};
use crate::sort::{SortEntry, SortOutcome, SortSet, Sorter};
use crate::table::{Row, Table};
use log::debug;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

/// IDX of the first row of a data view.
pub const DEFAULT_OFFSET: usize = 100;
/// Buckets in a numeric filter picker.
pub const DEFAULT_BIN_COUNT: usize = 20;

/// Column holding the distinct value in a set filter picker.
pub const FILTER_VALUE_COLUMN: &str = "name";

/// Rows for a window, with the view size and the IDX offset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowData {
    pub rows: Vec<Row>,
    pub range: Range,
    pub size: usize,
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<FilterStats>,
}

/// Counts reported with filter picker data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStats {
    pub total_row_count: usize,
    pub total_selected: usize,
    pub filtered_row_count: usize,
    pub filtered_selected: usize,
}

/// Positioned cell changes for one displayed row.
///
/// Serialized flat: `[idx, column, value, column, value, ...]`, where
/// `column` is the projected column position.
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub idx: usize,
    pub changes: Vec<(usize, ColumnValue)>,
}

impl RowUpdate {
    pub fn new(idx: usize, changes: Vec<(usize, ColumnValue)>) -> Self {
        RowUpdate { idx, changes }
    }

    /// Fold later changes in, later values winning.
    pub fn merge(&mut self, other: &RowUpdate) {
        for (column, value) in &other.changes {
            match self.changes.iter_mut().find(|(c, _)| c == column) {
                Some(existing) => existing.1 = value.clone(),
                None => self.changes.push((*column, value.clone())),
            }
        }
    }
}

impl Serialize for RowUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(1 + 2 * self.changes.len()))?;
        seq.serialize_element(&self.idx)?;
        for (column, value) in &self.changes {
            seq.serialize_element(column)?;
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

/// What an insert did to the displayed sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertResult {
    pub size: usize,
    /// Displayed rows inside the window shifted; resend the window
    pub replace: bool,
    /// Row landed before the window; the new IDX offset
    pub offset: Option<usize>,
    /// In-place changes to visible rows (grouped views)
    pub updates: Vec<RowUpdate>,
}

/// Selected leaves, by storage index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    selected: BTreeSet<usize>,
    last: Option<usize>,
}

impl Selection {
    pub fn contains(&self, idx: usize) -> bool {
        self.selected.contains(&idx)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.selected.iter().copied()
    }

    /// Apply a click at displayed position `pos` (storage index `idx`).
    ///
    /// `span` maps the positions from the last click to this one to storage
    /// indices and is used for range selection. Returns the storage indices
    /// whose state changed.
    pub fn select(
        &mut self,
        pos: usize,
        idx: usize,
        range_select: bool,
        keep_existing: bool,
        span: impl Fn(usize, usize) -> Vec<usize>,
    ) -> Vec<usize> {
        let before = self.selected.clone();
        match (range_select, self.last) {
            (true, Some(last)) => {
                if !keep_existing {
                    self.selected.clear();
                }
                self.selected.extend(span(last.min(pos), last.max(pos)));
            }
            _ if keep_existing => {
                if !self.selected.remove(&idx) {
                    self.selected.insert(idx);
                }
            }
            _ => {
                let only = self.selected.len() == 1 && self.selected.contains(&idx);
                self.selected.clear();
                if !only {
                    self.selected.insert(idx);
                }
            }
        }
        self.last = Some(pos);
        before.symmetric_difference(&self.selected).copied().collect()
    }

    /// Replace the selection; returns the storage indices that changed.
    pub fn set(&mut self, indices: impl IntoIterator<Item = usize>) -> Vec<usize> {
        let before = std::mem::take(&mut self.selected);
        self.selected.extend(indices);
        self.last = None;
        before.symmetric_difference(&self.selected).copied().collect()
    }
}

/// How a row set fills the SELECTED slot.
enum Selector {
    /// User selection of leaves
    Rows(Selection),
    /// Filter picker: values the column filter admits, all when none
    Matching(Option<Predicate>),
}

/// A flat row set.
pub struct RowSet {
    projection: Projection,
    column_map: ColumnMap,
    key_slot: usize,
    offset: usize,
    range: Range,
    sorter: Sorter,
    sort_set: SortSet,
    filter: Option<Filter>,
    predicate: Option<Predicate>,
    filter_set: Option<SortSet>,
    /// The sort was last applied to the filter set only
    sort_required: bool,
    selector: Selector,
}

impl RowSet {
    pub fn new(table: &Table, columns: &[Column], offset: usize) -> Result<Self> {
        Ok(RowSet {
            projection: Projection::new(columns, table.column_map())?,
            column_map: table.column_map().clone(),
            key_slot: table.primary_key_slot(),
            offset,
            range: NULL_RANGE,
            sorter: Sorter::new(),
            sort_set: (0..table.len()).map(SortEntry::new).collect(),
            filter: None,
            predicate: None,
            filter_set: None,
            sort_required: false,
            selector: Selector::Rows(Selection::default()),
        })
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn column_map(&self) -> &ColumnMap {
        &self.column_map
    }

    /// Displayed rows: filtered count when filtered, else every row.
    pub fn size(&self) -> usize {
        self.navigation_set().len()
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn sort_columns(&self) -> Option<&[SortColumn]> {
        self.sorter.columns()
    }

    pub fn current_filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn selection(&self) -> Option<&Selection> {
        match &self.selector {
            Selector::Rows(selection) => Some(selection),
            Selector::Matching(_) => None,
        }
    }

    fn navigation_set(&self) -> &SortSet {
        self.filter_set.as_ref().unwrap_or(&self.sort_set)
    }

    /// Storage index shown at displayed position `pos`.
    pub fn storage_index(&self, pos: usize) -> Option<usize> {
        let set = self.navigation_set();
        if pos >= set.len() {
            return None;
        }
        Some(set[self.sorter.physical(pos, set.len())].idx)
    }

    /// Storage indices in displayed order.
    pub fn displayed_indices(&self) -> Vec<usize> {
        (0..self.size()).filter_map(|pos| self.storage_index(pos)).collect()
    }

    fn is_selected(&self, row: &[ColumnValue], idx: usize) -> bool {
        match &self.selector {
            Selector::Rows(selection) => selection.contains(idx),
            Selector::Matching(None) => true,
            Selector::Matching(Some(test)) => test(row),
        }
    }

    /// Projected rows for displayed positions `lo..hi`.
    pub fn slice(&self, rows: &[Row], lo: usize, hi: usize) -> Vec<Row> {
        let hi = hi.min(self.size());
        (lo..hi)
            .filter_map(|pos| {
                let idx = self.storage_index(pos)?;
                let row = &rows[idx];
                Some(self.projection.leaf(
                    row,
                    pos + self.offset,
                    row[self.key_slot].clone(),
                    self.is_selected(row, idx),
                ))
            })
            .collect()
    }

    /// Move the window. With `use_delta` only rows entering the window are
    /// returned, otherwise the whole buffered window.
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

    /// The whole current window.
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

    /// Sort the navigation set. Empty `cols` restores storage order.
    pub fn sort(&mut self, rows: &[Row], cols: Vec<SortColumn>) -> Option<SortOutcome> {
        if cols.is_empty() {
            self.sorter.clear();
            self.sort_set.sort_by_key(|e| e.idx);
            if let Some(set) = self.filter_set.as_mut() {
                set.sort_by_key(|e| e.idx);
            }
            self.sort_required = false;
            return None;
        }
        let outcome = match self.filter_set.as_mut() {
            Some(set) => {
                let outcome = self.sorter.sort(set, rows, cols);
                if outcome != SortOutcome::Reversed {
                    self.sort_required = true;
                }
                outcome
            }
            None => {
                self.sort_required = false;
                self.sorter.sort(&mut self.sort_set, rows, cols)
            }
        };
        Some(outcome)
    }

    /// Apply `filter`, re-testing only the current filter set when it narrows
    /// the current filter.
    pub fn filter(&mut self, rows: &[Row], filter: Filter) -> Result<()> {
        let predicate = functor(&self.column_map, &filter)?;
        let extends = self.filter_set.is_some() && extends_filter(self.filter.as_ref(), Some(&filter));
        let source = match (&self.filter_set, extends) {
            (Some(set), true) => set,
            _ => &self.sort_set,
        };
        let mut filter_set: SortSet = source
            .iter()
            .filter(|e| predicate(&rows[e.idx]))
            .cloned()
            .collect();

        if !extends && self.sort_required {
            self.sorter.resort(&mut filter_set, rows);
        }
        debug!(
            "filter {:?}: {} of {} rows ({})",
            filter,
            filter_set.len(),
            self.sort_set.len(),
            if extends { "narrowed" } else { "full" }
        );
        self.filter_set = Some(filter_set);
        self.filter = Some(filter);
        self.predicate = Some(predicate);
        Ok(())
    }

    pub fn clear_filter(&mut self, rows: &[Row]) {
        self.filter = None;
        self.predicate = None;
        self.filter_set = None;
        if self.sort_required {
            self.sorter.resort(&mut self.sort_set, rows);
            self.sort_required = false;
        }
    }

    fn hint(&mut self, pos: usize) -> InsertResult {
        let size = self.size();
        if pos >= self.range.hi {
            InsertResult { size, ..Default::default() }
        } else if pos >= self.range.lo || self.offset == 0 {
            InsertResult {
                size,
                replace: true,
                ..Default::default()
            }
        } else {
            self.offset -= 1;
            InsertResult {
                size,
                offset: Some(self.offset),
                ..Default::default()
            }
        }
    }

    /// Take a row just appended to the table at storage index `idx`.
    ///
    /// Returns `None` when the row does not pass the current filter.
    pub fn insert(&mut self, rows: &[Row], idx: usize) -> Option<InsertResult> {
        let row = &rows[idx];
        let entry = self.sorter.entry(idx, row);

        let pos = if self.sort_required {
            self.sort_set.push(entry.clone());
            None
        } else {
            Some(self.sorter.insert(&mut self.sort_set, entry.clone()))
        };

        let pos = match (&self.predicate, self.filter_set.as_mut()) {
            (Some(test), Some(set)) => {
                if !test(row) {
                    return None;
                }
                self.sorter.insert(set, entry)
            }
            _ => pos?,
        };
        Some(self.hint(pos))
    }

    /// Displayed position of a storage index inside the current window.
    pub fn position_in_range(&self, idx: usize) -> Option<usize> {
        let window = self.range.full();
        if !self.sorter.is_sorted() && self.filter_set.is_none() {
            return window.contains(idx).then_some(idx).filter(|&p| p < self.size());
        }
        (window.lo..window.hi.min(self.size())).find(|&pos| self.storage_index(pos) == Some(idx))
    }

    /// Positioned delta for changed cells of storage row `idx`, or `None`
    /// when the row is not displayed inside the window.
    pub fn update(&self, idx: usize, changes: Vec<(usize, ColumnValue)>) -> Option<RowUpdate> {
        let pos = self.position_in_range(idx)?;
        Some(RowUpdate::new(pos + self.offset, changes))
    }

    /// Does the current ordering depend on storage slot `slot`?
    pub fn sorts_on(&self, slot: usize) -> bool {
        self.sorter
            .columns()
            .map(|cols| cols.iter().any(|&(s, _)| s == slot))
            .unwrap_or(false)
    }

    pub fn filters_on(&self, column: &str) -> bool {
        includes_column(self.filter.as_ref(), column)
    }

    /// Rebuild sort and filter sets from scratch after row values moved.
    pub fn refresh(&mut self, rows: &[Row]) -> Result<()> {
        self.sorter.resort(&mut self.sort_set, rows);
        self.sort_required = false;
        if let Some(filter) = self.filter.take() {
            self.filter_set = None;
            self.filter(rows, filter)?;
        }
        Ok(())
    }

    fn selection_updates(&self, rows: &[Row], changed: &[usize]) -> Vec<RowUpdate> {
        let selected = self.projection.meta().selected;
        changed
            .iter()
            .filter_map(|&idx| {
                let pos = self.position_in_range(idx)?;
                let value = self.is_selected(&rows[idx], idx) as i64;
                Some(RowUpdate::new(pos + self.offset, vec![(selected, value.into())]))
            })
            .collect()
    }

    /// Select the leaf at displayed position `pos`. Returns SELECTED updates
    /// for affected rows inside the window.
    pub fn select(&mut self, rows: &[Row], pos: usize, range_select: bool, keep_existing: bool) -> Vec<RowUpdate> {
        let Some(idx) = self.storage_index(pos) else {
            return Vec::new();
        };
        let span: Vec<usize> = self.displayed_indices();
        let changed = match &mut self.selector {
            Selector::Rows(selection) => selection.select(pos, idx, range_select, keep_existing, |lo, hi| {
                span.iter().skip(lo).take(hi + 1 - lo).copied().collect()
            }),
            Selector::Matching(_) => return Vec::new(),
        };
        self.selection_updates(rows, &changed)
    }

    /// Select every displayed leaf (`true`) or none.
    pub fn select_all(&mut self, rows: &[Row], all: bool) -> Vec<RowUpdate> {
        let indices = if all { self.displayed_indices() } else { Vec::new() };
        let changed = match &mut self.selector {
            Selector::Rows(selection) => selection.set(indices),
            Selector::Matching(_) => return Vec::new(),
        };
        self.selection_updates(rows, &changed)
    }

    fn filter_for_picker(&self, column: &str) -> Option<Filter> {
        if includes_column(self.filter.as_ref(), column) {
            remove_filter_for_column(self.filter.as_ref(), column)
        } else {
            self.filter.clone()
        }
    }

    /// Distinct values of `column` with selected and total counts.
    ///
    /// The selected count re-tests rows against the current filter with
    /// this column's own constraint removed.
    pub fn get_distinct_values_for_column(&self, rows: &[Row], column: &Column) -> Result<SetFilterRowSet> {
        let slot = self.column_map.slot(&column.name)?;
        let filter = self.filter_for_picker(&column.name);
        let predicate = filter.as_ref().map(|f| functor(&self.column_map, f)).transpose()?;

        let mut positions: HashMap<ValueKey, usize> = HashMap::new();
        let mut data: Vec<(ColumnValue, usize, usize)> = Vec::new();
        for row in rows {
            let value = &row[slot];
            let included = predicate.as_ref().map(|test| test(row)).unwrap_or(true) as usize;
            match positions.entry(ValueKey::of(value)) {
                Entry::Occupied(entry) => {
                    let i = *entry.get();
                    data[i].1 += included;
                    data[i].2 += 1;
                }
                Entry::Vacant(entry) => {
                    entry.insert(data.len());
                    data.push((value.clone(), included, 1));
                }
            }
        }
        debug!("distinct values for {}: {}", column.name, data.len());
        SetFilterRowSet::new(&column.name, data, self.filter.as_ref())
    }

    /// Histogram of a numeric column over the displayed rows.
    pub fn get_binned_values_for_column(&self, rows: &[Row], column: &Column) -> Result<BinFilterRowSet> {
        let slot = self.column_map.slot(&column.name)?;
        let values: Vec<f64> = self
            .navigation_set()
            .iter()
            .filter_map(|e| rows[e.idx][slot].as_f64())
            .filter(|v| !v.is_nan())
            .collect();
        Ok(BinFilterRowSet::new(&column.name, &values, DEFAULT_BIN_COUNT))
    }

    /// Filter picker row set for `column`, by its resolved filter type.
    pub fn get_filter_rowset(&self, rows: &[Row], column: &Column) -> Result<FilterRowSet> {
        match column.resolved_filter_type() {
            FilterType::Set => Ok(FilterRowSet::Set(self.get_distinct_values_for_column(rows, column)?)),
            FilterType::Number => Ok(FilterRowSet::Bins(self.get_binned_values_for_column(rows, column)?)),
        }
    }
}

fn filter_picker_columns() -> Vec<Column> {
    vec![
        Column::new(FILTER_VALUE_COLUMN),
        Column::new("count").typed(ColumnType::Int64),
        Column::new("totalCount").typed(ColumnType::Int64),
    ]
}

/// Row layout of set filter picker rows.
pub fn filter_picker_meta() -> Meta {
    metadata(&filter_picker_columns())
}

/// Distinct values of one column: `[name, count, totalCount]` sorted by value.
pub struct SetFilterRowSet {
    table: Table,
    rowset: RowSet,
    column_name: String,
    search_text: Option<String>,
}

impl SetFilterRowSet {
    pub fn new(column_name: &str, data: Vec<(ColumnValue, usize, usize)>, filter: Option<&Filter>) -> Result<Self> {
        let mut table = Table::new(format!("{}-filter", column_name), filter_picker_columns(), FILTER_VALUE_COLUMN)?;
        for (value, count, total) in data {
            table.insert(vec![value, count.into(), total.into()])?;
        }
        table.drain_changes();

        let mut rowset = RowSet::new(&table, &filter_picker_columns(), 0)?;
        rowset.sort(table.rows(), vec![(0, SortDirection::Asc)]);
        let mut picker = SetFilterRowSet {
            table,
            rowset,
            column_name: column_name.to_string(),
            search_text: None,
        };
        picker.set_selected(filter)?;
        Ok(picker)
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn size(&self) -> usize {
        self.rowset.size()
    }

    pub fn search_text(&self) -> Option<&str> {
        self.search_text.as_deref()
    }

    /// Narrow the listed values to those starting with `text`.
    pub fn set_search_text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            self.rowset.clear_filter(self.table.rows());
            self.search_text = None;
        } else {
            self.rowset
                .filter(self.table.rows(), Filter::starts_with(FILTER_VALUE_COLUMN, text))?;
            self.search_text = Some(text.to_string());
        }
        Ok(())
    }

    /// Listed values in displayed order.
    pub fn values(&self) -> Vec<ColumnValue> {
        self.rowset
            .displayed_indices()
            .into_iter()
            .map(|idx| self.table.rows()[idx][0].clone())
            .collect()
    }

    /// Mark as selected the values admitted by the filter on this column.
    pub fn set_selected(&mut self, filter: Option<&Filter>) -> Result<()> {
        let predicate = match extract_filter_for_column(filter, &self.column_name) {
            Some(column_filter) => Some(functor(
                self.rowset.column_map(),
                &column_filter.with_column(FILTER_VALUE_COLUMN),
            )?),
            None => None,
        };
        self.rowset.selector = Selector::Matching(predicate);
        Ok(())
    }

    pub fn stats(&self) -> FilterStats {
        let rows = self.table.rows();
        let selected = |idx: &usize| self.rowset.is_selected(&rows[*idx], *idx);
        let displayed = self.rowset.displayed_indices();
        FilterStats {
            total_row_count: rows.len(),
            total_selected: (0..rows.len()).filter(selected).count(),
            filtered_row_count: displayed.len(),
            filtered_selected: displayed.iter().filter(|&idx| selected(idx)).count(),
        }
    }

    pub fn set_range(&mut self, range: Range, use_delta: bool) -> RowData {
        let mut data = self.rowset.set_range(self.table.rows(), range, use_delta);
        data.stats = Some(self.stats());
        data
    }

    pub fn current_range(&self) -> RowData {
        let mut data = self.rowset.current_range(self.table.rows());
        data.stats = Some(self.stats());
        data
    }

    pub fn range(&self) -> Range {
        self.rowset.range()
    }
}

/// Equal-width histogram rows `[bin, count, lo, hi]`, bins numbered from 1.
pub fn bin_values(values: &[f64], bins: usize) -> Vec<Row> {
    let (Some(min), Some(max)) = (
        values.iter().copied().min_by(|a, b| a.total_cmp(b)),
        values.iter().copied().max_by(|a, b| a.total_cmp(b)),
    ) else {
        return Vec::new();
    };
    let bins = if max > min { bins.max(1) } else { 1 };
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        let bin = if width > 0.0 {
            (((v - min) / width) as usize).min(bins - 1)
        } else {
            0
        };
        counts[bin] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let lo = min + width * i as f64;
            let hi = if i + 1 == bins { max } else { min + width * (i + 1) as f64 };
            vec![(i + 1).into(), count.into(), lo.into(), hi.into()]
        })
        .collect()
}

/// Histogram of a numeric column. Rows carry no metadata.
pub struct BinFilterRowSet {
    column_name: String,
    rows: Vec<Row>,
}

impl BinFilterRowSet {
    pub fn new(column_name: &str, values: &[f64], bins: usize) -> Self {
        BinFilterRowSet {
            column_name: column_name.to_string(),
            rows: bin_values(values, bins),
        }
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// Every bin, regardless of range.
    pub fn set_range(&self) -> RowData {
        RowData {
            rows: self.rows.clone(),
            range: NULL_RANGE,
            size: self.rows.len(),
            offset: 0,
            stats: None,
        }
    }
}

/// A column's filter picker.
pub enum FilterRowSet {
    Set(SetFilterRowSet),
    Bins(BinFilterRowSet),
}

impl FilterRowSet {
    pub fn column_name(&self) -> &str {
        match self {
            FilterRowSet::Set(set) => set.column_name(),
            FilterRowSet::Bins(bins) => bins.column_name(),
        }
    }

    pub fn set_range(&mut self, range: Range, use_delta: bool) -> RowData {
        match self {
            FilterRowSet::Set(set) => set.set_range(range, use_delta),
            FilterRowSet::Bins(bins) => bins.set_range(),
        }
    }

    pub fn current_range(&self) -> RowData {
        match self {
            FilterRowSet::Set(set) => set.current_range(),
            FilterRowSet::Bins(bins) => bins.set_range(),
        }
    }

    pub fn search_text(&self) -> Option<&str> {
        match self {
            FilterRowSet::Set(set) => set.search_text(),
            FilterRowSet::Bins(_) => None,
        }
    }

    /// Picker search; histograms ignore it.
    pub fn set_search_text(&mut self, text: &str) -> Result<()> {
        match self {
            FilterRowSet::Set(set) => set.set_search_text(text),
            FilterRowSet::Bins(_) => Ok(()),
        }
    }

    pub fn set_selected(&mut self, filter: Option<&Filter>) -> Result<()> {
        match self {
            FilterRowSet::Set(set) => set.set_selected(filter),
            FilterRowSet::Bins(_) => Ok(()),
        }
    }

    pub fn range(&self) -> Range {
        match self {
            FilterRowSet::Set(set) => set.range(),
            FilterRowSet::Bins(_) => NULL_RANGE,
        }
    }
}

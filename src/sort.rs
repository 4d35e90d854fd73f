/// Sort sets and the incremental sorter.
///
/// A sort set is a permutation of storage indices, each entry carrying a cache
/// of its sort key values so comparisons never go back to the table. The
/// `Sorter` keeps the current sort columns and a reverse flag, and picks the
/// cheapest way to reach a new ordering: flip, extend, or full sort.
///
/// Ties are always broken by storage index, so two full sorts with the same
/// columns produce identical orderings.

use crate::column::{compare_values, ColumnValue};
use crate::metadata::SortColumn;
use crate::table::Row;
use log::debug;
use std::cmp::Ordering;

/// One position of a sort set.
#[derive(Debug, Clone, PartialEq)]
pub struct SortEntry {
    pub idx: usize,
    /// Values of the sort columns, in sort-column order
    pub keys: Vec<ColumnValue>,
}

impl SortEntry {
    pub fn new(idx: usize) -> Self {
        SortEntry { idx, keys: Vec::new() }
    }

    /// Entry for `row`, keyed by `cols`.
    pub fn keyed(idx: usize, row: &[ColumnValue], cols: &[SortColumn]) -> Self {
        SortEntry {
            idx,
            keys: cache_keys(row, cols),
        }
    }
}

pub type SortSet = Vec<SortEntry>;

/// Tie placement for binary-search insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPolicy {
    /// Before every equal element
    FirstAvailable,
    /// After every equal element
    LastAvailable,
}

/// How `Sorter::sort` reached the requested ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOutcome {
    Reversed,
    Extended,
    Full,
}

fn cache_keys(row: &[ColumnValue], cols: &[SortColumn]) -> Vec<ColumnValue> {
    cols.iter()
        .map(|&(slot, _)| row.get(slot).cloned().unwrap_or(ColumnValue::Null))
        .collect()
}

/// Compare two key caches under `cols`.
pub fn compare_keys(a: &[ColumnValue], b: &[ColumnValue], cols: &[SortColumn]) -> Ordering {
    for (i, &(_, direction)) in cols.iter().enumerate() {
        let ord = direction.apply(compare_values(&a[i], &b[i]));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_entries(a: &SortEntry, b: &SortEntry, cols: &[SortColumn]) -> Ordering {
    compare_keys(&a.keys, &b.keys, cols).then(a.idx.cmp(&b.idx))
}

/// Full sort of `set` by `cols`, refreshing every key cache.
pub fn sort(set: &mut SortSet, rows: &[Row], cols: &[SortColumn]) {
    for entry in set.iter_mut() {
        entry.keys = cache_keys(&rows[entry.idx], cols);
    }
    set.sort_by(|a, b| compare_entries(a, b, cols));
}

/// Re-sort only within runs that compare equal under `existing`, using the
/// trailing columns of `cols` as tiebreakers. `existing` must be a prefix of
/// `cols` and `set` must already be ordered by it.
pub fn sort_extend(set: &mut SortSet, rows: &[Row], existing: &[SortColumn], cols: &[SortColumn]) {
    let n = existing.len();
    for entry in set.iter_mut() {
        entry.keys = cache_keys(&rows[entry.idx], cols);
    }

    let tail = &cols[n..];
    let mut start = 0;
    while start < set.len() {
        let mut end = start + 1;
        while end < set.len()
            && compare_keys(&set[start].keys[..n], &set[end].keys[..n], existing) == Ordering::Equal
        {
            end += 1;
        }
        if end - start > 1 {
            set[start..end].sort_by(|a, b| compare_keys(&a.keys[n..], &b.keys[n..], tail).then(a.idx.cmp(&b.idx)));
        }
        start = end;
    }
}

/// True when `new` is `existing` with every direction flipped.
pub fn sort_reversed(existing: &[SortColumn], new: &[SortColumn]) -> bool {
    !existing.is_empty()
        && existing.len() == new.len()
        && existing
            .iter()
            .zip(new)
            .all(|(&(a, da), &(b, db))| a == b && da.flip() == db)
}

/// True when `new` is `existing` plus one or more trailing columns.
pub fn sort_extends(existing: &[SortColumn], new: &[SortColumn]) -> bool {
    !existing.is_empty() && new.len() > existing.len() && new[..existing.len()] == *existing
}

/// Binary search for where `item` belongs in the ordered slice `items`.
pub fn sort_position<T, F>(items: &[T], item: &T, compare: F, policy: InsertPolicy) -> usize
where
    F: Fn(&T, &T) -> Ordering,
{
    items.partition_point(|existing| match policy {
        InsertPolicy::FirstAvailable => compare(existing, item) == Ordering::Less,
        InsertPolicy::LastAvailable => compare(existing, item) != Ordering::Greater,
    })
}

/// Sort columns plus reverse flag.
///
/// The physical order of a set managed by the sorter is ascending under
/// `physical_columns()`; reading it back to front when `reversed` gives the
/// order of `columns()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sorter {
    cols: Option<Vec<SortColumn>>,
    reverse: bool,
}

impl Sorter {
    pub fn new() -> Self {
        Sorter::default()
    }

    pub fn columns(&self) -> Option<&[SortColumn]> {
        self.cols.as_deref()
    }

    pub fn is_sorted(&self) -> bool {
        self.cols.is_some()
    }

    pub fn is_reversed(&self) -> bool {
        self.reverse
    }

    /// Columns the set is physically ordered by.
    pub fn physical_columns(&self) -> Vec<SortColumn> {
        match &self.cols {
            Some(cols) if self.reverse => cols.iter().map(|&(s, d)| (s, d.flip())).collect(),
            Some(cols) => cols.clone(),
            None => Vec::new(),
        }
    }

    /// Physical index of a displayed position in a set of length `len`.
    #[inline]
    pub fn physical(&self, pos: usize, len: usize) -> usize {
        if self.reverse {
            len - 1 - pos
        } else {
            pos
        }
    }

    /// Reorder `set` by `cols`, choosing flip, extend or full sort.
    pub fn sort(&mut self, set: &mut SortSet, rows: &[Row], cols: Vec<SortColumn>) -> SortOutcome {
        let existing = self.cols.clone().unwrap_or_default();
        let outcome = if sort_reversed(&existing, &cols) {
            self.reverse = !self.reverse;
            SortOutcome::Reversed
        } else if !self.reverse && sort_extends(&existing, &cols) {
            sort_extend(set, rows, &existing, &cols);
            SortOutcome::Extended
        } else {
            sort(set, rows, &cols);
            self.reverse = false;
            SortOutcome::Full
        };
        debug!("sort {:?} over {} rows: {:?}", cols, set.len(), outcome);
        self.cols = Some(cols);
        outcome
    }

    /// Full sort by the current columns, clearing the reverse flag.
    pub fn resort(&mut self, set: &mut SortSet, rows: &[Row]) {
        if let Some(cols) = &self.cols {
            sort(set, rows, cols);
            self.reverse = false;
        }
    }

    pub fn clear(&mut self) {
        self.cols = None;
        self.reverse = false;
    }

    /// Entry for a new row, keyed by the current columns.
    pub fn entry(&self, idx: usize, row: &[ColumnValue]) -> SortEntry {
        match &self.cols {
            Some(cols) => SortEntry::keyed(idx, row, cols),
            None => SortEntry::new(idx),
        }
    }

    /// Insert `entry` where it belongs, returning its displayed position.
    /// Unsorted sets append.
    pub fn insert(&self, set: &mut SortSet, entry: SortEntry) -> usize {
        if self.cols.is_none() {
            set.push(entry);
            return set.len() - 1;
        }
        let physical_cols = self.physical_columns();
        let pos = sort_position(
            set,
            &entry,
            |a, b| compare_keys(&a.keys, &b.keys, &physical_cols),
            InsertPolicy::LastAvailable,
        );
        set.insert(pos, entry);
        self.physical(pos, set.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SortDirection::{Asc, Dsc};
    use crate::test_data::{test_table, text};

    fn full_set(n: usize) -> SortSet {
        (0..n).map(SortEntry::new).collect()
    }

    fn keys_of(set: &SortSet, rows: &[Row], slot: usize) -> Vec<String> {
        set.iter().map(|e| text(&rows[e.idx][slot])).collect()
    }

    #[test]
    fn test_full_sort_is_stable_by_storage_index() {
        let table = test_table();
        let mut set = full_set(table.len());
        sort(&mut set, table.rows(), &[(1, Asc)]);
        let idx: Vec<usize> = set.iter().map(|e| e.idx).collect();
        assert_eq!(idx, (0..24).collect::<Vec<_>>());

        sort(&mut set, table.rows(), &[(1, Dsc)]);
        let idx: Vec<usize> = set.iter().take(3).map(|e| e.idx).collect();
        assert_eq!(idx, vec![16, 17, 18]);
    }

    #[test]
    fn test_sort_extend_matches_full_sort() {
        let table = test_table();
        let cols = vec![(1, Asc), (2, Dsc), (4, Asc)];

        let mut extended = full_set(table.len());
        sort(&mut extended, table.rows(), &cols[..1]);
        sort_extend(&mut extended, table.rows(), &cols[..1], &cols);

        let mut full = full_set(table.len());
        sort(&mut full, table.rows(), &cols);

        assert_eq!(extended, full);
        assert_eq!(keys_of(&full, table.rows(), 2)[..8], ["U2", "U2", "U2", "U2", "I2", "I2", "I2", "I2"]);
    }

    #[test]
    fn test_sorter_decision_tree() {
        let table = test_table();
        let mut set = full_set(table.len());
        let mut sorter = Sorter::new();

        assert_eq!(sorter.sort(&mut set, table.rows(), vec![(2, Asc)]), SortOutcome::Full);
        assert_eq!(sorter.sort(&mut set, table.rows(), vec![(2, Dsc)]), SortOutcome::Reversed);
        assert!(sorter.is_reversed());
        // extending while reversed falls back to a full sort
        assert_eq!(
            sorter.sort(&mut set, table.rows(), vec![(2, Dsc), (4, Asc)]),
            SortOutcome::Full
        );
        assert!(!sorter.is_reversed());
        assert_eq!(
            sorter.sort(&mut set, table.rows(), vec![(2, Dsc), (4, Asc), (5, Asc)]),
            SortOutcome::Extended
        );
        assert_eq!(sorter.sort(&mut set, table.rows(), vec![(5, Asc)]), SortOutcome::Full);
    }

    #[test]
    fn test_reverse_round_trip() {
        let table = test_table();
        let mut set = full_set(table.len());
        let mut sorter = Sorter::new();
        let cols = vec![(4, Asc), (5, Dsc)];

        sorter.sort(&mut set, table.rows(), cols.clone());
        let first = set.clone();
        sorter.sort(&mut set, table.rows(), vec![(4, Dsc), (5, Asc)]);
        assert!(sorter.is_reversed());
        // physical order untouched, displayed order reads back to front
        assert_eq!(set, first);
        assert_eq!(set[sorter.physical(0, set.len())].idx, first[23].idx);
        sorter.sort(&mut set, table.rows(), cols);
        assert!(!sorter.is_reversed());
        assert_eq!(set, first);
    }

    #[test]
    fn test_sort_position_policies() {
        let values = vec![1, 3, 3, 3, 7];
        let cmp = |a: &i32, b: &i32| a.cmp(b);
        assert_eq!(sort_position(&values, &3, cmp, InsertPolicy::FirstAvailable), 1);
        assert_eq!(sort_position(&values, &3, cmp, InsertPolicy::LastAvailable), 4);
        assert_eq!(sort_position(&values, &0, cmp, InsertPolicy::LastAvailable), 0);
        assert_eq!(sort_position(&values, &9, cmp, InsertPolicy::FirstAvailable), 5);
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut table = test_table();
        let mut set = full_set(table.len());
        let mut sorter = Sorter::new();
        sorter.sort(&mut set, table.rows(), vec![(1, Asc)]);

        let idx = table
            .insert(crate::test_data::row("key25", "G1", "U2", "T3", 100, 5.0))
            .unwrap();
        let entry = sorter.entry(idx, &table.rows()[idx]);
        let pos = sorter.insert(&mut set, entry);
        // after the last G1
        assert_eq!(pos, 8);
        assert_eq!(set[8].idx, 24);
    }

    #[test]
    fn test_insert_while_reversed() {
        let mut table = test_table();
        let mut set = full_set(table.len());
        let mut sorter = Sorter::new();
        sorter.sort(&mut set, table.rows(), vec![(1, Asc)]);
        sorter.sort(&mut set, table.rows(), vec![(1, Dsc)]);

        let idx = table
            .insert(crate::test_data::row("key25", "G3", "U2", "T3", 100, 5.0))
            .unwrap();
        let entry = sorter.entry(idx, &table.rows()[idx]);
        let pos = sorter.insert(&mut set, entry);
        // G3 first when descending, physical end of the set
        assert_eq!(pos, 0);
        assert_eq!(set[sorter.physical(pos, set.len())].idx, 24);
    }

    #[test]
    fn test_unsorted_insert_appends() {
        let mut set = full_set(3);
        let sorter = Sorter::new();
        assert_eq!(sorter.insert(&mut set, SortEntry::new(3)), 3);
    }

    #[test]
    fn test_nulls_sort_last_ascending() {
        let rows: Vec<Row> = vec![
            vec![ColumnValue::Null],
            vec![ColumnValue::Int32(2)],
            vec![ColumnValue::Int32(1)],
        ];
        let mut set = full_set(3);
        sort(&mut set, &rows, &[(0, Asc)]);
        assert_eq!(set.iter().map(|e| e.idx).collect::<Vec<_>>(), vec![2, 1, 0]);
        sort(&mut set, &rows, &[(0, Dsc)]);
        assert_eq!(set.iter().map(|e| e.idx).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_sort_with_nan_cells() {
        let rows: Vec<Row> = (0..64)
            .map(|i| {
                let v = if i % 3 == 0 { f64::NAN } else { ((i * 37) % 64) as f64 - 20.0 };
                vec![ColumnValue::Float64(v)]
            })
            .collect();
        for cols in [[(0, Asc)], [(0, Dsc)]] {
            let mut set = full_set(rows.len());
            sort(&mut set, &rows, &cols);
            for pair in set.windows(2) {
                assert_ne!(compare_entries(&pair[0], &pair[1], &cols), Ordering::Greater);
            }
        }

        let mut set = full_set(rows.len());
        sort(&mut set, &rows, &[(0, Asc)]);
        let nans = set.iter().filter(|e| rows[e.idx][0].as_f64().map_or(false, f64::is_nan)).count();
        assert_eq!(nans, 22);
        assert!(set[64 - nans..].iter().all(|e| e.idx % 3 == 0));
        assert_eq!(set[0].keys[0], ColumnValue::Float64(-18.0));
    }
}

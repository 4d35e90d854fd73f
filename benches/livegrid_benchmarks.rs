use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use livegrid::*;

const GROUPS: [&str; 5] = ["Energy", "Financials", "Health", "Industrials", "Technology"];
const REGIONS: [&str; 4] = ["APAC", "EMEA", "LATAM", "NA"];

fn columns() -> Vec<Column> {
    vec![
        Column::new("id").typed(ColumnType::String),
        Column::new("sector").typed(ColumnType::String),
        Column::new("region").typed(ColumnType::String),
        Column::new("price").typed(ColumnType::Float64).aggregate(Aggregate::Avg),
        Column::new("qty").typed(ColumnType::Int32).aggregate(Aggregate::Sum),
    ]
}

fn bench_row(i: usize) -> Row {
    vec![
        format!("id{:06}", i).into(),
        GROUPS[i % GROUPS.len()].into(),
        REGIONS[(i / 7) % REGIONS.len()].into(),
        (((i * 7919) % 10007) as f64 / 10.0).into(),
        (((i * 31) % 1000) as i32).into(),
    ]
}

fn bench_table(size: usize) -> Table {
    let mut table = Table::new("benchmark", columns(), "id").unwrap();
    for i in 0..size {
        table.insert(bench_row(i)).unwrap();
    }
    table.drain_changes();
    table
}

fn bench_full_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("rowset_full_sort");

    for size in [1000, 10000, 100000].iter() {
        let table = bench_table(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut rowset = RowSet::new(&table, table.columns(), 0).unwrap();
                rowset.sort(table.rows(), vec![(3, SortDirection::Asc)]);
                black_box(rowset.size())
            });
        });
    }
    group.finish();
}

fn bench_extend_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("rowset_extend_sort");

    for size in [1000, 10000, 100000].iter() {
        let table = bench_table(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter_batched(
                || {
                    let mut rowset = RowSet::new(&table, table.columns(), 0).unwrap();
                    rowset.sort(table.rows(), vec![(1, SortDirection::Asc)]);
                    rowset
                },
                |mut rowset| {
                    rowset.sort(table.rows(), vec![(1, SortDirection::Asc), (3, SortDirection::Dsc)]);
                    rowset
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("rowset_filter");

    for size in [1000, 10000, 100000].iter() {
        let table = bench_table(*size);
        let filter = Filter::and(vec![Filter::equals("sector", "Health"), Filter::starts_with("region", "e")]);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut rowset = RowSet::new(&table, table.columns(), 0).unwrap();
                rowset.filter(table.rows(), black_box(filter.clone())).unwrap();
                black_box(rowset.size())
            });
        });
    }
    group.finish();
}

fn bench_group_by(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_by_two_levels");

    for size in [1000, 10000, 100000].iter() {
        let table = bench_table(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let rowset = GroupRowSet::new(
                    &table,
                    table.columns(),
                    vec![(1, SortDirection::Asc), (2, SortDirection::Asc)],
                    100,
                    None,
                    Vec::new(),
                )
                .unwrap();
                black_box(rowset.size())
            });
        });
    }
    group.finish();
}

fn bench_insert_into_sorted_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_into_sorted_view");

    for size in [1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_batched(
                || {
                    let table = bench_table(size);
                    let mut rowset = RowSet::new(&table, table.columns(), 100).unwrap();
                    rowset.sort(table.rows(), vec![(3, SortDirection::Asc)]);
                    rowset.set_range(table.rows(), Range::new(0, 50), false);
                    (table, rowset)
                },
                |(mut table, mut rowset)| {
                    for i in size..size + 100 {
                        let index = table.insert(bench_row(i)).unwrap();
                        black_box(rowset.insert(table.rows(), index));
                    }
                    table.drain_changes();
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_full_sort,
    bench_extend_sort,
    bench_filter,
    bench_group_by,
    bench_insert_into_sorted_view,
);

criterion_main!(benches);

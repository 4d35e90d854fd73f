/// Grouping Example
///
/// This example demonstrates:
/// - Grouping a view by two columns with aggregates
/// - Expanding groups with a group state
/// - Aggregates following updates
/// - Reading filter picker counts for a column

use livegrid::{
    Aggregate, Column, ColumnType, DataType, DataView, GroupState, IncrementalView, Range, RowData, SortCriterion,
    Table, ViewOptions, ViewUpdate,
};

fn print_grouped(view: &DataView, data: &RowData) {
    let meta = view.meta();
    for row in &data.rows {
        let depth = row[meta.depth].as_i64().unwrap_or(0);
        let indent = "  ".repeat(depth.unsigned_abs() as usize);
        let marker = if depth < 0 { "-" } else if depth > 0 { "+" } else { " " };
        let cells: Vec<String> = row[..meta.column_count()].iter().map(ToString::to_string).collect();
        println!("   {}{} {} (count {})", indent, marker, cells.join(" | "), row[meta.count]);
    }
}

fn main() -> livegrid::Result<()> {
    println!("=== LiveGrid Grouping Example ===\n");

    let columns = vec![
        Column::new("trade").typed(ColumnType::String),
        Column::new("desk").typed(ColumnType::String),
        Column::new("book").typed(ColumnType::String),
        Column::new("notional").typed(ColumnType::Float64).aggregate(Aggregate::Sum),
        Column::new("trades").typed(ColumnType::Int32).aggregate(Aggregate::Sum),
    ];
    let mut table = Table::new("trades", columns, "trade")?;
    let desks = ["Rates", "Credit", "FX"];
    let books = ["Flow", "Prop"];
    for i in 0..18usize {
        table.insert(vec![
            format!("T{:03}", i).into(),
            desks[i % desks.len()].into(),
            books[(i / 3) % books.len()].into(),
            (1_000_000.0 * (1 + i % 5) as f64).into(),
            1.into(),
        ])?;
    }
    table.drain_changes();

    // 1. Group by desk, then book
    println!("1. Grouped by desk and book:");
    let mut view = DataView::new(
        &table,
        ViewOptions {
            group_by: vec![SortCriterion::asc("desk"), SortCriterion::asc("book")],
            ..Default::default()
        },
    )?;
    if let Some(data) = view.set_range(&table, Range::new(0, 30), false, DataType::RowData) {
        print_grouped(&view, &data);
    }

    // 2. Expand one desk, and every book under another
    println!("\n2. Expanding Credit, and FX with all of its books:");
    let mut state = GroupState::new();
    state.expand(&["Credit"]);
    state.expand(&["FX", "*"]);
    if let Some(data) = view.set_group_state(&table, state) {
        print_grouped(&view, &data);
    }

    // 3. An update re-aggregates the groups above the leaf
    println!("\n3. Raising the notional of T004:");
    table.update_by_key(&"T004".into(), &[("notional", 9_000_000.0.into())])?;
    let changes = table.drain_changes();
    view.apply_changes(&table, &changes);
    for update in view.take_updates() {
        if let ViewUpdate::Update(updates) = update {
            println!("   {}", serde_json::to_string(&updates).unwrap());
        }
    }

    // 4. Filter picker for the book column
    println!("\n4. Filter picker for book:");
    let data = view.get_filter_data(&table, "book", None, Some(Range::new(0, 10)))?;
    for row in &data.rows {
        println!("   {} {} of {}", row[0], row[1], row[2]);
    }
    if let Some(stats) = data.stats {
        println!("   {} values, {} selected", stats.total_row_count, stats.total_selected);
    }

    println!("\n=== Example Complete ===");
    Ok(())
}

/// Basic Grid Example
///
/// This example demonstrates:
/// - Creating a table with a primary key
/// - Opening a sorted, windowed view on it
/// - Seeing inserts and updates arrive as deltas
/// - Filtering and selecting rows

use livegrid::{
    Column, ColumnType, ColumnValue, DataType, DataView, Filter, IncrementalView, Range, RowData, SortCriterion,
    Table, ViewOptions, ViewUpdate,
};

fn print_rows(view: &DataView, data: &RowData) {
    let meta = view.meta();
    for row in &data.rows {
        let cells: Vec<String> = row[..meta.column_count()].iter().map(ToString::to_string).collect();
        println!("   [{}] {}", row[meta.idx], cells.join(" | "));
    }
    println!("   ({} rows in view)", data.size);
}

fn sync(view: &mut DataView, table: &mut Table) {
    let changes = table.drain_changes();
    view.apply_changes(table, &changes);
    for update in view.take_updates() {
        match update {
            ViewUpdate::Update(updates) => println!("   update: {}", serde_json::to_string(&updates).unwrap()),
            ViewUpdate::Rowset(data) => {
                println!("   new window:");
                print_rows(view, &data);
            }
            ViewUpdate::Size { size, offset } => println!("   size now {} (offset {})", size, offset),
        }
    }
}

fn main() -> livegrid::Result<()> {
    println!("=== LiveGrid Basic Grid Example ===\n");

    // 1. Create an orders table
    println!("1. Creating orders table...");
    let columns = vec![
        Column::new("order").typed(ColumnType::String),
        Column::new("customer").typed(ColumnType::String),
        Column::new("status").typed(ColumnType::String),
        Column::new("amount").typed(ColumnType::Float64),
    ];
    let mut table = Table::new("orders", columns, "order")?;

    let orders = [
        ("A-100", "Acme", "open", 250.0),
        ("A-101", "Globex", "filled", 75.5),
        ("A-102", "Initech", "open", 1200.0),
        ("A-103", "Acme", "cancelled", 40.0),
        ("A-104", "Umbrella", "open", 310.25),
        ("A-105", "Globex", "filled", 980.0),
    ];
    for (order, customer, status, amount) in orders {
        table.insert(vec![order.into(), customer.into(), status.into(), amount.into()])?;
    }
    table.drain_changes();
    println!("   {} rows\n", table.len());

    // 2. Open a view sorted by amount, largest first
    println!("2. View sorted by amount (descending), rows 0-4:");
    let mut view = DataView::new(
        &table,
        ViewOptions {
            sort_criteria: vec![SortCriterion::dsc("amount")],
            ..Default::default()
        },
    )?;
    if let Some(data) = view.set_range(&table, Range::new(0, 4), false, DataType::RowData) {
        print_rows(&view, &data);
    }

    // 3. Inserts land in sort order
    println!("\n3. Inserting a large order...");
    table.insert(vec!["A-106".into(), "Initech".into(), "open".into(), 5000.0.into()])?;
    sync(&mut view, &mut table);

    println!("\n4. Inserting a small order (below the window)...");
    table.insert(vec!["A-107".into(), "Acme".into(), "open".into(), 5.0.into()])?;
    sync(&mut view, &mut table);

    // 5. Cell updates of visible rows arrive as positioned changes
    println!("\n5. Updating the status of A-102...");
    table.update_by_key(&"A-102".into(), &[("status", ColumnValue::from("filled"))])?;
    sync(&mut view, &mut table);

    // 6. Filter
    println!("\n6. Only open orders:");
    let (data, _) = view.filter(&table, Some(Filter::equals("status", "open")), DataType::RowData, false)?;
    if let Some(data) = data {
        print_rows(&view, &data);
    }

    // 7. Select the first displayed row
    println!("\n7. Selecting the first row:");
    let updates = view.select(&table, 0, false, false);
    println!("   {}", serde_json::to_string(&updates).unwrap());

    println!("\n=== Example Complete ===");
    Ok(())
}

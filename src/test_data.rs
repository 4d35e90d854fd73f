/// Shared 24-row fixture for unit tests.
use crate::column::{Aggregate, Column, ColumnType, ColumnValue};
use crate::table::Table;

pub fn test_columns() -> Vec<Column> {
    vec![
        Column::new("Key").typed(ColumnType::String),
        Column::new("Group1").typed(ColumnType::String),
        Column::new("Group2").typed(ColumnType::String),
        Column::new("Group3").typed(ColumnType::String),
        Column::new("Qty").typed(ColumnType::Int32).aggregate(Aggregate::Sum),
        Column::new("Price").typed(ColumnType::Float64).aggregate(Aggregate::Avg),
    ]
}

// (key, group1, group2, group3, qty, price)
const ROWS: [(&str, &str, &str, &str, i32, f64); 24] = [
    ("key01", "G1", "U2", "T3", 101, 5.0),
    ("key02", "G1", "U2", "T3", 102, 5.0),
    ("key03", "G1", "U2", "T4", 100, 4.0),
    ("key04", "G1", "U2", "T4", 99, 5.0),
    ("key05", "G1", "I2", "T3", 100, 9.0),
    ("key06", "G1", "I2", "T3", 45, 5.0),
    ("key07", "G1", "I2", "T4", 100, 1.0),
    ("key08", "G1", "I2", "T5", 102, 5.0),
    ("key09", "G2", "U2", "T3", 100, 5.0),
    ("key10", "G2", "U2", "T3", 100, 5.0),
    ("key11", "G2", "I2", "T3", 100, 5.0),
    ("key12", "G2", "I2", "T3", 100, 5.0),
    ("key13", "G2", "O2", "T3", 100, 5.0),
    ("key14", "G2", "O2", "T3", 100, 5.0),
    ("key15", "G2", "O2", "T3", 100, 5.0),
    ("key16", "G2", "O2", "T3", 100, 5.0),
    ("key17", "G3", "E2", "T3", 110, 5.0),
    ("key18", "G3", "E2", "T3", 101, 5.0),
    ("key19", "G3", "E2", "T3", 100, 5.0),
    ("key20", "G3", "E2", "T3", 104, 5.0),
    ("key21", "G3", "A2", "T3", 100, 5.0),
    ("key22", "G3", "A2", "T3", 95, 5.0),
    ("key23", "G3", "I2", "T3", 94, 5.0),
    ("key24", "G3", "O2", "T3", 100, 5.0),
];

pub fn row(key: &str, g1: &str, g2: &str, g3: &str, qty: i32, price: f64) -> Vec<ColumnValue> {
    vec![
        key.into(),
        g1.into(),
        g2.into(),
        g3.into(),
        qty.into(),
        price.into(),
    ]
}

pub fn test_table() -> Table {
    let mut table = match Table::new("test", test_columns(), "Key") {
        Ok(table) => table,
        Err(e) => panic!("fixture table: {}", e),
    };
    for (key, g1, g2, g3, qty, price) in ROWS {
        if let Err(e) = table.insert(row(key, g1, g2, g3, qty, price)) {
            panic!("fixture row {}: {}", key, e);
        }
    }
    table.drain_changes();
    table
}

/// String value of a cell, for compact assertions.
pub fn text(value: &ColumnValue) -> String {
    value.to_string()
}

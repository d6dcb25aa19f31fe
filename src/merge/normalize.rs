use crate::merge::Header;
use crate::workbook::{Row, Scalar};
use std::collections::HashMap;

/// Re-expresses `row` with exactly the header's keys, in header order.
/// Columns the row lacks are filled with `Scalar::Empty`.
pub fn normalize(header: &Header, row: &Row) -> Row {
    let values: HashMap<&str, &Scalar> = row.iter().collect();

    let cells = header
        .iter()
        .map(|name| {
            let value = values.get(name).map(|v| (*v).clone()).unwrap_or_default();
            (name.to_string(), value)
        })
        .collect();

    Row::from_unique(cells)
}

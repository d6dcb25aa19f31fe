pub mod dedup;
pub mod filter;
pub mod normalize;
pub mod schema;

pub use dedup::{dedup, Deduplicator};
pub use filter::{RowFilter, SubstringExclusion};
pub use normalize::normalize;
pub use schema::{Header, SchemaUnifier};

use crate::error::Result;
use crate::workbook::Row;

/// The header plus the normalized, deduplicated rows of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedDataset {
    pub header: Header,
    pub rows: Vec<Row>,
}

impl MergedDataset {
    /// Normalizes every row against `header`, then drops repeats. Stops at
    /// the first row that could not be produced.
    pub fn assemble<I>(header: Header, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<Row>>,
    {
        let mut deduplicator = Deduplicator::new();
        let mut kept = Vec::new();

        for row in rows {
            let row = normalize(&header, &row?);
            if deduplicator.admit(&row) {
                kept.push(row);
            }
        }

        Ok(Self { header, rows: kept })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

use crate::archive::ArchiveEntry;
use crate::error::{MergeError, Result};
use crate::workbook::{Row, Scalar};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, instrument};

const EMPTY_HEADER: &str = "__EMPTY";

/// Turns the first sheet of a workbook into header-keyed rows.
#[derive(Debug, Clone, Default)]
pub struct WorkbookParser;

impl WorkbookParser {
    pub fn new() -> Self {
        Self
    }

    /// `file_name` is the archive the entry came from and is only used to
    /// attribute errors.
    #[instrument(skip(self, entry), fields(entry = %entry.name, bytes = entry.bytes.len()))]
    pub fn parse(&self, file_name: &str, entry: ArchiveEntry) -> Result<Vec<Row>> {
        let ArchiveEntry { name, bytes } = entry;
        let data: Arc<[u8]> = Arc::from(bytes);

        let mut workbook =
            open_workbook_auto_from_rs(Cursor::new(data)).map_err(|e| MergeError::WorkbookParse {
                file: file_name.to_string(),
                entry: name.clone(),
                message: e.to_string(),
            })?;

        let range = match workbook.worksheet_range_at(0) {
            None => {
                return Err(MergeError::EmptyWorkbook {
                    file: file_name.to_string(),
                    entry: name,
                })
            }
            Some(range) => range.map_err(|e| MergeError::WorkbookParse {
                file: file_name.to_string(),
                entry: name.clone(),
                message: e.to_string(),
            })?,
        };

        let mut sheet_rows = range.rows();
        let header = match sheet_rows.next() {
            Some(cells) => header_names(cells),
            None => {
                debug!("first sheet is empty");
                return Ok(Vec::new());
            }
        };

        let mut rows = Vec::new();
        for cells in sheet_rows {
            let values: Vec<Scalar> = cells.iter().map(to_scalar).collect();
            if values.iter().all(Scalar::is_empty) {
                continue;
            }

            let mut padded = values.into_iter();
            let row = header
                .iter()
                .map(|name| (name.clone(), padded.next().unwrap_or_default()))
                .collect::<Vec<_>>();
            rows.push(Row::from_unique(row));
        }

        debug!(columns = header.len(), rows = rows.len(), "parsed first sheet");
        Ok(rows)
    }
}

pub(crate) fn to_scalar(cell: &Data) -> Scalar {
    match cell {
        Data::Empty => Scalar::Empty,
        Data::String(s) => Scalar::text(s.as_str()),
        Data::Int(i) => Scalar::Number(*i as f64),
        Data::Float(f) => Scalar::Number(*f),
        Data::Bool(b) => Scalar::Bool(*b),
        Data::DateTime(d) => Scalar::Number(d.as_f64()),
        // ISO dates, durations and error cells keep their display text.
        other => Scalar::text(other.to_string()),
    }
}

/// Blank header cells become `__EMPTY`, `__EMPTY_1`, ...; repeated names
/// get `_1`, `_2`, ... so every column key is unique.
pub(crate) fn header_names(cells: &[Data]) -> Vec<String> {
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(cells.len());

    for cell in cells {
        let base = match to_scalar(cell) {
            Scalar::Empty => EMPTY_HEADER.to_string(),
            value => value.to_string(),
        };

        let counter = counters.entry(base.clone()).or_insert(0);
        let mut name = base.clone();
        while used.contains(&name) {
            *counter += 1;
            name = format!("{}_{}", base, counter);
        }

        used.insert(name.clone());
        names.push(name);
    }

    names
}

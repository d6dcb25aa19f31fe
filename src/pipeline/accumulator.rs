use crate::error::{MergeError, Result};
use crate::workbook::Row;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Serialize, Deserialize)]
struct StoredRow {
    id: u64,
    row: Row,
}

/// Append-only JSON-lines spill file for rows past the in-memory threshold.
/// Removed from disk when dropped.
pub struct OverflowStore {
    writer: BufWriter<NamedTempFile>,
    next_id: u64,
}

impl OverflowStore {
    pub fn new() -> Result<Self> {
        let file = NamedTempFile::new().map_err(overflow_error)?;
        debug!(path = %file.path().display(), "opened overflow store");
        Ok(Self {
            writer: BufWriter::new(file),
            next_id: 0,
        })
    }

    pub fn append(&mut self, row: Row) -> Result<u64> {
        let id = self.next_id;
        let record = StoredRow { id, row };
        serde_json::to_writer(&mut self.writer, &record).map_err(|e| MergeError::Overflow {
            message: format!("failed to encode row {}: {}", id, e),
        })?;
        self.writer.write_all(b"\n").map_err(overflow_error)?;
        self.next_id += 1;
        Ok(id)
    }

    pub fn len(&self) -> u64 {
        self.next_id
    }

    pub fn is_empty(&self) -> bool {
        self.next_id == 0
    }

    /// Finishes writing and returns the stored rows in id order.
    pub fn into_rows(self) -> Result<OverflowRows> {
        let temp = self
            .writer
            .into_inner()
            .map_err(|e| overflow_error(e.into_error()))?;

        let mut file = temp.reopen().map_err(overflow_error)?;
        file.seek(SeekFrom::Start(0)).map_err(overflow_error)?;

        Ok(OverflowRows {
            lines: BufReader::new(file),
            expected_id: 0,
            _temp: temp,
        })
    }
}

/// Reads an overflow store back. The backing file lives until this is dropped.
pub struct OverflowRows {
    lines: BufReader<File>,
    expected_id: u64,
    _temp: NamedTempFile,
}

impl Iterator for OverflowRows {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        match self.lines.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                let parsed = serde_json::from_str::<StoredRow>(line.trim_end())
                    .map_err(|e| MergeError::Overflow {
                        message: format!("corrupt record after id {}: {}", self.expected_id, e),
                    })
                    .and_then(|record| {
                        if record.id != self.expected_id {
                            return Err(MergeError::Overflow {
                                message: format!(
                                    "expected record {}, found {}",
                                    self.expected_id, record.id
                                ),
                            });
                        }
                        self.expected_id += 1;
                        Ok(record.row)
                    });
                Some(parsed)
            }
            Err(e) => Some(Err(overflow_error(e))),
        }
    }
}

fn overflow_error(error: std::io::Error) -> MergeError {
    MergeError::Overflow {
        message: error.to_string(),
    }
}

/// Per-run row buffer. Rows beyond `spill_threshold` go to an
/// [`OverflowStore`]; reading back yields memory rows first, then spilled
/// rows, which is acceptance order.
pub struct RunAccumulator {
    rows: Vec<Row>,
    spill_threshold: Option<usize>,
    store: Option<OverflowStore>,
}

impl RunAccumulator {
    pub fn new(spill_threshold: Option<usize>) -> Self {
        Self {
            rows: Vec::new(),
            spill_threshold,
            store: None,
        }
    }

    pub fn push(&mut self, row: Row) -> Result<()> {
        match self.spill_threshold {
            Some(limit) if self.rows.len() >= limit => {
                if self.store.is_none() {
                    debug!(threshold = limit, "spilling rows to overflow store");
                    self.store = Some(OverflowStore::new()?);
                }
                if let Some(store) = self.store.as_mut() {
                    store.append(row)?;
                }
            }
            _ => self.rows.push(row),
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len() + self.spilled()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spilled(&self) -> usize {
        self.store.as_ref().map_or(0, |s| s.len() as usize)
    }

    pub fn into_rows(self) -> Result<impl Iterator<Item = Result<Row>>> {
        let spilled = self.store.map(OverflowStore::into_rows).transpose()?;
        Ok(self.rows.into_iter().map(Ok).chain(spilled.into_iter().flatten()))
    }
}

use crate::archive::EntryFilter;
use crate::error::{MergeError, Result};
use crate::scanner::InputFile;
use std::io::{Cursor, Read};
use std::sync::Arc;
use tracing::debug;
use zip::ZipArchive;

/// Location of a matching entry inside an open archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRef {
    pub index: usize,
    pub name: String,
    pub size: u64,
}

/// One spreadsheet pulled out of an archive. Dropped once parsed.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

pub struct ArchiveReader {
    file_name: String,
    archive: ZipArchive<Cursor<Arc<[u8]>>>,
}

impl ArchiveReader {
    pub fn open(input: &InputFile) -> Result<Self> {
        let bytes = input.load().map_err(|e| MergeError::ArchiveCorrupt {
            file: input.name.clone(),
            entry: None,
            message: format!("failed to read file: {}", e),
        })?;

        let archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| MergeError::ArchiveCorrupt {
            file: input.name.clone(),
            entry: None,
            message: e.to_string(),
        })?;

        debug!(file = %input.name, entries = archive.len(), "opened archive");

        Ok(Self {
            file_name: input.name.clone(),
            archive,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Total number of entries, matching or not.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Matching entries in the archive's listed order. Nothing is
    /// decompressed here.
    pub fn spreadsheet_entries(&mut self, filter: &EntryFilter) -> Result<Vec<EntryRef>> {
        let mut entries = Vec::new();

        for index in 0..self.archive.len() {
            let file = self
                .archive
                .by_index_raw(index)
                .map_err(|e| MergeError::ArchiveCorrupt {
                    file: self.file_name.clone(),
                    entry: None,
                    message: format!("failed to list entry #{}: {}", index, e),
                })?;

            if file.is_dir() || !filter.is_spreadsheet_entry(file.name()) {
                continue;
            }

            entries.push(EntryRef {
                index,
                name: file.name().to_string(),
                size: file.size(),
            });
        }

        Ok(entries)
    }

    pub fn read_entry(&mut self, entry: &EntryRef, filter: &EntryFilter) -> Result<ArchiveEntry> {
        let max_size = filter.max_entry_size();
        if !filter.is_size_allowed(entry.size) {
            return Err(self.too_large(entry, entry.size, max_size));
        }

        let file_name = self.file_name.clone();
        let corrupt = |e: &dyn std::fmt::Display| MergeError::ArchiveCorrupt {
            file: file_name.clone(),
            entry: Some(entry.name.clone()),
            message: e.to_string(),
        };

        let file = self.archive.by_index(entry.index).map_err(|e| corrupt(&e))?;

        // Declared sizes can lie; never read past the limit.
        let mut bytes = Vec::with_capacity(entry.size.min(max_size) as usize);
        file.take(max_size.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|e| corrupt(&e))?;

        if bytes.len() as u64 > max_size {
            return Err(self.too_large(entry, bytes.len() as u64, max_size));
        }

        Ok(ArchiveEntry {
            name: entry.name.clone(),
            bytes,
        })
    }

    fn too_large(&self, entry: &EntryRef, size: u64, max_size: u64) -> MergeError {
        MergeError::EntryTooLarge {
            file: self.file_name.clone(),
            entry: entry.name.clone(),
            size,
            max_size,
        }
    }
}

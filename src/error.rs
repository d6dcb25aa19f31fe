use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Archive {file} could not be read: {message}")]
    ArchiveCorrupt {
        file: String,
        entry: Option<String>,
        message: String,
    },

    #[error("Entry {entry} in {file} is not a readable spreadsheet: {message}")]
    WorkbookParse {
        file: String,
        entry: String,
        message: String,
    },

    #[error("Workbook {entry} in {file} has no sheets")]
    EmptyWorkbook { file: String, entry: String },

    #[error("Entry {entry} in {file} is too large: {size} bytes (max: {max_size} bytes)")]
    EntryTooLarge {
        file: String,
        entry: String,
        size: u64,
        max_size: u64,
    },

    #[error("No input archives were provided")]
    EmptyBatch,

    #[error("No valid data found in {files} archive(s)")]
    NoData { files: usize, rows_rejected: usize },

    #[error("A merge run is already in progress")]
    RunInProgress,

    #[error("Operation was cancelled by user")]
    Cancelled,

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },

    #[error("Output file already exists: {path}")]
    OutputExists { path: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Failed to encode delimited output: {0}")]
    Csv(#[from] csv::Error),

    #[error("Overflow store failure: {message}")]
    Overflow { message: String },

    #[error("Merge worker failed: {message}")]
    Worker { message: String },
}

/// Stable error classification carried by worker `error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ArchiveCorrupt,
    WorkbookParse,
    EmptyWorkbook,
    EntryTooLarge,
    EmptyBatch,
    NoData,
    RunInProgress,
    Cancelled,
    Io,
    InvalidPath,
    OutputExists,
    Config,
    Encode,
    Overflow,
    Worker,
}

impl MergeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MergeError::ArchiveCorrupt { .. } => ErrorKind::ArchiveCorrupt,
            MergeError::WorkbookParse { .. } => ErrorKind::WorkbookParse,
            MergeError::EmptyWorkbook { .. } => ErrorKind::EmptyWorkbook,
            MergeError::EntryTooLarge { .. } => ErrorKind::EntryTooLarge,
            MergeError::EmptyBatch => ErrorKind::EmptyBatch,
            MergeError::NoData { .. } => ErrorKind::NoData,
            MergeError::RunInProgress => ErrorKind::RunInProgress,
            MergeError::Cancelled => ErrorKind::Cancelled,
            MergeError::Io(_) => ErrorKind::Io,
            MergeError::InvalidPath { .. } => ErrorKind::InvalidPath,
            MergeError::OutputExists { .. } => ErrorKind::OutputExists,
            MergeError::Config { .. } => ErrorKind::Config,
            MergeError::Csv(_) => ErrorKind::Encode,
            MergeError::Overflow { .. } => ErrorKind::Overflow,
            MergeError::Worker { .. } => ErrorKind::Worker,
        }
    }

    /// Name of the input archive the error is attributed to, if any.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            MergeError::ArchiveCorrupt { file, .. }
            | MergeError::WorkbookParse { file, .. }
            | MergeError::EmptyWorkbook { file, .. }
            | MergeError::EntryTooLarge { file, .. } => Some(file),
            _ => None,
        }
    }

    /// Name of the archive entry the error is attributed to, if any.
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            MergeError::ArchiveCorrupt { entry, .. } => entry.as_deref(),
            MergeError::WorkbookParse { entry, .. }
            | MergeError::EmptyWorkbook { entry, .. }
            | MergeError::EntryTooLarge { entry, .. } => Some(entry),
            _ => None,
        }
    }

    /// Process exit code reported by the command-line tool.
    pub fn exit_code(&self) -> i32 {
        match self {
            MergeError::Cancelled => 130,
            MergeError::EmptyBatch | MergeError::InvalidPath { .. } => 2,
            MergeError::ArchiveCorrupt { .. } => 3,
            MergeError::WorkbookParse { .. } => 4,
            MergeError::EmptyWorkbook { .. } => 5,
            MergeError::NoData { .. } => 6,
            MergeError::EntryTooLarge { .. } => 7,
            MergeError::OutputExists { .. } => 8,
            MergeError::RunInProgress => 9,
            _ => 1,
        }
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for MergeError {
    fn user_message(&self) -> String {
        match self {
            MergeError::ArchiveCorrupt {
                file,
                entry: Some(entry),
                message,
            } => {
                format!("Could not read {} from archive {}: {}", entry, file, message)
            }
            MergeError::ArchiveCorrupt { file, message, .. } => {
                format!("Could not open archive {}: {}", file, message)
            }
            MergeError::WorkbookParse {
                file,
                entry,
                message,
            } => {
                format!("Could not read spreadsheet {} in {}: {}", entry, file, message)
            }
            MergeError::EmptyWorkbook { file, entry } => {
                format!("Spreadsheet {} in {} contains no sheets", entry, file)
            }
            MergeError::EntryTooLarge {
                file,
                entry,
                size,
                max_size,
            } => {
                format!(
                    "Spreadsheet {} in {} is too large: {} (maximum allowed: {})",
                    entry,
                    file,
                    format_bytes(*size),
                    format_bytes(*max_size)
                )
            }
            MergeError::EmptyBatch => "No ZIP archives were selected".to_string(),
            MergeError::NoData {
                files,
                rows_rejected,
            } => {
                if *rows_rejected > 0 {
                    format!(
                        "No valid data found in {} archive(s); {} row(s) were excluded by the row filter",
                        files, rows_rejected
                    )
                } else {
                    format!("No valid data found in {} archive(s)", files)
                }
            }
            MergeError::RunInProgress => {
                "Another merge is still running; wait for it to finish".to_string()
            }
            MergeError::Cancelled => "Operation was cancelled by user".to_string(),
            MergeError::InvalidPath { path } => format!("Invalid input path: {}", path),
            MergeError::OutputExists { path } => format!("Output file already exists: {}", path),
            MergeError::Config { message } => format!("Configuration error: {}", message),
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            MergeError::ArchiveCorrupt { .. } => Some(
                "Check that the file is a complete ZIP archive; re-download or re-create it and try again.".to_string()
            ),
            MergeError::WorkbookParse { .. } => Some(
                "Open the spreadsheet in Excel or LibreOffice and save it again as .xlsx, or exclude it with --extensions.".to_string()
            ),
            MergeError::EmptyWorkbook { .. } => Some(
                "Remove the empty workbook from the archive or add at least one sheet to it.".to_string()
            ),
            MergeError::EntryTooLarge { .. } => Some(
                "Raise filters.max_entry_size in the configuration file.".to_string()
            ),
            MergeError::EmptyBatch => Some(
                "Pass one or more .zip files, or a directory containing them.".to_string()
            ),
            MergeError::NoData { .. } => Some(
                "Check that the archives contain .xlsx/.xls files with a header row, or relax the row filter with --keep-urls.".to_string()
            ),
            MergeError::OutputExists { .. } => Some(
                "Choose a different output file with --output, or use --force to overwrite.".to_string()
            ),
            MergeError::Config { .. } => Some(
                "Check your configuration file syntax and the values passed on the command line.".to_string()
            ),
            MergeError::InvalidPath { .. } => Some(
                "Verify the path exists and is readable.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for MergeError {
    fn from(error: toml::de::Error) -> Self {
        MergeError::Config {
            message: error.to_string(),
        }
    }
}

impl From<regex::Error> for MergeError {
    fn from(error: regex::Error) -> Self {
        MergeError::Config {
            message: format!("Invalid entry pattern: {}", error),
        }
    }
}

pub type Result<T> = std::result::Result<T, MergeError>;

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_friendly_messages() {
        let error = MergeError::ArchiveCorrupt {
            file: "broken.zip".to_string(),
            entry: None,
            message: "invalid Zip archive".to_string(),
        };
        assert!(error.user_message().contains("broken.zip"));
        assert!(error.suggestion().is_some());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
        assert_eq!(format_bytes(500), "500 B");
    }

    #[test]
    fn test_error_context_accessors() {
        let error = MergeError::WorkbookParse {
            file: "batch.zip".to_string(),
            entry: "q1/report.xlsx".to_string(),
            message: "not a workbook".to_string(),
        };
        assert_eq!(error.kind(), ErrorKind::WorkbookParse);
        assert_eq!(error.file_name(), Some("batch.zip"));
        assert_eq!(error.entry_name(), Some("q1/report.xlsx"));

        let error = MergeError::ArchiveCorrupt {
            file: "batch.zip".to_string(),
            entry: None,
            message: "truncated".to_string(),
        };
        assert_eq!(error.file_name(), Some("batch.zip"));
        assert_eq!(error.entry_name(), None);

        let error = MergeError::ArchiveCorrupt {
            file: "batch.zip".to_string(),
            entry: Some("q1/report.xlsx".to_string()),
            message: "Invalid checksum".to_string(),
        };
        assert_eq!(error.entry_name(), Some("q1/report.xlsx"));
        assert!(error.user_message().contains("q1/report.xlsx"));

        assert_eq!(MergeError::EmptyBatch.file_name(), None);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(MergeError::Cancelled.exit_code(), 130);
        assert_eq!(MergeError::EmptyBatch.exit_code(), 2);
        assert_eq!(
            MergeError::NoData {
                files: 1,
                rows_rejected: 0
            }
            .exit_code(),
            6
        );
        assert_eq!(
            MergeError::Config {
                message: "x".to_string()
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_no_data_mentions_rejected_rows() {
        let error = MergeError::NoData {
            files: 2,
            rows_rejected: 3,
        };
        assert!(error.user_message().contains("3 row(s)"));

        let error = MergeError::NoData {
            files: 2,
            rows_rejected: 0,
        };
        assert!(!error.user_message().contains("row(s)"));
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::ArchiveCorrupt).unwrap();
        assert_eq!(json, "\"archive_corrupt\"");
    }
}

use crate::error::{ErrorKind, MergeError};
use crate::workbook::Row;
use serde::{Deserialize, Serialize};

/// Messages streamed from the worker to whoever submitted the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    #[serde(rename_all = "camelCase")]
    Started { total_files: usize },

    /// Sent once per completed file. `preview` holds only the rows newly
    /// added to the preview buffer, so it is empty once the cap is reached.
    #[serde(rename_all = "camelCase")]
    Progress {
        files_completed: usize,
        total_files: usize,
        preview_rows_added: usize,
        preview: Vec<Row>,
        status: String,
    },

    #[serde(rename_all = "camelCase")]
    Error {
        file_name: Option<String>,
        entry_name: Option<String>,
        kind: ErrorKind,
        message: String,
    },

    #[serde(rename_all = "camelCase")]
    Done { row_count: usize },
}

impl WorkerEvent {
    pub fn from_error(error: &MergeError) -> Self {
        WorkerEvent::Error {
            file_name: error.file_name().map(String::from),
            entry_name: error.entry_name().map(String::from),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_event_names_file_and_entry() {
        let error = MergeError::WorkbookParse {
            file: "a.zip".to_string(),
            entry: "book.xlsx".to_string(),
            message: "bad header".to_string(),
        };

        match WorkerEvent::from_error(&error) {
            WorkerEvent::Error {
                file_name,
                entry_name,
                kind,
                ..
            } => {
                assert_eq!(file_name.as_deref(), Some("a.zip"));
                assert_eq!(entry_name.as_deref(), Some("book.xlsx"));
                assert_eq!(kind, ErrorKind::WorkbookParse);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_json_shape() {
        let event = WorkerEvent::Progress {
            files_completed: 1,
            total_files: 2,
            preview_rows_added: 0,
            preview: Vec::new(),
            status: "Processed a.zip".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["filesCompleted"], 1);
        assert_eq!(json["totalFiles"], 2);
        assert_eq!(json["previewRowsAdded"], 0);

        let done = serde_json::to_string(&WorkerEvent::Done { row_count: 3 }).unwrap();
        assert_eq!(done, r#"{"type":"done","rowCount":3}"#);
    }
}

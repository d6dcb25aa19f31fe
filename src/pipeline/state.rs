use crate::workbook::Row;

/// Progress of the run in flight, owned by the controller.
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub total_files: usize,
    pub files_completed: usize,
    pub status: String,
    preview: Vec<Row>,
    preview_limit: usize,
}

impl ProgressState {
    pub fn new(total_files: usize, preview_limit: usize) -> Self {
        Self {
            total_files,
            files_completed: 0,
            status: format!("Starting merge of {} archive(s)", total_files),
            preview: Vec::new(),
            preview_limit,
        }
    }

    /// Appends rows until the cap is reached and returns the ones that
    /// made it in. Rows already in the preview are never removed.
    pub fn extend_preview<'a, I>(&mut self, rows: I) -> &[Row]
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let start = self.preview.len();
        let room = self.preview_limit.saturating_sub(start);
        self.preview.extend(rows.into_iter().take(room).cloned());
        &self.preview[start..]
    }

    pub fn complete_file(&mut self, file_name: &str) {
        self.files_completed += 1;
        self.status = format!(
            "Processed {} ({}/{})",
            file_name, self.files_completed, self.total_files
        );
    }

    pub fn preview(&self) -> &[Row] {
        &self.preview
    }

    pub fn preview_limit(&self) -> usize {
        self.preview_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| [("n", i as f64)].into_iter().collect())
            .collect()
    }

    #[test]
    fn test_preview_stops_at_cap() {
        let mut state = ProgressState::new(2, 5);

        let batch = rows(3);
        assert_eq!(state.extend_preview(&batch).len(), 3);

        let batch = rows(4);
        let added = state.extend_preview(&batch);
        assert_eq!(added.len(), 2);
        assert_eq!(added[0], batch[0]);

        assert!(state.extend_preview(&rows(1)).is_empty());
        assert_eq!(state.preview().len(), 5);
    }

    #[test]
    fn test_complete_file_updates_status() {
        let mut state = ProgressState::new(2, 10);
        state.complete_file("a.zip");
        assert_eq!(state.files_completed, 1);
        assert_eq!(state.status, "Processed a.zip (1/2)");
    }
}

use crate::archive::{ArchiveReader, EntryFilter};
use crate::config::{Config, FilterConfig, DEFAULT_PREVIEW_LIMIT};
use crate::error::{ErrorKind, MergeError, Result};
use crate::export::TabularEncoder;
use crate::merge::{MergedDataset, RowFilter, SchemaUnifier};
use crate::pipeline::{ProgressState, RunAccumulator, WorkerEvent};
use crate::scanner::InputFile;
use crate::ui::GracefulShutdown;
use crate::workbook::{Row, WorkbookParser};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Settings fixed for the duration of one run.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub filters: FilterConfig,
    pub preview_limit: usize,
    pub spill_threshold: Option<usize>,
    pub delimiter: char,
}

impl MergeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            filters: config.filters.clone(),
            preview_limit: config.pipeline.preview_limit,
            spill_threshold: config.pipeline.spill_threshold,
            delimiter: config.output.delimiter,
        }
    }
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            filters: FilterConfig::default(),
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            spill_threshold: None,
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Idle,
    Running,
    Completed {
        row_count: usize,
    },
    Failed {
        kind: ErrorKind,
        file_name: Option<String>,
        entry_name: Option<String>,
        message: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub files_processed: usize,
    pub entries_parsed: usize,
    pub rows_accepted: usize,
    pub rows_rejected: usize,
    pub rows_spilled: usize,
    pub duplicates_removed: usize,
    pub duration: Duration,
}

/// Result of a completed run with at least one surviving row.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub dataset: MergedDataset,
    pub payload: String,
    pub stats: RunStats,
}

impl MergeOutcome {
    pub fn row_count(&self) -> usize {
        self.dataset.len()
    }
}

/// Drives archive reading, parsing, filtering, schema union, normalization,
/// dedup and encoding for one batch at a time.
pub struct MergeController {
    options: MergeOptions,
    row_filter: Arc<dyn RowFilter>,
    entry_filter: EntryFilter,
    parser: WorkbookParser,
    encoder: TabularEncoder,
    state: RunState,
}

impl MergeController {
    pub fn new(options: MergeOptions, row_filter: Arc<dyn RowFilter>) -> Result<Self> {
        let entry_filter = EntryFilter::new(&options.filters)?;
        let encoder = TabularEncoder::with_delimiter(options.delimiter)?;

        Ok(Self {
            options,
            row_filter,
            entry_filter,
            parser: WorkbookParser::new(),
            encoder,
            state: RunState::Idle,
        })
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Runs the whole batch. Every event goes through `sink`; the last one
    /// is always `Done` or `Error`. A run that keeps no rows ends `Completed`
    /// with a row count of zero and returns `NoData`.
    pub fn run(
        &mut self,
        batch: &[InputFile],
        shutdown: &GracefulShutdown,
        sink: &mut dyn FnMut(WorkerEvent),
    ) -> Result<MergeOutcome> {
        if batch.is_empty() {
            return Err(MergeError::EmptyBatch);
        }

        self.state = RunState::Running;
        info!(files = batch.len(), "merge started");

        match self.execute(batch, shutdown, sink) {
            Ok(outcome) => {
                info!(
                    rows = outcome.row_count(),
                    columns = outcome.dataset.header.len(),
                    "merge completed"
                );
                self.state = RunState::Completed {
                    row_count: outcome.row_count(),
                };
                sink(WorkerEvent::Done {
                    row_count: outcome.row_count(),
                });
                Ok(outcome)
            }
            Err(error @ MergeError::NoData { .. }) => {
                warn!("merge finished without any rows");
                self.state = RunState::Completed { row_count: 0 };
                sink(WorkerEvent::Done { row_count: 0 });
                Err(error)
            }
            Err(error) => {
                warn!(kind = ?error.kind(), "merge failed: {}", error);
                self.state = RunState::Failed {
                    kind: error.kind(),
                    file_name: error.file_name().map(String::from),
                    entry_name: error.entry_name().map(String::from),
                    message: error.to_string(),
                };
                sink(WorkerEvent::from_error(&error));
                Err(error)
            }
        }
    }

    fn execute(
        &self,
        batch: &[InputFile],
        shutdown: &GracefulShutdown,
        sink: &mut dyn FnMut(WorkerEvent),
    ) -> Result<MergeOutcome> {
        let start = Instant::now();
        let mut progress = ProgressState::new(batch.len(), self.options.preview_limit);
        let mut accumulator = RunAccumulator::new(self.options.spill_threshold);
        let mut schema = SchemaUnifier::new();
        let mut stats = RunStats::default();

        sink(WorkerEvent::Started {
            total_files: batch.len(),
        });

        for input in batch {
            shutdown.check_shutdown()?;

            let accepted = self.process_file(input, &mut stats)?;
            for row in &accepted {
                schema.observe(row);
            }

            let preview = progress.extend_preview(&accepted).to_vec();
            progress.complete_file(&input.name);
            sink(WorkerEvent::Progress {
                files_completed: progress.files_completed,
                total_files: progress.total_files,
                preview_rows_added: preview.len(),
                preview,
                status: progress.status.clone(),
            });

            for row in accepted {
                accumulator.push(row)?;
            }
        }

        stats.rows_spilled = accumulator.spilled();

        let header = schema.into_header();
        let dataset = MergedDataset::assemble(header, accumulator.into_rows()?)?;
        stats.duplicates_removed = stats.rows_accepted - dataset.len();
        stats.duration = start.elapsed();

        if dataset.is_empty() {
            return Err(MergeError::NoData {
                files: batch.len(),
                rows_rejected: stats.rows_rejected,
            });
        }

        let payload = self.encoder.encode(&dataset)?;

        Ok(MergeOutcome {
            dataset,
            payload,
            stats,
        })
    }

    #[instrument(skip_all, fields(file = %input.name))]
    fn process_file(&self, input: &InputFile, stats: &mut RunStats) -> Result<Vec<Row>> {
        let mut reader = ArchiveReader::open(input)?;
        let entries = reader.spreadsheet_entries(&self.entry_filter)?;

        if entries.is_empty() {
            debug!(entries = reader.len(), "no spreadsheet entries in archive");
        }

        let mut accepted = Vec::new();
        for entry_ref in &entries {
            let entry = reader.read_entry(entry_ref, &self.entry_filter)?;
            let rows = self.parser.parse(&input.name, entry)?;
            stats.entries_parsed += 1;

            for row in rows {
                if self.row_filter.is_acceptable(&row) {
                    accepted.push(row);
                } else {
                    stats.rows_rejected += 1;
                }
            }
        }

        stats.files_processed += 1;
        stats.rows_accepted += accepted.len();
        debug!(entries = entries.len(), accepted = accepted.len(), "archive processed");

        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::SubstringExclusion;
    use crate::test_support::{text_sheet, xlsx, zip_archive, Cell};
    use crate::workbook::Scalar;

    fn archive(name: &str, entries: &[(&str, Vec<u8>)]) -> InputFile {
        InputFile::from_bytes(name, zip_archive(entries))
    }

    fn default_controller() -> MergeController {
        MergeController::new(MergeOptions::default(), Arc::new(SubstringExclusion::default())).unwrap()
    }

    fn run(
        controller: &mut MergeController,
        batch: &[InputFile],
    ) -> (Result<MergeOutcome>, Vec<WorkerEvent>) {
        let shutdown = GracefulShutdown::new_for_test();
        let mut events = Vec::new();
        let result = controller.run(batch, &shutdown, &mut |e| events.push(e));
        (result, events)
    }

    #[test]
    fn test_union_header_with_distinct_rows() {
        let batch = vec![
            archive(
                "one.zip",
                &[("a.xlsx", text_sheet(&["Name", "Email"], &[&["Ann", "ann@example.com"]]))],
            ),
            archive(
                "two.zip",
                &[("b.xlsx", text_sheet(&["Name", "Phone"], &[&["Ann", "555-0100"]]))],
            ),
        ];

        let mut controller = default_controller();
        let (result, _) = run(&mut controller, &batch);
        let outcome = result.unwrap();

        assert_eq!(outcome.dataset.header.names(), &["Name", "Email", "Phone"]);
        assert_eq!(outcome.row_count(), 2);
        assert_eq!(
            outcome.payload,
            "Name,Email,Phone\nAnn,ann@example.com,\nAnn,,555-0100\n"
        );
        assert_eq!(controller.state(), &RunState::Completed { row_count: 2 });
    }

    #[test]
    fn test_union_header_rows_collapse_after_normalization() {
        let batch = vec![
            archive(
                "one.zip",
                &[(
                    "a.xlsx",
                    xlsx(&[vec![Cell::S("Name"), Cell::S("Email")], vec![Cell::S("Ann"), Cell::Blank]]),
                )],
            ),
            archive(
                "two.zip",
                &[(
                    "b.xlsx",
                    xlsx(&[vec![Cell::S("Name"), Cell::S("Phone")], vec![Cell::S("Ann"), Cell::Blank]]),
                )],
            ),
        ];

        let mut controller = default_controller();
        let (result, _) = run(&mut controller, &batch);
        let outcome = result.unwrap();

        assert_eq!(outcome.dataset.header.names(), &["Name", "Email", "Phone"]);
        assert_eq!(outcome.row_count(), 1);
        assert_eq!(outcome.stats.duplicates_removed, 1);
        assert_eq!(outcome.payload, "Name,Email,Phone\nAnn,,\n");
    }

    #[test]
    fn test_url_rows_are_dropped() {
        let batch = vec![archive(
            "links.zip",
            &[(
                "a.xlsx",
                text_sheet(
                    &["Name", "Site"],
                    &[&["Ann", "https://example.com"], &["Bob", "none"]],
                ),
            )],
        )];

        let mut controller = default_controller();
        let (result, _) = run(&mut controller, &batch);
        let outcome = result.unwrap();

        assert_eq!(outcome.row_count(), 1);
        assert_eq!(outcome.dataset.rows[0].get("Name"), Some(&Scalar::text("Bob")));
        assert_eq!(outcome.stats.rows_rejected, 1);
        assert!(!outcome.payload.contains("https://"));
    }

    #[test]
    fn test_archive_without_spreadsheets_contributes_nothing() {
        let batch = vec![
            archive("docs.zip", &[("readme.txt", b"hello".to_vec())]),
            archive("data.zip", &[("a.xlsx", text_sheet(&["Name"], &[&["Ann"]]))]),
        ];

        let mut controller = default_controller();
        let (result, events) = run(&mut controller, &batch);
        assert_eq!(result.unwrap().row_count(), 1);

        let progress: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::Progress {
                    files_completed, ..
                } => Some(*files_completed),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![1, 2]);
    }

    #[test]
    fn test_only_archive_without_spreadsheets_is_no_data() {
        let batch = vec![archive("docs.zip", &[("readme.txt", b"hello".to_vec())])];

        let mut controller = default_controller();
        let (result, events) = run(&mut controller, &batch);

        assert!(matches!(result, Err(MergeError::NoData { files: 1, .. })));
        assert_eq!(controller.state(), &RunState::Completed { row_count: 0 });
        assert_eq!(events.last(), Some(&WorkerEvent::Done { row_count: 0 }));
    }

    #[test]
    fn test_corrupt_archive_fails_the_run() {
        let batch = vec![
            archive("good.zip", &[("a.xlsx", text_sheet(&["Name"], &[&["Ann"]]))]),
            InputFile::from_bytes("broken.zip", b"not a zip at all".to_vec()),
        ];

        let mut controller = default_controller();
        let (result, events) = run(&mut controller, &batch);

        match result {
            Err(MergeError::ArchiveCorrupt { file, .. }) => assert_eq!(file, "broken.zip"),
            other => panic!("expected ArchiveCorrupt, got {:?}", other.map(|o| o.payload)),
        }

        match events.last() {
            Some(WorkerEvent::Error {
                file_name, kind, ..
            }) => {
                assert_eq!(file_name.as_deref(), Some("broken.zip"));
                assert_eq!(*kind, ErrorKind::ArchiveCorrupt);
            }
            other => panic!("expected error event, got {:?}", other),
        }
        assert!(!events.iter().any(|e| matches!(e, WorkerEvent::Done { .. })));
        assert!(matches!(controller.state(), RunState::Failed { .. }));
    }

    #[test]
    fn test_unreadable_entry_names_file_and_entry() {
        let batch = vec![archive("a.zip", &[("broken.xlsx", b"garbage".to_vec())])];

        let mut controller = default_controller();
        let (result, _) = run(&mut controller, &batch);

        match controller.state() {
            RunState::Failed {
                kind,
                file_name,
                entry_name,
                ..
            } => {
                assert_eq!(*kind, ErrorKind::WorkbookParse);
                assert_eq!(file_name.as_deref(), Some("a.zip"));
                assert_eq!(entry_name.as_deref(), Some("broken.xlsx"));
            }
            other => panic!("unexpected state {:?}", other),
        }
        assert!(result.is_err());
    }

    #[test]
    fn test_preview_caps_while_dataset_keeps_everything() {
        let body: Vec<Vec<String>> = (0..600).map(|i| vec![format!("row {}", i)]).collect();
        let refs: Vec<Vec<&str>> = body.iter().map(|r| r.iter().map(String::as_str).collect()).collect();
        let slices: Vec<&[&str]> = refs.iter().map(Vec::as_slice).collect();

        let half = slices.len() / 2;
        let batch = vec![
            archive("a.zip", &[("a.xlsx", text_sheet(&["Value"], &slices[..half]))]),
            archive("b.zip", &[("b.xlsx", text_sheet(&["Value"], &slices[half..]))]),
        ];

        let mut controller = default_controller();
        let (result, events) = run(&mut controller, &batch);
        assert_eq!(result.unwrap().row_count(), 600);

        let added: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::Progress {
                    preview_rows_added,
                    ..
                } => Some(*preview_rows_added),
                _ => None,
            })
            .collect();
        assert_eq!(added, vec![300, 200]);
    }

    #[test]
    fn test_spilled_rows_keep_order() {
        let batch = vec![archive(
            "a.zip",
            &[(
                "a.xlsx",
                text_sheet(&["N"], &[&["1"], &["2"], &["1"], &["3"], &["4"]]),
            )],
        )];

        let options = MergeOptions {
            spill_threshold: Some(2),
            ..MergeOptions::default()
        };
        let mut controller =
            MergeController::new(options, Arc::new(SubstringExclusion::default())).unwrap();
        let (result, _) = run(&mut controller, &batch);
        let outcome = result.unwrap();

        assert_eq!(outcome.stats.rows_spilled, 3);
        assert_eq!(outcome.payload, "N\n1\n2\n3\n4\n");
    }

    #[test]
    fn test_cancellation_between_files() {
        let batch = vec![
            archive("a.zip", &[("a.xlsx", text_sheet(&["Name"], &[&["Ann"]]))]),
            archive("b.zip", &[("b.xlsx", text_sheet(&["Name"], &[&["Bob"]]))]),
        ];

        let shutdown = GracefulShutdown::new_for_test();
        let mut controller = default_controller();
        let trigger = shutdown.clone();
        let mut events = Vec::new();

        let result = controller.run(&batch, &shutdown, &mut |event| {
            if matches!(event, WorkerEvent::Progress { .. }) {
                trigger.request_shutdown();
            }
            events.push(event);
        });

        assert!(matches!(result, Err(MergeError::Cancelled)));
        let completed = events
            .iter()
            .filter(|e| matches!(e, WorkerEvent::Progress { .. }))
            .count();
        assert_eq!(completed, 1);
    }

    #[test]
    fn test_empty_batch_stays_idle() {
        let mut controller = default_controller();
        let (result, events) = run(&mut controller, &[]);

        assert!(matches!(result, Err(MergeError::EmptyBatch)));
        assert!(events.is_empty());
        assert_eq!(controller.state(), &RunState::Idle);
    }

    #[test]
    fn test_custom_filter_and_delimiter() {
        let batch = vec![archive(
            "a.zip",
            &[("a.xlsx", text_sheet(&["Name", "Tag"], &[&["Ann", "keep"], &["Bob", "drop"]]))],
        )];

        let options = MergeOptions {
            delimiter: ';',
            ..MergeOptions::default()
        };
        let filter = |row: &Row| row.get("Tag") != Some(&Scalar::text("drop"));
        let mut controller = MergeController::new(options, Arc::new(filter)).unwrap();

        let (result, _) = run(&mut controller, &batch);
        assert_eq!(result.unwrap().payload, "Name;Tag\nAnn;keep\n");
    }

    #[test]
    fn test_controller_can_run_again() {
        let batch = vec![archive("a.zip", &[("a.xlsx", text_sheet(&["Name"], &[&["Ann"]]))])];
        let mut controller = default_controller();

        let (first, _) = run(&mut controller, &batch);
        let (second, _) = run(&mut controller, &batch);
        assert_eq!(first.unwrap().payload, second.unwrap().payload);
    }
}

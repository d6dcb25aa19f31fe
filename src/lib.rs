pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod merge;
pub mod pipeline;
pub mod scanner;
pub mod ui;
pub mod workbook;

#[cfg(test)]
pub(crate) mod test_support;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config, FilterConfig, OutputConfig, PipelineConfig, RowConfig};
pub use error::{ErrorKind, MergeError, Result, UserFriendlyError};

// Core functionality re-exports
pub use archive::{ArchiveEntry, ArchiveReader, EntryFilter, EntryRef};
pub use export::{ConfigSnapshot, InputInfo, MergeReport, MergeSummary, OutputManager, TabularEncoder};
pub use merge::{Header, MergedDataset, RowFilter, SchemaUnifier, SubstringExclusion};
pub use pipeline::{MergeController, MergeOptions, MergeOutcome, MergeWorker, RunState, WorkerEvent};
pub use scanner::{InputFile, InputScanner};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};
pub use workbook::{Row, Scalar, WorkbookParser};

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Rows of the live preview echoed to the terminal after a merge.
const PREVIEW_DISPLAY_ROWS: usize = 5;

/// Archive listing produced by a dry run.
#[derive(Debug)]
pub struct PlannedInput {
    pub input: InputFile,
    pub entries: Result<Vec<EntryRef>>,
}

/// Main library interface for SheetMerge functionality
pub struct SheetMerge {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
    force_overwrite: bool,
}

impl SheetMerge {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        Ok(Self::with_shutdown(
            config,
            output_mode,
            verbose,
            quiet,
            GracefulShutdown::new()?,
        ))
    }

    /// No Ctrl+C handler is installed, so several instances can coexist.
    pub fn new_for_test(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        Self::with_shutdown(
            config,
            output_mode,
            verbose,
            quiet,
            GracefulShutdown::new_for_test(),
        )
    }

    fn with_shutdown(
        config: Config,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
        shutdown: GracefulShutdown,
    ) -> Self {
        Self {
            config,
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            progress_manager: ProgressManager::new(!quiet && output_mode == OutputMode::Human),
            shutdown,
            force_overwrite: false,
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let merger = Self::new(config, cli_args.output_mode(), cli_args.verbose, cli_args.quiet)?;
        Ok(merger.with_force_overwrite(cli_args.force))
    }

    pub fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    /// Merges every archive found under `inputs` and writes the output file.
    pub async fn merge_archives<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<MergeReport> {
        let start_time = Instant::now();
        self.shutdown.check_shutdown()?;

        // Step 1: Resolve inputs
        let batch = self.scan_inputs(inputs)?;
        if batch.is_empty() {
            return Err(MergeError::EmptyBatch);
        }
        self.output_formatter
            .info(&format!("Found {} archive(s) to merge", batch.len()));

        // Step 2: Make sure the output can be written before parsing anything
        let output_manager = OutputManager::from_config(&self.config)
            .with_force_overwrite(self.force_overwrite);
        output_manager.prepare()?;

        // Step 3: Run the merge off the async runtime
        let outcome = self.run_worker(&batch).await?;

        // Step 4: Write output and report
        let bytes_written = output_manager.write_payload(&outcome.payload)?;
        self.output_formatter.success(&format!(
            "Wrote {} row(s) to {}",
            outcome.row_count(),
            output_manager.output_path().display()
        ));

        let report = MergeReport {
            inputs: batch
                .iter()
                .map(|input| InputInfo {
                    name: input.name.clone(),
                    size: input.size,
                })
                .collect(),
            summary: MergeSummary {
                files_processed: outcome.stats.files_processed,
                entries_parsed: outcome.stats.entries_parsed,
                rows_accepted: outcome.stats.rows_accepted,
                rows_rejected: outcome.stats.rows_rejected,
                duplicates_removed: outcome.stats.duplicates_removed,
                rows_written: outcome.row_count(),
                bytes_written,
                duration: start_time.elapsed(),
            },
            columns: outcome.dataset.header.names().to_vec(),
            output_path: Some(output_manager.output_path().to_path_buf()),
            merged_at: Utc::now(),
            config_used: ConfigSnapshot::from(&self.config),
        };

        if output_manager.generates_report() {
            match output_manager.write_report(&report) {
                Ok(report_path) => self
                    .output_formatter
                    .info(&format!("Report written to {}", report_path.display())),
                Err(e) => {
                    // A requested report that cannot be written fails the run.
                    output_manager.cleanup_on_error()?;
                    return Err(e);
                }
            }
        }

        self.output_formatter.print_merge_summary(&report);

        Ok(report)
    }

    fn scan_inputs<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<Vec<InputFile>> {
        self.output_formatter.start_operation("Scanning inputs");
        let spinner = self.progress_manager.create_spinner("Looking for archives...");

        let scanner = InputScanner::new(&self.config.filters);
        let batch = scanner.collect(inputs);
        spinner.finish_and_clear();
        let batch = batch?;

        let stats = scanner.get_statistics(&batch);
        self.output_formatter.debug(&stats.display_summary());

        Ok(batch)
    }

    async fn run_worker(&self, batch: &[InputFile]) -> Result<MergeOutcome> {
        self.output_formatter.start_operation("Merging spreadsheets");

        let worker = MergeWorker::new(
            MergeOptions::from_config(&self.config),
            self.row_filter(),
            self.shutdown.clone(),
        );
        let mut handle = worker.submit(batch.to_vec())?;

        let progress = self.progress_manager.create_merge_progress(batch.len() as u64);
        let mut preview: Vec<Row> = Vec::new();

        while let Some(event) = handle.next_event().await {
            self.progress_manager
                .suspend(|| self.output_formatter.print_event(&event));

            if let WorkerEvent::Progress {
                files_completed,
                preview: added,
                status,
                ..
            } = event
            {
                ui::progress::update_merge_progress(&progress, files_completed, &status);
                preview.extend(added);
            }
        }

        match handle.finish().await {
            Ok(outcome) => {
                ui::progress::finish_progress_with_summary(
                    &progress,
                    &format!("Merged {} row(s)", outcome.row_count()),
                    outcome.stats.duration,
                );
                self.output_formatter
                    .print_preview(&preview, PREVIEW_DISPLAY_ROWS);
                Ok(outcome)
            }
            Err(error) => {
                progress.abandon_with_message(error.to_string());
                Err(error)
            }
        }
    }

    /// Lists, per input archive, the spreadsheets a merge would read.
    pub fn plan<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<Vec<PlannedInput>> {
        let batch = InputScanner::new(&self.config.filters).collect(inputs)?;
        let entry_filter = EntryFilter::new(&self.config.filters)?;

        Ok(batch
            .into_iter()
            .map(|input| {
                let entries = ArchiveReader::open(&input)
                    .and_then(|mut reader| reader.spreadsheet_entries(&entry_filter));
                PlannedInput { input, entries }
            })
            .collect())
    }

    fn row_filter(&self) -> Arc<dyn RowFilter> {
        Arc::new(SubstringExclusion::from_config(&self.config.rows))
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        Config::sample().save_to_file(output_path)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn progress_manager(&self) -> &ProgressManager {
        &self.progress_manager
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    pub fn handle_error(&self, error: &MergeError) {
        self.progress_manager.clear();
        self.output_formatter.print_user_friendly_error(error);
    }
}

pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: version_info(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        target: std::env::consts::ARCH.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_date: &'static str,
    pub target: String,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SheetMerge {} ({}) built on {} for {}",
            self.version, self.git_hash, self.build_date, self.target
        )
    }
}

use crate::error::{format_bytes, MergeError, UserFriendlyError};
use crate::export::MergeReport;
use crate::pipeline::WorkerEvent;
use crate::ui::progress::format_duration;
use crate::workbook::Row;
use console::{style, Emoji, Term};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");

const PREVIEW_CELL_WIDTH: usize = 24;

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn debug(&self, message: &str) {
        if self.should_show_message(2) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("  {}", style(message).dim());
                    } else {
                        println!("  DEBUG: {}", message);
                    }
                }
                OutputMode::Json => self.print_json_message("debug", message),
                OutputMode::Plain => println!("DEBUG: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ROCKET, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &MergeError) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => eprintln!("SUGGESTION: {}", suggestion),
            }
        }
    }

    /// Worker events are only echoed in JSON mode, one object per line.
    pub fn print_event(&self, event: &WorkerEvent) {
        if self.mode == OutputMode::Json {
            self.print_json_object(event);
        }
    }

    /// Shows the first `limit` preview rows as a fixed-width table.
    pub fn print_preview(&self, rows: &[Row], limit: usize) {
        if self.quiet || self.mode != OutputMode::Human || rows.is_empty() || limit == 0 {
            return;
        }

        let mut columns: Vec<&str> = Vec::new();
        for row in rows.iter().take(limit) {
            for key in row.keys() {
                if !columns.contains(&key) {
                    columns.push(key);
                }
            }
        }

        self.print_header(&format!("Preview ({} of {} rows)", rows.len().min(limit), rows.len()));

        let line = columns
            .iter()
            .map(|c| fit(c))
            .collect::<Vec<_>>()
            .join(" | ");
        if self.use_colors {
            println!("{}", style(line).bold());
        } else {
            println!("{}", line);
        }

        for row in rows.iter().take(limit) {
            let line = columns
                .iter()
                .map(|c| fit(&row.get(c).map(ToString::to_string).unwrap_or_default()))
                .collect::<Vec<_>>()
                .join(" | ");
            println!("{}", line);
        }
        println!();
    }

    pub fn print_merge_summary(&self, report: &MergeReport) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => self.print_human_summary(report),
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "summary",
                "files_processed": report.summary.files_processed,
                "entries_parsed": report.summary.entries_parsed,
                "rows_written": report.summary.rows_written,
                "rows_rejected": report.summary.rows_rejected,
                "duplicates_removed": report.summary.duplicates_removed,
                "columns": report.columns.len(),
                "output": report.output_path,
                "duration_ms": report.summary.duration.as_millis(),
                "timestamp": report.merged_at.to_rfc3339()
            })),
            OutputMode::Plain => self.print_plain_summary(report),
        }
    }

    pub fn print_merge_report(&self, report: &MergeReport) {
        match self.mode {
            OutputMode::Human => self.print_human_report(report),
            OutputMode::Json => {
                let json_output =
                    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Plain => {
                println!("REPORT: Merge completed");
                for input in &report.inputs {
                    println!("Input: {} ({} bytes)", input.name, input.size);
                }
                println!("Columns: {}", report.columns.join(", "));
            }
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{} {}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => println!("=== {} ===", title),
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human if self.use_colors => println!("{}", style("─".repeat(60)).dim()),
            OutputMode::Human | OutputMode::Plain => println!("{}", "-".repeat(60)),
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        if self.use_colors {
            let styled = match msg_type {
                MessageType::Success => style(message).green().bold(),
                MessageType::Error => style(message).red().bold(),
                MessageType::Warning => style(message).yellow().bold(),
                MessageType::Info => style(message).cyan(),
            };
            let emoji = match msg_type {
                MessageType::Success => CHECKMARK,
                MessageType::Error => CROSS,
                MessageType::Warning => WARNING,
                MessageType::Info => INFO,
            };

            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, styled),
                _ => println!("{}{}", emoji, styled),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object<T: Serialize + ?Sized>(&self, value: &T) {
        println!(
            "{}",
            serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn highlight(&self, value: String) -> String {
        if self.use_colors {
            style(value).cyan().bold().to_string()
        } else {
            value
        }
    }

    fn print_human_summary(&self, report: &MergeReport) {
        let summary = &report.summary;

        println!();
        self.print_separator();

        if self.use_colors {
            println!("{} {}", style("Merge completed!").green().bold(), CHECKMARK);
        } else {
            println!("✓ Merge completed!");
        }

        println!();
        println!("  Archives:        {}", self.highlight(summary.files_processed.to_string()));
        println!("  Spreadsheets:    {}", self.highlight(summary.entries_parsed.to_string()));
        println!("  Rows written:    {}", self.highlight(summary.rows_written.to_string()));
        println!("  Columns:         {}", self.highlight(report.columns.len().to_string()));
        if summary.rows_rejected > 0 {
            println!("  Rows excluded:   {}", summary.rows_rejected);
        }
        if summary.duplicates_removed > 0 {
            println!("  Duplicates:      {}", summary.duplicates_removed);
        }
        if let Some(ref path) = report.output_path {
            println!(
                "  Output:          {} ({})",
                self.highlight(path.display().to_string()),
                format_bytes(summary.bytes_written)
            );
        }
        println!("  Time taken:      {}", self.highlight(format_duration(summary.duration)));

        self.print_separator();
    }

    fn print_plain_summary(&self, report: &MergeReport) {
        let summary = &report.summary;
        println!("COMPLETED: Merge");
        println!("Archives: {}", summary.files_processed);
        println!("Spreadsheets: {}", summary.entries_parsed);
        println!("Rows written: {}", summary.rows_written);
        println!("Rows excluded: {}", summary.rows_rejected);
        println!("Duplicates removed: {}", summary.duplicates_removed);
        if let Some(ref path) = report.output_path {
            println!("Output: {}", path.display());
        }
        println!("Duration: {:?}", summary.duration);
    }

    fn print_human_report(&self, report: &MergeReport) {
        self.print_header("Merge Report");

        println!("Merged at: {}", report.merged_at.format("%Y-%m-%d %H:%M UTC"));
        println!();

        println!("Inputs:");
        for input in &report.inputs {
            println!("  {} ({})", input.name, format_bytes(input.size));
        }
        println!();

        println!("Columns:");
        for column in &report.columns {
            println!("  {}", column);
        }
        println!();

        let config = &report.config_used;
        println!("Extensions: {}", config.extensions.join(", "));
        if config.exclude_substrings.is_empty() {
            println!("Row filter: disabled");
        } else {
            println!("Row filter: {}", config.exclude_substrings.join(", "));
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

/// Pads or truncates to the preview column width, counting characters.
fn fit(value: &str) -> String {
    let flat: String = value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    if flat.chars().count() > PREVIEW_CELL_WIDTH {
        let cut: String = flat.chars().take(PREVIEW_CELL_WIDTH - 1).collect();
        format!("{}…", cut)
    } else {
        format!("{:<width$}", flat, width = PREVIEW_CELL_WIDTH)
    }
}

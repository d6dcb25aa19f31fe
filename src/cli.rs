use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::ui::OutputMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sheetmerge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Merge spreadsheets from ZIP archives into one CSV file")]
#[command(
    long_about = "SheetMerge opens every ZIP archive given on the command line, reads the first \
                  sheet of each .xlsx/.xls workbook inside, drops rows containing URLs, unifies \
                  the column headers and writes the de-duplicated result as a single CSV file."
)]
#[command(before_help = "📊 SheetMerge - Spreadsheet Archive Merger")]
#[command(after_help = "EXAMPLES:\n  \
    sheetmerge exports/january.zip exports/february.zip\n  \
    sheetmerge exports/ --output contacts.csv --force\n  \
    sheetmerge batch.zip --keep-urls --delimiter ';'\n  \
    sheetmerge batch.zip --exclude-text 'unsubscribe,test@' --report\n  \
    sheetmerge batch.zip --config merge.toml --output-format json")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// ZIP archives, or directories containing them
    #[arg(required_unless_present = "generate_config")]
    pub inputs: Vec<PathBuf>,

    /// Output CSV file (defaults to merged.csv in the current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Spreadsheet extensions to read from archives (comma-separated)
    #[arg(short, long, help = "Spreadsheet extensions to read (e.g., xlsx,xls,ods)")]
    pub extensions: Option<String>,

    /// Drop rows containing any of these substrings (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub exclude_text: Option<Vec<String>>,

    /// Keep rows that contain URLs
    #[arg(long, conflicts_with = "exclude_text")]
    pub keep_urls: bool,

    /// Field delimiter for the output file
    #[arg(short, long, value_parser = parse_delimiter, help = "Output field delimiter (a single character, or 'tab')")]
    pub delimiter: Option<char>,

    /// Maximum uncompressed size per spreadsheet
    #[arg(long, value_parser = parse_size_string, help = "Largest spreadsheet to extract (e.g., 50MB)")]
    pub max_entry_size: Option<u64>,

    /// Rows shown in the live preview
    #[arg(long)]
    pub preview_limit: Option<usize>,

    /// Rows kept in memory before spilling to a temporary file
    #[arg(long)]
    pub spill_threshold: Option<usize>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Write a JSON run report next to the output file
    #[arg(long)]
    pub report: bool,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Overwrite an existing output file
    #[arg(long)]
    pub force: bool,

    /// List the spreadsheets that would be merged without reading them
    #[arg(long)]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON lines
    Json,
    /// Plain text output
    Plain,
}

impl From<OutputFormat> for OutputMode {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        }
    }
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_extensions(self.extensions.clone())
            .with_exclude_text(self.exclude_text.clone())
            .with_keep_urls(self.keep_urls)
            .with_delimiter(self.delimiter)
            .with_max_entry_size(self.max_entry_size)
            .with_output_file(self.output.clone())
            .with_generate_report(self.report.then_some(true))
            .with_preview_limit(self.preview_limit)
            .with_spill_threshold(self.spill_threshold)
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_format.into()
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

pub fn parse_delimiter(s: &str) -> std::result::Result<char, String> {
    let delimiter = match s {
        "tab" | "\\t" => '\t',
        _ => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => return Err(format!("Delimiter must be a single character, got '{}'", s)),
            }
        }
    };

    if !delimiter.is_ascii() || matches!(delimiter, '"' | '\r' | '\n') {
        return Err("Delimiter must be an ASCII character other than a quote or newline".to_string());
    }

    Ok(delimiter)
}

pub fn parse_size_string(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim().to_lowercase();

    let (number_str, multiplier) = if s.ends_with("kb") || s.ends_with('k') {
        (s.trim_end_matches("kb").trim_end_matches('k'), 1024)
    } else if s.ends_with("mb") || s.ends_with('m') {
        (s.trim_end_matches("mb").trim_end_matches('m'), 1024 * 1024)
    } else if s.ends_with("gb") || s.ends_with('g') {
        (
            s.trim_end_matches("gb").trim_end_matches('g'),
            1024 * 1024 * 1024,
        )
    } else if s.ends_with('b') {
        (s.trim_end_matches('b'), 1)
    } else {
        (s.as_str(), 1)
    };

    let number: f64 = number_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number format: {}", number_str))?;

    if number < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    Ok((number * multiplier as f64) as u64)
}

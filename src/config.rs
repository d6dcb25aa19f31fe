use crate::error::{MergeError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_OUTPUT_NAME: &str = "merged.csv";
pub const DEFAULT_PREVIEW_LIMIT: usize = 500;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub filters: FilterConfig,
    pub rows: RowConfig,
    pub output: OutputConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Spreadsheet extensions picked out of each archive.
    pub extensions: Vec<String>,
    /// Extensions treated as archives when scanning an input directory.
    pub archive_extensions: Vec<String>,
    pub exclude_entry_patterns: Vec<String>,
    pub max_entry_size: u64,
    pub max_scan_depth: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RowConfig {
    /// A row is dropped when any of its values contains one of these.
    pub exclude_substrings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub file_name: String,
    pub delimiter: char,
    pub base_directory: PathBuf,
    pub generate_report: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preview_limit: usize,
    /// Rows held in memory before the rest are spilled to disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spill_threshold: Option<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["xlsx".to_string(), "xls".to_string()],
            archive_extensions: vec!["zip".to_string()],
            exclude_entry_patterns: vec![
                r"^__MACOSX/".to_string(),
                r"(^|/)\._".to_string(),
                r"(^|/)~\$".to_string(),
            ],
            max_entry_size: 100 * 1024 * 1024, // 100MB
            max_scan_depth: 1,
        }
    }
}

impl Default for RowConfig {
    fn default() -> Self {
        Self {
            exclude_substrings: vec!["http://".to_string(), "https://".to_string()],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_OUTPUT_NAME.to_string(),
            delimiter: ',',
            base_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            generate_report: false,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            spill_threshold: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(MergeError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| MergeError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| MergeError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["sheetmerge.toml", ".sheetmerge.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref extensions) = cli_args.extensions {
            self.filters.extensions = split_extensions(extensions);
        }

        if let Some(ref needles) = cli_args.exclude_text {
            self.rows.exclude_substrings = needles.clone();
        }

        if cli_args.keep_urls {
            self.rows.exclude_substrings.clear();
        }

        if let Some(delimiter) = cli_args.delimiter {
            self.output.delimiter = delimiter;
        }

        if let Some(max_entry_size) = cli_args.max_entry_size {
            self.filters.max_entry_size = max_entry_size;
        }

        if let Some(ref output_file) = cli_args.output_file {
            match output_file.file_name() {
                Some(name) => {
                    self.output.file_name = name.to_string_lossy().to_string();
                    self.output.base_directory = match output_file.parent() {
                        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
                    };
                }
                None => self.output.base_directory = output_file.clone(),
            }
        }

        if let Some(report) = cli_args.generate_report {
            self.output.generate_report = report;
        }

        if let Some(limit) = cli_args.preview_limit {
            self.pipeline.preview_limit = limit;
        }

        if let Some(threshold) = cli_args.spill_threshold {
            self.pipeline.spill_threshold = Some(threshold);
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| MergeError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| MergeError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if normalize_extensions(&self.filters.extensions).is_empty() {
            return Err(MergeError::Config {
                message: "At least one spreadsheet extension must be specified".to_string(),
            });
        }

        if normalize_extensions(&self.filters.archive_extensions).is_empty() {
            return Err(MergeError::Config {
                message: "At least one archive extension must be specified".to_string(),
            });
        }

        if self.filters.max_entry_size == 0 {
            return Err(MergeError::Config {
                message: "Maximum entry size must be greater than 0".to_string(),
            });
        }

        for pattern in &self.filters.exclude_entry_patterns {
            Regex::new(pattern)?;
        }

        let delimiter = self.output.delimiter;
        if !delimiter.is_ascii() || matches!(delimiter, '"' | '\n' | '\r') {
            return Err(MergeError::Config {
                message: format!(
                    "Delimiter must be a single ASCII character other than a quote or newline, got {:?}",
                    delimiter
                ),
            });
        }

        if self.output.file_name.trim().is_empty() {
            return Err(MergeError::Config {
                message: "Output file name must not be empty".to_string(),
            });
        }

        if self.pipeline.preview_limit == 0 {
            return Err(MergeError::Config {
                message: "Preview limit must be greater than 0".to_string(),
            });
        }

        if self.pipeline.spill_threshold == Some(0) {
            return Err(MergeError::Config {
                message: "Spill threshold must be greater than 0 when set".to_string(),
            });
        }

        if self.output.base_directory.is_file() {
            return Err(MergeError::Config {
                message: format!(
                    "Output directory is a file: {}",
                    self.output.base_directory.display()
                ),
            });
        }

        Ok(())
    }

    pub fn output_path(&self) -> PathBuf {
        self.output.base_directory.join(&self.output.file_name)
    }

    /// Defaults with a portable output directory, for `--generate-config`.
    pub fn sample() -> Self {
        let mut sample_config = Self::default();
        sample_config.output.base_directory = PathBuf::from(".");
        sample_config
    }
}

fn split_extensions(list: &str) -> Vec<String> {
    normalize_extensions(list.split(','))
}

/// Lowercase, without surrounding whitespace or a leading dot. Entries that
/// end up empty are dropped.
pub(crate) fn normalize_extensions<I, S>(extensions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub extensions: Option<String>,
    pub exclude_text: Option<Vec<String>>,
    pub keep_urls: bool,
    pub delimiter: Option<char>,
    pub max_entry_size: Option<u64>,
    pub output_file: Option<PathBuf>,
    pub generate_report: Option<bool>,
    pub preview_limit: Option<usize>,
    pub spill_threshold: Option<usize>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extensions(mut self, extensions: Option<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_exclude_text(mut self, exclude_text: Option<Vec<String>>) -> Self {
        self.exclude_text = exclude_text;
        self
    }

    pub fn with_keep_urls(mut self, keep_urls: bool) -> Self {
        self.keep_urls = keep_urls;
        self
    }

    pub fn with_delimiter(mut self, delimiter: Option<char>) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_max_entry_size(mut self, max_entry_size: Option<u64>) -> Self {
        self.max_entry_size = max_entry_size;
        self
    }

    pub fn with_output_file(mut self, output_file: Option<PathBuf>) -> Self {
        self.output_file = output_file;
        self
    }

    pub fn with_generate_report(mut self, report: Option<bool>) -> Self {
        self.generate_report = report;
        self
    }

    pub fn with_preview_limit(mut self, limit: Option<usize>) -> Self {
        self.preview_limit = limit;
        self
    }

    pub fn with_spill_threshold(mut self, threshold: Option<usize>) -> Self {
        self.spill_threshold = threshold;
        self
    }
}

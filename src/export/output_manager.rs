use crate::config::Config;
use crate::error::{MergeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    pub inputs: Vec<InputInfo>,
    pub summary: MergeSummary,
    pub columns: Vec<String>,
    pub output_path: Option<PathBuf>,
    pub merged_at: DateTime<Utc>,
    pub config_used: ConfigSnapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeSummary {
    pub files_processed: usize,
    pub entries_parsed: usize,
    pub rows_accepted: usize,
    pub rows_rejected: usize,
    pub duplicates_removed: usize,
    pub rows_written: usize,
    pub bytes_written: u64,
    pub duration: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub extensions: Vec<String>,
    pub exclude_substrings: Vec<String>,
    pub delimiter: char,
    pub max_entry_size: u64,
}

impl From<&Config> for ConfigSnapshot {
    fn from(config: &Config) -> Self {
        Self {
            extensions: config.filters.extensions.clone(),
            exclude_substrings: config.rows.exclude_substrings.clone(),
            delimiter: config.output.delimiter,
            max_entry_size: config.filters.max_entry_size,
        }
    }
}

/// Writes the encoded payload, and optionally the run report next to it.
pub struct OutputManager {
    output_path: PathBuf,
    force_overwrite: bool,
    generate_report: bool,
}

impl OutputManager {
    pub fn new(output_path: PathBuf) -> Self {
        Self {
            output_path,
            force_overwrite: false,
            generate_report: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.output_path()).with_report(config.output.generate_report)
    }

    pub fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    pub fn with_report(mut self, generate: bool) -> Self {
        self.generate_report = generate;
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn report_path(&self) -> PathBuf {
        let stem = self
            .output_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "merged".to_string());
        self.parent_dir().join(format!("{}.report.json", stem))
    }

    pub fn generates_report(&self) -> bool {
        self.generate_report
    }

    /// Checked before a run starts so a doomed run never parses anything.
    pub fn prepare(&self) -> Result<()> {
        self.check_existing()?;

        let parent = self.parent_dir();
        if !parent.exists() {
            fs::create_dir_all(&parent).map_err(|e| MergeError::InvalidPath {
                path: format!("Cannot create output directory {}: {}", parent.display(), e),
            })?;
        }

        Ok(())
    }

    /// Writes through a temporary file in the target directory so a failed
    /// write never leaves a truncated output behind.
    pub fn write_payload(&self, payload: &str) -> Result<u64> {
        self.check_existing()?;

        let mut file = NamedTempFile::new_in(self.parent_dir())?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        file.persist(&self.output_path).map_err(|e| MergeError::Io(e.error))?;

        debug!(path = %self.output_path.display(), bytes = payload.len(), "output written");
        Ok(payload.len() as u64)
    }

    pub fn write_report(&self, report: &MergeReport) -> Result<PathBuf> {
        let report_path = self.report_path();
        let json_content = serde_json::to_string_pretty(report).map_err(|e| MergeError::Config {
            message: format!("Failed to serialize report to JSON: {}", e),
        })?;

        fs::write(&report_path, json_content)?;
        Ok(report_path)
    }

    pub fn cleanup_on_error(&self) -> Result<()> {
        if self.output_path.exists() {
            fs::remove_file(&self.output_path)?;
        }
        Ok(())
    }

    fn check_existing(&self) -> Result<()> {
        if self.output_path.exists() && !self.force_overwrite {
            return Err(MergeError::OutputExists {
                path: self.output_path.display().to_string(),
            });
        }
        Ok(())
    }

    fn parent_dir(&self) -> PathBuf {
        match self.output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

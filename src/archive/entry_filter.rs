use crate::config::{normalize_extensions, FilterConfig};
use crate::error::Result;
use regex::Regex;
use std::path::Path;

/// Decides which archive entries are handed to the workbook parser.
#[derive(Debug, Clone)]
pub struct EntryFilter {
    extensions: Vec<String>,
    exclude_patterns: Vec<Regex>,
    max_entry_size: u64,
}

impl EntryFilter {
    pub fn new(config: &FilterConfig) -> Result<Self> {
        let exclude_patterns = config
            .exclude_entry_patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            extensions: normalize_extensions(&config.extensions),
            exclude_patterns,
            max_entry_size: config.max_entry_size,
        })
    }

    pub fn is_spreadsheet_entry(&self, name: &str) -> bool {
        if name.ends_with('/') {
            return false;
        }

        let has_extension = Path::new(name)
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()));

        has_extension && !self.matches_any_pattern(name)
    }

    pub fn matches_any_pattern(&self, name: &str) -> bool {
        self.exclude_patterns
            .iter()
            .any(|pattern| pattern.is_match(name))
    }

    pub fn is_size_allowed(&self, size: u64) -> bool {
        size <= self.max_entry_size
    }

    pub fn max_entry_size(&self) -> u64 {
        self.max_entry_size
    }
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self {
            extensions: vec!["xlsx".to_string(), "xls".to_string()],
            exclude_patterns: Vec::new(),
            max_entry_size: FilterConfig::default().max_entry_size,
        }
    }
}

use crate::config::{normalize_extensions, FilterConfig};
use crate::error::{format_bytes, MergeError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone)]
enum InputSource {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// A named, byte-bearing input handle. The pipeline only ever reads it.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub size: u64,
    source: InputSource,
}

impl InputFile {
    pub fn from_path<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path).map_err(|e| MergeError::InvalidPath {
            path: format!("{}: {}", path.display(), e),
        })?;

        if !metadata.is_file() {
            return Err(MergeError::InvalidPath {
                path: format!("{} is not a file", path.display()),
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            size: metadata.len(),
            source: InputSource::Path(path),
        })
    }

    pub fn from_bytes<S: Into<String>>(name: S, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            source: InputSource::Memory(Arc::from(bytes)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            InputSource::Path(path) => Some(path),
            InputSource::Memory(_) => None,
        }
    }

    /// Reads the full content. Path-backed inputs hit the filesystem here.
    pub fn load(&self) -> std::io::Result<Arc<[u8]>> {
        match &self.source {
            InputSource::Path(path) => fs::read(path).map(Arc::from),
            InputSource::Memory(bytes) => Ok(Arc::clone(bytes)),
        }
    }

    pub fn format_size(&self) -> String {
        format_bytes(self.size)
    }
}

/// Resolves command-line paths into the ordered batch of archives.
pub struct InputScanner {
    archive_extensions: Vec<String>,
    max_depth: usize,
}

impl InputScanner {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            archive_extensions: normalize_extensions(&config.archive_extensions),
            max_depth: config.max_scan_depth.max(1),
        }
    }

    /// Files are taken as given; directories contribute their archives
    /// sorted by path. Submission order follows the order of `paths`.
    pub fn collect<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<InputFile>> {
        let mut inputs = Vec::new();

        for path in paths {
            let path = path.as_ref();

            if !path.exists() {
                return Err(MergeError::InvalidPath {
                    path: format!("{} does not exist", path.display()),
                });
            }

            if path.is_dir() {
                let found = self.scan_directory(path)?;
                debug!(directory = %path.display(), archives = found.len(), "scanned input directory");
                inputs.extend(found);
            } else {
                inputs.push(InputFile::from_path(path)?);
            }
        }

        Ok(inputs)
    }

    fn scan_directory(&self, root: &Path) -> Result<Vec<InputFile>> {
        let mut archives = Vec::new();

        let walker = WalkDir::new(root)
            .max_depth(self.max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping unreadable path while scanning {}: {}", root.display(), err);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.is_archive(&entry) {
                archives.push(entry.path().to_path_buf());
            }
        }

        archives.sort();
        archives.into_iter().map(InputFile::from_path).collect()
    }

    fn is_archive(&self, entry: &DirEntry) -> bool {
        entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.archive_extensions.contains(&ext.to_lowercase()))
    }

    pub fn get_statistics(&self, inputs: &[InputFile]) -> ScanStatistics {
        let (largest_file_size, largest_file_name) = inputs
            .iter()
            .max_by_key(|f| f.size)
            .map(|f| (f.size, f.name.clone()))
            .unwrap_or_default();

        ScanStatistics {
            total_files: inputs.len(),
            total_size: inputs.iter().map(|f| f.size).sum(),
            largest_file_size,
            largest_file_name,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScanStatistics {
    pub total_files: usize,
    pub total_size: u64,
    pub largest_file_size: u64,
    pub largest_file_name: String,
}

impl ScanStatistics {
    pub fn display_summary(&self) -> String {
        let mut summary = format!(
            "Input archives:\n  Total archives: {}\n  Total size: {}\n",
            self.total_files,
            format_bytes(self.total_size)
        );

        if self.largest_file_size > 0 {
            summary.push_str(&format!(
                "  Largest archive: {} ({})\n",
                self.largest_file_name,
                format_bytes(self.largest_file_size)
            ));
        }

        summary
    }
}

//! Data carried through the batch pipeline and returned to callers.

use crate::error::FileError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the provider should interpret a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Image,
    Pdf,
}

impl DocumentKind {
    /// `pdf` selects [`DocumentKind::Pdf`]; every other extension is an image.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("pdf") => DocumentKind::Pdf,
            _ => DocumentKind::Image,
        }
    }

    pub fn is_pdf(self) -> bool {
        self == DocumentKind::Pdf
    }
}

/// A file picked up by discovery. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: DocumentKind,
    /// Raw size on disk in bytes, as reported during the walk.
    pub size: u64,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let kind = DocumentKind::from_path(&path);
        Self { path, kind, size }
    }

    /// The file name without its extension, used to name the output.
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Outcome of one source file's trip through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    pub source: PathBuf,
    /// Where the output was written. `None` if nothing was written.
    pub output: Option<PathBuf>,
    /// Bytes written to `output`; zero for placeholders.
    pub bytes_written: u64,
    /// The provider's request id of the final attempt, if it answered.
    pub request_id: Option<String>,
    pub retries: u8,
    pub duration_ms: u64,
    pub error: Option<FileError>,
}

impl FileResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Counters for a completed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Files returned by discovery.
    pub discovered: usize,
    /// Files converted and written.
    pub succeeded: usize,
    /// Files that failed (placeholder written or skipped).
    pub failed: usize,
    /// Failed files for which a zero-byte placeholder was written.
    pub placeholders: usize,
    pub bytes_written: u64,
    pub total_duration_ms: u64,
}

impl BatchStats {
    pub fn from_results(results: &[FileResult], total_duration_ms: u64) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let placeholders = results
            .iter()
            .filter(|r| !r.is_success() && r.output.is_some())
            .count();
        Self {
            discovered: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            placeholders,
            bytes_written: results.iter().map(|r| r.bytes_written).sum(),
            total_duration_ms,
        }
    }
}

/// Everything a batch produced, in discovery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    pub files: Vec<FileResult>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// Iterate over the results that carry an error.
    pub fn failures(&self) -> impl Iterator<Item = &FileResult> {
        self.files.iter().filter(|r| !r.is_success())
    }
}

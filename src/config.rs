//! Configuration types for batch table recognition.
//!
//! All batch behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share the config across workers and to log it at start-up.

use crate::error::Ocr2TableError;
use crate::progress::ProgressCallback;
use crate::provider::TableRecognizer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Largest base64 payload the table-OCR endpoint accepts: 7 MiB of text.
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 7 * 1024 * 1024;

/// Extensions picked up by discovery. Matched case-sensitively, without the dot.
pub const DEFAULT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "pdf"];

/// Configuration for a batch conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use ocr2table::{ConversionConfig, FailurePolicy};
///
/// let config = ConversionConfig::builder()
///     .input_dir("scans")
///     .output_dir("sheets")
///     .concurrency(2)
///     .failure_policy(FailurePolicy::Skip)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 2);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Root of the directory tree to scan. Default: `tables`.
    pub input_dir: PathBuf,

    /// Directory receiving one spreadsheet per source file. Default: `output`.
    ///
    /// Created on demand. Files from earlier runs with the same name are
    /// overwritten.
    pub output_dir: PathBuf,

    /// Allowed source extensions, without the leading dot. Default:
    /// [`DEFAULT_EXTENSIONS`].
    pub extensions: Vec<String>,

    /// Extension appended to each output file's base name. Default: `xlsx`.
    pub output_extension: String,

    /// Maximum length of the base64 text sent per request. Default: 7 MiB.
    ///
    /// The whole source file is held in memory while it is encoded, so this
    /// also bounds per-worker memory to roughly `4/3 × max_payload_bytes`.
    pub max_payload_bytes: u64,

    /// Page submitted for PDF sources (1-indexed). Default: None.
    ///
    /// `None` and `Some(0)` both leave the page out of the request, in which
    /// case the provider recognises page 1.
    pub pdf_page: Option<u32>,

    /// Number of files recognised concurrently. Default: 4.
    ///
    /// The table-OCR endpoint enforces a per-account request rate. Raise this
    /// only if your quota allows it; `RequestLimitExceeded` replies mean it is
    /// too high.
    pub concurrency: usize,

    /// Extra attempts on a transient provider failure. Default: 0.
    ///
    /// Only rate limiting, provider-side internal errors, timeouts and network
    /// faults are retried. Authentication or document errors fail at once.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-attempt recognition timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// What to do with a file that could not be converted. Default:
    /// [`FailurePolicy::Placeholder`].
    pub failure_policy: FailurePolicy,

    /// Pre-constructed recognizer. If None, a Tencent Cloud client is built
    /// from `TC_SECRET_ID` / `TC_SECRET_KEY`.
    pub recognizer: Option<Arc<dyn TableRecognizer>>,

    /// Optional per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("tables"),
            output_dir: PathBuf::from("output"),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            output_extension: "xlsx".to_string(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            pdf_page: None,
            concurrency: 4,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            failure_policy: FailurePolicy::default(),
            recognizer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("extensions", &self.extensions)
            .field("output_extension", &self.output_extension)
            .field("max_payload_bytes", &self.max_payload_bytes)
            .field("pdf_page", &self.pdf_page)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("failure_policy", &self.failure_policy)
            .field(
                "recognizer",
                &self.recognizer.as_ref().map(|r| r.name().to_string()),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The page number to put on the wire for PDF requests, if any.
    pub fn effective_pdf_page(&self) -> Option<u32> {
        self.pdf_page.filter(|&p| p != 0)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.extensions = exts
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_string())
            .collect();
        self
    }

    pub fn output_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.output_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn max_payload_bytes(mut self, n: u64) -> Self {
        self.config.max_payload_bytes = n;
        self
    }

    pub fn pdf_page(mut self, page: u32) -> Self {
        self.config.pdf_page = Some(page);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn TableRecognizer>) -> Self {
        self.config.recognizer = Some(recognizer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Ocr2TableError> {
        let c = &self.config;
        if c.extensions.is_empty() || c.extensions.iter().any(|e| e.is_empty()) {
            return Err(Ocr2TableError::InvalidConfig(
                "At least one non-empty source extension is required".into(),
            ));
        }
        if c.output_extension.is_empty() {
            return Err(Ocr2TableError::InvalidConfig(
                "Output extension must not be empty".into(),
            ));
        }
        if c.max_payload_bytes == 0 {
            return Err(Ocr2TableError::InvalidConfig(
                "Maximum payload size must be ≥ 1 byte".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Ocr2TableError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_retries > u8::MAX as u32 {
            return Err(Ocr2TableError::InvalidConfig(format!(
                "At most {} retries are supported, got {}",
                u8::MAX,
                c.max_retries
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What the orchestrator does with a file whose conversion failed.
///
/// | Policy | Output | Batch |
/// |--------|--------|-------|
/// | `Placeholder` | zero-byte `<name>.xlsx` | continues (default) |
/// | `Skip` | nothing written | continues |
/// | `Abort` | nothing written | stops with [`Ocr2TableError::Aborted`] |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Write an empty output file so every source has a counterpart.
    #[default]
    Placeholder,
    /// Leave no output behind for the failed file.
    Skip,
    /// Stop the batch at the first failure.
    Abort,
}

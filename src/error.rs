//! Error types for the ocr2table library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`Ocr2TableError`] is **fatal**. The batch cannot proceed at all
//!   (input directory missing, output directory not creatable, provider not
//!   configured). Returned as `Err(Ocr2TableError)` from the top-level
//!   `convert*` functions.
//!
//! * [`FileError`] is **non-fatal**. A single file failed (too large to
//!   submit, rejected by the provider, output not writable) while every other
//!   file is fine. Stored inside [`crate::output::FileResult`] so callers can
//!   inspect partial success instead of losing the batch to one bad scan.
//!
//! * [`RecognitionError`] is what a [`crate::provider::TableRecognizer`]
//!   returns for one remote call. The retry driver inspects it, then folds
//!   it into a [`FileError`].

use std::path::PathBuf;
use thiserror::Error;

fn mib(bytes: &u64) -> f64 {
    *bytes as f64 / (1024.0 * 1024.0)
}

/// All fatal errors returned by the ocr2table library.
///
/// File-level failures use [`FileError`] and are stored in
/// [`crate::output::FileResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Ocr2TableError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The discovery root does not exist.
    #[error("Input directory not found: '{path}'\nCreate it and put the scans to convert inside.")]
    InputDirNotFound { path: PathBuf },

    /// The discovery root exists but is a regular file.
    #[error("Input path is not a directory: '{path}'")]
    InputNotADirectory { path: PathBuf },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create the output directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The recognition provider is not configured (missing credentials etc.).
    #[error("OCR provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Batch control ─────────────────────────────────────────────────────
    /// A file failed while the failure policy is `Abort`.
    #[error("Batch aborted at '{path}': {error}")]
    Aborted { path: PathBuf, error: FileError },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single source file.
///
/// Stored alongside [`crate::output::FileResult`] when a file fails.
/// The batch continues unless the failure policy says otherwise.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// The source file could not be read.
    #[error("failed to read source file: {detail}")]
    ReadFailed { detail: String },

    /// The source file has no content; nothing to submit.
    #[error("source file is empty")]
    EmptySource,

    /// The base64 payload would exceed the provider's request limit.
    #[error(
        "base64 payload exceeds the limit ({:.2} MiB): {:.2} MiB",
        mib(.max),
        mib(.size)
    )]
    PayloadTooLarge { size: u64, max: u64 },

    /// The provider rejected the request or could not be reached.
    #[error("recognition failed after {retries} retries: {detail}")]
    RecognitionFailed { retries: u8, detail: String },

    /// A single recognition attempt exceeded the per-call timeout.
    #[error("recognition timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The output file could not be written.
    #[error("failed to write output file: {detail}")]
    WriteFailed { detail: String },

    /// An earlier source file already claimed the same output name.
    #[error("output '{output}' is already produced by '{first}'")]
    OutputCollision { output: PathBuf, first: PathBuf },
}

/// Failure of one remote recognition call.
#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    /// The provider answered with an error code.
    #[error("[{code}] {message} (request id: {request_id})")]
    Remote {
        code: String,
        message: String,
        request_id: String,
    },

    /// The request never produced a usable HTTP response.
    #[error("transport error: {detail}")]
    Transport { detail: String, retryable: bool },

    /// The call did not complete in time.
    #[error("call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider answered, but the body could not be interpreted.
    #[error("invalid response: {detail}")]
    InvalidResponse { detail: String },
}

/// Tencent Cloud error-code families that indicate a temporary condition.
const TRANSIENT_CODE_PREFIXES: &[&str] = &[
    "RequestLimitExceeded",
    "InternalError",
    "ResourceUnavailable",
    "ResourcesSoldOut",
];

impl RecognitionError {
    /// Whether another attempt has a reasonable chance of succeeding.
    ///
    /// Authentication, quota and malformed-document errors are permanent;
    /// rate limiting, provider-side internal errors and network faults are not.
    pub fn is_transient(&self) -> bool {
        match self {
            RecognitionError::Remote { code, .. } => TRANSIENT_CODE_PREFIXES
                .iter()
                .any(|prefix| code.starts_with(prefix)),
            RecognitionError::Transport { retryable, .. } => *retryable,
            RecognitionError::Timeout { .. } => true,
            RecognitionError::InvalidResponse { .. } => false,
        }
    }

    /// The provider's request id, when the failure came from a reply.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            RecognitionError::Remote { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}

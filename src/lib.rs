//! # ocr2table
//!
//! Convert a directory of scanned tables (PNG, JPEG, BMP or PDF) into
//! spreadsheets using a remote table-OCR service.
//!
//! Recognition itself happens at the provider (Tencent Cloud
//! `RecognizeTableOCR` out of the box), which returns a ready-made `.xlsx`.
//! This crate is the batch around it: find the files, get each one past the
//! provider's size limit, submit them on a bounded worker pool, and write one
//! spreadsheet per source without letting one bad scan sink the batch.
//!
//! ## Pipeline Overview
//!
//! ```text
//! tables/
//!  │
//!  ├─ 1. Discover  walk the tree, keep .png .jpg .jpeg .bmp .pdf
//!  ├─ 2. Encode    read + base64, reject payloads over 7 MiB
//!  ├─ 3. Recognize one signed HTTPS call per file (optional retry)
//!  └─ 4. Persist   output/<base name>.xlsx, written atomically
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr2table::{convert_dir, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credentials come from TC_SECRET_ID / TC_SECRET_KEY.
//!     let config = ConversionConfig::builder()
//!         .input_dir("tables")
//!         .output_dir("output")
//!         .build()?;
//!     let output = convert_dir(&config).await?;
//!     eprintln!("{}/{} files converted",
//!         output.stats.succeeded,
//!         output.stats.discovered);
//!     Ok(())
//! }
//! ```
//!
//! ## Failures
//!
//! A file that is too large, rejected by the provider or not writable does
//! not stop the batch. It is logged, recorded in its [`FileResult`], and by
//! default leaves a zero-byte placeholder sheet behind
//! ([`FailurePolicy::Placeholder`]). [`FailurePolicy::Skip`] writes nothing;
//! [`FailurePolicy::Abort`] stops at the first failure.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2table` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod provider;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, FailurePolicy};
pub use convert::{convert_dir, convert_dir_sync, convert_files};
pub use error::{FileError, Ocr2TableError, RecognitionError};
pub use output::{BatchOutput, BatchStats, DocumentKind, FileResult, SourceFile};
pub use pipeline::encode::EncodedPayload;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use provider::{
    Credential, Recognition, RecognitionRequest, TableRecognizer, TencentConfig, TencentOcr,
};
pub use stream::{convert_stream, FileStream};

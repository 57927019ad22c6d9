//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through the discovered files.
//!
//! # Example
//!
//! ```rust
//! use ocr2table::{BatchProgressCallback, ConversionConfig};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, source: &Path, _output: &Path, bytes: u64) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("#{n} {} ({bytes} bytes)", source.display());
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the orchestrator as it processes each file.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` the
/// per-file methods are called from several tasks at once. All methods have
/// no-op defaults so callers only override what they care about.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after discovery, before any file is submitted.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a worker picks up a file.
    ///
    /// `index` is the 1-indexed position of the file in discovery order.
    fn on_file_start(&self, index: usize, total_files: usize, source: &Path) {
        let _ = (index, total_files, source);
    }

    /// Called when a file's spreadsheet has been written.
    fn on_file_complete(&self, source: &Path, output: &Path, bytes: u64) {
        let _ = (source, output, bytes);
    }

    /// Called when a file fails, after the failure policy has been applied.
    fn on_file_error(&self, source: &Path, error: &str) {
        let _ = (source, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

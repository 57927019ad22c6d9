//! Streaming conversion API: emit file results as they complete.
//!
//! Unlike the eager [`crate::convert::convert_dir`], which returns only after
//! every file finishes, [`convert_stream`] yields each [`FileResult`] as soon
//! as its worker is done. With `concurrency > 1` results arrive in completion
//! order, not discovery order.

use crate::config::{ConversionConfig, FailurePolicy};
use crate::convert::{create_output_dir, process_file, resolve_recognizer};
use crate::output::FileResult;
use crate::pipeline::{discover, persist};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-file results.
pub type FileStream = Pin<Box<dyn Stream<Item = FileResult> + Send>>;

/// Discover the input tree and convert it, streaming results as they are ready.
///
/// Under [`FailurePolicy::Abort`] no new file is started once a failure has
/// been seen; files already in flight finish and are still yielded.
/// `on_batch_complete` is not called in streaming mode; the caller knows
/// when the stream ends.
///
/// # Returns
/// - `Ok(FileStream)`: a stream of `FileResult`
/// - `Err(Ocr2TableError)`: fatal error (input missing, no provider, etc.)
pub async fn convert_stream(
    config: &ConversionConfig,
) -> Result<FileStream, crate::error::Ocr2TableError> {
    info!("Starting streaming conversion of {}", config.input_dir.display());

    let files = discover::discover(config).await?;
    create_output_dir(config).await?;
    let total = files.len();
    if total == 0 {
        return Ok(Box::pin(stream::empty::<FileResult>()));
    }

    let recognizer = resolve_recognizer(config)?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let jobs = persist::assign_outputs(files, &config.output_dir, &config.output_extension);
    let config = Arc::new(config.clone());
    let abort = config.failure_policy == FailurePolicy::Abort;
    let concurrency = config.concurrency;

    let stop = Arc::new(AtomicBool::new(false));

    let results = stream::iter(jobs.into_iter().enumerate().map(move |(idx, job)| {
        let recognizer = Arc::clone(&recognizer);
        let config = Arc::clone(&config);
        let stop = Arc::clone(&stop);
        async move {
            if stop.load(Ordering::SeqCst) {
                return None;
            }
            let result = process_file(&recognizer, job, idx, total, &config).await;
            if abort && !result.is_success() {
                stop.store(true, Ordering::SeqCst);
            }
            Some(result)
        }
    }))
    .buffer_unordered(concurrency)
    .filter_map(futures::future::ready);

    Ok(Box::pin(results))
}

//! Eager (whole-batch) conversion entry points.
//!
//! [`convert_dir`] discovers the input tree, then runs every file through
//! encode → recognize → write on a bounded worker pool and returns once all
//! files have been attempted. Results come back in discovery order. Use
//! [`crate::stream::convert_stream`] to receive results as they finish.
//!
//! Per file:
//!
//! ```text
//! Discovered ─▶ Encoding ─┬─▶ EncodeFailed ───────────────┐
//!                         └─▶ Submitted ─┬─▶ RemoteFailed ─┴─▶ failure policy
//!                                        └─▶ ResultReceived ─▶ Written
//! ```

use crate::config::{ConversionConfig, FailurePolicy};
use crate::error::{FileError, Ocr2TableError};
use crate::output::{BatchOutput, BatchStats, FileResult, SourceFile};
use crate::pipeline::persist::{self, FileJob};
use crate::pipeline::{discover, encode, recognize};
use crate::provider::{RecognitionRequest, TableRecognizer, TencentOcr};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Convert every eligible file under `config.input_dir`.
///
/// # Returns
/// `Ok(BatchOutput)` once every file has been attempted, even if some
/// failed (check `output.stats.failed`). An empty input tree is a valid,
/// empty batch.
///
/// # Errors
/// Returns `Err(Ocr2TableError)` only for fatal errors:
/// - input directory missing or not a directory
/// - output directory cannot be created
/// - no recognizer configured and none available from the environment
/// - a file failed while `failure_policy` is [`FailurePolicy::Abort`]
pub async fn convert_dir(config: &ConversionConfig) -> Result<BatchOutput, Ocr2TableError> {
    info!("Collecting files under {}", config.input_dir.display());
    let files = discover::discover(config).await?;
    convert_files(files, config).await
}

/// Convert an explicit list of source files.
///
/// This is the orchestrator behind [`convert_dir`]; call it directly when
/// the file list comes from somewhere other than a directory walk.
pub async fn convert_files(
    files: Vec<SourceFile>,
    config: &ConversionConfig,
) -> Result<BatchOutput, Ocr2TableError> {
    let total_start = Instant::now();
    let total = files.len();

    create_output_dir(config).await?;

    if files.is_empty() {
        info!("No files to convert");
        if let Some(ref cb) = config.progress_callback {
            cb.on_batch_start(0);
            cb.on_batch_complete(0, 0);
        }
        return Ok(BatchOutput {
            files: Vec::new(),
            stats: BatchStats::default(),
        });
    }

    let recognizer = resolve_recognizer(config)?;
    info!(
        "Converting {} files via {} ({} workers)",
        total,
        recognizer.name(),
        config.concurrency
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let jobs = persist::assign_outputs(files, &config.output_dir, &config.output_extension);
    let mut pending = stream::iter(jobs.into_iter().enumerate().map(|(idx, job)| {
        let recognizer = Arc::clone(&recognizer);
        async move { (idx, process_file(&recognizer, job, idx, total, config).await) }
    }))
    .buffer_unordered(config.concurrency);

    let mut indexed: Vec<(usize, FileResult)> = Vec::with_capacity(total);
    while let Some((idx, result)) = pending.next().await {
        if config.failure_policy == FailurePolicy::Abort {
            if let Some(ref err) = result.error {
                error!("Aborting batch after failure on {}", result.source.display());
                return Err(Ocr2TableError::Aborted {
                    path: result.source.clone(),
                    error: err.clone(),
                });
            }
        }
        indexed.push((idx, result));
    }

    // Discovery order, whatever order the workers finished in.
    indexed.sort_by_key(|(idx, _)| *idx);
    let files: Vec<FileResult> = indexed.into_iter().map(|(_, r)| r).collect();

    let stats = BatchStats::from_results(&files, total_start.elapsed().as_millis() as u64);
    info!(
        "Batch complete: {}/{} files converted, {} failed, {}ms total",
        stats.succeeded, stats.discovered, stats.failed, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, stats.succeeded);
    }

    Ok(BatchOutput { files, stats })
}

/// Synchronous wrapper around [`convert_dir`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_dir_sync(config: &ConversionConfig) -> Result<BatchOutput, Ocr2TableError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Ocr2TableError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_dir(config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Use the configured recognizer, or build the Tencent Cloud client from
/// `TC_SECRET_ID` / `TC_SECRET_KEY`.
pub(crate) fn resolve_recognizer(
    config: &ConversionConfig,
) -> Result<Arc<dyn TableRecognizer>, Ocr2TableError> {
    if let Some(ref recognizer) = config.recognizer {
        return Ok(Arc::clone(recognizer));
    }
    info!("Building Tencent Cloud OCR client from environment");
    Ok(Arc::new(TencentOcr::from_env()?))
}

pub(crate) async fn create_output_dir(config: &ConversionConfig) -> Result<(), Ocr2TableError> {
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| Ocr2TableError::OutputDirFailed {
            path: config.output_dir.clone(),
            source: e,
        })
}

/// Run one file through encode → recognize → write and apply the failure
/// policy. Never returns an error: every outcome is a [`FileResult`].
pub(crate) async fn process_file(
    recognizer: &Arc<dyn TableRecognizer>,
    job: FileJob,
    idx: usize,
    total: usize,
    config: &ConversionConfig,
) -> FileResult {
    let start = Instant::now();
    let FileJob {
        source,
        output,
        collides_with,
    } = job;
    info!("Processing [{}/{}]: {}", idx + 1, total, source.path.display());
    if let Some(ref cb) = config.progress_callback {
        cb.on_file_start(idx + 1, total, &source.path);
    }

    let mut request_id = None;
    let mut retries = 0;

    let outcome: Result<Vec<u8>, FileError> = async {
        if let Some(first) = collides_with {
            return Err(FileError::OutputCollision {
                output: output.clone(),
                first,
            });
        }

        let payload = encode::encode_file(&source.path, config.max_payload_bytes).await?;
        let page = if source.kind.is_pdf() {
            config.effective_pdf_page()
        } else {
            None
        };
        let request = RecognitionRequest::new(payload, source.kind, page);
        debug!(
            "{}: submitting {} bytes (is_pdf={}, page={:?})",
            source.path.display(),
            request.payload.len(),
            request.is_pdf,
            request.page_number
        );

        match recognize::recognize_with_retry(recognizer, &source.path, &request, config).await {
            Ok(recognized) => {
                request_id = Some(recognized.request_id);
                retries = recognized.retries;
                Ok(recognized.data)
            }
            Err(failure) => {
                request_id = failure.request_id;
                retries = failure.retries;
                Err(failure.error)
            }
        }
    }
    .await;

    let (written, bytes_written, error) = match outcome {
        Ok(data) => {
            if data.is_empty() {
                warn!("{}: provider returned an empty sheet", source.path.display());
            }
            match persist::write_output(&output, data).await {
                Ok(n) => (Some(output.clone()), n, None),
                Err(e) => {
                    error!("{}: {}", source.path.display(), e);
                    (None, 0, Some(e))
                }
            }
        }
        Err(e) => {
            let placeholder = apply_failure_policy(&source.path, &output, &e, config).await;
            (placeholder, 0, Some(e))
        }
    };

    match (&error, &written) {
        (None, Some(path)) => {
            info!("Wrote sheet: {} ({} bytes)", path.display(), bytes_written);
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_complete(&source.path, path, bytes_written);
            }
        }
        (Some(e), _) => {
            info!("Finished with error: {}: {}", source.path.display(), e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_error(&source.path, &e.to_string());
            }
        }
        (None, None) => {}
    }

    FileResult {
        source: source.path,
        output: written,
        bytes_written,
        request_id,
        retries,
        duration_ms: start.elapsed().as_millis() as u64,
        error,
    }
}

/// Write the zero-byte placeholder when the policy asks for one.
///
/// Returns the placeholder path if one was written. Collisions never get a
/// placeholder: the path belongs to another source.
async fn apply_failure_policy(
    source: &std::path::Path,
    output: &std::path::Path,
    error: &FileError,
    config: &ConversionConfig,
) -> Option<PathBuf> {
    if config.failure_policy != FailurePolicy::Placeholder
        || matches!(error, FileError::OutputCollision { .. })
    {
        warn!("{}: no output written ({})", source.display(), error);
        return None;
    }
    match persist::write_output(output, Vec::new()).await {
        Ok(_) => {
            warn!(
                "{}: wrote empty placeholder {} ({})",
                source.display(),
                output.display(),
                error
            );
            Some(output.to_path_buf())
        }
        Err(e) => {
            error!("{}: placeholder not written: {}", source.display(), e);
            None
        }
    }
}

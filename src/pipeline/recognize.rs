//! Recognition driver: one file's request, with timeout and optional retry.
//!
//! The provider client makes exactly one remote call per invocation. This
//! stage adds the per-attempt timeout and, when `max_retries > 0`, retries
//! transient failures with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`). Permanent failures (bad credentials,
//! exhausted quota, undecodable documents) end the loop immediately.

use crate::config::ConversionConfig;
use crate::error::{FileError, RecognitionError};
use crate::provider::{RecognitionRequest, TableRecognizer};
use std::path::Path;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, warn};

/// A successful recognition plus bookkeeping for the file result.
#[derive(Debug, Clone)]
pub struct Recognized {
    pub data: Vec<u8>,
    pub request_id: String,
    pub retries: u8,
}

/// A failed recognition, already folded into a [`FileError`].
#[derive(Debug, Clone)]
pub struct RecognitionFailure {
    pub error: FileError,
    pub request_id: Option<String>,
    pub retries: u8,
}

/// Submit `request` for `source`, retrying transient failures.
pub async fn recognize_with_retry(
    recognizer: &Arc<dyn TableRecognizer>,
    source: &Path,
    request: &RecognitionRequest,
    config: &ConversionConfig,
) -> Result<Recognized, RecognitionFailure> {
    let call_timeout = Duration::from_secs(config.api_timeout_secs);
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            let backoff = config
                .retry_backoff_ms
                .saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "{}: retry {}/{} after {}ms",
                source.display(),
                attempt,
                config.max_retries,
                backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let outcome = match timeout(call_timeout, recognizer.recognize(request)).await {
            Ok(result) => result,
            Err(_) => Err(RecognitionError::Timeout {
                secs: config.api_timeout_secs,
            }),
        };

        match outcome {
            Ok(recognition) => {
                debug!(
                    "{}: result received, request id: {}",
                    source.display(),
                    recognition.request_id
                );
                if let Some(pages) = recognition.pdf_page_count {
                    debug!("{}: document has {} pages", source.display(), pages);
                }
                return Ok(Recognized {
                    data: recognition.data,
                    request_id: recognition.request_id,
                    retries: attempt as u8,
                });
            }
            Err(e) if e.is_transient() && attempt < config.max_retries => {
                warn!(
                    "{}: attempt {} failed via {}: {}",
                    source.display(),
                    attempt + 1,
                    recognizer.name(),
                    e
                );
                attempt += 1;
            }
            Err(e) => {
                error!("{}: {} recognition failed: {}", source.display(), recognizer.name(), e);
                let error = match &e {
                    RecognitionError::Timeout { secs } => FileError::Timeout { secs: *secs },
                    other => FileError::RecognitionFailed {
                        retries: attempt as u8,
                        detail: other.to_string(),
                    },
                };
                return Err(RecognitionFailure {
                    request_id: e.request_id().map(str::to_string),
                    error,
                    retries: attempt as u8,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::DocumentKind;
    use crate::pipeline::encode::encode_bytes;
    use crate::provider::Recognition;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed sequence of outcomes, one per call.
    struct Scripted {
        replies: Mutex<VecDeque<Result<Recognition, RecognitionError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Recognition, RecognitionError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TableRecognizer for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn recognize(&self, _request: &RecognitionRequest) -> Result<Recognition, RecognitionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted reply left")
        }
    }

    /// Never answers.
    struct Hanging;

    #[async_trait]
    impl TableRecognizer for Hanging {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn recognize(&self, _request: &RecognitionRequest) -> Result<Recognition, RecognitionError> {
            std::future::pending().await
        }
    }

    fn ok(data: &[u8]) -> Result<Recognition, RecognitionError> {
        Ok(Recognition {
            data: data.to_vec(),
            request_id: "req-ok".into(),
            pdf_page_count: None,
        })
    }

    fn remote(code: &str) -> Result<Recognition, RecognitionError> {
        Err(RecognitionError::Remote {
            code: code.into(),
            message: "nope".into(),
            request_id: "req-err".into(),
        })
    }

    fn request() -> RecognitionRequest {
        RecognitionRequest::new(encode_bytes(b"png", 64).unwrap(), DocumentKind::Image, None)
    }

    fn config(max_retries: u32) -> ConversionConfig {
        ConversionConfig::builder()
            .max_retries(max_retries)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let scripted = Scripted::new(vec![ok(b"xlsx")]);
        let recognizer: Arc<dyn TableRecognizer> = scripted.clone();
        let out = recognize_with_retry(&recognizer, Path::new("a.png"), &request(), &config(0))
            .await
            .unwrap();
        assert_eq!(out.data, b"xlsx");
        assert_eq!(out.request_id, "req-ok");
        assert_eq!(out.retries, 0);
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_attempt_by_default() {
        let scripted = Scripted::new(vec![remote("RequestLimitExceeded")]);
        let recognizer: Arc<dyn TableRecognizer> = scripted.clone();
        let fail = recognize_with_retry(&recognizer, Path::new("a.png"), &request(), &config(0))
            .await
            .unwrap_err();
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fail.request_id.as_deref(), Some("req-err"));
        assert!(matches!(fail.error, FileError::RecognitionFailed { retries: 0, .. }));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let scripted = Scripted::new(vec![
            remote("RequestLimitExceeded"),
            remote("InternalError.ServerError"),
            ok(b"xlsx"),
        ]);
        let recognizer: Arc<dyn TableRecognizer> = scripted.clone();
        let out = recognize_with_retry(&recognizer, Path::new("a.png"), &request(), &config(3))
            .await
            .unwrap();
        assert_eq!(out.retries, 2);
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let scripted = Scripted::new(vec![remote("AuthFailure.SecretIdNotFound")]);
        let recognizer: Arc<dyn TableRecognizer> = scripted.clone();
        let fail = recognize_with_retry(&recognizer, Path::new("a.png"), &request(), &config(3))
            .await
            .unwrap_err();
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 1);
        match fail.error {
            FileError::RecognitionFailed { detail, .. } => {
                assert!(detail.contains("AuthFailure.SecretIdNotFound"), "got: {detail}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let scripted = Scripted::new(vec![
            remote("RequestLimitExceeded"),
            remote("RequestLimitExceeded"),
            remote("RequestLimitExceeded"),
        ]);
        let recognizer: Arc<dyn TableRecognizer> = scripted.clone();
        let fail = recognize_with_retry(&recognizer, Path::new("a.png"), &request(), &config(2))
            .await
            .unwrap_err();
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 3);
        assert_eq!(fail.retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_call_times_out() {
        let recognizer: Arc<dyn TableRecognizer> = Arc::new(Hanging);
        let config = ConversionConfig::builder().api_timeout_secs(5).build().unwrap();
        let fail = recognize_with_retry(&recognizer, Path::new("a.png"), &request(), &config)
            .await
            .unwrap_err();
        assert_eq!(fail.error, FileError::Timeout { secs: 5 });
        assert_eq!(fail.request_id, None);
    }
}

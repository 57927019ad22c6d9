//! The seam between the batch pipeline and a remote table-OCR service.
//!
//! The pipeline only needs one operation: submit an encoded document and get
//! the spreadsheet bytes back. [`TableRecognizer`] captures exactly that, so
//! the orchestrator can be driven by the Tencent Cloud client in production
//! and by an in-process fake in tests.
//!
//! Implementations report failures as [`RecognitionError`] values; they never
//! panic and never swallow errors into empty results. Deciding what an
//! empty or failed result means for the output file is the orchestrator's job.

pub mod tencent;

use crate::error::RecognitionError;
use crate::output::DocumentKind;
use crate::pipeline::encode::EncodedPayload;
use async_trait::async_trait;

pub use tencent::{Credential, TencentConfig, TencentOcr};

/// One table-recognition request, built fresh for each source file.
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub payload: EncodedPayload,
    pub is_pdf: bool,
    /// 1-indexed PDF page. `None` lets the provider use page 1.
    pub page_number: Option<u32>,
}

impl RecognitionRequest {
    /// Build a request; a page number of zero is dropped.
    pub fn new(payload: EncodedPayload, kind: DocumentKind, page_number: Option<u32>) -> Self {
        Self {
            payload,
            is_pdf: kind.is_pdf(),
            page_number: page_number.filter(|&p| p != 0),
        }
    }
}

/// A successful recognition.
#[derive(Debug, Clone, Default)]
pub struct Recognition {
    /// The spreadsheet produced by the provider, already base64-decoded.
    pub data: Vec<u8>,
    /// Provider request id, for correlating with provider-side logs.
    pub request_id: String,
    /// Total pages of a PDF source, when the provider reports it.
    pub pdf_page_count: Option<u32>,
}

/// A remote service that turns a document image into a spreadsheet.
///
/// Calls are independent and the implementation must be safe to share
/// across concurrent workers.
#[async_trait]
pub trait TableRecognizer: Send + Sync {
    /// Short provider name for logs and error messages.
    fn name(&self) -> &str;

    /// Submit one document. Exactly one remote call per invocation; retrying
    /// is left to the caller.
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Recognition, RecognitionError>;
}

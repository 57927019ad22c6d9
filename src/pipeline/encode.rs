//! Payload encoding: source file → base64 text bounded by the provider limit.
//!
//! The table-OCR endpoint takes the document inline as base64 inside the JSON
//! body and rejects bodies above a fixed size. Oversized files are caught
//! here, before any network traffic, and reported as
//! [`FileError::PayloadTooLarge`].
//!
//! The whole file is read into memory and encoded in one go (no streaming
//! encoder), so memory per worker grows with the source size. The
//! metadata pre-check keeps oversized files from ever being read. Empty
//! files are refused as [`FileError::EmptySource`]; the provider can only
//! reject them.

use crate::error::FileError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::{debug, error, warn};

/// Base64 text of one source file, ready to be embedded in a request.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    text: String,
    source_len: u64,
}

impl EncodedPayload {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length of the base64 text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Size of the raw bytes that were encoded.
    pub fn source_len(&self) -> u64 {
        self.source_len
    }
}

// The payload can be megabytes long; keep it out of debug logs.
impl std::fmt::Debug for EncodedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedPayload")
            .field("len", &self.text.len())
            .field("source_len", &self.source_len)
            .finish()
    }
}

/// Length of the padded standard base64 encoding of `raw_len` bytes.
pub fn encoded_len(raw_len: u64) -> u64 {
    raw_len.div_ceil(3) * 4
}

/// Encode an in-memory buffer, enforcing `max_len` on the base64 text.
pub fn encode_bytes(bytes: &[u8], max_len: u64) -> Result<EncodedPayload, FileError> {
    let text = STANDARD.encode(bytes);
    let size = text.len() as u64;
    if size > max_len {
        return Err(FileError::PayloadTooLarge { size, max: max_len });
    }
    Ok(EncodedPayload {
        text,
        source_len: bytes.len() as u64,
    })
}

/// Read `path` and encode it, enforcing `max_len` on the base64 text.
///
/// The limit is checked against the file's metadata first so an oversized
/// scan is rejected without loading it.
pub async fn encode_file(path: &Path, max_len: u64) -> Result<EncodedPayload, FileError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| FileError::ReadFailed {
            detail: format!("{}: {}", path.display(), e),
        })?;

    if meta.len() == 0 {
        warn!("{}: {}", path.display(), FileError::EmptySource);
        return Err(FileError::EmptySource);
    }

    let predicted = encoded_len(meta.len());
    if predicted > max_len {
        let err = FileError::PayloadTooLarge {
            size: predicted,
            max: max_len,
        };
        error!("{}: {}", path.display(), err);
        return Err(err);
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| FileError::ReadFailed {
            detail: format!("{}: {}", path.display(), e),
        })?;

    if bytes.is_empty() {
        warn!("{}: {}", path.display(), FileError::EmptySource);
        return Err(FileError::EmptySource);
    }

    let payload = encode_bytes(&bytes, max_len).inspect_err(|err| {
        // The file grew between the metadata check and the read.
        error!("{}: {}", path.display(), err);
    })?;
    debug!(
        "Encoded {} → {} bytes base64",
        path.display(),
        payload.len()
    );
    Ok(payload)
}

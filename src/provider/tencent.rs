//! Tencent Cloud `RecognizeTableOCR` client.
//!
//! Talks to the OCR API 3.0 endpoint directly over HTTPS with `reqwest`.
//! Every request is a JSON `POST /` signed with TC3-HMAC-SHA256:
//!
//! ```text
//! canonical request ─sha256─▶ string to sign
//! secret key ─hmac(date)─hmac(service)─hmac("tc3_request")─▶ signing key
//! hmac(signing key, string to sign) ─hex─▶ signature
//! ```
//!
//! The response envelope is `{"Response": {...}}`; on success it carries the
//! spreadsheet as base64 in `Data`, on failure an `Error { Code, Message }`.
//! Both carry a `RequestId`.

use crate::error::{Ocr2TableError, RecognitionError};
use crate::provider::{Recognition, RecognitionRequest, TableRecognizer};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::DateTime;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub const SECRET_ID_ENV: &str = "TC_SECRET_ID";
pub const SECRET_KEY_ENV: &str = "TC_SECRET_KEY";

const ACTION: &str = "RecognizeTableOCR";
const API_VERSION: &str = "2018-11-19";
const ALGORITHM: &str = "TC3-HMAC-SHA256";
const CONTENT_TYPE: &str = "application/json; charset=utf-8";
const SIGNED_HEADERS: &str = "content-type;host;x-tc-action";

/// API key pair from the Tencent Cloud console.
#[derive(Clone)]
pub struct Credential {
    pub secret_id: String,
    pub secret_key: String,
}

impl Credential {
    pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Read `TC_SECRET_ID` and `TC_SECRET_KEY` from the environment.
    pub fn from_env() -> Result<Self, Ocr2TableError> {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        match (read(SECRET_ID_ENV), read(SECRET_KEY_ENV)) {
            (Some(id), Some(key)) => Ok(Self::new(id, key)),
            _ => Err(Ocr2TableError::ProviderNotConfigured {
                provider: "tencent".to_string(),
                hint: format!(
                    "Set {SECRET_ID_ENV} and {SECRET_KEY_ENV} \
                     (keys: https://console.cloud.tencent.com/cam/capi)."
                ),
            }),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Endpoint settings for the Tencent Cloud OCR service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TencentConfig {
    /// API host. Default: `ocr.tencentcloudapi.com`.
    pub endpoint: String,
    /// Region the request is routed to. Default: `ap-beijing`.
    pub region: String,
    /// HTTP timeout for one request, in seconds. Default: 60.
    pub timeout_secs: u64,
}

impl Default for TencentConfig {
    fn default() -> Self {
        Self {
            endpoint: "ocr.tencentcloudapi.com".to_string(),
            region: "ap-beijing".to_string(),
            timeout_secs: 60,
        }
    }
}

impl TencentConfig {
    /// The service name used in the credential scope: the first host label.
    fn service(&self) -> &str {
        self.endpoint.split('.').next().unwrap_or("ocr")
    }
}

/// [`TableRecognizer`] backed by Tencent Cloud table OCR.
///
/// Cheap to share: one instance is built at start-up and used read-only by
/// every worker.
pub struct TencentOcr {
    http: reqwest::Client,
    credential: Credential,
    config: TencentConfig,
}

impl TencentOcr {
    pub fn new(credential: Credential, config: TencentConfig) -> Result<Self, Ocr2TableError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Ocr2TableError::ProviderNotConfigured {
                provider: "tencent".to_string(),
                hint: format!("HTTP client could not be built: {e}"),
            })?;
        Ok(Self {
            http,
            credential,
            config,
        })
    }

    /// Credentials from the environment, default endpoint and region.
    pub fn from_env() -> Result<Self, Ocr2TableError> {
        Self::new(Credential::from_env()?, TencentConfig::default())
    }

    pub fn config(&self) -> &TencentConfig {
        &self.config
    }
}

impl fmt::Debug for TencentOcr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TencentOcr")
            .field("credential", &self.credential)
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl TableRecognizer for TencentOcr {
    fn name(&self) -> &str {
        "tencent"
    }

    async fn recognize(&self, request: &RecognitionRequest) -> Result<Recognition, RecognitionError> {
        let body = request_body(request)?;
        debug!(
            "Extra request parameters: IsPdf={} PdfPageNumber={:?}",
            request.is_pdf, request.page_number
        );

        let timestamp = chrono::Utc::now().timestamp();
        let authorization = sign(
            &self.credential,
            &self.config.endpoint,
            self.config.service(),
            &body,
            timestamp,
        )?;

        let response = self
            .http
            .post(format!("https://{}/", self.config.endpoint))
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("X-TC-Action", ACTION)
            .header("X-TC-Timestamp", timestamp.to_string())
            .header("X-TC-Version", API_VERSION)
            .header("X-TC-Region", &self.config.region)
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.config.timeout_secs))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.config.timeout_secs))?;

        let recognition = parse_response(status, &text)?;
        debug!(
            "Result received, request id: {} ({} bytes)",
            recognition.request_id,
            recognition.data.len()
        );
        Ok(recognition)
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RecognizeTableBody<'a> {
    image_base64: &'a str,
    #[serde(skip_serializing_if = "is_false")]
    is_pdf: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pdf_page_number: Option<u32>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: ResponseBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResponseBody {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    pdf_page_size: Option<u32>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    code: String,
    #[serde(default)]
    message: String,
}

/// Serialise the JSON body. `IsPdf` is only sent when true and
/// `PdfPageNumber` only when set.
fn request_body(request: &RecognitionRequest) -> Result<String, RecognitionError> {
    let body = RecognizeTableBody {
        image_base64: request.payload.as_str(),
        is_pdf: request.is_pdf,
        pdf_page_number: request.page_number,
    };
    serde_json::to_string(&body).map_err(|e| RecognitionError::Transport {
        detail: format!("request body could not be serialised: {e}"),
        retryable: false,
    })
}

/// Interpret an HTTP status and body from the OCR endpoint.
fn parse_response(status: u16, body: &str) -> Result<Recognition, RecognitionError> {
    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if status >= 400 => {
            return Err(RecognitionError::Transport {
                detail: format!("HTTP {status}: {}", truncate(body, 200)),
                retryable: status == 429 || status >= 500,
            });
        }
        Err(e) => {
            return Err(RecognitionError::InvalidResponse {
                detail: format!("unexpected body ({e}): {}", truncate(body, 200)),
            });
        }
    };

    let response = envelope.response;
    let request_id = response.request_id.unwrap_or_default();

    if let Some(err) = response.error {
        return Err(RecognitionError::Remote {
            code: err.code,
            message: err.message,
            request_id,
        });
    }

    let encoded = response.data.ok_or_else(|| RecognitionError::InvalidResponse {
        detail: format!("response without Data (request id: {request_id})"),
    })?;
    let data = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| RecognitionError::InvalidResponse {
            detail: format!("Data is not valid base64: {e} (request id: {request_id})"),
        })?;

    Ok(Recognition {
        data,
        request_id,
        pdf_page_count: response.pdf_page_size,
    })
}

fn transport_error(e: reqwest::Error, timeout_secs: u64) -> RecognitionError {
    if e.is_timeout() {
        return RecognitionError::Timeout { secs: timeout_secs };
    }
    RecognitionError::Transport {
        retryable: e.is_connect() || e.is_request() || e.is_body(),
        detail: e.to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

// ── TC3-HMAC-SHA256 ──────────────────────────────────────────────────────

fn hmac_sha256(key: &[u8], msg: &str) -> Result<Vec<u8>, RecognitionError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| RecognitionError::Transport {
        detail: format!("signing key rejected: {e}"),
        retryable: false,
    })?;
    mac.update(msg.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// Build the `Authorization` header value for a request sent at `timestamp`
/// (Unix seconds).
fn sign(
    credential: &Credential,
    host: &str,
    service: &str,
    payload: &str,
    timestamp: i64,
) -> Result<String, RecognitionError> {
    let date = DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| RecognitionError::Transport {
            detail: format!("timestamp {timestamp} out of range"),
            retryable: false,
        })?
        .format("%Y-%m-%d")
        .to_string();

    let canonical_headers = format!(
        "content-type:{CONTENT_TYPE}\nhost:{host}\nx-tc-action:{}\n",
        ACTION.to_lowercase()
    );
    let canonical_request = format!(
        "POST\n/\n\n{canonical_headers}\n{SIGNED_HEADERS}\n{}",
        sha256_hex(payload)
    );

    let scope = format!("{date}/{service}/tc3_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{timestamp}\n{scope}\n{}",
        sha256_hex(&canonical_request)
    );

    let secret_date = hmac_sha256(format!("TC3{}", credential.secret_key).as_bytes(), &date)?;
    let secret_service = hmac_sha256(&secret_date, service)?;
    let secret_signing = hmac_sha256(&secret_service, "tc3_request")?;
    let signature = hex::encode(hmac_sha256(&secret_signing, &string_to_sign)?);

    Ok(format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
        credential.secret_id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::DocumentKind;
    use crate::pipeline::encode::encode_bytes;

    fn request(kind: DocumentKind, page: Option<u32>) -> RecognitionRequest {
        RecognitionRequest::new(encode_bytes(b"scan", 64).unwrap(), kind, page)
    }

    #[test]
    fn image_body_omits_pdf_fields() {
        let body = request_body(&request(DocumentKind::Image, None)).unwrap();
        assert_eq!(body, r#"{"ImageBase64":"c2Nhbg=="}"#);
    }

    #[test]
    fn pdf_body_carries_flag_and_page() {
        let body = request_body(&request(DocumentKind::Pdf, Some(2))).unwrap();
        assert_eq!(
            body,
            r#"{"ImageBase64":"c2Nhbg==","IsPdf":true,"PdfPageNumber":2}"#
        );
        let body = request_body(&request(DocumentKind::Pdf, None)).unwrap();
        assert_eq!(body, r#"{"ImageBase64":"c2Nhbg==","IsPdf":true}"#);
    }

    #[test]
    fn parses_successful_response() {
        let body = r#"{"Response":{"Data":"UEsDBA==","PdfPageSize":2,"RequestId":"abc-123"}}"#;
        let rec = parse_response(200, body).unwrap();
        assert_eq!(rec.data, b"PK\x03\x04");
        assert_eq!(rec.request_id, "abc-123");
        assert_eq!(rec.pdf_page_count, Some(2));
    }

    #[test]
    fn parses_error_response() {
        let body = r#"{"Response":{"Error":{"Code":"FailedOperation.ImageDecodeFailed","Message":"decode failed"},"RequestId":"r-9"}}"#;
        let err = parse_response(200, body).unwrap_err();
        match err {
            RecognitionError::Remote {
                code,
                message,
                request_id,
            } => {
                assert_eq!(code, "FailedOperation.ImageDecodeFailed");
                assert_eq!(message, "decode failed");
                assert_eq!(request_id, "r-9");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rate_limit_response_is_transient() {
        let body = r#"{"Response":{"Error":{"Code":"RequestLimitExceeded","Message":"slow down"},"RequestId":"r"}}"#;
        assert!(parse_response(200, body).unwrap_err().is_transient());
    }

    #[test]
    fn non_json_server_error_is_retryable_transport() {
        let err = parse_response(502, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, RecognitionError::Transport { retryable: true, .. }));
        let err = parse_response(400, "nope").unwrap_err();
        assert!(matches!(err, RecognitionError::Transport { retryable: false, .. }));
    }

    #[test]
    fn missing_or_corrupt_data_is_invalid() {
        let err = parse_response(200, r#"{"Response":{"RequestId":"r"}}"#).unwrap_err();
        assert!(matches!(err, RecognitionError::InvalidResponse { .. }));
        let err = parse_response(200, r#"{"Response":{"Data":"!!!","RequestId":"r"}}"#)
            .unwrap_err();
        assert!(matches!(err, RecognitionError::InvalidResponse { .. }));
        let err = parse_response(200, "not json").unwrap_err();
        assert!(matches!(err, RecognitionError::InvalidResponse { .. }));
    }

    #[test]
    fn authorization_header_layout() {
        let cred = Credential::new("AKIDexample", "secret");
        // 2022-09-01T05:32:00Z
        let auth = sign(&cred, "ocr.tencentcloudapi.com", "ocr", "{}", 1_662_010_320).unwrap();
        assert!(
            auth.starts_with(
                "TC3-HMAC-SHA256 Credential=AKIDexample/2022-09-01/ocr/tc3_request, \
                 SignedHeaders=content-type;host;x-tc-action, Signature="
            ),
            "got: {auth}"
        );
        let signature = auth.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_depends_on_key_and_payload() {
        let a = Credential::new("id", "key-a");
        let b = Credential::new("id", "key-b");
        let host = "ocr.tencentcloudapi.com";
        let ts = 1_662_010_320;
        let base = sign(&a, host, "ocr", "{}", ts).unwrap();
        assert_eq!(base, sign(&a, host, "ocr", "{}", ts).unwrap());
        assert_ne!(base, sign(&b, host, "ocr", "{}", ts).unwrap());
        assert_ne!(base, sign(&a, host, "ocr", "{\"x\":1}", ts).unwrap());
    }

    #[test]
    fn credential_debug_redacts_key() {
        let cred = Credential::new("AKID", "super-secret");
        let dbg = format!("{cred:?}");
        assert!(dbg.contains("AKID"));
        assert!(!dbg.contains("super-secret"));
    }

    #[test]
    fn service_is_first_host_label() {
        assert_eq!(TencentConfig::default().service(), "ocr");
    }
}

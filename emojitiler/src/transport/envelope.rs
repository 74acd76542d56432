//! Wire envelope for platform API responses.
//!
//! The platform wraps every response in an `ok`/`result` envelope; failed
//! calls carry an error code, a human description, and for throttled calls
//! a structured `retry_after` field.

use serde::de::DeserializeOwned;
use serde::Deserialize;

/// A raw HTTP-level response before envelope decoding.
///
/// The transport layer branches on `status` and the retry delay; everything
/// else is decoded from `body`.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Retry delay from the `Retry-After` header, in seconds.
    pub retry_after_header: Option<u64>,
    /// Response body.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Returns the throttle delay in seconds: header first, then the
    /// structured body field.
    pub fn retry_delay_secs(&self) -> Option<u64> {
        if self.retry_after_header.is_some() {
            return self.retry_after_header;
        }
        serde_json::from_slice::<ThrottleProbe>(&self.body)
            .ok()
            .and_then(|p| p.parameters)
            .and_then(|p| p.retry_after)
    }

    /// Decodes the body into an [`ApiResponse`].
    pub fn decode<T: DeserializeOwned>(&self) -> Result<ApiResponse<T>, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Minimal body shape for extracting `parameters.retry_after` without
/// knowing the result type.
#[derive(Debug, Deserialize)]
struct ThrottleProbe {
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

/// Structured parameters attached to failed responses.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ResponseParameters {
    /// Seconds to wait before retrying a throttled call.
    #[serde(default)]
    pub retry_after: Option<u64>,
}

/// The platform's response envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct ApiResponse<T> {
    /// Whether the call succeeded.
    pub ok: bool,
    /// The payload; present when `ok` is true.
    #[serde(default)]
    pub result: Option<T>,
    /// Numeric error code; present when `ok` is false.
    #[serde(default)]
    pub error_code: Option<i64>,
    /// Human-readable error description; present when `ok` is false.
    #[serde(default)]
    pub description: Option<String>,
    /// Structured error parameters.
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

//! Rate-limited transport for platform API calls.
//!
//! Wraps every outbound call with token-bucket acquisition and the
//! platform's throttling protocol:
//!
//! - **429**: read the retry delay (header, then structured body field);
//!   fail fast with [`TransportError::QuotaExceeded`] when the delay
//!   exceeds the configured threshold, otherwise sleep `delay + 1s` and
//!   retry the same request.
//! - **5xx**: fail immediately without retry.
//! - Anything else is decoded and returned as an application-level
//!   [`ApiResponse`], never a transport error.

mod bucket;
mod envelope;

pub use bucket::TokenBucket;
pub use envelope::{ApiResponse, RawResponse, ResponseParameters};

use crate::config::transport::THROTTLE_SLACK;
use crate::config::TransportConfig;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Throttle delay assumed when a 429 carries no delay at all.
const FALLBACK_THROTTLE_DELAY: Duration = Duration::from_secs(5);

/// Errors at the transport layer.
///
/// Application-level failures (`ok=false` envelopes) are not transport
/// errors; they are returned to the caller for domain translation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request itself failed (connection, timeout, ...).
    #[error("request failed: {0}")]
    Http(String),

    /// The platform reported a throttle delay above the wait threshold.
    #[error("platform quota exceeded, asked to retry in {retry_after:?}")]
    QuotaExceeded { retry_after: Duration },

    /// The platform returned a server-side error status.
    #[error("platform server error: HTTP {status}")]
    Server { status: u16 },

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Token-bucket limited executor for platform calls.
///
/// One transport instance is shared by every caller hitting the same
/// credential, so the limiter accounting covers the whole process.
#[derive(Debug)]
pub struct RateLimitedTransport {
    bucket: TokenBucket,
    config: TransportConfig,
}

impl RateLimitedTransport {
    /// Creates a transport with the given limiter configuration.
    pub fn new(config: TransportConfig) -> Self {
        Self {
            bucket: TokenBucket::new(config.bucket_capacity, config.refill_per_sec),
            config,
        }
    }

    /// Returns the underlying token bucket (for stats).
    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }

    /// Executes a platform call through the limiter and throttle protocol.
    ///
    /// `call` is re-invoked for each attempt, so request bodies must be
    /// rebuildable. Returns the decoded envelope for any non-throttled,
    /// non-5xx response, `ok=false` included.
    pub async fn execute<T, F, Fut>(
        &self,
        method: &str,
        mut call: F,
    ) -> Result<ApiResponse<T>, TransportError>
    where
        T: DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RawResponse, TransportError>>,
    {
        loop {
            self.bucket.acquire().await;

            let raw = call().await?;

            if raw.status == 429 {
                let delay = raw
                    .retry_delay_secs()
                    .map(Duration::from_secs)
                    .unwrap_or(FALLBACK_THROTTLE_DELAY);

                if delay > self.config.max_throttle_wait {
                    warn!(method, delay_secs = delay.as_secs(), "throttle delay above threshold, failing fast");
                    return Err(TransportError::QuotaExceeded { retry_after: delay });
                }

                debug!(method, delay_secs = delay.as_secs(), "throttled, sleeping before retry");
                tokio::time::sleep(delay + THROTTLE_SLACK).await;
                continue;
            }

            if (500..=599).contains(&raw.status) {
                return Err(TransportError::Server { status: raw.status });
            }

            return raw.decode().map_err(|e| TransportError::Decode(e.to_string()));
        }
    }
}

//! Rate-limited transport configuration.

use std::time::Duration;

/// Token bucket capacity (burst size).
pub const DEFAULT_BUCKET_CAPACITY: u32 = 20;

/// Token bucket refill rate, tokens per second.
pub const DEFAULT_REFILL_PER_SEC: f64 = 20.0;

/// Throttle delays above this threshold fail fast with a quota-exceeded
/// error instead of sleeping.
pub const MAX_THROTTLE_WAIT: Duration = Duration::from_secs(100);

/// Extra second added on top of the platform-reported throttle delay.
pub const THROTTLE_SLACK: Duration = Duration::from_secs(1);

/// Configuration for the rate-limited transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportConfig {
    /// Token bucket capacity (maximum burst).
    pub bucket_capacity: u32,
    /// Token refill rate per second.
    pub refill_per_sec: f64,
    /// Throttle delays above this fail fast instead of waiting.
    pub max_throttle_wait: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
            refill_per_sec: DEFAULT_REFILL_PER_SEC,
            max_throttle_wait: MAX_THROTTLE_WAIT,
        }
    }
}

impl TransportConfig {
    /// Set the token bucket capacity.
    pub fn with_bucket_capacity(mut self, capacity: u32) -> Self {
        self.bucket_capacity = capacity;
        self
    }

    /// Set the refill rate in tokens per second.
    pub fn with_refill_per_sec(mut self, rate: f64) -> Self {
        self.refill_per_sec = rate;
        self
    }

    /// Set the fast-fail threshold for throttle delays.
    pub fn with_max_throttle_wait(mut self, wait: Duration) -> Self {
        self.max_throttle_wait = wait;
        self
    }
}

//! Token-bucket limiter for outbound platform calls.
//!
//! Every outbound call acquires one token before hitting the wire. Tokens
//! refill continuously at a fixed rate up to the bucket capacity, so short
//! bursts pass through unthrottled while sustained traffic is smoothed to
//! the refill rate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Continuous-refill token bucket.
///
/// Uses the tokio clock, so tests under `tokio::time::pause` observe
/// deterministic waits.
#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum tokens the bucket can hold (burst size).
    capacity: f64,

    /// Tokens added per second.
    refill_per_sec: f64,

    /// Current fill level and last refill timestamp.
    state: Mutex<BucketState>,

    /// Total tokens handed out (for stats/debugging).
    acquired_total: AtomicU64,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a full bucket.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0 or `refill_per_sec` is not positive.
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        assert!(refill_per_sec > 0.0, "refill_per_sec must be > 0");

        Self {
            capacity: f64::from(capacity),
            refill_per_sec,
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
            }),
            acquired_total: AtomicU64::new(0),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.last_refill = now;
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_per_sec)
            .min(self.capacity);
    }

    /// Takes one token, waiting for refill if the bucket is empty.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    self.acquired_total.fetch_add(1, Ordering::Relaxed);
                    None
                } else {
                    // Time until one full token is available
                    Some(Duration::from_secs_f64(
                        (1.0 - state.tokens) / self.refill_per_sec,
                    ))
                }
            };

            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Returns the current fill level (refreshed).
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        self.refill(&mut state);
        state.tokens
    }

    /// Returns the total number of tokens handed out.
    pub fn acquired_total(&self) -> u64 {
        self.acquired_total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn test_zero_capacity_panics() {
        TokenBucket::new(0, 1.0);
    }

    #[tokio::test]
    async fn test_burst_passes_unthrottled() {
        let bucket = TokenBucket::new(5, 1.0);
        for _ in 0..5 {
            bucket.acquire().await;
        }
        assert_eq!(bucket.acquired_total(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_bucket_waits_for_refill() {
        let bucket = TokenBucket::new(1, 1.0);
        bucket.acquire().await;

        let start = Instant::now();
        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_caps_at_capacity() {
        let bucket = TokenBucket::new(3, 100.0);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(bucket.available() <= 3.0);
    }
}

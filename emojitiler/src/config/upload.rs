//! Upload orchestrator configuration.

use std::time::Duration;

/// Maximum number of members a pack may hold, fixed by the platform.
pub const PACK_TOTAL_CAP: usize = 200;

/// Maximum number of assets a single create/extend call may carry.
pub const PACK_BATCH_CAP: usize = 50;

/// Fixed row width of the platform's emoji grid rendering.
pub const PLATFORM_ROW_WIDTH: u32 = 8;

/// Attempts made for each one-at-a-time pack insertion.
pub const INSERT_ATTEMPTS: u32 = 5;

/// Fixed backoff between insertion attempts.
pub const INSERT_BACKOFF: Duration = Duration::from_secs(1);

/// Configuration for pack creation and extension.
///
/// Defaults mirror the platform's published quotas; tests shrink them to
/// exercise the cap handling without hundreds of fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadConfig {
    /// Total member cap per pack (existing + new + filler).
    pub total_cap: usize,
    /// Maximum assets per create/extend call.
    pub batch_cap: usize,
    /// Fixed row width the platform renders packs at.
    pub row_width: u32,
    /// Attempts per one-at-a-time insertion.
    pub insert_attempts: u32,
    /// Backoff between insertion attempts.
    pub insert_backoff: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            total_cap: PACK_TOTAL_CAP,
            batch_cap: PACK_BATCH_CAP,
            row_width: PLATFORM_ROW_WIDTH,
            insert_attempts: INSERT_ATTEMPTS,
            insert_backoff: INSERT_BACKOFF,
        }
    }
}

impl UploadConfig {
    /// Set the total member cap.
    pub fn with_total_cap(mut self, cap: usize) -> Self {
        self.total_cap = cap;
        self
    }

    /// Set the per-call batch cap.
    pub fn with_batch_cap(mut self, cap: usize) -> Self {
        self.batch_cap = cap;
        self
    }

    /// Set the backoff between insertion attempts.
    pub fn with_insert_backoff(mut self, backoff: Duration) -> Self {
        self.insert_backoff = backoff;
        self
    }
}

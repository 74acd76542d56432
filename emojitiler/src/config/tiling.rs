//! Tiling processor configuration.

use std::time::Duration;

/// Side length of one emoji tile in pixels, fixed by the platform.
pub const TILE_SIZE: u32 = 100;

/// Default number of transcoding workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Final-row leftover heights below this are cropped away entirely
/// rather than padded into a degenerate near-empty row.
pub const MIN_LAST_ROW_HEIGHT: u32 = 20;

/// Maximum clip duration accepted by the platform for video emoji.
pub const DURATION_CAP: Duration = Duration::from_secs(3);

/// Output frame rate for video emoji.
pub const FRAME_RATE: u32 = 30;

/// Default encoder quality value (VP9 CRF). Higher means smaller output.
pub const DEFAULT_QUALITY: u32 = 32;

/// Quality increment applied when the platform rejects an asset as oversized.
pub const QUALITY_STEP: u32 = 5;

/// Hard ceiling for the quality value; beyond this the source cannot be
/// shrunk further and the rejection is surfaced.
pub const MAX_QUALITY: u32 = 63;

/// Configuration for the tiling processor.
///
/// # Example
///
/// ```
/// use emojitiler::config::TilingConfig;
///
/// let config = TilingConfig::default().with_workers(2);
/// assert_eq!(config.workers, 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingConfig {
    /// Number of worker tasks transcoding tiles concurrently.
    pub workers: usize,
    /// Final-row heights below this threshold are cropped away.
    pub min_last_row_height: u32,
    /// Maximum clip duration.
    pub duration_cap: Duration,
    /// Output frame rate.
    pub frame_rate: u32,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            min_last_row_height: MIN_LAST_ROW_HEIGHT,
            duration_cap: DURATION_CAP,
            frame_rate: FRAME_RATE,
        }
    }
}

impl TilingConfig {
    /// Set the number of transcoding workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the minimum height kept for the final tile row.
    pub fn with_min_last_row_height(mut self, height: u32) -> Self {
        self.min_last_row_height = height;
        self
    }
}

//! Tiling processor: source media → grid of 100×100 emoji tiles.
//!
//! The processor normalizes the source to the requested grid width,
//! splits it into row-major tiles and transcodes them through a
//! fixed-size worker pool. Results are reassembled by explicit position
//! index, never by completion order, since tile completion order under a
//! worker pool is unspecified.
//!
//! # Flow
//!
//! ```text
//! probe → normalize (resize once) → degenerate-last-row crop → plan grid
//!       → dispatch tiles to worker pool → collect by position index
//! ```
//!
//! Cancellation is polled before each dispatch and each collection; a
//! fired signal terminates in-flight transcoder processes and returns
//! [`TilingError::Canceled`].

mod plan;
mod processor;

pub use plan::{crop_degenerate_row, plan_grid, plan_resize, GridPlan};
pub use processor::TilingProcessor;

use crate::media::MediaError;
use thiserror::Error;

/// Errors from the tiling processor.
#[derive(Debug, Error)]
pub enum TilingError {
    /// The job's cancellation signal fired. Not a failure: the driver
    /// runs compensating cleanup and reports the job as cancelled.
    #[error("tiling canceled")]
    Canceled,

    /// Probing the source failed.
    #[error("source probe failed: {0}")]
    Probe(MediaError),

    /// The one-shot normalization (resize/crop) failed.
    #[error("source normalization failed: {0}")]
    Normalize(MediaError),

    /// One tile transcode failed.
    #[error("tile {index} failed: {source}")]
    Tile { index: usize, source: MediaError },

    /// A worker produced no result for a tile slot. Indicates a bug in
    /// the pool plumbing, surfaced instead of panicking.
    #[error("worker pool lost tile {index}")]
    MissingTile { index: usize },
}

impl TilingError {
    /// Folds transcoder-level cancellation into the explicit canceled
    /// kind so callers never have to match on both.
    pub(crate) fn from_media(e: MediaError, wrap: impl FnOnce(MediaError) -> Self) -> Self {
        match e {
            MediaError::Canceled => TilingError::Canceled,
            other => wrap(other),
        }
    }
}

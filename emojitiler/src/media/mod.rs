//! Media probing and transcoding.
//!
//! The pipeline never touches pixels itself; all media work is delegated
//! to an external transcoder (ffmpeg/ffprobe in production). The traits
//! here are the seams the tiling processor works against, so tests can
//! inject mocks and the worker pool can be exercised without binaries.

mod filter;
mod probe;
mod transcode;

pub use filter::{resize_filter, tile_filter, DEFAULT_MATTE};
pub use probe::{FfprobeProber, MediaProber};
pub use transcode::{FfmpegTranscoder, Transcoder, TranscodeSpec};

use std::path::PathBuf;
use thiserror::Error;

/// Source dimensions reported by the prober.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Errors from external media tools.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The tool could not be launched at all.
    #[error("failed to launch {tool}: {message}")]
    Launch { tool: &'static str, message: String },

    /// Probing a source failed or produced unparseable output.
    #[error("probe failed for {path}: {message}")]
    Probe { path: PathBuf, message: String },

    /// A transcode run exited with a failure status.
    #[error("transcode failed for {output}: {message}")]
    Transcode { output: PathBuf, message: String },

    /// The job's cancellation signal fired mid-run; the child process
    /// was terminated.
    #[error("media operation canceled")]
    Canceled,
}

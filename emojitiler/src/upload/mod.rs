//! Upload orchestration: tiles → remote assets → pack mutation.
//!
//! Turns the tiling stage's output into a created or extended pack:
//! lays the tiles out on the platform's fixed-width grid (centering
//! narrower grids with transparent filler), validates the platform's
//! quotas before any remote mutation, uploads sequentially through the
//! rate-limited transport, then creates or extends the pack per the
//! platform's batching rules.
//!
//! Uploads are intentionally not parallelized: the platform has
//! single-writer semantics on a pack and sequential uploads keep the
//! limiter accounting simple.

mod grid;
mod orchestrator;

pub use grid::{layout_grid, left_padding, GridSlot};
pub use orchestrator::{UploadOrchestrator, UploadOutcome};

use crate::platform::PlatformError;
use std::path::PathBuf;
use thiserror::Error;

/// One grid cell's uploaded asset.
///
/// Arranged row-major to match the tile layout; filler entries share one
/// uploaded transparent source. `document_id` is back-filled after the
/// set mutation from the authoritative member list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMeta {
    /// Raw uploaded asset handle.
    pub file_id: String,
    /// Final pack-member handle; filled in after set mutation.
    pub document_id: Option<String>,
    /// File name the asset was uploaded under.
    pub file_name: String,
    /// True for transparent filler entries.
    pub transparent: bool,
}

/// Failure taxonomy of the upload orchestrator.
///
/// Each variant carries the offending parameters for user-facing
/// translation.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The tiling stage produced no files.
    #[error("no tile files to upload")]
    NoFiles,

    /// The prospective pack size exceeds the platform's total cap.
    /// Raised before any remote mutation is attempted.
    #[error("pack {pack} would exceed the {cap}-member cap ({prospective} prospective members)")]
    ExceedsLimit {
        pack: String,
        prospective: usize,
        cap: usize,
    },

    /// Reading a tile file from the working directory failed.
    #[error("failed to open {path}: {source}")]
    OpenFileFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Uploading a tile asset failed.
    #[error("upload failed for {file_name}: {source}")]
    UploadFailed {
        file_name: String,
        source: PlatformError,
    },

    /// Uploading the shared transparent filler failed.
    #[error("filler upload failed: {source}")]
    FillerUploadFailed { source: PlatformError },

    /// The grid needs filler slots but no filler source was provided.
    #[error("grid requires filler tiles but no filler source was supplied")]
    MissingFiller,

    /// Creating the pack failed.
    #[error("pack creation failed for {pack}: {source}")]
    CreateFailed {
        pack: String,
        source: PlatformError,
    },

    /// Adding an asset to the pack failed after all attempts.
    #[error("adding {file_name} to pack {pack} failed: {source}")]
    AddFailed {
        pack: String,
        file_name: String,
        source: PlatformError,
    },

    /// Fetching the authoritative pack state failed.
    #[error("fetching pack {pack} failed: {source}")]
    FetchFailed {
        pack: String,
        source: PlatformError,
    },

    /// The job's cancellation signal fired. A newly created pack has
    /// already been deleted as compensation by the time this is returned.
    #[error("upload canceled")]
    Canceled,
}

impl UploadError {
    /// True when the platform rejected an asset as oversized; the caller
    /// reacts by bumping the quality value and re-running the tiling and
    /// upload stages from scratch.
    pub fn is_oversized(&self) -> bool {
        self.platform_source()
            .map(PlatformError::is_oversized_asset)
            .unwrap_or(false)
    }

    fn platform_source(&self) -> Option<&PlatformError> {
        match self {
            UploadError::UploadFailed { source, .. }
            | UploadError::FillerUploadFailed { source }
            | UploadError::CreateFailed { source, .. }
            | UploadError::AddFailed { source, .. }
            | UploadError::FetchFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

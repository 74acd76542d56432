//! Top-level generation pipeline.
//!
//! Composes the whole flow for one job:
//!
//! ```text
//! parse_args → setup_job → Admission.acquire → Progress.send_message
//!            → process_video → add_emojis → Progress.delete_message
//!            → Admission.release
//! ```
//!
//! Cancellation is a distinct sentinel, not an error: it short-circuits
//! every layer and triggers compensating cleanup (partially created pack
//! deleted, progress message removed, admission slot released). Cleanup
//! failures are logged at warn level and never re-raised.

mod context;
mod driver;

pub use context::PipelineContext;
pub use driver::{add_emojis, process_video, run_generation, setup_job, GenerationRequest};

pub use crate::command::parse_args;

use crate::admission::AdmissionError;
use crate::command::CommandError;
use crate::platform::UserId;
use crate::progress::ProgressError;
use crate::retrieval::RetrievalError;
use crate::storage::StorageError;
use crate::tiling::TilingError;
use crate::upload::UploadError;
use thiserror::Error;

/// Errors surfaced by the pipeline driver.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Argument normalization failed; surfaced to the submitter as-is.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The attachment could not be fetched or has an unsupported type.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// The job was cancelled. Compensating cleanup has already run.
    #[error("job canceled")]
    Canceled,

    /// The tiling stage failed.
    #[error(transparent)]
    Tiling(TilingError),

    /// The upload stage failed.
    #[error(transparent)]
    Upload(UploadError),

    /// Posting or mutating the progress message failed.
    #[error(transparent)]
    Progress(#[from] ProgressError),

    /// The pack storage row could not be written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The admission queue shut down while this job was waiting.
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    /// The caller lacks the permission flag for the requested mutation.
    #[error("user {user} is not permitted to {action} packs")]
    NotPermitted { user: UserId, action: &'static str },

    /// Creating the job working directory failed.
    #[error("workspace error: {0}")]
    Workspace(#[from] std::io::Error),
}

impl From<TilingError> for PipelineError {
    fn from(e: TilingError) -> Self {
        match e {
            TilingError::Canceled => PipelineError::Canceled,
            other => PipelineError::Tiling(other),
        }
    }
}

impl From<UploadError> for PipelineError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Canceled => PipelineError::Canceled,
            other => PipelineError::Upload(other),
        }
    }
}

impl PipelineError {
    /// True when the job ended through cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, PipelineError::Canceled)
    }
}

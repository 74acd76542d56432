//! Injected dependencies for the pipeline driver.

use crate::admission::AdmissionQueue;
use crate::config::{TilingConfig, UploadConfig};
use crate::job::workspace::WorkspaceRegistry;
use crate::media::{MediaProber, Transcoder};
use crate::platform::PackService;
use crate::progress::{ProgressTracker, StatusMessenger};
use crate::retrieval::MediaRetrieval;
use crate::storage::PackStorage;
use crate::tiling::TilingProcessor;
use crate::upload::UploadOrchestrator;
use std::sync::Arc;

/// Everything a generation job needs, owned explicitly and injected into
/// the driver. No global mutable state: registries (admission, progress)
/// are scoped to this context's lifecycle, which eases testing and makes
/// ownership obvious.
pub struct PipelineContext<P, T, S, M, R, St>
where
    P: MediaProber + 'static,
    T: Transcoder + 'static,
    S: PackService,
    M: StatusMessenger,
    R: MediaRetrieval,
    St: PackStorage,
{
    /// Tiling stage (probe, normalize, worker pool).
    pub tiling: TilingProcessor<P, T>,
    /// Upload stage (grid layout, pack mutation).
    pub uploader: UploadOrchestrator<S>,
    /// Per-pack admission control.
    pub admission: AdmissionQueue,
    /// Progress messages and cancellation signals.
    pub tracker: ProgressTracker<M>,
    /// Attachment fetching.
    pub retrieval: R,
    /// Pack storage rows.
    pub storage: St,
    /// Working directories and retention.
    pub workspace: WorkspaceRegistry,
    /// Upload quotas, also used for filler decisions.
    pub upload_config: UploadConfig,
}

impl<P, T, S, M, R, St> PipelineContext<P, T, S, M, R, St>
where
    P: MediaProber + 'static,
    T: Transcoder + 'static,
    S: PackService,
    M: StatusMessenger,
    R: MediaRetrieval,
    St: PackStorage,
{
    /// Wires up a context from its components.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prober: Arc<P>,
        transcoder: Arc<T>,
        service: Arc<S>,
        messenger: M,
        retrieval: R,
        storage: St,
        workspace: WorkspaceRegistry,
        tiling_config: TilingConfig,
        upload_config: UploadConfig,
    ) -> Self {
        Self {
            tiling: TilingProcessor::new(prober, transcoder, tiling_config),
            uploader: UploadOrchestrator::new(service, upload_config),
            admission: AdmissionQueue::new(),
            tracker: ProgressTracker::new(messenger),
            retrieval,
            storage,
            workspace,
            upload_config,
        }
    }
}

//! Pipeline driver: the per-job composition of every stage.

use super::{PipelineContext, PipelineError};
use crate::admission::Admission;
use crate::command::GenerationJob;
use crate::config::tiling::{MAX_QUALITY, QUALITY_STEP};
use crate::media::{MediaProber, Transcoder};
use crate::platform::{ChatId, MessageId, PackService, PlatformRejection, UserId};
use crate::progress::StatusMessenger;
use crate::retrieval::MediaRetrieval;
use crate::storage::{PackRecord, PackStorage};
use crate::upload::{layout_grid, GridSlot, UploadError, UploadOutcome};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Pack title used when the caller supplies none.
const DEFAULT_TITLE: &str = "Emoji Pack";

/// The chat-layer context of one generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Chat the command arrived in.
    pub chat: ChatId,
    /// Message the bot's status message replies to.
    pub reply_to: Option<MessageId>,
    /// User who submitted the command.
    pub initiator: UserId,
    /// Attachment reference of the source media.
    pub attachment: String,
}

/// Completes a parsed job with per-request state: fetches the source
/// media (unsupported MIME types are rejected here, before any
/// processing), creates the working directory, resolves the pack link
/// and title, and enforces the caller's permission flags.
pub async fn setup_job<P, T, S, M, R, St>(
    ctx: &PipelineContext<P, T, S, M, R, St>,
    mut job: GenerationJob,
    request: &GenerationRequest,
) -> Result<GenerationJob, PipelineError>
where
    P: MediaProber + 'static,
    T: Transcoder + 'static,
    S: PackService,
    M: StatusMessenger,
    R: MediaRetrieval,
    St: PackStorage,
{
    if job.new_set && !job.permissions.can_create {
        return Err(PipelineError::NotPermitted {
            user: request.initiator,
            action: "create",
        });
    }
    if !job.new_set && !job.permissions.can_extend {
        return Err(PipelineError::NotPermitted {
            user: request.initiator,
            action: "extend",
        });
    }

    let media = ctx.retrieval.fetch(&request.attachment).await?;

    job.initiator = request.initiator;
    job.work_dir = ctx.workspace.register_directory(&job.id.to_string())?;
    job.source = media.path;

    if job.new_set && job.pack_link.is_empty() {
        job.pack_link = format!("emoji_{}_{}", request.initiator, job.id.as_u64());
    }
    if job.set_title.is_empty() {
        job.set_title = DEFAULT_TITLE.to_string();
    }

    debug!(job_id = %job.id, pack = %job.pack_link, mime = %media.mime_type, "job set up");
    Ok(job)
}

/// Runs the tiling stage for a job.
pub async fn process_video<P, T, S, M, R, St>(
    ctx: &PipelineContext<P, T, S, M, R, St>,
    job: &mut GenerationJob,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>, PipelineError>
where
    P: MediaProber + 'static,
    T: Transcoder + 'static,
    S: PackService,
    M: StatusMessenger,
    R: MediaRetrieval,
    St: PackStorage,
{
    Ok(ctx.tiling.process(job, cancel).await?)
}

/// Runs the upload stage for a job and syncs the pack storage row.
///
/// Synthesizes the shared transparent filler first when the grid layout
/// needs one.
pub async fn add_emojis<P, T, S, M, R, St>(
    ctx: &PipelineContext<P, T, S, M, R, St>,
    job: &mut GenerationJob,
    tiles: &[PathBuf],
    cancel: &CancellationToken,
) -> Result<UploadOutcome, PipelineError>
where
    P: MediaProber + 'static,
    T: Transcoder + 'static,
    S: PackService,
    M: StatusMessenger,
    R: MediaRetrieval,
    St: PackStorage,
{
    let needs_filler = layout_grid(tiles.len(), job.width, ctx.upload_config.row_width)
        .iter()
        .any(GridSlot::is_filler);
    let filler = if needs_filler {
        Some(ctx.tiling.make_filler(job, cancel).await?)
    } else {
        None
    };

    let outcome = match ctx
        .uploader
        .add_emojis(job, tiles, filler.as_deref(), cancel)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            // A pack that vanished remotely invalidates its storage row
            if let UploadError::FetchFailed { pack, source } = &e {
                if source.rejection() == Some(PlatformRejection::PackMissing) {
                    if let Err(se) = ctx.storage.mark_deleted(pack).await {
                        debug!(pack, error = %se, "could not mark vanished pack deleted");
                    }
                }
            }
            return Err(e.into());
        }
    };

    if outcome.created_new {
        ctx.storage
            .create_pack(PackRecord {
                link: outcome.pack_link.clone(),
                title: job.set_title.clone(),
                owner: job.initiator,
                member_count: outcome.total_members,
                deleted: false,
            })
            .await?;
    } else {
        ctx.storage
            .update_member_count(&outcome.pack_link, outcome.total_members)
            .await?;
    }

    Ok(outcome)
}

/// Runs one generation job end to end.
///
/// Admission is acquired per pack link (FIFO behind any active job on
/// the same pack); the progress message is posted once admitted and
/// removed on every exit path; the admission slot is always released.
#[instrument(skip(ctx, job, request), fields(job_id = %job.id, chat = request.chat))]
pub async fn run_generation<P, T, S, M, R, St>(
    ctx: &PipelineContext<P, T, S, M, R, St>,
    job: GenerationJob,
    request: GenerationRequest,
) -> Result<UploadOutcome, PipelineError>
where
    P: MediaProber + 'static,
    T: Transcoder + 'static,
    S: PackService,
    M: StatusMessenger,
    R: MediaRetrieval,
    St: PackStorage,
{
    let mut job = setup_job(ctx, job, &request).await?;

    let key = job.pack_link.clone();
    match ctx.admission.acquire(&key) {
        Admission::Granted => {}
        Admission::Queued(waiter) => {
            debug!(pack = %key, "another job holds this pack, waiting");
            waiter.wait().await?;
        }
    }

    let result = attended(ctx, &mut job, &request).await;
    ctx.admission.release(&key);
    result
}

/// The admitted portion of a job: progress message lifecycle around the
/// actual work.
async fn attended<P, T, S, M, R, St>(
    ctx: &PipelineContext<P, T, S, M, R, St>,
    job: &mut GenerationJob,
    request: &GenerationRequest,
) -> Result<UploadOutcome, PipelineError>
where
    P: MediaProber + 'static,
    T: Transcoder + 'static,
    S: PackService,
    M: StatusMessenger,
    R: MediaRetrieval,
    St: PackStorage,
{
    let (message, cancel) = ctx
        .tracker
        .send_message(
            request.chat,
            request.reply_to,
            request.initiator,
            "Generating emoji pack…",
        )
        .await?;

    let result = drive(ctx, job, request, message, &cancel).await;

    // Cleanup-phase errors are best-effort and only logged
    if let Err(e) = ctx.tracker.delete_message(request.chat, message).await {
        warn!(chat = request.chat, message, error = %e, "failed to remove progress message");
    }

    result
}

/// The tiling + upload loop with adaptive quality retry.
///
/// On an oversized-asset rejection the quality value is bumped and both
/// stages re-run from scratch; no partial state is reused across
/// attempts. Raw assets uploaded by the failed attempt are left for the
/// platform to garbage-collect.
async fn drive<P, T, S, M, R, St>(
    ctx: &PipelineContext<P, T, S, M, R, St>,
    job: &mut GenerationJob,
    request: &GenerationRequest,
    message: MessageId,
    cancel: &CancellationToken,
) -> Result<UploadOutcome, PipelineError>
where
    P: MediaProber + 'static,
    T: Transcoder + 'static,
    S: PackService,
    M: StatusMessenger,
    R: MediaRetrieval,
    St: PackStorage,
{
    loop {
        let tiles = process_video(ctx, job, cancel).await?;

        if let Err(e) = ctx
            .tracker
            .update_message(
                request.chat,
                message,
                &format!("Uploading {} tiles…", tiles.len()),
            )
            .await
        {
            debug!(error = %e, "progress update failed");
        }

        match add_emojis(ctx, job, &tiles, cancel).await {
            Ok(outcome) => {
                info!(
                    pack = %outcome.pack_link,
                    members = outcome.total_members,
                    created = outcome.created_new,
                    "generation complete"
                );
                return Ok(outcome);
            }
            Err(PipelineError::Upload(e))
                if e.is_oversized() && job.quality + QUALITY_STEP <= MAX_QUALITY =>
            {
                info!(
                    quality = job.quality,
                    "asset rejected as oversized, re-encoding with higher compression"
                );
                job.quality += QUALITY_STEP;
                job.quality_retry = true;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::parse_args;
    use crate::config::{RetentionConfig, TilingConfig, UploadConfig};
    use crate::job::workspace::WorkspaceRegistry;
    use crate::media::{Dimensions, MediaError, TranscodeSpec};
    use crate::platform::{
        AssetFormat, NewPackAsset, PackInfo, PlatformError, SentMessage, UploadedAsset,
    };
    use crate::progress::CancelKey;
    use crate::retrieval::LocalFileRetrieval;
    use crate::storage::InMemoryPackStorage;
    use std::path::Path;
    use std::sync::Arc;

    struct NullProber;
    impl MediaProber for NullProber {
        async fn probe(&self, _path: &Path) -> Result<Dimensions, MediaError> {
            Ok(Dimensions {
                width: 800,
                height: 200,
            })
        }
    }

    struct NullTranscoder;
    impl Transcoder for NullTranscoder {
        async fn transcode(
            &self,
            _spec: &TranscodeSpec,
            _cancel: &CancellationToken,
        ) -> Result<(), MediaError> {
            Ok(())
        }
        async fn make_transparent_tile(
            &self,
            _output: &Path,
            _cancel: &CancellationToken,
        ) -> Result<(), MediaError> {
            Ok(())
        }
    }

    struct NullService;
    impl PackService for NullService {
        async fn upload_asset(
            &self,
            _owner: UserId,
            _data: Vec<u8>,
            _file_name: &str,
            _format: AssetFormat,
        ) -> Result<UploadedAsset, PlatformError> {
            Ok(UploadedAsset {
                file_id: "file".to_string(),
            })
        }
        async fn create_pack(
            &self,
            _owner: UserId,
            _link: &str,
            _title: &str,
            _assets: &[NewPackAsset],
        ) -> Result<(), PlatformError> {
            Ok(())
        }
        async fn add_to_pack(
            &self,
            _owner: UserId,
            _link: &str,
            _asset: &NewPackAsset,
        ) -> Result<(), PlatformError> {
            Ok(())
        }
        async fn get_pack(&self, link: &str) -> Result<PackInfo, PlatformError> {
            Ok(PackInfo {
                name: link.to_string(),
                title: "T".to_string(),
                members: Vec::new(),
            })
        }
        async fn delete_pack(&self, _link: &str) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    struct NullMessenger;
    impl StatusMessenger for NullMessenger {
        async fn send_status(
            &self,
            _chat: ChatId,
            _reply_to: Option<MessageId>,
            _text: &str,
            _cancel_key: &CancelKey,
        ) -> Result<SentMessage, PlatformError> {
            Ok(SentMessage { message_id: 1 })
        }
        async fn update_status(
            &self,
            _chat: ChatId,
            _message: MessageId,
            _text: &str,
            _cancel_key: &CancelKey,
        ) -> Result<(), PlatformError> {
            Ok(())
        }
        async fn delete_status(
            &self,
            _chat: ChatId,
            _message: MessageId,
        ) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    fn context(
        root: &Path,
    ) -> PipelineContext<
        NullProber,
        NullTranscoder,
        NullService,
        NullMessenger,
        LocalFileRetrieval,
        InMemoryPackStorage,
    > {
        PipelineContext::new(
            Arc::new(NullProber),
            Arc::new(NullTranscoder),
            Arc::new(NullService),
            NullMessenger,
            LocalFileRetrieval,
            InMemoryPackStorage::new(),
            WorkspaceRegistry::new(root, RetentionConfig::default()).unwrap(),
            TilingConfig::default(),
            UploadConfig::default(),
        )
    }

    fn request(attachment: &Path) -> GenerationRequest {
        GenerationRequest {
            chat: 7,
            reply_to: Some(3),
            initiator: 42,
            attachment: attachment.to_string_lossy().into_owned(),
        }
    }

    #[tokio::test]
    async fn test_setup_fills_request_state() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("clip.mp4");
        std::fs::write(&source, b"mp4").unwrap();
        let ctx = context(tmp.path());

        let job = parse_args("").unwrap();
        let job = setup_job(&ctx, job, &request(&source)).await.unwrap();

        assert_eq!(job.initiator, 42);
        assert_eq!(job.source, source);
        assert!(job.work_dir.is_dir());
        assert!(job.pack_link.starts_with("emoji_42_"));
        assert_eq!(job.set_title, DEFAULT_TITLE);
    }

    #[tokio::test]
    async fn test_setup_keeps_explicit_link_and_title() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("clip.mp4");
        std::fs::write(&source, b"mp4").unwrap();
        let ctx = context(tmp.path());

        let job = parse_args("l=my_pack t=[Custom Title]").unwrap();
        let job = setup_job(&ctx, job, &request(&source)).await.unwrap();

        assert_eq!(job.pack_link, "my_pack");
        assert_eq!(job.set_title, "Custom Title");
        assert!(!job.new_set);
    }

    #[tokio::test]
    async fn test_setup_enforces_create_permission() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("clip.mp4");
        std::fs::write(&source, b"mp4").unwrap();
        let ctx = context(tmp.path());

        let mut job = parse_args("").unwrap();
        job.permissions.can_create = false;

        let err = setup_job(&ctx, job, &request(&source)).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NotPermitted {
                user: 42,
                action: "create"
            }
        ));
    }

    #[tokio::test]
    async fn test_setup_enforces_extend_permission() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("clip.mp4");
        std::fs::write(&source, b"mp4").unwrap();
        let ctx = context(tmp.path());

        let mut job = parse_args("l=someones_pack").unwrap();
        job.permissions.can_extend = false;

        let err = setup_job(&ctx, job, &request(&source)).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NotPermitted { action: "extend", .. }
        ));
    }

    #[tokio::test]
    async fn test_setup_rejects_unsupported_mime_before_processing() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("doc.pdf");
        std::fs::write(&source, b"%PDF").unwrap();
        let ctx = context(tmp.path());

        let job = parse_args("").unwrap();
        let err = setup_job(&ctx, job, &request(&source)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Retrieval(_)));
    }
}

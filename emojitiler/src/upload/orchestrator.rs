//! Pack creation and extension against the remote platform.

use super::grid::{layout_grid, GridSlot};
use super::{AssetMeta, UploadError};
use crate::command::GenerationJob;
use crate::config::UploadConfig;
use crate::platform::{AssetFormat, NewPackAsset, PackInfo, PackService, UploadedAsset};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// File name the shared transparent filler is uploaded under.
const FILLER_NAME: &str = "filler.webm";

/// Result of a successful pack mutation.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Canonical link of the mutated pack.
    pub pack_link: String,
    /// True when this job created the pack.
    pub created_new: bool,
    /// Authoritative member count after the mutation.
    pub total_members: usize,
    /// Row-major asset grid with back-filled document ids.
    pub assets: Vec<AssetMeta>,
}

impl UploadOutcome {
    /// Rows of the rendered grid, for composing the delivery message.
    ///
    /// `row_len` is the padded row length the grid was laid out at (the
    /// platform row width for narrow grids, the job width otherwise).
    pub fn rows(&self, row_len: usize) -> impl Iterator<Item = &[AssetMeta]> {
        self.assets.chunks(row_len.max(1))
    }
}

/// Drives tile uploads and pack mutation for one job at a time.
#[derive(Debug)]
pub struct UploadOrchestrator<S: PackService> {
    service: Arc<S>,
    config: UploadConfig,
}

impl<S: PackService> UploadOrchestrator<S> {
    /// Creates an orchestrator over the given pack service.
    pub fn new(service: Arc<S>, config: UploadConfig) -> Self {
        Self { service, config }
    }

    /// Uploads the job's tiles and creates or extends the target pack.
    ///
    /// Validates the platform's total cap before any remote mutation.
    /// On cancellation a newly created (not yet finalized) pack is
    /// deleted as compensation before [`UploadError::Canceled`] is
    /// returned.
    #[instrument(skip(self, job, tiles, filler, cancel), fields(job_id = %job.id, pack = %job.pack_link))]
    pub async fn add_emojis(
        &self,
        job: &mut GenerationJob,
        tiles: &[PathBuf],
        filler: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError> {
        if tiles.is_empty() {
            return Err(UploadError::NoFiles);
        }
        if tiles.len() > self.config.total_cap {
            return Err(UploadError::ExceedsLimit {
                pack: job.pack_link.clone(),
                prospective: tiles.len(),
                cap: self.config.total_cap,
            });
        }

        let layout = layout_grid(tiles.len(), job.width, self.config.row_width);
        if layout.iter().any(GridSlot::is_filler) && filler.is_none() {
            return Err(UploadError::MissingFiller);
        }

        // Capacity check against the authoritative state, before any
        // upload or mutation.
        let existing = if job.new_set {
            0
        } else {
            self.fetch(&job.pack_link).await?.members.len()
        };
        let prospective = existing + layout.len();
        if prospective > self.config.total_cap {
            return Err(UploadError::ExceedsLimit {
                pack: job.pack_link.clone(),
                prospective,
                cap: self.config.total_cap,
            });
        }

        let assets = self.upload_grid(job, tiles, filler, &layout, cancel).await?;

        let mut created = false;
        let mutation = if job.new_set {
            self.create(job, &assets, cancel, &mut created).await
        } else {
            self.extend(job, &assets, cancel).await
        };
        if let Err(e) = mutation {
            if matches!(e, UploadError::Canceled) {
                self.compensate(job, created).await;
            }
            return Err(e);
        }

        self.backfill(job, assets).await
    }

    /// Uploads every content tile and each needed filler occurrence,
    /// sequentially. One uploaded filler asset is reused for every
    /// filler slot of the job.
    async fn upload_grid(
        &self,
        job: &GenerationJob,
        tiles: &[PathBuf],
        filler: Option<&Path>,
        layout: &[GridSlot],
        cancel: &CancellationToken,
    ) -> Result<Vec<AssetMeta>, UploadError> {
        let mut assets = Vec::with_capacity(layout.len());
        let mut filler_asset: Option<UploadedAsset> = None;

        for slot in layout {
            if cancel.is_cancelled() {
                return Err(UploadError::Canceled);
            }
            match slot {
                GridSlot::Content(i) => {
                    let path = &tiles[*i];
                    let file_name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| format!("tile_{i}.webm"));
                    let data = tokio::fs::read(path).await.map_err(|source| {
                        UploadError::OpenFileFailed {
                            path: path.clone(),
                            source,
                        }
                    })?;
                    let uploaded = self
                        .service
                        .upload_asset(job.initiator, data, &file_name, AssetFormat::Video)
                        .await
                        .map_err(|source| UploadError::UploadFailed {
                            file_name: file_name.clone(),
                            source,
                        })?;
                    assets.push(AssetMeta {
                        file_id: uploaded.file_id,
                        document_id: None,
                        file_name,
                        transparent: false,
                    });
                }
                GridSlot::Filler => {
                    let uploaded = match &filler_asset {
                        Some(asset) => asset.clone(),
                        None => {
                            let path = filler.ok_or(UploadError::MissingFiller)?;
                            let data = tokio::fs::read(path).await.map_err(|source| {
                                UploadError::OpenFileFailed {
                                    path: path.to_path_buf(),
                                    source,
                                }
                            })?;
                            let asset = self
                                .service
                                .upload_asset(job.initiator, data, FILLER_NAME, AssetFormat::Video)
                                .await
                                .map_err(|source| UploadError::FillerUploadFailed { source })?;
                            filler_asset = Some(asset.clone());
                            asset
                        }
                    };
                    assets.push(AssetMeta {
                        file_id: uploaded.file_id,
                        document_id: None,
                        file_name: FILLER_NAME.to_string(),
                        transparent: true,
                    });
                }
            }
        }
        Ok(assets)
    }

    /// Creates the pack: first batch up to the batch cap, single-asset
    /// fallback on a container-format rejection, remaining assets one at
    /// a time.
    async fn create(
        &self,
        job: &GenerationJob,
        assets: &[AssetMeta],
        cancel: &CancellationToken,
        created: &mut bool,
    ) -> Result<(), UploadError> {
        if cancel.is_cancelled() {
            return Err(UploadError::Canceled);
        }

        let first_batch = assets.len().min(self.config.batch_cap);
        let batch = to_new_assets(&assets[..first_batch]);

        let mut inserted = first_batch;
        match self
            .service
            .create_pack(job.initiator, &job.pack_link, &job.set_title, &batch)
            .await
        {
            Ok(()) => *created = true,
            Err(e) if e.is_invalid_container() && first_batch > 1 => {
                warn!(pack = %job.pack_link, "container format rejected, retrying with single-asset batch");
                self.service
                    .create_pack(job.initiator, &job.pack_link, &job.set_title, &batch[..1])
                    .await
                    .map_err(|source| UploadError::CreateFailed {
                        pack: job.pack_link.clone(),
                        source,
                    })?;
                *created = true;
                inserted = 1;
            }
            Err(source) => {
                return Err(UploadError::CreateFailed {
                    pack: job.pack_link.clone(),
                    source,
                })
            }
        }

        info!(pack = %job.pack_link, batch = inserted, "pack created");
        self.insert_one_by_one(job, &assets[inserted..], cancel).await
    }

    /// Extends an existing pack after re-checking its capacity.
    async fn extend(
        &self,
        job: &GenerationJob,
        assets: &[AssetMeta],
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let pack = self.fetch(&job.pack_link).await?;
        let prospective = pack.members.len() + assets.len();
        if prospective > self.config.total_cap {
            return Err(UploadError::ExceedsLimit {
                pack: job.pack_link.clone(),
                prospective,
                cap: self.config.total_cap,
            });
        }
        self.insert_one_by_one(job, assets, cancel).await
    }

    /// Inserts assets one at a time with bounded attempts and a fixed
    /// backoff, aborting immediately on cancellation.
    async fn insert_one_by_one(
        &self,
        job: &GenerationJob,
        assets: &[AssetMeta],
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        for asset in assets {
            let new_asset = to_new_asset(asset);
            let mut attempt = 0;
            loop {
                if cancel.is_cancelled() {
                    return Err(UploadError::Canceled);
                }
                attempt += 1;
                match self
                    .service
                    .add_to_pack(job.initiator, &job.pack_link, &new_asset)
                    .await
                {
                    Ok(()) => break,
                    Err(source) if attempt >= self.config.insert_attempts => {
                        return Err(UploadError::AddFailed {
                            pack: job.pack_link.clone(),
                            file_name: asset.file_name.clone(),
                            source,
                        });
                    }
                    Err(e) => {
                        debug!(
                            pack = %job.pack_link,
                            file_name = %asset.file_name,
                            attempt,
                            error = %e,
                            "insert attempt failed, backing off"
                        );
                        tokio::time::sleep(self.config.insert_backoff).await;
                    }
                }
            }
        }
        Ok(())
    }

    /// Re-fetches the authoritative pack state and back-fills each
    /// asset's document id from the tail of the member list.
    async fn backfill(
        &self,
        job: &mut GenerationJob,
        mut assets: Vec<AssetMeta>,
    ) -> Result<UploadOutcome, UploadError> {
        let pack = self.fetch(&job.pack_link).await?;
        job.pack_link = pack.name.clone();

        let start = if job.new_set {
            0
        } else {
            pack.members.len().saturating_sub(assets.len())
        };
        for (i, asset) in assets.iter_mut().enumerate() {
            asset.document_id = pack.members.get(start + i).map(|m| m.document_id.clone());
        }

        Ok(UploadOutcome {
            pack_link: job.pack_link.clone(),
            created_new: job.new_set,
            total_members: pack.members.len(),
            assets,
        })
    }

    async fn fetch(&self, link: &str) -> Result<PackInfo, UploadError> {
        self.service
            .get_pack(link)
            .await
            .map_err(|source| UploadError::FetchFailed {
                pack: link.to_string(),
                source,
            })
    }

    /// Deletes a newly created, not-yet-finalized pack after a
    /// cancellation. Best-effort: failures are logged, never raised.
    async fn compensate(&self, job: &GenerationJob, created: bool) {
        if !created {
            return;
        }
        info!(pack = %job.pack_link, "deleting partially-created pack after cancellation");
        if let Err(e) = self.service.delete_pack(&job.pack_link).await {
            warn!(pack = %job.pack_link, error = %e, "compensating pack deletion failed");
        }
    }
}

fn to_new_asset(asset: &AssetMeta) -> NewPackAsset {
    NewPackAsset {
        file_id: asset.file_id.clone(),
        file_name: asset.file_name.clone(),
        format: AssetFormat::Video,
    }
}

fn to_new_assets(assets: &[AssetMeta]) -> Vec<NewPackAsset> {
    assets.iter().map(to_new_asset).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{PackMember, PlatformError};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scriptable pack service recording every call.
    #[derive(Default)]
    struct MockService {
        initial_members: usize,
        attached: AtomicUsize,
        uploads: Mutex<Vec<String>>,
        create_batches: Mutex<Vec<usize>>,
        adds: AtomicUsize,
        deleted: Mutex<Vec<String>>,
        reject_first_create: AtomicBool,
        fail_adds: AtomicUsize,
        cancel_during_add: Mutex<Option<CancellationToken>>,
        upload_counter: AtomicUsize,
    }

    impl MockService {
        fn with_members(members: usize) -> Self {
            Self {
                initial_members: members,
                ..Default::default()
            }
        }
    }

    impl PackService for MockService {
        async fn upload_asset(
            &self,
            _owner: i64,
            _data: Vec<u8>,
            file_name: &str,
            _format: AssetFormat,
        ) -> Result<UploadedAsset, PlatformError> {
            self.uploads.lock().unwrap().push(file_name.to_string());
            let n = self.upload_counter.fetch_add(1, Ordering::SeqCst);
            Ok(UploadedAsset {
                file_id: format!("file-{n}"),
            })
        }

        async fn create_pack(
            &self,
            _owner: i64,
            _link: &str,
            _title: &str,
            assets: &[NewPackAsset],
        ) -> Result<(), PlatformError> {
            self.create_batches.lock().unwrap().push(assets.len());
            if self.reject_first_create.swap(false, Ordering::SeqCst) {
                return Err(PlatformError::Api {
                    method: "createPack",
                    code: Some(400),
                    description: "INVALID_CONTAINER".to_string(),
                });
            }
            self.attached.fetch_add(assets.len(), Ordering::SeqCst);
            Ok(())
        }

        async fn add_to_pack(
            &self,
            _owner: i64,
            _link: &str,
            _asset: &NewPackAsset,
        ) -> Result<(), PlatformError> {
            if let Some(token) = self.cancel_during_add.lock().unwrap().take() {
                token.cancel();
            }
            if self
                .fail_adds
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(PlatformError::Api {
                    method: "addToPack",
                    code: Some(500),
                    description: "transient".to_string(),
                });
            }
            self.adds.fetch_add(1, Ordering::SeqCst);
            self.attached.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn get_pack(&self, link: &str) -> Result<PackInfo, PlatformError> {
            let members = self.initial_members + self.attached.load(Ordering::SeqCst);
            Ok(PackInfo {
                name: link.to_string(),
                title: "Test Pack".to_string(),
                members: (0..members)
                    .map(|i| PackMember {
                        document_id: format!("doc-{i}"),
                    })
                    .collect(),
            })
        }

        async fn delete_pack(&self, link: &str) -> Result<(), PlatformError> {
            self.deleted.lock().unwrap().push(link.to_string());
            Ok(())
        }
    }

    fn write_tiles(dir: &Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("tile_{i}.webm"));
                std::fs::write(&path, b"tile-bytes").unwrap();
                path
            })
            .collect()
    }

    fn write_filler(dir: &Path) -> PathBuf {
        let path = dir.join("filler.webm");
        std::fs::write(&path, b"filler-bytes").unwrap();
        path
    }

    fn job(width: u32, new_set: bool) -> GenerationJob {
        let mut job = GenerationJob::with_defaults();
        job.width = width;
        job.new_set = new_set;
        job.pack_link = "test_pack".to_string();
        job.set_title = "Test Pack".to_string();
        job.initiator = 42;
        job
    }

    fn orchestrator(service: MockService) -> UploadOrchestrator<MockService> {
        UploadOrchestrator::new(Arc::new(service), UploadConfig::default())
    }

    #[tokio::test]
    async fn test_new_pack_full_width_single_batch() {
        // Scenario: width 8, 16 tiles, new set → one create call with 16
        // assets, 2 rows x 8 cols, zero transparent entries
        let tmp = tempfile::tempdir().unwrap();
        let tiles = write_tiles(tmp.path(), 16);
        let orch = orchestrator(MockService::default());
        let mut job = job(8, true);

        let outcome = orch
            .add_emojis(&mut job, &tiles, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*orch.service.create_batches.lock().unwrap(), vec![16]);
        assert_eq!(orch.service.adds.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.assets.len(), 16);
        assert!(outcome.assets.iter().all(|a| !a.transparent));
        assert!(outcome.created_new);
        // Document ids back-filled from index 0
        assert_eq!(outcome.assets[0].document_id.as_deref(), Some("doc-0"));
        assert_eq!(outcome.assets[15].document_id.as_deref(), Some("doc-15"));
    }

    #[tokio::test]
    async fn test_narrow_grid_uploads_filler_once_and_reuses_it() {
        // Width 3, 5 tiles → 16 grid slots, 11 filler occurrences
        let tmp = tempfile::tempdir().unwrap();
        let tiles = write_tiles(tmp.path(), 5);
        let filler = write_filler(tmp.path());
        let orch = orchestrator(MockService::default());
        let mut job = job(3, true);

        let outcome = orch
            .add_emojis(&mut job, &tiles, Some(&filler), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.assets.len(), 16);
        assert_eq!(outcome.assets.iter().filter(|a| a.transparent).count(), 11);

        // The filler source was uploaded exactly once; every filler slot
        // shares that one asset
        let uploads = orch.service.uploads.lock().unwrap();
        assert_eq!(
            uploads.iter().filter(|n| n.as_str() == "filler.webm").count(),
            1
        );
        let filler_ids: Vec<_> = outcome
            .assets
            .iter()
            .filter(|a| a.transparent)
            .map(|a| a.file_id.as_str())
            .collect();
        assert!(filler_ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_exceeds_limit_before_any_upload() {
        // Scenario: existing pack at 190 members, 15 proposed → over the
        // 200 cap, rejected before any remote mutation
        let tmp = tempfile::tempdir().unwrap();
        let tiles = write_tiles(tmp.path(), 15);
        let filler = write_filler(tmp.path());
        let orch = orchestrator(MockService::with_members(190));
        let mut job = job(8, false);

        let err = orch
            .add_emojis(&mut job, &tiles, Some(&filler), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::ExceedsLimit { cap: 200, .. }));
        assert!(orch.service.uploads.lock().unwrap().is_empty());
        assert!(orch.service.create_batches.lock().unwrap().is_empty());
        assert_eq!(orch.service.adds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_tiles_rejected() {
        let orch = orchestrator(MockService::default());
        let mut job = job(8, true);
        let err = orch
            .add_emojis(&mut job, &[], None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NoFiles));
    }

    #[tokio::test]
    async fn test_container_rejection_falls_back_to_single_asset_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let tiles = write_tiles(tmp.path(), 5);
        let service = MockService::default();
        service.reject_first_create.store(true, Ordering::SeqCst);
        let orch = orchestrator(service);
        let mut job = job(8, true);
        let filler = write_filler(tmp.path());

        let outcome = orch
            .add_emojis(&mut job, &tiles, Some(&filler), &CancellationToken::new())
            .await
            .unwrap();

        // First create attempt with the full batch, fallback with one
        assert_eq!(*orch.service.create_batches.lock().unwrap(), vec![8, 1]);
        // Remaining 7 grid slots inserted one at a time
        assert_eq!(orch.service.adds.load(Ordering::SeqCst), 7);
        assert_eq!(outcome.assets.len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_retries_with_backoff_then_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let tiles = write_tiles(tmp.path(), 8);
        let service = MockService::default();
        service.fail_adds.store(2, Ordering::SeqCst);
        let orch = UploadOrchestrator::new(
            Arc::new(service),
            UploadConfig::default().with_batch_cap(4),
        );
        let mut job = job(8, true);

        orch.add_emojis(&mut job, &tiles, None, &CancellationToken::new())
            .await
            .unwrap();

        // 4 in the create batch, 4 inserted; the first insert needed two
        // retries
        assert_eq!(orch.service.adds.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_gives_up_after_attempts() {
        let tmp = tempfile::tempdir().unwrap();
        let tiles = write_tiles(tmp.path(), 8);
        let service = MockService::default();
        service.fail_adds.store(100, Ordering::SeqCst);
        let orch = UploadOrchestrator::new(
            Arc::new(service),
            UploadConfig::default().with_batch_cap(4),
        );
        let mut job = job(8, true);

        let err = orch
            .add_emojis(&mut job, &tiles, None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::AddFailed { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_mid_insert_deletes_new_pack() {
        // Scenario: cancellation fires mid-insert → prompt return, no
        // further mutations, and the new pack is deleted as compensation
        let tmp = tempfile::tempdir().unwrap();
        let tiles = write_tiles(tmp.path(), 8);
        let cancel = CancellationToken::new();
        let service = MockService::default();
        *service.cancel_during_add.lock().unwrap() = Some(cancel.clone());
        let orch = UploadOrchestrator::new(
            Arc::new(service),
            UploadConfig::default().with_batch_cap(4),
        );
        let mut job = job(8, true);

        let err = orch
            .add_emojis(&mut job, &tiles, None, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Canceled));
        // Only the add that observed the cancellation ran
        assert_eq!(orch.service.adds.load(Ordering::SeqCst), 1);
        assert_eq!(*orch.service.deleted.lock().unwrap(), vec!["test_pack"]);
    }

    #[tokio::test]
    async fn test_cancellation_before_create_deletes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let tiles = write_tiles(tmp.path(), 4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let orch = orchestrator(MockService::default());
        let mut job = job(8, true);

        let err = orch
            .add_emojis(&mut job, &tiles, None, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Canceled));
        assert!(orch.service.uploads.lock().unwrap().is_empty());
        assert!(orch.service.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extend_backfills_from_tail() {
        let tmp = tempfile::tempdir().unwrap();
        let tiles = write_tiles(tmp.path(), 8);
        let orch = orchestrator(MockService::with_members(3));
        let mut job = job(8, false);

        let outcome = orch
            .add_emojis(&mut job, &tiles, None, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!outcome.created_new);
        // Existing 3 members, 8 new → new members start at index 3
        assert_eq!(outcome.assets[0].document_id.as_deref(), Some("doc-3"));
        assert_eq!(outcome.assets[7].document_id.as_deref(), Some("doc-10"));
    }

    #[tokio::test]
    async fn test_outcome_rows_chunk_the_grid() {
        let tmp = tempfile::tempdir().unwrap();
        let tiles = write_tiles(tmp.path(), 5);
        let filler = write_filler(tmp.path());
        let orch = orchestrator(MockService::default());
        let mut job = job(3, true);

        let outcome = orch
            .add_emojis(&mut job, &tiles, Some(&filler), &CancellationToken::new())
            .await
            .unwrap();

        let rows: Vec<_> = outcome.rows(8).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == 8));
        // Content of the first row sits between the pads
        assert!(rows[0][0].transparent && rows[0][1].transparent);
        assert!(!rows[0][2].transparent);
    }

    #[tokio::test]
    async fn test_missing_filler_is_structural_error() {
        let tmp = tempfile::tempdir().unwrap();
        let tiles = write_tiles(tmp.path(), 5);
        let orch = orchestrator(MockService::default());
        let mut job = job(3, true);

        let err = orch
            .add_emojis(&mut job, &tiles, None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::MissingFiller));
    }
}

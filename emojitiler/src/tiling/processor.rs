//! Tiling worker pool and stage orchestration.

use super::plan::{crop_degenerate_row, plan_grid, plan_resize};
use super::TilingError;
use crate::command::GenerationJob;
use crate::config::tiling::TILE_SIZE;
use crate::config::TilingConfig;
use crate::media::{resize_filter, tile_filter, MediaProber, Transcoder, TranscodeSpec};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Splits a source into 100×100 tiles through a fixed-size worker pool.
///
/// One processor is shared by all jobs; per-job state lives in the
/// [`GenerationJob`] and on disk in its working directory.
#[derive(Debug)]
pub struct TilingProcessor<P: MediaProber, T: Transcoder> {
    prober: Arc<P>,
    transcoder: Arc<T>,
    config: TilingConfig,
}

impl<P, T> TilingProcessor<P, T>
where
    P: MediaProber + 'static,
    T: Transcoder + 'static,
{
    /// Creates a processor with the given tool implementations.
    pub fn new(prober: Arc<P>, transcoder: Arc<T>, config: TilingConfig) -> Self {
        Self {
            prober,
            transcoder,
            config,
        }
    }

    /// Runs the full tiling stage for a job.
    ///
    /// Returns tile output paths in row-major order. Mutates the job:
    /// `source` is replaced by the normalized copy. On cancellation every
    /// in-flight transcode is terminated and [`TilingError::Canceled`] is
    /// returned.
    #[instrument(skip(self, job, cancel), fields(job_id = %job.id))]
    pub async fn process(
        &self,
        job: &mut GenerationJob,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, TilingError> {
        if cancel.is_cancelled() {
            return Err(TilingError::Canceled);
        }

        let mut dims = self
            .prober
            .probe(&job.source)
            .await
            .map_err(|e| TilingError::from_media(e, TilingError::Probe))?;

        // Quality retries re-enter with an already-normalized source;
        // only the encoder quality changes between attempts.
        if !job.quality_retry {
            let target = plan_resize(dims, job.width);
            if target != dims {
                let normalized = job.work_dir.join("normalized.webm");
                self.transcoder
                    .transcode(
                        &self.spec(job, &normalized, resize_filter(target.width, target.height)),
                        cancel,
                    )
                    .await
                    .map_err(|e| TilingError::from_media(e, TilingError::Normalize))?;
                job.source = normalized;
                dims = target;
            }

            if let Some(cropped_height) = crop_degenerate_row(dims, self.config.min_last_row_height)
            {
                debug!(
                    leftover = dims.height % TILE_SIZE,
                    cropped_height, "cropping degenerate final row"
                );
                let cropped = job.work_dir.join("cropped.webm");
                self.transcoder
                    .transcode(
                        &self.spec(
                            job,
                            &cropped,
                            format!("crop={}:{cropped_height}:0:0", dims.width),
                        ),
                        cancel,
                    )
                    .await
                    .map_err(|e| TilingError::from_media(e, TilingError::Normalize))?;
                job.source = cropped;
                dims = self
                    .prober
                    .probe(&job.source)
                    .await
                    .map_err(|e| TilingError::from_media(e, TilingError::Probe))?;
            }
        }

        if cancel.is_cancelled() {
            return Err(TilingError::Canceled);
        }

        let plan = plan_grid(dims);
        info!(
            tiles_x = plan.tiles_x,
            tiles_y = plan.tiles_y,
            quality = job.quality,
            "tiling source"
        );

        let tiles = self.tile_specs(job, plan.tiles_x, plan.tiles_y, plan.last_row_height);
        self.run_pool(tiles, cancel).await
    }

    /// Synthesizes the job's shared transparent filler tile.
    pub async fn make_filler(
        &self,
        job: &GenerationJob,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, TilingError> {
        let output = job.work_dir.join("filler.webm");
        self.transcoder
            .make_transparent_tile(&output, cancel)
            .await
            .map_err(|e| TilingError::from_media(e, TilingError::Normalize))?;
        Ok(output)
    }

    fn spec(&self, job: &GenerationJob, output: &std::path::Path, filter: String) -> TranscodeSpec {
        TranscodeSpec {
            input: job.source.clone(),
            output: output.to_path_buf(),
            filter,
            quality: job.quality,
            duration_cap: self.config.duration_cap,
            frame_rate: self.config.frame_rate,
        }
    }

    /// Builds one transcode spec per tile, row-major.
    fn tile_specs(
        &self,
        job: &GenerationJob,
        tiles_x: u32,
        tiles_y: u32,
        last_row_height: u32,
    ) -> Vec<TranscodeSpec> {
        let mut specs = Vec::with_capacity((tiles_x * tiles_y) as usize);
        for row in 0..tiles_y {
            let crop_h = if row == tiles_y - 1 {
                last_row_height
            } else {
                TILE_SIZE
            };
            for col in 0..tiles_x {
                let index = (row * tiles_x + col) as usize;
                specs.push(self.spec(
                    job,
                    &job.work_dir.join(format!("tile_{index}.webm")),
                    tile_filter(
                        col * TILE_SIZE,
                        row * TILE_SIZE,
                        crop_h,
                        job.background.as_ref(),
                    ),
                ));
            }
        }
        specs
    }

    /// Runs tile specs through the worker pool, reassembling outputs by
    /// position index.
    async fn run_pool(
        &self,
        tiles: Vec<TranscodeSpec>,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, TilingError> {
        let total = tiles.len();
        let mut slots: Vec<Option<PathBuf>> = vec![None; total];

        // Buffered to the full tile count so dispatch never blocks on
        // worker progress.
        let (tile_tx, tile_rx) = mpsc::channel::<(usize, TranscodeSpec)>(total.max(1));
        let tile_rx = Arc::new(tokio::sync::Mutex::new(tile_rx));
        let (result_tx, mut result_rx) =
            mpsc::channel::<(usize, Result<PathBuf, crate::media::MediaError>)>(total.max(1));

        // Scoped to this pool run: cancelling it stops workers without
        // touching the job-wide token.
        let pool_cancel = cancel.child_token();

        let mut workers = JoinSet::new();
        for _ in 0..self.config.workers.max(1) {
            let tile_rx = Arc::clone(&tile_rx);
            let result_tx = result_tx.clone();
            let transcoder = Arc::clone(&self.transcoder);
            let token = pool_cancel.clone();
            workers.spawn(async move {
                loop {
                    let next = {
                        let mut rx = tile_rx.lock().await;
                        rx.recv().await
                    };
                    let Some((index, spec)) = next else { break };
                    let result = transcoder
                        .transcode(&spec, &token)
                        .await
                        .map(|()| spec.output.clone());
                    if result_tx.send((index, result)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        for (index, spec) in tiles.into_iter().enumerate() {
            if cancel.is_cancelled() {
                pool_cancel.cancel();
                return Err(TilingError::Canceled);
            }
            if tile_tx.send((index, spec)).await.is_err() {
                break;
            }
        }
        drop(tile_tx);

        let mut received = 0;
        while received < total {
            if cancel.is_cancelled() {
                pool_cancel.cancel();
                return Err(TilingError::Canceled);
            }
            let Some((index, result)) = result_rx.recv().await else {
                break;
            };
            received += 1;
            match result {
                Ok(path) => slots[index] = Some(path),
                Err(e) => {
                    pool_cancel.cancel();
                    return Err(TilingError::from_media(e, |source| TilingError::Tile {
                        index,
                        source,
                    }));
                }
            }
        }

        while workers.join_next().await.is_some() {}

        let mut files = Vec::with_capacity(total);
        for (index, slot) in slots.into_iter().enumerate() {
            files.push(slot.ok_or(TilingError::MissingTile { index })?);
        }
        Ok(files)
    }
}

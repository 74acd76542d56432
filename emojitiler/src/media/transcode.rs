//! Tile transcoding through the external transcoder.

use super::MediaError;
use crate::config::tiling::TILE_SIZE;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// One transcode invocation: source → filtered output.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeSpec {
    /// Source media path.
    pub input: PathBuf,
    /// Output path (container inferred from the extension).
    pub output: PathBuf,
    /// Filter chain in `-vf` syntax.
    pub filter: String,
    /// Encoder quality value (CRF; higher means smaller output).
    pub quality: u32,
    /// Clip duration cap.
    pub duration_cap: Duration,
    /// Output frame rate.
    pub frame_rate: u32,
}

/// Trait for invoking the external transcoder.
///
/// Implementations must terminate the underlying process when `cancel`
/// fires and return [`MediaError::Canceled`].
pub trait Transcoder: Send + Sync {
    /// Runs one transcode to completion.
    fn transcode(
        &self,
        spec: &TranscodeSpec,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), MediaError>> + Send;

    /// Synthesizes the shared transparent filler tile used for grid
    /// padding.
    fn make_transparent_tile(
        &self,
        output: &Path,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), MediaError>> + Send;
}

/// Real transcoder shelling out to ffmpeg.
///
/// Output is VP9 with an alpha channel, the only encode the platform
/// accepts for animated emoji.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: String,
}

impl FfmpegTranscoder {
    /// Creates a transcoder using `ffmpeg` from PATH.
    pub fn new() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
        }
    }

    /// Creates a transcoder with an explicit binary path.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Builds the argument list for a spec. Split out for testability.
    fn build_args(spec: &TranscodeSpec) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            spec.input.display().to_string(),
            "-t".to_string(),
            format!("{}", spec.duration_cap.as_secs()),
            "-r".to_string(),
            spec.frame_rate.to_string(),
            "-vf".to_string(),
            spec.filter.clone(),
            "-c:v".to_string(),
            "libvpx-vp9".to_string(),
            "-pix_fmt".to_string(),
            "yuva420p".to_string(),
            "-crf".to_string(),
            spec.quality.to_string(),
            "-b:v".to_string(),
            "0".to_string(),
            "-an".to_string(),
            spec.output.display().to_string(),
        ]
    }

    async fn run(
        &self,
        args: Vec<String>,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), MediaError> {
        trace!(?args, "launching transcoder");
        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::Launch {
                tool: "ffmpeg",
                message: e.to_string(),
            })?;

        // Dropping the wait future on cancellation kills the child via
        // kill_on_drop.
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(output = %output.display(), "transcode canceled, terminating child");
                Err(MediaError::Canceled)
            }
            result = child.wait_with_output() => {
                let out = result.map_err(|e| MediaError::Transcode {
                    output: PathBuf::from(output),
                    message: e.to_string(),
                })?;
                if out.status.success() {
                    Ok(())
                } else {
                    Err(MediaError::Transcode {
                        output: PathBuf::from(output),
                        message: String::from_utf8_lossy(&out.stderr).trim().to_string(),
                    })
                }
            }
        }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        spec: &TranscodeSpec,
        cancel: &CancellationToken,
    ) -> Result<(), MediaError> {
        self.run(Self::build_args(spec), &spec.output, cancel).await
    }

    async fn make_transparent_tile(
        &self,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), MediaError> {
        let args = vec![
            "-y".to_string(),
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            format!("color=c=0x000000@0.0:s={TILE_SIZE}x{TILE_SIZE}:d=1,format=yuva420p"),
            "-c:v".to_string(),
            "libvpx-vp9".to_string(),
            "-pix_fmt".to_string(),
            "yuva420p".to_string(),
            "-an".to_string(),
            output.display().to_string(),
        ];
        self.run(args, output, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TranscodeSpec {
        TranscodeSpec {
            input: PathBuf::from("/work/source.mp4"),
            output: PathBuf::from("/work/tile_3.webm"),
            filter: "crop=100:100:300:0".to_string(),
            quality: 32,
            duration_cap: Duration::from_secs(3),
            frame_rate: 30,
        }
    }

    #[test]
    fn test_build_args_shape() {
        let args = FfmpegTranscoder::build_args(&spec());
        assert_eq!(args[0], "-y");
        assert!(args.contains(&"libvpx-vp9".to_string()));
        assert!(args.contains(&"yuva420p".to_string()));
        assert_eq!(args.last().unwrap(), "/work/tile_3.webm");
    }

    #[test]
    fn test_build_args_carries_quality_and_caps() {
        let mut spec = spec();
        spec.quality = 47;
        let args = FfmpegTranscoder::build_args(&spec);

        let crf_at = args.iter().position(|a| a == "-crf").unwrap();
        assert_eq!(args[crf_at + 1], "47");

        let t_at = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t_at + 1], "3");

        let r_at = args.iter().position(|a| a == "-r").unwrap();
        assert_eq!(args[r_at + 1], "30");
    }

    #[tokio::test]
    async fn test_canceled_before_launch_still_reports_canceled() {
        let transcoder = FfmpegTranscoder::with_binary("/nonexistent/ffmpeg");
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Launch fails first; either error is acceptable here, but a
        // pre-fired token must never yield Ok.
        let result = transcoder.transcode(&spec(), &cancel).await;
        assert!(result.is_err());
    }
}

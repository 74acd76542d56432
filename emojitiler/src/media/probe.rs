//! Source dimension probing.

use super::{Dimensions, MediaError};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Trait for probing source media dimensions.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock probers in tests.
pub trait MediaProber: Send + Sync {
    /// Returns the width/height of the first video stream of `path`.
    fn probe(&self, path: &Path) -> impl Future<Output = Result<Dimensions, MediaError>> + Send;
}

/// Real prober shelling out to ffprobe.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: String,
}

impl FfprobeProber {
    /// Creates a prober using `ffprobe` from PATH.
    pub fn new() -> Self {
        Self {
            binary: "ffprobe".to_string(),
        }
    }

    /// Creates a prober with an explicit binary path.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses ffprobe's `WIDTHxHEIGHT` output line.
fn parse_dimensions(stdout: &str) -> Option<Dimensions> {
    let line = stdout.lines().next()?.trim();
    let (w, h) = line.split_once('x')?;
    Some(Dimensions {
        width: w.trim().parse().ok()?,
        height: h.trim().parse().ok()?,
    })
}

impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<Dimensions, MediaError> {
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height",
                "-of",
                "csv=s=x:p=0",
            ])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| MediaError::Launch {
                tool: "ffprobe",
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(MediaError::Probe {
                path: PathBuf::from(path),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let dims = parse_dimensions(&stdout).ok_or_else(|| MediaError::Probe {
            path: PathBuf::from(path),
            message: format!("unparseable probe output: {stdout:?}"),
        })?;

        debug!(path = %path.display(), width = dims.width, height = dims.height, "source probed");
        Ok(dims)
    }
}

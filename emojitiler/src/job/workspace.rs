//! Working-directory registration and retention sweep.
//!
//! Each generation job gets a private working directory for resized
//! sources and tile outputs. Directories are not removed at job end;
//! a periodic retention sweep purges everything older than the configured
//! window, so failed or cancelled jobs leave debuggable artifacts behind
//! for a few days.

use crate::config::RetentionConfig;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Registry of job working directories subject to the retention sweep.
#[derive(Debug)]
pub struct WorkspaceRegistry {
    root: PathBuf,
    config: RetentionConfig,
    registered: Mutex<Vec<PathBuf>>,
}

impl WorkspaceRegistry {
    /// Creates a registry rooted at `root`.
    ///
    /// The root directory is created if it does not exist.
    pub fn new(root: impl Into<PathBuf>, config: RetentionConfig) -> Result<Self, io::Error> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            config,
            registered: Mutex::new(Vec::new()),
        })
    }

    /// Returns the workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates and registers a working directory for a job.
    pub fn register_directory(&self, name: &str) -> Result<PathBuf, io::Error> {
        let dir = self.root.join(name);
        std::fs::create_dir_all(&dir)?;
        self.registered
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(dir.clone());
        debug!(dir = %dir.display(), "registered job working directory");
        Ok(dir)
    }

    /// Removes every directory under the workspace root whose creation
    /// time is older than the retention window.
    ///
    /// Sweep errors are logged and skipped, never raised; returns the
    /// number of directories removed.
    pub fn purge_expired(&self) -> usize {
        let cutoff = SystemTime::now() - self.config.window;
        debug!(
            cutoff = %chrono::DateTime::<chrono::Local>::from(cutoff).format("%Y-%m-%d %H:%M:%S"),
            "retention sweep starting"
        );
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "retention sweep could not read workspace root");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let created = entry
                .metadata()
                .and_then(|m| m.created().or_else(|_| m.modified()));
            let created = match created {
                Ok(t) => t,
                Err(e) => {
                    warn!(dir = %path.display(), error = %e, "retention sweep could not stat directory");
                    continue;
                }
            };
            if created > cutoff {
                continue;
            }
            match std::fs::remove_dir_all(&path) {
                Ok(()) => {
                    debug!(dir = %path.display(), "retention sweep removed expired directory");
                    removed += 1;
                }
                Err(e) => {
                    warn!(dir = %path.display(), error = %e, "retention sweep failed to remove directory");
                }
            }
        }

        self.registered
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .retain(|dir| dir.exists());

        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_register_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path(), RetentionConfig::default()).unwrap();

        let dir = registry.register_directory("job-1").unwrap();
        assert!(dir.is_dir());
        assert!(dir.starts_with(tmp.path()));
    }

    #[test]
    fn test_purge_respects_window() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = WorkspaceRegistry::new(tmp.path(), RetentionConfig::default()).unwrap();

        registry.register_directory("job-1").unwrap();
        // Fresh directory is inside the 7-day window and must survive
        assert_eq!(registry.purge_expired(), 0);
        assert!(tmp.path().join("job-1").is_dir());
    }

    #[test]
    fn test_purge_removes_expired() {
        let tmp = tempfile::tempdir().unwrap();
        // Zero-length window: everything is expired immediately
        let config = RetentionConfig::default().with_window(Duration::ZERO);
        let registry = WorkspaceRegistry::new(tmp.path(), config).unwrap();

        registry.register_directory("job-1").unwrap();
        registry.register_directory("job-2").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(registry.purge_expired(), 2);
        assert!(!tmp.path().join("job-1").exists());
        assert!(!tmp.path().join("job-2").exists());
    }

    #[test]
    fn test_purge_ignores_files() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RetentionConfig::default().with_window(Duration::ZERO);
        let registry = WorkspaceRegistry::new(tmp.path(), config).unwrap();

        std::fs::write(tmp.path().join("stray.txt"), b"keep me").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        registry.purge_expired();
        assert!(tmp.path().join("stray.txt").exists());
    }
}

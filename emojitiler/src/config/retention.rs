//! Workspace retention configuration.

use std::time::Duration;

/// How long job working directories are kept before the retention sweep
/// removes them.
pub const DEFAULT_RETENTION_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for the working-directory retention sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Directories older than this are removed by [`purge_expired`].
    ///
    /// [`purge_expired`]: crate::job::workspace::WorkspaceRegistry::purge_expired
    pub window: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_RETENTION_WINDOW,
        }
    }
}

impl RetentionConfig {
    /// Set the retention window.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

//! Job identity and workspace lifecycle.
//!
//! A generation job is the unit of work from the chat layer's perspective:
//! one submitted source file turning into one pack mutation. [`JobId`]
//! correlates log lines and telemetry across the pipeline stages;
//! [`workspace`] owns the on-disk working directories and their retention
//! sweep.

pub mod workspace;

use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generating unique job IDs.
static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a generation job.
///
/// Job IDs are monotonically increasing and unique within a process
/// lifetime. They are used for:
/// - Correlating log messages across pipeline stages
/// - Naming per-job working directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

impl JobId {
    /// Creates a new unique job ID.
    pub fn new() -> Self {
        Self(JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value of this job ID.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

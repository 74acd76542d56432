//! Command normalization: free-form argument text → validated generation job.
//!
//! The chat dispatch layer hands us the raw argument string of a pack
//! generation command. This module tokenizes `key=value` pairs (values may
//! carry spaces inside `[...]`), resolves key aliases and color names, and
//! produces a [`GenerationJob`] with validated fields. No arguments at all
//! yields a job with defaults: full-width grid, new pack.

mod colors;
mod parser;

pub use colors::resolve_color;
pub use parser::parse_args;

use crate::config::tiling::DEFAULT_QUALITY;
use crate::job::JobId;
use crate::platform::UserId;
use std::path::PathBuf;
use thiserror::Error;

/// Default tile-grid width (the platform's full row width).
pub const DEFAULT_WIDTH: u32 = 8;

/// Default chroma-key similarity when a background color is given without one.
pub const DEFAULT_SIMILARITY: f32 = 0.1;

/// Default chroma-key blend when a background color is given without one.
pub const DEFAULT_BLEND: f32 = 0.1;

/// Chroma-key parameters for background removal.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromaKey {
    /// Key color as `0xRRGGBB`.
    pub color: String,
    /// Color-distance tolerance, 0.0..=1.0.
    pub similarity: f32,
    /// Edge blending factor, 0.0..=1.0.
    pub blend: f32,
}

impl ChromaKey {
    /// Creates a chroma key with the default similarity and blend.
    pub fn new(color: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            similarity: DEFAULT_SIMILARITY,
            blend: DEFAULT_BLEND,
        }
    }
}

/// Caller permission flags carried on a job.
///
/// Resolved by the dispatch layer before the job is admitted; the pipeline
/// only enforces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    /// May create a new pack.
    pub can_create: bool,
    /// May extend an existing pack.
    pub can_extend: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            can_create: true,
            can_extend: true,
        }
    }
}

/// A validated emoji-pack generation job.
///
/// Created by [`parse_args`], completed by the pipeline's `setup_job`
/// (source path, working directory, initiator), mutated by the tiling
/// processor (quality, source path after resize) and the upload
/// orchestrator (pack link on pack creation).
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationJob {
    /// Unique job id for log correlation and workspace naming.
    pub id: JobId,
    /// Link (short name) of the target pack; empty until the pack exists.
    pub pack_link: String,
    /// Human-readable pack title.
    pub set_title: String,
    /// Tile-grid width, 1..=8.
    pub width: u32,
    /// Background chroma key, if the caller asked for background removal.
    pub background: Option<ChromaKey>,
    /// User who initiated the job.
    pub initiator: UserId,
    /// Source media path (replaced by the resized copy during tiling).
    pub source: PathBuf,
    /// Job working directory.
    pub work_dir: PathBuf,
    /// Whether this job creates a new pack rather than extending one.
    pub new_set: bool,
    /// Adaptive encoder quality; bumped on oversized-asset rejections.
    pub quality: u32,
    /// Set when re-running after a quality bump; skips re-normalization.
    pub quality_retry: bool,
    /// Caller permission flags.
    pub permissions: Permissions,
}

impl GenerationJob {
    /// Creates a job with defaults: full-width grid, new pack.
    pub fn with_defaults() -> Self {
        Self {
            id: JobId::new(),
            pack_link: String::new(),
            set_title: String::new(),
            width: DEFAULT_WIDTH,
            background: None,
            initiator: 0,
            source: PathBuf::new(),
            work_dir: PathBuf::new(),
            new_set: true,
            quality: DEFAULT_QUALITY,
            quality_retry: false,
            permissions: Permissions::default(),
        }
    }
}

/// Errors produced while normalizing command arguments.
///
/// These are surfaced to the submitter as actionable text; the job is
/// aborted before any remote mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// A token did not have the `key=value` shape.
    #[error("malformed argument `{token}`, expected key=value")]
    Malformed { token: String },

    /// The key is not a known argument or alias.
    #[error("unknown argument `{key}`")]
    UnknownKey { key: String },

    /// Width outside 1..=8 or not a number.
    #[error("invalid width `{value}`, expected 1-8")]
    InvalidWidth { value: String },

    /// Similarity/blend outside 0..=1 or not a number.
    #[error("invalid value `{value}` for `{key}`, expected a number in 0..1")]
    InvalidNumber { key: String, value: String },

    /// Color is neither a known name nor a hex value.
    #[error("unknown color `{value}`")]
    UnknownColor { value: String },

    /// Similarity or blend given without an explicit background color.
    #[error("invalid background argument combination: similarity/blend require an explicit background color")]
    InvalidBackgroundCombination,

    /// A `[` was never closed.
    #[error("unbalanced brackets in arguments")]
    UnbalancedBrackets,
}

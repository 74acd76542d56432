//! Emojitiler - emoji-pack generation and delivery pipeline
//!
//! This library turns user-submitted video/image/GIF sources into grids of
//! 100×100 custom emoji assets and publishes them as named packs on the
//! remote chat platform, while respecting the platform's hard quotas,
//! serializing concurrent edits to the same pack, reporting live progress
//! and supporting mid-flight cancellation with compensating cleanup.
//!
//! # High-Level API
//!
//! The [`pipeline`] module provides the top-level driver:
//!
//! ```ignore
//! use emojitiler::pipeline::{PipelineContext, run_generation, GenerationRequest};
//!
//! let job = emojitiler::pipeline::parse_args("w=4 b=black t=[My Pack]")?;
//! let outcome = run_generation(&ctx, job, request).await?;
//! ```

pub mod admission;
pub mod command;
pub mod config;
pub mod job;
pub mod logging;
pub mod media;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod retrieval;
pub mod storage;
pub mod tiling;
pub mod transport;
pub mod upload;

/// Version of the emojitiler library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Configuration types for emojitiler components.
//!
//! Each config struct groups the parameters of one pipeline stage and
//! provides sensible defaults matched to the remote platform's limits.
//!
//! # Example
//!
//! ```
//! use emojitiler::config::{TilingConfig, UploadConfig};
//!
//! let tiling = TilingConfig::default().with_workers(8);
//! let upload = UploadConfig::default();
//! assert_eq!(upload.total_cap, 200);
//! ```

pub mod retention;
pub mod tiling;
pub mod transport;
pub mod upload;

pub use retention::RetentionConfig;
pub use tiling::TilingConfig;
pub use transport::TransportConfig;
pub use upload::UploadConfig;

//! Remote chat platform client.
//!
//! Models the subset of the platform API the pipeline depends on: asset
//! upload, pack create/extend/fetch/delete, and the status messages the
//! progress tracker posts. The wire shapes are design-level, not
//! byte-exact; what matters to the pipeline is the `ok=false` envelope,
//! the retry-after throttling field, and the set-mutation semantics.
//!
//! All remote calls go through the [`RateLimitedTransport`], which owns
//! throttle handling.
//!
//! [`RateLimitedTransport`]: crate::transport::RateLimitedTransport

mod client;
mod rejection;
mod service;
mod types;

pub use client::PlatformClient;
pub use rejection::{rejection_from_description, PlatformRejection};
pub use service::PackService;
pub use types::{
    AssetFormat, ChatId, MessageId, NewPackAsset, PackInfo, PackMember, SentMessage,
    UploadedAsset, UserId,
};

use crate::transport::TransportError;
use thiserror::Error;

/// Errors from platform API calls.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The transport layer failed (connection, quota, server error).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The platform answered `ok=false`.
    #[error("platform rejected {method}: {description}")]
    Api {
        method: &'static str,
        code: Option<i64>,
        description: String,
    },

    /// The platform answered `ok=true` but without a result payload.
    #[error("platform response for {method} was missing a result")]
    EmptyResult { method: &'static str },
}

impl PlatformError {
    /// Classifies an `ok=false` answer into a structured rejection, if the
    /// description matches a known condition.
    pub fn rejection(&self) -> Option<PlatformRejection> {
        match self {
            PlatformError::Api { description, .. } => rejection_from_description(description),
            _ => None,
        }
    }

    /// True when the platform reported the asset as too large to become a
    /// pack member.
    pub fn is_oversized_asset(&self) -> bool {
        self.rejection() == Some(PlatformRejection::OversizedAsset)
    }

    /// True when the platform rejected the container format of a batch.
    pub fn is_invalid_container(&self) -> bool {
        self.rejection() == Some(PlatformRejection::InvalidContainerFormat)
    }
}

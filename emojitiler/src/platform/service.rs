//! Pack-mutation service trait.
//!
//! This abstraction allows dependency injection and easier testing by
//! enabling mock pack services in tests; the production implementation is
//! [`PlatformClient`].
//!
//! [`PlatformClient`]: crate::platform::PlatformClient

use super::types::{AssetFormat, NewPackAsset, PackInfo, UploadedAsset, UserId};
use super::PlatformError;
use std::future::Future;

/// Remote pack operations the upload orchestrator depends on.
///
/// All calls carry caller credentials implicitly (the implementation is
/// bound to one credential) and are subject to the platform's throttling
/// envelope.
pub trait PackService: Send + Sync {
    /// Uploads a raw asset binary with its declared format.
    fn upload_asset(
        &self,
        owner: UserId,
        data: Vec<u8>,
        file_name: &str,
        format: AssetFormat,
    ) -> impl Future<Output = Result<UploadedAsset, PlatformError>> + Send;

    /// Creates a pack with an initial batch of assets.
    ///
    /// The batch must respect the platform's per-call cap; the caller is
    /// responsible for splitting.
    fn create_pack(
        &self,
        owner: UserId,
        link: &str,
        title: &str,
        assets: &[NewPackAsset],
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Adds one asset to an existing pack.
    fn add_to_pack(
        &self,
        owner: UserId,
        link: &str,
        asset: &NewPackAsset,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Fetches the authoritative pack state.
    fn get_pack(&self, link: &str) -> impl Future<Output = Result<PackInfo, PlatformError>> + Send;

    /// Deletes a pack. Used as compensation for cancelled creations.
    fn delete_pack(&self, link: &str) -> impl Future<Output = Result<(), PlatformError>> + Send;
}

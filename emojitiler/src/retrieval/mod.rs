//! Media retrieval collaborator.
//!
//! Given an attachment reference from the chat layer, retrieval hands
//! back a local file path and the declared MIME type. Unsupported MIME
//! types are rejected before any processing begins.

use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;

/// MIME types the tiling processor accepts as sources.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/webm",
    "image/gif",
    "image/jpeg",
    "image/png",
    "image/webp",
];

/// A fetched attachment on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedMedia {
    /// Local path of the downloaded file.
    pub path: PathBuf,
    /// MIME type declared by the platform.
    pub mime_type: String,
}

/// Errors from media retrieval.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The attachment could not be fetched.
    #[error("failed to fetch attachment {reference}: {message}")]
    FetchFailed { reference: String, message: String },

    /// The declared MIME type is not a supported source format.
    #[error("unsupported media type {mime_type}")]
    UnsupportedMime { mime_type: String },
}

/// Fetches chat attachments onto local disk.
pub trait MediaRetrieval: Send + Sync {
    /// Resolves an attachment reference to a local file.
    ///
    /// Implementations must reject unsupported MIME types with
    /// [`RetrievalError::UnsupportedMime`] before downloading.
    fn fetch(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<RetrievedMedia, RetrievalError>> + Send;
}

/// Returns an error if `mime_type` is not a supported source format.
pub fn check_mime_supported(mime_type: &str) -> Result<(), RetrievalError> {
    if SUPPORTED_MIME_TYPES.contains(&mime_type) {
        Ok(())
    } else {
        Err(RetrievalError::UnsupportedMime {
            mime_type: mime_type.to_string(),
        })
    }
}

/// Retrieval over files already on local disk, used by the CLI.
#[derive(Debug, Default)]
pub struct LocalFileRetrieval;

impl MediaRetrieval for LocalFileRetrieval {
    async fn fetch(&self, reference: &str) -> Result<RetrievedMedia, RetrievalError> {
        let path = PathBuf::from(reference);
        if !path.is_file() {
            return Err(RetrievalError::FetchFailed {
                reference: reference.to_string(),
                message: "no such file".to_string(),
            });
        }
        let mime_type = guess_mime(&path);
        check_mime_supported(&mime_type)?;
        Ok(RetrievedMedia { path, mime_type })
    }
}

/// Guesses a MIME type from the file extension.
fn guess_mime(path: &std::path::Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
    .to_string()
}

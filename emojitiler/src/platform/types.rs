//! Domain types for the platform API subset.

use serde::{Deserialize, Serialize};

/// Platform user id.
pub type UserId = i64;

/// Platform chat id.
pub type ChatId = i64;

/// Platform message id.
pub type MessageId = i64;

/// Declared format of an uploaded asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    /// Animated emoji asset (VP9 with alpha).
    Video,
    /// Still emoji asset.
    Static,
}

impl AssetFormat {
    /// Wire name of the format.
    pub fn as_str(self) -> &'static str {
        match self {
            AssetFormat::Video => "video",
            AssetFormat::Static => "static",
        }
    }
}

/// A raw uploaded asset, not yet attached to any pack.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UploadedAsset {
    /// Handle of the uploaded binary.
    pub file_id: String,
}

/// One asset of a create/extend call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewPackAsset {
    /// Raw asset handle from [`UploadedAsset`].
    pub file_id: String,
    /// File name the asset was uploaded under.
    pub file_name: String,
    /// Declared format.
    pub format: AssetFormat,
}

/// A member of an existing pack.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PackMember {
    /// Final pack-member handle, addressable in messages.
    pub document_id: String,
}

/// Authoritative state of a pack.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PackInfo {
    /// Pack link (short name).
    pub name: String,
    /// Human-readable title.
    pub title: String,
    /// Members in platform order; new members append at the tail.
    pub members: Vec<PackMember>,
}

/// A posted chat message.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SentMessage {
    /// Id of the posted message.
    pub message_id: MessageId,
}

//! Translation of remote error descriptions into structured rejections.
//!
//! The platform reports most set-mutation failures as `ok=false` with a
//! free-text description. Matching against that text is isolated here so
//! no other module ever string-matches a remote error.

/// Structured rejection conditions the pipeline reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformRejection {
    /// The encoded asset exceeds the per-member size limit. Recoverable
    /// by re-encoding at a higher quality value (smaller output).
    OversizedAsset,
    /// The batch container format was rejected. Recoverable by falling
    /// back to a single-asset batch.
    InvalidContainerFormat,
    /// The target pack does not exist (or was deleted remotely).
    PackMissing,
    /// The pack is at the platform's member cap.
    PackFull,
    /// The requested pack link is taken or malformed.
    InvalidPackLink,
}

/// Description substrings mapped to rejections. Matched case-insensitively.
const REJECTION_TABLE: &[(&str, PlatformRejection)] = &[
    ("asset_too_big", PlatformRejection::OversizedAsset),
    ("file is too big", PlatformRejection::OversizedAsset),
    ("invalid_container", PlatformRejection::InvalidContainerFormat),
    ("unsupported container", PlatformRejection::InvalidContainerFormat),
    ("pack_not_found", PlatformRejection::PackMissing),
    ("packset_invalid", PlatformRejection::PackMissing),
    ("pack_full", PlatformRejection::PackFull),
    ("too much in pack", PlatformRejection::PackFull),
    ("link_occupied", PlatformRejection::InvalidPackLink),
    ("invalid pack link", PlatformRejection::InvalidPackLink),
];

/// Maps a remote error description to a structured rejection.
///
/// Returns `None` for descriptions the pipeline has no specific handling
/// for; callers treat those as unrecoverable.
pub fn rejection_from_description(description: &str) -> Option<PlatformRejection> {
    let lower = description.to_ascii_lowercase();
    REJECTION_TABLE
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, rejection)| *rejection)
}

//! Transcoder filter-spec construction.
//!
//! Filters are plain strings in the transcoder's `-vf` syntax. Each tile
//! gets one crop (plus scale/pad for the shorter final row), optionally
//! preceded by a chroma-key stage when the job configured background
//! removal.

use crate::command::ChromaKey;
use crate::config::tiling::TILE_SIZE;

/// Pad color used when no background color is configured: fully
/// transparent black.
pub const DEFAULT_MATTE: &str = "0x000000@0.0";

/// Builds the filter for one tile.
///
/// `crop_h` is the tile's source height: [`TILE_SIZE`] for full rows, the
/// genuine leftover height for the final row. Short tiles are padded back
/// to a square with the background color (or the default matte) so every
/// asset stays 100×100.
pub fn tile_filter(x: u32, y: u32, crop_h: u32, background: Option<&ChromaKey>) -> String {
    let mut stages = Vec::new();

    if let Some(key) = background {
        stages.push(format!(
            "colorkey={}:{}:{}",
            key.color, key.similarity, key.blend
        ));
    }

    stages.push(format!("crop={TILE_SIZE}:{crop_h}:{x}:{y}"));

    if crop_h < TILE_SIZE {
        let matte = background.map(|k| k.color.as_str()).unwrap_or(DEFAULT_MATTE);
        stages.push(format!("scale={TILE_SIZE}:{crop_h}"));
        stages.push(format!("pad={TILE_SIZE}:{TILE_SIZE}:0:0:{matte}"));
    }

    stages.join(",")
}

/// Builds the one-shot normalization filter that resizes the source to
/// the target grid dimensions.
pub fn resize_filter(width: u32, height: u32) -> String {
    format!("scale={width}:{height}")
}

//! Grid planning math.
//!
//! Pure functions mapping source dimensions to resize targets and tile
//! grids. Kept free of I/O so the arithmetic is exhaustively testable.

use crate::config::tiling::TILE_SIZE;
use crate::media::Dimensions;

/// The tile grid computed for a normalized source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPlan {
    /// Tiles per row.
    pub tiles_x: u32,
    /// Number of rows.
    pub tiles_y: u32,
    /// Source height of the final row's tiles; equals [`TILE_SIZE`]
    /// when the height divides evenly.
    pub last_row_height: u32,
}

impl GridPlan {
    /// Total number of tiles in the grid.
    pub fn tile_count(&self) -> usize {
        (self.tiles_x * self.tiles_y) as usize
    }
}

/// Computes the resize target for a source: the requested tile width at
/// the platform tile size, height scaled proportionally.
pub fn plan_resize(source: Dimensions, requested_width: u32) -> Dimensions {
    let target_w = requested_width * TILE_SIZE;
    let target_h =
        ((u64::from(source.height) * u64::from(target_w)) / u64::from(source.width.max(1))) as u32;
    Dimensions {
        width: target_w,
        height: target_h.max(1),
    }
}

/// Returns the cropped height if the final row's leftover is non-zero
/// but below `min_height`, making it a degenerate near-empty row.
///
/// Sources shorter than one full tile are never cropped away entirely.
pub fn crop_degenerate_row(scaled: Dimensions, min_height: u32) -> Option<u32> {
    let leftover = scaled.height % TILE_SIZE;
    if leftover == 0 || leftover >= min_height || scaled.height <= TILE_SIZE {
        return None;
    }
    Some(scaled.height - leftover)
}

/// Computes the tile grid for normalized dimensions.
pub fn plan_grid(scaled: Dimensions) -> GridPlan {
    let tiles_x = (scaled.width / TILE_SIZE).max(1);
    let tiles_y = scaled.height.div_ceil(TILE_SIZE).max(1);
    let leftover = scaled.height % TILE_SIZE;
    GridPlan {
        tiles_x,
        tiles_y,
        last_row_height: if leftover == 0 { TILE_SIZE } else { leftover },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    #[test]
    fn test_resize_targets_requested_width() {
        let target = plan_resize(dims(1920, 1080), 8);
        assert_eq!(target.width, 800);
        assert_eq!(target.height, 450);

        let target = plan_resize(dims(1920, 1080), 3);
        assert_eq!(target.width, 300);
        assert_eq!(target.height, 168);
    }

    #[test]
    fn test_resize_never_zero_height() {
        let target = plan_resize(dims(4000, 10), 1);
        assert_eq!(target.width, 100);
        assert_eq!(target.height, 1);
    }

    #[test]
    fn test_grid_exact_multiple() {
        let plan = plan_grid(dims(800, 200));
        assert_eq!(plan.tiles_x, 8);
        assert_eq!(plan.tiles_y, 2);
        assert_eq!(plan.last_row_height, TILE_SIZE);
        assert_eq!(plan.tile_count(), 16);
    }

    #[test]
    fn test_grid_with_leftover_row() {
        let plan = plan_grid(dims(300, 168));
        assert_eq!(plan.tiles_x, 3);
        assert_eq!(plan.tiles_y, 2);
        assert_eq!(plan.last_row_height, 68);
        assert_eq!(plan.tile_count(), 6);
    }

    #[test]
    fn test_grid_row_count_for_every_width() {
        // ceil(height / TILE_SIZE) rows regardless of width
        for width in 1..=8u32 {
            let plan = plan_grid(dims(width * TILE_SIZE, 450));
            assert_eq!(plan.tiles_x, width);
            assert_eq!(plan.tiles_y, 5);
        }
    }

    #[test]
    fn test_degenerate_leftover_cropped() {
        // 410 → leftover 10, below the 20px threshold
        assert_eq!(crop_degenerate_row(dims(800, 410), 20), Some(400));
    }

    #[test]
    fn test_healthy_leftover_kept() {
        assert_eq!(crop_degenerate_row(dims(800, 450), 20), None);
        assert_eq!(crop_degenerate_row(dims(800, 400), 20), None);
    }

    #[test]
    fn test_short_source_never_cropped_away() {
        // A 90px-tall source is one short row, not a degenerate leftover
        assert_eq!(crop_degenerate_row(dims(800, 90), 20), None);
    }
}

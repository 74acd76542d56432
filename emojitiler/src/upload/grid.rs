//! Grid layout with symmetric filler padding.
//!
//! The platform renders packs at a fixed row width. Narrower grids are
//! centered by surrounding each row's content with transparent filler:
//! left padding takes the floor half (biased one smaller on odd totals),
//! right padding the remainder.

/// One slot of the rendered grid, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridSlot {
    /// The n-th content tile (row-major tile index).
    Content(usize),
    /// A transparent filler entry.
    Filler,
}

impl GridSlot {
    /// True for filler slots.
    pub fn is_filler(&self) -> bool {
        matches!(self, GridSlot::Filler)
    }
}

/// Left padding for a row of `width` content slots inside `row_width`.
pub fn left_padding(width: u32, row_width: u32) -> u32 {
    row_width.saturating_sub(width) / 2
}

/// Lays out `tile_count` row-major content tiles on the platform grid.
///
/// Each row is `row_width` slots when `width < row_width` (padded), else
/// `width`. Content slots beyond the tile count (a partial final row)
/// become filler.
pub fn layout_grid(tile_count: usize, width: u32, row_width: u32) -> Vec<GridSlot> {
    let rows = tile_count.div_ceil(width.max(1) as usize);
    let left = left_padding(width, row_width);
    let right = row_width.saturating_sub(width).saturating_sub(left);

    let mut slots = Vec::new();
    let mut next_tile = 0;
    for _ in 0..rows {
        for _ in 0..left {
            slots.push(GridSlot::Filler);
        }
        for _ in 0..width {
            if next_tile < tile_count {
                slots.push(GridSlot::Content(next_tile));
                next_tile += 1;
            } else {
                slots.push(GridSlot::Filler);
            }
        }
        for _ in 0..right {
            slots.push(GridSlot::Filler);
        }
    }
    slots
}

/*!
# Grid Windows

A requested tile is rendered from a block of leaf-resolution cells that
covers the tile plus a one-tile halo, so smoothing near the tile edge sees the
neighboring counts and adjacent tiles join without seams.

```text
 +-------+-------+-------+
 | above | above | above |   row present unless y == 0
 | left  |       | right |
 +-------+-------+-------+
 | left  | TILE  | right |   crop band
 +-------+-------+-------+
 | below | below | below |   row present unless y == max
 | left  |       | right |
 +-------+-------+-------+
```

Columns always exist because the world wraps at the antimeridian.
*/

use crate::error::{RenderError, RenderResult};
use heatmap_core::{CountGrid, TileCoordinate, MAX_ZOOM};

/// Cell rectangle feeding one rendered tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridWindow {
    pub tile: TileCoordinate,
    pub level_resolution: u8,
    /// Top-left cell of the window at `tile.zoom + level_resolution`
    pub anchor: TileCoordinate,
    /// Tile rows covered: 1 at zoom 0, 2 on a polar edge, otherwise 3
    pub rows: u32,
    /// Row band holding the requested tile
    pub crop_row: u32,
}

impl GridWindow {
    pub fn new(tile: TileCoordinate, level_resolution: u8) -> RenderResult<Self> {
        if !tile.is_valid() || tile.zoom as u16 + level_resolution as u16 > MAX_ZOOM as u16 {
            return Err(RenderError::UnrenderableTile {
                tile,
                level_resolution,
            });
        }

        let above = tile.above();
        let rows = 1 + above.is_some() as u32 + tile.below().is_some() as u32;
        let top = above.unwrap_or(tile).left();
        let anchor = top
            .scale_to(tile.zoom + level_resolution)
            .ok_or(RenderError::UnrenderableTile {
                tile,
                level_resolution,
            })?;

        Ok(Self {
            tile,
            level_resolution,
            anchor,
            rows,
            crop_row: above.is_some() as u32,
        })
    }

    pub fn cells_per_tile(&self) -> u32 {
        1u32 << self.level_resolution
    }

    pub fn width(&self) -> u32 {
        3 * self.cells_per_tile()
    }

    pub fn height(&self) -> u32 {
        self.rows * self.cells_per_tile()
    }

    /// Column band holding the requested tile
    pub fn crop_column(&self) -> u32 {
        1
    }

    /// Zeroed grid sized for this window
    pub fn new_grid(&self) -> CountGrid {
        CountGrid::new(self.width(), self.height())
    }
}

//! Tile rendering entry point for map hosts

use crate::error::RenderResult;
use crate::overlay::{now_millis, HeatmapSet};
use crate::raster::{Rasterizer, RenderOptions, RenderedTile};
use crate::window::GridWindow;
use heatmap_core::TileCoordinate;
use log::{debug, trace};
use rayon::prelude::*;
use std::sync::Arc;

/// Renders the displayed heatmaps into map tiles
#[derive(Debug, Clone)]
pub struct HeatmapRenderer {
    heatmaps: Arc<HeatmapSet>,
    rasterizer: Rasterizer,
}

impl HeatmapRenderer {
    pub fn new(heatmaps: Arc<HeatmapSet>, options: RenderOptions) -> RenderResult<Self> {
        Ok(Self {
            heatmaps,
            rasterizer: Rasterizer::new(options)?,
        })
    }

    pub fn heatmaps(&self) -> &Arc<HeatmapSet> {
        &self.heatmaps
    }

    pub fn options(&self) -> &RenderOptions {
        self.rasterizer.options()
    }

    /// Render one tile from a snapshot of the current heatmaps.
    ///
    /// The timestamp is taken before the snapshot, so a tile whose data
    /// changed mid-render reports itself as stale.
    pub fn render_tile(&self, tile: TileCoordinate) -> RenderResult<RenderedTile> {
        let timestamp = now_millis();
        let window = GridWindow::new(tile, self.options().level_resolution)?;
        let heatmaps = self.heatmaps.snapshot();

        let mut grid = window.new_grid();
        for entry in heatmaps.iter() {
            entry.pyramid.fill_grid(&mut grid, window.anchor);
        }
        trace!(
            "Tile {}: {} heatmaps, {} points in window",
            tile,
            heatmaps.len(),
            grid.total()
        );

        Ok(RenderedTile {
            tile,
            image: self.rasterizer.rasterize(&grid, &window),
            timestamp,
        })
    }

    /// Render a batch of tiles in parallel, one result per requested tile
    pub fn render_tiles(&self, tiles: &[TileCoordinate]) -> Vec<RenderResult<RenderedTile>> {
        debug!("Rendering {} tiles", tiles.len());
        tiles.par_iter().map(|&tile| self.render_tile(tile)).collect()
    }
}

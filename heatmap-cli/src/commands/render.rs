//! Render command implementation - rasterize pyramids into `{z}/{x}/{y}.png` tiles

use anyhow::{Context, Result};
use heatmap_core::{BoundingBox, SpatialPyramid, TileCoordinate, ZoomLevel, MAX_ZOOM};
use heatmap_render::{HeatmapRenderer, HeatmapSet};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::commands::load_pyramid;
use crate::config::Config;
use crate::error::CliError;

pub fn execute(
    config: &Config,
    pyramids: Vec<PathBuf>,
    zoom: ZoomLevel,
    x: Option<u32>,
    y: Option<u32>,
    out_dir: PathBuf,
) -> Result<()> {
    let options = config.render_options()?;

    let set = Arc::new(HeatmapSet::new());
    for path in &pyramids {
        let pyramid = load_pyramid(path)?;
        if pyramid.options().level_resolution != options.level_resolution {
            log::warn!(
                "{} was built with level resolution {}, rendering with {}",
                path.display(),
                pyramid.options().level_resolution,
                options.level_resolution
            );
        }
        log::info!("Loaded {} ({} points)", path.display(), pyramid.total_count());
        set.add(Arc::new(pyramid));
    }

    let tiles = {
        let snapshot = set.snapshot();
        let loaded: Vec<&SpatialPyramid> = snapshot.iter().map(|entry| entry.pyramid.as_ref()).collect();
        tiles_to_render(&loaded, zoom, options.level_resolution, x, y)?
    };
    log::info!(
        "Rendering {} tiles at zoom {} ({} px)",
        tiles.len(),
        zoom,
        options.tile_size
    );

    let renderer = HeatmapRenderer::new(Arc::clone(&set), options)?;
    let mut written = 0usize;
    for result in renderer.render_tiles(&tiles) {
        let rendered = result?;
        let path = tile_path(&out_dir, rendered.tile);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        rendered
            .save_png(&path)
            .with_context(|| format!("Failed to write tile: {}", path.display()))?;
        written += 1;
    }

    log::info!("Wrote {} tiles to {}", written, out_dir.display());
    Ok(())
}

/// Either the single requested tile or every tile touching the data plus a
/// one-tile border
pub fn tiles_to_render(
    pyramids: &[&SpatialPyramid],
    zoom: ZoomLevel,
    level_resolution: u8,
    x: Option<u32>,
    y: Option<u32>,
) -> Result<Vec<TileCoordinate>, CliError> {
    match (x, y) {
        (Some(x), Some(y)) => {
            let tile = TileCoordinate::new(x, y, zoom).map_err(|e| CliError::validation(e.to_string()))?;
            return Ok(vec![tile]);
        }
        (None, None) => {}
        _ => return Err(CliError::validation("--x and --y must be given together")),
    }

    let detail = zoom.saturating_add(level_resolution).min(MAX_ZOOM);
    let mut bbox: Option<BoundingBox> = None;
    for pyramid in pyramids {
        let extent = pyramid.bounding_box(detail);
        bbox = Some(match bbox {
            Some(mut existing) => {
                existing.extend(&extent);
                existing
            }
            None => extent,
        });
    }
    let bbox = bbox.ok_or_else(|| CliError::validation("no pyramids to render"))?;

    let mut tiles = BTreeSet::new();
    for tile in bbox.tiles_at(zoom) {
        tiles.insert(tile);
        tiles.insert(tile.left());
        tiles.insert(tile.right());
        for row in [tile.above(), tile.below()].into_iter().flatten() {
            tiles.insert(row);
            tiles.insert(row.left());
            tiles.insert(row.right());
        }
    }
    Ok(tiles.into_iter().collect())
}

fn tile_path(out_dir: &Path, tile: TileCoordinate) -> PathBuf {
    out_dir
        .join(tile.zoom.to_string())
        .join(tile.x.to_string())
        .join(format!("{}.png", tile.y))
}

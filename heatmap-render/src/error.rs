//! Errors raised while configuring or running the tile rasterizer

use heatmap_core::{HeatmapError, TileCoordinate};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid color scale: {0}")]
    InvalidColorScale(String),

    #[error("Invalid render options: {0}")]
    InvalidOptions(String),

    #[error("Invalid color '{0}': expected #RRGGBB or #RRGGBBAA")]
    InvalidColor(String),

    #[error("Tile {tile} cannot be rendered with level resolution {level_resolution}")]
    UnrenderableTile {
        tile: TileCoordinate,
        level_resolution: u8,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Heatmap(#[from] HeatmapError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;

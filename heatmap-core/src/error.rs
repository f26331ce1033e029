//! Error types shared by the pyramid builder, queries and codecs

use thiserror::Error;

/// Errors that can occur while configuring, building or decoding a heatmap pyramid
#[derive(Debug, Error)]
pub enum HeatmapError {
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Invalid tile {x}/{y} at zoom {zoom}")]
    InvalidTile { x: u32, y: u32, zoom: u8 },

    #[error("Invalid pyramid: {0}")]
    InvalidPyramid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid magic bytes: expected HMPY")]
    InvalidMagic,

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u16),

    #[error("Data corruption: {0}")]
    Corruption(String),
}

pub type HeatmapResult<T> = Result<T, HeatmapError>;

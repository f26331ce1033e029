//! Heatmap Core Library
//!
//! Mercator tile addressing, point-count pyramids and their on-disk encodings.

pub mod builder;
pub mod codec;
pub mod error;
pub mod pyramid;
pub mod tile;

// Re-export commonly used types and functions
pub use builder::{HeatmapOptions, PyramidBuilder, SharedPyramidBuilder};
pub use codec::{read_from_file, write_to_file, PyramidFormat};
pub use error::{HeatmapError, HeatmapResult};
pub use pyramid::{CountGrid, PyramidNode, SpatialPyramid};
pub use tile::{BoundingBox, LatLong, TileCoordinate, ZoomLevel, MAX_LATITUDE, MAX_ZOOM};

/// Version information for the heatmap core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}

//! Command implementations for the heatmap CLI

pub mod build;
pub mod demo;
pub mod info;
pub mod render;

use crate::error::CliError;
use heatmap_core::SpatialPyramid;
use std::path::Path;

/// Read a pyramid file, reporting missing or damaged files as CLI errors
pub fn load_pyramid(path: &Path) -> Result<SpatialPyramid, CliError> {
    if !path.exists() {
        return Err(CliError::file_not_found(path.to_path_buf()));
    }
    heatmap_core::read_from_file(path)
        .map_err(|err| CliError::pyramid(format!("{}: {}", path.display(), err)))
}

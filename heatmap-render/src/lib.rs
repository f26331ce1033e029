//! Heatmap Render Library
//!
//! Turns heatmap pyramids into smoothed, seamless RGBA map tiles.

pub mod color;
pub mod error;
pub mod overlay;
pub mod raster;
pub mod renderer;
pub mod window;

pub use color::{Color, ColorScale};
pub use error::{RenderError, RenderResult};
pub use overlay::{HeatmapEntry, HeatmapId, HeatmapSet};
pub use raster::{Rasterizer, RenderOptions, RenderedTile, MAX_LEVEL_RESOLUTION};
pub use renderer::HeatmapRenderer;
pub use window::GridWindow;

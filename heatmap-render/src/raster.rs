//! Count grid → PNG tile pipeline: colorize, upscale, blur, crop

use crate::color::ColorScale;
use crate::error::{RenderError, RenderResult};
use crate::window::GridWindow;
use heatmap_core::{CountGrid, TileCoordinate};
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Finest cell subdivision a tile window can be rendered at (3072 cells across)
pub const MAX_LEVEL_RESOLUTION: u8 = 10;

/// Rasterizer configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_level_resolution")]
    pub level_resolution: u8,
    /// Output tile edge in pixels
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    /// Gaussian sigma applied after upscaling, 0 disables the blur
    #[serde(default)]
    pub blur_radius: f32,
    #[serde(default)]
    pub scale: ColorScale,
}

fn default_level_resolution() -> u8 {
    3
}

fn default_tile_size() -> u32 {
    256
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            level_resolution: default_level_resolution(),
            tile_size: default_tile_size(),
            blur_radius: 0.0,
            scale: ColorScale::default(),
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> RenderResult<()> {
        if self.tile_size == 0 {
            return Err(RenderError::InvalidOptions("tile_size must be positive".to_string()));
        }
        if !self.blur_radius.is_finite() || self.blur_radius < 0.0 {
            return Err(RenderError::InvalidOptions(format!(
                "blur_radius must be a non-negative number, got {}",
                self.blur_radius
            )));
        }
        if self.level_resolution > MAX_LEVEL_RESOLUTION {
            return Err(RenderError::InvalidOptions(format!(
                "level_resolution {} exceeds the maximum of {}",
                self.level_resolution, MAX_LEVEL_RESOLUTION
            )));
        }
        if (self.tile_size as u64) * 3 > u32::MAX as u64 {
            return Err(RenderError::InvalidOptions(format!(
                "tile_size {} is too large",
                self.tile_size
            )));
        }
        self.scale.validate()
    }
}

/// A finished tile image with the time its render started
#[derive(Debug, Clone)]
pub struct RenderedTile {
    pub tile: TileCoordinate,
    pub image: RgbaImage,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl RenderedTile {
    /// True when the data changed after this tile started rendering
    pub fn is_stale(&self, data_timestamp: i64) -> bool {
        self.timestamp < data_timestamp
    }

    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> RenderResult<()> {
        self.image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

/// Stateless grid-to-pixels converter
#[derive(Debug, Clone)]
pub struct Rasterizer {
    options: RenderOptions,
}

impl Rasterizer {
    pub fn new(options: RenderOptions) -> RenderResult<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// One pixel per grid cell
    pub fn colorize(&self, grid: &CountGrid) -> RgbaImage {
        let scale = &self.options.scale;
        RgbaImage::from_fn(grid.width(), grid.height(), |x, y| {
            scale.color(grid.get(x, y).unwrap_or(0)).to_rgba()
        })
    }

    /// Stretch the window image so each tile band is `tile_size` pixels, then blur
    ///
    /// Filtering runs on premultiplied alpha so colors fade out at data edges
    /// instead of blending toward the RGB of transparent cells.
    pub fn smooth(&self, cells: &RgbaImage, window: &GridWindow) -> RgbaImage {
        let tile_size = self.options.tile_size;
        let mut premultiplied = cells.clone();
        premultiply(&mut premultiplied);

        let upscaled = imageops::resize(
            &premultiplied,
            3 * tile_size,
            window.rows * tile_size,
            FilterType::Triangle,
        );
        let mut smoothed = if self.options.blur_radius > 0.0 {
            imageops::blur(&upscaled, self.options.blur_radius)
        } else {
            upscaled
        };
        unpremultiply(&mut smoothed);
        smoothed
    }

    /// Cut the requested tile out of the smoothed window
    pub fn crop(&self, smoothed: &RgbaImage, window: &GridWindow) -> RgbaImage {
        let tile_size = self.options.tile_size;
        imageops::crop_imm(
            smoothed,
            window.crop_column() * tile_size,
            window.crop_row * tile_size,
            tile_size,
            tile_size,
        )
        .to_image()
    }

    pub fn rasterize(&self, grid: &CountGrid, window: &GridWindow) -> RgbaImage {
        let cells = self.colorize(grid);
        let smoothed = self.smooth(&cells, window);
        debug!(
            "Rasterized {}: {}x{} cells -> {}x{} px",
            window.tile,
            grid.width(),
            grid.height(),
            smoothed.width(),
            smoothed.height()
        );
        self.crop(&smoothed, window)
    }
}

fn premultiply(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let alpha = pixel[3] as u32;
        for channel in &mut pixel.0[..3] {
            *channel = ((*channel as u32 * alpha + 127) / 255) as u8;
        }
    }
}

fn unpremultiply(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let alpha = pixel[3] as u32;
        if alpha == 0 {
            pixel.0 = [0, 0, 0, 0];
            continue;
        }
        for channel in &mut pixel.0[..3] {
            *channel = ((*channel as u32 * 255 + alpha / 2) / alpha).min(255) as u8;
        }
    }
}

//! Configuration handling for the heatmap CLI
//!
//! Supports loading configuration from heatmap.toml files with CLI argument overrides.

use crate::error::CliError;
use anyhow::{Context, Result};
use heatmap_core::HeatmapOptions;
use heatmap_render::{ColorScale, RenderOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub pyramid: HeatmapOptions,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default number of threads to use
    #[serde(default = "default_threads")]
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Tile edge in pixels
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,

    /// Gaussian blur sigma in pixels (0 disables)
    #[serde(default)]
    pub blur_radius: f32,

    /// Count-to-color ramp, the `[render.scale]` table
    #[serde(default)]
    pub scale: ColorScale,
}

// Default value functions
fn default_threads() -> usize { num_cpus::get() }
fn default_tile_size() -> u32 { 256 }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tile_size: default_tile_size(),
            blur_radius: 0.0,
            scale: ColorScale::default(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                // Try to find heatmap.toml in current directory
                let default_path = PathBuf::from("heatmap.toml");
                if default_path.exists() {
                    log::info!("Loading configuration from: heatmap.toml");
                    Self::load_from_file(&default_path)?
                } else {
                    log::info!("Using default configuration");
                    Self::default()
                }
            }
        };

        config
            .pyramid
            .validate()
            .map_err(|e| CliError::config(format!("[pyramid] {}", e)))?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("Failed to serialize default configuration")
    }

    /// Rasterizer options, sharing the pyramid's level resolution
    pub fn render_options(&self) -> Result<RenderOptions> {
        let options = RenderOptions {
            level_resolution: self.pyramid.level_resolution,
            tile_size: self.render.tile_size,
            blur_radius: self.render.blur_radius,
            scale: self.render.scale,
        };
        options
            .validate()
            .map_err(|e| CliError::config(format!("[render] {}", e)))?;
        Ok(options)
    }
}

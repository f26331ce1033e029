//! RGBA colors and the count → color ramp

use crate::error::{RenderError, RenderResult};
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 8-bit RGBA color, written as `#RRGGBB` or `#RRGGBBAA` in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_hex(text: &str) -> RenderResult<Self> {
        let invalid = || RenderError::InvalidColor(text.to_string());
        let digits = text.trim().strip_prefix('#').unwrap_or(text.trim());
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return Err(invalid());
        }

        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
        let a = if digits.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Linear interpolation per channel, `t` in `[0, 1]`
    pub fn lerp(&self, other: &Color, t: f64) -> Color {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }

    pub fn to_rgba(&self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Color {
    type Error = RenderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Maps a cell count to a color between `min_color` and `max_color`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorScale {
    #[serde(default = "default_min_value")]
    pub min_value: u64,
    #[serde(default = "default_max_value")]
    pub max_value: u64,
    #[serde(default = "default_min_color")]
    pub min_color: Color,
    #[serde(default = "default_max_color")]
    pub max_color: Color,
    #[serde(default = "default_zero_color")]
    pub zero_color: Color,
}

fn default_min_value() -> u64 {
    1
}

fn default_max_value() -> u64 {
    10
}

fn default_min_color() -> Color {
    Color::GREEN
}

fn default_max_color() -> Color {
    Color::RED
}

fn default_zero_color() -> Color {
    Color::TRANSPARENT
}

impl Default for ColorScale {
    fn default() -> Self {
        Self {
            min_value: default_min_value(),
            max_value: default_max_value(),
            min_color: default_min_color(),
            max_color: default_max_color(),
            zero_color: default_zero_color(),
        }
    }
}

impl ColorScale {
    pub fn new(min_value: u64, max_value: u64, min_color: Color, max_color: Color, zero_color: Color) -> RenderResult<Self> {
        let scale = Self {
            min_value,
            max_value,
            min_color,
            max_color,
            zero_color,
        };
        scale.validate()?;
        Ok(scale)
    }

    pub fn validate(&self) -> RenderResult<()> {
        if self.max_value <= self.min_value {
            return Err(RenderError::InvalidColorScale(format!(
                "max_value ({}) must be greater than min_value ({})",
                self.max_value, self.min_value
            )));
        }
        Ok(())
    }

    /// Empty cells get `zero_color`; everything else is clamped onto the ramp
    pub fn color(&self, count: u64) -> Color {
        if count == 0 {
            return self.zero_color;
        }
        let span = self.max_value.saturating_sub(self.min_value).max(1) as f64;
        let t = ((count as f64 - self.min_value as f64) / span).clamp(0.0, 1.0);
        self.min_color.lerp(&self.max_color, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parsing() {
        assert_eq!(Color::from_hex("#ff0000").unwrap(), Color::RED);
        assert_eq!(Color::from_hex("00FF00").unwrap(), Color::GREEN);
        assert_eq!(Color::from_hex("#00000000").unwrap(), Color::TRANSPARENT);
        assert_eq!(Color::from_hex("#11223380").unwrap(), Color::rgba(0x11, 0x22, 0x33, 0x80));
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("#gg0000").is_err());
        assert!(Color::from_hex("#ééé").is_err());
    }

    #[test]
    fn test_hex_formatting() {
        assert_eq!(Color::RED.to_hex(), "#ff0000");
        assert_eq!(Color::rgba(1, 2, 3, 4).to_string(), "#01020304");
    }

    #[test]
    fn test_default_scale() {
        let scale = ColorScale::default();
        assert_eq!(scale.color(0), Color::TRANSPARENT);
        assert_eq!(scale.color(1), Color::GREEN);
        assert_eq!(scale.color(10), Color::RED);
        assert_eq!(scale.color(1_000), Color::RED);
    }

    #[test]
    fn test_scale_interpolates_and_rounds() {
        let scale = ColorScale::default();
        let mid = scale.color(5);
        assert_eq!(mid, Color::rgba(113, 142, 0, 255));
    }

    #[test]
    fn test_ramp_is_monotonic() {
        let scale = ColorScale::new(1, 50, Color::GREEN, Color::RED, Color::TRANSPARENT).unwrap();
        let reds: Vec<u8> = (1..=50).map(|count| scale.color(count).r).collect();
        assert!(reds.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(reds.first(), Some(&0));
        assert_eq!(reds.last(), Some(&255));
    }

    #[test]
    fn test_below_min_clamps_to_min_color() {
        let scale = ColorScale::new(5, 10, Color::BLUE, Color::RED, Color::WHITE).unwrap();
        assert_eq!(scale.color(0), Color::WHITE);
        assert_eq!(scale.color(2), Color::BLUE);
    }

    #[test]
    fn test_scale_rejects_empty_range() {
        assert!(matches!(
            ColorScale::new(10, 10, Color::GREEN, Color::RED, Color::TRANSPARENT),
            Err(RenderError::InvalidColorScale(_))
        ));
        assert!(ColorScale::new(10, 3, Color::GREEN, Color::RED, Color::TRANSPARENT).is_err());
    }
}

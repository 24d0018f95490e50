use std::path::{Path, PathBuf};

use glint_core::Rgba;
use serde::{Deserialize, Serialize};

use crate::error::IoError;

/// Settings of a canvas and its renderer, stored as human-readable JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_dpr")]
    pub device_pixel_ratio: f64,
    #[serde(default = "default_background")]
    pub background: Rgba,
    #[serde(default)]
    pub fonts: Vec<FontFace>,
    /// Base directory for relative image URLs.
    #[serde(default)]
    pub image_root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontFace {
    pub family: String,
    pub path: PathBuf,
}

fn default_dpr() -> f64 {
    1.0
}

fn default_background() -> Rgba {
    Rgba::TRANSPARENT
}

impl CanvasConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio: default_dpr(),
            background: default_background(),
            fonts: Vec::new(),
            image_root: None,
        }
    }

    /// Backing store size in device pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        let dpr = if self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        };
        (
            (self.width as f64 * dpr).round() as u32,
            (self.height as f64 * dpr).round() as u32,
        )
    }

    pub fn from_json(json: &str) -> Result<Self, IoError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, IoError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        log::info!("Loaded canvas config from {}", path.as_ref().display());
        Self::from_json(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config = CanvasConfig::from_json(r#"{ "width": 300, "height": 150 }"#).unwrap();
        assert_eq!(config, CanvasConfig::new(300, 150));
        assert_eq!(config.pixel_size(), (300, 150));
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = CanvasConfig::new(100, 50);
        config.device_pixel_ratio = 2.0;
        config.background = Rgba::WHITE;
        config.fonts.push(FontFace {
            family: "Inter".to_string(),
            path: PathBuf::from("fonts/Inter.ttf"),
        });
        let json = config.to_json().unwrap();
        assert_eq!(CanvasConfig::from_json(&json).unwrap(), config);
        assert_eq!(config.pixel_size(), (200, 100));
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            CanvasConfig::from_json("{"),
            Err(IoError::Json(_))
        ));
    }
}

//! # Glint I/O
//!
//! Everything that crosses the process boundary: decoding images for pattern
//! fills, loading font files, encoding captured frames (PNG, JPEG, WEBP and
//! `data:` URLs) and the JSON canvas configuration.

pub mod config;
pub mod data_url;
pub mod encode;
pub mod error;
pub mod font;
pub mod image_pool;

pub use config::{CanvasConfig, FontFace};
pub use encode::{encode, CaptureFormat, EncodedImage, RgbaSnapshot};
pub use error::IoError;
pub use font::FontLoader;
pub use image_pool::{DecodedImage, ImagePool, ImageReady, ImageSource};

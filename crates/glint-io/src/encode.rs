use std::fmt;
use std::io::Cursor;

use image::{RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::data_url::encode_data_url;
use crate::error::IoError;

/// Canvas default when a JPEG or WEBP capture gives no quality.
pub const DEFAULT_QUALITY: f32 = 0.92;

/// Formats a frame capture may ask for. BMP is recognised but never encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureFormat {
    Png,
    Jpeg,
    Webp,
    Bmp,
}

impl CaptureFormat {
    pub fn from_mime(mime: &str) -> Result<Self, IoError> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Ok(CaptureFormat::Png),
            "image/jpeg" | "image/jpg" => Ok(CaptureFormat::Jpeg),
            "image/webp" => Ok(CaptureFormat::Webp),
            "image/bmp" => Ok(CaptureFormat::Bmp),
            _ => Err(IoError::UnsupportedFormat(mime.to_string())),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            CaptureFormat::Png => "image/png",
            CaptureFormat::Jpeg => "image/jpeg",
            CaptureFormat::Webp => "image/webp",
            CaptureFormat::Bmp => "image/bmp",
        }
    }

    pub fn is_encodable(&self) -> bool {
        !matches!(self, CaptureFormat::Bmp)
    }

    /// Whether the encoder takes a quality. PNG and WebP are written lossless.
    pub fn is_lossy(&self) -> bool {
        matches!(self, CaptureFormat::Jpeg)
    }
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// A frame read back from a surface, as straight (non-premultiplied) RGBA.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaSnapshot {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbaSnapshot {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// An encoded capture.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub format: CaptureFormat,
    /// Quality the encoder applied; `None` for lossless formats.
    pub quality: Option<f32>,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn to_data_url(&self) -> String {
        encode_data_url(self.format.mime(), &self.bytes)
    }
}

/// Map a 0..1 quality to the encoder's 1..100 scale.
fn jpeg_quality(quality: Option<f32>) -> u8 {
    let q = quality.unwrap_or(DEFAULT_QUALITY);
    let q = if q.is_finite() { q.clamp(0.0, 1.0) } else { DEFAULT_QUALITY };
    ((q * 100.0).round() as u8).max(1)
}

pub fn encode(
    snapshot: &RgbaSnapshot,
    format: CaptureFormat,
    quality: Option<f32>,
) -> Result<EncodedImage, IoError> {
    let RgbaSnapshot {
        width,
        height,
        data,
    } = snapshot;
    let (width, height) = (*width, *height);
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);

    match format {
        CaptureFormat::Png => {
            let img = RgbaImage::from_raw(width, height, data.clone()).ok_or(
                IoError::EncodeFailed {
                    format: "PNG",
                    reason: "pixel buffer does not match dimensions".to_string(),
                },
            )?;
            img.write_to(&mut cursor, image::ImageFormat::Png)?;
        }
        CaptureFormat::Jpeg => {
            let rgb: Vec<u8> = data
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            let img = RgbImage::from_raw(width, height, rgb).ok_or(IoError::EncodeFailed {
                format: "JPEG",
                reason: "pixel buffer does not match dimensions".to_string(),
            })?;
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, jpeg_quality(quality));
            img.write_with_encoder(encoder)?;
        }
        CaptureFormat::Webp => {
            let img = RgbaImage::from_raw(width, height, data.clone()).ok_or(
                IoError::EncodeFailed {
                    format: "WEBP",
                    reason: "pixel buffer does not match dimensions".to_string(),
                },
            )?;
            let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut cursor);
            img.write_with_encoder(encoder)?;
        }
        CaptureFormat::Bmp => return Err(IoError::UnsupportedFormat(format.mime().to_string())),
    }

    log::debug!("Encoded {width}x{height} capture as {format} ({} bytes)", buffer.len());
    Ok(EncodedImage {
        format,
        quality: quality.filter(|_| format.is_lossy()),
        width,
        height,
        bytes: buffer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red_square(size: u32) -> RgbaSnapshot {
        RgbaSnapshot {
            width: size,
            height: size,
            data: [255, 0, 0, 255].repeat((size * size) as usize),
        }
    }

    #[test]
    fn test_mime_parsing() {
        assert_eq!(CaptureFormat::from_mime("image/png").unwrap(), CaptureFormat::Png);
        assert_eq!(CaptureFormat::from_mime("IMAGE/JPEG").unwrap(), CaptureFormat::Jpeg);
        assert!(!CaptureFormat::from_mime("image/bmp").unwrap().is_encodable());
        assert!(matches!(
            CaptureFormat::from_mime("image/gif"),
            Err(IoError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_png_encoding() {
        let encoded = encode(&red_square(4), CaptureFormat::Png, None).unwrap();
        assert_eq!(&encoded.bytes[1..4], b"PNG");
        assert!(encoded.to_data_url().starts_with("data:image/png;base64,"));

        let decoded = image::load_from_memory(&encoded.bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(2, 2).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_jpeg_quality_mapping() {
        assert_eq!(jpeg_quality(None), 92);
        assert_eq!(jpeg_quality(Some(0.0)), 1);
        assert_eq!(jpeg_quality(Some(0.5)), 50);
        assert_eq!(jpeg_quality(Some(7.0)), 100);
        let encoded = encode(&red_square(8), CaptureFormat::Jpeg, Some(0.8)).unwrap();
        assert_eq!(&encoded.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(encoded.quality, Some(0.8));
    }

    #[test]
    fn test_webp_and_bmp() {
        let encoded = encode(&red_square(2), CaptureFormat::Webp, Some(0.5)).unwrap();
        assert_eq!(&encoded.bytes[..4], b"RIFF");
        assert_eq!(encoded.quality, None);
        assert!(matches!(
            encode(&red_square(2), CaptureFormat::Bmp, None),
            Err(IoError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_mismatched_buffer() {
        let bad = RgbaSnapshot {
            width: 4,
            height: 4,
            data: vec![0; 3],
        };
        assert!(matches!(
            encode(&bad, CaptureFormat::Png, None),
            Err(IoError::EncodeFailed { format: "PNG", .. })
        ));
    }
}

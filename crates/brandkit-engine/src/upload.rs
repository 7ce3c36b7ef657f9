use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use sha2::{Digest, Sha256};

use crate::error::StudioError;

/// The brand image as the user supplied it, validated once up front.
#[derive(Debug, Clone)]
pub struct BrandUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub sha256: String,
}

impl BrandUpload {
    pub fn from_path(path: &Path, max_bytes: u64) -> Result<Self, StudioError> {
        let metadata = std::fs::metadata(path)
            .map_err(|err| StudioError::Upload(format!("cannot read {}: {err}", path.display())))?;
        if metadata.len() > max_bytes {
            return Err(oversize(metadata.len(), max_bytes));
        }
        let bytes = std::fs::read(path)
            .map_err(|err| StudioError::Upload(format!("cannot read {}: {err}", path.display())))?;
        let file_name = path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("upload")
            .to_string();
        Self::from_bytes(file_name, bytes, max_bytes)
    }

    pub fn from_bytes(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        max_bytes: u64,
    ) -> Result<Self, StudioError> {
        if bytes.is_empty() {
            return Err(StudioError::Upload("file is empty".to_string()));
        }
        if bytes.len() as u64 > max_bytes {
            return Err(oversize(bytes.len() as u64, max_bytes));
        }
        let format = image::guess_format(&bytes)
            .map_err(|_| StudioError::Upload("not a recognized image file".to_string()))?;
        let mime_type = match format {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Gif => "image/gif",
            other => {
                return Err(StudioError::Upload(format!(
                    "unsupported image format {other:?}; use PNG, JPEG, WebP or GIF"
                )))
            }
        };
        let decoded = image::load_from_memory_with_format(&bytes, format)
            .map_err(|err| StudioError::Upload(format!("image could not be decoded: {err}")))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let sha256 = hex::encode(hasher.finalize());

        Ok(Self {
            file_name: file_name.into(),
            mime_type: mime_type.to_string(),
            width: decoded.width(),
            height: decoded.height(),
            bytes,
            sha256,
        })
    }

    pub fn short_id(&self) -> &str {
        &self.sha256[..12.min(self.sha256.len())]
    }

    /// Bytes and MIME type to send for analysis: transparent pixels are
    /// flattened onto white and the image is shrunk to fit `max_dim`, then
    /// re-encoded as JPEG. Falls back to the original bytes if that fails.
    pub fn vision_payload(&self, max_dim: u32) -> (Vec<u8>, String) {
        let dim = max_dim.max(128);
        if let Ok(image) = image::load_from_memory(&self.bytes) {
            let rgba = image.to_rgba8();
            let mut flattened = RgbaImage::new(rgba.width(), rgba.height());
            for (x, y, pixel) in rgba.enumerate_pixels() {
                let alpha = u16::from(pixel[3]);
                let blend = |channel: u8| -> u8 {
                    (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
                };
                flattened.put_pixel(
                    x,
                    y,
                    Rgba([blend(pixel[0]), blend(pixel[1]), blend(pixel[2]), 255]),
                );
            }
            let mut flattened = DynamicImage::ImageRgba8(flattened);
            if flattened.width() > dim || flattened.height() > dim {
                flattened = flattened.resize(dim, dim, FilterType::Triangle);
            }
            let rgb = DynamicImage::ImageRgb8(flattened.to_rgb8());
            let mut out = Vec::new();
            let mut encoder = JpegEncoder::new_with_quality(&mut out, 90);
            if encoder.encode_image(&rgb).is_ok() {
                return (out, "image/jpeg".to_string());
            }
        }
        (self.bytes.clone(), self.mime_type.clone())
    }
}

fn oversize(size: u64, max_bytes: u64) -> StudioError {
    StudioError::Upload(format!(
        "file is {size} bytes; the limit is {max_bytes} bytes"
    ))
}

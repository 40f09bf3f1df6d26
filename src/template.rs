//! # Template Image
//!
//! Decodes an uploaded template image and scales it to fit the maximum
//! canvas box while preserving aspect ratio. The scaled size defines the
//! canvas raster dimensions for preview, hit-testing, and export. A template
//! is immutable once loaded; a new upload replaces it wholesale.

use image::{DynamicImage, RgbaImage, imageops::FilterType};

use crate::error::SelloError;

/// Upload size cap in bytes.
pub const MAX_TEMPLATE_BYTES: usize = 10 * 1024 * 1024;

/// Minimum decoded width/height in pixels.
pub const MIN_TEMPLATE_DIM: u32 = 50;

/// Maximum canvas bounding box the template is scaled to fit.
pub const MAX_CANVAS_WIDTH: u32 = 1000;
pub const MAX_CANVAS_HEIGHT: u32 = 700;

/// A decoded, canvas-sized template image.
#[derive(Debug, Clone)]
pub struct Template {
    image: RgbaImage,
}

impl Template {
    /// Decode and validate raw upload bytes.
    ///
    /// Rejects oversized files before decoding, undecodable bytes, and
    /// images smaller than [`MIN_TEMPLATE_DIM`] on either side. The decoded
    /// image is scaled down (never up) to fit the maximum canvas box.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SelloError> {
        if bytes.len() > MAX_TEMPLATE_BYTES {
            return Err(SelloError::InvalidInput(format!(
                "Template file is too large ({} bytes, limit {})",
                bytes.len(),
                MAX_TEMPLATE_BYTES
            )));
        }

        let decoded = image::load_from_memory(bytes)
            .map_err(|e| SelloError::Image(format!("Could not decode template image: {}", e)))?;

        Self::from_image(decoded)
    }

    /// Validate and scale an already-decoded image.
    pub fn from_image(decoded: DynamicImage) -> Result<Self, SelloError> {
        let (w, h) = (decoded.width(), decoded.height());
        if w < MIN_TEMPLATE_DIM || h < MIN_TEMPLATE_DIM {
            return Err(SelloError::InvalidInput(format!(
                "Template image is too small ({}x{}, minimum {}x{})",
                w, h, MIN_TEMPLATE_DIM, MIN_TEMPLATE_DIM
            )));
        }

        // Scale to fit the canvas box, preserving aspect ratio. Never
        // upscale: a small template keeps its native resolution.
        let scale = (MAX_CANVAS_WIDTH as f32 / w as f32)
            .min(MAX_CANVAS_HEIGHT as f32 / h as f32)
            .min(1.0);

        let image = if scale < 1.0 {
            let sw = ((w as f32 * scale).round() as u32).max(1);
            let sh = ((h as f32 * scale).round() as u32).max(1);
            decoded.resize_exact(sw, sh, FilterType::Lanczos3).to_rgba8()
        } else {
            decoded.to_rgba8()
        };

        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

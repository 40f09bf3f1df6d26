//! # Rendering Surface
//!
//! An RGBA raster surface plus the small set of drawing primitives the
//! render engine needs: template blitting, coverage-blended pixels for
//! glyph rasterization, and the dashed-outline/arc/cross affordances drawn
//! around a highlighted field.
//!
//! There is exactly one surface per session, reused sequentially; batch
//! export clears and redraws it once per data row.

use image::{Rgba, RgbaImage, imageops::FilterType};
use std::io::Cursor;

use crate::error::SelloError;

/// Parse a `#rrggbb` hex string into an opaque RGBA color.
///
/// Malformed strings fall back to black, mirroring how an interactive color
/// input degrades rather than failing a render.
pub fn parse_hex_color(hex: &str) -> Rgba<u8> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() == 6
        && let Ok(r) = u8::from_str_radix(&digits[0..2], 16)
        && let Ok(g) = u8::from_str_radix(&digits[2..4], 16)
        && let Ok(b) = u8::from_str_radix(&digits[4..6], 16)
    {
        return Rgba([r, g, b, 255]);
    }
    Rgba([0, 0, 0, 255])
}

/// RGBA drawing surface.
#[derive(Debug)]
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width.max(1), height.max(1), Rgba([255, 255, 255, 255])),
        }
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

    /// Fill the whole surface with one color.
    pub fn clear(&mut self, color: Rgba<u8>) {
        for px in self.image.pixels_mut() {
            *px = color;
        }
    }

    /// Draw a source image at the origin, scaled to the surface dimensions
    /// when they differ.
    pub fn draw_image(&mut self, source: &RgbaImage) {
        if source.dimensions() == self.image.dimensions() {
            self.image.copy_from_slice(source.as_raw());
        } else {
            let scaled = image::imageops::resize(
                source,
                self.width(),
                self.height(),
                FilterType::Triangle,
            );
            self.image.copy_from_slice(scaled.as_raw());
        }
    }

    /// Blend one pixel with the given coverage (0.0 = untouched,
    /// 1.0 = full color). Out-of-bounds coordinates are ignored.
    pub fn blend_px(&mut self, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
        if x < 0 || y < 0 || x >= self.width() as i32 || y >= self.height() as i32 {
            return;
        }
        let coverage = coverage.clamp(0.0, 1.0);
        if coverage <= 0.0 {
            return;
        }
        let px = self.image.get_pixel_mut(x as u32, y as u32);
        let a = coverage * (color.0[3] as f32 / 255.0);
        for c in 0..3 {
            let src = color.0[c] as f32;
            let dst = px.0[c] as f32;
            px.0[c] = (src * a + dst * (1.0 - a)).round() as u8;
        }
        px.0[3] = 255;
    }

    /// Plot a solid line by stepping along its longest axis.
    pub fn line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgba<u8>) {
        let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = x0 + (x1 - x0) * t;
            let y = y0 + (y1 - y0) * t;
            self.blend_px(x.round() as i32, y.round() as i32, color, 1.0);
        }
    }

    /// Plot a dashed line with the given on/off lengths in pixels.
    pub fn dashed_line(
        &mut self,
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
        dash: f32,
        gap: f32,
        color: Rgba<u8>,
    ) {
        let length = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        if length < 1.0 {
            return;
        }
        let period = dash + gap;
        let steps = length.ceil() as usize;
        for i in 0..=steps {
            let d = i as f32;
            if d % period < dash {
                let t = d / length;
                let x = x0 + (x1 - x0) * t;
                let y = y0 + (y1 - y0) * t;
                self.blend_px(x.round() as i32, y.round() as i32, color, 1.0);
            }
        }
    }

    /// Dashed rectangle outline.
    pub fn dashed_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba<u8>) {
        const DASH: f32 = 5.0;
        const GAP: f32 = 4.0;
        self.dashed_line(x, y, x + w, y, DASH, GAP, color);
        self.dashed_line(x + w, y, x + w, y + h, DASH, GAP, color);
        self.dashed_line(x + w, y + h, x, y + h, DASH, GAP, color);
        self.dashed_line(x, y + h, x, y, DASH, GAP, color);
    }

    /// Stroke a circular arc from `start` for `sweep` radians.
    pub fn stroke_arc(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        start: f32,
        sweep: f32,
        color: Rgba<u8>,
    ) {
        if radius < 1.0 {
            return;
        }
        // Sub-pixel angular step keeps the stroke gap-free.
        let step = 0.5 / radius;
        let mut theta = 0.0f32;
        while theta <= sweep {
            let a = start + theta;
            let x = cx + radius * a.cos();
            let y = cy + radius * a.sin();
            self.blend_px(x.round() as i32, y.round() as i32, color, 1.0);
            theta += step;
        }
    }

    /// Small cross marker centered on a point.
    pub fn cross(&mut self, cx: f32, cy: f32, arm: f32, color: Rgba<u8>) {
        self.line(cx - arm, cy, cx + arm, cy, color);
        self.line(cx, cy - arm, cx, cy + arm, color);
    }

    /// Encode the surface as PNG bytes.
    pub fn encode_png(&self) -> Result<Vec<u8>, SelloError> {
        let mut buf = Cursor::new(Vec::new());
        self.image
            .write_to(&mut buf, image::ImageFormat::Png)
            .map_err(|e| SelloError::Render(format!("PNG encoding failed: {}", e)))?;
        Ok(buf.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_hex_color ─────────────────────────────────────────────────

    #[test]
    fn parses_valid_hex() {
        assert_eq!(parse_hex_color("#ff8000"), Rgba([255, 128, 0, 255]));
        assert_eq!(parse_hex_color("00ff00"), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn malformed_hex_falls_back_to_black() {
        assert_eq!(parse_hex_color("#zzz"), Rgba([0, 0, 0, 255]));
        assert_eq!(parse_hex_color(""), Rgba([0, 0, 0, 255]));
        assert_eq!(parse_hex_color("#12345"), Rgba([0, 0, 0, 255]));
    }

    // ── drawing ─────────────────────────────────────────────────────────

    #[test]
    fn clear_fills_surface() {
        let mut c = Canvas::new(4, 4);
        c.clear(Rgba([10, 20, 30, 255]));
        assert_eq!(*c.image().get_pixel(3, 3), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn blend_px_ignores_out_of_bounds() {
        let mut c = Canvas::new(4, 4);
        c.blend_px(-1, 0, Rgba([0, 0, 0, 255]), 1.0);
        c.blend_px(4, 4, Rgba([0, 0, 0, 255]), 1.0);
        assert!(c.image().pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn blend_px_full_coverage_replaces_color() {
        let mut c = Canvas::new(2, 2);
        c.blend_px(0, 0, Rgba([0, 0, 0, 255]), 1.0);
        assert_eq!(*c.image().get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn blend_px_partial_coverage_mixes() {
        let mut c = Canvas::new(2, 2);
        c.blend_px(0, 0, Rgba([0, 0, 0, 255]), 0.5);
        let px = c.image().get_pixel(0, 0);
        assert!(px.0[0] > 100 && px.0[0] < 160, "got {:?}", px);
    }

    #[test]
    fn line_marks_endpoints() {
        let mut c = Canvas::new(10, 10);
        c.line(0.0, 0.0, 9.0, 9.0, Rgba([0, 0, 0, 255]));
        assert_eq!(*c.image().get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*c.image().get_pixel(9, 9), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn dashed_line_leaves_gaps() {
        let mut c = Canvas::new(40, 3);
        c.dashed_line(0.0, 1.0, 39.0, 1.0, 5.0, 4.0, Rgba([0, 0, 0, 255]));
        let drawn = (0..40)
            .filter(|&x| c.image().get_pixel(x, 1).0 == [0, 0, 0, 255])
            .count();
        assert!(drawn > 10 && drawn < 40, "drawn {} pixels", drawn);
    }

    #[test]
    fn draw_image_scales_mismatched_source() {
        let src = RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255]));
        let mut c = Canvas::new(4, 4);
        c.draw_image(&src);
        assert_eq!(*c.image().get_pixel(2, 2), Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn encode_png_produces_signature() {
        let c = Canvas::new(3, 3);
        let png = c.encode_png().unwrap();
        assert_eq!(&png[0..4], &[0x89, b'P', b'N', b'G']);
    }
}

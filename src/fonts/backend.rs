//! Text measurement and glyph rasterization.
//!
//! Hit-testing and rendering both depend on a `TextBackend`: measure a
//! string at a family/size, or draw it onto the surface at a baseline
//! anchor. The production backend rasterizes TTF outlines with `ab_glyph`;
//! the fixed backend is a headless metrics stub with deterministic widths
//! for tests.

use ab_glyph::{Font, FontArc, ScaleFont};
use image::Rgba;
use std::sync::Arc;

use super::FontBook;
use crate::canvas::Canvas;
use crate::error::SelloError;
use crate::registry::DEFAULT_FAMILY;

/// Measured extents of a single-line string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextSize {
    pub width: f32,
    pub height: f32,
}

/// Measurement + drawing capability for single-line text.
///
/// `draw` renders left-to-right from `origin_x` with the baseline at
/// `baseline_y`; alignment shifts are the caller's concern.
pub trait TextBackend: Send + Sync {
    fn measure(&self, family: &str, size_pt: f32, text: &str) -> TextSize;

    fn draw(
        &self,
        canvas: &mut Canvas,
        family: &str,
        size_pt: f32,
        color: Rgba<u8>,
        origin_x: f32,
        baseline_y: f32,
        text: &str,
    ) -> Result<(), SelloError>;
}

/// Production backend over loaded TTF fonts.
///
/// Family resolution falls back to the default family, then to any loaded
/// font, so a half-verified catalog still measures and draws. When nothing
/// is loaded at all, `measure` estimates from the point size and `draw`
/// fails with a font error.
pub struct GlyphTextBackend {
    book: Arc<FontBook>,
}

impl GlyphTextBackend {
    pub fn new(book: Arc<FontBook>) -> Self {
        Self { book }
    }

    fn resolve(&self, family: &str) -> Option<FontArc> {
        self.book
            .get(family)
            .or_else(|| self.book.get(DEFAULT_FAMILY))
            .or_else(|| self.book.any())
    }
}

impl TextBackend for GlyphTextBackend {
    fn measure(&self, family: &str, size_pt: f32, text: &str) -> TextSize {
        match self.resolve(family) {
            Some(font) => {
                let scaled = font.as_scaled(size_pt);
                let width: f32 = text
                    .chars()
                    .map(|ch| scaled.h_advance(font.glyph_id(ch)))
                    .sum();
                TextSize {
                    width,
                    height: scaled.ascent() - scaled.descent(),
                }
            }
            // No font loaded yet: rough estimate keeps hit boxes usable.
            None => estimate_size(size_pt, text),
        }
    }

    fn draw(
        &self,
        canvas: &mut Canvas,
        family: &str,
        size_pt: f32,
        color: Rgba<u8>,
        origin_x: f32,
        baseline_y: f32,
        text: &str,
    ) -> Result<(), SelloError> {
        let Some(font) = self.resolve(family) else {
            return Err(SelloError::Font(format!(
                "No usable font loaded for '{}' and no fallback is available",
                family
            )));
        };

        let scaled = font.as_scaled(size_pt);
        let mut caret_x = origin_x;

        for ch in text.chars() {
            let glyph_id = font.glyph_id(ch);
            let advance = scaled.h_advance(glyph_id);
            let glyph =
                glyph_id.with_scale_and_position(size_pt, ab_glyph::point(caret_x, baseline_y));

            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|px, py, coverage| {
                    let x = px as i32 + bounds.min.x as i32;
                    let y = py as i32 + bounds.min.y as i32;
                    canvas.blend_px(x, y, color, coverage);
                });
            }
            caret_x += advance;
        }

        Ok(())
    }
}

fn estimate_size(size_pt: f32, text: &str) -> TextSize {
    TextSize {
        width: size_pt * 0.6 * text.chars().count() as f32,
        height: size_pt,
    }
}

/// Headless fixed-advance backend.
///
/// Every character advances `0.6 * size` and text stands `size` tall, so
/// hit boxes and alignment shifts are exact in tests. `draw` fills the text
/// box; an optional poison marker makes drawing fail for rows that should
/// simulate a render error.
#[derive(Default)]
pub struct FixedTextBackend {
    fail_marker: Option<String>,
}

impl FixedTextBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any `draw` whose text contains `marker`.
    pub fn failing_on(marker: impl Into<String>) -> Self {
        Self {
            fail_marker: Some(marker.into()),
        }
    }
}

impl TextBackend for FixedTextBackend {
    fn measure(&self, _family: &str, size_pt: f32, text: &str) -> TextSize {
        estimate_size(size_pt, text)
    }

    fn draw(
        &self,
        canvas: &mut Canvas,
        family: &str,
        size_pt: f32,
        color: Rgba<u8>,
        origin_x: f32,
        baseline_y: f32,
        text: &str,
    ) -> Result<(), SelloError> {
        if let Some(marker) = &self.fail_marker
            && text.contains(marker.as_str())
        {
            return Err(SelloError::Render(format!(
                "simulated draw failure for '{}'",
                text
            )));
        }

        let size = self.measure(family, size_pt, text);
        let x0 = origin_x.round() as i32;
        let y0 = (baseline_y - size.height).round() as i32;
        for y in y0..(baseline_y.round() as i32) {
            for x in x0..(x0 + size.width.round() as i32) {
                canvas.blend_px(x, y, color, 1.0);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_backend_has_deterministic_metrics() {
        let backend = FixedTextBackend::new();
        let size = backend.measure("Inter", 20.0, "abcd");
        assert_eq!(size, TextSize { width: 48.0, height: 20.0 });
    }

    #[test]
    fn fixed_backend_draw_fills_text_box() {
        let backend = FixedTextBackend::new();
        let mut canvas = Canvas::new(60, 40);
        backend
            .draw(
                &mut canvas,
                "Inter",
                10.0,
                Rgba([0, 0, 0, 255]),
                5.0,
                30.0,
                "hi",
            )
            .unwrap();
        // Inside the box.
        assert_eq!(canvas.image().get_pixel(8, 25).0, [0, 0, 0, 255]);
        // Outside the box.
        assert_eq!(canvas.image().get_pixel(40, 25).0, [255, 255, 255, 255]);
    }

    #[test]
    fn fixed_backend_fail_marker_poisons_draw() {
        let backend = FixedTextBackend::failing_on("BOOM");
        let mut canvas = Canvas::new(10, 10);
        let err = backend
            .draw(
                &mut canvas,
                "Inter",
                10.0,
                Rgba([0, 0, 0, 255]),
                0.0,
                9.0,
                "xBOOMx",
            )
            .unwrap_err();
        assert!(matches!(err, SelloError::Render(_)));
    }

    #[test]
    fn glyph_backend_estimates_without_fonts() {
        let backend = GlyphTextBackend::new(Arc::new(FontBook::default()));
        let size = backend.measure("Inter", 30.0, "ab");
        assert_eq!(size.width, 36.0);
        assert_eq!(size.height, 30.0);
    }

    #[test]
    fn glyph_backend_draw_without_fonts_is_a_font_error() {
        let backend = GlyphTextBackend::new(Arc::new(FontBook::default()));
        let mut canvas = Canvas::new(10, 10);
        let err = backend
            .draw(
                &mut canvas,
                "Inter",
                10.0,
                Rgba([0, 0, 0, 255]),
                0.0,
                9.0,
                "x",
            )
            .unwrap_err();
        assert!(matches!(err, SelloError::Font(_)));
    }
}

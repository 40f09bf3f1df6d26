//! # Render Engine
//!
//! Draws the template plus all active fields onto the raster surface for
//! one data row. The same engine serves the live preview (sample row,
//! optional loading-highlight affordance) and batch export (per-row values,
//! never highlighted).
//!
//! Rendering is a pure function of (registry, font state, row, time): the
//! animation loop only supplies the angle and triggers redraws, it owns no
//! drawing logic.

use image::Rgba;
use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use crate::canvas::{Canvas, parse_hex_color};
use crate::dataset::Row;
use crate::error::SelloError;
use crate::fonts::{FontService, TextBackend};
use crate::registry::{Alignment, DEFAULT_FAMILY, FieldRegistry, Position, TextStyle};
use crate::template::Template;

/// Accent color for the highlight affordance (dashed box, anchor marker,
/// spinner).
const HIGHLIGHT_COLOR: Rgba<u8> = Rgba([79, 70, 229, 255]);

/// Color of the animated loading placeholder text.
const LOADING_TEXT_COLOR: Rgba<u8> = Rgba([136, 136, 136, 255]);

/// Padding around the highlighted field's measured box.
const HIGHLIGHT_PADDING: f32 = 10.0;

/// Text resolution policy for missing row values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Nullish values fall back to the field name itself.
    Preview,
    /// Nullish values render as the literal `"N/A"`.
    Export,
}

/// A field currently waiting on a font load, plus the animation angle that
/// drives the placeholder dots and spinner rotation.
#[derive(Debug, Clone)]
pub struct Highlight {
    pub field: String,
    pub angle: f32,
}

/// Resolve the text a field displays for a given row and mode.
pub fn display_text(name: &str, row: Option<&Row>, mode: RenderMode) -> String {
    match row.and_then(|r| r.get(name)).filter(|v| !v.is_empty()) {
        Some(value) => value.to_string(),
        None => match mode {
            RenderMode::Preview => name.to_string(),
            RenderMode::Export => "N/A".to_string(),
        },
    }
}

/// Shift a left edge so the measured width sits left/center/right of the
/// anchor x.
pub fn aligned_origin(anchor_x: f32, width: f32, alignment: Alignment) -> f32 {
    match alignment {
        Alignment::Left => anchor_x,
        Alignment::Center => anchor_x - width / 2.0,
        Alignment::Right => anchor_x - width,
    }
}

/// Dot count for the animated "Loading" placeholder: cycles 0–3 as the
/// animation angle sweeps quarter turns.
fn loading_dots(angle: f32) -> usize {
    ((angle / FRAC_PI_2).floor().max(0.0) as usize) % 4
}

pub struct RenderEngine {
    backend: Arc<dyn TextBackend>,
    fonts: Arc<FontService>,
}

impl RenderEngine {
    pub fn new(backend: Arc<dyn TextBackend>, fonts: Arc<FontService>) -> Self {
        Self { backend, fonts }
    }

    pub fn backend(&self) -> &dyn TextBackend {
        self.backend.as_ref()
    }

    /// Clear the surface, draw the template scaled to it, then draw every
    /// active field in registry order.
    ///
    /// The highlight affordance only applies in preview mode and only while
    /// the highlighted field's family is actually in a loading wait state;
    /// the export path never passes one.
    pub fn render(
        &self,
        surface: &mut Canvas,
        template: &Template,
        registry: &FieldRegistry,
        row: Option<&Row>,
        mode: RenderMode,
        highlight: Option<&Highlight>,
    ) -> Result<(), SelloError> {
        surface.clear(Rgba([255, 255, 255, 255]));
        surface.draw_image(template.image());

        for name in registry.active_names() {
            let (Some(pos), Some(style)) = (registry.position(name), registry.style(name)) else {
                continue;
            };

            let waiting = mode == RenderMode::Preview
                && highlight.is_some_and(|h| h.field == name)
                && self.fonts.is_loading(&style.font_family);
            if waiting {
                let angle = highlight.map(|h| h.angle).unwrap_or_default();
                self.draw_loading_highlight(surface, &pos, style, angle)?;
                continue;
            }

            let text = display_text(name, row, mode);
            let size = self
                .backend
                .measure(&style.font_family, style.size_pt, &text);
            let origin_x = aligned_origin(pos.x, size.width, style.alignment);
            self.backend.draw(
                surface,
                &style.font_family,
                style.size_pt,
                parse_hex_color(&style.color_hex),
                origin_x,
                pos.y,
                &text,
            )?;
        }

        Ok(())
    }

    /// Animated placeholder for a field whose font is still loading: dotted
    /// "Loading" text in the fallback family, a dashed outline, an anchor
    /// marker, and a rotating arc spinner.
    fn draw_loading_highlight(
        &self,
        surface: &mut Canvas,
        pos: &Position,
        style: &TextStyle,
        angle: f32,
    ) -> Result<(), SelloError> {
        let text = format!("Loading{}", ".".repeat(loading_dots(angle)));
        let size = self.backend.measure(DEFAULT_FAMILY, style.size_pt, &text);
        let origin_x = aligned_origin(pos.x, size.width, style.alignment);
        self.backend.draw(
            surface,
            DEFAULT_FAMILY,
            style.size_pt,
            LOADING_TEXT_COLOR,
            origin_x,
            pos.y,
            &text,
        )?;

        let box_x = origin_x - HIGHLIGHT_PADDING;
        let box_y = pos.y - size.height - HIGHLIGHT_PADDING;
        let box_w = size.width + 2.0 * HIGHLIGHT_PADDING;
        let box_h = size.height + 2.0 * HIGHLIGHT_PADDING;
        surface.dashed_rect(box_x, box_y, box_w, box_h, HIGHLIGHT_COLOR);
        surface.cross(pos.x, pos.y, 6.0, HIGHLIGHT_COLOR);
        surface.stroke_arc(
            box_x + box_w + 16.0,
            pos.y - size.height / 2.0,
            8.0,
            angle,
            1.5 * std::f32::consts::PI,
            HIGHLIGHT_COLOR,
        );

        Ok(())
    }
}

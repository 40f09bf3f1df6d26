//! # Hit-Test & Drag Controller
//!
//! Maps pointer coordinates to a field and manages interactive
//! repositioning. Hit boxes account for alignment: the measured text box is
//! shifted left by half or all of its width for center/right alignment,
//! then padded on all sides. Active fields are tested in insertion order
//! and the first match wins — fields rarely overlap in practice, but ties
//! resolve deterministically rather than nearest-to-cursor.
//!
//! A drag records the pointer's offset from the field anchor on
//! pointer-down, so the anchor (not the pointer) is what moves and the
//! field never jumps on drag start. Positions update live on every
//! pointer-move, clamped to the canvas; pointer-up ends the drag and asks
//! for a fast-path save.

use crate::dataset::Row;
use crate::fonts::TextBackend;
use crate::registry::FieldRegistry;
use crate::render::{RenderMode, aligned_origin, display_text};

/// Padding added around the measured text box on all sides.
pub const HIT_PADDING: f32 = 10.0;

/// Vertical margin kept between a dragged baseline and the canvas edges.
pub const DRAG_Y_MARGIN: f32 = 20.0;

/// Alignment-adjusted, padded bounding box of one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl FieldBox {
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.w && py >= self.y && py <= self.y + self.h
    }
}

/// Compute the hit box for one field, measuring its preview text at its
/// configured font and size.
pub fn field_box(
    registry: &FieldRegistry,
    backend: &dyn TextBackend,
    row: Option<&Row>,
    name: &str,
) -> Option<FieldBox> {
    let pos = registry.position(name)?;
    let style = registry.style(name)?;
    let text = display_text(name, row, RenderMode::Preview);
    let size = backend.measure(&style.font_family, style.size_pt, &text);
    let origin_x = aligned_origin(pos.x, size.width, style.alignment);
    Some(FieldBox {
        x: origin_x - HIT_PADDING,
        y: pos.y - size.height - HIT_PADDING,
        w: size.width + 2.0 * HIT_PADDING,
        h: size.height + 2.0 * HIT_PADDING,
    })
}

/// Test active fields in insertion order; first containing box wins.
/// Pure: no registry or controller state changes.
pub fn hit_test(
    registry: &FieldRegistry,
    backend: &dyn TextBackend,
    row: Option<&Row>,
    px: f32,
    py: f32,
) -> Option<String> {
    let name = registry.active_names().find(|name| {
        field_box(registry, backend, row, name)
            .is_some_and(|b| b.contains(px, py))
    })?;
    Some(name.to_string())
}

/// What a pointer-move did.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerEffect {
    /// A dragged field moved; the preview needs a redraw.
    Moved(String),
    /// Not dragging: the hovered field (if any) for cursor affordance.
    Hover(Option<String>),
}

#[derive(Debug)]
struct DragState {
    field: String,
    grab_dx: f32,
    grab_dy: f32,
}

/// Interactive repositioning state machine.
#[derive(Debug, Default)]
pub struct DragController {
    drag: Option<DragState>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field currently being dragged, if any.
    pub fn dragging(&self) -> Option<&str> {
        self.drag.as_ref().map(|s| s.field.as_str())
    }

    /// Start a drag if the pointer lands on a field. Records the grab
    /// offset from the anchor so subsequent moves update the anchor
    /// without a jump.
    pub fn pointer_down(
        &mut self,
        registry: &FieldRegistry,
        backend: &dyn TextBackend,
        row: Option<&Row>,
        px: f32,
        py: f32,
    ) -> Option<String> {
        let field = hit_test(registry, backend, row, px, py)?;
        let pos = registry.position(&field)?;
        self.drag = Some(DragState {
            field: field.clone(),
            grab_dx: px - pos.x,
            grab_dy: py - pos.y,
        });
        Some(field)
    }

    /// While dragging, move the anchor live (clamped to the canvas); when
    /// not dragging, report the hovered field without mutating anything.
    pub fn pointer_move(
        &mut self,
        registry: &mut FieldRegistry,
        backend: &dyn TextBackend,
        row: Option<&Row>,
        px: f32,
        py: f32,
        canvas_w: f32,
        canvas_h: f32,
    ) -> PointerEffect {
        match &self.drag {
            Some(state) => {
                let x = (px - state.grab_dx).clamp(0.0, canvas_w);
                let y_max = (canvas_h - DRAG_Y_MARGIN).max(DRAG_Y_MARGIN);
                let y = (py - state.grab_dy).clamp(DRAG_Y_MARGIN, y_max);
                registry.set_position(&state.field, x, y);
                PointerEffect::Moved(state.field.clone())
            }
            None => PointerEffect::Hover(hit_test(registry, backend, row, px, py)),
        }
    }

    /// End the drag. Returns the moved field so the caller can request a
    /// fast-path save of its final position.
    pub fn pointer_up(&mut self) -> Option<String> {
        self.drag.take().map(|s| s.field)
    }
}

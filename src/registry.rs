//! # Field Registry
//!
//! Owns the set of field names bound to dataset columns, their anchor
//! positions on the canvas, and their text styles. Pure data plus invariant
//! enforcement: after `load_fields`, every field has exactly one position,
//! one style, and an active flag, and the three stay in sync through every
//! mutation.
//!
//! All mutators are silent no-ops for unknown field names. UI state can race
//! with registry resets (a pending edit may arrive after a new dataset
//! replaced the fields), so an unknown name must never be an error.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default font family assigned to freshly loaded fields. Also the
/// guaranteed fallback when a requested family fails to load.
pub const DEFAULT_FAMILY: &str = "Inter";

/// Default font size in points for freshly loaded fields.
pub const DEFAULT_SIZE_PT: f32 = 24.0;

/// Default text color for freshly loaded fields.
pub const DEFAULT_COLOR: &str = "#000000";

/// Vertical spacing between default field positions.
const DEFAULT_ROW_STEP: f32 = 60.0;

/// Anchor point in canvas pixel space. `y` is the text baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Horizontal text alignment relative to the anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Text style for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_family: String,
    pub size_pt: f32,
    pub alignment: Alignment,
    pub color_hex: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: DEFAULT_FAMILY.to_string(),
            size_pt: DEFAULT_SIZE_PT,
            alignment: Alignment::Left,
            color_hex: DEFAULT_COLOR.to_string(),
        }
    }
}

/// Partial style update. `None` fields leave the current value untouched.
#[derive(Debug, Clone, Default)]
pub struct StylePatch {
    pub font_family: Option<String>,
    pub size_pt: Option<f32>,
    pub alignment: Option<Alignment>,
    pub color_hex: Option<String>,
}

/// Registry of positioned, styled text fields keyed by column name.
///
/// `names` preserves dataset header order; hit-testing and rendering both
/// iterate in this insertion order so ties resolve deterministically.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    names: Vec<String>,
    positions: HashMap<String, Position>,
    styles: HashMap<String, TextStyle>,
    active: HashMap<String, bool>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default position for the field at header index `index`.
    ///
    /// Intentionally unclamped: for large field counts the y coordinate can
    /// exceed the canvas height. Interactive moves clamp; loads and resets
    /// do not.
    pub fn default_position(index: usize) -> Position {
        Position {
            x: 100.0,
            y: 100.0 + DEFAULT_ROW_STEP * index as f32,
        }
    }

    /// Reset the registry to hold exactly `names`, each with a default
    /// position, default style, and active flag set.
    ///
    /// Duplicate names keep their first occurrence; header columns are
    /// unique by contract so later duplicates are dropped.
    pub fn load_fields<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.clear();
        self.positions.clear();
        self.styles.clear();
        self.active.clear();

        for name in names {
            let name = name.into();
            if self.positions.contains_key(&name) {
                continue;
            }
            let index = self.names.len();
            self.positions
                .insert(name.clone(), Self::default_position(index));
            self.styles.insert(name.clone(), TextStyle::default());
            self.active.insert(name.clone(), true);
            self.names.push(name);
        }
    }

    pub fn set_position(&mut self, name: &str, x: f32, y: f32) {
        if let Some(pos) = self.positions.get_mut(name) {
            *pos = Position { x, y };
        }
    }

    pub fn set_style(&mut self, name: &str, patch: StylePatch) {
        if let Some(style) = self.styles.get_mut(name) {
            if let Some(family) = patch.font_family {
                style.font_family = family;
            }
            if let Some(size) = patch.size_pt {
                style.size_pt = size;
            }
            if let Some(align) = patch.alignment {
                style.alignment = align;
            }
            if let Some(color) = patch.color_hex {
                style.color_hex = color;
            }
        }
    }

    pub fn set_active(&mut self, name: &str, active: bool) {
        if let Some(flag) = self.active.get_mut(name) {
            *flag = active;
        }
    }

    /// Restore the default position of one field. Style and active flag
    /// are untouched.
    pub fn reset_one(&mut self, name: &str) {
        if let Some(index) = self.names.iter().position(|n| n == name) {
            self.positions
                .insert(name.to_string(), Self::default_position(index));
        }
    }

    /// Restore default positions for every field. Styles and the active set
    /// are preserved.
    pub fn reset_all(&mut self) {
        for (index, name) in self.names.iter().enumerate() {
            self.positions
                .insert(name.clone(), Self::default_position(index));
        }
    }

    // ── queries ─────────────────────────────────────────────────────────

    pub fn has(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn position(&self, name: &str) -> Option<Position> {
        self.positions.get(name).copied()
    }

    pub fn style(&self, name: &str) -> Option<&TextStyle> {
        self.styles.get(name)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.get(name).copied().unwrap_or(false)
    }

    /// All field names in header (insertion) order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Active field names in header order.
    pub fn active_names(&self) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .filter(|n| self.is_active(n))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

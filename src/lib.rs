//! # Sello - Mail-Merge Image Generator
//!
//! Sello turns a tabular dataset and a template image into one rendered
//! PNG per row, packed into a ZIP archive. It provides:
//!
//! - **Field layout**: per-column anchor positions, styles, and toggles
//! - **Interactive placement**: hit-testing and drag with canvas clamping
//! - **Font management**: remote Google Fonts loading with timeouts and
//!   a persisted rejection list
//! - **Batch export**: cooperative row-by-row rendering into a ZIP
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sello::{Session, persist::FileStore};
//!
//! # async fn demo() -> Result<(), sello::SelloError> {
//! let store = Arc::new(FileStore::open("sello-state.json"));
//! let mut session = Session::over_http(store)?;
//!
//! session.load_template(&std::fs::read("template.png")?)?;
//! session.load_dataset(&std::fs::read("guests.csv")?)?;
//! session.set_field_position("name", 320.0, 180.0);
//!
//! let outcome = session.export_all(|done, total| {
//!     println!("{}/{}", done, total);
//! }).await?;
//! std::fs::write("out.zip", &outcome.archive)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`session`] | Editing session owning all state |
//! | [`registry`] | Field positions, styles, active flags |
//! | [`dataset`] | CSV parsing and typed cell values |
//! | [`template`] | Template decoding and fit-to-canvas scaling |
//! | [`fonts`] | Font catalog, loading, text backends |
//! | [`canvas`] | RGBA drawing surface and primitives |
//! | [`render`] | Preview and export row rendering |
//! | [`controller`] | Hit-testing and drag control |
//! | [`export`] | Batch pipeline and ZIP writer |
//! | [`persist`] | Layout persistence and debounced saves |
//! | [`error`] | Error types |

pub mod canvas;
pub mod controller;
pub mod dataset;
pub mod error;
pub mod export;
pub mod fonts;
pub mod persist;
pub mod registry;
pub mod render;
pub mod session;
pub mod template;

pub use canvas::Canvas;
pub use controller::{DragController, PointerEffect};
pub use dataset::{Dataset, Row, Scalar};
pub use error::SelloError;
pub use export::{ExportOutcome, ExportReport};
pub use fonts::{FontOutcome, FontService, VerifyReport};
pub use registry::{Alignment, FieldRegistry, Position, StylePatch, TextStyle};
pub use render::{Highlight, RenderEngine, RenderMode};
pub use session::Session;
pub use template::Template;

//! # Editing Session
//!
//! One explicit context object owning the registry, font service, drag
//! controller, template, and dataset — no ambient globals. All public
//! operations report success or failure with a human-readable reason;
//! validation failures never mutate prior state.
//!
//! Layout mutations schedule a debounced persistence write; drag-end and
//! explicit resets request the shorter fast-path save.

use std::sync::Arc;

use crate::canvas::Canvas;
use crate::controller::{DragController, PointerEffect};
use crate::dataset::Dataset;
use crate::error::SelloError;
use crate::export::{self, ExportOutcome};
use crate::fonts::{
    FontBook, FontOutcome, FontService, GlyphTextBackend, RemoteFontProvider, TextBackend,
    VerifyReport,
};
use crate::persist::{self, DebouncedSaver, KvStore, LayoutRecord};
use crate::registry::{DEFAULT_FAMILY, FieldRegistry, StylePatch};
use crate::render::{Highlight, RenderEngine, RenderMode};
use crate::template::Template;

pub struct Session {
    registry: FieldRegistry,
    dataset: Option<Dataset>,
    template: Option<Template>,
    fonts: Arc<FontService>,
    engine: RenderEngine,
    drag: DragController,
    saver: DebouncedSaver,
    store: Arc<dyn KvStore>,
}

impl Session {
    /// Assemble a session from explicit parts. Tests inject headless
    /// backends and in-memory stores here.
    pub fn new(
        fonts: Arc<FontService>,
        backend: Arc<dyn TextBackend>,
        store: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            registry: FieldRegistry::new(),
            dataset: None,
            template: None,
            engine: RenderEngine::new(backend, fonts.clone()),
            fonts,
            drag: DragController::new(),
            saver: DebouncedSaver::new(store.clone()),
            store,
        }
    }

    /// Production wiring: remote font acquisition over HTTP and glyph
    /// rasterization sharing one font book.
    pub fn over_http(store: Arc<dyn KvStore>) -> Result<Self, SelloError> {
        let book = Arc::new(FontBook::default());
        let provider = Arc::new(RemoteFontProvider::new(book.clone())?);
        let fonts = Arc::new(FontService::new(provider, store.clone()));
        let backend = Arc::new(GlyphTextBackend::new(book));
        Ok(Self::new(fonts, backend, store))
    }

    // ── loading ─────────────────────────────────────────────────────────

    /// Parse and install a new dataset. Replaces the field registry
    /// wholesale (reset-on-load), then re-applies any saved positions and
    /// styles for field names present in the persisted layout.
    pub fn load_dataset(&mut self, bytes: &[u8]) -> Result<(), SelloError> {
        let dataset = Dataset::from_csv_bytes(bytes)?;
        self.registry.load_fields(dataset.header().iter().cloned());
        self.apply_saved_layout();
        self.dataset = Some(dataset);
        self.drag = DragController::new();
        Ok(())
    }

    /// Decode, validate, and install a new template image, replacing any
    /// previous one.
    pub fn load_template(&mut self, bytes: &[u8]) -> Result<(), SelloError> {
        self.template = Some(Template::from_bytes(bytes)?);
        Ok(())
    }

    fn apply_saved_layout(&mut self) {
        let Some(record) = persist::load_layout(self.store.as_ref()) else {
            return;
        };
        for (name, pos) in &record.positions {
            self.registry.set_position(name, pos.x, pos.y);
        }
        for (name, style) in &record.text_styles {
            self.registry.set_style(
                name,
                StylePatch {
                    font_family: Some(style.font_family.clone()),
                    size_pt: Some(style.size_pt),
                    alignment: Some(style.alignment),
                    color_hex: Some(style.color_hex.clone()),
                },
            );
        }
    }

    // ── field mutation ──────────────────────────────────────────────────

    pub fn set_field_position(&mut self, name: &str, x: f32, y: f32) {
        self.registry.set_position(name, x, y);
        self.saver.schedule(LayoutRecord::from_registry(&self.registry));
    }

    /// Apply a partial style update (size, alignment, color). Font family
    /// changes go through [`Session::set_field_font`], which owns the
    /// load-and-fallback policy.
    pub fn set_field_style(&mut self, name: &str, patch: StylePatch) {
        self.registry.set_style(name, patch);
        self.saver.schedule(LayoutRecord::from_registry(&self.registry));
    }

    pub fn set_field_active(&mut self, name: &str, active: bool) {
        self.registry.set_active(name, active);
        self.saver.schedule(LayoutRecord::from_registry(&self.registry));
    }

    /// Change a field's font family, loading it first. When the load fails
    /// or times out the field falls back to the default family and the
    /// failure is surfaced to the caller — never silently substituted.
    pub async fn set_field_font(&mut self, name: &str, family: &str) -> Result<(), SelloError> {
        let outcome = self.fonts.ensure_loaded(family).await;
        let applied = if outcome.is_loaded() {
            family
        } else {
            DEFAULT_FAMILY
        };
        self.registry.set_style(
            name,
            StylePatch {
                font_family: Some(applied.to_string()),
                ..Default::default()
            },
        );
        self.saver.schedule(LayoutRecord::from_registry(&self.registry));

        match outcome {
            FontOutcome::Loaded => Ok(()),
            FontOutcome::Rejected(reason) => Err(SelloError::Font(format!(
                "'{}' is unavailable ({}); using {} instead",
                family, reason, DEFAULT_FAMILY
            ))),
            FontOutcome::TimedOut => Err(SelloError::Font(format!(
                "'{}' timed out while loading; using {} instead",
                family, DEFAULT_FAMILY
            ))),
        }
    }

    pub fn reset_field(&mut self, name: &str) {
        self.registry.reset_one(name);
        self.saver
            .schedule_fast(LayoutRecord::from_registry(&self.registry));
    }

    pub fn reset_all_fields(&mut self) {
        self.registry.reset_all();
        self.saver
            .schedule_fast(LayoutRecord::from_registry(&self.registry));
    }

    // ── pointer events ──────────────────────────────────────────────────

    /// Pointer events are inert until a template defines the canvas.
    pub fn pointer_down(&mut self, px: f32, py: f32) -> Option<String> {
        self.template.as_ref()?;
        let row = self.dataset.as_ref().and_then(|d| d.sample_row());
        self.drag
            .pointer_down(&self.registry, self.engine.backend(), row, px, py)
    }

    pub fn pointer_move(&mut self, px: f32, py: f32) -> PointerEffect {
        let Some(template) = &self.template else {
            return PointerEffect::Hover(None);
        };
        let (w, h) = (template.width() as f32, template.height() as f32);
        let row = self.dataset.as_ref().and_then(|d| d.sample_row());
        self.drag.pointer_move(
            &mut self.registry,
            self.engine.backend(),
            row,
            px,
            py,
            w,
            h,
        )
    }

    /// End a drag; the final position gets a fast-path save.
    pub fn pointer_up(&mut self) -> Option<String> {
        let moved = self.drag.pointer_up();
        if moved.is_some() {
            self.saver
                .schedule_fast(LayoutRecord::from_registry(&self.registry));
        }
        moved
    }

    // ── fonts ───────────────────────────────────────────────────────────

    /// Startup verification pass over the whole catalog.
    pub async fn verify_fonts(&self) -> VerifyReport {
        self.fonts.verify_catalog().await
    }

    pub fn search_fonts(&self, needle: &str) -> Vec<String> {
        self.fonts.search(needle)
    }

    pub fn fonts(&self) -> &Arc<FontService> {
        &self.fonts
    }

    // ── rendering / export ──────────────────────────────────────────────

    /// Render the live preview (sample row) to a fresh surface.
    pub fn preview(&self, highlight: Option<&Highlight>) -> Result<Canvas, SelloError> {
        let template = self.template.as_ref().ok_or_else(|| {
            SelloError::InvalidInput("Load a template image before previewing".to_string())
        })?;
        let mut surface = Canvas::new(template.width(), template.height());
        let row = self.dataset.as_ref().and_then(|d| d.sample_row());
        self.engine.render(
            &mut surface,
            template,
            &self.registry,
            row,
            RenderMode::Preview,
            highlight,
        )?;
        Ok(surface)
    }

    /// Export every row into a finalized archive.
    pub async fn export_all(
        &self,
        progress: impl FnMut(usize, usize),
    ) -> Result<ExportOutcome, SelloError> {
        let template = self.template.as_ref().ok_or_else(|| {
            SelloError::InvalidInput("Load a template image before exporting".to_string())
        })?;
        let dataset = self.dataset.as_ref().ok_or_else(|| {
            SelloError::InvalidInput("Load a dataset before exporting".to_string())
        })?;
        export::export_all(&self.engine, template, &self.registry, dataset, progress).await
    }

    // ── accessors ───────────────────────────────────────────────────────

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::{FixedTextBackend, FontProvider};
    use crate::persist::{MemoryStore, load_layout};
    use crate::registry::Position;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const CSV: &str = "name,title\nAda,Countess\nGrace,Admiral\n";

    struct NullProvider;

    #[async_trait]
    impl FontProvider for NullProvider {
        async fn acquire(&self, _family: &str) -> Result<(), SelloError> {
            Ok(())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl FontProvider for FailingProvider {
        async fn acquire(&self, family: &str) -> Result<(), SelloError> {
            Err(SelloError::Font(format!("no bytes for {}", family)))
        }
    }

    fn session_with(provider: Arc<dyn FontProvider>, store: Arc<MemoryStore>) -> Session {
        let fonts = Arc::new(FontService::new(provider, store.clone()));
        Session::new(fonts, Arc::new(FixedTextBackend::new()), store)
    }

    fn session() -> Session {
        session_with(Arc::new(NullProvider), Arc::new(MemoryStore::new()))
    }

    fn template_png() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            300,
            200,
            image::Rgba([255, 255, 255, 255]),
        ));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn load_dataset_populates_registry_from_header() {
        let mut s = session();
        s.load_dataset(CSV.as_bytes()).unwrap();
        assert_eq!(s.registry().names().collect::<Vec<_>>(), vec!["name", "title"]);
        assert!(s.registry().is_active("name"));
    }

    #[tokio::test]
    async fn dataset_parse_failure_leaves_prior_state() {
        let mut s = session();
        s.load_dataset(CSV.as_bytes()).unwrap();
        s.set_field_position("name", 9.0, 9.0);

        let err = s.load_dataset(b"only,a,header\n").unwrap_err();
        assert!(matches!(err, SelloError::InvalidInput(_)));
        // Prior dataset and registry untouched.
        assert_eq!(s.dataset().unwrap().len(), 2);
        assert_eq!(s.registry().position("name").unwrap(), Position { x: 9.0, y: 9.0 });
    }

    #[tokio::test]
    async fn saved_layout_is_reapplied_on_load() {
        let store = Arc::new(MemoryStore::new());
        {
            let mut first = session_with(Arc::new(NullProvider), store.clone());
            first.load_dataset(CSV.as_bytes()).unwrap();
            first.set_field_position("name", 321.0, 222.0);
            first.saver.flush(&LayoutRecord::from_registry(&first.registry));
        }

        let mut second = session_with(Arc::new(NullProvider), store);
        second.load_dataset(CSV.as_bytes()).unwrap();
        assert_eq!(
            second.registry().position("name").unwrap(),
            Position { x: 321.0, y: 222.0 }
        );
        // Fields absent from the saved record keep defaults.
        assert_eq!(
            second.registry().position("title").unwrap(),
            Position { x: 100.0, y: 160.0 }
        );
    }

    #[tokio::test]
    async fn export_requires_template_and_dataset() {
        let mut s = session();
        let err = s.export_all(|_, _| {}).await.unwrap_err();
        assert!(err.to_string().contains("template"));

        s.load_template(&template_png()).unwrap();
        let err = s.export_all(|_, _| {}).await.unwrap_err();
        assert!(err.to_string().contains("dataset"));
    }

    #[tokio::test]
    async fn end_to_end_export_counts_rows() {
        let mut s = session();
        s.load_template(&template_png()).unwrap();
        s.load_dataset(CSV.as_bytes()).unwrap();
        s.set_field_position("name", 50.0, 60.0);
        s.set_field_position("title", 50.0, 120.0);

        let outcome = s.export_all(|_, _| {}).await.unwrap();
        assert_eq!(outcome.report.succeeded, 2);
        assert_eq!(outcome.report.failed, 0);
        assert!(!outcome.archive.is_empty());
    }

    #[tokio::test]
    async fn font_failure_falls_back_and_surfaces() {
        let mut s = session_with(Arc::new(FailingProvider), Arc::new(MemoryStore::new()));
        s.load_dataset(CSV.as_bytes()).unwrap();

        let err = s.set_field_font("name", "Pacifico").await.unwrap_err();
        assert!(err.to_string().contains("Pacifico"));
        assert_eq!(s.registry().style("name").unwrap().font_family, DEFAULT_FAMILY);
    }

    #[tokio::test]
    async fn font_success_applies_family() {
        let mut s = session();
        s.load_dataset(CSV.as_bytes()).unwrap();
        s.set_field_font("name", "Oswald").await.unwrap();
        assert_eq!(s.registry().style("name").unwrap().font_family, "Oswald");
    }

    #[tokio::test(start_paused = true)]
    async fn drag_end_fast_saves_layout() {
        let store = Arc::new(MemoryStore::new());
        let mut s = session_with(Arc::new(NullProvider), store.clone());
        s.load_template(&template_png()).unwrap();
        s.load_dataset(CSV.as_bytes()).unwrap();

        assert!(s.pointer_down(100.0, 95.0).is_some());
        s.pointer_move(150.0, 95.0);
        assert_eq!(s.pointer_up(), Some("name".into()));

        tokio::time::sleep(Duration::from_millis(persist::FAST_SAVE_MS + 50)).await;
        let saved = load_layout(store.as_ref()).unwrap();
        assert_eq!(saved.positions["name"].x, 150.0);
    }

    #[tokio::test]
    async fn pointer_events_are_inert_without_template() {
        let mut s = session();
        s.load_dataset(CSV.as_bytes()).unwrap();
        assert!(s.pointer_down(100.0, 100.0).is_none());
        assert_eq!(s.pointer_move(5.0, 5.0), PointerEffect::Hover(None));
    }
}

//! # Batch Export Pipeline
//!
//! Iterates every data row, re-renders the canvas in export mode, and
//! streams the encoded images into a ZIP archive. Strictly sequential: one
//! surface, reused row after row — no row starts until the previous row's
//! render and archive insertion are done. The loop yields back to the
//! runtime at least every [`YIELD_EVERY_ROWS`] rows so progress can be
//! reported and the interactive surface never appears frozen.
//!
//! Per-row failures are caught, counted, and recorded with their row index;
//! a single bad row never aborts the batch. Only a batch with zero
//! successful rows is reported as an overall failure, with no archive
//! produced.

mod archive;

pub use archive::ZipWriter;

use crate::canvas::Canvas;
use crate::dataset::{Dataset, Row};
use crate::error::SelloError;
use crate::registry::FieldRegistry;
use crate::render::{RenderEngine, RenderMode};
use crate::template::Template;

/// The export loop yields and reports progress at least this often.
pub const YIELD_EVERY_ROWS: usize = 5;

/// Maximum length of each filename component derived from a field value.
const FILENAME_COMPONENT_MAX: usize = 50;

/// One recorded per-row failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    /// 1-based row index.
    pub row_index: usize,
    pub reason: String,
}

/// Success/failure tally for a completed batch.
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<RowFailure>,
}

/// A finalized archive plus its report.
#[derive(Debug)]
pub struct ExportOutcome {
    pub archive: Vec<u8>,
    pub report: ExportReport,
}

/// Strip a field value down to a safe filename component: drop everything
/// that is not alphanumeric or whitespace, collapse whitespace runs to a
/// single underscore, and cap the length.
pub fn sanitize_component(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .take(FILENAME_COMPONENT_MAX)
        .collect()
}

/// Derive the archive filename for one row: the first two active field
/// values (sanitized, empty components dropped) plus the 1-based row index,
/// which keeps names unique even when content collides.
pub fn row_filename(registry: &FieldRegistry, row: &Row, row_index: usize) -> String {
    let mut parts: Vec<String> = registry
        .active_names()
        .take(2)
        .filter_map(|name| row.get(name))
        .map(|value| sanitize_component(&value.to_string()))
        .filter(|part| !part.is_empty())
        .collect();
    parts.push(row_index.to_string());
    format!("{}.png", parts.join("_"))
}

/// Render every row and package the results.
///
/// `progress` receives `(rows_done, rows_total)` at every yield point.
/// There is no mid-export cancellation: once started, the batch runs to
/// completion or total failure.
pub async fn export_all(
    engine: &RenderEngine,
    template: &Template,
    registry: &FieldRegistry,
    dataset: &Dataset,
    mut progress: impl FnMut(usize, usize),
) -> Result<ExportOutcome, SelloError> {
    if registry.active_names().next().is_none() {
        return Err(SelloError::InvalidInput(
            "No active fields selected for export".to_string(),
        ));
    }
    if dataset.is_empty() {
        return Err(SelloError::InvalidInput(
            "The dataset contains no rows to export".to_string(),
        ));
    }

    let total = dataset.len();
    let mut zip = ZipWriter::new();
    let mut report = ExportReport::default();

    // One surface, reused sequentially for every row.
    let mut surface = Canvas::new(template.width(), template.height());

    for (i, row) in dataset.rows().iter().enumerate() {
        let row_index = i + 1;
        match render_row(engine, template, registry, &mut surface, row) {
            Ok(png) => {
                let name = row_filename(registry, row, row_index);
                zip.add(&name, &png)?;
                report.succeeded += 1;
            }
            Err(e) => {
                log::warn!("row {} failed: {}", row_index, e);
                report.failed += 1;
                report.failures.push(RowFailure {
                    row_index,
                    reason: e.to_string(),
                });
            }
        }

        if row_index % YIELD_EVERY_ROWS == 0 {
            progress(row_index, total);
            tokio::task::yield_now().await;
        }
    }
    progress(total, total);
    tokio::task::yield_now().await;

    if report.succeeded == 0 {
        return Err(SelloError::Archive(format!(
            "All {} rows failed to render; no archive was produced",
            total
        )));
    }

    let archive = zip.finish(|pct| log::debug!("archive finalization {}%", pct))?;
    Ok(ExportOutcome { archive, report })
}

fn render_row(
    engine: &RenderEngine,
    template: &Template,
    registry: &FieldRegistry,
    surface: &mut Canvas,
    row: &Row,
) -> Result<Vec<u8>, SelloError> {
    engine.render(surface, template, registry, Some(row), RenderMode::Export, None)?;
    surface.encode_png()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Scalar;
    use crate::fonts::{FixedTextBackend, FontProvider, FontService};
    use crate::persist::MemoryStore;
    use async_trait::async_trait;
    use image::{DynamicImage, RgbaImage};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::Arc;

    struct NullProvider;

    #[async_trait]
    impl FontProvider for NullProvider {
        async fn acquire(&self, _family: &str) -> Result<(), SelloError> {
            Ok(())
        }
    }

    fn engine_with(backend: FixedTextBackend) -> RenderEngine {
        let fonts = Arc::new(FontService::new(
            Arc::new(NullProvider),
            Arc::new(MemoryStore::new()),
        ));
        RenderEngine::new(Arc::new(backend), fonts)
    }

    fn template() -> Template {
        Template::from_image(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            200,
            150,
            image::Rgba([250, 250, 250, 255]),
        )))
        .unwrap()
    }

    fn dataset(names: &[&str]) -> Dataset {
        let header: Vec<String> = vec!["name".into(), "title".into()];
        let rows = names
            .iter()
            .map(|n| {
                Row::from_pairs([
                    ("name", Scalar::Text(n.to_string())),
                    ("title", Scalar::Text("Engineer".into())),
                ])
            })
            .collect();
        Dataset::from_parts(header, rows)
    }

    fn registry() -> FieldRegistry {
        let mut reg = FieldRegistry::new();
        reg.load_fields(["name", "title"]);
        reg.set_position("name", 30.0, 60.0);
        reg.set_position("title", 30.0, 100.0);
        reg
    }

    fn zip_entry_count(bytes: &[u8]) -> u16 {
        let eocd = bytes.len() - 22;
        u16::from_le_bytes([bytes[eocd + 10], bytes[eocd + 11]])
    }

    // ── sanitize / filenames ────────────────────────────────────────────

    #[test]
    fn sanitize_strips_symbols_and_collapses_whitespace() {
        assert_eq!(sanitize_component("O'Brien, Jr."), "OBrien_Jr");
        assert_eq!(sanitize_component("  spaced   out  "), "spaced_out");
        assert_eq!(sanitize_component("___"), "");
        assert_eq!(sanitize_component("a-b/c:d"), "abcd");
    }

    #[test]
    fn sanitize_caps_component_length() {
        let long = "x".repeat(200);
        assert_eq!(sanitize_component(&long).len(), FILENAME_COMPONENT_MAX);
    }

    #[test]
    fn filename_joins_first_two_active_values_and_index() {
        let reg = registry();
        let row = Row::from_pairs([
            ("name", Scalar::Text("O'Brien, Jr.".into())),
            ("title", Scalar::Text("Chief Engineer".into())),
        ]);
        assert_eq!(row_filename(&reg, &row, 7), "OBrien_Jr_Chief_Engineer_7.png");
    }

    #[test]
    fn filename_drops_empty_components() {
        let reg = registry();
        let row = Row::from_pairs([
            ("name", Scalar::Empty),
            ("title", Scalar::Text("!!!".into())),
        ]);
        assert_eq!(row_filename(&reg, &row, 3), "3.png");
    }

    #[test]
    fn filenames_stay_unique_across_identical_rows() {
        let reg = registry();
        let row = Row::from_pairs([
            ("name", Scalar::Text("Same".into())),
            ("title", Scalar::Text("Same".into())),
        ]);
        let names: HashSet<String> = (1..=1000).map(|i| row_filename(&reg, &row, i)).collect();
        assert_eq!(names.len(), 1000);
    }

    // ── export_all ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn all_valid_rows_produce_full_archive() {
        let engine = engine_with(FixedTextBackend::new());
        let ds = dataset(&["Ada", "Grace", "Edsger", "Barbara", "Donald", "Tony", "Nik"]);

        let mut calls = Vec::new();
        let outcome = export_all(&engine, &template(), &registry(), &ds, |done, total| {
            calls.push((done, total));
        })
        .await
        .unwrap();

        assert_eq!(outcome.report.succeeded, 7);
        assert_eq!(outcome.report.failed, 0);
        assert_eq!(zip_entry_count(&outcome.archive), 7);
        // Yield points: after rows 5 and at the end.
        assert_eq!(calls, vec![(5, 7), (7, 7)]);
    }

    #[tokio::test]
    async fn one_bad_row_is_recorded_and_skipped() {
        let engine = engine_with(FixedTextBackend::failing_on("Edsger"));
        let ds = dataset(&["Ada", "Grace", "Edsger", "Barbara"]);

        let outcome = export_all(&engine, &template(), &registry(), &ds, |_, _| {})
            .await
            .unwrap();

        assert_eq!(outcome.report.succeeded, 3);
        assert_eq!(outcome.report.failed, 1);
        assert_eq!(outcome.report.failures.len(), 1);
        assert_eq!(outcome.report.failures[0].row_index, 3);
        assert!(outcome.report.failures[0].reason.contains("Render error"));
        assert_eq!(zip_entry_count(&outcome.archive), 3);
    }

    #[tokio::test]
    async fn zero_successes_is_overall_failure_without_archive() {
        let engine = engine_with(FixedTextBackend::failing_on("Engineer"));
        let ds = dataset(&["Ada", "Grace"]);

        let err = export_all(&engine, &template(), &registry(), &ds, |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, SelloError::Archive(_)));
        assert!(err.to_string().contains("All 2 rows failed"));
    }

    #[tokio::test]
    async fn no_active_fields_is_rejected_before_rendering() {
        // A backend that fails on everything proves no render ran: the
        // rejection must come from validation, not from a draw.
        let engine = engine_with(FixedTextBackend::failing_on(""));
        let mut reg = registry();
        reg.set_active("name", false);
        reg.set_active("title", false);

        let err = export_all(&engine, &template(), &reg, &dataset(&["Ada"]), |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, SelloError::InvalidInput(_)));
        assert!(err.to_string().contains("No active fields"));
    }

    #[tokio::test]
    async fn archive_contains_derived_filenames() {
        let engine = engine_with(FixedTextBackend::new());
        let ds = dataset(&["Ada"]);
        let outcome = export_all(&engine, &template(), &registry(), &ds, |_, _| {})
            .await
            .unwrap();
        let haystack = outcome.archive;
        let needle = b"Ada_Engineer_1.png";
        assert!(
            haystack.windows(needle.len()).any(|w| w == needle),
            "filename missing from archive"
        );
    }
}

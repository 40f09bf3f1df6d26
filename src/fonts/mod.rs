//! # Font Availability Service
//!
//! Tracks which font families are usable, loads them on demand with a
//! bounded wait, and persists the known-bad set.
//!
//! Catalog entries start unverified. A verification pass attempts every
//! entry with at most [`MAX_CONCURRENT_LOADS`] acquisitions in flight and a
//! per-font timeout, bounding both startup latency and the number of
//! simultaneous network requests. Families that fail or time out are pruned
//! from the catalog and written to a persisted rejection set so they are
//! never retried in later sessions.
//!
//! The service reports failure; it does not substitute. Callers fall back
//! to the default family and surface the failure themselves.

mod backend;
mod provider;

pub use backend::{FixedTextBackend, GlyphTextBackend, TextBackend, TextSize};
pub use provider::{DEFAULT_FONT_BASE_URL, DirFontProvider, FontProvider, RemoteFontProvider};

use ab_glyph::FontArc;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::persist::{self, KvStore};

/// Per-font ceiling for a single interactive load request.
pub const SINGLE_FONT_TIMEOUT: Duration = Duration::from_secs(4);

/// Per-font ceiling during the startup verification pass.
pub const BULK_FONT_TIMEOUT: Duration = Duration::from_secs(6);

/// Maximum acquisitions in flight at once.
pub const MAX_CONCURRENT_LOADS: usize = 4;

/// Curated catalog seed. The default family comes first.
pub const FONT_CATALOG: &[&str] = &[
    "Inter",
    "Roboto",
    "Open Sans",
    "Lato",
    "Montserrat",
    "Poppins",
    "Oswald",
    "Raleway",
    "Merriweather",
    "Playfair Display",
    "Nunito",
    "Rubik",
    "Work Sans",
    "Bebas Neue",
    "Dancing Script",
    "Pacifico",
    "Caveat",
    "Lobster",
    "Abril Fatface",
    "Josefin Sans",
];

/// Shared storage of loaded fonts, read by the text backend.
#[derive(Default)]
pub struct FontBook {
    fonts: RwLock<HashMap<String, FontArc>>,
}

impl FontBook {
    pub fn insert(&self, family: &str, font: FontArc) {
        self.fonts
            .write()
            .expect("font book lock")
            .insert(family.to_string(), font);
    }

    pub fn get(&self, family: &str) -> Option<FontArc> {
        self.fonts.read().expect("font book lock").get(family).cloned()
    }

    pub fn contains(&self, family: &str) -> bool {
        self.fonts.read().expect("font book lock").contains_key(family)
    }

    /// Any loaded font, used as a last-resort fallback.
    pub fn any(&self) -> Option<FontArc> {
        self.fonts
            .read()
            .expect("font book lock")
            .values()
            .next()
            .cloned()
    }
}

/// Result of one bounded load attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontOutcome {
    Loaded,
    Rejected(String),
    TimedOut,
}

impl FontOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, FontOutcome::Loaded)
    }
}

/// Summary of a catalog verification pass.
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub available: Vec<String>,
    pub removed: Vec<String>,
}

/// Tracks per-family availability, with bounded concurrent acquisition and
/// a persisted rejection set.
pub struct FontService {
    provider: Arc<dyn FontProvider>,
    store: Arc<dyn KvStore>,
    catalog: RwLock<Vec<String>>,
    verified: RwLock<HashSet<String>>,
    pending: RwLock<HashSet<String>>,
    rejected: RwLock<BTreeSet<String>>,
}

impl FontService {
    /// Build a service over the seed catalog, minus families already in the
    /// persisted rejection set.
    pub fn new(provider: Arc<dyn FontProvider>, store: Arc<dyn KvStore>) -> Self {
        let rejected = persist::load_removed_fonts(store.as_ref());
        let catalog = FONT_CATALOG
            .iter()
            .map(|s| s.to_string())
            .filter(|f| !rejected.contains(f))
            .collect();
        Self {
            provider,
            store,
            catalog: RwLock::new(catalog),
            verified: RwLock::new(HashSet::new()),
            pending: RwLock::new(HashSet::new()),
            rejected: RwLock::new(rejected),
        }
    }

    /// Attempt to make `family` usable within the interactive timeout.
    pub async fn ensure_loaded(&self, family: &str) -> FontOutcome {
        self.ensure_loaded_within(family, SINGLE_FONT_TIMEOUT).await
    }

    /// Attempt to make `family` usable within `ceiling`.
    ///
    /// Outcomes are cached both ways: a verified family returns `Loaded`
    /// without touching the provider, and a rejected family returns
    /// `Rejected` forever (also across sessions, via the persisted set).
    pub async fn ensure_loaded_within(&self, family: &str, ceiling: Duration) -> FontOutcome {
        if self.rejected.read().expect("font lock").contains(family) {
            return FontOutcome::Rejected(format!("'{}' was previously rejected", family));
        }
        if self.verified.read().expect("font lock").contains(family) {
            return FontOutcome::Loaded;
        }

        self.pending
            .write()
            .expect("font lock")
            .insert(family.to_string());

        let result = tokio::time::timeout(ceiling, self.provider.acquire(family)).await;

        self.pending.write().expect("font lock").remove(family);

        match result {
            Ok(Ok(())) => {
                self.verified
                    .write()
                    .expect("font lock")
                    .insert(family.to_string());
                FontOutcome::Loaded
            }
            Ok(Err(e)) => {
                let reason = e.to_string();
                log::warn!("font '{}' failed to load: {}", family, reason);
                self.reject(family);
                FontOutcome::Rejected(reason)
            }
            Err(_) => {
                log::warn!(
                    "font '{}' timed out after {:?}, removing from catalog",
                    family,
                    ceiling
                );
                self.reject(family);
                FontOutcome::TimedOut
            }
        }
    }

    /// Verify every unverified catalog entry with bounded concurrency.
    pub async fn verify_catalog(self: &Arc<Self>) -> VerifyReport {
        let candidates: Vec<String> = {
            let catalog = self.catalog.read().expect("font lock");
            let verified = self.verified.read().expect("font lock");
            catalog
                .iter()
                .filter(|f| !verified.contains(f.as_str()))
                .cloned()
                .collect()
        };

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_LOADS));
        let mut tasks = JoinSet::new();
        for family in candidates {
            let service = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let outcome = service
                    .ensure_loaded_within(&family, BULK_FONT_TIMEOUT)
                    .await;
                (family, outcome)
            });
        }

        let mut report = VerifyReport::default();
        while let Some(joined) = tasks.join_next().await {
            let Ok((family, outcome)) = joined else {
                continue;
            };
            if outcome.is_loaded() {
                report.available.push(family);
            } else {
                report.removed.push(family);
            }
        }
        report.available.sort();
        report.removed.sort();
        report
    }

    /// Remove a family from the catalog and persist the rejection.
    fn reject(&self, family: &str) {
        self.catalog
            .write()
            .expect("font lock")
            .retain(|f| f != family);
        let snapshot = {
            let mut rejected = self.rejected.write().expect("font lock");
            rejected.insert(family.to_string());
            rejected.clone()
        };
        persist::save_removed_fonts(self.store.as_ref(), &snapshot);
    }

    /// Case-insensitive substring search over currently available families.
    pub fn search(&self, needle: &str) -> Vec<String> {
        let needle = needle.to_lowercase();
        let verified = self.verified.read().expect("font lock");
        self.catalog
            .read()
            .expect("font lock")
            .iter()
            .filter(|f| verified.contains(f.as_str()))
            .filter(|f| f.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Current catalog listing (seed order, minus pruned families).
    pub fn catalog(&self) -> Vec<String> {
        self.catalog.read().expect("font lock").clone()
    }

    pub fn is_available(&self, family: &str) -> bool {
        self.verified.read().expect("font lock").contains(family)
    }

    /// Whether an acquisition for `family` is currently in flight. Drives
    /// the loading-highlight affordance in the render engine.
    pub fn is_loading(&self, family: &str) -> bool {
        self.pending.read().expect("font lock").contains(family)
    }
}

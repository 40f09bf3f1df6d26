//! # Key-Value Persistence
//!
//! String-keyed storage of serialized JSON records: the per-field layout
//! (positions + text styles) and the rejected-fonts set. Writes may fail
//! (quota, disk); persistence failures are logged and swallowed — losing a
//! saved layout is never fatal to the interactive session.
//!
//! Rapid-fire layout mutations coalesce through [`DebouncedSaver`]: a single
//! shared timer that each new mutation cancels and restarts, with a shorter
//! delay for drag-end and explicit resets.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::SelloError;
use crate::registry::{FieldRegistry, Position, TextStyle};

/// Storage key for the serialized [`LayoutRecord`].
pub const LAYOUT_KEY: &str = "sello.layout";

/// Storage key for the persisted rejected-fonts list.
pub const REMOVED_FONTS_KEY: &str = "sello.removedFonts";

/// Quiet period after the last mutation before a layout write.
pub const DEBOUNCE_QUIET_MS: u64 = 1000;

/// Shorter delay for drag-end and explicit resets.
pub const FAST_SAVE_MS: u64 = 250;

/// Synchronous string-keyed JSON storage.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), SelloError>;
}

/// In-memory store, used by tests and as a no-persistence fallback.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.map.lock().expect("store lock").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SelloError> {
        self.map
            .lock()
            .expect("store lock")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed store: one JSON object per file, rewritten on every set.
pub struct FileStore {
    path: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open a store at `path`, loading existing contents when present.
    /// An unreadable or malformed file starts the store empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();
        Self {
            path,
            cache: Mutex::new(cache),
        }
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.lock().expect("store lock").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SelloError> {
        let serialized = {
            let mut cache = self.cache.lock().expect("store lock");
            cache.insert(key.to_string(), value.to_string());
            serde_json::to_string_pretty(&*cache)
                .map_err(|e| SelloError::Persistence(format!("serialize store: {}", e)))?
        };
        std::fs::write(&self.path, serialized)
            .map_err(|e| SelloError::Persistence(format!("write {}: {}", self.path.display(), e)))
    }
}

/// Persisted layout: per-field text styles and positions, keyed by field
/// name. Serialized under [`LAYOUT_KEY`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutRecord {
    #[serde(rename = "textStyles")]
    pub text_styles: HashMap<String, TextStyle>,
    pub positions: HashMap<String, Position>,
}

impl LayoutRecord {
    /// Snapshot the current registry state.
    pub fn from_registry(registry: &FieldRegistry) -> Self {
        let mut record = Self::default();
        for name in registry.names() {
            if let Some(pos) = registry.position(name) {
                record.positions.insert(name.to_string(), pos);
            }
            if let Some(style) = registry.style(name) {
                record.text_styles.insert(name.to_string(), style.clone());
            }
        }
        record
    }
}

/// Write the layout record, logging and swallowing failures.
pub fn save_layout(store: &dyn KvStore, record: &LayoutRecord) {
    match serde_json::to_string(record) {
        Ok(json) => {
            if let Err(e) = store.set(LAYOUT_KEY, &json) {
                log::warn!("layout save failed: {}", e);
            }
        }
        Err(e) => log::warn!("layout serialization failed: {}", e),
    }
}

/// Read the saved layout record, if any. Malformed records are discarded.
pub fn load_layout(store: &dyn KvStore) -> Option<LayoutRecord> {
    let json = store.get(LAYOUT_KEY)?;
    match serde_json::from_str(&json) {
        Ok(record) => Some(record),
        Err(e) => {
            log::warn!("discarding malformed saved layout: {}", e);
            None
        }
    }
}

/// Write the rejected-fonts list, logging and swallowing failures.
pub fn save_removed_fonts(store: &dyn KvStore, removed: &BTreeSet<String>) {
    let names: Vec<&str> = removed.iter().map(String::as_str).collect();
    match serde_json::to_string(&names) {
        Ok(json) => {
            if let Err(e) = store.set(REMOVED_FONTS_KEY, &json) {
                log::warn!("rejected-fonts save failed: {}", e);
            }
        }
        Err(e) => log::warn!("rejected-fonts serialization failed: {}", e),
    }
}

/// Read the persisted rejected-fonts list.
pub fn load_removed_fonts(store: &dyn KvStore) -> BTreeSet<String> {
    store
        .get(REMOVED_FONTS_KEY)
        .and_then(|json| serde_json::from_str::<Vec<String>>(&json).ok())
        .map(|names| names.into_iter().collect())
        .unwrap_or_default()
}

/// Coalesces rapid layout mutations into a single write.
///
/// One shared timer: every `schedule` call invalidates the pending write
/// and starts a new one. The write runs on the tokio runtime after the
/// delay, only if no newer mutation arrived meanwhile.
pub struct DebouncedSaver {
    store: Arc<dyn KvStore>,
    generation: Arc<AtomicU64>,
}

impl DebouncedSaver {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedule a write of `record` after the regular quiet period.
    pub fn schedule(&self, record: LayoutRecord) {
        self.schedule_after(record, Duration::from_millis(DEBOUNCE_QUIET_MS));
    }

    /// Schedule a write after the shorter drag-end/reset delay.
    pub fn schedule_fast(&self, record: LayoutRecord) {
        self.schedule_after(record, Duration::from_millis(FAST_SAVE_MS));
    }

    fn schedule_after(&self, record: LayoutRecord, delay: Duration) {
        let my_gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = self.generation.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if generation.load(Ordering::SeqCst) == my_gen {
                save_layout(store.as_ref(), &record);
            }
        });
    }

    /// Write immediately, cancelling any pending timer.
    pub fn flush(&self, record: &LayoutRecord) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        save_layout(self.store.as_ref(), record);
    }
}

//! Watermark storage.
//!
//! Insert/Append checks compare the current row count of a table target with
//! the one recorded after the previous run. Where that baseline lives is an
//! explicit contract: a [`WatermarkStore`] injected into the data source.
//! The engine only reads watermarks; recording them is up to the caller.
//!
//! Watermarks are kept per target, not per table: two feeds loading the same
//! table count it through their own where clauses.

use crate::{DataAccessError, Watermark};
use feedcheck_core::TableTarget;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Storage key of a target: `db.table[feed]`, lowercased.
pub fn watermark_key(target: &TableTarget) -> String {
    format!("{}.{}[{}]", target.database, target.table, target.feed).to_ascii_lowercase()
}

/// Persistent storage for per-target watermarks.
pub trait WatermarkStore: Debug + Send + Sync {
    /// Watermark for a target, if one was recorded.
    fn get(&self, target: &TableTarget) -> Result<Option<Watermark>, DataAccessError>;

    /// Records a watermark for a target, replacing any previous one.
    fn put(&self, target: &TableTarget, watermark: Watermark) -> Result<(), DataAccessError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Watermarks kept in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    entries: Mutex<BTreeMap<String, Watermark>>,
}

impl MemoryWatermarkStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn get(&self, target: &TableTarget) -> Result<Option<Watermark>, DataAccessError> {
        Ok(lock(&self.entries).get(&watermark_key(target)).copied())
    }

    fn put(&self, target: &TableTarget, watermark: Watermark) -> Result<(), DataAccessError> {
        lock(&self.entries).insert(watermark_key(target), watermark);
        Ok(())
    }
}

/// Watermarks persisted as a JSON object keyed by [`watermark_key`].
///
/// The file is read once when the store is opened and rewritten on every
/// [`put`](WatermarkStore::put).
#[derive(Debug)]
pub struct JsonWatermarkStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Watermark>>,
}

impl JsonWatermarkStore {
    /// Opens the store. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DataAccessError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                DataAccessError::watermark(format!("{}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "Opened watermark store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WatermarkStore for JsonWatermarkStore {
    fn get(&self, target: &TableTarget) -> Result<Option<Watermark>, DataAccessError> {
        Ok(lock(&self.entries).get(&watermark_key(target)).copied())
    }

    fn put(&self, target: &TableTarget, watermark: Watermark) -> Result<(), DataAccessError> {
        let mut entries = lock(&self.entries);
        entries.insert(watermark_key(target), watermark);

        let json = serde_json::to_string_pretty(&*entries)
            .map_err(|e| DataAccessError::watermark(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

//! Persisted dedup store - insertion-ordered set of already-relayed message ids
//!
//! The store is loaded once at run start, mutated in memory on every confirmed
//! send, trimmed and flushed to disk exactly once at run end. Insertion order
//! is preserved because eviction removes the earliest-sent ids first.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Trim threshold applied at the end of every run
pub const MAX_TRACKED: usize = 150;

/// Ids evicted per trim once the threshold is exceeded
pub const EVICT_BATCH: usize = 50;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Insertion-ordered set of already-relayed message ids.
#[derive(Debug, Default)]
pub struct SentStore {
    order: Vec<i64>,
    index: HashSet<i64>,
}

impl SentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store from a JSON array file; a missing file is an empty store
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            log::info!("No existing sent store at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let json = fs::read_to_string(path)?;
        let ids: Vec<i64> = serde_json::from_str(&json)?;

        let mut store = Self::new();
        for id in ids {
            store.record(id);
        }

        log::info!("Loaded {} sent ids from {}", store.len(), path.display());
        Ok(store)
    }

    /// True if `id` was relayed in this or a prior run (and not yet evicted)
    pub fn contains(&self, id: i64) -> bool {
        self.index.contains(&id)
    }

    /// Append `id`; no-op if already present
    pub fn record(&mut self, id: i64) {
        if self.index.insert(id) {
            self.order.push(id);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Single-pass bounded eviction
    ///
    /// When the store holds more than `max_size` ids, the `evict_count`
    /// earliest-inserted ids are removed. Deliberately not looped to
    /// convergence: a store far above the threshold shrinks by exactly
    /// `evict_count` per run.
    pub fn trim(&mut self, max_size: usize, evict_count: usize) {
        if self.order.len() <= max_size {
            return;
        }

        let evicted: Vec<i64> = self.order.drain(..evict_count.min(self.order.len())).collect();
        for id in &evicted {
            self.index.remove(id);
        }

        log::info!("Trimmed sent store: evicted {} ids, {} remain", evicted.len(), self.order.len());
    }

    /// Write the store as a JSON array, atomically (temp file + rename)
    pub fn persist(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.order)?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &json)?;
        fs::rename(&tmp_path, path)?;

        log::debug!("Persisted {} sent ids to {}", self.order.len(), path.display());
        Ok(())
    }
}

//! Prediction history: an ordered, append-only collection of records mirrored
//! to a key-value store as a JSON array snapshot.
//!
//! Persistence never blocks the in-memory flow. A snapshot that cannot be
//! written degrades the session to in-memory only and is reported back as a
//! [`SnapshotStatus::Degraded`] warning; a snapshot that cannot be parsed on
//! load is replaced by an empty history and reported as a [`LoadWarning`].

use std::sync::Arc;

use crate::error::PersistenceError;
use crate::storage::KeyValueStore;
use crate::types::PredictionRecord;

/// Default storage key for the history snapshot.
pub const DEFAULT_HISTORY_KEY: &str = "predictionHistory";

/// Outcome of mirroring the collection to storage after a mutation.
#[derive(Debug)]
#[must_use]
pub enum SnapshotStatus {
    Saved,
    /// The in-memory mutation succeeded but storage was not updated.
    Degraded(PersistenceError),
}

impl SnapshotStatus {
    pub fn is_saved(&self) -> bool {
        matches!(self, SnapshotStatus::Saved)
    }

    pub fn warning(&self) -> Option<&PersistenceError> {
        match self {
            SnapshotStatus::Saved => None,
            SnapshotStatus::Degraded(err) => Some(err),
        }
    }
}

/// Why `load` started from an empty history instead of the stored one.
#[derive(Debug)]
pub struct LoadWarning {
    pub error: PersistenceError,
}

/// The session's history collection.
pub struct HistoryStore {
    records: Vec<PredictionRecord>,
    store: Arc<dyn KeyValueStore>,
    key: String,
    load_warning: Option<LoadWarning>,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("records", &self.records.len())
            .field("key", &self.key)
            .field("load_warning", &self.load_warning)
            .finish()
    }
}

impl HistoryStore {
    /// Load the snapshot stored under `key`. Absent, unreadable or corrupt
    /// snapshots yield an empty history; the latter two leave a warning.
    pub fn load(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let (records, load_warning) = match read_snapshot(store.as_ref(), &key) {
            Ok(records) => (records, None),
            Err(error) => {
                tracing::warn!(key = %key, error = %error, "Discarding unreadable prediction history");
                (Vec::new(), Some(LoadWarning { error }))
            }
        };
        tracing::debug!(key = %key, count = records.len(), "Loaded prediction history");
        Self {
            records,
            store,
            key,
            load_warning,
        }
    }

    /// Warning left by `load`, if the stored snapshot was discarded.
    pub fn load_warning(&self) -> Option<&LoadWarning> {
        self.load_warning.as_ref()
    }

    /// Append a record and snapshot the full collection.
    pub fn append(&mut self, record: PredictionRecord) -> SnapshotStatus {
        self.records.push(record);
        tracing::info!(count = self.records.len(), "Prediction added to history");
        self.persist()
    }

    /// Empty the collection and remove the stored snapshot.
    pub fn clear(&mut self) -> SnapshotStatus {
        self.records.clear();
        tracing::info!(key = %self.key, "Prediction history cleared");
        match self.store.remove(&self.key) {
            Ok(()) => SnapshotStatus::Saved,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to remove stored history");
                SnapshotStatus::Degraded(err)
            }
        }
    }

    /// All records in insertion order.
    pub fn all(&self) -> &[PredictionRecord] {
        &self.records
    }

    /// Records newest-first, for display.
    pub fn recent_first(&self) -> impl Iterator<Item = (usize, &PredictionRecord)> {
        self.records.iter().enumerate().rev()
    }

    pub fn get(&self, index: usize) -> Option<&PredictionRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn persist(&self) -> SnapshotStatus {
        let json = match serde_json::to_string(&self.records) {
            Ok(json) => json,
            Err(e) => {
                return SnapshotStatus::Degraded(PersistenceError::Write {
                    key: self.key.clone(),
                    message: e.to_string(),
                });
            }
        };
        match self.store.set(&self.key, &json) {
            Ok(()) => SnapshotStatus::Saved,
            Err(err) => {
                tracing::warn!(error = %err, "History kept in memory only");
                SnapshotStatus::Degraded(err)
            }
        }
    }
}

fn read_snapshot(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Vec<PredictionRecord>, PersistenceError> {
    match store.get(key)? {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(&raw).map_err(|e| PersistenceError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

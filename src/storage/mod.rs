//! Local cache of device-check results.
//!
//! Results are kept in a single object collection keyed by an
//! auto-incrementing identifier. On WASM targets the collection lives in
//! IndexedDB. Native builds get an in-memory store with the same semantics,
//! used by tests.
//!
//! ```text
//! IndexedDB "mvt-web" (schema v1)
//! └── analysisResults - { id, saved_at, serial, messages } keyed by `id`
//! ```

#[cfg(target_arch = "wasm32")]
mod bindings;
#[cfg(target_arch = "wasm32")]
mod indexeddb;

#[cfg(target_arch = "wasm32")]
pub use bindings::ResultCache;
#[cfg(target_arch = "wasm32")]
pub use indexeddb::IndexedDbStore;

use crate::api::DeviceMessage;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Errors that can occur during cache operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// The storage engine could not be opened or migrated.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    /// A read request failed.
    #[error("read failed: {0}")]
    ReadError(String),
    /// A write request or its transaction failed.
    #[error("write failed: {0}")]
    WriteError(String),
    /// A record could not be converted to or from its stored form.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Identifier assigned to a record by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u32);

impl RecordId {
    /// Converts a key generated by IndexedDB.
    ///
    /// Generated keys are positive integers up to 2^53; anything that does
    /// not fit a `u32` is rejected rather than truncated.
    pub fn from_key(key: f64) -> Option<Self> {
        if key.fract() != 0.0 || key < 1.0 || key > f64::from(u32::MAX) {
            return None;
        }
        Some(RecordId(key as u32))
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One device-check result as handed to [`ResultStore::save`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// When the result was saved (Unix milliseconds).
    pub saved_at: i64,
    /// Device serial the check targeted, if one was given.
    #[serde(default)]
    pub serial: Option<String>,
    /// Entries returned by the backend.
    pub messages: Vec<DeviceMessage>,
}

impl AnalysisRecord {
    /// Creates a record stamped with the current time.
    pub fn new(serial: Option<String>, messages: Vec<DeviceMessage>) -> Self {
        Self {
            saved_at: chrono::Utc::now().timestamp_millis(),
            serial,
            messages,
        }
    }
}

/// A record as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub record: AnalysisRecord,
}

/// Asynchronous result cache.
///
/// Records are immutable once saved; there is no update operation.
///
/// Note: no `Send` bounds, WASM is single-threaded and the IndexedDB
/// handles cannot cross threads anyway.
pub trait ResultStore {
    /// Inserts a record and returns the identifier assigned to it.
    ///
    /// Identifiers increase strictly with every insert.
    fn save(&self, record: &AnalysisRecord)
        -> impl Future<Output = Result<RecordId, StorageError>>;

    /// Returns every record in the store's iteration order (ascending id).
    fn get_all(&self) -> impl Future<Output = Result<Vec<StoredRecord>, StorageError>>;

    /// Returns the record with the given id, or `Ok(None)` if absent.
    fn get_by_id(
        &self,
        id: RecordId,
    ) -> impl Future<Output = Result<Option<StoredRecord>, StorageError>>;

    /// Removes a record.
    ///
    /// Returns `Ok(true)` whether or not the id existed.
    fn delete_by_id(&self, id: RecordId) -> impl Future<Output = Result<bool, StorageError>>;

    /// Removes every record.
    fn clear_all(&self) -> impl Future<Output = Result<(), StorageError>>;
}

/// Current schema version. Equal to the number of applied migrations.
pub const SCHEMA_VERSION: u32 = 1;

/// Where the cache lives.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// IndexedDB database name.
    pub database_name: String,
    /// Object store holding the results.
    pub store_name: String,
    /// Database version (incrementing triggers upgrade).
    pub version: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_name: "mvt-web".to_string(),
            store_name: "analysisResults".to_string(),
            version: SCHEMA_VERSION,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub mod native {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, RwLock};

    #[derive(Default)]
    struct Inner {
        next_id: u32,
        records: BTreeMap<u32, String>,
    }

    /// In-memory result store for native builds.
    ///
    /// Records are kept as JSON so the round trip matches what the
    /// IndexedDB store does. Identifiers start at 1 and are never reused,
    /// even after `clear_all`.
    #[derive(Clone, Default)]
    pub struct MemoryStore {
        inner: Arc<RwLock<Inner>>,
    }

    impl ResultStore for MemoryStore {
        async fn save(&self, record: &AnalysisRecord) -> Result<RecordId, StorageError> {
            let json = serde_json::to_string(record)
                .map_err(|e| StorageError::SerializationError(e.to_string()))?;
            let mut inner = self
                .inner
                .write()
                .map_err(|e| StorageError::WriteError(e.to_string()))?;
            inner.next_id += 1;
            let id = inner.next_id;
            inner.records.insert(id, json);
            Ok(RecordId(id))
        }

        async fn get_all(&self) -> Result<Vec<StoredRecord>, StorageError> {
            let inner = self
                .inner
                .read()
                .map_err(|e| StorageError::ReadError(e.to_string()))?;
            inner
                .records
                .iter()
                .map(|(id, json)| decode(*id, json))
                .collect()
        }

        async fn get_by_id(&self, id: RecordId) -> Result<Option<StoredRecord>, StorageError> {
            let inner = self
                .inner
                .read()
                .map_err(|e| StorageError::ReadError(e.to_string()))?;
            inner
                .records
                .get(&id.0)
                .map(|json| decode(id.0, json))
                .transpose()
        }

        async fn delete_by_id(&self, id: RecordId) -> Result<bool, StorageError> {
            self.inner
                .write()
                .map_err(|e| StorageError::WriteError(e.to_string()))?
                .records
                .remove(&id.0);
            Ok(true)
        }

        async fn clear_all(&self) -> Result<(), StorageError> {
            self.inner
                .write()
                .map_err(|e| StorageError::WriteError(e.to_string()))?
                .records
                .clear();
            Ok(())
        }
    }

    fn decode(id: u32, json: &str) -> Result<StoredRecord, StorageError> {
        let record = serde_json::from_str(json)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        Ok(StoredRecord {
            id: RecordId(id),
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::native::MemoryStore;
    use super::*;
    use pollster::block_on;

    fn message(category: &str, text: &str) -> DeviceMessage {
        DeviceMessage {
            category: category.to_string(),
            message: text.to_string(),
            original_message: None,
        }
    }

    fn sample_record() -> AnalysisRecord {
        AnalysisRecord {
            saved_at: 1_700_000_000_000,
            serial: Some("emulator-5554".to_string()),
            messages: vec![
                message("Informativo", "Device connected"),
                message("Aplicativos Suspeitos", "com.example.spy flagged"),
            ],
        }
    }

    #[test]
    fn test_save_then_get_by_id_returns_equal_record() {
        let store = MemoryStore::default();
        let record = sample_record();

        let id = block_on(store.save(&record)).unwrap();
        let stored = block_on(store.get_by_id(id)).unwrap().unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.record, record);
    }

    #[test]
    fn test_ids_strictly_increase() {
        let store = MemoryStore::default();
        let record = sample_record();

        let ids: Vec<RecordId> = (0..5)
            .map(|_| block_on(store.save(&record)).unwrap())
            .collect();

        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should precede {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_ids_not_reused_after_clear() {
        let store = MemoryStore::default();
        let first = block_on(store.save(&sample_record())).unwrap();
        block_on(store.clear_all()).unwrap();
        let second = block_on(store.save(&sample_record())).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_clear_all_empties_store() {
        let store = MemoryStore::default();
        block_on(store.save(&sample_record())).unwrap();
        block_on(store.save(&sample_record())).unwrap();

        block_on(store.clear_all()).unwrap();

        assert!(block_on(store.get_all()).unwrap().is_empty());
    }

    #[test]
    fn test_delete_missing_id_succeeds() {
        let store = MemoryStore::default();
        assert!(block_on(store.delete_by_id(RecordId(42))).unwrap());
    }

    #[test]
    fn test_delete_removes_only_that_record() {
        let store = MemoryStore::default();
        let a = block_on(store.save(&sample_record())).unwrap();
        let b = block_on(store.save(&sample_record())).unwrap();

        block_on(store.delete_by_id(a)).unwrap();

        assert!(block_on(store.get_by_id(a)).unwrap().is_none());
        let remaining = block_on(store.get_all()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b);
    }

    #[test]
    fn test_get_missing_id_is_none() {
        let store = MemoryStore::default();
        assert!(block_on(store.get_by_id(RecordId(7))).unwrap().is_none());
    }

    #[test]
    fn test_record_id_from_key_rejects_out_of_range() {
        assert_eq!(RecordId::from_key(1.0), Some(RecordId(1)));
        assert_eq!(RecordId::from_key(4_294_967_295.0), Some(RecordId(u32::MAX)));
        assert_eq!(RecordId::from_key(4_294_967_296.0), None);
        assert_eq!(RecordId::from_key(9_007_199_254_740_991.0), None);
        assert_eq!(RecordId::from_key(2.5), None);
        assert_eq!(RecordId::from_key(0.0), None);
        assert_eq!(RecordId::from_key(f64::NAN), None);
    }

    #[test]
    fn test_stored_record_json_shape() {
        let stored = StoredRecord {
            id: RecordId(3),
            record: sample_record(),
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["saved_at"], 1_700_000_000_000_i64);
        assert_eq!(json["messages"][1]["category"], "Aplicativos Suspeitos");
    }
}

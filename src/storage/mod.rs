//! Durable key-value storage for client state.
//!
//! Everything the client remembers across restarts (cached backend payloads,
//! chat history, preferences, drafts) lives under an independent string key.
//! There is no cross-key transaction: each key is written on its own.
//!
//! `PersistentStore` is the typed front door. It (de)serializes values as JSON
//! on top of any `KeyValueStore` backend.

pub mod file;
pub mod keys;
pub mod memory;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error for key '{key}': {message}")]
    Serialization { key: String, message: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Raw string storage backend.
pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Typed JSON wrapper over a `KeyValueStore`.
#[derive(Clone)]
pub struct PersistentStore {
    backend: Arc<dyn KeyValueStore>,
}

impl PersistentStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// In-memory store, mostly for tests.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Read and deserialize a value.
    ///
    /// Returns `Ok(None)` for a missing key and `StorageError::Serialization`
    /// when the stored text does not parse as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.backend.get_raw(key)? else {
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Serialization {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|e| StorageError::Serialization {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.backend.set_raw(key, &raw)
    }

    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.backend.remove(key)
    }

    pub fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.backend.get_raw(key)
    }

    pub fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.backend.set_raw(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_typed_roundtrip() {
        let store = PersistentStore::in_memory();
        let value = Sample {
            name: "draft".to_string(),
            count: 3,
        };

        store.set("sample", &value).unwrap();
        let loaded: Option<Sample> = store.get("sample").unwrap();
        assert_eq!(loaded, Some(value));
    }

    #[test]
    fn test_missing_key_is_none() {
        let store = PersistentStore::in_memory();
        let loaded: Option<Sample> = store.get("nothing").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_unparsable_value_is_serialization_error() {
        let store = PersistentStore::in_memory();
        store.set_raw("broken", "{not json").unwrap();

        let err = store.get::<Sample>("broken").unwrap_err();
        match err {
            StorageError::Serialization { key, .. } => assert_eq!(key, "broken"),
            other => panic!("Expected serialization error, got {:?}", other),
        }
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let store = PersistentStore::in_memory();
        assert!(store.remove("never-set").is_ok());
    }
}

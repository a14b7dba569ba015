//! File-backed key-value store.
//!
//! All keys live in a single JSON object file (`state.json`) inside the data
//! directory. The whole map is kept in memory and every mutation rewrites the
//! file atomically: write to a temp file, then rename over the original.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{KeyValueStore, StorageError};

const STATE_FILE: &str = "state.json";

pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store in `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(STATE_FILE);
        let entries = Self::load_entries(&path)?;

        tracing::debug!("Opened state store at {:?} ({} keys)", path, entries.len());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn load_entries(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        match serde_json::from_str(&contents) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!("State file {:?} is unreadable, starting empty: {}", path, e);
                Ok(BTreeMap::new())
            }
        }
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(entries).map_err(|e| {
            StorageError::Serialization {
                key: STATE_FILE.to_string(),
                message: e.to_string(),
            }
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        let previous = entries.insert(key.to_string(), value.to_string());

        if let Err(e) = self.flush(&entries) {
            // Keep memory consistent with what is on disk
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.flush(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_values_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = FileStore::open(temp_dir.path()).unwrap();
            store.set_raw("memo.draft", "\"buy milk\"").unwrap();
            store.set_raw("memo.last_target", "\"db1\"").unwrap();
        }

        let reopened = FileStore::open(temp_dir.path()).unwrap();
        assert_eq!(
            reopened.get_raw("memo.draft").unwrap(),
            Some("\"buy milk\"".to_string())
        );
        assert_eq!(
            reopened.get_raw("memo.last_target").unwrap(),
            Some("\"db1\"".to_string())
        );
    }

    #[test]
    fn test_remove_persists() {
        let temp_dir = TempDir::new().unwrap();

        let store = FileStore::open(temp_dir.path()).unwrap();
        store.set_raw("memo.draft", "\"x\"").unwrap();
        store.remove("memo.draft").unwrap();

        let reopened = FileStore::open(temp_dir.path()).unwrap();
        assert!(reopened.get_raw("memo.draft").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_state_file_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(STATE_FILE), "{{{ not json").unwrap();

        let store = FileStore::open(temp_dir.path()).unwrap();
        assert!(store.get_raw("anything").unwrap().is_none());

        // And it is writable again afterwards
        store.set_raw("k", "1").unwrap();
        assert_eq!(store.get_raw("k").unwrap(), Some("1".to_string()));
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();
        store.set_raw("k", "1").unwrap();

        assert!(store.path().exists());
        assert!(!temp_dir.path().join("state.json.tmp").exists());
    }
}

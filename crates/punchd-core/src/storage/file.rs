//! JSON-document store persisted under `~/.punchd/store.json`.
//!
//! The whole document is rewritten on every set; at this data volume
//! (a handful of keys) that is cheaper than maintaining a real database.
//! A corrupted document is logged and replaced with an empty one rather
//! than wedging every future refresh.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use super::{KeyValueStore, StorageError};

pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

pub fn default_store_path() -> Result<PathBuf, StorageError> {
    dirs::home_dir()
        .ok_or_else(|| StorageError::Unavailable {
            path: "~/.punchd/store.json".to_string(),
            message: "could not find home directory".to_string(),
        })
        .map(|home| home.join(".punchd").join("store.json"))
}

impl FileStore {
    /// Open (or create) the store at `path`, loading any existing document.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let entries = if path.exists() {
            let content = fs::read_to_string(path)?;
            match serde_json::from_str(&content) {
                Ok(existing) => existing,
                Err(e) => {
                    warn!(
                        event = "core.storage.document_parse_failed",
                        file_path = %path.display(),
                        error = %e,
                        "Existing store document is corrupted - starting fresh (previous data will be lost)"
                    );
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    /// Open the store at the default location, creating parent directories.
    pub fn open_default() -> Result<Self, StorageError> {
        let path = default_store_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(&path)
    }

    fn flush(&self, entries: &HashMap<String, serde_json::Value>) -> Result<(), StorageError> {
        let encoded =
            serde_json::to_string_pretty(entries).map_err(|e| StorageError::Serialization {
                key: "<document>".to_string(),
                message: e.to_string(),
            })?;
        fs::write(&self.path, encoded)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        self.flush(&entries)
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
        self.flush(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStore::open(&path).unwrap();
        store.set("k", serde_json::json!({"v": 7})).unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("k").unwrap(),
            Some(serde_json::json!({"v": 7}))
        );
    }

    #[test]
    fn test_corrupted_document_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.get("k").unwrap().is_none());

        // And the store is writable again afterwards
        store.set("k", serde_json::json!(1)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(serde_json::json!(1)));
    }

    #[test]
    fn test_clear_empties_document_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStore::open(&path).unwrap();
        store.set("a", serde_json::json!(1)).unwrap();
        store.clear().unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.get("a").unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let store = FileStore::open(&path).unwrap();
        assert!(store.get("anything").unwrap().is_none());
    }
}

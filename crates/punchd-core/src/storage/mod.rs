//! Persistent key-value store for attendance snapshots and login state.
//!
//! The store is the only durable shared state in the system. Writes are
//! last-writer-wins per key with no transactions; all cross-key
//! coordination happens at the orchestration layer (refresh mutex and
//! debounce), not here.

pub mod errors;
pub mod file;
pub mod keys;
pub mod memory;

use serde::{Deserialize, Serialize};

pub use errors::StorageError;
pub use file::FileStore;
pub use memory::MemoryStore;

/// Process-wide mapping from string keys to JSON values.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;
    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

/// Persisted portal login state, shown by the UI when no countdown renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    NoCookie,
    SessionExpired,
    SessionUp,
    Unknown,
}

/// Read a typed value from the store.
///
/// Decode failures are reported as [`StorageError::Serialization`]; a
/// missing key is `Ok(None)`.
pub fn get_typed<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key)? {
        Some(value) => {
            let typed = serde_json::from_value(value).map_err(|e| {
                StorageError::Serialization {
                    key: key.to_string(),
                    message: e.to_string(),
                }
            })?;
            Ok(Some(typed))
        }
        None => Ok(None),
    }
}

/// Write a typed value to the store.
pub fn set_typed<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let encoded = serde_json::to_value(value).map_err(|e| StorageError::Serialization {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    store.set(key, encoded)
}

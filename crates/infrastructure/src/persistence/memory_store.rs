//! In-memory key-value store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use passage_application::ports::{KeyValueStore, StorageError};

/// Key-value store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_write_read_remove() {
        let store = MemoryKeyValueStore::new();
        store.write("access_token", "T1").await.unwrap();
        assert_eq!(store.read("access_token").await.unwrap().as_deref(), Some("T1"));
        assert_eq!(store.len(), 1);

        store.remove("access_token").await.unwrap();
        store.remove("access_token").await.unwrap();
        assert!(store.is_empty());
    }
}

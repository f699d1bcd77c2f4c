//! Key-value persistence port
//!
//! The durable client storage behind the token store. Each key is
//! written or removed on its own, so one field never clobbers another.

use async_trait::async_trait;

/// Errors that can occur during key-value operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The backing store cannot be used.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// String key-value persistence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value. Returns `None` if the key was never written or was removed.
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a value, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if the value cannot be persisted.
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes a value. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

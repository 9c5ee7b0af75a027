//! Storage and persistence layer
//!
//! - Key-value abstraction over the platform secure store
//! - File system backend
//! - In-memory backend

mod file_system;
mod memory;

pub use file_system::FileStore;
pub use memory::MemoryStore;

use crate::error::StorageError;
use async_trait::async_trait;

/// Persistent key-value store for wallet records
///
/// A single `put` replaces the whole value for `key` or leaves the previous
/// value in place; readers never observe a partial write.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// `Ok(None)` when nothing is stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Deleting a missing key succeeds
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !key.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StorageError::Unavailable(format!("invalid storage key '{}'", key)))
    }
}

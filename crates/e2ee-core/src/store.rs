//! Key-value storage abstraction.
//!
//! The host platform provides a remote byte store addressed by string keys.
//! It has no transactions; some deployments additionally offer an atomic
//! compare-and-set, which callers detect through
//! [`KvStore::supports_compare_and_set`].
//!
//! [`MemoryKvStore`] backs tests and the development server.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage operation failed: {0}")]
    Backend(String),

    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("concurrent update conflict on key {0}")]
    Conflict(String),

    #[error("storage operation not supported: {0}")]
    Unsupported(&'static str),
}

/// Remote key-value store contract.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value. `Ok(None)` means the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove a key. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically replace `expected` with `new`. `expected == None` means
    /// "only if absent". Returns `Ok(false)` when the current value differs.
    async fn compare_and_set(
        &self,
        _key: &str,
        _expected: Option<&[u8]>,
        _new: &[u8],
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unsupported("compare_and_set"))
    }

    /// Whether [`KvStore::compare_and_set`] is implemented.
    fn supports_compare_and_set(&self) -> bool {
        false
    }
}

/// Run a store call under a deadline.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

/// In-process store keyed by string.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, StoreError> {
        // The entry guard holds the shard lock for the whole comparison.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if expected == Some(occupied.get().as_slice()) {
                    occupied.insert(new.to_vec());
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                if expected.is_none() {
                    vacant.insert(new.to_vec());
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    fn supports_compare_and_set(&self) -> bool {
        true
    }
}

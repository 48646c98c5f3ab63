//! GPG-encrypted private key backups.
//!
//! The blob is produced client-side and is opaque here.

use std::sync::Arc;
use std::time::Duration;

use crate::keys::backup_gpg_key;
use crate::store::{with_timeout, KvStore, StoreError};

#[derive(Clone)]
pub struct BackupStore {
    store: Arc<dyn KvStore>,
    op_timeout: Duration,
}

impl BackupStore {
    pub fn new(store: Arc<dyn KvStore>, op_timeout: Duration) -> Self {
        Self { store, op_timeout }
    }

    pub async fn store(&self, user_id: &str, backup: &str) -> Result<(), StoreError> {
        with_timeout(
            self.op_timeout,
            self.store.set(&backup_gpg_key(user_id), backup.as_bytes()),
        )
        .await
    }

    /// `Ok(None)` when the user has no backup configured.
    pub async fn get(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let data = with_timeout(self.op_timeout, self.store.get(&backup_gpg_key(user_id))).await?;
        Ok(data.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub async fn delete(&self, user_id: &str) -> Result<(), StoreError> {
        with_timeout(self.op_timeout, self.store.delete(&backup_gpg_key(user_id))).await
    }
}

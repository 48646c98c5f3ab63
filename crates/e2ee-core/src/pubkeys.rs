//! Per-user public key storage.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use e2ee_crypto::PubKey;
use thiserror::Error;
use tracing::debug;

use crate::host::{HostApi, HostError};
use crate::keys::pubkey_key;
use crate::store::{with_timeout, KvStore, StoreError};

#[derive(Debug, Error)]
pub enum PubKeyError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Host(#[from] HostError),

    /// A stored key exists but cannot be read. Never reported as "no key".
    #[error("stored public key for user {user_id} is corrupted: {source}")]
    Corrupted {
        user_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("public key encoding failed: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Public keys stored under `pubkey:<user>`.
#[derive(Clone)]
pub struct PubKeyStore {
    store: Arc<dyn KvStore>,
    op_timeout: Duration,
}

impl PubKeyStore {
    pub fn new(store: Arc<dyn KvStore>, op_timeout: Duration) -> Self {
        Self { store, op_timeout }
    }

    /// Store a user's key pair, replacing any previous one. Callers validate
    /// the pair first.
    pub async fn set(&self, user_id: &str, pubkey: &PubKey) -> Result<(), PubKeyError> {
        let data = serde_json::to_vec(pubkey).map_err(PubKeyError::Encode)?;
        with_timeout(self.op_timeout, self.store.set(&pubkey_key(user_id), &data)).await?;
        debug!("Stored public key for user {}", user_id);
        Ok(())
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<PubKey>, PubKeyError> {
        let data = with_timeout(self.op_timeout, self.store.get(&pubkey_key(user_id))).await?;
        let Some(data) = data else {
            return Ok(None);
        };
        let pubkey = serde_json::from_slice(&data).map_err(|source| PubKeyError::Corrupted {
            user_id: user_id.to_string(),
            source,
        })?;
        Ok(Some(pubkey))
    }

    /// Keys for several users; users without a key map to `None`.
    pub async fn get_many(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, Option<PubKey>>, PubKeyError> {
        let mut keys = HashMap::with_capacity(user_ids.len());
        for user_id in user_ids {
            let pubkey = self.get(user_id).await?;
            keys.insert(user_id.clone(), pubkey);
        }
        Ok(keys)
    }

    /// Whether anything is stored for the user, without decoding it.
    pub async fn has(&self, user_id: &str) -> Result<bool, StoreError> {
        let data = with_timeout(self.op_timeout, self.store.get(&pubkey_key(user_id))).await?;
        Ok(data.is_some())
    }

    /// Members of a channel that have not published a key, in listing order.
    pub async fn members_without_keys(
        &self,
        host: &dyn HostApi,
        channel_id: &str,
    ) -> Result<Vec<String>, PubKeyError> {
        let per_page = host.max_users_per_team().await?;
        let members = host.get_channel_members(channel_id, 0, per_page).await?;

        let mut missing = Vec::new();
        for member in members {
            if !self.has(&member.user_id).await? {
                missing.push(member.user_id);
            }
        }
        Ok(missing)
    }
}

//! Per-channel encryption mode.
//!
//! The mode lives in the remote store under `chanEncrMethod:<channel>` as a
//! JSON integer. Absence means [`ChannelEncryptionMode::None`].
//!
//! Transitions go through [`ChannelModeManager::set_if_different`], which
//! reports whether the stored value actually changed. The store offers no
//! transactions, so the read-compare-write sequence is serialized by a
//! process-local lock table sharded by channel id. When the store provides
//! compare-and-set the write is conditional on the value just read, which
//! also closes the race between processes. Without it, two processes can
//! both read the old value before either writes and one update is lost.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::keys::channel_mode_key;
use crate::store::{with_timeout, KvStore, StoreError};

/// Number of lock shards used by [`ChannelModeManager::new`].
pub const DEFAULT_LOCK_SHARDS: usize = 64;

/// Read/compare/CAS rounds before giving up on a contended key.
const MAX_CAS_ATTEMPTS: usize = 8;

/// Encryption mode of a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChannelEncryptionMode {
    /// Messages are not encrypted.
    #[default]
    None,
    /// Messages are end-to-end encrypted between members.
    P2P,
}

impl ChannelEncryptionMode {
    /// Stored integer tag. Fixed, independent of declaration order.
    pub const fn tag(self) -> u8 {
        match self {
            Self::None => 0,
            Self::P2P => 1,
        }
    }

    pub const fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0 => Some(Self::None),
            1 => Some(Self::P2P),
            _ => None,
        }
    }

    /// Name used on the HTTP surface and in messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::P2P => "p2p",
        }
    }

    /// Parse a mode name. Unknown names map to `None`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "p2p" => Self::P2P,
            _ => Self::None,
        }
    }

    /// Storage encoding: the tag as a JSON number.
    pub fn encode(self) -> Vec<u8> {
        self.tag().to_string().into_bytes()
    }

    /// Decode a stored value; `None` if it is not a known tag.
    pub fn decode(raw: &[u8]) -> Option<Self> {
        serde_json::from_slice::<u64>(raw)
            .ok()
            .and_then(Self::from_tag)
    }
}

impl fmt::Display for ChannelEncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads and transitions channel encryption modes.
pub struct ChannelModeManager {
    store: Arc<dyn KvStore>,
    shards: Box<[Mutex<()>]>,
    op_timeout: Duration,
}

impl ChannelModeManager {
    pub fn new(store: Arc<dyn KvStore>, op_timeout: Duration) -> Self {
        Self::with_shards(store, op_timeout, DEFAULT_LOCK_SHARDS)
    }

    pub fn with_shards(store: Arc<dyn KvStore>, op_timeout: Duration, shards: usize) -> Self {
        let shards = (0..shards.max(1)).map(|_| Mutex::new(())).collect();
        Self {
            store,
            shards,
            op_timeout,
        }
    }

    /// Whether transitions are safe across processes.
    pub fn is_atomic(&self) -> bool {
        self.store.supports_compare_and_set()
    }

    fn lock_for(&self, channel_id: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        channel_id.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    /// Current mode of a channel.
    ///
    /// Never fails: absence, a failed or timed-out read, or an undecodable
    /// value all yield [`ChannelEncryptionMode::None`], the platform default.
    pub async fn get(&self, channel_id: &str) -> ChannelEncryptionMode {
        let key = channel_mode_key(channel_id);
        match with_timeout(self.op_timeout, self.store.get(&key)).await {
            Ok(Some(raw)) => decode_or_default(&key, &raw),
            Ok(None) => ChannelEncryptionMode::None,
            Err(e) => {
                warn!("Reading {} failed, treating as none: {}", key, e);
                ChannelEncryptionMode::None
            }
        }
    }

    /// Store `new_mode` unless it is already the current mode.
    ///
    /// Returns `Ok(true)` if the stored mode changed, `Ok(false)` if it was
    /// already `new_mode` (no write is issued). Store failures are returned
    /// without retrying the write.
    pub async fn set_if_different(
        &self,
        channel_id: &str,
        new_mode: ChannelEncryptionMode,
    ) -> Result<bool, StoreError> {
        let _guard = self.lock_for(channel_id).lock().await;
        let key = channel_mode_key(channel_id);
        let encoded = new_mode.encode();

        if !self.store.supports_compare_and_set() {
            let raw = with_timeout(self.op_timeout, self.store.get(&key)).await?;
            if current_mode(&key, raw.as_deref()) == new_mode {
                return Ok(false);
            }
            with_timeout(self.op_timeout, self.store.set(&key, &encoded)).await?;
            info!("Channel {} encryption mode set to {}", channel_id, new_mode);
            return Ok(true);
        }

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let raw = with_timeout(self.op_timeout, self.store.get(&key)).await?;
            if current_mode(&key, raw.as_deref()) == new_mode {
                return Ok(false);
            }
            let swapped = with_timeout(
                self.op_timeout,
                self.store.compare_and_set(&key, raw.as_deref(), &encoded),
            )
            .await?;
            if swapped {
                info!("Channel {} encryption mode set to {}", channel_id, new_mode);
                return Ok(true);
            }
            debug!("Lost compare-and-set race on {} (attempt {})", key, attempt);
        }

        warn!("Giving up on {} after {} contended attempts", key, MAX_CAS_ATTEMPTS);
        Err(StoreError::Conflict(key))
    }
}

fn current_mode(key: &str, raw: Option<&[u8]>) -> ChannelEncryptionMode {
    raw.map_or(ChannelEncryptionMode::None, |raw| decode_or_default(key, raw))
}

fn decode_or_default(key: &str, raw: &[u8]) -> ChannelEncryptionMode {
    ChannelEncryptionMode::decode(raw).unwrap_or_else(|| {
        warn!("Undecodable value under {}, treating as none", key);
        ChannelEncryptionMode::None
    })
}

//! e2ee-core: storage and integration layer for end-to-end encrypted channels
//!
//! Public keys, private key backups and per-channel encryption modes are
//! persisted in the host's key-value store. The host platform itself is
//! reached through [`host::HostApi`].

#![forbid(unsafe_code)]

pub mod backup;
pub mod channel_mode;
pub mod gpg;
#[cfg(feature = "hkp")]
pub mod hkp;
pub mod host;
pub mod keys;
pub mod pubkeys;
pub mod store;
pub mod testing;

pub use backup::BackupStore;
pub use channel_mode::{ChannelEncryptionMode, ChannelModeManager};
pub use gpg::{GpgError, KeyListing};
#[cfg(feature = "hkp")]
pub use hkp::HkpClient;
pub use host::{HostApi, HostError};
pub use pubkeys::{PubKeyError, PubKeyStore};
pub use store::{KvStore, MemoryKvStore, StoreError};

#[cfg(test)]
mod proptests;

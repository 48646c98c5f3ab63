//! Plugin error types.

use e2ee_core::{GpgError, HostError, PubKeyError, StoreError};
use e2ee_crypto::KeyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Not authorized")]
    Unauthorized,

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("invalid elliptic curve key")]
    InvalidKey(#[source] KeyError),

    #[error("user {user_id} is not a member of channel {channel_id}")]
    NotChannelMember {
        user_id: String,
        channel_id: String,
        #[source]
        source: HostError,
    },

    #[error("unable to find a GPG backup")]
    NoBackup,

    #[error("unknown command {0}")]
    UnknownCommand(String),

    #[error("Error while sending GPG backup: {0}")]
    BackupMail(#[source] HostError),

    #[error("Unable to get GPG key for '{email}': {source}")]
    Gpg {
        email: String,
        #[source]
        source: GpgError,
    },

    #[error("key server client setup failed: {0}")]
    KeyServerSetup(#[source] GpgError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    PubKey(#[from] PubKeyError),

    #[error(transparent)]
    Host(#[from] HostError),
}

//! Store key namespacing.
//!
//! These prefixes are shared with existing deployments and must not change.

const PUBKEY_PREFIX: &str = "pubkey:";
const BACKUP_GPG_PREFIX: &str = "backup_gpg:";
const CHANNEL_MODE_PREFIX: &str = "chanEncrMethod:";

/// Key holding a user's public key pair.
pub fn pubkey_key(user_id: &str) -> String {
    format!("{PUBKEY_PREFIX}{user_id}")
}

/// Key holding a user's GPG-encrypted private key backup.
pub fn backup_gpg_key(user_id: &str) -> String {
    format!("{BACKUP_GPG_PREFIX}{user_id}")
}

/// Key holding a channel's encryption mode.
pub fn channel_mode_key(channel_id: &str) -> String {
    format!("{CHANNEL_MODE_PREFIX}{channel_id}")
}

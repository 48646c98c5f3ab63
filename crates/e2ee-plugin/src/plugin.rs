//! Plugin state and the operations behind the HTTP API.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use e2ee_core::channel_mode::{ChannelEncryptionMode, ChannelModeManager};
use e2ee_core::host::{BotSpec, Broadcast, HostApi, Post};
use e2ee_core::{BackupStore, HkpClient, KvStore, PubKeyStore};
use e2ee_crypto::PubKey;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::commands::command_spec;
use crate::config::PluginConfig;
use crate::error::PluginError;

pub const BOT_USERNAME: &str = "e2ee";
pub const BOT_DISPLAY_NAME: &str = "E2EE";
pub const BOT_DESCRIPTION: &str = "Created by the E2EE plugin.";

pub const EVENT_NEW_PUBKEY: &str = "newPubkey";
pub const EVENT_CHANNEL_STATE_CHANGED: &str = "channelStateChanged";

const BACKUP_MAIL_SUBJECT: &str = "Mattermost E2EE private key backup";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushPubKeyRequest {
    pub pubkey: PubKey,
    /// Absent means the user no longer wants a backup.
    #[serde(rename = "backupGPG", default)]
    pub backup_gpg: Option<String>,
}

pub struct Plugin {
    config: PluginConfig,
    host: Arc<dyn HostApi>,
    pubkeys: PubKeyStore,
    backups: BackupStore,
    modes: ChannelModeManager,
    hkp: HkpClient,
    bot_user_id: OnceLock<String>,
}

impl Plugin {
    pub fn new(
        config: PluginConfig,
        store: Arc<dyn KvStore>,
        host: Arc<dyn HostApi>,
    ) -> Result<Self, PluginError> {
        let kv_timeout = config.kv_timeout();
        let hkp = HkpClient::new(config.gpg_key_server.clone(), config.http_timeout())
            .map_err(PluginError::KeyServerSetup)?;
        let modes =
            ChannelModeManager::with_shards(store.clone(), kv_timeout, config.mode_lock_shards);
        if !modes.is_atomic() {
            warn!(
                "Store has no compare-and-set, channel mode changes are only serialized within this process"
            );
        }

        Ok(Self {
            pubkeys: PubKeyStore::new(store.clone(), kv_timeout),
            backups: BackupStore::new(store, kv_timeout),
            modes,
            hkp,
            host,
            config,
            bot_user_id: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub(crate) fn host(&self) -> &dyn HostApi {
        self.host.as_ref()
    }

    pub(crate) fn backups(&self) -> &BackupStore {
        &self.backups
    }

    pub(crate) fn modes(&self) -> &ChannelModeManager {
        &self.modes
    }

    /// Id of the plugin bot; empty before [`Plugin::activate`].
    pub fn bot_user_id(&self) -> &str {
        self.bot_user_id.get().map(String::as_str).unwrap_or_default()
    }

    /// Register the slash command and make sure the bot account exists.
    pub async fn activate(&self) -> Result<(), PluginError> {
        self.host.register_command(command_spec()).await?;

        let bot_id = self
            .host
            .ensure_bot(BotSpec {
                username: BOT_USERNAME.to_string(),
                display_name: BOT_DISPLAY_NAME.to_string(),
                description: BOT_DESCRIPTION.to_string(),
            })
            .await?;
        if self.bot_user_id.set(bot_id.clone()).is_err() {
            debug!("Plugin already activated");
        }
        info!("Plugin activated with bot user {}", bot_id);
        Ok(())
    }

    pub(crate) fn bot_post(&self, channel_id: &str, message: impl Into<String>) -> Post {
        Post::new(self.bot_user_id(), channel_id, message)
    }

    /// Validate and store a user's keys, then update their GPG backup.
    pub async fn push_pub_key(
        &self,
        user_id: &str,
        request: PushPubKeyRequest,
    ) -> Result<(), PluginError> {
        if let Err(e) = request.pubkey.check() {
            warn!("Rejected public key from user {}: {}", user_id, e);
            return Err(PluginError::InvalidKey(e));
        }

        self.pubkeys.set(user_id, &request.pubkey).await?;
        if let Err(e) = self
            .host
            .publish_event(
                EVENT_NEW_PUBKEY,
                json!({ "userID": user_id }),
                Broadcast::everyone_except(user_id),
            )
            .await
        {
            warn!("Failed to announce new key of user {}: {}", user_id, e);
        }

        match request.backup_gpg {
            None => self.backups.delete(user_id).await?,
            Some(backup) => {
                self.backups.store(user_id, &backup).await?;
                self.send_gpg_backup(user_id).await?;
            }
        }
        Ok(())
    }

    /// Mail the stored backup to the user.
    pub async fn send_gpg_backup(&self, user_id: &str) -> Result<(), PluginError> {
        let user = self.host.get_user(user_id).await?;
        let backup = self.backups.get(user_id).await?.ok_or(PluginError::NoBackup)?;
        self.host
            .send_mail(&user.email, BACKUP_MAIL_SUBJECT, &format!("<pre>{backup}</pre>"))
            .await
            .map_err(PluginError::BackupMail)
    }

    pub async fn get_pub_keys(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, Option<PubKey>>, PluginError> {
        Ok(self.pubkeys.get_many(user_ids).await?)
    }

    async fn require_member(&self, user_id: &str, channel_id: &str) -> Result<(), PluginError> {
        self.host
            .get_channel_member(channel_id, user_id)
            .await
            .map(|_| ())
            .map_err(|source| PluginError::NotChannelMember {
                user_id: user_id.to_string(),
                channel_id: channel_id.to_string(),
                source,
            })
    }

    pub async fn get_channel_mode(
        &self,
        user_id: &str,
        channel_id: &str,
    ) -> Result<ChannelEncryptionMode, PluginError> {
        self.require_member(user_id, channel_id).await?;
        Ok(self.modes.get(channel_id).await)
    }

    /// Change a channel's mode on behalf of a member and announce it.
    ///
    /// Returns whether the mode changed. An unchanged mode is reported to
    /// the caller only, through an ephemeral bot post.
    pub async fn set_channel_mode(
        &self,
        user_id: &str,
        channel_id: &str,
        mode: ChannelEncryptionMode,
    ) -> Result<bool, PluginError> {
        self.require_member(user_id, channel_id).await?;

        if !self.modes.set_if_different(channel_id, mode).await? {
            let notice = self.bot_post(
                channel_id,
                format!("Channel is already on encryption mode '{mode}'"),
            );
            if let Err(e) = self.host.send_ephemeral_post(user_id, notice).await {
                warn!("Failed to notify user {}: {}", user_id, e);
            }
            return Ok(false);
        }

        if let Err(e) = self
            .host
            .publish_event(
                EVENT_CHANNEL_STATE_CHANGED,
                json!({ "chanID": channel_id, "method": mode.as_str() }),
                Broadcast::channel(channel_id),
            )
            .await
        {
            warn!("Failed to broadcast mode change of channel {}: {}", channel_id, e);
        }

        let message = self.mode_announcement(user_id, channel_id, mode).await?;
        self.host.create_post(self.bot_post(channel_id, message)).await?;
        Ok(true)
    }

    async fn mode_announcement(
        &self,
        user_id: &str,
        channel_id: &str,
        mode: ChannelEncryptionMode,
    ) -> Result<String, PluginError> {
        let user = self.host.get_user(user_id).await?;
        if mode == ChannelEncryptionMode::None {
            return Ok(format!(
                "@all: messages on this channel **aren't encrypted anymore**. Set by @{}",
                user.username
            ));
        }

        let mut message = format!(
            "@all: messages on this channel are now encrypted. Set by @{}.\n\
             **WARNING**: people not in this channel won't be able to read the backlog.",
            user.username
        );
        let missing = self
            .pubkeys
            .members_without_keys(self.host.as_ref(), channel_id)
            .await?;
        if !missing.is_empty() {
            message.push_str(
                "\n**WARNING**: these people in the channel have not set up an encryption key, \
                 and therefore won't be able to read messages:",
            );
            for member_id in missing {
                let member = self.host.get_user(&member_id).await?;
                message.push_str(" @");
                message.push_str(&member.username);
            }
        }
        Ok(message)
    }

    /// Armored public GPG key of the user, from the configured key server.
    pub async fn get_gpg_pub_key(&self, user_id: &str) -> Result<String, PluginError> {
        let user = self.host.get_user(user_id).await?;
        match self.hkp.fetch_public_key(&user.email).await {
            Ok(key) => Ok(key),
            Err(source) => Err(PluginError::Gpg {
                email: user.email,
                source,
            }),
        }
    }
}

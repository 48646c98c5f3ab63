//! Chat host platform interface.
//!
//! Users, channels, posts, mail and real-time events belong to the host.
//! This module only describes the calls consumed from it; every call is a
//! fallible remote operation and errors are propagated as-is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by host platform calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("host call failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMember {
    pub channel_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Assigned by the host on creation.
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    pub message: String,
    /// Empty for ordinary posts.
    #[serde(default, rename = "type")]
    pub post_type: String,
}

impl Post {
    pub fn new(
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Audience of a real-time event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcast {
    /// Deliver to members of this channel only.
    pub channel_id: Option<String>,
    /// Deliver to this user only.
    pub user_id: Option<String>,
    /// Never deliver to these users.
    #[serde(default)]
    pub omit_users: Vec<String>,
}

impl Broadcast {
    pub fn channel(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: Some(channel_id.into()),
            ..Default::default()
        }
    }

    pub fn everyone_except(user_id: impl Into<String>) -> Self {
        Self {
            omit_users: vec![user_id.into()],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSpec {
    pub username: String,
    pub display_name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashCommand {
    pub trigger: String,
    pub display_name: String,
    pub description: String,
    pub auto_complete: bool,
    pub auto_complete_desc: String,
    pub auto_complete_hint: String,
}

/// Host platform calls used by the plugin.
#[async_trait]
pub trait HostApi: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<User, HostError>;

    /// Fails when the user is not a member of the channel.
    async fn get_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<ChannelMember, HostError>;

    async fn get_channel_members(
        &self,
        channel_id: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<ChannelMember>, HostError>;

    /// Host setting bounding a channel member listing.
    async fn max_users_per_team(&self) -> Result<usize, HostError>;

    async fn send_mail(&self, to: &str, subject: &str, html_body: &str) -> Result<(), HostError>;

    async fn create_post(&self, post: Post) -> Result<Post, HostError>;

    /// Post visible to `user_id` only.
    async fn send_ephemeral_post(&self, user_id: &str, post: Post) -> Result<Post, HostError>;

    async fn publish_event(
        &self,
        event: &str,
        payload: serde_json::Value,
        broadcast: Broadcast,
    ) -> Result<(), HostError>;

    async fn register_command(&self, command: SlashCommand) -> Result<(), HostError>;

    /// Create the bot account if needed and return its user id.
    async fn ensure_bot(&self, bot: BotSpec) -> Result<String, HostError>;
}

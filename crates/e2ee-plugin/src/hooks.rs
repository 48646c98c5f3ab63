//! Post filtering for encrypted channels.

use e2ee_core::channel_mode::ChannelEncryptionMode;
use e2ee_core::host::Post;
use tracing::debug;

use crate::plugin::Plugin;

/// Post type produced by clients for encrypted messages.
pub const ENCRYPTED_POST_TYPE: &str = "custom_e2ee";

pub const REJECT_UNENCRYPTED: &str = "Unencrypted messages can't be sent on an encrypted channel.";

/// Outcome of [`Plugin::message_will_be_posted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostVerdict {
    Allow,
    Reject(String),
}

impl Plugin {
    /// Decide whether a post may be created.
    ///
    /// Posts on channels in mode `None` always pass, as do posts by the
    /// plugin bot. On encrypted channels only posts of type
    /// [`ENCRYPTED_POST_TYPE`] pass, unless `bot_can_always_post` lets any
    /// bot through.
    pub async fn message_will_be_posted(&self, post: &Post) -> PostVerdict {
        if !self.bot_user_id().is_empty() && post.user_id == self.bot_user_id() {
            return PostVerdict::Allow;
        }

        if self.modes().get(&post.channel_id).await == ChannelEncryptionMode::None {
            return PostVerdict::Allow;
        }

        if self.config().bot_can_always_post {
            match self.host().get_user(&post.user_id).await {
                Ok(user) if user.is_bot => return PostVerdict::Allow,
                Ok(_) => {}
                Err(e) => {
                    return PostVerdict::Reject(format!("unable to check if user is a bot: {e}"))
                }
            }
        }

        if post.post_type != ENCRYPTED_POST_TYPE {
            debug!("Rejected plain post on encrypted channel {}", post.channel_id);
            return PostVerdict::Reject(REJECT_UNENCRYPTED.to_string());
        }

        PostVerdict::Allow
    }
}

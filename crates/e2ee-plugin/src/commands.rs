//! `/e2ee` slash command.

use e2ee_core::host::SlashCommand;

use crate::error::PluginError;
use crate::plugin::Plugin;

pub const TRIGGER: &str = "e2ee";

const HELP_TEXT: &str = "###### Mattermost E2EE Plugin - Slash command help
* |/e2ee help| - print this help message.
* |/e2ee init [--force] [gpg key fingerprint]| - initialize E2EE for your account. This will generate a new key for your session. Use --force to erase an existing key.
* |/e2ee activate| - encrypt the messages you send in this channel.
* |/e2ee deactivate| - do not encrypt the messages you send in this channel.
* |/e2ee import [private_key]| - import your private key into this device.
* |/e2ee show_backup| - show saved encrypted GPG backup.
";

pub(crate) fn command_spec() -> SlashCommand {
    SlashCommand {
        trigger: TRIGGER.to_string(),
        display_name: TRIGGER.to_string(),
        description: "End to end message encryption".to_string(),
        auto_complete: true,
        auto_complete_desc: "Available commands: init import help".to_string(),
        auto_complete_hint: "[command][subcommands]".to_string(),
    }
}

/// Invocation context of a slash command.
#[derive(Debug, Clone)]
pub struct CommandArgs {
    pub user_id: String,
    pub channel_id: String,
    /// Full command line, e.g. `/e2ee show_backup`.
    pub command: String,
}

impl Plugin {
    /// Run a slash command; replies are ephemeral bot posts to the caller.
    pub async fn execute_command(&self, args: &CommandArgs) -> Result<(), PluginError> {
        let mut words = args.command.split_whitespace();
        if words.next() != Some("/e2ee") {
            return Ok(());
        }

        match words.next().unwrap_or("help") {
            "help" => self.reply(args, HELP_TEXT).await,
            "show_backup" => {
                let backup = self
                    .backups()
                    .get(&args.user_id)
                    .await?
                    .ok_or(PluginError::NoBackup)?;
                self.reply(args, backup).await
            }
            other => Err(PluginError::UnknownCommand(other.to_string())),
        }
    }

    async fn reply(&self, args: &CommandArgs, text: impl Into<String>) -> Result<(), PluginError> {
        let post = self.bot_post(&args.channel_id, text);
        self.host().send_ephemeral_post(&args.user_id, post).await?;
        Ok(())
    }
}

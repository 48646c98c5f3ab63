//! Configuration management

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Plugin configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub listen_addr: SocketAddr,
    /// HKP server queried for users' public GPG keys.
    pub gpg_key_server: String,
    /// Let any bot account post plain messages on encrypted channels.
    pub bot_can_always_post: bool,
    pub kv_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub mode_lock_shards: usize,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8065)),
            gpg_key_server: "https://keys.openpgp.org".to_string(),
            bot_can_always_post: false,
            kv_timeout_secs: 5,
            http_timeout_secs: 5,
            mode_lock_shards: e2ee_core::channel_mode::DEFAULT_LOCK_SHARDS,
        }
    }
}

impl PluginConfig {
    /// Load configuration from environment variables and TOML file
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("E2EE_LISTEN_ADDR") {
            config.listen_addr = addr
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid listen_addr: {}", e)))?;
        }

        if let Ok(server) = std::env::var("E2EE_GPG_KEY_SERVER") {
            config.gpg_key_server = server;
        }

        if let Ok(enabled) = std::env::var("E2EE_BOT_CAN_ALWAYS_POST") {
            config.bot_can_always_post = enabled.parse().unwrap_or(config.bot_can_always_post);
        }

        if let Ok(secs) = std::env::var("E2EE_KV_TIMEOUT_SECS") {
            config.kv_timeout_secs = secs
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid kv_timeout_secs: {}", e)))?;
        }

        if let Ok(secs) = std::env::var("E2EE_HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = secs
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid http_timeout_secs: {}", e)))?;
        }

        if let Ok(shards) = std::env::var("E2EE_MODE_LOCK_SHARDS") {
            config.mode_lock_shards = shards
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid mode_lock_shards: {}", e)))?;
        }

        if let Ok(path) = std::env::var("E2EE_CONFIG") {
            config.load_from_toml(&path)?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Apply the keys present in a TOML file
    pub fn load_from_toml(&mut self, path: &str) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let toml_config: toml::Value = toml::from_str(&content)?;

        if let Some(addr) = toml_config.get("listen_addr").and_then(|v| v.as_str()) {
            self.listen_addr = addr
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid listen_addr in TOML: {}", e)))?;
        }

        if let Some(server) = toml_config.get("gpg_key_server").and_then(|v| v.as_str()) {
            self.gpg_key_server = server.to_string();
        }

        if let Some(enabled) = toml_config.get("bot_can_always_post").and_then(|v| v.as_bool()) {
            self.bot_can_always_post = enabled;
        }

        if let Some(secs) = toml_config.get("kv_timeout_secs").and_then(|v| v.as_integer()) {
            self.kv_timeout_secs = non_negative("kv_timeout_secs", secs)?;
        }

        if let Some(secs) = toml_config.get("http_timeout_secs").and_then(|v| v.as_integer()) {
            self.http_timeout_secs = non_negative("http_timeout_secs", secs)?;
        }

        if let Some(shards) = toml_config.get("mode_lock_shards").and_then(|v| v.as_integer()) {
            self.mode_lock_shards = non_negative("mode_lock_shards", shards)? as usize;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kv_timeout_secs == 0 {
            return Err(ConfigError::Invalid("kv_timeout_secs must be > 0".to_string()));
        }

        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid("http_timeout_secs must be > 0".to_string()));
        }

        if self.mode_lock_shards == 0 {
            return Err(ConfigError::Invalid("mode_lock_shards must be > 0".to_string()));
        }

        let server = &self.gpg_key_server;
        if !(server.starts_with("http://") || server.starts_with("https://")) {
            return Err(ConfigError::Invalid(
                "gpg_key_server must be an http:// or https:// URL".to_string(),
            ));
        }

        Ok(())
    }

    pub fn kv_timeout(&self) -> Duration {
        Duration::from_secs(self.kv_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn non_negative(name: &str, value: i64) -> Result<u64, ConfigError> {
    u64::try_from(value).map_err(|_| ConfigError::Invalid(format!("{} must not be negative", name)))
}

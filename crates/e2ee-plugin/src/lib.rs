//! e2ee-plugin: end-to-end encryption support for a channel-based chat host
//!
//! Distributes users' public keys, keeps per-channel encryption modes and
//! refuses plain posts on encrypted channels. Message encryption itself
//! happens in clients.

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod hooks;
pub mod plugin;
pub mod server;

pub use config::PluginConfig;
pub use error::PluginError;
pub use plugin::Plugin;
pub use server::PluginServer;

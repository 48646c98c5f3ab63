//! e2ee-plugin development server
//!
//! Runs the plugin API against an in-memory store and host.

use std::sync::Arc;

use anyhow::Result;
use e2ee_core::testing::MockHost;
use e2ee_core::MemoryKvStore;
use e2ee_plugin::{PluginConfig, PluginServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PluginConfig::load()?;

    let store = Arc::new(MemoryKvStore::new());
    let host = Arc::new(MockHost::new());
    let server = PluginServer::new(config, store, host).await?;
    server.run().await?;

    Ok(())
}

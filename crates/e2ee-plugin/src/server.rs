//! Plugin HTTP server

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use e2ee_core::{HostApi, KvStore};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api::{create_router, ApiState};
use crate::config::PluginConfig;
use crate::plugin::Plugin;

/// Deadline for a whole API request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// API router with tracing, panic recovery and request deadline layers.
pub fn app(plugin: Arc<Plugin>) -> Router {
    with_middleware(create_router(ApiState { plugin }))
}

fn with_middleware(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(recover_panic))
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
    )
}

fn recover_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic"
    };
    error!("Recovered from panic in request handler: {}", detail);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}

pub struct PluginServer {
    config: PluginConfig,
    plugin: Arc<Plugin>,
}

impl PluginServer {
    pub async fn new(
        config: PluginConfig,
        store: Arc<dyn KvStore>,
        host: Arc<dyn HostApi>,
    ) -> Result<Self> {
        let plugin = Arc::new(Plugin::new(config.clone(), store, host)?);
        plugin.activate().await?;
        Ok(Self { config, plugin })
    }

    pub fn plugin(&self) -> Arc<Plugin> {
        self.plugin.clone()
    }

    pub async fn run(&self) -> Result<()> {
        info!("Starting E2EE plugin on {}", self.config.listen_addr);

        let app = app(self.plugin.clone());
        let listener = tokio::net::TcpListener::bind(&self.config.listen_addr).await?;
        info!("HTTP server listening on {}", self.config.listen_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutting down");
            })
            .await?;

        Ok(())
    }
}

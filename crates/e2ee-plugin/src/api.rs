//! HTTP API endpoints

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use e2ee_core::channel_mode::ChannelEncryptionMode;
use e2ee_core::GpgError;
use e2ee_crypto::PubKey;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::PluginError;
use crate::plugin::{Plugin, PushPubKeyRequest};

/// Header set by the host on authenticated requests.
pub const USER_ID_HEADER: &str = "Mattermost-User-ID";

#[derive(Clone)]
pub struct ApiState {
    pub plugin: Arc<Plugin>,
}

/// Caller identity attached by [`require_user`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

/// Create API router
pub fn create_router(state: ApiState) -> Router {
    let api = Router::new()
        .route("/pubkey/push", post(push_pub_key))
        .route("/pubkey/get", post(get_pub_keys))
        .route(
            "/channel/encryption_method",
            get(get_encryption_method).post(set_encryption_method),
        )
        .route("/gpg/get_pub_key", get(get_gpg_pub_key))
        .route_layer(middleware::from_fn(require_user));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn require_user(mut req: Request, next: Next) -> Response {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    match user_id {
        Some(user_id) => {
            req.extensions_mut().insert(AuthUser(user_id));
            next.run(req).await
        }
        None => PluginError::Unauthorized.into_response(),
    }
}

impl IntoResponse for PluginError {
    fn into_response(self) -> Response {
        let status = match &self {
            PluginError::Unauthorized | PluginError::NotChannelMember { .. } => {
                StatusCode::UNAUTHORIZED
            }
            PluginError::BadRequest(_)
            | PluginError::InvalidKey(_)
            | PluginError::UnknownCommand(_) => StatusCode::BAD_REQUEST,
            PluginError::NoBackup => StatusCode::NOT_FOUND,
            PluginError::Gpg {
                source: GpgError::Status(code),
                ..
            } => StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

/// POST /api/v1/pubkey/push - Publish the caller's keys
async fn push_pub_key(
    State(state): State<ApiState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    body: Bytes,
) -> Response {
    let request: PushPubKeyRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Failed to parse key push from {}: {}", user_id, e);
            return PluginError::BadRequest(e.to_string()).into_response();
        }
    };

    match state.plugin.push_pub_key(&user_id, request).await {
        Ok(()) => {
            info!("Stored public key for {}", user_id);
            StatusCode::OK.into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct GetPubKeysRequest {
    #[serde(rename = "userIds", default)]
    user_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct GetPubKeysResponse {
    #[serde(rename = "pubKeys")]
    pub_keys: HashMap<String, Option<PubKey>>,
}

/// POST /api/v1/pubkey/get - Look up keys of several users
async fn get_pub_keys(State(state): State<ApiState>, body: Bytes) -> Response {
    let request: GetPubKeysRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return PluginError::BadRequest(e.to_string()).into_response(),
    };

    match state.plugin.get_pub_keys(&request.user_ids).await {
        Ok(pub_keys) => Json(GetPubKeysResponse { pub_keys }).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ChannelQuery {
    #[serde(rename = "chanID", default)]
    chan_id: String,
    #[serde(default)]
    method: String,
}

#[derive(Debug, Serialize)]
struct EncryptionMethodResponse {
    method: &'static str,
}

/// GET /api/v1/channel/encryption_method?chanID=
async fn get_encryption_method(
    State(state): State<ApiState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<ChannelQuery>,
) -> Response {
    match state.plugin.get_channel_mode(&user_id, &query.chan_id).await {
        Ok(mode) => Json(EncryptionMethodResponse {
            method: mode.as_str(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/v1/channel/encryption_method?chanID=&method=
async fn set_encryption_method(
    State(state): State<ApiState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<ChannelQuery>,
) -> Response {
    let mode = ChannelEncryptionMode::from_name(&query.method);
    match state
        .plugin
        .set_channel_mode(&user_id, &query.chan_id, mode)
        .await
    {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Serialize)]
struct GpgPubKeyResponse {
    key: String,
}

/// GET /api/v1/gpg/get_pub_key - Caller's public GPG key from the key server
async fn get_gpg_pub_key(
    State(state): State<ApiState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Response {
    match state.plugin.get_gpg_pub_key(&user_id).await {
        Ok(key) => Json(GpgPubKeyResponse { key }).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /health - Health check
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

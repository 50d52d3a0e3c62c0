//! Session lifecycle endpoints
//!
//! Connect, list, and disconnect remote sessions. Credentials appear only
//! in the connect request body; responses carry the sanitized
//! [`ConnectionInfo`] view.

use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::models::{ConnectionInfo, ConnectionType};
use crate::transport::ConnectParams;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub protocol: ConnectionType,
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Root directory for the local transport.
    #[serde(default)]
    pub root: Option<String>,
}

fn default_port(protocol: ConnectionType) -> u16 {
    match protocol {
        ConnectionType::Sftp => 22,
        ConnectionType::Ftp | ConnectionType::Ftps => 21,
        ConnectionType::Local => 0,
    }
}

/// POST /api/sessions
pub async fn connect(
    State(state): State<AppState>,
    Json(request): Json<ConnectRequest>,
) -> ApiResult<Json<ConnectionInfo>> {
    if request.host.is_empty() {
        return Err(ApiError::BadRequest("host must not be empty".to_string()));
    }
    let params = ConnectParams {
        protocol: request.protocol,
        host: request.host,
        port: request.port.unwrap_or_else(|| default_port(request.protocol)),
        username: request.username,
        password: request.password,
        root: request.root,
        io_timeout: state.config.io_timeout(),
    };
    let info = state.connections.connect(&params).await?;
    Ok(Json(info))
}

/// GET /api/sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<ConnectionInfo>> {
    let mut sessions = state.connections.list().await;
    sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Json(sessions)
}

/// DELETE /api/sessions/:session_id
pub async fn disconnect(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if state.connections.disconnect(&session_id).await {
        Ok(Json(json!({ "disconnected": session_id })))
    } else {
        Err(ApiError::UnknownSession(session_id))
    }
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", post(connect).get(list_sessions))
        .route("/api/sessions/:session_id", delete(disconnect))
}

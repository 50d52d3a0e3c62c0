//! Error types for skyqc-sa

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::transport::TransportError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Unknown or expired session (404)
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// Transport failure against the remote host
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// skyqc-common error
    #[error("Common error: {0}")]
    Common(#[from] skyqc_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::UnknownSession(msg) => (StatusCode::NOT_FOUND, "UNKNOWN_SESSION", msg),
            ApiError::Transport(ref err) if err.is_timeout() => (
                StatusCode::GATEWAY_TIMEOUT,
                "UPSTREAM_TIMEOUT",
                err.to_string(),
            ),
            ApiError::Transport(TransportError::NotFound(path)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", path)
            }
            ApiError::Transport(ref err) => {
                (StatusCode::BAD_GATEWAY, "TRANSPORT_ERROR", err.to_string())
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_timeout_maps_to_gateway_timeout() {
        let err = ApiError::Transport(TransportError::Timeout("read".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_unknown_session_maps_to_not_found() {
        let err = ApiError::UnknownSession("abc".into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

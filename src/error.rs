// ==============================================================================
// error.rs - Gateway Error Taxonomy
// ==============================================================================
// Description: Auth and proxy errors and their mapping to HTTP responses
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Failures of the Auth Gate. Every variant ends the request with 401.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,

    #[error("malformed credential")]
    MalformedCredential,

    #[error("invalid token")]
    InvalidToken,
}

/// Failures of the Forwarding Router.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no route matched {path}")]
    NoRouteMatched { path: String },

    #[error("backend unreachable at {target}: {reason}")]
    BackendUnreachable { target: String, reason: String },

    #[error("backend request to {target} failed: {reason}")]
    BackendRequestFailed { target: String, reason: String },

    /// Only observable after headers went out; logged, never sent as a status.
    #[error("response write to caller failed after {bytes_written} bytes")]
    ResponseWriteFailed { bytes_written: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

/// Anything that can terminate a request inside the gateway pipeline
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Proxy(ProxyError::NoRouteMatched { .. }) => StatusCode::NOT_FOUND,
            GatewayError::Proxy(ProxyError::BackendUnreachable { .. })
            | GatewayError::Proxy(ProxyError::BackendRequestFailed { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::Proxy(ProxyError::ResponseWriteFailed { .. })
            | GatewayError::Proxy(ProxyError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code placed in the JSON body
    pub fn code(&self) -> &'static str {
        match self.status_code() {
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::BAD_GATEWAY => "bad_gateway",
            _ => "internal_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
            error!("Internal error: {}", self);
        }

        // The auth failure reason stays in the logs; callers only see "unauthorized"
        (status, Json(ErrorResponse::new(self.code()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_auth_errors_map_to_unauthorized() {
        for err in [
            AuthError::MissingCredential,
            AuthError::MalformedCredential,
            AuthError::InvalidToken,
        ] {
            assert_eq!(GatewayError::from(err).status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_proxy_error_status_codes() {
        let cases = [
            (
                ProxyError::NoRouteMatched { path: "/nope".into() },
                StatusCode::NOT_FOUND,
            ),
            (
                ProxyError::BackendUnreachable {
                    target: "http://127.0.0.1:1".into(),
                    reason: "connection refused".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                ProxyError::BackendRequestFailed {
                    target: "http://127.0.0.1:1".into(),
                    reason: "broken pipe".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                ProxyError::ResponseWriteFailed { bytes_written: 10 },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ProxyError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(GatewayError::from(err).status_code(), expected);
        }
    }

    #[tokio::test]
    async fn test_unauthorized_body_hides_reason() {
        let response = GatewayError::from(AuthError::InvalidToken).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "unauthorized");
        assert!(!body.windows(7).any(|w| w == b"invalid"));
    }

    #[tokio::test]
    async fn test_not_found_body_is_minimal() {
        let response = GatewayError::from(ProxyError::NoRouteMatched {
            path: "/internal/admin".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "not_found");
        assert!(json["details"].is_null());
    }
}

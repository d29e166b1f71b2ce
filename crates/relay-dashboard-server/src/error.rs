//! Error types for the edge server.
//!
//! [`EdgeError`] unifies every per-request and per-session failure mode
//! into a single enum that converts into a structured Axum response via
//! its [`IntoResponse`] implementation. Per-request errors never take the
//! process down; only [`EdgeError::Config`] is fatal, and only at startup.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_dashboard_fixtures::FixtureError;
use relay_dashboard_types::{ErrorBody, ErrorCode};
use tracing::error;

/// Errors that can occur in the edge server.
#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    /// The daemon was unreachable, timed out, or answered with a 5xx.
    #[error("upstream {target} unavailable: {reason}")]
    UpstreamUnavailable {
        /// The URL the call was made against.
        target: String,
        /// What went wrong.
        reason: String,
    },

    /// Unknown API path or fixture resource.
    #[error("not found: {path}")]
    NotFound {
        /// The request path.
        path: String,
    },

    /// The upstream stream handshake could not be completed.
    #[error("stream upgrade to {target} failed: {reason}")]
    UpgradeFailed {
        /// The upstream `WebSocket` URL.
        target: String,
        /// What went wrong.
        reason: String,
    },

    /// The request body exceeded the forwarding limit or could not be read.
    #[error("request body rejected: {0}")]
    PayloadTooLarge(String),

    /// Invalid startup configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A response payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EdgeError {
    /// `NotFound` for a fixture lookup miss, reported against the request path.
    pub fn from_fixture(err: &FixtureError, path: &str) -> Self {
        match err {
            FixtureError::NotFound(_) => Self::NotFound {
                path: path.to_owned(),
            },
            other => Self::Config(other.to_string()),
        }
    }

    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::UpstreamUnavailable { .. } | Self::UpgradeFailed { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Config(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EdgeError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::NotFound { path } => {
                (status, axum::Json(ErrorBody::not_found(path))).into_response()
            }
            Self::UpstreamUnavailable { .. } => (
                status,
                axum::Json(ErrorBody::new(ErrorCode::UpstreamUnavailable)),
            )
                .into_response(),
            Self::UpgradeFailed { .. } => {
                (status, axum::Json(ErrorBody::new(ErrorCode::UpgradeFailed))).into_response()
            }
            Self::PayloadTooLarge(_) => (
                status,
                axum::Json(ErrorBody::new(ErrorCode::PayloadTooLarge)),
            )
                .into_response(),
            Self::Config(_) | Self::Serialization(_) => {
                error!(error = %self, "internal error while answering request");
                (status, axum::Json(ErrorBody::new(ErrorCode::Internal))).into_response()
            }
        }
    }
}

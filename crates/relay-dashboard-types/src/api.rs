//! HTTP response envelopes.
//!
//! Successful daemon responses wrap their payload as
//! `{"success": true, "data": ...}`. Failures produced by the edge server
//! itself use [`ErrorBody`], whose `error` field is a stable
//! machine-readable [`ErrorCode`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Success envelope around an API payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Always `true` for this envelope.
    pub success: bool,
    /// The resource payload.
    pub data: T,
}

impl<T> ApiEnvelope<T> {
    /// Wrap a payload in a success envelope.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Stable error codes surfaced to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Unknown API path or fixture resource.
    NotFound,
    /// The relay daemon could not be reached, timed out, or failed.
    UpstreamUnavailable,
    /// A stream connection to the daemon could not be established.
    UpgradeFailed,
    /// The request body exceeded the forwarding limit.
    PayloadTooLarge,
    /// The edge server failed to build a response.
    Internal,
}

impl ErrorCode {
    /// The wire form of the code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::UpgradeFailed => "upgrade_failed",
            Self::PayloadTooLarge => "payload_too_large",
            Self::Internal => "internal",
        }
    }
}

/// Structured error payload, e.g. `{"success":false,"error":"not_found","path":"/api/x"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ErrorBody {
    /// Always `false` for this payload.
    pub success: bool,
    /// Machine-readable error code.
    pub error: ErrorCode,
    /// The request path, present for `not_found`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub path: Option<String>,
}

impl ErrorBody {
    /// Error body without a path.
    pub const fn new(error: ErrorCode) -> Self {
        Self {
            success: false,
            error,
            path: None,
        }
    }

    /// `not_found` error body for `path`.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorCode::NotFound,
            path: Some(path.into()),
        }
    }
}

//! Request routing for the edge server.
//!
//! [`RequestRouter`] is the pure decision function: given a path and the
//! process mode it picks a [`RouteDecision`]. [`build_router`] assembles
//! the Axum [`Router`] around it: a single fallback handler that applies
//! the decision to every inbound request, plus CORS and tracing layers.

use std::sync::Arc;

use axum::Router;
use relay_dashboard_types::ServerMode;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{API_PREFIX, WS_PATH};
use crate::handlers;
use crate::state::AppState;

/// What to do with one inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Serve from the pre-built dashboard assets.
    StaticAsset,
    /// Hand the connection to the stream proxy.
    Stream,
    /// Answer from fixtures.
    Mock,
    /// Forward to the relay daemon unmodified.
    Forward,
}

/// Decides how each request is handled.
///
/// The mode is fixed at construction, so decisions never change over the
/// lifetime of a server instance.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    mode: ServerMode,
    api_prefix: String,
    ws_path: String,
}

impl RequestRouter {
    /// Router for the standard `/api` and `/ws` surface.
    pub fn new(mode: ServerMode) -> Self {
        Self::with_paths(mode, API_PREFIX, WS_PATH)
    }

    /// Router with custom API prefix and stream path.
    pub fn with_paths(mode: ServerMode, api_prefix: &str, ws_path: &str) -> Self {
        Self {
            mode,
            api_prefix: api_prefix.trim_end_matches('/').to_owned(),
            ws_path: ws_path.trim_end_matches('/').to_owned(),
        }
    }

    /// The mode decisions are made under.
    pub const fn mode(&self) -> ServerMode {
        self.mode
    }

    /// Pick a decision for `path`.
    ///
    /// Paths outside the API prefix and the stream path are static assets.
    /// The stream path always goes to the stream proxy, whatever the mode.
    /// API paths are mocked in mock mode and forwarded in proxy mode.
    pub fn route(&self, path: &str) -> RouteDecision {
        if under_prefix(path, &self.ws_path) {
            return RouteDecision::Stream;
        }
        if !under_prefix(path, &self.api_prefix) {
            return RouteDecision::StaticAsset;
        }
        match self.mode {
            ServerMode::Mock => RouteDecision::Mock,
            ServerMode::Proxy => RouteDecision::Forward,
        }
    }
}

/// Whether `path` is `prefix` itself or a sub-path of it.
fn under_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Build the complete Axum router for the edge server.
///
/// Every request lands in [`handlers::dispatch`], which applies
/// [`RequestRouter::route`]. CORS is permissive so a dashboard dev
/// server on another port can talk to this one.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .fallback(handlers::dispatch)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Shared application state for the edge server.
//!
//! [`AppState`] is built once per server instance from the immutable
//! [`EdgeConfig`] and the mode decided at startup, then injected into
//! every handler via Axum's `State` extractor. Nothing in it changes after
//! construction apart from the session counters and the upstream health
//! record, both of which have their own synchronization.

use std::sync::Arc;

use relay_dashboard_fixtures::FixtureStore;
use relay_dashboard_types::ServerMode;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::{EdgeConfig, StreamSettings};
use crate::error::EdgeError;
use crate::forward::UpstreamClient;
use crate::health::UpstreamMonitor;
use crate::mock::MockResponder;
use crate::router::RequestRouter;
use crate::session::SessionRegistry;
use crate::shutdown::ShutdownSignal;

/// Dashboard entry document served for unmatched client-side routes.
pub const INDEX_DOCUMENT: &str = "index.html";

/// Shared state for the Axum application.
#[derive(Clone)]
pub struct AppState {
    /// Process mode, fixed at startup.
    pub mode: ServerMode,
    /// Per-request routing decisions.
    pub router: RequestRouter,
    /// Fixture-backed responder (used in mock mode).
    pub mock: MockResponder,
    /// Daemon client (used in proxy mode).
    pub upstream: UpstreamClient,
    /// Daemon health record.
    pub monitor: Arc<UpstreamMonitor>,
    /// Live stream session counters.
    pub sessions: SessionRegistry,
    /// Static asset service with single-page-app fallback.
    pub static_files: ServeDir<ServeFile>,
    /// Synthetic feed settings.
    pub stream: StreamSettings,
    /// Largest request body forwarded to the daemon.
    pub max_body_bytes: usize,
    /// Resolves when the server starts shutting down.
    pub shutdown: ShutdownSignal,
}

impl AppState {
    /// Build the state for one server instance.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::Config`] if the upstream HTTP client cannot be
    /// built.
    pub fn new(
        config: &EdgeConfig,
        mode: ServerMode,
        fixtures: Arc<FixtureStore>,
        monitor: Arc<UpstreamMonitor>,
        shutdown: ShutdownSignal,
    ) -> Result<Self, EdgeError> {
        let upstream = UpstreamClient::new(config.relay_url.clone(), config.upstream_timeout)?;
        let index = config.static_dir.join(INDEX_DOCUMENT);
        let static_files = ServeDir::new(&config.static_dir).fallback(ServeFile::new(index));

        Ok(Self {
            mode,
            router: RequestRouter::new(mode),
            mock: MockResponder::new(fixtures),
            upstream,
            monitor,
            sessions: SessionRegistry::new(),
            static_files,
            stream: config.stream,
            max_body_bytes: config.max_body_bytes,
            shutdown,
        })
    }
}

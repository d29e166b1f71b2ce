//! Edge server lifecycle management.
//!
//! Provides [`start_server`], which validates the configuration, decides
//! the mode, binds the listener and serves on a background task. The
//! returned [`ServerHandle`] reports the bound address and mode and drives
//! graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use relay_dashboard_fixtures::FixtureStore;
use relay_dashboard_types::ServerMode;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::EdgeConfig;
use crate::error::EdgeError;
use crate::health::{HealthProbe, ProbeOutcome, UpstreamMonitor, UpstreamTarget};
use crate::router::build_router;
use crate::session::SessionRegistry;
use crate::shutdown::{self, ShutdownTrigger};
use crate::startup::decide_mode;
use crate::state::AppState;

/// Errors that can occur when starting or running the edge server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),

    /// The configuration was rejected before binding.
    #[error("setup error: {0}")]
    Setup(#[from] EdgeError),
}

/// A running edge server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    mode: ServerMode,
    probe: Option<ProbeOutcome>,
    sessions: SessionRegistry,
    monitor: Arc<UpstreamMonitor>,
    trigger: ShutdownTrigger,
    serve_task: JoinHandle<Result<(), ServerError>>,
    reprobe_task: Option<JoinHandle<()>>,
}

/// Start the edge server.
///
/// Validates `config`, decides the mode (probing the daemon once unless a
/// mode is forced), binds the listener and spawns the Axum server. The
/// server keeps running until [`ServerHandle::shutdown`] is called or the
/// trigger from [`ServerHandle::shutdown_trigger`] fires.
///
/// # Errors
///
/// Returns [`ServerError::Setup`] for an invalid configuration and
/// [`ServerError::Bind`] if the address cannot be bound.
pub async fn start_server(
    config: EdgeConfig,
    fixtures: Arc<FixtureStore>,
) -> Result<ServerHandle, ServerError> {
    config.validate()?;

    let probe = HealthProbe::new(config.probe_timeout)?;
    let monitor = Arc::new(UpstreamMonitor::new(config.relay_url.clone(), probe));
    let decision = decide_mode(config.mode, &monitor).await;

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address for {addr}: {e}")))?;

    let (trigger, signal) = shutdown::channel();
    let state = Arc::new(AppState::new(
        &config,
        decision.mode,
        fixtures,
        Arc::clone(&monitor),
        signal.clone(),
    )?);
    let sessions = state.sessions.clone();
    let router = build_router(state);

    info!(
        addr = %local_addr,
        mode = %decision.mode,
        upstream = %config.relay_url,
        static_dir = %config.static_dir.display(),
        "dashboard server listening"
    );

    let mut serve_signal = signal.clone();
    let serve_task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { serve_signal.fired().await })
            .await
            .map_err(|e| ServerError::Serve(format!("serve error: {e}")))
    });

    let reprobe_task = config
        .reprobe_interval
        .map(|interval| Arc::clone(&monitor).spawn_reprobe(interval, signal));

    Ok(ServerHandle {
        local_addr,
        mode: decision.mode,
        probe: decision.probe,
        sessions,
        monitor,
        trigger,
        serve_task,
        reprobe_task,
    })
}

impl ServerHandle {
    /// The address the listener is bound to.
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The mode chosen at startup.
    pub const fn mode(&self) -> ServerMode {
        self.mode
    }

    /// The startup probe result, if the daemon was probed.
    pub const fn startup_probe(&self) -> Option<&ProbeOutcome> {
        self.probe.as_ref()
    }

    /// Stream sessions currently alive.
    pub fn active_sessions(&self) -> usize {
        self.sessions.active()
    }

    /// The shared session counters.
    pub const fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Last known daemon health record.
    pub async fn upstream(&self) -> UpstreamTarget {
        self.monitor.target().await
    }

    /// A trigger that starts graceful shutdown when fired.
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// Stop accepting connections, close open streams and wait for the
    /// server task to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Serve`] if the server task failed.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        self.trigger.fire();
        self.wait().await
    }

    /// Wait for the server task to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Serve`] if the server task failed or panicked.
    pub async fn wait(self) -> Result<(), ServerError> {
        let result = match self.serve_task.await {
            Ok(result) => result,
            Err(e) => Err(ServerError::Serve(format!("server task failed: {e}"))),
        };
        if let Some(task) = self.reprobe_task {
            // The re-probe loop also watches the shutdown signal.
            self.trigger.fire();
            if let Err(e) = task.await {
                warn!(error = %e, "daemon re-probe task failed");
            }
        }
        info!(addr = %self.local_addr, "dashboard server stopped");
        result
    }
}

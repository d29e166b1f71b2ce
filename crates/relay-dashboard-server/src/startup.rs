//! Startup mode decision.
//!
//! [`decide_mode`] runs once, before the listener accepts anything. A
//! forced mode skips the probe entirely; in `auto` the daemon is probed
//! once and an unreachable daemon selects mock mode. The result is fixed
//! for the lifetime of the process, so later daemon outages surface to
//! clients as `upstream_unavailable` instead of silently switching modes.
//!
//! # Usage
//!
//! ```rust,ignore
//! use relay_dashboard_server::startup::decide_mode;
//!
//! let decision = decide_mode(config.mode, &monitor).await;
//! info!(mode = %decision.mode, "serving");
//! ```

use relay_dashboard_types::ServerMode;
use tracing::{info, warn};

use crate::config::ModeOverride;
use crate::health::{ProbeOutcome, UpstreamMonitor};

/// The mode chosen at startup and the probe that decided it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeDecision {
    /// Mode for the lifetime of the process.
    pub mode: ServerMode,
    /// Result of the startup health probe; `None` when the mode was forced.
    pub probe: Option<ProbeOutcome>,
}

/// Pick the server mode.
///
/// Never fails: a probe that errors or times out is treated as an
/// unreachable daemon.
pub async fn decide_mode(requested: ModeOverride, monitor: &UpstreamMonitor) -> ModeDecision {
    if let Some(mode) = requested.forced() {
        info!(%mode, "mode forced by configuration, skipping daemon probe");
        return ModeDecision { mode, probe: None };
    }

    let outcome = monitor.check().await;
    let upstream = monitor.target().await.base_url;
    let mode = match &outcome {
        ProbeOutcome::Reachable { latency } => {
            info!(
                %upstream,
                latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                "relay daemon reachable, proxying"
            );
            ServerMode::Proxy
        }
        ProbeOutcome::Unreachable { reason } => {
            warn!(%upstream, %reason, "relay daemon unreachable, falling back to mock data");
            ServerMode::Mock
        }
    };

    ModeDecision {
        mode,
        probe: Some(outcome),
    }
}

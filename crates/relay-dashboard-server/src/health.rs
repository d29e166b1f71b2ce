//! Relay daemon health probing.
//!
//! [`HealthProbe::probe`] answers a single question: does the daemon
//! answer `GET {relay_url}/api/health` with a 2xx within the timeout? Any
//! network error, timeout, or non-success status counts uniformly as
//! [`ProbeOutcome::Unreachable`]; probing is never fatal.
//!
//! [`UpstreamMonitor`] owns the [`UpstreamTarget`] record. The startup
//! probe fills it in, and an optional periodic re-probe keeps it fresh for
//! reporting. Neither ever changes the server's mode.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::Url;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::EdgeError;
use crate::shutdown::ShutdownSignal;

/// Daemon path used for liveness checks.
pub const HEALTH_PATH: &str = "/api/health";

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The daemon answered with a success status.
    Reachable {
        /// Round-trip time of the probe.
        latency: Duration,
    },
    /// The daemon could not be reached or answered with an error.
    Unreachable {
        /// Why the probe failed.
        reason: String,
    },
}

impl ProbeOutcome {
    /// Whether the daemon answered.
    pub const fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable { .. })
    }
}

/// Last known state of the relay daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    /// Daemon base URL.
    pub base_url: Url,
    /// Result of the most recent probe.
    pub is_reachable: bool,
    /// When the most recent probe finished; `None` if never probed.
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// Join a request path (with optional query) onto a base URL.
///
/// Any path on the base URL is kept as a prefix.
pub fn join_url(base: &Url, path_and_query: &str) -> Result<Url, EdgeError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path_and_query.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| EdgeError::Config(format!("invalid upstream url {joined}: {e}")))
}

/// Bounded-timeout liveness probe.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HealthProbe {
    /// Create a probe whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::Config`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, EdgeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| EdgeError::Config(format!("failed to build probe client: {e}")))?;
        Ok(Self { client, timeout })
    }

    /// Probe `base_url`.
    pub async fn probe(&self, base_url: &Url) -> ProbeOutcome {
        let url = match join_url(base_url, HEALTH_PATH) {
            Ok(url) => url,
            Err(e) => {
                return ProbeOutcome::Unreachable {
                    reason: e.to_string(),
                };
            }
        };

        let started = Instant::now();
        let request = self.client.get(url.clone()).send();
        // The client timeout already bounds the call; the outer timeout
        // also covers DNS resolution stalls.
        let result = tokio::time::timeout(self.timeout, request).await;
        let latency = started.elapsed();

        let outcome = match result {
            Err(_) => ProbeOutcome::Unreachable {
                reason: format!("timed out after {}ms", self.timeout.as_millis()),
            },
            Ok(Err(e)) => ProbeOutcome::Unreachable {
                reason: e.to_string(),
            },
            Ok(Ok(response)) if response.status().is_success() => {
                ProbeOutcome::Reachable { latency }
            }
            Ok(Ok(response)) => ProbeOutcome::Unreachable {
                reason: format!("status {}", response.status()),
            },
        };

        debug!(%url, ?outcome, latency_ms = latency.as_millis(), "daemon probe finished");
        outcome
    }
}

/// Owner of the [`UpstreamTarget`] record.
#[derive(Debug)]
pub struct UpstreamMonitor {
    probe: HealthProbe,
    target: RwLock<UpstreamTarget>,
}

impl UpstreamMonitor {
    /// Create a monitor for `base_url`; the target starts unprobed.
    pub fn new(base_url: Url, probe: HealthProbe) -> Self {
        Self {
            probe,
            target: RwLock::new(UpstreamTarget {
                base_url,
                is_reachable: false,
                last_checked_at: None,
            }),
        }
    }

    /// Probe the daemon now and record the result.
    pub async fn check(&self) -> ProbeOutcome {
        let base_url = self.target.read().await.base_url.clone();
        let outcome = self.probe.probe(&base_url).await;

        let mut target = self.target.write().await;
        let was_reachable = target.is_reachable;
        let first_check = target.last_checked_at.is_none();
        target.is_reachable = outcome.is_reachable();
        target.last_checked_at = Some(Utc::now());

        if !first_check && was_reachable != target.is_reachable {
            if target.is_reachable {
                info!(upstream = %target.base_url, "relay daemon is reachable again");
            } else {
                warn!(upstream = %target.base_url, ?outcome, "relay daemon became unreachable");
            }
        }
        outcome
    }

    /// A copy of the current target record.
    pub async fn target(&self) -> UpstreamTarget {
        self.target.read().await.clone()
    }

    /// Re-probe every `interval` until `shutdown` fires.
    ///
    /// The first re-probe happens one full interval after spawning.
    pub fn spawn_reprobe(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: ShutdownSignal,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(
                tokio::time::Instant::now() + interval,
                interval,
            );
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.check().await;
                    }
                    () = shutdown.fired() => {
                        debug!("daemon re-probe stopped");
                        return;
                    }
                }
            }
        })
    }
}

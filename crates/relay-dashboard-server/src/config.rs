//! Immutable edge server configuration.
//!
//! An [`EdgeConfig`] is built once at startup (by the binary, from flags
//! and environment variables) and passed by value into [`start_server`].
//! Nothing in the server reads process-global configuration.
//!
//! [`start_server`]: crate::server::start_server

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use relay_dashboard_types::ServerMode;
use reqwest::Url;

use crate::error::EdgeError;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3888;

/// Default relay daemon URL.
pub const DEFAULT_RELAY_URL: &str = "http://localhost:3889";

/// Default directory of pre-built dashboard assets.
pub const DEFAULT_STATIC_DIR: &str = "./out";

/// Path prefix for API requests.
pub const API_PREFIX: &str = "/api";

/// `WebSocket` upgrade path.
pub const WS_PATH: &str = "/ws";

/// Largest request body buffered for forwarding (16 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// How the operating mode is chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeOverride {
    /// Probe the daemon: proxy if it answers, mock otherwise.
    #[default]
    Auto,
    /// Always proxy, even if the daemon is down.
    Proxy,
    /// Always serve fixtures.
    Mock,
}

impl ModeOverride {
    /// The forced mode, if any.
    pub const fn forced(self) -> Option<ServerMode> {
        match self {
            Self::Auto => None,
            Self::Proxy => Some(ServerMode::Proxy),
            Self::Mock => Some(ServerMode::Mock),
        }
    }
}

/// Whether the synthetic feed restarts after its last event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedRepeat {
    /// Replay the script forever.
    #[default]
    Loop,
    /// Stop emitting after one pass; the socket stays open.
    Once,
}

/// Synthetic stream settings used in mock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Delay between synthetic events.
    pub interval: Duration,
    /// Loop or terminate at the end of the script.
    pub repeat: FeedRepeat,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            repeat: FeedRepeat::Loop,
        }
    }
}

/// Complete configuration for one edge server instance.
#[derive(Debug, Clone)]
pub struct EdgeConfig {
    /// Address to bind.
    pub host: IpAddr,
    /// Port to bind; `0` picks an ephemeral port.
    pub port: u16,
    /// Base URL of the relay daemon.
    pub relay_url: Url,
    /// Directory of pre-built dashboard assets.
    pub static_dir: PathBuf,
    /// Mode selection policy.
    pub mode: ModeOverride,
    /// Bound on the startup health probe.
    pub probe_timeout: Duration,
    /// Bound on each forwarded call and upstream stream connect.
    pub upstream_timeout: Duration,
    /// If set, re-probe the daemon at this interval (reporting only).
    pub reprobe_interval: Option<Duration>,
    /// Synthetic feed settings for mock mode.
    pub stream: StreamSettings,
    /// Largest request body forwarded to the daemon.
    pub max_body_bytes: usize,
}

impl EdgeConfig {
    /// Configuration with documented defaults for everything but the
    /// daemon URL.
    pub fn new(relay_url: Url) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            relay_url,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            mode: ModeOverride::Auto,
            probe_timeout: Duration::from_millis(1500),
            upstream_timeout: Duration::from_secs(10),
            reprobe_interval: None,
            stream: StreamSettings::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Socket address to listen on.
    pub const fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Reject configurations the server cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), EdgeError> {
        if !matches!(self.relay_url.scheme(), "http" | "https") {
            return Err(EdgeError::Config(format!(
                "relay url must be http or https, got {}",
                self.relay_url
            )));
        }
        if self.relay_url.host_str().is_none() {
            return Err(EdgeError::Config(format!(
                "relay url has no host: {}",
                self.relay_url
            )));
        }
        if self.probe_timeout.is_zero() {
            return Err(EdgeError::Config("probe timeout must be positive".to_owned()));
        }
        if self.upstream_timeout.is_zero() {
            return Err(EdgeError::Config(
                "upstream timeout must be positive".to_owned(),
            ));
        }
        if self.stream.interval.is_zero() {
            return Err(EdgeError::Config("stream interval must be positive".to_owned()));
        }
        if self.reprobe_interval.is_some_and(|d| d.is_zero()) {
            return Err(EdgeError::Config(
                "re-probe interval must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

//! Command-line and environment configuration.
//!
//! Every option can come from a flag or an environment variable; flags
//! win. Unknown flags are stripped by [`filter_args`] before clap sees
//! them so that a stale launcher script does not stop the server from
//! starting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{CommandFactory, Parser, ValueEnum};
use relay_dashboard_server::config::{DEFAULT_PORT, DEFAULT_RELAY_URL, DEFAULT_STATIC_DIR};
use relay_dashboard_server::{EdgeConfig, FeedRepeat, ModeOverride, StreamSettings};
use reqwest::Url;

use crate::error::ConfigError;
use crate::logging::LogFormat;

/// Edge server for the relay dashboard.
///
/// Serves the dashboard assets and either proxies `/api` and `/ws` to a
/// running relay daemon or answers them from mock data.
#[derive(Debug, Parser)]
#[command(name = "relay-dashboard", version, about)]
pub struct Cli {
    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to listen on.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Base URL of the relay daemon.
    #[arg(long, env = "RELAY_URL", default_value = DEFAULT_RELAY_URL)]
    pub relay_url: Url,

    /// Directory with the pre-built dashboard.
    #[arg(long, env = "STATIC_DIR", default_value = DEFAULT_STATIC_DIR)]
    pub static_dir: PathBuf,

    /// Log at debug level.
    #[arg(short, long, env = "VERBOSE", value_parser = BoolishValueParser::new())]
    pub verbose: bool,

    /// Serve mock data even if the daemon is up (same as `--mode mock`).
    #[arg(long, env = "MOCK", value_parser = BoolishValueParser::new())]
    pub mock: bool,

    /// How to pick between proxying and mock data.
    #[arg(long, env = "DASHBOARD_MODE", value_enum, default_value_t = ModeArg::Auto)]
    pub mode: ModeArg,

    /// Bound on the startup daemon health check, in milliseconds.
    #[arg(long, env = "PROBE_TIMEOUT_MS", default_value_t = 1500)]
    pub probe_timeout_ms: u64,

    /// Bound on each proxied call and daemon stream connect, in milliseconds.
    #[arg(long, env = "UPSTREAM_TIMEOUT_MS", default_value_t = 10_000)]
    pub upstream_timeout_ms: u64,

    /// Delay between mock stream events, in milliseconds.
    #[arg(long, env = "STREAM_INTERVAL_MS", default_value_t = 2000)]
    pub stream_interval_ms: u64,

    /// Stop the mock stream after one pass instead of looping.
    #[arg(long, env = "STREAM_ONCE", value_parser = BoolishValueParser::new())]
    pub stream_once: bool,

    /// Load mock data from this JSON file instead of the built-in set.
    #[arg(long, env = "FIXTURES_PATH")]
    pub fixtures: Option<PathBuf>,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Re-check daemon health at this interval, in milliseconds.
    #[arg(long, env = "REPROBE_INTERVAL_MS")]
    pub reprobe_interval_ms: Option<u64>,

    /// Values left behind by stripped flags.
    #[arg(hide = true)]
    pub stray: Vec<String>,
}

/// `--mode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Probe the daemon; fall back to mock data if it is down.
    Auto,
    /// Always serve mock data.
    Mock,
    /// Always proxy, even if the daemon is down.
    Proxy,
}

impl From<ModeArg> for ModeOverride {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => Self::Auto,
            ModeArg::Mock => Self::Mock,
            ModeArg::Proxy => Self::Proxy,
        }
    }
}

impl Cli {
    /// Effective mode policy; `--mock` overrides `--mode`.
    pub fn mode_override(&self) -> ModeOverride {
        if self.mock {
            ModeOverride::Mock
        } else {
            self.mode.into()
        }
    }

    /// Build the server configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the values do not form a usable
    /// configuration (zero timeouts, a non-HTTP daemon URL, ...).
    pub fn to_config(&self) -> Result<EdgeConfig, ConfigError> {
        let mut config = EdgeConfig::new(self.relay_url.clone());
        config.host = self.host;
        config.port = self.port;
        config.static_dir.clone_from(&self.static_dir);
        config.mode = self.mode_override();
        config.probe_timeout = Duration::from_millis(self.probe_timeout_ms);
        config.upstream_timeout = Duration::from_millis(self.upstream_timeout_ms);
        config.reprobe_interval = self.reprobe_interval_ms.map(Duration::from_millis);
        config.stream = StreamSettings {
            interval: Duration::from_millis(self.stream_interval_ms),
            repeat: if self.stream_once {
                FeedRepeat::Once
            } else {
                FeedRepeat::Loop
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// Split `args` into what clap should parse and the unknown flags that
/// were dropped.
///
/// The first item is the program name and is always kept. A known flag
/// that takes a value keeps its following token; everything after `--`
/// is kept unchanged.
pub fn filter_args<I>(args: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = String>,
{
    let command = Cli::command();
    let mut long: HashMap<String, bool> = HashMap::from([
        (String::from("help"), false),
        (String::from("version"), false),
    ]);
    let mut short: HashMap<char, bool> = HashMap::from([('h', false), ('V', false)]);
    for arg in command.get_arguments() {
        let takes_value = arg.get_action().takes_values();
        if let Some(name) = arg.get_long() {
            long.insert(name.to_owned(), takes_value);
        }
        if let Some(c) = arg.get_short() {
            short.insert(c, takes_value);
        }
    }

    let mut iter = args.into_iter();
    let mut kept: Vec<String> = iter.next().into_iter().collect();
    let mut dropped = Vec::new();
    let mut raw = false;
    let mut value_next = false;

    for token in iter {
        if raw || value_next {
            value_next = false;
            kept.push(token);
            continue;
        }
        if token == "--" {
            raw = true;
            kept.push(token);
            continue;
        }

        let known = if let Some(name) = token.strip_prefix("--") {
            let (name, inline_value) = name
                .split_once('=')
                .map_or((name, false), |(name, _)| (name, true));
            long.get(name).map(|&takes| takes && !inline_value)
        } else if let Some(flags) = token.strip_prefix('-')
            && let Some(first) = flags.chars().next()
        {
            let attached_value = flags.len() > first.len_utf8();
            short.get(&first).map(|&takes| takes && !attached_value)
        } else {
            Some(false)
        };

        match known {
            Some(takes_value) => {
                value_next = takes_value;
                kept.push(token);
            }
            None => dropped.push(token),
        }
    }

    (kept, dropped)
}

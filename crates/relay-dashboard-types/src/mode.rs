//! Operating mode of an edge server process.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// How the edge server answers API and stream traffic.
///
/// Decided once at startup and held read-only for the lifetime of the
/// process. Every session created by a process runs under the same mode
/// and never switches mid-life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    /// Forward requests and streams to the live relay daemon.
    Proxy,
    /// Answer from checked-in fixtures and a synthetic event feed.
    Mock,
}

impl ServerMode {
    /// Lowercase name used in logs and health payloads.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Proxy => "proxy",
            Self::Mock => "mock",
        }
    }
}

impl core::fmt::Display for ServerMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

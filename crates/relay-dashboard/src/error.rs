//! Error types for the command-line entry point.
//!
//! Everything that makes the configuration unusable is a [`ConfigError`]
//! and exits with code 2. Any other failure (typically a port that cannot
//! be bound) exits with code 1.

use std::path::PathBuf;

use relay_dashboard_fixtures::FixtureError;
use relay_dashboard_server::EdgeError;

/// Exit code for a clean run, `--help`, or `--version`.
pub const EXIT_OK: u8 = 0;

/// Exit code for an unusable configuration.
pub const EXIT_CONFIG: u8 = 2;

/// Exit code for a failure after the configuration was accepted.
pub const EXIT_RUNTIME: u8 = 1;

/// The configuration could not be turned into a runnable server.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A flag or environment variable had an invalid value.
    #[error("invalid command line: {0}")]
    Cli(String),

    /// The assembled configuration was rejected.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] EdgeError),

    /// The custom fixture file could not be loaded.
    #[error("cannot load fixtures from {}: {source}", path.display())]
    Fixtures {
        /// File that was requested.
        path: PathBuf,
        /// Why loading failed.
        #[source]
        source: FixtureError,
    },
}

/// Map a top-level failure to the process exit code.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<ConfigError>().is_some() {
        EXIT_CONFIG
    } else {
        EXIT_RUNTIME
    }
}

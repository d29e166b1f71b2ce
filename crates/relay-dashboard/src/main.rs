//! Command-line entry point for the relay dashboard edge server.
//!
//! Parses flags and environment, sets up logging, loads the mock dataset
//! and runs the server until `Ctrl-C`.
//!
//! # Exit codes
//!
//! - `0`: clean shutdown, `--help`, or `--version`
//! - `1`: the server failed after the configuration was accepted
//!   (for example, the port is already in use)
//! - `2`: invalid configuration

mod cli;
mod error;
mod logging;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use relay_dashboard_fixtures::FixtureStore;
use relay_dashboard_server::{start_server, ServerError};
use tracing::{error, info, warn};

use crate::cli::Cli;
use crate::error::{exit_code, ConfigError, EXIT_CONFIG, EXIT_OK};
use crate::logging::LogFormat;

/// Application entry point.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let (args, dropped) = cli::filter_args(std::env::args());
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            return ExitCode::from(print_usage(&e));
        }
        Err(e) => {
            logging::init(false, LogFormat::Text);
            let err = ConfigError::Cli(e.to_string().trim_end().to_owned());
            error!(error = %err, "dashboard server not started");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    logging::init(cli.verbose, cli.log_format);
    for flag in dropped.iter().chain(&cli.stray) {
        warn!(flag = %flag, "ignoring unknown command-line argument");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format_args!("{e:#}"), "dashboard server failed");
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.to_config()?;
    let fixtures = load_fixtures(cli.fixtures.as_deref())?;
    info!(
        channels = fixtures.channels().len(),
        agents = fixtures.agents().len(),
        messages = fixtures.messages().len(),
        source = %cli.fixtures.as_ref().map_or_else(|| String::from("embedded"), |p| p.display().to_string()),
        "mock dataset loaded"
    );

    let server = match start_server(config, Arc::new(fixtures)).await {
        Ok(server) => server,
        Err(ServerError::Setup(e)) => return Err(ConfigError::Invalid(e).into()),
        Err(e) => return Err(e).context("starting dashboard server"),
    };

    let trigger = server.shutdown_trigger();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, shutting down");
                trigger.fire();
            }
            Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
        }
    });

    server.wait().await.context("serving dashboard")?;
    Ok(())
}

/// Print `--help` or `--version` output. Exits cleanly even if stdout is gone.
fn print_usage(e: &clap::Error) -> u8 {
    if let Err(io) = e.print() {
        logging::init(false, LogFormat::Text);
        warn!(error = %io, "could not print usage");
    }
    EXIT_OK
}

fn load_fixtures(path: Option<&Path>) -> Result<FixtureStore, ConfigError> {
    match path {
        Some(path) => FixtureStore::from_path(path).map_err(|source| ConfigError::Fixtures {
            path: path.to_path_buf(),
            source,
        }),
        None => FixtureStore::embedded().map_err(|source| ConfigError::Fixtures {
            path: "<embedded>".into(),
            source,
        }),
    }
}

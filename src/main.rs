//! # Tidewater - command-line entry point
//!
//! 1. Parse arguments
//! 2. Load layered configuration (defaults, global, project, `--config`,
//!    `TIDEWATER_*`, then CLI flags)
//! 3. Initialise tracing: `RUST_LOG` wins, otherwise `[log] level`
//! 4. Run the command, printing its report on stdout; logs go to stderr
//!
//! Any aborted run exits non-zero with the error chain.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![forbid(clippy::expect_used)]

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tidewater::cli::Cli;
use tidewater::commands::execute_command;
use tidewater::config::load_config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.global.config.as_deref())
        .and_then(|config| {
            config.apply_cli(cli.global.checkout.clone(), cli.global.cluster.clone())
        })
        .context("Failed to load configuration")?;

    init_tracing(&config.log.level);
    debug!(?config, "Configuration loaded");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute_command(&cli.command, &config, &mut out)?;
    out.flush().context("Failed to flush output")?;
    Ok(())
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// SPDX-License-Identifier: Apache-2.0

//! `ridesync` - developer front end for the order synchronization core.
//!
//! Wires `ridesync-core` to the system keyring and the configured service,
//! then prints whatever the core reports. No order logic lives here.

mod cli;
mod commands;
mod errors;
mod logging;
mod output;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use ridesync_core::{AppConfig, load_config};
use tracing::debug;

use crate::cli::{Cli, OutputContext};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.output);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", errors::format_error(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = OutputContext::from_cli(cli.output, cli.quiet, cli.verbose);
    let config = resolve_config(cli.api_url.as_deref())?;
    commands::run(cli.command, ctx, &config).await
}

/// Loads layered configuration and applies command-line overrides.
fn resolve_config(api_url: Option<&str>) -> Result<AppConfig> {
    let mut config = load_config().context("Failed to load configuration")?;
    if let Some(url) = api_url {
        debug!(api_url = url, "Using API base URL from the command line");
        config.api.base_url = url.to_string();
    }
    debug!(base_url = %config.api.base_url, "Configuration resolved");
    Ok(config)
}

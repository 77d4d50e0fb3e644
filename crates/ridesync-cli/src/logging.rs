// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for the RideSync CLI.
//!
//! Uses `tracing` with `tracing-subscriber`, writing to stderr so stdout
//! stays clean for `--output json`. The level is controlled with `RUST_LOG`.
//!
//! # Examples
//!
//! ```bash
//! # Request lifecycle and retries
//! RUST_LOG=ridesync=debug ridesync order show o-123
//!
//! # Include HTTP client internals
//! RUST_LOG=ridesync=debug,reqwest=debug ridesync order track o-123
//! ```

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::OutputFormat;

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "ridesync=warn,reqwest=error";

/// Initialize the logging subsystem.
///
/// Structured output formats drop ANSI colors from log lines so they can be
/// captured alongside the JSON on stdout.
pub fn init_logging(format: OutputFormat) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_ansi(matches!(format, OutputFormat::Text))
        .with_writer(std::io::stderr);

    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

// SPDX-License-Identifier: Apache-2.0

//! Command-line interface definition for RideSync.
//!
//! Uses clap's derive API with noun-verb subcommands.

use std::io::IsTerminal;

use clap::{Parser, Subcommand, ValueEnum};

/// How command results are printed.
#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Styled lines for a terminal
    #[default]
    Text,
    /// One JSON document per result, for scripts
    Json,
}

/// Printing preferences shared by every command handler.
#[derive(Clone)]
pub struct OutputContext {
    /// Selected format
    pub format: OutputFormat,
    /// Hide spinners and retry notices
    pub quiet: bool,
    /// Add price and derived flags to order output
    pub verbose: bool,
    /// stdout is attached to a terminal
    pub is_tty: bool,
}

impl OutputContext {
    /// Builds the context from parsed flags and the current stdout.
    pub fn from_cli(format: OutputFormat, quiet: bool, verbose: bool) -> Self {
        Self {
            format,
            quiet,
            verbose,
            is_tty: std::io::stdout().is_terminal(),
        }
    }

    /// Text output was requested.
    pub fn wants_text(&self) -> bool {
        matches!(self.format, OutputFormat::Text)
    }

    /// Spinners and prompts make sense: a terminal, text output, not quiet.
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet && self.wants_text()
    }
}

/// RideSync - follow a ride order from dispatch to drop-off.
#[derive(Parser)]
#[command(name = "ridesync")]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// How to print results
    #[arg(long, short = 'o', global = true, default_value = "text", value_enum)]
    pub output: OutputFormat,

    /// Hide spinners and retry notices
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Show extra detail such as retry state
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Override the configured API base URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level command groups
#[derive(Subcommand)]
pub enum Commands {
    /// Manage stored credentials
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Inspect and track ride orders
    #[command(subcommand)]
    Order(OrderCommand),
}

/// `ridesync auth ...`
#[derive(Subcommand)]
pub enum AuthCommand {
    /// Show whether a token is stored
    Status,

    /// Store an access and refresh token in the system keyring
    ///
    /// Prompts when run in a terminal; otherwise reads the access token and
    /// the refresh token from the first two lines of stdin.
    SetToken,

    /// Delete the stored token pair and saved phone number
    Logout,
}

/// `ridesync order ...`
#[derive(Subcommand)]
pub enum OrderCommand {
    /// Fetch an order once
    Show {
        /// Order id
        id: String,
    },

    /// Follow an order until it completes or is cancelled
    Track {
        /// Order id
        id: String,

        /// Stop after this many updates
        #[arg(long)]
        max_updates: Option<usize>,
    },

    /// Cancel an order, offering retries on transient failures
    Cancel {
        /// Order id
        id: String,

        /// Retry automatically instead of asking
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

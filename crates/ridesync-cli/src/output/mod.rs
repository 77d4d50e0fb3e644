// SPDX-License-Identifier: Apache-2.0

//! Printing of command results.
//!
//! Handlers hand back plain data. JSON comes straight from serde; text goes
//! through each type's [`Renderable`] impl.

use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::{OutputContext, OutputFormat};

mod auth;
mod order;

/// A result that knows how to print itself for a terminal.
pub trait Renderable: Serialize {
    /// Writes the human-readable form.
    fn render_text(&self, w: &mut dyn Write, ctx: &OutputContext) -> io::Result<()>;
}

/// Prints `result` to stdout in the selected format.
pub fn render<T: Renderable>(result: &T, ctx: &OutputContext) -> Result<()> {
    let mut out = io::stdout().lock();
    match ctx.format {
        OutputFormat::Json => {
            serde_json::to_writer(&mut out, result).context("Failed to write JSON")?;
            writeln!(out).context("Failed to write JSON")?;
        }
        OutputFormat::Text => result
            .render_text(&mut out, ctx)
            .context("Failed to write output")?,
    }
    Ok(())
}

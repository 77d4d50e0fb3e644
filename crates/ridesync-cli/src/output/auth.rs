// SPDX-License-Identifier: Apache-2.0

use console::style;
use std::io::{self, Write};

use crate::cli::OutputContext;
use crate::commands::types::{AuthChangeResult, AuthStatusResult};

use super::Renderable;

impl Renderable for AuthStatusResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        if self.authenticated {
            writeln!(w, "{} Authenticated", style("*").green().bold())?;
            if let Some(ref phone) = self.phone_number {
                writeln!(w, "  Phone: {}", style(phone).cyan())?;
            }
        } else {
            writeln!(
                w,
                "{} Not authenticated. Run {} to store a token.",
                style("!").yellow().bold(),
                style("ridesync auth set-token").cyan()
            )?;
        }
        Ok(())
    }
}

impl Renderable for AuthChangeResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        let marker = if self.authenticated {
            style("*").green().bold()
        } else {
            style("*").cyan().bold()
        };
        writeln!(w, "{marker} {}", self.message)
    }
}

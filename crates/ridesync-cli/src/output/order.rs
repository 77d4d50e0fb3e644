// SPDX-License-Identifier: Apache-2.0

use console::style;
use std::io::{self, Write};

use crate::cli::OutputContext;
use crate::commands::types::{CancelResult, OrderSnapshotResult};

use super::Renderable;

impl Renderable for OrderSnapshotResult {
    fn render_text(&self, w: &mut dyn Write, ctx: &OutputContext) -> io::Result<()> {
        let snapshot = &self.snapshot;
        let status = snapshot
            .status()
            .map_or_else(|| "-".to_string(), |s| s.to_string());

        write!(
            w,
            "{} {}  {}",
            style(self.order_id.as_str()).bold(),
            style(&snapshot.status_display_text).cyan(),
            style(format!("({status})")).dim()
        )?;
        if let Some(ref eta) = snapshot.estimated_arrival_text {
            write!(w, "  {}", style(eta).green())?;
        }
        writeln!(w)?;

        if let Some(driver) = snapshot.order.as_ref().and_then(|o| o.driver.as_ref()) {
            write!(w, "  Driver: {} ({:.1}), {}", driver.name, driver.rating, driver.vehicle)?;
            if let Some(ref plate) = driver.plate_number {
                write!(w, " [{plate}]")?;
            }
            writeln!(w)?;
        }
        if snapshot.is_matching {
            writeln!(w, "  {}", style("Searching nearby drivers...").dim())?;
        }
        if ctx.verbose {
            if let Some(price) = snapshot.order.as_ref().and_then(|o| o.price_estimate.as_ref()) {
                writeln!(w, "  Estimate: {price}")?;
            }
            writeln!(
                w,
                "  {} contact={} progress={:.0}% polling={}",
                style("flags:").dim(),
                snapshot.can_communicate_with_driver,
                snapshot.matching_progress * 100.0,
                snapshot.is_polling
            )?;
        }
        if let Some(ref message) = snapshot.error_message {
            writeln!(w, "  {} {message}", style("!").yellow().bold())?;
        }
        Ok(())
    }
}

impl Renderable for CancelResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        write!(
            w,
            "{} Order {} cancelled",
            style("*").green().bold(),
            style(self.order_id.as_str()).bold()
        )?;
        match self.retries {
            0 => writeln!(w, "."),
            1 => writeln!(w, " after 1 retry."),
            n => writeln!(w, " after {n} retries."),
        }
    }
}

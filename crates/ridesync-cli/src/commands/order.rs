// SPDX-License-Identifier: Apache-2.0

//! Order commands: show, track, cancel.

use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;
use ridesync_core::{
    AppConfig, OrderApi, OrderId, OrderTracker, RetryCoordinator, RetryError, RetryState,
    RideClient, RideError, TrackingSnapshot,
};
use tracing::{debug, info};

use crate::cli::OutputContext;
use crate::commands::types::{CancelResult, OrderSnapshotResult};
use crate::output;

/// Run the show command - fetch an order once and derive its state.
pub async fn run_show(client: Arc<RideClient>, id: OrderId) -> Result<OrderSnapshotResult> {
    let order = client.fetch_order(&id).await?;
    Ok(OrderSnapshotResult {
        snapshot: TrackingSnapshot::from_order(&order),
        order_id: id,
    })
}

/// Run the track command - print every snapshot until the order settles.
///
/// Stops when polling ends, after `max_updates` snapshots, or on Ctrl-C.
pub async fn run_track(
    client: Arc<RideClient>,
    config: &AppConfig,
    id: OrderId,
    max_updates: Option<usize>,
    ctx: &OutputContext,
) -> Result<()> {
    let tracker = OrderTracker::new(client, config.tracking.clone());
    let mut updates = tracker.subscribe();

    tracker.start_tracking(id.clone()).await?;
    info!(order_id = %id, "Tracking order");

    let mut printed = 0usize;
    loop {
        let snapshot = updates.borrow_and_update().clone();
        output::render(
            &OrderSnapshotResult {
                order_id: id.clone(),
                snapshot: snapshot.clone(),
            },
            ctx,
        )?;
        printed += 1;

        if !snapshot.is_polling {
            debug!("Polling ended");
            break;
        }
        if max_updates.is_some_and(|max| printed >= max) {
            debug!(printed, "Reached update limit");
            break;
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
        }
    }

    tracker.stop_tracking();
    Ok(())
}

/// Run the cancel command.
///
/// A failed cancellation is handed to a [`RetryCoordinator`]; retryable
/// failures are retried with backoff, automatically with `--yes` or after
/// confirmation in a terminal.
pub async fn run_cancel(
    client: Arc<RideClient>,
    config: &AppConfig,
    id: OrderId,
    yes: bool,
    ctx: &OutputContext,
) -> Result<CancelResult> {
    let coordinator = RetryCoordinator::new(config.coordinator.clone());

    let action = {
        let client = Arc::clone(&client);
        let id = id.clone();
        move || {
            let client = Arc::clone(&client);
            let id = id.clone();
            async move { client.cancel_order(&id).await }
        }
    };

    if coordinator.run(action).await.is_ok() {
        return Ok(CancelResult {
            order_id: id,
            retries: 0,
        });
    }

    loop {
        let state = coordinator.snapshot();
        let Some(error) = state.error.clone() else {
            break;
        };
        if !state.can_retry() || !confirm_retry(ctx, &error, yes, &state)? {
            return Err(error.into());
        }

        match coordinator.retry().await {
            Ok(()) => {
                return Ok(CancelResult {
                    order_id: id,
                    retries: state.retry_count + 1,
                });
            }
            Err(RetryError::Failed(e)) => {
                debug!(error = %e, "Retry failed");
            }
            Err(other) => return Err(other.into()),
        }
    }

    Ok(CancelResult {
        order_id: id,
        retries: coordinator.snapshot().retry_count,
    })
}

fn confirm_retry(
    ctx: &OutputContext,
    error: &RideError,
    yes: bool,
    state: &RetryState,
) -> Result<bool> {
    if ctx.wants_text() && !ctx.quiet {
        eprintln!(
            "{} {} (retry {} of {})",
            style("!").yellow().bold(),
            error,
            state.retry_count + 1,
            state.max_retries,
        );
    }
    if yes {
        return Ok(true);
    }
    if !ctx.show_progress() {
        return Ok(false);
    }
    Confirm::new()
        .with_prompt("Retry?")
        .default(true)
        .interact()
        .context("Failed to read confirmation")
}

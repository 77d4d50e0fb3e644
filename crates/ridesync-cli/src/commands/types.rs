// SPDX-License-Identifier: Apache-2.0

//! Result types returned by command handlers.
//!
//! Handlers return data and leave printing to [`crate::output`].

use ridesync_core::{OrderId, TrackingSnapshot};
use serde::Serialize;

/// Result from the auth status command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthStatusResult {
    /// Whether an access token is stored.
    pub authenticated: bool,
    /// Remembered phone number, if any.
    pub phone_number: Option<String>,
}

/// Result from the auth set-token and logout commands.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthChangeResult {
    /// Whether credentials are stored after the change.
    pub authenticated: bool,
    /// What happened, for text output.
    pub message: String,
}

/// A single tracking snapshot, as printed by `order show` and each
/// `order track` update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct OrderSnapshotResult {
    /// Order the snapshot belongs to.
    pub order_id: OrderId,
    /// Derived tracking state.
    pub snapshot: TrackingSnapshot,
}

/// Result from the order cancel command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CancelResult {
    /// Cancelled order.
    pub order_id: OrderId,
    /// Retries it took.
    pub retries: u32,
}

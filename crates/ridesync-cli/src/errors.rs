// SPDX-License-Identifier: Apache-2.0

//! CLI-specific error formatting with user-friendly hints.
//!
//! Downcasts `anyhow::Error` to the core's error types and appends a tip.
//! The library carries the structured error; wording for the terminal lives
//! here.

use anyhow::Error;
use ridesync_core::{ErrorCategory, RetryError, RideError};

/// Formats an error for CLI display with helpful hints.
///
/// If the error is not a `RideError` or `RetryError`, returns the original
/// error chain.
pub fn format_error(error: &Error) -> String {
    if let Some(ride_err) = error.downcast_ref::<RideError>() {
        return format_ride_error(ride_err);
    }
    if let Some(retry_err) = error.downcast_ref::<RetryError>() {
        return match retry_err {
            RetryError::Failed(inner) => format_ride_error(inner),
            RetryError::Exhausted { max_retries } => format!(
                "{retry_err}\n\nTip: Still failing after {max_retries} retries. Wait a few minutes and run the command again."
            ),
            _ => retry_err.to_string(),
        };
    }
    format!("{error:#}")
}

fn format_ride_error(err: &RideError) -> String {
    match err {
        RideError::AuthenticationRequired | RideError::TokenExpired => format!(
            "{err}\n\nTip: Run `ridesync auth set-token` to store a fresh token."
        ),
        RideError::Config { .. } => format!(
            "{err}\n\nTip: Check your config file at {}",
            ridesync_core::config_file_path().display()
        ),
        RideError::CredentialStorage { .. } => format!(
            "{err}\n\nTip: Your system keyring may be locked. Try unlocking it and try again."
        ),
        _ => {
            let mut msg = err.to_string();
            if let Some(reason) = err.failure_reason() {
                msg.push_str("\n  ");
                msg.push_str(&reason);
            }
            if let Some(tip) = err.recovery_suggestion() {
                msg.push_str("\n\nTip: ");
                msg.push_str(&tip);
            } else if err.category() == ErrorCategory::Connectivity {
                msg.push_str("\n\nTip: Check your internet connection and try again.");
            }
            msg
        }
    }
}

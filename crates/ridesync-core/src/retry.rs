// SPDX-License-Identifier: Apache-2.0

//! Retry logic with exponential backoff for transient failures.
//!
//! Provides the backoff schedule used by the request executor's automatic
//! retry and the delay arithmetic shared with the retry coordinator. Both
//! grow geometrically: `base × 2^attempt`, with no jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::config::RetryConfig;
use crate::error::RideError;

/// Determines if an error should be retried automatically.
///
/// Delegates to the taxonomy so that the executor and the coordinator can
/// never disagree about what is transient.
#[must_use]
pub fn is_retryable(e: &RideError) -> bool {
    e.is_retryable()
}

/// Creates the exponential backoff builder for executor retries.
///
/// - Factor: 2 (exponential growth)
/// - Min delay: `base_delay_ms`
/// - Max delay: `max_delay_ms`
/// - Max times: `max_retries` retries after the first attempt
/// - Jitter: disabled, so delays are exactly `base × 2^attempt`
#[must_use]
pub fn retry_backoff(config: &RetryConfig) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_factor(2.0)
        .with_min_delay(config.base_delay())
        .with_max_delay(config.max_delay())
        .with_max_times(config.max_retries)
}

/// Returns `base × 2^exponent`, saturating instead of overflowing.
#[must_use]
pub fn backoff_delay(base: Duration, exponent: u32) -> Duration {
    let multiplier = 1_u32.checked_shl(exponent.min(31)).unwrap_or(u32::MAX);
    base.saturating_mul(multiplier)
}

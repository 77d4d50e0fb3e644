// SPDX-License-Identifier: Apache-2.0

//! Runtime settings for the core and the CLI.
//!
//! Three layers, later ones winning:
//!
//! 1. Defaults compiled into each section's `Default` impl
//! 2. `config.toml` under [`config_dir`]
//! 3. `RIDESYNC_*` environment variables, `__` between section and key
//!
//! ```bash
//! # Poll order status every two seconds
//! RIDESYNC_TRACKING__POLL_INTERVAL_SECONDS=2 ridesync order track o-123
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::RideError;

/// Every configurable knob, grouped by component.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote service settings.
    pub api: ApiConfig,
    /// Automatic retry inside the request executor.
    pub retry: RetryConfig,
    /// User-initiated retry through the retry coordinator.
    pub coordinator: CoordinatorConfig,
    /// Order polling cadence.
    pub tracking: TrackingConfig,
    /// Token refresh policy.
    pub auth: AuthConfig,
}

/// Remote service settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.ridesync.example/v1".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ApiConfig {
    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Bounded exponential backoff applied invisibly by the executor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Delay before the first retry.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Upper bound on any single delay.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Limits for user-initiated retries.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Retries allowed per error session.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

impl CoordinatorConfig {
    /// Delay before the first retry.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Order polling cadence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Seconds between order status polls.
    pub poll_interval_seconds: u64,
    /// Seconds between driver location polls.
    pub driver_poll_interval_seconds: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 5,
            driver_poll_interval_seconds: 3,
        }
    }
}

impl TrackingConfig {
    /// Interval between order status polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }

    /// Interval between driver location polls.
    #[must_use]
    pub fn driver_poll_interval(&self) -> Duration {
        Duration::from_secs(self.driver_poll_interval_seconds.max(1))
    }
}

/// Token refresh policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Refresh a JWT access token this many seconds before it expires.
    pub refresh_skew_seconds: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_skew_seconds: 60,
        }
    }
}

/// Returns the configuration directory.
///
/// Respects `XDG_CONFIG_HOME` if set, otherwise `~/.config/ridesync`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        return PathBuf::from(xdg_config).join("ridesync");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("ridesync")
}

/// Returns the path to the configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Load application configuration from the default location.
///
/// Environment variables use the prefix `RIDESYNC_` and a double underscore
/// for nested keys (e.g., `RIDESYNC_API__BASE_URL`).
///
/// # Errors
///
/// Returns `RideError::Config` if the config file exists but is invalid.
pub fn load_config() -> Result<AppConfig, RideError> {
    load_config_from(&config_file_path())
}

/// Load application configuration from an explicit file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig, RideError> {
    let config = Config::builder()
        .add_source(File::with_name(path.to_string_lossy().as_ref()).required(false))
        .add_source(
            Environment::with_prefix("RIDESYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    Ok(app_config)
}

// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! # RideSync Core
//!
//! Order synchronization core for the RideSync mobile client.
//!
//! This crate keeps a locally held ride order in agreement with the ride
//! service over an unreliable network:
//! - Credential storage (in-memory or system keyring)
//! - A closed error taxonomy with user-facing messages
//! - A request executor with auth injection and automatic retry
//! - A user-facing retry coordinator
//! - An order tracking engine that polls status and driver location
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ridesync_core::{
//!     MemoryCredentialStore, OrderId, OrderTracker, RideClient, load_config,
//! };
//!
//! # async fn example() -> ridesync_core::Result<()> {
//! let config = load_config()?;
//! let credentials = Arc::new(MemoryCredentialStore::new());
//! let client = Arc::new(RideClient::from_config(&config, credentials)?);
//!
//! let tracker = OrderTracker::new(client, config.tracking.clone());
//! tracker.start_tracking(OrderId::new("o-123")).await?;
//!
//! let mut updates = tracker.subscribe();
//! while updates.changed().await.is_ok() {
//!     println!("{}", updates.borrow().status_display_text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`credentials`] - Token storage
//! - [`error`] - Error taxonomy
//! - [`endpoint`], [`transport`], [`executor`] - Request execution
//! - [`coordinator`] - User-facing retry
//! - [`tracking`] - Order tracking engine
//! - [`client`], [`routes`] - Typed ride service API

// ============================================================================
// Error Handling
// ============================================================================

pub use error::{ErrorCategory, RideError};

/// Convenience Result type for RideSync operations.
///
/// This is equivalent to `std::result::Result<T, RideError>`.
pub type Result<T> = std::result::Result<T, RideError>;

// ============================================================================
// Configuration
// ============================================================================

pub use config::{
    ApiConfig, AppConfig, AuthConfig, CoordinatorConfig, RetryConfig, TrackingConfig, config_dir,
    config_file_path, load_config, load_config_from,
};

// ============================================================================
// Credentials
// ============================================================================

#[cfg(feature = "keyring")]
pub use credentials::KeyringCredentialStore;
pub use credentials::{CredentialKind, CredentialStore, MemoryCredentialStore};

// ============================================================================
// Request Execution
// ============================================================================

pub use endpoint::Endpoint;
pub use executor::RequestExecutor;
pub use transport::{HttpBody, HttpRequest, HttpResponse, MultipartFile, ReqwestTransport, Transport};

// ============================================================================
// Retry
// ============================================================================

pub use coordinator::{RetryCoordinator, RetryError, RetryState};
pub use retry::{is_retryable, retry_backoff};

// ============================================================================
// Order Tracking
// ============================================================================

pub use tracking::{OrderApi, OrderTracker, TrackingSnapshot, status_display_text};

// ============================================================================
// Ride API
// ============================================================================

pub use client::RideClient;
pub use routes::{Route, SignInRequest};
pub use types::{
    AuthCredential, Coordinate, CreateOrderRequest, Driver, DriverLocationUpdate, Location, Money,
    Order, OrderId, OrderStatus, PriceEstimateRequest, SavedCredentials,
};

// ============================================================================
// Modules
// ============================================================================

pub mod client;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod retry;
pub mod routes;
pub mod tracking;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

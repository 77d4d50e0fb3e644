// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the synchronization core.
//!
//! Every failure the core surfaces is a [`RideError`]. Each variant belongs to
//! exactly one [`ErrorCategory`] and carries a fixed retryability flag, a
//! one-line user message (its `Display`), an optional failure reason, and an
//! optional recovery suggestion.

use serde::Deserialize;
use thiserror::Error;

/// Coarse grouping of [`RideError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network reachability, timeouts, server availability.
    Connectivity,
    /// Missing, invalid, or rejected credentials.
    Authentication,
    /// The request itself was rejected as malformed.
    Validation,
    /// The order is in a state that forbids the operation.
    Order,
    /// Payment could not be taken.
    Payment,
    /// Location permission or lookup problems.
    Location,
    /// Everything else, including contract mismatches.
    System,
}

/// Errors that can occur during synchronization with the ride service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RideError {
    /// Generic network failure, optionally carrying the raw HTTP status.
    #[error("Network error: {message}")]
    Network {
        /// Error message from the transport.
        message: String,
        /// Unmapped HTTP status code, if the server answered.
        status: Option<u16>,
    },

    /// The device is offline or the host is unreachable.
    #[error("No internet connection")]
    NoConnection,

    /// The request did not complete in time (also used for 408 and 429).
    #[error("The request timed out")]
    Timeout,

    /// The service answered with a 5xx status.
    #[error("The service is temporarily unavailable")]
    ServerUnavailable,

    /// No usable access token; the user must sign in.
    #[error("Authentication required - please sign in")]
    AuthenticationRequired,

    /// Sign-in was rejected.
    #[error("Invalid phone number or password")]
    InvalidCredentials,

    /// The session expired and could not be renewed.
    #[error("Your session has expired")]
    TokenExpired,

    /// The account may not use the service (HTTP 403).
    #[error("Your account has been suspended")]
    AccountSuspended,

    /// The request was malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the request.
        message: String,
    },

    /// The service rejected the request for missing or invalid fields.
    #[error("Missing required fields: {}", fields.join(", "))]
    MissingRequiredFields {
        /// Names of the offending fields.
        fields: Vec<String>,
    },

    /// Phone number failed validation.
    #[error("Invalid phone number")]
    InvalidPhoneNumber,

    /// Pickup or destination failed validation.
    #[error("Invalid location")]
    InvalidLocation,

    /// The order (or another resource) does not exist (HTTP 404).
    #[error("Order not found")]
    OrderNotFound,

    /// The order was already cancelled.
    #[error("This order has already been cancelled")]
    OrderAlreadyCancelled,

    /// The order has progressed too far to be cancelled.
    #[error("This order can no longer be cancelled")]
    OrderCannotBeCancelled,

    /// Matching found no drivers near the pickup.
    #[error("No drivers available in your area")]
    NoDriversAvailable,

    /// The assigned driver dropped out.
    #[error("The driver is no longer available")]
    DriverNotAvailable,

    /// The service could not price the trip.
    #[error("Unable to estimate the price for this trip")]
    PriceEstimationFailed,

    /// Payment was declined.
    #[error("Payment failed: {message}")]
    PaymentFailed {
        /// Reason reported by the payment collaborator.
        message: String,
    },

    /// The payment method lacks funds.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// The payment method is not accepted.
    #[error("This payment method is not supported")]
    PaymentMethodUnsupported,

    /// The payment method is not set up on this device.
    #[error("This payment method is unavailable")]
    PaymentMethodUnavailable,

    /// Transient failure while processing a payment.
    #[error("Payment processing error")]
    PaymentProcessing,

    /// The user refused location access.
    #[error("Location access denied")]
    LocationPermissionDenied,

    /// Location services are switched off.
    #[error("Location services are disabled")]
    LocationServicesDisabled,

    /// The current position could not be determined.
    #[error("Unable to determine your location")]
    LocationNotFound,

    /// Coordinates fell outside the valid range.
    #[error("Invalid coordinates")]
    InvalidCoordinates,

    /// Unclassified failure.
    #[error("An unexpected error occurred: {message}")]
    Unknown {
        /// Underlying message.
        message: String,
    },

    /// A response body did not match the expected shape.
    #[error("Failed to read the server response: {message}")]
    Decoding {
        /// Underlying decoder message.
        message: String,
    },

    /// A request body could not be serialized.
    #[error("Failed to prepare the request: {message}")]
    Encoding {
        /// Underlying encoder message.
        message: String,
    },

    /// Configuration file or environment error.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// Secure storage rejected a write or delete.
    #[error("Credential storage error: {message}")]
    CredentialStorage {
        /// Error message from the storage backend.
        message: String,
    },
}

impl RideError {
    /// The category this error belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network { .. } | Self::NoConnection | Self::Timeout | Self::ServerUnavailable => {
                ErrorCategory::Connectivity
            }
            Self::AuthenticationRequired
            | Self::InvalidCredentials
            | Self::TokenExpired
            | Self::AccountSuspended => ErrorCategory::Authentication,
            Self::InvalidRequest { .. }
            | Self::MissingRequiredFields { .. }
            | Self::InvalidPhoneNumber
            | Self::InvalidLocation => ErrorCategory::Validation,
            Self::OrderNotFound
            | Self::OrderAlreadyCancelled
            | Self::OrderCannotBeCancelled
            | Self::NoDriversAvailable
            | Self::DriverNotAvailable
            | Self::PriceEstimationFailed => ErrorCategory::Order,
            Self::PaymentFailed { .. }
            | Self::InsufficientFunds
            | Self::PaymentMethodUnsupported
            | Self::PaymentMethodUnavailable
            | Self::PaymentProcessing => ErrorCategory::Payment,
            Self::LocationPermissionDenied
            | Self::LocationServicesDisabled
            | Self::LocationNotFound
            | Self::InvalidCoordinates => ErrorCategory::Location,
            Self::Unknown { .. }
            | Self::Decoding { .. }
            | Self::Encoding { .. }
            | Self::Config { .. }
            | Self::CredentialStorage { .. } => ErrorCategory::System,
        }
    }

    /// Whether the failure may succeed on a later attempt without user input.
    ///
    /// A pure function of the variant: payloads never change the answer.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::NoConnection
                | Self::Timeout
                | Self::ServerUnavailable
                | Self::NoDriversAvailable
                | Self::DriverNotAvailable
                | Self::PriceEstimationFailed
                | Self::PaymentProcessing
                | Self::LocationNotFound
                | Self::Unknown { .. }
        )
    }

    /// Whether stored credentials must be discarded when this error occurs.
    #[must_use]
    pub fn clears_credentials(&self) -> bool {
        matches!(self, Self::AuthenticationRequired)
    }

    /// One-line user-facing message.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Longer explanation of what went wrong, when one is useful.
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        let reason = match self {
            Self::Network {
                status: Some(code), ..
            } => return Some(format!("The server responded with HTTP {code}.")),
            Self::NoConnection => "The device appears to be offline.",
            Self::Timeout => "The server took too long to respond.",
            Self::ServerUnavailable => "The ride service is experiencing problems.",
            Self::AuthenticationRequired | Self::TokenExpired => {
                "Your credentials are missing or no longer valid."
            }
            Self::AccountSuspended => "Access to this account has been restricted.",
            Self::MissingRequiredFields { fields } if !fields.is_empty() => {
                return Some(format!(
                    "The following fields need attention: {}.",
                    fields.join(", ")
                ));
            }
            Self::OrderCannotBeCancelled => "The trip has already started or finished.",
            Self::NoDriversAvailable => "All nearby drivers are busy right now.",
            Self::InsufficientFunds => "The selected payment method was declined.",
            Self::LocationPermissionDenied => "The app is not allowed to access your location.",
            Self::LocationServicesDisabled => "Location services are turned off on this device.",
            Self::Decoding { message } | Self::Encoding { message } => {
                return Some(message.clone());
            }
            _ => return None,
        };
        Some(reason.to_string())
    }

    /// What the user can do about it, when there is something to do.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        let suggestion = match self {
            Self::Network { .. } | Self::NoConnection => {
                "Check your internet connection and try again."
            }
            Self::Timeout | Self::ServerUnavailable | Self::Unknown { .. } => {
                "Please try again in a moment."
            }
            Self::AuthenticationRequired | Self::TokenExpired => "Sign in again to continue.",
            Self::InvalidCredentials => "Check your phone number and password.",
            Self::AccountSuspended => "Contact support for help with your account.",
            Self::InvalidRequest { .. } | Self::MissingRequiredFields { .. } => {
                "Review the highlighted fields and try again."
            }
            Self::InvalidPhoneNumber => "Enter a valid phone number including the country code.",
            Self::InvalidLocation | Self::InvalidCoordinates => {
                "Choose a different pickup or destination."
            }
            Self::NoDriversAvailable | Self::DriverNotAvailable => {
                "Try again in a few minutes."
            }
            Self::PriceEstimationFailed => "Try requesting the estimate again.",
            Self::PaymentFailed { .. } | Self::PaymentProcessing => {
                "Try again or use a different payment method."
            }
            Self::InsufficientFunds
            | Self::PaymentMethodUnsupported
            | Self::PaymentMethodUnavailable => "Choose a different payment method.",
            Self::LocationPermissionDenied | Self::LocationServicesDisabled => {
                "Enable location access in Settings."
            }
            Self::LocationNotFound => "Move to an open area and try again.",
            Self::Decoding { .. } | Self::Encoding { .. } => {
                "Update the app to the latest version."
            }
            Self::Config { .. } => "Check your configuration file.",
            Self::CredentialStorage { .. } => "Unlock your keychain and try again.",
            Self::OrderNotFound | Self::OrderAlreadyCancelled | Self::OrderCannotBeCancelled => {
                return None;
            }
        };
        Some(suggestion.to_string())
    }

    /// Classifies a non-success HTTP response.
    ///
    /// Returns `None` for 2xx statuses. A 422 body that parses as a
    /// [`ValidationPayload`] carries its field names.
    #[must_use]
    pub fn from_status(status: u16, body: &[u8]) -> Option<Self> {
        let error = match status {
            200..=299 => return None,
            401 => Self::AuthenticationRequired,
            403 => Self::AccountSuspended,
            404 => Self::OrderNotFound,
            408 | 429 => Self::Timeout,
            422 => Self::from_validation_body(body),
            500..=599 => Self::ServerUnavailable,
            other => Self::Network {
                message: format!("Unexpected HTTP status {other}"),
                status: Some(other),
            },
        };
        Some(error)
    }

    fn from_validation_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<ValidationPayload>(body) {
            Ok(payload) if !payload.errors.is_empty() => Self::MissingRequiredFields {
                fields: payload.errors.into_iter().map(|e| e.field).collect(),
            },
            Ok(payload) => Self::InvalidRequest {
                message: payload
                    .message
                    .unwrap_or_else(|| "validation failed".to_string()),
            },
            Err(_) => Self::InvalidRequest {
                message: "validation failed".to_string(),
            },
        }
    }
}

/// Structured body of a 422 response.
#[derive(Debug, Deserialize)]
pub struct ValidationPayload {
    /// Summary message.
    #[serde(default)]
    pub message: Option<String>,
    /// Per-field failures.
    #[serde(default)]
    pub errors: Vec<FieldError>,
}

/// A single field failure inside a [`ValidationPayload`].
#[derive(Debug, Deserialize)]
pub struct FieldError {
    /// Field name as sent in the request.
    pub field: String,
    /// Optional per-field message.
    #[serde(default)]
    pub message: Option<String>,
}

impl From<serde_json::Error> for RideError {
    fn from(err: serde_json::Error) -> Self {
        RideError::Decoding {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for RideError {
    fn from(err: config::ConfigError) -> Self {
        RideError::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "keyring")]
impl From<keyring::Error> for RideError {
    fn from(err: keyring::Error) -> Self {
        RideError::CredentialStorage {
            message: err.to_string(),
        }
    }
}

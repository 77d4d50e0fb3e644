// SPDX-License-Identifier: Apache-2.0

//! Wire and domain types shared by the client and the tracker.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Opaque order identifier assigned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Creates an order id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle of an order as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
    /// Created, not yet dispatched.
    Pending,
    /// The service is searching for a driver.
    Matching,
    /// A driver accepted the order.
    Matched,
    /// The driver is heading to the pickup.
    DriverEnRoute,
    /// The driver is waiting at the pickup.
    Arrived,
    /// The passenger is on board.
    InProgress,
    /// Trip finished.
    Completed,
    /// Order cancelled by either party.
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Matching,
        OrderStatus::Matched,
        OrderStatus::DriverEnRoute,
        OrderStatus::Arrived,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// `completed` and `cancelled` admit no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Statuses in which a driver is attached to the order.
    #[must_use]
    pub fn has_driver(self) -> bool {
        matches!(
            self,
            Self::Matched | Self::DriverEnRoute | Self::Arrived | Self::InProgress | Self::Completed
        )
    }

    /// Statuses in which the passenger may call or message the driver.
    #[must_use]
    pub fn allows_driver_contact(self) -> bool {
        matches!(
            self,
            Self::Matched | Self::DriverEnRoute | Self::Arrived | Self::InProgress
        )
    }

    /// Statuses in which the driver's ETA to the pickup is meaningful.
    #[must_use]
    pub fn shows_eta(self) -> bool {
        matches!(self, Self::Matched | Self::DriverEnRoute)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Matching => "matching",
            OrderStatus::Matched => "matched",
            OrderStatus::DriverEnRoute => "driverEnRoute",
            OrderStatus::Arrived => "arrived",
            OrderStatus::InProgress => "inProgress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A point on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Degrees north, -90..=90.
    pub latitude: f64,
    /// Degrees east, -180..=180.
    pub longitude: f64,
}

impl Coordinate {
    /// Whether both components are finite and within range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A pickup or destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Position.
    pub coordinate: Coordinate,
    /// Human-readable address, when geocoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Price estimate in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    /// Amount in minor units (cents).
    pub amount_minor: i64,
    /// ISO 4217 currency code.
    pub currency: String,
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount_minor < 0 { "-" } else { "" };
        let abs = self.amount_minor.unsigned_abs();
        write!(f, "{sign}{}.{:02} {}", abs / 100, abs % 100, self.currency)
    }
}

/// The driver attached to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    /// Driver identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Average rating, 0.0..=5.0.
    pub rating: f32,
    /// Vehicle description, e.g. "White Toyota Prius".
    pub vehicle: String,
    /// License plate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate_number: Option<String>,
    /// Last reported position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinate>,
    /// Expected arrival at the pickup; meaningful only while en route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_arrival: Option<DateTime<Utc>>,
}

/// A single ride request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Service-assigned id.
    pub id: OrderId,
    /// Current lifecycle state.
    pub status: OrderStatus,
    /// Where the passenger is picked up.
    pub pickup: Location,
    /// Where the passenger is going.
    pub destination: Location,
    /// Attached driver, present from `matched` onwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
    /// Estimated fare.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_estimate: Option<Money>,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// When the ride is scheduled for, if not immediate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Set exactly when `status == completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Checks the data-model invariants.
    ///
    /// `completed_at` must be set iff the order is completed, and a driver may
    /// only be attached in driver-bearing statuses.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let completion_ok =
            self.completed_at.is_some() == (self.status == OrderStatus::Completed);
        let driver_ok = self.driver.is_none() || self.status.has_driver();
        completion_ok && driver_ok
    }
}

/// Result of a driver-location poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocationUpdate {
    /// Current driver position.
    pub location: Coordinate,
    /// Updated ETA to the pickup.
    #[serde(default)]
    pub estimated_arrival: Option<DateTime<Utc>>,
    /// Order status piggybacked on the location response.
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

/// Access and refresh token pair.
#[derive(Debug, Clone)]
pub struct AuthCredential {
    /// Bearer token for API calls.
    pub access_token: SecretString,
    /// Token used to obtain a new access token.
    pub refresh_token: SecretString,
}

/// Token pair as returned by sign-in and refresh calls.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

impl From<TokenResponse> for AuthCredential {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: SecretString::from(response.access_token),
            refresh_token: SecretString::from(response.refresh_token),
        }
    }
}

/// Sign-in details remembered for the next launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCredentials {
    /// Phone number in E.164 form.
    pub phone_number: String,
    /// Whether biometric unlock was enabled.
    #[serde(default)]
    pub biometrics_enabled: bool,
}

/// Payload for creating an order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Pickup location.
    pub pickup: Location,
    /// Destination location.
    pub destination: Location,
    /// Payment method id handed over by the payment collaborator.
    pub payment_method_id: String,
    /// Optional scheduled pickup time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Payload for a price estimate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEstimateRequest {
    /// Pickup location.
    pub pickup: Location,
    /// Destination location.
    pub destination: Location,
}

/// Response to an upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    /// Server-assigned locator of the stored resource.
    pub url: String,
}

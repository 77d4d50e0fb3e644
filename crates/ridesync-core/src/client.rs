// SPDX-License-Identifier: Apache-2.0

//! Typed ride service client.
//!
//! [`RideClient`] pairs the [`Route`] table with a [`RequestExecutor`] and
//! checks request payloads locally before anything goes over the wire.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::credentials::CredentialStore;
use crate::error::RideError;
use crate::executor::RequestExecutor;
use crate::routes::{Route, SignInRequest};
use crate::tracking::OrderApi;
use crate::transport::{MultipartFile, ReqwestTransport, Transport};
use crate::types::{
    CreateOrderRequest, DriverLocationUpdate, Location, Money, Order, OrderId,
    PriceEstimateRequest, SavedCredentials, TokenResponse,
};

/// Ride service API.
#[derive(Debug)]
pub struct RideClient {
    executor: RequestExecutor,
}

impl RideClient {
    /// Wraps an already configured executor.
    #[must_use]
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// Builds a client talking to `config.api.base_url` over HTTPS, with
    /// token refresh enabled.
    pub fn from_config(
        config: &AppConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> crate::Result<Self> {
        let transport = ReqwestTransport::new(&config.api.base_url, config.api.timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport), credentials))
    }

    /// Like [`Self::from_config`] with a caller-supplied transport.
    #[must_use]
    pub fn with_transport(
        config: &AppConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let executor = RequestExecutor::new(transport, credentials, config.retry.clone())
            .with_token_refresh(config.auth.refresh_skew_seconds, |token| {
                Route::RefreshToken(token).endpoint()
            });
        Self::new(executor)
    }

    /// The executor behind this client.
    #[must_use]
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Whether an access token is stored.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.executor.credentials().is_authenticated()
    }

    /// Signs in and stores the returned token pair.
    #[instrument(skip_all)]
    pub async fn sign_in(&self, request: &SignInRequest) -> crate::Result<()> {
        if !is_phone_number(&request.phone_number) {
            return Err(RideError::InvalidPhoneNumber);
        }
        if request.verification_code.trim().is_empty() {
            return Err(RideError::MissingRequiredFields {
                fields: vec!["verificationCode".to_string()],
            });
        }

        let tokens: TokenResponse = self
            .executor
            .request(&Route::SignIn(request).endpoint()?)
            .await?;
        let credentials = self.executor.credentials();
        credentials.store_credential(&tokens.into())?;

        let biometrics_enabled = credentials
            .saved_credentials()
            .is_some_and(|saved| saved.biometrics_enabled);
        if let Err(e) = credentials.store_saved_credentials(&SavedCredentials {
            phone_number: request.phone_number.clone(),
            biometrics_enabled,
        }) {
            warn!(error = %e, "Failed to remember phone number");
        }
        info!("Signed in");
        Ok(())
    }

    /// Forgets all stored credentials.
    pub fn sign_out(&self) -> crate::Result<()> {
        self.executor.credentials().clear_all()?;
        info!("Signed out");
        Ok(())
    }

    /// Places an order.
    #[instrument(skip_all)]
    pub async fn create_order(&self, request: &CreateOrderRequest) -> crate::Result<Order> {
        check_location(&request.pickup)?;
        check_location(&request.destination)?;
        if request.payment_method_id.trim().is_empty() {
            return Err(RideError::MissingRequiredFields {
                fields: vec!["paymentMethodId".to_string()],
            });
        }
        let order: Order = self
            .executor
            .request(&Route::CreateOrder(request).endpoint()?)
            .await?;
        info!(order_id = %order.id, "Order created");
        Ok(order)
    }

    /// Fetches an order.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn order(&self, id: &OrderId) -> crate::Result<Order> {
        let order: Order = self.executor.request(&Route::GetOrder(id).endpoint()?).await?;
        if !order.is_consistent() {
            warn!(status = %order.status, "Service returned an inconsistent order");
        }
        Ok(order)
    }

    /// Cancels an order.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn cancel_order(&self, id: &OrderId) -> crate::Result<()> {
        self.executor
            .request_without_response(&Route::CancelOrder(id).endpoint()?)
            .await?;
        info!("Order cancelled");
        Ok(())
    }

    /// Quotes a fare.
    #[instrument(skip_all)]
    pub async fn estimate_price(&self, request: &PriceEstimateRequest) -> crate::Result<Money> {
        check_location(&request.pickup)?;
        check_location(&request.destination)?;
        self.executor
            .request(&Route::EstimatePrice(request).endpoint()?)
            .await
    }

    /// Fetches the driver's position for an order.
    pub async fn driver_location(&self, id: &OrderId) -> crate::Result<DriverLocationUpdate> {
        self.executor
            .request(&Route::DriverLocation(id).endpoint()?)
            .await
    }

    /// Uploads a JPEG or PNG profile photo and returns its URL.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn upload_profile_photo(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> crate::Result<String> {
        let extension = match content_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            other => {
                return Err(RideError::InvalidRequest {
                    message: format!("Unsupported image type: {other}"),
                });
            }
        };
        let file = MultipartFile {
            field_name: "photo".to_string(),
            file_name: format!("profile.{extension}"),
            content_type: content_type.to_string(),
            bytes,
        };
        self.executor
            .upload_file(&Route::UploadProfilePhoto.endpoint()?, file)
            .await
    }
}

#[async_trait]
impl OrderApi for RideClient {
    async fn fetch_order(&self, id: &OrderId) -> crate::Result<Order> {
        self.order(id).await
    }

    async fn fetch_driver_location(&self, id: &OrderId) -> crate::Result<DriverLocationUpdate> {
        self.driver_location(id).await
    }
}

fn check_location(location: &Location) -> crate::Result<()> {
    if location.coordinate.is_valid() {
        Ok(())
    } else {
        Err(RideError::InvalidCoordinates)
    }
}

/// E.164: a leading `+` and 8 to 15 digits.
fn is_phone_number(value: &str) -> bool {
    value.strip_prefix('+').is_some_and(|digits| {
        (8..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
    })
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;
    use crate::credentials::{CredentialKind, MemoryCredentialStore};
    use crate::testing::ScriptedTransport;
    use crate::transport::HttpBody;
    use crate::types::Coordinate;

    fn client(transport: &Arc<ScriptedTransport>, store: &Arc<MemoryCredentialStore>) -> RideClient {
        RideClient::with_transport(
            &AppConfig::default(),
            Arc::clone(transport) as Arc<dyn Transport>,
            Arc::clone(store) as Arc<dyn CredentialStore>,
        )
    }

    fn signed_in() -> Arc<MemoryCredentialStore> {
        let store = MemoryCredentialStore::new();
        store
            .store(CredentialKind::AccessToken, &"access".to_string().into())
            .unwrap();
        Arc::new(store)
    }

    fn place(latitude: f64, longitude: f64) -> Location {
        Location {
            coordinate: Coordinate {
                latitude,
                longitude,
            },
            address: None,
        }
    }

    const ORDER_JSON: &str = r#"{
        "id": "o-1",
        "status": "matching",
        "pickup": {"coordinate": {"latitude": 22.28, "longitude": 114.16}},
        "destination": {"coordinate": {"latitude": 22.3, "longitude": 114.17}},
        "createdAt": "2026-10-19T08:00:00Z"
    }"#;

    #[tokio::test]
    async fn test_sign_in_stores_tokens_and_phone() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(200, r#"{"accessToken": "a-1", "refreshToken": "r-1"}"#);
        let store = Arc::new(MemoryCredentialStore::new());
        let client = client(&transport, &store);

        client
            .sign_in(&SignInRequest {
                phone_number: "+85291234567".to_string(),
                verification_code: "123456".to_string(),
            })
            .await
            .unwrap();

        assert!(client.is_authenticated());
        assert_eq!(
            store
                .get(CredentialKind::AccessToken)
                .unwrap()
                .expose_secret(),
            "a-1"
        );
        assert_eq!(
            store.saved_credentials().map(|s| s.phone_number),
            Some("+85291234567".to_string())
        );
        assert!(transport.requests()[0].bearer.is_none());
    }

    #[tokio::test]
    async fn test_sign_in_rejects_bad_phone_locally() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(MemoryCredentialStore::new());

        let err = client(&transport, &store)
            .sign_in(&SignInRequest {
                phone_number: "9123 4567".to_string(),
                verification_code: "123456".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(err, RideError::InvalidPhoneNumber);
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_sign_out_clears_store() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = signed_in();
        let client = client(&transport, &store);

        client.sign_out().unwrap();

        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_create_order_validates_before_sending() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = signed_in();
        let client = client(&transport, &store);
        let mut request = CreateOrderRequest {
            pickup: place(91.0, 0.0),
            destination: place(22.3, 114.17),
            payment_method_id: "pm-1".to_string(),
            scheduled_at: None,
        };

        assert_eq!(
            client.create_order(&request).await.unwrap_err(),
            RideError::InvalidCoordinates
        );

        request.pickup = place(22.28, 114.16);
        request.payment_method_id = " ".to_string();
        assert_eq!(
            client.create_order(&request).await.unwrap_err(),
            RideError::MissingRequiredFields {
                fields: vec!["paymentMethodId".to_string()]
            }
        );
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_create_order_posts_json() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(201, ORDER_JSON);
        let store = signed_in();

        let order = client(&transport, &store)
            .create_order(&CreateOrderRequest {
                pickup: place(22.28, 114.16),
                destination: place(22.3, 114.17),
                payment_method_id: "pm-1".to_string(),
                scheduled_at: None,
            })
            .await
            .unwrap();

        assert_eq!(order.id, OrderId::new("o-1"));
        let request = &transport.requests()[0];
        assert_eq!(request.path, "/orders");
        let HttpBody::Bytes(body) = &request.body else {
            panic!("expected JSON body");
        };
        let body: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(body["paymentMethodId"], "pm-1");
    }

    #[tokio::test]
    async fn test_order_api_fetches_order() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_response(200, ORDER_JSON);
        let store = signed_in();
        let client = client(&transport, &store);

        let order = client.fetch_order(&OrderId::new("o-1")).await.unwrap();

        assert_eq!(order.status, crate::types::OrderStatus::Matching);
        assert_eq!(transport.requests()[0].path, "/orders/o-1");
    }

    #[tokio::test]
    async fn test_upload_profile_photo_rejects_unknown_type() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = signed_in();

        let err = client(&transport, &store)
            .upload_profile_photo(vec![1, 2, 3], "image/gif")
            .await
            .unwrap_err();

        assert!(matches!(err, RideError::InvalidRequest { .. }));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn test_phone_number_format() {
        assert!(is_phone_number("+85291234567"));
        assert!(!is_phone_number("85291234567"));
        assert!(!is_phone_number("+852-9123"));
        assert!(!is_phone_number("+1234567"));
    }
}

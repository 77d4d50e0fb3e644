// SPDX-License-Identifier: Apache-2.0

//! Resilient request executor.
//!
//! Turns an [`Endpoint`] into an authenticated, validated, retried network
//! call:
//!
//! 1. Attach the access token from the [`CredentialStore`] when the endpoint
//!    requires authentication. No token means no network call.
//! 2. Refresh the token first if it is a JWT about to expire.
//! 3. Send through the [`Transport`].
//! 4. Classify non-2xx statuses; a 401 also clears stored credentials.
//! 5. Retry retryable failures with bounded exponential backoff.
//!
//! The retry here is invisible to callers. User-facing retry lives in
//! [`crate::coordinator`].

use std::fmt;
use std::sync::Arc;

use backon::Retryable;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::credentials::{CredentialKind, CredentialStore};
use crate::endpoint::Endpoint;
use crate::error::RideError;
use crate::retry::{is_retryable, retry_backoff};
use crate::transport::{HttpBody, HttpRequest, HttpResponse, MultipartFile, Transport};
use crate::types::{AuthCredential, TokenResponse, UploadResponse};

/// Builds the endpoint that exchanges a refresh token for a new token pair.
pub type RefreshEndpointFn = dyn Fn(&SecretString) -> crate::Result<Endpoint> + Send + Sync;

/// Executes endpoint descriptors against the ride service.
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    retry: RetryConfig,
    refresh_skew: chrono::Duration,
    refresh_endpoint: Option<Arc<RefreshEndpointFn>>,
    /// Serializes token refresh and credential clearing.
    auth_lock: Mutex<()>,
}

impl fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("retry", &self.retry)
            .field("refresh_skew", &self.refresh_skew)
            .field("refresh_enabled", &self.refresh_endpoint.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestExecutor {
    /// Creates an executor without pre-emptive token refresh.
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            transport,
            credentials,
            retry,
            refresh_skew: chrono::Duration::zero(),
            refresh_endpoint: None,
            auth_lock: Mutex::new(()),
        }
    }

    /// Enables pre-emptive refresh of JWT access tokens expiring within
    /// `skew_seconds`, using `endpoint` to build the refresh call.
    #[must_use]
    pub fn with_token_refresh<F>(mut self, skew_seconds: i64, endpoint: F) -> Self
    where
        F: Fn(&SecretString) -> crate::Result<Endpoint> + Send + Sync + 'static,
    {
        self.refresh_skew = chrono::Duration::seconds(skew_seconds.max(0));
        self.refresh_endpoint = Some(Arc::new(endpoint));
        self
    }

    /// The credential store this executor reads tokens from.
    #[must_use]
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Performs the call and decodes the JSON response body into `T`.
    #[instrument(skip(self, endpoint), fields(method = %endpoint.method, path = %endpoint.path))]
    pub async fn request<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> crate::Result<T> {
        let body = self.execute(endpoint, &body_of(endpoint)).await?;
        decode(&body)
    }

    /// Performs the call, validates the status, and discards the body.
    #[instrument(skip(self, endpoint), fields(method = %endpoint.method, path = %endpoint.path))]
    pub async fn request_without_response(&self, endpoint: &Endpoint) -> crate::Result<()> {
        self.execute(endpoint, &body_of(endpoint)).await?;
        Ok(())
    }

    /// Uploads `bytes` as a multipart file and returns the server-assigned URL.
    pub async fn upload_binary(&self, endpoint: &Endpoint, bytes: Vec<u8>) -> crate::Result<String> {
        self.upload_file(
            endpoint,
            MultipartFile {
                field_name: "file".to_string(),
                file_name: "upload.bin".to_string(),
                content_type: "application/octet-stream".to_string(),
                bytes,
            },
        )
        .await
    }

    /// Uploads a described file and returns the server-assigned URL.
    #[instrument(skip(self, endpoint, file), fields(path = %endpoint.path, bytes = file.bytes.len()))]
    pub async fn upload_file(&self, endpoint: &Endpoint, file: MultipartFile) -> crate::Result<String> {
        let body = self.execute(endpoint, &HttpBody::Multipart(file)).await?;
        let response: UploadResponse = decode(&body)?;
        Ok(response.url)
    }

    async fn execute(&self, endpoint: &Endpoint, body: &HttpBody) -> crate::Result<Vec<u8>> {
        // One key for every attempt of this call, so the service can dedupe.
        let idempotency_key = (!endpoint.is_idempotent()).then(|| Uuid::new_v4().to_string());

        (|| async { self.attempt(endpoint, body, idempotency_key.as_deref()).await })
            .retry(retry_backoff(&self.retry))
            .when(is_retryable)
            .notify(|err, dur| {
                warn!(error = %err, delay = ?dur, path = %endpoint.path, "Retrying after error");
            })
            .await
    }

    async fn attempt(
        &self,
        endpoint: &Endpoint,
        body: &HttpBody,
        idempotency_key: Option<&str>,
    ) -> crate::Result<Vec<u8>> {
        let bearer = if endpoint.requires_authentication {
            Some(self.access_token().await?)
        } else {
            None
        };

        let mut headers = endpoint.headers.clone();
        if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("Accept")) {
            headers.push(("Accept".to_string(), "application/json".to_string()));
        }
        if let Some(key) = idempotency_key {
            headers.push(("Idempotency-Key".to_string(), key.to_string()));
        }

        let response = self
            .transport
            .send(HttpRequest {
                method: endpoint.method.clone(),
                path: endpoint.path.clone(),
                query: endpoint.query.clone(),
                headers,
                bearer: bearer.clone(),
                body: body.clone(),
            })
            .await?;

        match validate(response) {
            Ok(body) => Ok(body),
            Err(err) => {
                if err.clears_credentials() {
                    self.clear_credentials_if_current(bearer.as_ref()).await;
                }
                Err(err)
            }
        }
    }

    /// Returns a usable access token, refreshing it first when near expiry.
    async fn access_token(&self) -> crate::Result<SecretString> {
        let token = self
            .credentials
            .get(CredentialKind::AccessToken)
            .ok_or(RideError::AuthenticationRequired)?;

        if self.should_refresh(&token) {
            return self.refresh(&token).await;
        }
        Ok(token)
    }

    fn should_refresh(&self, token: &SecretString) -> bool {
        if self.refresh_endpoint.is_none() {
            return false;
        }
        match jwt_expiry(token.expose_secret()) {
            Some(expires_at) => expires_at - Utc::now() <= self.refresh_skew,
            None => false,
        }
    }

    /// Single-flight token refresh. Any failure signs the user out.
    async fn refresh(&self, stale: &SecretString) -> crate::Result<SecretString> {
        let _guard = self.auth_lock.lock().await;

        // A sibling request may have refreshed or signed out while we waited.
        let current = self
            .credentials
            .get(CredentialKind::AccessToken)
            .ok_or(RideError::AuthenticationRequired)?;
        if current.expose_secret() != stale.expose_secret() && !self.should_refresh(&current) {
            debug!("Token already refreshed by a concurrent request");
            return Ok(current);
        }

        match self.exchange_refresh_token().await {
            Ok(credential) => {
                if let Err(e) = self.credentials.store_credential(&credential) {
                    warn!(error = %e, "Failed to persist refreshed credentials");
                }
                info!("Access token refreshed");
                Ok(credential.access_token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed; signing out");
                if let Err(e) = self.credentials.clear_all() {
                    warn!(error = %e, "Failed to clear credentials");
                }
                Err(RideError::AuthenticationRequired)
            }
        }
    }

    async fn exchange_refresh_token(&self) -> crate::Result<AuthCredential> {
        let factory = self
            .refresh_endpoint
            .as_ref()
            .ok_or(RideError::AuthenticationRequired)?;
        let refresh_token = self
            .credentials
            .get(CredentialKind::RefreshToken)
            .ok_or(RideError::AuthenticationRequired)?;
        let endpoint = factory(&refresh_token)?;

        let response = self
            .transport
            .send(HttpRequest {
                method: endpoint.method.clone(),
                path: endpoint.path.clone(),
                query: endpoint.query.clone(),
                headers: endpoint.headers.clone(),
                bearer: None,
                body: body_of(&endpoint),
            })
            .await?;
        let body = validate(response)?;
        let tokens: TokenResponse = decode(&body)?;
        Ok(tokens.into())
    }

    /// Clears credentials after a 401, unless they were replaced after the
    /// failed request was sent.
    async fn clear_credentials_if_current(&self, used: Option<&SecretString>) {
        let _guard = self.auth_lock.lock().await;
        if let (Some(used), Some(current)) =
            (used, self.credentials.get(CredentialKind::AccessToken))
            && used.expose_secret() != current.expose_secret()
        {
            debug!("Ignoring stale 401; credentials were refreshed in the meantime");
            return;
        }
        match self.credentials.clear_all() {
            Ok(()) => info!("Credentials cleared after authentication failure"),
            Err(e) => warn!(error = %e, "Failed to clear credentials"),
        }
    }
}

fn body_of(endpoint: &Endpoint) -> HttpBody {
    match &endpoint.body {
        Some(bytes) => HttpBody::Bytes(bytes.clone()),
        None => HttpBody::Empty,
    }
}

fn validate(response: HttpResponse) -> crate::Result<Vec<u8>> {
    match RideError::from_status(response.status, &response.body) {
        None => Ok(response.body),
        Some(err) => {
            debug!(status = response.status, error = %err, "Request failed");
            Err(err)
        }
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> crate::Result<T> {
    serde_json::from_slice(body).map_err(|e| RideError::Decoding {
        message: e.to_string(),
    })
}

#[derive(Deserialize)]
struct JwtClaims {
    exp: i64,
}

/// Reads the `exp` claim of a JWT without verifying it.
///
/// Returns `None` for anything that is not a three-part JWT with a numeric
/// `exp`; such tokens are treated as opaque.
#[must_use]
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: JwtClaims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
}

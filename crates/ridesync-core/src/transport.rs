// SPDX-License-Identifier: Apache-2.0

//! Network transport abstraction.
//!
//! The executor speaks to the network only through [`Transport`], so the
//! retry, auth, and classification logic can be exercised without sockets.
//! [`ReqwestTransport`] is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::RideError;

/// A file attached as a single multipart form part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFile {
    /// Form field name.
    pub field_name: String,
    /// File name reported to the server.
    pub file_name: String,
    /// MIME type of `bytes`.
    pub content_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HttpBody {
    /// No body.
    #[default]
    Empty,
    /// Raw bytes, typically JSON.
    Bytes(Vec<u8>),
    /// `multipart/form-data` with one file part.
    Multipart(MultipartFile),
}

/// A fully resolved outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the transport's base URL.
    pub path: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Headers, excluding authorization.
    pub headers: Vec<(String, String)>,
    /// Bearer token, when the endpoint requires authentication.
    pub bearer: Option<SecretString>,
    /// Payload.
    pub body: HttpBody,
}

/// A raw response; status classification happens in the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Builds a response from a status and body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends requests over the network.
///
/// Implementations surface transport failures already classified: a timeout
/// as [`RideError::Timeout`], an unreachable host as
/// [`RideError::NoConnection`], anything else as [`RideError::Network`].
/// Non-2xx responses are *not* errors at this layer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and returns the raw response.
    async fn send(&self, request: HttpRequest) -> crate::Result<HttpResponse>;
}

/// Transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Creates a transport rooted at `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RideError::Config {
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// The base URL every path is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> crate::Result<HttpResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut req = self.http.request(request.method, &url);

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(token) = &request.bearer {
            req = req.bearer_auth(token.expose_secret());
        }

        req = match request.body {
            HttpBody::Empty => req,
            HttpBody::Bytes(bytes) => req.body(bytes),
            HttpBody::Multipart(file) => {
                let part = reqwest::multipart::Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str(&file.content_type)
                    .map_err(|e| RideError::Encoding {
                        message: e.to_string(),
                    })?;
                req.multipart(reqwest::multipart::Form::new().part(file.field_name, part))
            }
        };

        let response = req.send().await.map_err(|e| classify_reqwest(&e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_reqwest(&e))?
            .to_vec();

        debug!(%url, status, bytes = body.len(), "Received response");
        Ok(HttpResponse { status, body })
    }
}

/// Maps a transport-level `reqwest` failure onto the taxonomy.
#[must_use]
pub fn classify_reqwest(e: &reqwest::Error) -> RideError {
    if e.is_timeout() {
        RideError::Timeout
    } else if e.is_connect() {
        RideError::NoConnection
    } else if e.is_decode() {
        RideError::Decoding {
            message: e.to_string(),
        }
    } else {
        RideError::Network {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        }
    }
}

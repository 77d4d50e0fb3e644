// SPDX-License-Identifier: Apache-2.0

//! Endpoint descriptors.
//!
//! An [`Endpoint`] says everything the executor needs to issue a call and
//! nothing about what the call means. Routing tables build them; the executor
//! runs them.

use bon::Builder;
use reqwest::Method;
use serde::Serialize;

use crate::error::RideError;

/// A single API call, independent of business meaning.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct Endpoint {
    /// Path relative to the API base URL, e.g. `/orders/42`.
    #[builder(into)]
    pub path: String,
    /// HTTP method.
    #[builder(default = Method::GET)]
    pub method: Method,
    /// Query parameters, in order.
    #[builder(default)]
    pub query: Vec<(String, String)>,
    /// Serialized request body.
    pub body: Option<Vec<u8>>,
    /// Extra headers required by this call.
    #[builder(default)]
    pub headers: Vec<(String, String)>,
    /// Whether a bearer token must be attached.
    #[builder(default = true)]
    pub requires_authentication: bool,
}

impl Endpoint {
    /// Replaces the body with the JSON encoding of `value` and sets the
    /// content type.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> crate::Result<Self> {
        let body = serde_json::to_vec(value).map_err(|e| RideError::Encoding {
            message: e.to_string(),
        })?;
        self.body = Some(body);
        self.set_header("Content-Type", "application/json");
        Ok(self)
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets a header, replacing any existing header of the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    /// Whether repeating this call cannot change server state twice.
    #[must_use]
    pub fn is_idempotent(&self) -> bool {
        self.method.is_idempotent()
    }
}

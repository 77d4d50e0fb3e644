// SPDX-License-Identifier: Apache-2.0

//! Routing table for the ride service API.
//!
//! Maps each call the client makes to an [`Endpoint`]. The executor never
//! sees these variants, only the descriptors they produce.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::endpoint::Endpoint;
use crate::types::{CreateOrderRequest, OrderId, PriceEstimateRequest};

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Phone sign-in payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    /// Phone number in E.164 form.
    pub phone_number: String,
    /// One-time code received by SMS.
    pub verification_code: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenBody<'a> {
    refresh_token: &'a str,
}

/// One call against the ride service.
#[derive(Debug, Clone, Copy)]
pub enum Route<'a> {
    /// Exchange a phone number and code for a token pair.
    SignIn(&'a SignInRequest),
    /// Exchange a refresh token for a new token pair.
    RefreshToken(&'a SecretString),
    /// Place a new order.
    CreateOrder(&'a CreateOrderRequest),
    /// Fetch one order.
    GetOrder(&'a OrderId),
    /// Cancel an order.
    CancelOrder(&'a OrderId),
    /// Quote a fare.
    EstimatePrice(&'a PriceEstimateRequest),
    /// Fetch the driver's position for an order.
    DriverLocation(&'a OrderId),
    /// Upload a profile photo.
    UploadProfilePhoto,
}

impl Route<'_> {
    /// Builds the endpoint descriptor for this call.
    pub fn endpoint(&self) -> crate::Result<Endpoint> {
        let endpoint = match self {
            Route::SignIn(request) => Endpoint::builder()
                .path("/auth/signin")
                .method(Method::POST)
                .requires_authentication(false)
                .build()
                .with_json(request)?,
            Route::RefreshToken(token) => Endpoint::builder()
                .path("/auth/refresh")
                .method(Method::POST)
                .requires_authentication(false)
                .build()
                .with_json(&RefreshTokenBody {
                    refresh_token: token.expose_secret(),
                })?,
            Route::CreateOrder(request) => Endpoint::builder()
                .path("/orders")
                .method(Method::POST)
                .build()
                .with_json(request)?,
            Route::GetOrder(id) => Endpoint::builder()
                .path(format!("/orders/{}", segment(id)))
                .build(),
            Route::CancelOrder(id) => Endpoint::builder()
                .path(format!("/orders/{}/cancel", segment(id)))
                .method(Method::POST)
                .build(),
            Route::EstimatePrice(request) => Endpoint::builder()
                .path("/orders/estimate")
                .method(Method::POST)
                .build()
                .with_json(request)?,
            Route::DriverLocation(id) => Endpoint::builder()
                .path(format!("/orders/{}/driver/location", segment(id)))
                .build(),
            Route::UploadProfilePhoto => Endpoint::builder()
                .path("/profile/photo")
                .method(Method::POST)
                .build(),
        };
        Ok(endpoint)
    }
}

fn segment(id: &OrderId) -> String {
    utf8_percent_encode(id.as_str(), SEGMENT).to_string()
}

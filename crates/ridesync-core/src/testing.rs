// SPDX-License-Identifier: Apache-2.0

//! Test doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::RideError;
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Transport that replays a queue of canned outcomes and records requests.
///
/// Once the queue is drained, the fallback response is returned (500 unless
/// set otherwise).
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<crate::Result<HttpResponse>>>,
    fallback: Mutex<HttpResponse>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(HttpResponse::new(500, Vec::new())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, status: u16, body: &str) {
        self.lock_script()
            .push_back(Ok(HttpResponse::new(status, body.as_bytes().to_vec())));
    }

    pub fn push_error(&self, error: RideError) {
        self.lock_script().push_back(Err(error));
    }

    pub fn set_fallback(&self, status: u16, body: &str) {
        *self.fallback.lock().unwrap_or_else(PoisonError::into_inner) =
            HttpResponse::new(status, body.as_bytes().to_vec());
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<crate::Result<HttpResponse>>> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> crate::Result<HttpResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        let next = self.lock_script().pop_front();
        next.unwrap_or_else(|| {
            Ok(self
                .fallback
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone())
        })
    }
}

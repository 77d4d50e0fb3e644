// SPDX-License-Identifier: Apache-2.0

//! User-facing retry coordinator.
//!
//! Holds the last failure of some operation together with a deferred action
//! that re-runs it. The presentation layer shows the error and offers a
//! retry button while [`RetryState::can_retry`] is true; each press waits
//! `base_delay * 2^(count - 1)` before re-invoking the action.
//!
//! The coordinator never talks to the network itself.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::config::CoordinatorConfig;
use crate::error::RideError;
use crate::retry::backoff_delay;

/// Deferred, re-invocable fallible operation.
pub type RetryAction = Arc<dyn Fn() -> BoxFuture<'static, crate::Result<()>> + Send + Sync>;

/// Why a call to [`RetryCoordinator::retry`] did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// No failed operation is recorded.
    #[error("Nothing to retry")]
    NothingToRetry,

    /// The recorded error cannot be fixed by trying again.
    #[error("This error cannot be retried")]
    NotRetryable,

    /// The retry cap has been reached.
    #[error("Gave up after {max_retries} retries")]
    Exhausted {
        /// Configured cap.
        max_retries: u32,
    },

    /// Another retry is already waiting or running.
    #[error("A retry is already in progress")]
    InProgress,

    /// The session was cleared or replaced while waiting.
    #[error("Retry cancelled")]
    Cancelled,

    /// The action ran and failed again.
    #[error(transparent)]
    Failed(RideError),
}

/// Immutable view of the coordinator session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Most recent failure, if any.
    pub error: Option<RideError>,
    /// Retries spent in the current session.
    pub retry_count: u32,
    /// True while a retry is waiting out its delay or running.
    pub is_retrying: bool,
    /// True while an error should be presented.
    pub showing_error: bool,
    /// Cap on `retry_count`.
    pub max_retries: u32,
}

impl RetryState {
    /// Whether a retry affordance should be enabled.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        !self.is_retrying
            && self.retry_count < self.max_retries
            && self.error.as_ref().is_some_and(RideError::is_retryable)
    }
}

#[derive(Default)]
struct Session {
    error: Option<RideError>,
    action: Option<RetryAction>,
    retry_count: u32,
    is_retrying: bool,
    /// Bumped whenever the session is replaced or cleared.
    generation: u64,
}

/// Observable retry state machine for one UI-facing operation.
pub struct RetryCoordinator {
    config: CoordinatorConfig,
    session: Mutex<Session>,
    state_tx: watch::Sender<RetryState>,
}

impl std::fmt::Debug for RetryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryCoordinator")
            .field("config", &self.config)
            .field("state", &*self.state_tx.borrow())
            .finish()
    }
}

impl Default for RetryCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

impl RetryCoordinator {
    /// Creates an idle coordinator.
    #[must_use]
    pub fn new(config: CoordinatorConfig) -> Self {
        let (state_tx, _) = watch::channel(RetryState {
            max_retries: config.max_retries,
            ..RetryState::default()
        });
        Self {
            config,
            session: Mutex::new(Session::default()),
            state_tx,
        }
    }

    /// Current session state.
    #[must_use]
    pub fn snapshot(&self) -> RetryState {
        self.state_tx.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RetryState> {
        self.state_tx.subscribe()
    }

    /// Records `error` and the action that would retry it.
    ///
    /// Replaces any previous session; a retry still waiting on its delay is
    /// cancelled.
    pub fn handle<F, Fut>(&self, error: RideError, action: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::Result<()>> + Send + 'static,
    {
        info!(error = %error, retryable = error.is_retryable(), "Recording failed operation");
        let action: RetryAction =
            Arc::new(move || -> BoxFuture<'static, crate::Result<()>> { Box::pin(action()) });
        let mut session = self.lock();
        let generation = session.generation.wrapping_add(1);
        *session = Session {
            error: Some(error),
            action: Some(action),
            retry_count: 0,
            is_retrying: false,
            generation,
        };
        self.publish(&session);
    }

    /// Runs `action` once; on failure, records it via [`Self::handle`] so it
    /// can be retried later.
    pub async fn run<F, Fut>(&self, action: F) -> crate::Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::Result<()>> + Send + 'static,
    {
        match action().await {
            Ok(()) => {
                self.clear_error();
                Ok(())
            }
            Err(e) => {
                self.handle(e.clone(), action);
                Err(e)
            }
        }
    }

    /// Waits out the backoff delay and re-invokes the stored action.
    #[instrument(skip(self))]
    pub async fn retry(&self) -> Result<(), RetryError> {
        let (action, delay, generation) = {
            let mut session = self.lock();
            let Some(action) = session.action.clone() else {
                return Err(RetryError::NothingToRetry);
            };
            if !session.error.as_ref().is_some_and(RideError::is_retryable) {
                return Err(RetryError::NotRetryable);
            }
            if session.is_retrying {
                return Err(RetryError::InProgress);
            }
            if session.retry_count >= self.config.max_retries {
                return Err(RetryError::Exhausted {
                    max_retries: self.config.max_retries,
                });
            }
            session.retry_count += 1;
            session.is_retrying = true;
            self.publish(&session);
            let delay = backoff_delay(self.config.base_delay(), session.retry_count - 1);
            (action, delay, session.generation)
        };

        let mut guard = RetryingGuard {
            coordinator: self,
            generation,
        };

        debug!(attempt = self.snapshot().retry_count, delay = ?delay, "Waiting before retry");
        tokio::time::sleep(delay).await;
        if self.lock().generation != generation {
            debug!("Retry cancelled during backoff");
            return Err(RetryError::Cancelled);
        }

        let result = action().await;
        guard.disarm();

        let mut session = self.lock();
        if session.generation != generation {
            return result.map_err(RetryError::Failed);
        }
        match result {
            Ok(()) => {
                info!("Retry succeeded");
                *session = Session {
                    generation: generation.wrapping_add(1),
                    ..Session::default()
                };
                self.publish(&session);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, retry_count = session.retry_count, "Retry failed");
                session.error = Some(e.clone());
                session.is_retrying = false;
                self.publish(&session);
                Err(RetryError::Failed(e))
            }
        }
    }

    /// Forgets the error, counter and stored action.
    pub fn clear_error(&self) {
        let mut session = self.lock();
        let generation = session.generation.wrapping_add(1);
        *session = Session {
            generation,
            ..Session::default()
        };
        self.publish(&session);
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, session: &Session) {
        self.state_tx.send_replace(RetryState {
            error: session.error.clone(),
            retry_count: session.retry_count,
            is_retrying: session.is_retrying,
            showing_error: session.error.is_some(),
            max_retries: self.config.max_retries,
        });
    }
}

/// Resets `is_retrying` if a retry future is dropped before the action ran.
struct RetryingGuard<'a> {
    coordinator: &'a RetryCoordinator,
    generation: u64,
}

impl RetryingGuard<'_> {
    fn disarm(&mut self) {
        self.generation = u64::MAX;
    }
}

impl Drop for RetryingGuard<'_> {
    fn drop(&mut self) {
        let mut session = self.coordinator.lock();
        if session.generation == self.generation && session.is_retrying {
            session.is_retrying = false;
            self.coordinator.publish(&session);
        }
    }
}

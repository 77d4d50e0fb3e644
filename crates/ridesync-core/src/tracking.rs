// SPDX-License-Identifier: Apache-2.0

//! Order tracking engine.
//!
//! Follows one order from dispatch to drop-off by polling the service:
//!
//! - a status poll re-fetches the whole order every
//!   [`TrackingConfig::poll_interval`] while the order is non-terminal;
//! - a driver poll fetches the driver's position and ETA every
//!   [`TrackingConfig::driver_poll_interval`] while a driver is attached.
//!
//! Each poll kind has at most one request outstanding. Every request takes a
//! sequence number when it is issued and a response is applied only if no
//! later-issued request has already been applied, so a slow response never
//! overwrites newer state.
//!
//! Presentation reads [`TrackingSnapshot`] values, either through
//! [`OrderTracker::snapshot`] or a [`watch`] subscription.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::TrackingConfig;
use crate::error::RideError;
use crate::types::{DriverLocationUpdate, Order, OrderId, OrderStatus};

/// Read side of the ride API needed for tracking.
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// Fetches the current state of an order.
    async fn fetch_order(&self, id: &OrderId) -> crate::Result<Order>;

    /// Fetches the attached driver's position and ETA.
    async fn fetch_driver_location(&self, id: &OrderId) -> crate::Result<DriverLocationUpdate>;
}

/// Everything the presentation layer needs to render a tracked order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSnapshot {
    /// Last known order, if any.
    pub order: Option<Order>,
    /// The service is still looking for a driver.
    pub is_matching: bool,
    /// A driver pipeline is underway.
    pub is_tracking_active: bool,
    /// Calling or messaging the driver is allowed.
    pub can_communicate_with_driver: bool,
    /// 0.0 while matching, 1.0 once a driver has been found.
    pub matching_progress: f64,
    /// Short phrase describing the status.
    pub status_display_text: String,
    /// "N min away" style ETA, when meaningful.
    pub estimated_arrival_text: Option<String>,
    /// Message of the last failed fetch, cleared by the next success.
    pub error_message: Option<String>,
    /// Polls are scheduled.
    pub is_polling: bool,
}

impl Default for TrackingSnapshot {
    fn default() -> Self {
        Self::derive(None, None, false, Utc::now())
    }
}

impl TrackingSnapshot {
    fn derive(
        order: Option<&Order>,
        error_message: Option<String>,
        is_polling: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let status = order.map(|o| o.status);
        let eta = order
            .and_then(|o| o.driver.as_ref())
            .and_then(|d| d.estimated_arrival);
        Self {
            order: order.cloned(),
            is_matching: status == Some(OrderStatus::Matching),
            is_tracking_active: status.is_some_and(OrderStatus::allows_driver_contact),
            can_communicate_with_driver: status.is_some_and(OrderStatus::allows_driver_contact),
            matching_progress: matching_progress(status),
            status_display_text: status_display_text(status).to_string(),
            estimated_arrival_text: status
                .and_then(|s| estimated_arrival_text(s, eta, now)),
            error_message,
            is_polling,
        }
    }

    /// Derives a one-off snapshot for `order`, outside any tracking session.
    #[must_use]
    pub fn from_order(order: &Order) -> Self {
        Self::derive(Some(order), None, false, Utc::now())
    }

    /// Status of the last known order.
    #[must_use]
    pub fn status(&self) -> Option<OrderStatus> {
        self.order.as_ref().map(|o| o.status)
    }
}

/// Human phrase for a status; `None` means no order has been loaded.
#[must_use]
pub fn status_display_text(status: Option<OrderStatus>) -> &'static str {
    match status {
        None => "No active ride",
        Some(OrderStatus::Pending) => "Preparing your request",
        Some(OrderStatus::Matching) => "Finding you a driver",
        Some(OrderStatus::Matched) => "Driver found",
        Some(OrderStatus::DriverEnRoute) => "Driver is on the way",
        Some(OrderStatus::Arrived) => "Driver has arrived",
        Some(OrderStatus::InProgress) => "On your way",
        Some(OrderStatus::Completed) => "Trip completed",
        Some(OrderStatus::Cancelled) => "Ride cancelled",
    }
}

/// Matching progress: 1.0 once a driver is attached, 0.0 otherwise.
#[must_use]
pub fn matching_progress(status: Option<OrderStatus>) -> f64 {
    if status.is_some_and(OrderStatus::has_driver) {
        1.0
    } else {
        0.0
    }
}

/// Formats the driver's ETA relative to `now`, rounding minutes up.
#[must_use]
pub fn estimated_arrival_text(
    status: OrderStatus,
    eta: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<String> {
    if !status.shows_eta() {
        return None;
    }
    let seconds = (eta? - now).num_seconds();
    if seconds <= 0 {
        return Some("Arriving now".to_string());
    }
    let minutes = (seconds + 59) / 60;
    Some(if minutes == 1 {
        "1 min away".to_string()
    } else {
        format!("{minutes} min away")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollKind {
    Status,
    Driver,
}

#[derive(Default)]
struct Session {
    /// Bumped on every start and stop; stale tasks compare against it.
    generation: u64,
    order_id: Option<OrderId>,
    order: Option<Order>,
    error_message: Option<String>,
    /// Polling is wanted for this session.
    active: bool,
    next_seq: u64,
    last_applied_seq: u64,
    status_in_flight: bool,
    driver_in_flight: bool,
    status_task: Option<JoinHandle<()>>,
    driver_task: Option<JoinHandle<()>>,
}

impl Session {
    fn in_flight(&mut self, kind: PollKind) -> &mut bool {
        match kind {
            PollKind::Status => &mut self.status_in_flight,
            PollKind::Driver => &mut self.driver_in_flight,
        }
    }

    fn abort_tasks(&mut self) {
        for task in [self.status_task.take(), self.driver_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

struct Shared {
    api: Arc<dyn OrderApi>,
    config: TrackingConfig,
    session: Mutex<Session>,
    snapshot_tx: watch::Sender<TrackingSnapshot>,
}

/// Tracks one order at a time.
///
/// Dropping the tracker cancels its polls.
pub struct OrderTracker {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for OrderTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderTracker")
            .field("config", &self.shared.config)
            .field("snapshot", &*self.shared.snapshot_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl OrderTracker {
    /// Creates an idle tracker.
    #[must_use]
    pub fn new(api: Arc<dyn OrderApi>, config: TrackingConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(TrackingSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                api,
                config,
                session: Mutex::new(Session::default()),
                snapshot_tx,
            }),
        }
    }

    /// Current derived state.
    #[must_use]
    pub fn snapshot(&self) -> TrackingSnapshot {
        self.shared.snapshot_tx.borrow().clone()
    }

    /// Receiver notified whenever the derived state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TrackingSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Fetches `id` once and, if it is still live, starts polling it.
    ///
    /// Any previous session is stopped first. On failure no session is left
    /// behind and the classified error is returned.
    #[instrument(skip(self, id), fields(order_id = %id))]
    pub async fn start_tracking(&self, id: OrderId) -> crate::Result<()> {
        self.stop_tracking();

        let (generation, seq) = {
            let mut session = self.shared.lock();
            session.next_seq += 1;
            (session.generation, session.next_seq)
        };

        let result = self.shared.api.fetch_order(&id).await;

        let mut session = self.shared.lock();
        if session.generation != generation {
            debug!("Tracking session replaced while starting");
            return result.map(|_| ());
        }
        match result {
            Ok(order) => {
                info!(status = %order.status, "Tracking started");
                session.order_id = Some(id);
                session.active = true;
                self.shared.apply_order(&mut session, seq, order);
                self.shared.publish(&session);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to start tracking");
                let generation = session.generation;
                *session = Session {
                    generation,
                    next_seq: session.next_seq,
                    ..Session::default()
                };
                self.shared.publish(&session);
                Err(e)
            }
        }
    }

    /// Re-fetches the tracked order now.
    ///
    /// Does nothing when no order is being polled or a status fetch is
    /// already outstanding. A failed fetch keeps the last known order,
    /// except "order not found", which ends the session.
    pub async fn refresh_order_status(&self) -> crate::Result<()> {
        self.shared.poll(PollKind::Status).await
    }

    /// Fetches the driver's position now. Same rules as
    /// [`Self::refresh_order_status`], except that every failure keeps the
    /// session.
    pub async fn refresh_driver_location(&self) -> crate::Result<()> {
        self.shared.poll(PollKind::Driver).await
    }

    /// Cancels polling and resets the derived state. Idempotent.
    ///
    /// Also abandons a [`Self::start_tracking`] call still waiting on its
    /// first fetch.
    pub fn stop_tracking(&self) {
        let mut session = self.shared.lock();
        // A start still awaiting its first fetch must see the bump too.
        session.generation = session.generation.wrapping_add(1);
        if session.order_id.is_none() && session.order.is_none() && !session.active {
            return;
        }
        info!(order_id = ?session.order_id.as_ref().map(OrderId::as_str), "Tracking stopped");
        self.shared.reset(&mut session);
        self.shared.publish(&session);
    }
}

impl Drop for OrderTracker {
    fn drop(&mut self) {
        self.shared.lock().abort_tasks();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, session: &Session) {
        let is_polling = session.status_task.is_some() || session.driver_task.is_some();
        self.snapshot_tx.send_replace(TrackingSnapshot::derive(
            session.order.as_ref(),
            session.error_message.clone(),
            is_polling,
            Utc::now(),
        ));
    }

    /// Ends the session, keeping only the counters.
    fn reset(&self, session: &mut Session) {
        session.abort_tasks();
        *session = Session {
            generation: session.generation.wrapping_add(1),
            next_seq: session.next_seq,
            ..Session::default()
        };
    }

    async fn poll(self: &Arc<Self>, kind: PollKind) -> crate::Result<()> {
        let (id, generation, seq) = {
            let mut session = self.lock();
            let Some(id) = session.order_id.clone() else {
                return Ok(());
            };
            if !session.active {
                return Ok(());
            }
            if *session.in_flight(kind) {
                debug!(?kind, "Poll already in flight; skipping");
                return Ok(());
            }
            *session.in_flight(kind) = true;
            session.next_seq += 1;
            (id, session.generation, session.next_seq)
        };
        let _in_flight = InFlight {
            shared: self,
            kind,
            generation,
        };

        debug!(?kind, order_id = %id, seq, "Polling");
        let result = match kind {
            PollKind::Status => self.api.fetch_order(&id).await.map(Update::Order),
            PollKind::Driver => self
                .api
                .fetch_driver_location(&id)
                .await
                .map(Update::Driver),
        };

        let mut session = self.lock();
        if session.generation != generation {
            return result.map(|_| ());
        }
        if seq <= session.last_applied_seq {
            debug!(?kind, seq, last = session.last_applied_seq, "Discarding stale response");
            return result.map(|_| ());
        }

        match result {
            Ok(Update::Order(order)) => {
                self.apply_order(&mut session, seq, order);
                self.publish(&session);
                Ok(())
            }
            Ok(Update::Driver(update)) => {
                self.apply_driver_update(&mut session, seq, update);
                self.publish(&session);
                Ok(())
            }
            Err(RideError::OrderNotFound) if kind == PollKind::Status => {
                warn!(order_id = %id, "Order no longer exists; stopping tracking");
                self.reset(&mut session);
                session.error_message = Some(RideError::OrderNotFound.message());
                self.publish(&session);
                Err(RideError::OrderNotFound)
            }
            Err(e) => {
                warn!(?kind, error = %e, "Poll failed; keeping last known order");
                session.error_message = Some(e.message());
                self.publish(&session);
                Err(e)
            }
        }
    }

    fn apply_order(self: &Arc<Self>, session: &mut Session, seq: u64, order: Order) {
        if !order.is_consistent() {
            warn!(order_id = %order.id, status = %order.status, "Inconsistent order snapshot");
        }
        let previous = session.order.as_ref().map(|o| o.status);
        if previous != Some(order.status) {
            info!(from = ?previous, to = %order.status, "Order status changed");
        }
        session.last_applied_seq = seq;
        session.error_message = None;
        session.order = Some(order);
        self.schedule(session);
    }

    fn apply_driver_update(
        self: &Arc<Self>,
        session: &mut Session,
        seq: u64,
        update: DriverLocationUpdate,
    ) {
        session.last_applied_seq = seq;
        session.error_message = None;
        let Some(order) = session.order.as_mut() else {
            return;
        };
        if let Some(driver) = order.driver.as_mut() {
            driver.location = Some(update.location);
            driver.estimated_arrival = update.estimated_arrival;
        }
        if let Some(status) = update.status
            && status != order.status
        {
            info!(from = %order.status, to = %status, "Order status changed");
            order.status = status;
        }
        self.schedule(session);
    }

    /// Starts or stops the poll tasks to match the current order.
    fn schedule(self: &Arc<Self>, session: &mut Session) {
        let live = session.active
            && session
                .order
                .as_ref()
                .is_some_and(|o| !o.status.is_terminal());
        if !live {
            if session.active {
                info!("Order reached a terminal status; polling stopped");
            }
            session.active = false;
            session.abort_tasks();
            return;
        }

        if session.status_task.is_none() {
            session.status_task = Some(self.spawn_poll(
                PollKind::Status,
                session.generation,
                self.config.poll_interval(),
            ));
        }

        let has_driver = session.order.as_ref().is_some_and(|o| o.driver.is_some());
        match (has_driver, session.driver_task.is_some()) {
            (true, false) => {
                session.driver_task = Some(self.spawn_poll(
                    PollKind::Driver,
                    session.generation,
                    self.config.driver_poll_interval(),
                ));
            }
            (false, true) => {
                if let Some(task) = session.driver_task.take() {
                    task.abort();
                }
            }
            _ => {}
        }
    }

    fn spawn_poll(self: &Arc<Self>, kind: PollKind, generation: u64, period: Duration) -> JoinHandle<()> {
        let shared = Arc::downgrade(self);
        tokio::spawn(poll_loop(shared, kind, generation, period))
    }
}

enum Update {
    Order(Order),
    Driver(DriverLocationUpdate),
}

async fn poll_loop(shared: Weak<Shared>, kind: PollKind, generation: u64, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if shared.lock().generation != generation {
            break;
        }
        // Errors are already reflected in the snapshot.
        let _ = shared.poll(kind).await;
    }
}

/// Clears the in-flight flag when a poll finishes or is cancelled.
struct InFlight<'a> {
    shared: &'a Shared,
    kind: PollKind,
    generation: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut session = self.shared.lock();
        if session.generation == self.generation {
            *session.in_flight(self.kind) = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::types::{Coordinate, Driver, Location};

    fn location(latitude: f64, longitude: f64) -> Location {
        Location {
            coordinate: Coordinate {
                latitude,
                longitude,
            },
            address: None,
        }
    }

    fn order(status: OrderStatus) -> Order {
        let driver = status.has_driver().then(|| Driver {
            id: "d-1".to_string(),
            name: "Chan Tai Man".to_string(),
            rating: 4.9,
            vehicle: "White Toyota Comfort".to_string(),
            plate_number: Some("AB 1234".to_string()),
            location: None,
            estimated_arrival: None,
        });
        Order {
            id: OrderId::new("o-1"),
            status,
            pickup: location(22.28, 114.16),
            destination: location(22.30, 114.17),
            driver,
            price_estimate: None,
            created_at: Utc::now(),
            scheduled_at: None,
            completed_at: (status == OrderStatus::Completed).then(Utc::now),
        }
    }

    type Scripted<T> = Mutex<VecDeque<(Duration, crate::Result<T>)>>;

    /// Replays scripted responses, each after a virtual delay. When a script
    /// runs dry the last value is repeated.
    #[derive(Default)]
    struct FakeApi {
        orders: Scripted<Order>,
        last_order: Mutex<Option<crate::Result<Order>>>,
        locations: Scripted<DriverLocationUpdate>,
        last_location: Mutex<Option<crate::Result<DriverLocationUpdate>>>,
        order_calls: AtomicUsize,
        location_calls: AtomicUsize,
    }

    impl FakeApi {
        fn push_order(&self, delay: Duration, result: crate::Result<Order>) {
            self.orders.lock().unwrap().push_back((delay, result));
        }

        fn push_location(&self, delay: Duration, result: crate::Result<DriverLocationUpdate>) {
            self.locations.lock().unwrap().push_back((delay, result));
        }

        fn order_calls(&self) -> usize {
            self.order_calls.load(Ordering::SeqCst)
        }

        fn location_calls(&self) -> usize {
            self.location_calls.load(Ordering::SeqCst)
        }
    }

    async fn replay<T: Clone>(
        script: &Scripted<T>,
        last: &Mutex<Option<crate::Result<T>>>,
    ) -> crate::Result<T> {
        let next = script.lock().unwrap().pop_front();
        match next {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                *last.lock().unwrap() = Some(result.clone());
                result
            }
            None => last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(Err(RideError::ServerUnavailable)),
        }
    }

    #[async_trait]
    impl OrderApi for FakeApi {
        async fn fetch_order(&self, _id: &OrderId) -> crate::Result<Order> {
            self.order_calls.fetch_add(1, Ordering::SeqCst);
            replay(&self.orders, &self.last_order).await
        }

        async fn fetch_driver_location(&self, _id: &OrderId) -> crate::Result<DriverLocationUpdate> {
            self.location_calls.fetch_add(1, Ordering::SeqCst);
            replay(&self.locations, &self.last_location).await
        }
    }

    fn tracker(api: &Arc<FakeApi>, poll_seconds: u64, driver_seconds: u64) -> OrderTracker {
        OrderTracker::new(
            Arc::clone(api) as Arc<dyn OrderApi>,
            TrackingConfig {
                poll_interval_seconds: poll_seconds,
                driver_poll_interval_seconds: driver_seconds,
            },
        )
    }

    const NOW: Duration = Duration::ZERO;
    const IDLE: u64 = 3600;

    #[test]
    fn test_status_display_text_total_and_distinct() {
        let none = status_display_text(None);
        assert!(!none.is_empty());

        let mut live = Vec::new();
        for status in OrderStatus::ALL {
            let text = status_display_text(Some(status));
            assert!(!text.is_empty(), "{status}");
            assert_ne!(text, none, "{status}");
            if !status.is_terminal() {
                assert!(!live.contains(&text), "duplicate text for {status}");
                live.push(text);
            }
        }
    }

    #[test]
    fn test_driver_contact_flags() {
        let contact = [
            OrderStatus::Matched,
            OrderStatus::DriverEnRoute,
            OrderStatus::Arrived,
            OrderStatus::InProgress,
        ];
        for status in OrderStatus::ALL {
            let order = order(status);
            let snapshot = TrackingSnapshot::derive(Some(&order), None, false, Utc::now());
            assert_eq!(
                snapshot.can_communicate_with_driver,
                contact.contains(&status),
                "{status}"
            );
        }
        assert!(!TrackingSnapshot::default().can_communicate_with_driver);
    }

    #[test]
    fn test_derived_flags_for_matching_and_matched() {
        let matching = order(OrderStatus::Matching);
        let snapshot = TrackingSnapshot::derive(Some(&matching), None, true, Utc::now());
        assert!(snapshot.is_matching);
        assert!(!snapshot.is_tracking_active);
        assert!(snapshot.matching_progress.abs() < f64::EPSILON);

        let matched = order(OrderStatus::Matched);
        let snapshot = TrackingSnapshot::derive(Some(&matched), None, true, Utc::now());
        assert!(!snapshot.is_matching);
        assert!(snapshot.is_tracking_active);
        assert!((snapshot.matching_progress - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_estimated_arrival_text() {
        let now = Utc::now();
        let at = |secs| Some(now + chrono::Duration::seconds(secs));

        assert_eq!(
            estimated_arrival_text(OrderStatus::DriverEnRoute, at(0), now).as_deref(),
            Some("Arriving now")
        );
        assert_eq!(
            estimated_arrival_text(OrderStatus::DriverEnRoute, at(-30), now).as_deref(),
            Some("Arriving now")
        );
        assert_eq!(
            estimated_arrival_text(OrderStatus::Matched, at(45), now).as_deref(),
            Some("1 min away")
        );
        assert_eq!(
            estimated_arrival_text(OrderStatus::DriverEnRoute, at(61), now).as_deref(),
            Some("2 min away")
        );
        assert_eq!(estimated_arrival_text(OrderStatus::DriverEnRoute, None, now), None);
        assert_eq!(estimated_arrival_text(OrderStatus::Arrived, at(300), now), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_then_matched_scenario() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Ok(order(OrderStatus::Matching)));
        api.push_order(NOW, Ok(order(OrderStatus::Matched)));
        let tracker = tracker(&api, IDLE, IDLE);

        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();
        let snapshot = tracker.snapshot();
        assert!(snapshot.is_matching);
        assert!(!snapshot.is_tracking_active);
        assert!(snapshot.is_polling);

        tracker.refresh_order_status().await.unwrap();
        let snapshot = tracker.snapshot();
        assert!(!snapshot.is_matching);
        assert!((snapshot.matching_progress - 1.0).abs() < f64::EPSILON);
        assert!(snapshot.can_communicate_with_driver);
        assert_eq!(snapshot.status_display_text, "Driver found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_on_refresh_stops_tracking() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Ok(order(OrderStatus::DriverEnRoute)));
        api.push_order(NOW, Err(RideError::OrderNotFound));
        let tracker = tracker(&api, IDLE, IDLE);

        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();
        assert!(tracker.snapshot().is_tracking_active);

        let err = tracker.refresh_order_status().await.unwrap_err();

        assert_eq!(err, RideError::OrderNotFound);
        let snapshot = tracker.snapshot();
        assert!(!snapshot.is_tracking_active);
        assert!(!snapshot.is_polling);
        assert!(snapshot.order.is_none());
        assert!(snapshot.error_message.is_some());

        tracker.refresh_order_status().await.unwrap();
        assert_eq!(api.order_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_keeps_last_order() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Ok(order(OrderStatus::Arrived)));
        api.push_order(NOW, Err(RideError::NoConnection));
        api.push_order(NOW, Ok(order(OrderStatus::InProgress)));
        let tracker = tracker(&api, IDLE, IDLE);
        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();

        assert_eq!(
            tracker.refresh_order_status().await,
            Err(RideError::NoConnection)
        );
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.status(), Some(OrderStatus::Arrived));
        assert_eq!(
            snapshot.error_message,
            Some(RideError::NoConnection.message())
        );
        assert!(snapshot.is_polling);

        tracker.refresh_order_status().await.unwrap();
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.status(), Some(OrderStatus::InProgress));
        assert_eq!(snapshot.error_message, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_start_issues_no_polls() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Ok(order(OrderStatus::Completed)));
        let tracker = tracker(&api, 5, 3);

        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();
        let snapshot = tracker.snapshot();
        assert!(!snapshot.is_tracking_active);
        assert!(!snapshot.is_polling);
        assert_eq!(snapshot.status_display_text, "Trip completed");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.order_calls(), 1);
        assert_eq!(api.location_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failure_leaves_no_session() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Err(RideError::Timeout));
        let tracker = tracker(&api, 5, 3);

        let err = tracker.start_tracking(OrderId::new("o-1")).await.unwrap_err();

        assert_eq!(err, RideError::Timeout);
        let snapshot = tracker.snapshot();
        assert!(snapshot.order.is_none());
        assert_eq!(snapshot.status_display_text, status_display_text(None));
        assert!(!tracker.snapshot().is_polling);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.order_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_poll_runs_until_terminal() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Ok(order(OrderStatus::Matching)));
        api.push_order(NOW, Ok(order(OrderStatus::Matching)));
        api.push_order(NOW, Ok(order(OrderStatus::Cancelled)));
        let tracker = tracker(&api, 5, IDLE);

        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(api.order_calls(), 3);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.status(), Some(OrderStatus::Cancelled));
        assert!(!snapshot.is_polling);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.order_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_poll_updates_location_and_status() {
        let api = Arc::new(FakeApi::default());
        let eta = Utc::now() + chrono::Duration::seconds(150);
        api.push_order(NOW, Ok(order(OrderStatus::DriverEnRoute)));
        api.push_location(NOW, Ok(DriverLocationUpdate {
            location: Coordinate {
                latitude: 22.281,
                longitude: 114.161,
            },
            estimated_arrival: Some(eta),
            status: None,
        }));
        api.push_location(NOW, Ok(DriverLocationUpdate {
            location: Coordinate {
                latitude: 22.28,
                longitude: 114.16,
            },
            estimated_arrival: None,
            status: Some(OrderStatus::Arrived),
        }));
        let tracker = tracker(&api, IDLE, 3);
        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(4)).await;
        let snapshot = tracker.snapshot();
        assert_eq!(api.location_calls(), 1);
        let driver = snapshot.order.as_ref().and_then(|o| o.driver.clone()).unwrap();
        assert_eq!(driver.location.map(|c| c.latitude), Some(22.281));
        assert_eq!(snapshot.estimated_arrival_text.as_deref(), Some("3 min away"));

        tokio::time::sleep(Duration::from_secs(3)).await;
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.status(), Some(OrderStatus::Arrived));
        assert_eq!(snapshot.status_display_text, "Driver has arrived");
        assert_eq!(snapshot.estimated_arrival_text, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_poll_waits_for_driver() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Ok(order(OrderStatus::Matching)));
        let tracker = tracker(&api, IDLE, 3);

        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(api.location_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_discarded() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Ok(order(OrderStatus::DriverEnRoute)));
        // Issued first, answers last.
        api.push_order(
            Duration::from_secs(2),
            Ok(order(OrderStatus::DriverEnRoute)),
        );
        api.push_location(NOW, Ok(DriverLocationUpdate {
            location: Coordinate {
                latitude: 22.28,
                longitude: 114.16,
            },
            estimated_arrival: None,
            status: Some(OrderStatus::Arrived),
        }));
        let tracker = tracker(&api, IDLE, IDLE);
        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();

        let (status, driver) = tokio::join!(
            tracker.refresh_order_status(),
            tracker.refresh_driver_location()
        );

        assert!(status.is_ok());
        assert!(driver.is_ok());
        assert_eq!(tracker.snapshot().status(), Some(OrderStatus::Arrived));
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_status_fetch_in_flight() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Ok(order(OrderStatus::Matching)));
        api.push_order(Duration::from_secs(2), Ok(order(OrderStatus::Matching)));
        let tracker = tracker(&api, IDLE, IDLE);
        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();

        let (first, second) = tokio::join!(
            tracker.refresh_order_status(),
            tracker.refresh_order_status()
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(api.order_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_polls() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Ok(order(OrderStatus::DriverEnRoute)));
        let tracker = tracker(&api, 5, 3);
        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();

        tracker.stop_tracking();

        let snapshot = tracker.snapshot();
        assert!(!snapshot.is_tracking_active);
        assert!(!snapshot.is_matching);
        assert!(!snapshot.is_polling);
        assert!(snapshot.matching_progress.abs() < f64::EPSILON);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.order_calls(), 1);
        assert_eq!(api.location_calls(), 0);

        tracker.stop_tracking();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_response() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Ok(order(OrderStatus::Matching)));
        api.push_order(Duration::from_secs(2), Ok(order(OrderStatus::Matched)));
        let tracker = Arc::new(tracker(&api, IDLE, IDLE));
        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();

        let refresh = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.refresh_order_status().await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        tracker.stop_tracking();
        refresh.await.unwrap().unwrap();

        assert!(tracker.snapshot().order.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_start_abandons_session() {
        let api = Arc::new(FakeApi::default());
        api.push_order(Duration::from_secs(2), Ok(order(OrderStatus::Matching)));
        let tracker = tracker(&api, 5, 3);

        let (started, ()) = tokio::join!(tracker.start_tracking(OrderId::new("o-1")), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            tracker.stop_tracking();
        });

        assert!(started.is_ok());
        let snapshot = tracker.snapshot();
        assert!(snapshot.order.is_none());
        assert!(!snapshot.is_matching);
        assert!(!snapshot.is_polling);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.order_calls(), 1);
        assert!(!tracker.snapshot().is_polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_starts_keep_newest() {
        let api = Arc::new(FakeApi::default());
        // The first start answers after the second one.
        api.push_order(Duration::from_secs(3), Ok(order(OrderStatus::Matching)));
        api.push_order(Duration::from_secs(1), Ok(order(OrderStatus::InProgress)));
        let tracker = tracker(&api, IDLE, IDLE);

        let (first, second) = tokio::join!(tracker.start_tracking(OrderId::new("o-1")), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tracker.start_tracking(OrderId::new("o-2")).await
        });

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(tracker.snapshot().status(), Some(OrderStatus::InProgress));
        assert_eq!(
            tracker.shared.lock().order_id,
            Some(OrderId::new("o-2"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_not_found_keeps_session() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Ok(order(OrderStatus::DriverEnRoute)));
        api.push_location(NOW, Err(RideError::OrderNotFound));
        let tracker = tracker(&api, IDLE, IDLE);
        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();

        assert_eq!(
            tracker.refresh_driver_location().await,
            Err(RideError::OrderNotFound)
        );

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.status(), Some(OrderStatus::DriverEnRoute));
        assert!(snapshot.is_polling);
        assert_eq!(
            snapshot.error_message,
            Some(RideError::OrderNotFound.message())
        );
        assert_eq!(tracker.shared.lock().order_id, Some(OrderId::new("o-1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_does_not_shadow_earlier_fetch() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Ok(order(OrderStatus::InProgress)));
        api.push_order(Duration::from_secs(2), Ok(order(OrderStatus::Completed)));
        api.push_location(NOW, Err(RideError::NoConnection));
        let tracker = tracker(&api, IDLE, IDLE);
        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();

        let (status, driver) = tokio::join!(
            tracker.refresh_order_status(),
            tracker.refresh_driver_location()
        );

        assert!(status.is_ok());
        assert_eq!(driver, Err(RideError::NoConnection));
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.status(), Some(OrderStatus::Completed));
        assert_eq!(snapshot.error_message, None);
        assert!(!snapshot.is_polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_session() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Ok(order(OrderStatus::Matching)));
        api.push_order(NOW, Ok(order(OrderStatus::InProgress)));
        let tracker = tracker(&api, IDLE, IDLE);

        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();
        tracker.start_tracking(OrderId::new("o-2")).await.unwrap();

        assert_eq!(tracker.snapshot().status(), Some(OrderStatus::InProgress));
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_notified() {
        let api = Arc::new(FakeApi::default());
        api.push_order(NOW, Ok(order(OrderStatus::Matching)));
        let tracker = tracker(&api, IDLE, IDLE);
        let mut rx = tracker.subscribe();

        tracker.start_tracking(OrderId::new("o-1")).await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_matching);
    }
}

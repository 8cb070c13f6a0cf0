//! Deterministic fakes for exercising the reporting core.
//!
//! - [`ScriptedLocationProvider`] records every subscription request and
//!   lets a test push fixes or errors into the active subscription.
//! - [`RecordingSink`] records every delivery and can be told to fail or to
//!   stall.
//! - [`ManualClock`] is re-exported from [`crate::time`].

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::identity::DeviceId;
use crate::reporting::{
    AlertRecord, DeviceStatus, FixResult, LocationFix, LocationProvider, LocationSample,
    SamplerError, SamplingRequest, Sink, SinkError, Subscription,
};

pub use crate::time::ManualClock;

/// Queue depth of a scripted subscription.
const SUBSCRIPTION_CAPACITY: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug)]
struct ProviderState {
    permission_granted: bool,
    requests: Vec<SamplingRequest>,
    subscriptions: Vec<CancellationToken>,
    sender: Option<mpsc::Sender<FixResult>>,
    last_known: Option<LocationFix>,
    last_location_denied: bool,
    last_location_calls: usize,
}

/// Location provider driven by the test.
#[derive(Debug)]
pub struct ScriptedLocationProvider {
    state: Mutex<ProviderState>,
}

impl Default for ScriptedLocationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLocationProvider {
    /// Provider with permission granted and no cached fix.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProviderState {
                permission_granted: true,
                requests: Vec::new(),
                subscriptions: Vec::new(),
                sender: None,
                last_known: None,
                last_location_denied: false,
                last_location_calls: 0,
            }),
        }
    }

    /// Make subsequent subscribe calls fail with `PermissionDenied`.
    pub fn deny_permission(&self) {
        lock(&self.state).permission_granted = false;
    }

    /// Every subscription request received so far, oldest first.
    pub fn requests(&self) -> Vec<SamplingRequest> {
        lock(&self.state).requests.clone()
    }

    /// Number of subscriptions that have not been cancelled.
    pub fn active_subscriptions(&self) -> usize {
        lock(&self.state)
            .subscriptions
            .iter()
            .filter(|token| !token.is_cancelled())
            .count()
    }

    /// Push a fix into the newest subscription.
    ///
    /// Returns false if that subscription is gone.
    pub fn emit(&self, fix: LocationFix) -> bool {
        self.push(Ok(fix))
    }

    /// Push an error into the newest subscription.
    pub fn fail(&self, error: SamplerError) -> bool {
        self.push(Err(error))
    }

    /// Close the newest subscription from the provider side.
    pub fn close_subscription(&self) {
        lock(&self.state).sender = None;
    }

    /// Set the fix returned by `last_location`.
    pub fn set_last_location(&self, fix: Option<LocationFix>) {
        lock(&self.state).last_known = fix;
    }

    /// Make `last_location` fail with `PermissionDenied`.
    pub fn deny_last_location(&self) {
        lock(&self.state).last_location_denied = true;
    }

    /// How many times `last_location` was called.
    pub fn last_location_calls(&self) -> usize {
        lock(&self.state).last_location_calls
    }

    fn push(&self, result: FixResult) -> bool {
        match &lock(&self.state).sender {
            Some(sender) => sender.try_send(result).is_ok(),
            None => false,
        }
    }
}

impl LocationProvider for ScriptedLocationProvider {
    fn subscribe(&self, request: SamplingRequest) -> Result<Subscription, SamplerError> {
        let mut state = lock(&self.state);
        if !state.permission_granted {
            return Err(SamplerError::PermissionDenied);
        }

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let cancel = CancellationToken::new();

        state.requests.push(request);
        state.subscriptions.push(cancel.clone());
        state.sender = Some(tx);

        Ok(Subscription::new(rx, cancel))
    }

    fn last_location(
        &self,
    ) -> impl Future<Output = Result<Option<LocationFix>, SamplerError>> + Send {
        let result = {
            let mut state = lock(&self.state);
            state.last_location_calls += 1;
            if state.last_location_denied {
                Err(SamplerError::PermissionDenied)
            } else {
                Ok(state.last_known)
            }
        };
        std::future::ready(result)
    }
}

#[derive(Debug, Default)]
struct SinkState {
    locations: Vec<LocationSample>,
    alerts: Vec<AlertRecord>,
    statuses: Vec<DeviceStatus>,
    /// Kinds of successful deliveries, in completion order.
    order: Vec<&'static str>,
    failing: bool,
    delay: Option<Duration>,
    started: usize,
    failed: usize,
}

/// Sink that records deliveries in memory.
#[derive(Debug)]
pub struct RecordingSink {
    state: Mutex<SinkState>,
    /// Finished attempts, successful or not.
    attempts: watch::Sender<usize>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SinkState::default()),
            attempts: watch::Sender::new(0),
        }
    }

    /// Make every delivery fail with a transport error.
    pub fn fail_all(&self, failing: bool) {
        lock(&self.state).failing = failing;
    }

    /// Hold every delivery for `delay` before completing it.
    pub fn stall(&self, delay: Duration) {
        lock(&self.state).delay = Some(delay);
    }

    pub fn locations(&self) -> Vec<LocationSample> {
        lock(&self.state).locations.clone()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        lock(&self.state).alerts.clone()
    }

    pub fn statuses(&self) -> Vec<DeviceStatus> {
        lock(&self.state).statuses.clone()
    }

    /// `"location"`, `"alert"` or `"status"` per successful delivery, in
    /// completion order.
    pub fn delivery_order(&self) -> Vec<&'static str> {
        lock(&self.state).order.clone()
    }

    /// Deliveries that were started, including stalled ones.
    pub fn started_attempts(&self) -> usize {
        lock(&self.state).started
    }

    pub fn failed_attempts(&self) -> usize {
        lock(&self.state).failed
    }

    /// Deliveries that completed, successfully or not.
    pub fn total_attempts(&self) -> usize {
        *self.attempts.borrow()
    }

    /// Wait until at least `count` deliveries have completed.
    ///
    /// Returns false on timeout.
    pub async fn wait_for_attempts(&self, count: usize, timeout: Duration) -> bool {
        let mut rx = self.attempts.subscribe();
        let reached = tokio::time::timeout(timeout, rx.wait_for(|n| *n >= count)).await;
        matches!(reached, Ok(Ok(_)))
    }

    async fn record(
        &self,
        kind: &'static str,
        store: impl FnOnce(&mut SinkState),
    ) -> Result<(), SinkError> {
        let delay = {
            let mut state = lock(&self.state);
            state.started += 1;
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut state = lock(&self.state);
            if state.failing {
                state.failed += 1;
                Err(SinkError::Transport("connection refused".to_string()))
            } else {
                store(&mut state);
                state.order.push(kind);
                Ok(())
            }
        };
        self.attempts.send_modify(|n| *n += 1);
        result
    }
}

impl Sink for RecordingSink {
    async fn report_location(
        &self,
        _device_id: &DeviceId,
        sample: &LocationSample,
    ) -> Result<(), SinkError> {
        self.record("location", |state| state.locations.push(sample.clone())).await
    }

    async fn report_alert(&self, _device_id: &DeviceId, alert: &AlertRecord) -> Result<(), SinkError> {
        self.record("alert", |state| state.alerts.push(alert.clone())).await
    }

    async fn report_status(
        &self,
        _device_id: &DeviceId,
        status: &DeviceStatus,
    ) -> Result<(), SinkError> {
        self.record("status", |state| state.statuses.push(status.clone())).await
    }
}

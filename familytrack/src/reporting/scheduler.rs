//! Reporting scheduler - the owning task and its ingestion handle.
//!
//! # Architecture
//!
//! ```text
//!  observers / panic button
//!          │  ReportingHandle (mpsc, never blocks)
//!          ▼
//!  ┌──────────────────────── scheduler task ─────────────────────────┐
//!  │  ModeController ──ModeChange──► Sampler (stop + start)          │
//!  │        ▲                           │ fixes                      │
//!  │        └──── tag_sample ◄──────────┘                            │
//!  │                 │                                               │
//!  │                 ▼                                               │
//!  │           JoinSet<deliveries> ──► Sink (fire-and-forget)        │
//!  └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All mutable state (mode, device id, subscription) lives in one task;
//! callers reach it only through [`ReportingHandle`], so commands and fixes
//! are processed strictly one at a time.
//!
//! Deliveries run as independent tasks in a `JoinSet` owned by the scheduler
//! task. Nothing waits on them: on shutdown the set is dropped and anything
//! still in flight is aborted.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use super::mode::{ModeChange, ModeController, ReportingConfig, ReportingMode};
use super::model::{AlertRecord, DeviceStatus, LocationFix, LocationSample, EVENT_SOS, SOS_MESSAGE};
use super::sampler::{FixResult, LocationProvider, Sampler, SamplerError};
use super::sink::{deliver, Delivery, Sink};
use crate::identity::{DeviceId, IdentityError};
use crate::time::{Clock, SystemClock};

/// Reasons the scheduler refuses to start.
#[derive(Debug, Error)]
pub enum StartError {
    /// No device id has been stored.
    #[error("no device id configured")]
    MissingDeviceId,

    /// The stored device id is not a UUID.
    #[error("invalid device id: {0}")]
    InvalidDeviceId(#[from] IdentityError),

    /// Periodic location updates could not be started.
    #[error("failed to start location updates: {0}")]
    Sampler(#[source] SamplerError),
}

/// Reasons the scheduler stopped on its own.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Location acquisition failed in a way that ends reporting.
    #[error("location acquisition stopped: {0}")]
    Sampler(#[from] SamplerError),

    /// The scheduler task panicked or was aborted.
    #[error("scheduler task failed: {0}")]
    Task(String),
}

impl From<JoinError> for SchedulerError {
    fn from(e: JoinError) -> Self {
        SchedulerError::Task(e.to_string())
    }
}

/// Messages processed by the scheduler task.
#[derive(Debug)]
enum Command {
    SubmitEvent(String),
    TriggerSos,
    /// One-shot fix obtained for a pending SOS.
    SosFix(LocationFix),
    RaiseAlert { alert_type: String, message: String },
    ReportStatus { battery_level: Option<u8> },
}

/// Builder for a reporting scheduler.
///
/// # Example
///
/// ```ignore
/// let scheduler = ReportingScheduler::new(ReportingConfig::default(), provider, sink);
/// let runtime = scheduler.start(prefs.device_id()?.as_deref())?;
///
/// let handle = runtime.handle();
/// handle.submit_event("low_battery");
/// handle.trigger_sos();
///
/// runtime.shutdown().await?;
/// ```
pub struct ReportingScheduler<P, S> {
    config: ReportingConfig,
    provider: Arc<P>,
    sink: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<P: LocationProvider, S: Sink> ReportingScheduler<P, S> {
    pub fn new(config: ReportingConfig, provider: Arc<P>, sink: Arc<S>) -> Self {
        Self {
            config,
            provider,
            sink,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the device id, start normal-mode sampling and spawn the
    /// scheduler task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self, device_id: Option<&str>) -> Result<ReportingRuntime, StartError> {
        let device_id = match device_id {
            Some(raw) => DeviceId::parse(raw).inspect_err(|e| {
                tracing::error!(error = %e, "Refusing to start reporting");
            })?,
            None => {
                tracing::error!("No device id found, refusing to start reporting");
                return Err(StartError::MissingDeviceId);
            }
        };

        let controller = ModeController::new(self.config);
        let mut sampler = Sampler::new(self.provider);
        sampler
            .start(controller.current_interval())
            .map_err(StartError::Sampler)?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (mode_tx, mode_rx) = watch::channel(controller.mode().clone());
        let shutdown = CancellationToken::new();

        tracing::info!(device_id = %device_id, "Reporting scheduler started");

        let task = SchedulerTask {
            device_id,
            controller,
            sampler,
            sink: self.sink,
            clock: self.clock,
            commands: command_rx,
            internal: command_tx.clone(),
            mode_tx,
            deliveries: JoinSet::new(),
            shutdown: shutdown.clone(),
        };
        let join = tokio::spawn(task.run());

        Ok(ReportingRuntime {
            handle: ReportingHandle {
                commands: command_tx,
                mode: mode_rx,
                shutdown: shutdown.clone(),
            },
            task: Some(join),
            shutdown,
        })
    }
}

/// Ingestion endpoint for external triggers.
///
/// Cheap to clone. Every call returns immediately; calls made after the
/// scheduler has stopped are silently ignored.
#[derive(Debug, Clone)]
pub struct ReportingHandle {
    commands: mpsc::UnboundedSender<Command>,
    mode: watch::Receiver<ReportingMode>,
    shutdown: CancellationToken,
}

impl ReportingHandle {
    /// Whether the scheduler task is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.commands.is_closed()
    }

    /// Request a burst for `reason`. No-op while a burst is active.
    ///
    /// Returns false if the scheduler is not running.
    pub fn submit_event(&self, reason: impl Into<String>) -> bool {
        self.send(Command::SubmitEvent(reason.into()))
    }

    /// Panic button: report the last known position as an SOS sample and
    /// alert, then enter a burst with reason `sos`.
    ///
    /// Returns false, doing nothing, if the scheduler is not running.
    pub fn trigger_sos(&self) -> bool {
        self.send(Command::TriggerSos)
    }

    /// Deliver an alert without a position.
    pub fn raise_alert(&self, alert_type: impl Into<String>, message: impl Into<String>) -> bool {
        self.send(Command::RaiseAlert {
            alert_type: alert_type.into(),
            message: message.into(),
        })
    }

    /// Deliver an online status with an optional battery percentage.
    pub fn report_status(&self, battery_level: Option<u8>) -> bool {
        self.send(Command::ReportStatus { battery_level })
    }

    /// Current reporting mode.
    pub fn mode(&self) -> ReportingMode {
        self.mode.borrow().clone()
    }

    /// Watch mode changes.
    pub fn subscribe_mode(&self) -> watch::Receiver<ReportingMode> {
        self.mode.clone()
    }

    fn send(&self, command: Command) -> bool {
        if !self.is_running() {
            tracing::debug!(?command, "Reporting scheduler not running, ignoring");
            return false;
        }
        self.commands.send(command).is_ok()
    }
}

/// A running scheduler.
///
/// Owns the scheduler task. Dropping it without calling
/// [`shutdown`](Self::shutdown) leaves the task running until every
/// [`ReportingHandle`] is gone and the runtime stops.
pub struct ReportingRuntime {
    handle: ReportingHandle,
    task: Option<JoinHandle<Result<(), SchedulerError>>>,
    shutdown: CancellationToken,
}

impl ReportingRuntime {
    /// Ingestion handle for observers and the panic button.
    pub fn handle(&self) -> ReportingHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Token cancelled when shutdown is requested.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Wait until the scheduler stops, either through [`shutdown`](Self::shutdown)
    /// from elsewhere (via [`shutdown_token`](Self::shutdown_token)) or a fatal
    /// sampler error.
    pub async fn wait(&mut self) -> Result<(), SchedulerError> {
        match self.task.take() {
            Some(task) => task.await?,
            None => Ok(()),
        }
    }

    /// Stop the scheduler.
    ///
    /// Cancels sampling and abandons in-flight deliveries; nothing is flushed.
    pub async fn shutdown(mut self) -> Result<(), SchedulerError> {
        tracing::info!("Shutting down reporting scheduler");
        self.shutdown.cancel();
        self.wait().await
    }
}

enum Event {
    Shutdown,
    Command(Command),
    Fix(FixResult),
    Reaped(Result<(), JoinError>),
}

struct SchedulerTask<P, S> {
    device_id: DeviceId,
    controller: ModeController,
    sampler: Sampler<P>,
    sink: Arc<S>,
    clock: Arc<dyn Clock>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Sender for results posted back by helper tasks.
    internal: mpsc::UnboundedSender<Command>,
    mode_tx: watch::Sender<ReportingMode>,
    deliveries: JoinSet<()>,
    shutdown: CancellationToken,
}

impl<P: LocationProvider, S: Sink> SchedulerTask<P, S> {
    async fn run(mut self) -> Result<(), SchedulerError> {
        let result = loop {
            let event = tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => Event::Shutdown,

                Some(command) = self.commands.recv() => Event::Command(command),

                fix = self.sampler.next_fix() => Event::Fix(fix),

                Some(finished) = self.deliveries.join_next(), if !self.deliveries.is_empty() => {
                    Event::Reaped(finished)
                }
            };

            let step = match event {
                Event::Shutdown => break Ok(()),
                Event::Command(command) => self.handle_command(command),
                Event::Fix(fix) => self.handle_fix(fix),
                Event::Reaped(Err(e)) if e.is_panic() => {
                    tracing::error!(error = %e, "Delivery task panicked");
                    Ok(())
                }
                Event::Reaped(_) => Ok(()),
            };

            if let Err(e) = step {
                tracing::error!(error = %e, "Reporting scheduler stopping");
                break Err(e);
            }
        };

        self.sampler.stop();
        self.shutdown.cancel();

        let abandoned = self.deliveries.len();
        self.deliveries.abort_all();
        tracing::info!(abandoned_deliveries = abandoned, "Reporting scheduler stopped");

        result
    }

    fn handle_command(&mut self, command: Command) -> Result<(), SchedulerError> {
        match command {
            Command::SubmitEvent(reason) => self.enter_burst(&reason),
            Command::TriggerSos => {
                self.request_sos_fix();
                Ok(())
            }
            Command::SosFix(fix) => self.complete_sos(fix),
            Command::RaiseAlert {
                alert_type,
                message,
            } => {
                let alert = AlertRecord::new(self.device_id.as_str(), alert_type, message, self.clock.now());
                self.spawn_delivery(Delivery::Alert(alert));
                Ok(())
            }
            Command::ReportStatus { battery_level } => {
                let status = DeviceStatus {
                    battery_level,
                    is_online: true,
                    timestamp: self.clock.now(),
                };
                self.spawn_delivery(Delivery::Status(status));
                Ok(())
            }
        }
    }

    fn handle_fix(&mut self, fix: FixResult) -> Result<(), SchedulerError> {
        let fix = match fix {
            Ok(fix) => fix,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Location fix failed");
                return Ok(());
            }
        };

        let (sample, change) = self.controller.tag_sample(fix, self.clock.now());
        self.spawn_delivery(Delivery::Location(sample));

        match change {
            Some(change) => self.apply(change),
            None => Ok(()),
        }
    }

    fn enter_burst(&mut self, reason: &str) -> Result<(), SchedulerError> {
        match self.controller.trigger(reason, self.clock.now()) {
            Some(change) => self.apply(change),
            None => Ok(()),
        }
    }

    /// Fetch the last known fix off the ingestion path; the result comes
    /// back as [`Command::SosFix`].
    fn request_sos_fix(&mut self) {
        let provider = Arc::clone(self.sampler.provider());
        let internal = self.internal.clone();

        self.deliveries.spawn(async move {
            match provider.last_location().await {
                Ok(Some(fix)) => {
                    let _ = internal.send(Command::SosFix(fix));
                }
                Ok(None) => tracing::warn!("SOS skipped: no last known location"),
                Err(e) => tracing::warn!(error = %e, "SOS skipped: last known location unavailable"),
            }
        });
    }

    fn complete_sos(&mut self, fix: LocationFix) -> Result<(), SchedulerError> {
        let now = self.clock.now();

        let sample = LocationSample::from_fix(fix, EVENT_SOS, now);
        let alert = AlertRecord::new(self.device_id.as_str(), EVENT_SOS, SOS_MESSAGE, now)
            .at(fix.latitude, fix.longitude);

        tracing::info!(lat = fix.latitude, lon = fix.longitude, "SOS triggered");
        // Location row first, then the alert that refers to it.
        let sink = Arc::clone(&self.sink);
        let device_id = self.device_id.clone();
        self.deliveries.spawn(async move {
            deliver(Arc::clone(&sink), device_id.clone(), Delivery::Location(sample)).await;
            deliver(sink, device_id, Delivery::Alert(alert)).await;
        });

        self.enter_burst(EVENT_SOS)
    }

    /// Publish the new mode and resubscribe at its interval.
    fn apply(&mut self, change: ModeChange) -> Result<(), SchedulerError> {
        self.sampler.stop();
        self.sampler.start(change.interval)?;
        self.mode_tx.send_replace(change.mode);
        Ok(())
    }

    fn spawn_delivery(&mut self, delivery: Delivery) {
        self.deliveries.spawn(deliver(
            Arc::clone(&self.sink),
            self.device_id.clone(),
            delivery,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::model::{EVENT_LOW_BATTERY, EVENT_SIM_CHANGE};
    use crate::reporting::sampler::SamplingRequest;
    use crate::testing::{ManualClock, RecordingSink, ScriptedLocationProvider};
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    const DEVICE: &str = "11111111-1111-1111-1111-111111111111";
    const WAIT: Duration = Duration::from_secs(2);

    struct Fixture {
        provider: Arc<ScriptedLocationProvider>,
        sink: Arc<RecordingSink>,
        clock: ManualClock,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                provider: Arc::new(ScriptedLocationProvider::new()),
                sink: Arc::new(RecordingSink::new()),
                clock: ManualClock::default(),
            }
        }

        fn scheduler(&self) -> ReportingScheduler<ScriptedLocationProvider, RecordingSink> {
            ReportingScheduler::new(
                ReportingConfig::default(),
                self.provider.clone(),
                self.sink.clone(),
            )
            .with_clock(Arc::new(self.clock.clone()))
        }

        fn start(&self) -> ReportingRuntime {
            self.scheduler().start(Some(DEVICE)).unwrap()
        }
    }

    async fn wait_for_mode(handle: &ReportingHandle, predicate: impl Fn(&ReportingMode) -> bool) {
        let mut rx = handle.subscribe_mode();
        tokio::time::timeout(WAIT, rx.wait_for(|m| predicate(m)))
            .await
            .expect("mode change timed out")
            .expect("scheduler dropped");
    }

    #[tokio::test]
    async fn missing_device_id_is_fatal() {
        let fixture = Fixture::new();
        let result = fixture.scheduler().start(None);

        assert!(matches!(result, Err(StartError::MissingDeviceId)));
        assert!(fixture.provider.requests().is_empty());
    }

    #[tokio::test]
    async fn invalid_device_id_is_fatal() {
        let fixture = Fixture::new();
        let result = fixture.scheduler().start(Some("not-a-uuid"));

        assert!(matches!(result, Err(StartError::InvalidDeviceId(_))));
        assert!(fixture.provider.requests().is_empty());
    }

    #[tokio::test]
    async fn permission_denied_at_start_is_fatal() {
        let fixture = Fixture::new();
        fixture.provider.deny_permission();

        let result = fixture.scheduler().start(Some(DEVICE));

        assert!(matches!(
            result,
            Err(StartError::Sampler(SamplerError::PermissionDenied))
        ));
    }

    #[tokio::test]
    async fn starts_normal_at_normal_interval() {
        let fixture = Fixture::new();
        let runtime = fixture.start();

        assert_eq!(runtime.handle().mode(), ReportingMode::Normal);
        assert_eq!(
            fixture.provider.requests(),
            vec![SamplingRequest::new(Duration::from_millis(180_000))]
        );

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn trigger_restarts_sampler_at_burst_interval() {
        let fixture = Fixture::new();
        let runtime = fixture.start();
        let handle = runtime.handle();
        let t0 = fixture.clock.now();

        assert!(handle.submit_event(EVENT_SIM_CHANGE));
        wait_for_mode(&handle, ReportingMode::is_burst).await;

        assert_eq!(
            handle.mode(),
            ReportingMode::Burst {
                reason: EVENT_SIM_CHANGE.to_string(),
                started_at: t0,
            }
        );
        let requests = fixture.provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].interval, Duration::from_millis(10_000));
        assert_eq!(requests[1].min_update_interval, Duration::from_millis(5_000));
        assert_eq!(fixture.provider.active_subscriptions(), 1);

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn repeated_trigger_keeps_first_burst() {
        let fixture = Fixture::new();
        let runtime = fixture.start();
        let handle = runtime.handle();
        let t0 = fixture.clock.now();

        handle.submit_event(EVENT_LOW_BATTERY);
        wait_for_mode(&handle, ReportingMode::is_burst).await;

        fixture.clock.advance(ChronoDuration::seconds(30));
        handle.submit_event(EVENT_SIM_CHANGE);
        handle.submit_event(EVENT_LOW_BATTERY);

        // A sample round-trips through the task after the triggers.
        fixture.provider.emit(LocationFix::new(1.0, 1.0));
        assert!(fixture.sink.wait_for_attempts(1, WAIT).await);

        assert_eq!(
            handle.mode(),
            ReportingMode::Burst {
                reason: EVENT_LOW_BATTERY.to_string(),
                started_at: t0,
            }
        );
        assert_eq!(fixture.provider.requests().len(), 2);
        assert_eq!(fixture.sink.locations()[0].event_type, "low_battery");

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn samples_tagged_normal() {
        let fixture = Fixture::new();
        let runtime = fixture.start();

        fixture.provider.emit(LocationFix::new(53.5, 10.0).with_accuracy(8.0));
        assert!(fixture.sink.wait_for_attempts(1, WAIT).await);

        let locations = fixture.sink.locations();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].event_type, "normal");
        assert_eq!(locations[0].accuracy, Some(8.0));
        assert_eq!(locations[0].timestamp, fixture.clock.now());

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn fatal_fix_error_stops_scheduler() {
        let fixture = Fixture::new();
        let mut runtime = fixture.start();
        let handle = runtime.handle();

        fixture.provider.fail(SamplerError::PermissionDenied);

        let result = tokio::time::timeout(WAIT, runtime.wait()).await.unwrap();
        assert!(matches!(
            result,
            Err(SchedulerError::Sampler(SamplerError::PermissionDenied))
        ));
        assert!(!handle.is_running());
        assert_eq!(fixture.provider.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn transient_fix_error_is_ignored() {
        let fixture = Fixture::new();
        let runtime = fixture.start();

        fixture.provider.fail(SamplerError::Unavailable("no signal".into()));
        fixture.provider.emit(LocationFix::new(1.0, 2.0));
        assert!(fixture.sink.wait_for_attempts(1, WAIT).await);

        assert!(runtime.is_running());
        assert_eq!(fixture.sink.locations().len(), 1);

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn sos_without_fix_is_skipped() {
        let fixture = Fixture::new();
        let runtime = fixture.start();
        let handle = runtime.handle();

        assert!(handle.trigger_sos());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(fixture.provider.last_location_calls(), 1);
        assert_eq!(fixture.sink.total_attempts(), 0);
        assert_eq!(handle.mode(), ReportingMode::Normal);

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn sos_sends_location_before_alert() {
        let fixture = Fixture::new();
        fixture.provider.set_last_location(Some(LocationFix::new(52.5, 13.4)));
        fixture.sink.stall(Duration::from_millis(100));
        let runtime = fixture.start();
        let handle = runtime.handle();

        handle.trigger_sos();
        wait_for_mode(&handle, ReportingMode::is_burst).await;

        // The alert waits for the stalled location row.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fixture.sink.started_attempts(), 1);

        assert!(fixture.sink.wait_for_attempts(2, WAIT).await);
        assert_eq!(fixture.sink.delivery_order(), vec!["location", "alert"]);

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn sos_with_denied_last_location_is_skipped() {
        let fixture = Fixture::new();
        fixture.provider.set_last_location(Some(LocationFix::new(1.0, 2.0)));
        fixture.provider.deny_last_location();
        let runtime = fixture.start();
        let handle = runtime.handle();

        handle.trigger_sos();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(fixture.sink.total_attempts(), 0);
        assert_eq!(handle.mode(), ReportingMode::Normal);

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn raise_alert_and_status() {
        let fixture = Fixture::new();
        let runtime = fixture.start();
        let handle = runtime.handle();

        handle.raise_alert(EVENT_LOW_BATTERY, "Battery is critically low!");
        handle.report_status(Some(12));
        assert!(fixture.sink.wait_for_attempts(2, WAIT).await);

        let alerts = fixture.sink.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, "low_battery");
        assert_eq!(alerts[0].device_id, DEVICE);
        assert!(alerts[0].latitude.is_none());

        let statuses = fixture.sink.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].battery_level, Some(12));
        assert!(statuses[0].is_online);

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_stops_sampling_and_ingestion() {
        let fixture = Fixture::new();
        let runtime = fixture.start();
        let handle = runtime.handle();

        runtime.shutdown().await.unwrap();

        assert!(!handle.is_running());
        assert_eq!(fixture.provider.active_subscriptions(), 0);
        assert!(!handle.submit_event(EVENT_SOS));
        assert!(!handle.trigger_sos());
    }
}

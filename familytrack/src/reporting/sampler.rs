//! Location sampler - periodic acquisition on top of a location provider.
//!
//! A [`LocationProvider`] is the platform capability (GPS receiver, OS
//! location service, test fake). The [`Sampler`] wraps it and enforces the
//! scheduler's rules:
//!
//! - at most one subscription is active at a time;
//! - changing the interval is always stop-then-subscribe, never an in-place
//!   mutation of the running subscription;
//! - the provider is asked for updates no faster than half the interval.
//!
//! Fixes still queued on a subscription that has been stopped are discarded
//! together with it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::mode::ReportingConfig;
use super::model::LocationFix;

/// Errors from location acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SamplerError {
    /// The host has not granted location access.
    #[error("location permission not granted")]
    PermissionDenied,

    /// The provider cannot produce fixes right now.
    #[error("location provider unavailable: {0}")]
    Unavailable(String),

    /// The provider dropped the subscription.
    #[error("location subscription closed by provider")]
    SubscriptionClosed,
}

impl SamplerError {
    /// Whether a mid-stream error ends periodic sampling for good.
    ///
    /// Errors returned when subscribing are always fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SamplerError::Unavailable(_))
    }
}

/// Result delivered for each periodic fix.
pub type FixResult = Result<LocationFix, SamplerError>;

/// Parameters handed to the provider when subscribing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingRequest {
    /// Desired interval between fixes.
    pub interval: Duration,

    /// Fastest acceptable interval between fixes.
    pub min_update_interval: Duration,
}

impl SamplingRequest {
    /// Request for `interval` with the standard tolerance band.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            min_update_interval: ReportingConfig::min_update_interval(interval),
        }
    }
}

/// A live provider subscription.
///
/// Dropping it cancels the provider's acquisition task.
#[derive(Debug)]
pub struct Subscription {
    fixes: mpsc::Receiver<FixResult>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Wrap the receiving end of a provider's fix channel.
    ///
    /// The provider's acquisition task should stop once `cancel` fires.
    pub fn new(fixes: mpsc::Receiver<FixResult>, cancel: CancellationToken) -> Self {
        Self { fixes, cancel }
    }

    /// Next queued result; `None` once the provider closed the channel.
    pub async fn recv(&mut self) -> Option<FixResult> {
        self.fixes.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Platform location-acquisition capability.
pub trait LocationProvider: Send + Sync + 'static {
    /// Begin periodic acquisition.
    ///
    /// Must fail with [`SamplerError::PermissionDenied`] when location access
    /// has not been granted. Must be called from within a tokio runtime.
    fn subscribe(&self, request: SamplingRequest) -> Result<Subscription, SamplerError>;

    /// One-shot best-effort last known fix.
    ///
    /// `Ok(None)` means no fix is cached.
    fn last_location(
        &self,
    ) -> impl Future<Output = Result<Option<LocationFix>, SamplerError>> + Send;
}

struct ActiveSubscription {
    request: SamplingRequest,
    subscription: Subscription,
}

/// Periodic sampler with a single active subscription.
pub struct Sampler<P> {
    provider: Arc<P>,
    active: Option<ActiveSubscription>,
}

impl<P: LocationProvider> Sampler<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            active: None,
        }
    }

    /// Start sampling at `interval`, replacing any running subscription.
    pub fn start(&mut self, interval: Duration) -> Result<(), SamplerError> {
        self.stop();

        let request = SamplingRequest::new(interval);
        let subscription = self.provider.subscribe(request).inspect_err(|e| {
            tracing::error!(error = %e, interval_ms = interval.as_millis() as u64, "Failed to start location updates");
        })?;

        tracing::info!(
            interval_ms = request.interval.as_millis() as u64,
            min_update_interval_ms = request.min_update_interval.as_millis() as u64,
            "Location updates started"
        );
        self.active = Some(ActiveSubscription {
            request,
            subscription,
        });
        Ok(())
    }

    /// Cancel the running subscription, if any.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!(
                interval_ms = active.request.interval.as_millis() as u64,
                "Location updates stopped"
            );
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Interval of the running subscription.
    pub fn interval(&self) -> Option<Duration> {
        self.active.as_ref().map(|a| a.request.interval)
    }

    /// Wait for the next fix from the running subscription.
    ///
    /// Pends forever while stopped. A subscription the provider closed is
    /// reported once as [`SamplerError::SubscriptionClosed`] and dropped.
    /// Cancel-safe.
    pub async fn next_fix(&mut self) -> FixResult {
        let Some(active) = self.active.as_mut() else {
            return std::future::pending().await;
        };

        match active.subscription.recv().await {
            Some(result) => result,
            None => {
                self.active = None;
                Err(SamplerError::SubscriptionClosed)
            }
        }
    }

    /// Provider handle, for one-shot requests that bypass the subscription.
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }
}

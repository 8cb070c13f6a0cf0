//! Reporting mode state machine.
//!
//! The controller has two states:
//!
//! ```text
//!            trigger(reason)              sample at t >= started_at + burst_duration
//!   Normal ─────────────────► Burst ─────────────────────────────────────────► Normal
//!                               │
//!                               └── trigger(_) while bursting: no-op
//! ```
//!
//! Burst expiry is only evaluated when a sample arrives, so a burst can
//! overrun its configured duration by at most one burst sampling interval.
//! The controller is pure: it never touches the sampler itself, it reports a
//! [`ModeChange`] and the caller restarts sampling at the new interval.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::model::{LocationFix, LocationSample, EVENT_NORMAL};

/// Normal sampling interval (3 minutes).
pub const DEFAULT_NORMAL_INTERVAL: Duration = Duration::from_millis(180_000);

/// Burst sampling interval (10 seconds).
pub const DEFAULT_BURST_INTERVAL: Duration = Duration::from_millis(10_000);

/// How long a burst lasts before sampling falls back to normal (2 minutes).
pub const DEFAULT_BURST_DURATION: Duration = Duration::from_millis(120_000);

/// Timing constants for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportingConfig {
    /// Sampling interval in normal mode.
    pub normal_interval: Duration,

    /// Sampling interval while a burst is active.
    pub burst_interval: Duration,

    /// Minimum burst length before a sample can end it.
    pub burst_duration: Duration,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            normal_interval: DEFAULT_NORMAL_INTERVAL,
            burst_interval: DEFAULT_BURST_INTERVAL,
            burst_duration: DEFAULT_BURST_DURATION,
        }
    }
}

impl ReportingConfig {
    /// Sampling interval for a mode.
    pub fn interval_for(&self, mode: &ReportingMode) -> Duration {
        match mode {
            ReportingMode::Normal => self.normal_interval,
            ReportingMode::Burst { .. } => self.burst_interval,
        }
    }

    /// Fastest update the acquisition layer may deliver for `interval`.
    pub fn min_update_interval(interval: Duration) -> Duration {
        interval / 2
    }
}

/// Current reporting regime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportingMode {
    /// Low-frequency background reporting.
    Normal,

    /// High-frequency reporting after a safety-relevant trigger.
    Burst {
        /// Trigger that started the burst; also the event type of its samples.
        reason: String,
        /// When the burst started.
        started_at: DateTime<Utc>,
    },
}

impl ReportingMode {
    /// True while a burst is active.
    pub fn is_burst(&self) -> bool {
        matches!(self, ReportingMode::Burst { .. })
    }

    /// Event type that samples taken in this mode carry.
    pub fn event_type(&self) -> &str {
        match self {
            ReportingMode::Normal => EVENT_NORMAL,
            ReportingMode::Burst { reason, .. } => reason,
        }
    }
}

/// Outcome of a transition: the new mode and the interval to resample at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub mode: ReportingMode,
    pub interval: Duration,
}

/// Owner of the [`ReportingMode`].
#[derive(Debug)]
pub struct ModeController {
    config: ReportingConfig,
    mode: ReportingMode,
}

impl ModeController {
    /// Create a controller in normal mode.
    pub fn new(config: ReportingConfig) -> Self {
        Self {
            config,
            mode: ReportingMode::Normal,
        }
    }

    pub fn config(&self) -> &ReportingConfig {
        &self.config
    }

    pub fn mode(&self) -> &ReportingMode {
        &self.mode
    }

    /// Interval the sampler should currently run at.
    pub fn current_interval(&self) -> Duration {
        self.config.interval_for(&self.mode)
    }

    /// Request a burst.
    ///
    /// Only takes effect from normal mode. While bursting, the first reason
    /// and start time stand: the trigger neither relabels nor extends it.
    pub fn trigger(&mut self, reason: &str, now: DateTime<Utc>) -> Option<ModeChange> {
        if let ReportingMode::Burst {
            reason: active,
            started_at,
        } = &self.mode
        {
            tracing::debug!(
                requested = reason,
                active = %active,
                started_at = %started_at,
                "Burst already active, trigger ignored"
            );
            return None;
        }

        self.mode = ReportingMode::Burst {
            reason: reason.to_string(),
            started_at: now,
        };
        tracing::info!(reason, started_at = %now, "Burst mode started");
        Some(self.change())
    }

    /// Stamp a fix with the current event type, then check burst expiry.
    ///
    /// The sample that ends a burst still carries the burst reason.
    pub fn tag_sample(
        &mut self,
        fix: LocationFix,
        now: DateTime<Utc>,
    ) -> (LocationSample, Option<ModeChange>) {
        let sample = LocationSample::from_fix(fix, self.mode.event_type(), now);
        let change = self.check_expiry(now);
        (sample, change)
    }

    fn check_expiry(&mut self, now: DateTime<Utc>) -> Option<ModeChange> {
        let ReportingMode::Burst { reason, started_at } = &self.mode else {
            return None;
        };

        // A clock that stepped backwards counts as no time elapsed.
        let elapsed = (now - *started_at).to_std().unwrap_or(Duration::ZERO);
        if elapsed < self.config.burst_duration {
            return None;
        }

        tracing::info!(
            reason = %reason,
            elapsed_ms = elapsed.as_millis() as u64,
            "Burst mode ended"
        );
        self.mode = ReportingMode::Normal;
        Some(self.change())
    }

    fn change(&self) -> ModeChange {
        ModeChange {
            mode: self.mode.clone(),
            interval: self.current_interval(),
        }
    }
}

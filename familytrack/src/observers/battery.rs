//! Battery level observer.

use std::path::PathBuf;

use thiserror::Error;

use super::ReportingTriggers;
use crate::reporting::EVENT_LOW_BATTERY;

/// Battery percentage at or below which a low-battery burst starts.
pub const LOW_BATTERY_THRESHOLD: u8 = 15;

/// Message attached to low-battery alerts.
pub const LOW_BATTERY_MESSAGE: &str = "Battery is critically low!";

/// Default power-supply device under `/sys/class/power_supply`.
pub const DEFAULT_BATTERY_DEVICE: &str = "BAT0";

/// Errors reading the battery level.
#[derive(Debug, Error)]
pub enum BatteryReadError {
    #[error("Failed to read battery level from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unparseable battery level in {path}: '{value}'")]
    Parse { path: PathBuf, value: String },
}

/// Raw level/scale pair as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryReading {
    pub level: i32,
    pub scale: i32,
}

impl BatteryReading {
    pub fn new(level: i32, scale: i32) -> Self {
        Self { level, scale }
    }

    /// `level * 100 / scale`, truncated. `None` for a missing or bogus reading.
    pub fn percent(&self) -> Option<u8> {
        if self.level < 0 || self.scale <= 0 {
            return None;
        }
        let pct = (i64::from(self.level) * 100 / i64::from(self.scale)).min(100);
        u8::try_from(pct).ok()
    }
}

/// Source of battery readings.
pub trait BatterySource: Send + Sync {
    fn read(&self) -> Result<BatteryReading, BatteryReadError>;
}

/// Linux sysfs battery (`/sys/class/power_supply/<device>/capacity`).
#[derive(Debug, Clone)]
pub struct SysfsBattery {
    capacity_path: PathBuf,
}

impl SysfsBattery {
    pub fn new(device: &str) -> Self {
        Self::from_path(
            PathBuf::from("/sys/class/power_supply")
                .join(device)
                .join("capacity"),
        )
    }

    /// Read capacity from an arbitrary file.
    pub fn from_path(capacity_path: impl Into<PathBuf>) -> Self {
        Self {
            capacity_path: capacity_path.into(),
        }
    }
}

impl BatterySource for SysfsBattery {
    fn read(&self) -> Result<BatteryReading, BatteryReadError> {
        let raw = std::fs::read_to_string(&self.capacity_path).map_err(|source| {
            BatteryReadError::Io {
                path: self.capacity_path.clone(),
                source,
            }
        })?;

        let level = raw.trim().parse().map_err(|_| BatteryReadError::Parse {
            path: self.capacity_path.clone(),
            value: raw.trim().to_string(),
        })?;
        Ok(BatteryReading::new(level, 100))
    }
}

/// Reports battery status and escalates at low charge.
pub struct BatteryObserver<T> {
    triggers: T,
    threshold: u8,
}

impl<T: ReportingTriggers> BatteryObserver<T> {
    pub fn new(triggers: T) -> Self {
        Self {
            triggers,
            threshold: LOW_BATTERY_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Handle a level reading: always report status, escalate when low.
    ///
    /// Returns the computed percentage.
    pub fn on_reading(&self, reading: BatteryReading) -> Option<u8> {
        let Some(pct) = reading.percent() else {
            tracing::debug!(?reading, "Ignoring invalid battery reading");
            return None;
        };

        self.triggers.report_status(Some(pct));
        if pct <= self.threshold {
            tracing::warn!(level = pct, threshold = self.threshold, "Battery low");
            self.on_battery_low();
        }
        Some(pct)
    }

    /// Handle an explicit low-battery signal from the host.
    pub fn on_battery_low(&self) {
        self.triggers.submit_event(EVENT_LOW_BATTERY);
        self.triggers
            .raise_alert(EVENT_LOW_BATTERY, LOW_BATTERY_MESSAGE);
    }

    /// Read from `source` and handle the result. Read errors are logged.
    pub fn poll(&self, source: &dyn BatterySource) -> Option<u8> {
        match source.read() {
            Ok(reading) => self.on_reading(reading),
            Err(e) => {
                tracing::warn!(error = %e, "Battery read failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observers::test_support::{Call, RecordingTriggers};
    use std::sync::Arc;

    fn observer() -> (BatteryObserver<Arc<RecordingTriggers>>, Arc<RecordingTriggers>) {
        let triggers = Arc::new(RecordingTriggers::default());
        (BatteryObserver::new(triggers.clone()), triggers)
    }

    #[test]
    fn percent_from_level_and_scale() {
        assert_eq!(BatteryReading::new(50, 100).percent(), Some(50));
        assert_eq!(BatteryReading::new(3, 20).percent(), Some(15));
        assert_eq!(BatteryReading::new(299, 1000).percent(), Some(29));
        assert_eq!(BatteryReading::new(-1, 100).percent(), None);
        assert_eq!(BatteryReading::new(10, -1).percent(), None);
        assert_eq!(BatteryReading::new(10, 0).percent(), None);
    }

    #[test]
    fn normal_level_only_reports_status() {
        let (observer, triggers) = observer();

        assert_eq!(observer.on_reading(BatteryReading::new(80, 100)), Some(80));

        assert_eq!(triggers.calls(), vec![Call::Status(Some(80))]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let (observer, triggers) = observer();

        observer.on_reading(BatteryReading::new(15, 100));

        assert_eq!(
            triggers.calls(),
            vec![
                Call::Status(Some(15)),
                Call::Event("low_battery".to_string()),
                Call::Alert("low_battery".to_string(), "Battery is critically low!".to_string()),
            ]
        );
    }

    #[test]
    fn just_above_threshold_does_not_escalate() {
        let (observer, triggers) = observer();

        observer.on_reading(BatteryReading::new(16, 100));

        assert_eq!(triggers.calls().len(), 1);
    }

    #[test]
    fn invalid_reading_is_ignored() {
        let (observer, triggers) = observer();

        assert_eq!(observer.on_reading(BatteryReading::new(-1, -1)), None);
        assert!(triggers.calls().is_empty());
    }

    #[test]
    fn custom_threshold() {
        let (observer, triggers) = observer();
        let observer = observer.with_threshold(30);

        observer.on_reading(BatteryReading::new(25, 100));

        assert!(triggers.calls().contains(&Call::Event("low_battery".to_string())));
    }

    #[test]
    fn sysfs_capacity_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("capacity");
        std::fs::write(&path, "42\n").unwrap();

        let reading = SysfsBattery::from_path(&path).read().unwrap();
        assert_eq!(reading.percent(), Some(42));
    }

    #[test]
    fn poll_logs_and_skips_read_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let (observer, triggers) = observer();

        let missing = SysfsBattery::from_path(dir.path().join("missing"));
        assert_eq!(observer.poll(&missing), None);

        let garbage = dir.path().join("capacity");
        std::fs::write(&garbage, "full").unwrap();
        let result = SysfsBattery::from_path(&garbage).read();
        assert!(matches!(result, Err(BatteryReadError::Parse { .. })));

        assert!(triggers.calls().is_empty());
    }
}

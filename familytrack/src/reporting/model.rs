//! Records that flow from the scheduler to the sink.

use chrono::{DateTime, Utc};

/// Event type for samples taken outside any burst.
pub const EVENT_NORMAL: &str = "normal";

/// Panic button.
pub const EVENT_SOS: &str = "sos";

/// Battery at or below the low-battery threshold.
pub const EVENT_LOW_BATTERY: &str = "low_battery";

/// SIM card serial differs from the last one seen.
pub const EVENT_SIM_CHANGE: &str = "sim_change";

/// Message attached to SOS alerts.
pub const SOS_MESSAGE: &str = "SOS button pressed!";

/// A raw position fix from a location provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Horizontal accuracy in meters, when the provider reports one.
    pub accuracy: Option<f32>,
    /// Ground speed in meters per second, when the provider reports one.
    pub speed: Option<f32>,
}

impl LocationFix {
    /// Fix with position only.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            speed: None,
        }
    }

    /// Attach a horizontal accuracy.
    pub fn with_accuracy(mut self, meters: f32) -> Self {
        self.accuracy = Some(meters);
        self
    }

    /// Attach a ground speed.
    pub fn with_speed(mut self, meters_per_second: f32) -> Self {
        self.speed = Some(meters_per_second);
        self
    }
}

/// A location fix stamped with the reporting context it was taken in.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f32>,
    pub speed: Option<f32>,
    /// `"normal"` or the reason of the active burst.
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    /// Stamp a fix with an event type and capture time.
    pub fn from_fix(fix: LocationFix, event_type: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            speed: fix.speed,
            event_type: event_type.into(),
            timestamp,
        }
    }
}

/// An alert raised on behalf of the device.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub device_id: String,
    pub alert_type: String,
    pub message: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl AlertRecord {
    /// Alert without a position.
    pub fn new(
        device_id: impl Into<String>,
        alert_type: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            alert_type: alert_type.into(),
            message: message.into(),
            latitude: None,
            longitude: None,
            timestamp,
        }
    }

    /// Attach coordinates.
    pub fn at(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

/// Device liveness and battery report.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    /// Battery percentage (0-100), if known.
    pub battery_level: Option<u8>,
    pub is_online: bool,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_copies_fix_fields() {
        let now = Utc::now();
        let fix = LocationFix::new(53.55, 9.99).with_accuracy(12.5).with_speed(1.2);

        let sample = LocationSample::from_fix(fix, EVENT_SOS, now);

        assert_eq!(sample.latitude, 53.55);
        assert_eq!(sample.longitude, 9.99);
        assert_eq!(sample.accuracy, Some(12.5));
        assert_eq!(sample.speed, Some(1.2));
        assert_eq!(sample.event_type, "sos");
        assert_eq!(sample.timestamp, now);
    }

    #[test]
    fn alert_without_position() {
        let alert = AlertRecord::new("id", EVENT_LOW_BATTERY, "Battery is critically low!", Utc::now());
        assert!(alert.latitude.is_none());
        assert!(alert.longitude.is_none());
    }

    #[test]
    fn alert_with_position() {
        let alert = AlertRecord::new("id", EVENT_SOS, SOS_MESSAGE, Utc::now()).at(1.0, 2.0);
        assert_eq!(alert.latitude, Some(1.0));
        assert_eq!(alert.longitude, Some(2.0));
    }
}

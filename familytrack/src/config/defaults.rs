//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use super::file::config_directory;
use super::settings::*;
use crate::location::DEFAULT_GPS_PORT;
use crate::observers::{DEFAULT_BATTERY_DEVICE, LOW_BATTERY_THRESHOLD};
use crate::reporting::{DEFAULT_BURST_DURATION, DEFAULT_BURST_INTERVAL, DEFAULT_NORMAL_INTERVAL};

/// Default normal-mode sampling interval in milliseconds (3 minutes).
pub const DEFAULT_NORMAL_INTERVAL_MS: u64 = DEFAULT_NORMAL_INTERVAL.as_millis() as u64;

/// Default burst-mode sampling interval in milliseconds (10 seconds).
pub const DEFAULT_BURST_INTERVAL_MS: u64 = DEFAULT_BURST_INTERVAL.as_millis() as u64;

/// Default burst length in milliseconds (2 minutes).
pub const DEFAULT_BURST_DURATION_MS: u64 = DEFAULT_BURST_DURATION.as_millis() as u64;

/// Default HTTP timeout for deliveries in seconds.
pub const DEFAULT_SINK_TIMEOUT_SECS: u64 = 15;

/// Default bind address for the GPS listener.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default seconds between battery readings.
pub const DEFAULT_BATTERY_POLL_SECS: u64 = 300;

/// Default log file name inside the config directory.
pub const DEFAULT_LOG_FILE: &str = "familytrack.log";

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            reporting: ReportingSettings::default(),
            sink: SinkSettings {
                url: None,
                api_key: None,
                timeout_secs: DEFAULT_SINK_TIMEOUT_SECS,
            },
            location: LocationSettings {
                port: DEFAULT_GPS_PORT,
                bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            },
            battery: BatterySettings {
                device: DEFAULT_BATTERY_DEVICE.to_string(),
                threshold: LOW_BATTERY_THRESHOLD,
                poll_interval_secs: DEFAULT_BATTERY_POLL_SECS,
            },
            sim: SimSettings { serial_file: None },
            logging: LoggingSettings {
                file: config_directory().join(DEFAULT_LOG_FILE),
            },
        }
    }
}

impl Default for ReportingSettings {
    fn default() -> Self {
        Self {
            normal_interval_ms: DEFAULT_NORMAL_INTERVAL_MS,
            burst_interval_ms: DEFAULT_BURST_INTERVAL_MS,
            burst_duration_ms: DEFAULT_BURST_DURATION_MS,
        }
    }
}

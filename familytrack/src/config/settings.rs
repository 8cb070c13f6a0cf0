//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Sampling cadence and burst length
    pub reporting: ReportingSettings,
    /// Backend connection
    pub sink: SinkSettings,
    /// GPS listener
    pub location: LocationSettings,
    /// Battery polling
    pub battery: BatterySettings,
    /// SIM swap detection
    pub sim: SimSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Reporting cadence, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportingSettings {
    pub normal_interval_ms: u64,
    pub burst_interval_ms: u64,
    pub burst_duration_ms: u64,
}

/// Backend connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSettings {
    /// Project base URL. Reporting cannot start without it.
    pub url: Option<String>,
    /// Project API key.
    pub api_key: Option<String>,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

/// GPS listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationSettings {
    /// UDP port for GPS sentences.
    pub port: u16,
    /// Address to bind.
    pub bind_address: String,
}

/// Battery polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatterySettings {
    /// Device name under /sys/class/power_supply. Empty disables polling.
    pub device: String,
    /// Low-battery threshold percentage.
    pub threshold: u8,
    /// Seconds between readings.
    pub poll_interval_secs: u64,
}

/// SIM swap detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimSettings {
    /// File holding the current SIM serial. Unset disables the check.
    pub serial_file: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

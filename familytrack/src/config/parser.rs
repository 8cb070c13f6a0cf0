//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [reporting] section
    if let Some(section) = ini.section(Some("reporting")) {
        let positive = "must be a positive integer (milliseconds)";
        if let Some(v) = parse_positive(section, "reporting", "normal_interval_ms", positive)? {
            config.reporting.normal_interval_ms = v;
        }
        if let Some(v) = parse_positive(section, "reporting", "burst_interval_ms", positive)? {
            config.reporting.burst_interval_ms = v;
        }
        if let Some(v) = parse_positive(section, "reporting", "burst_duration_ms", positive)? {
            config.reporting.burst_duration_ms = v;
        }
    }
    if config.reporting.burst_interval_ms > config.reporting.normal_interval_ms {
        return Err(invalid(
            "reporting",
            "burst_interval_ms",
            &config.reporting.burst_interval_ms.to_string(),
            "must not exceed normal_interval_ms",
        ));
    }

    // [sink] section
    if let Some(section) = ini.section(Some("sink")) {
        if let Some(v) = non_empty(section, "url") {
            if !v.starts_with("http://") && !v.starts_with("https://") {
                return Err(invalid("sink", "url", v, "must start with http:// or https://"));
            }
            config.sink.url = Some(v.to_string());
        }
        if let Some(v) = non_empty(section, "api_key") {
            config.sink.api_key = Some(v.to_string());
        }
        if let Some(v) = parse_positive(
            section,
            "sink",
            "timeout_secs",
            "must be a positive integer (seconds)",
        )? {
            config.sink.timeout_secs = v;
        }
    }

    // [location] section
    if let Some(section) = ini.section(Some("location")) {
        if let Some(v) = parse_value(section, "location", "port", "must be a port number (0-65535)")? {
            config.location.port = v;
        }
        if let Some(v) = non_empty(section, "bind_address") {
            config.location.bind_address = v.to_string();
        }
    }

    // [battery] section
    if let Some(section) = ini.section(Some("battery")) {
        if let Some(v) = section.get("device") {
            config.battery.device = v.trim().to_string();
        }
        if let Some(v) = parse_value::<u8>(section, "battery", "threshold", "must be 0-100")? {
            if v > 100 {
                return Err(invalid("battery", "threshold", &v.to_string(), "must be 0-100"));
            }
            config.battery.threshold = v;
        }
        if let Some(v) = parse_positive(
            section,
            "battery",
            "poll_interval_secs",
            "must be a positive integer (seconds)",
        )? {
            config.battery.poll_interval_secs = v;
        }
    }

    // [sim] section
    if let Some(section) = ini.section(Some("sim")) {
        if let Some(v) = section.get("serial_file") {
            let v = v.trim();
            config.sim.serial_file = (!v.is_empty()).then(|| expand_tilde(v));
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section, "file") {
            config.logging.file = expand_tilde(v);
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn parse_value<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    let Some(v) = non_empty(section, key) else {
        return Ok(None);
    };
    v.parse()
        .map(Some)
        .map_err(|_| invalid(section_name, key, v, reason))
}

fn parse_positive(
    section: &Properties,
    section_name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<u64>, ConfigFileError> {
    match parse_value::<u64>(section, section_name, key, reason)? {
        Some(0) => Err(invalid(section_name, key, "0", reason)),
        other => Ok(other),
    }
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

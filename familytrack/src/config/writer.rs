//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let url = config.sink.url.as_deref().unwrap_or("");
    let api_key = config.sink.api_key.as_deref().unwrap_or("");
    let serial_file = config
        .sim
        .serial_file
        .as_ref()
        .map(|p| path_to_string(p))
        .unwrap_or_default();

    format!(
        r#"[reporting]
; Sampling interval in normal mode, milliseconds (default: 180000 = 3 minutes)
normal_interval_ms = {}
; Sampling interval during a burst, milliseconds (default: 10000 = 10 seconds)
; Must not exceed normal_interval_ms
burst_interval_ms = {}
; How long a burst lasts, milliseconds (default: 120000 = 2 minutes)
; A burst ends on the first sample taken after this much time has passed
burst_duration_ms = {}

[sink]
; Backend project URL, e.g. https://your-project.supabase.co
; Reporting does not start until this is set
url = {}
; Backend API key (sent as apikey and bearer token)
api_key = {}
; HTTP timeout in seconds for a single delivery (default: 15)
timeout_secs = {}

[location]
; UDP port receiving XGPS or NMEA RMC sentences (default: 49002)
port = {}
; Address to bind (default: 0.0.0.0)
bind_address = {}

[battery]
; Power-supply device under /sys/class/power_supply (default: BAT0)
; Leave empty to disable battery monitoring
device = {}
; Battery percentage at or below which a low-battery burst and alert fire (default: 15)
threshold = {}
; Seconds between battery readings (default: 300)
poll_interval_secs = {}

[sim]
; File containing the current SIM serial (ICCID), written by a modem helper
; Leave empty to disable SIM change detection
serial_file = {}

[logging]
; Log file path (default: ~/.familytrack/familytrack.log)
file = {}
"#,
        config.reporting.normal_interval_ms,
        config.reporting.burst_interval_ms,
        config.reporting.burst_duration_ms,
        url,
        api_key,
        config.sink.timeout_secs,
        config.location.port,
        config.location.bind_address,
        config.battery.device,
        config.battery.threshold,
        config.battery.poll_interval_secs,
        serial_file,
        path_to_string(&config.logging.file),
    )
}

/// Convert a path to a string, using ~ for home directory.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_written_config_parses_back() {
        let mut config = ConfigFile::default();
        config.reporting.normal_interval_ms = 60_000;
        config.sink.url = Some("https://example.supabase.co".to_string());
        config.sink.api_key = Some("secret".to_string());
        config.battery.threshold = 20;
        config.sim.serial_file = Some(PathBuf::from("/run/modem/iccid"));

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded.reporting.normal_interval_ms, 60_000);
        assert_eq!(loaded.sink.url, config.sink.url);
        assert_eq!(loaded.sink.api_key, config.sink.api_key);
        assert_eq!(loaded.battery.threshold, 20);
        assert_eq!(loaded.sim.serial_file, config.sim.serial_file);
    }

    #[test]
    fn test_default_config_is_commented() {
        let content = to_config_string(&ConfigFile::default());

        assert!(content.contains("[reporting]"));
        assert!(content.contains("normal_interval_ms = 180000"));
        assert!(content.contains("; Leave empty to disable SIM change detection"));
    }

    #[test]
    fn test_path_to_string_uses_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path_to_string(&home.join("a.log")), "~/a.log");
        }
        assert_eq!(path_to_string(Path::new("/var/log/x.log")), "/var/log/x.log");
    }
}

//! Configuration file handling for ~/.familytrack/config.ini.
//!
//! Loads and saves user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::settings::ConfigFile;
use crate::location::UdpLocationConfig;
use crate::reporting::{ReportingConfig, RestSinkConfig};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// A required value is not set
    #[error("Missing configuration: {section}.{key} must be set")]
    Missing { section: String, key: String },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.familytrack/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.familytrack/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let path = config_file_path();
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            let config = Self::default();
            config.save_to(&path)?;
        }
        Ok(path)
    }

    /// Scheduler timing.
    pub fn reporting_config(&self) -> ReportingConfig {
        ReportingConfig {
            normal_interval: Duration::from_millis(self.reporting.normal_interval_ms),
            burst_interval: Duration::from_millis(self.reporting.burst_interval_ms),
            burst_duration: Duration::from_millis(self.reporting.burst_duration_ms),
        }
    }

    /// Backend connection settings; both URL and API key are required.
    pub fn sink_config(&self) -> Result<RestSinkConfig, ConfigFileError> {
        let missing = |key: &str| ConfigFileError::Missing {
            section: "sink".to_string(),
            key: key.to_string(),
        };
        let url = self.sink.url.as_deref().ok_or_else(|| missing("url"))?;
        let api_key = self.sink.api_key.as_deref().ok_or_else(|| missing("api_key"))?;

        Ok(RestSinkConfig::new(url, api_key)
            .with_timeout(Duration::from_secs(self.sink.timeout_secs)))
    }

    /// GPS listener settings.
    pub fn location_config(&self) -> UdpLocationConfig {
        UdpLocationConfig {
            port: self.location.port,
            bind_address: self.location.bind_address.clone(),
        }
    }
}

/// Get the path to the config directory (~/.familytrack).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".familytrack")
}

/// Get the path to the config file (~/.familytrack/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

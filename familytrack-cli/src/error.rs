//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use familytrack::config::ConfigFileError;
use familytrack::identity::IdentityError;
use familytrack::preferences::PreferencesError;
use familytrack::reporting::{SamplerError, SchedulerError, SinkError, StartError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(ConfigFileError),
    /// Preferences could not be read or written
    Preferences(PreferencesError),
    /// Device id given on the command line is not a UUID
    InvalidDeviceId(IdentityError),
    /// GPS listener could not be started
    Location(SamplerError),
    /// HTTP client for the backend could not be built
    Sink(SinkError),
    /// Scheduler refused to start
    Start(StartError),
    /// Scheduler stopped on its own
    Stopped(SchedulerError),
    /// Async runtime or signal setup failed
    Runtime(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Start(StartError::MissingDeviceId) => {
                eprintln!();
                eprintln!("Register this device in the dashboard, then run:");
                eprintln!("  familytrack device set <device-id>");
            }
            CliError::Config(ConfigFileError::Missing { .. }) => {
                eprintln!();
                eprintln!("Create a config file with 'familytrack config init', then set");
                eprintln!("url and api_key in the [sink] section.");
            }
            CliError::Location(SamplerError::PermissionDenied) => {
                eprintln!();
                eprintln!("Ports below 1024 need elevated privileges.");
                eprintln!("Choose another port in the [location] section.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "{}", e),
            CliError::Preferences(e) => write!(f, "{}", e),
            CliError::InvalidDeviceId(e) => write!(f, "Invalid device id: {}", e),
            CliError::Location(e) => write!(f, "Failed to start GPS listener: {}", e),
            CliError::Sink(e) => write!(f, "Failed to create backend client: {}", e),
            CliError::Start(e) => write!(f, "Reporting did not start: {}", e),
            CliError::Stopped(e) => write!(f, "Reporting stopped: {}", e),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Preferences(e) => Some(e),
            CliError::InvalidDeviceId(e) => Some(e),
            CliError::Location(e) => Some(e),
            CliError::Sink(e) => Some(e),
            CliError::Start(e) => Some(e),
            CliError::Stopped(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<PreferencesError> for CliError {
    fn from(e: PreferencesError) -> Self {
        CliError::Preferences(e)
    }
}

impl From<StartError> for CliError {
    fn from(e: StartError) -> Self {
        CliError::Start(e)
    }
}

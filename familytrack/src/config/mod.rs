//! Configuration for the reporting host.
//!
//! The INI file at `~/.familytrack/config.ini` is split by concern:
//!
//! - [`settings`] - one struct per `[section]`
//! - `defaults` - `DEFAULT_*` constants and `ConfigFile::default()`
//! - `parser` - `Ini` → `ConfigFile`, with validation
//! - `writer` - `ConfigFile` → commented INI
//! - `file` - load/save and path helpers
//!
//! # Example
//!
//! ```
//! use familytrack::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! let timing = config.reporting_config();
//! assert_eq!(timing.burst_interval.as_secs(), 10);
//! ```

mod defaults;
mod file;
mod parser;
pub mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    BatterySettings, ConfigFile, LocationSettings, LoggingSettings, ReportingSettings,
    SimSettings, SinkSettings,
};

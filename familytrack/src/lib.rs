//! FamilyTrack - adaptive location reporting for a tracked device
//!
//! This library provides the device-side reporting core: it samples the
//! device position on a slow cadence, switches to a fast cadence for a
//! bounded time after a safety trigger (panic button, low battery, SIM swap),
//! and pushes tagged samples, alerts and status to a remote backend.
//!
//! # High-Level API
//!
//! The [`reporting`] module wires everything together:
//!
//! ```ignore
//! use std::sync::Arc;
//! use familytrack::config::ConfigFile;
//! use familytrack::location::UdpLocationProvider;
//! use familytrack::reporting::{ReportingScheduler, RestSink};
//!
//! let config = ConfigFile::load()?;
//! let provider = Arc::new(UdpLocationProvider::bind(config.location_config()).await?);
//! let sink = Arc::new(RestSink::new(config.sink_config()?)?);
//!
//! let runtime = ReportingScheduler::new(config.reporting_config(), provider, sink)
//!     .start(Some(&device_id))?;
//! runtime.handle().trigger_sos();
//! ```

pub mod config;
pub mod identity;
pub mod location;
pub mod logging;
pub mod observers;
pub mod preferences;
pub mod reporting;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod time;

/// Version of the FamilyTrack library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

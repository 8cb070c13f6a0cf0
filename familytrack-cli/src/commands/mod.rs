//! CLI command implementations.
//!
//! - [`config`] - Configuration file management (path, show, init)
//! - [`device`] - Stored device id (set, show, clear)
//! - [`run`] - Main command (start reporting)

pub mod config;
pub mod device;
pub mod run;

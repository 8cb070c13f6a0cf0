//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use std::path::Path;

use clap::Subcommand;
use familytrack::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show the configuration file path
    Path,
    /// List the effective configuration
    Show,
    /// Write a commented default configuration file if none exists
    Init,
}

/// Run a config subcommand.
pub fn run(action: ConfigAction) -> Result<(), CliError> {
    match action {
        ConfigAction::Path => {
            println!("{}", config_file_path().display());
            Ok(())
        }
        ConfigAction::Show => run_show(),
        ConfigAction::Init => run_init(),
    }
}

fn run_show() -> Result<(), CliError> {
    let config = ConfigFile::load()?;

    println!("Configuration Settings");
    println!("======================");
    println!();

    println!("[reporting]");
    print_value("normal_interval_ms", config.reporting.normal_interval_ms);
    print_value("burst_interval_ms", config.reporting.burst_interval_ms);
    print_value("burst_duration_ms", config.reporting.burst_duration_ms);
    println!();

    println!("[sink]");
    print_optional("url", config.sink.url.as_deref());
    // Never echo the key itself.
    print_optional("api_key", config.sink.api_key.as_ref().map(|_| "(set)"));
    print_value("timeout_secs", config.sink.timeout_secs);
    println!();

    println!("[location]");
    print_value("port", config.location.port);
    print_value("bind_address", &config.location.bind_address);
    println!();

    println!("[battery]");
    print_optional(
        "device",
        Some(config.battery.device.as_str()).filter(|d| !d.is_empty()),
    );
    print_value("threshold", config.battery.threshold);
    print_value("poll_interval_secs", config.battery.poll_interval_secs);
    println!();

    println!("[sim]");
    print_optional(
        "serial_file",
        config.sim.serial_file.as_deref().map(display_path).as_deref(),
    );
    println!();

    println!("[logging]");
    print_value("file", display_path(&config.logging.file));

    Ok(())
}

fn run_init() -> Result<(), CliError> {
    let path = config_file_path();
    if path.exists() {
        println!("Configuration already exists at {}", path.display());
        return Ok(());
    }

    let path = ConfigFile::ensure_exists()?;
    println!("Created {}", path.display());
    println!("Set url and api_key in the [sink] section before running.");
    Ok(())
}

fn print_value(key: &str, value: impl std::fmt::Display) {
    println!("  {} = {}", key, value);
}

fn print_optional(key: &str, value: Option<&str>) {
    print_value(key, value.unwrap_or("(not set)"));
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

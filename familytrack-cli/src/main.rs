//! FamilyTrack CLI - Command-line interface
//!
//! This binary hosts the FamilyTrack reporting core on a Linux device and
//! manages its configuration and stored device identity.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};

use commands::config::ConfigAction;
use commands::device::DeviceAction;
use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "familytrack")]
#[command(version = familytrack::VERSION)]
#[command(about = "Adaptive location reporting agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start reporting in the foreground
    ///
    /// Signals: SIGUSR1 triggers SOS, SIGUSR2 re-checks the SIM card,
    /// SIGINT/SIGTERM stop reporting.
    Run {
        /// Enable debug-level logging regardless of RUST_LOG
        #[arg(long)]
        debug: bool,

        /// Exit quietly instead of failing when no device id is stored
        #[arg(long)]
        on_boot: bool,
    },

    /// Manage the stored device id
    Device {
        #[command(subcommand)]
        action: DeviceAction,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { debug, on_boot } => commands::run::run(RunArgs { debug, on_boot }),
        Commands::Device { action } => commands::device::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        e.exit();
    }
}

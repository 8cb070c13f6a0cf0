//! Device id CLI commands.

use clap::Subcommand;
use familytrack::identity::DeviceId;
use familytrack::preferences::{IniPreferences, PreferenceStore};

use crate::error::CliError;

/// Device subcommands.
#[derive(Debug, Subcommand)]
pub enum DeviceAction {
    /// Store the device id assigned by the dashboard
    Set {
        /// Device id (UUID), e.g. 3f2b8c1e-9a4d-4e7b-8c2a-1d5e6f7a8b9c
        device_id: String,
    },
    /// Show the stored device id
    Show,
    /// Forget the stored device id and SIM serial
    Clear,
}

/// Run a device subcommand.
pub fn run(action: DeviceAction) -> Result<(), CliError> {
    let prefs = IniPreferences::open_default();

    match action {
        DeviceAction::Set { device_id } => {
            let id = DeviceId::parse(&device_id).map_err(CliError::InvalidDeviceId)?;
            prefs.save_device_id(id.as_str())?;
            println!("Device id set to {}", id);
            println!("Stored in {}", prefs.path().display());
        }
        DeviceAction::Show => match prefs.device_id()? {
            Some(id) => println!("{}", id),
            None => println!("(not set)"),
        },
        DeviceAction::Clear => {
            prefs.clear()?;
            println!("Device preferences cleared");
        }
    }

    Ok(())
}

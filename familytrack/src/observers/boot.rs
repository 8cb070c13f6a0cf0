//! Start-on-boot decision.

use crate::preferences::PreferenceStore;

/// Whether reporting should start automatically: only once a device id has
/// been stored. Unreadable preferences count as "no".
pub fn should_start_on_boot(prefs: &dyn PreferenceStore) -> bool {
    match prefs.device_id() {
        Ok(Some(_)) => {
            tracing::debug!("Device id found, starting reporting");
            true
        }
        Ok(None) => {
            tracing::debug!("No device id, not starting reporting");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not read preferences, not starting reporting");
            false
        }
    }
}

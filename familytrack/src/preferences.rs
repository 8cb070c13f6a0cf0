//! Persisted device preferences.
//!
//! Two values survive restarts: the device id assigned by the dashboard and
//! the last SIM serial seen. They live in `~/.familytrack/preferences.ini`:
//!
//! ```ini
//! [device]
//! device_id = 3f2b8c1e-9a4d-4e7b-8c2a-1d5e6f7a8b9c
//! sim_serial = 8949020000012345678
//! ```

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ini::Ini;
use thiserror::Error;

use crate::config::config_directory;

const SECTION: &str = "device";
const KEY_DEVICE_ID: &str = "device_id";
const KEY_SIM_SERIAL: &str = "sim_serial";

/// Preference storage errors.
#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("Failed to read preferences: {0}")]
    Read(#[from] ini::Error),

    #[error("Failed to write preferences to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Key-value store for the device id and SIM serial.
pub trait PreferenceStore: Send + Sync {
    fn device_id(&self) -> Result<Option<String>, PreferencesError>;

    fn save_device_id(&self, device_id: &str) -> Result<(), PreferencesError>;

    fn sim_serial(&self) -> Result<Option<String>, PreferencesError>;

    fn save_sim_serial(&self, serial: &str) -> Result<(), PreferencesError>;

    /// Forget everything.
    fn clear(&self) -> Result<(), PreferencesError>;
}

/// Path of the preferences file (~/.familytrack/preferences.ini).
pub fn preferences_file_path() -> PathBuf {
    config_directory().join("preferences.ini")
}

/// INI-file backed preferences.
#[derive(Debug)]
pub struct IniPreferences {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl IniPreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Preferences at the default location.
    pub fn open_default() -> Self {
        Self::new(preferences_file_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Ini, PreferencesError> {
        if !self.path.exists() {
            return Ok(Ini::new());
        }
        Ok(Ini::load_from_file(&self.path)?)
    }

    fn get(&self, key: &str) -> Result<Option<String>, PreferencesError> {
        let ini = self.load()?;
        Ok(ini
            .section(Some(SECTION))
            .and_then(|s| s.get(key))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from))
    }

    fn update(&self, edit: impl FnOnce(&mut Ini)) -> Result<(), PreferencesError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut ini = self.load()?;
        edit(&mut ini);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| PreferencesError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        ini.write_to_file(&self.path)
            .map_err(|source| PreferencesError::Write {
                path: self.path.clone(),
                source,
            })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferencesError> {
        self.update(|ini| {
            ini.with_section(Some(SECTION)).set(key, value);
        })
    }
}

impl PreferenceStore for IniPreferences {
    fn device_id(&self) -> Result<Option<String>, PreferencesError> {
        self.get(KEY_DEVICE_ID)
    }

    fn save_device_id(&self, device_id: &str) -> Result<(), PreferencesError> {
        self.set(KEY_DEVICE_ID, device_id)
    }

    fn sim_serial(&self) -> Result<Option<String>, PreferencesError> {
        self.get(KEY_SIM_SERIAL)
    }

    fn save_sim_serial(&self, serial: &str) -> Result<(), PreferencesError> {
        self.set(KEY_SIM_SERIAL, serial)
    }

    fn clear(&self) -> Result<(), PreferencesError> {
        self.update(|ini| {
            ini.delete(Some(SECTION));
        })
    }
}

#[derive(Debug, Default, Clone)]
struct Values {
    device_id: Option<String>,
    sim_serial: Option<String>,
}

/// In-memory preferences.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<Values>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preferences pre-populated with a device id.
    pub fn with_device_id(device_id: impl Into<String>) -> Self {
        let prefs = Self::new();
        prefs.values_mut().device_id = Some(device_id.into());
        prefs
    }

    fn values_mut(&self) -> std::sync::MutexGuard<'_, Values> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PreferenceStore for MemoryPreferences {
    fn device_id(&self) -> Result<Option<String>, PreferencesError> {
        Ok(self.values_mut().device_id.clone())
    }

    fn save_device_id(&self, device_id: &str) -> Result<(), PreferencesError> {
        self.values_mut().device_id = Some(device_id.to_string());
        Ok(())
    }

    fn sim_serial(&self) -> Result<Option<String>, PreferencesError> {
        Ok(self.values_mut().sim_serial.clone())
    }

    fn save_sim_serial(&self, serial: &str) -> Result<(), PreferencesError> {
        self.values_mut().sim_serial = Some(serial.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), PreferencesError> {
        *self.values_mut() = Values::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DEVICE: &str = "3f2b8c1e-9a4d-4e7b-8c2a-1d5e6f7a8b9c";

    #[test]
    fn missing_file_has_no_values() {
        let dir = TempDir::new().unwrap();
        let prefs = IniPreferences::new(dir.path().join("preferences.ini"));

        assert_eq!(prefs.device_id().unwrap(), None);
        assert_eq!(prefs.sim_serial().unwrap(), None);
    }

    #[test]
    fn values_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("preferences.ini");

        let prefs = IniPreferences::new(&path);
        prefs.save_device_id(DEVICE).unwrap();
        prefs.save_sim_serial("8949020000012345678").unwrap();

        let reopened = IniPreferences::new(&path);
        assert_eq!(reopened.device_id().unwrap().as_deref(), Some(DEVICE));
        assert_eq!(
            reopened.sim_serial().unwrap().as_deref(),
            Some("8949020000012345678")
        );
    }

    #[test]
    fn saving_one_key_keeps_the_other() {
        let dir = TempDir::new().unwrap();
        let prefs = IniPreferences::new(dir.path().join("preferences.ini"));

        prefs.save_device_id(DEVICE).unwrap();
        prefs.save_sim_serial("A").unwrap();
        prefs.save_sim_serial("B").unwrap();

        assert_eq!(prefs.device_id().unwrap().as_deref(), Some(DEVICE));
        assert_eq!(prefs.sim_serial().unwrap().as_deref(), Some("B"));
    }

    #[test]
    fn clear_removes_everything() {
        let dir = TempDir::new().unwrap();
        let prefs = IniPreferences::new(dir.path().join("preferences.ini"));
        prefs.save_device_id(DEVICE).unwrap();
        prefs.save_sim_serial("A").unwrap();

        prefs.clear().unwrap();

        assert_eq!(prefs.device_id().unwrap(), None);
        assert_eq!(prefs.sim_serial().unwrap(), None);
    }

    #[test]
    fn blank_value_reads_as_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.ini");
        std::fs::write(&path, "[device]\ndevice_id = \n").unwrap();

        let prefs = IniPreferences::new(&path);
        assert_eq!(prefs.device_id().unwrap(), None);
    }

    #[test]
    fn memory_preferences() {
        let prefs = MemoryPreferences::with_device_id(DEVICE);
        assert_eq!(prefs.device_id().unwrap().as_deref(), Some(DEVICE));

        prefs.save_sim_serial("X").unwrap();
        assert_eq!(prefs.sim_serial().unwrap().as_deref(), Some("X"));

        prefs.clear().unwrap();
        assert_eq!(prefs.device_id().unwrap(), None);
    }
}

//! SIM swap detection.
//!
//! When the host reports the SIM as ready, the current serial is compared
//! with the one persisted from the previous check. A differing serial starts
//! a `sim_change` burst and raises an alert. The first serial ever seen is
//! only recorded.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use super::ReportingTriggers;
use crate::preferences::{PreferenceStore, PreferencesError};
use crate::reporting::EVENT_SIM_CHANGE;

/// Message attached to SIM-change alerts.
pub const SIM_CHANGE_MESSAGE: &str = "SIM card has been changed!";

/// Errors reading the SIM serial.
#[derive(Debug, Error)]
pub enum SimReadError {
    /// The host refused access to the serial.
    #[error("permission denied reading SIM serial")]
    Denied,

    #[error("Failed to read SIM serial: {0}")]
    Io(#[source] io::Error),
}

/// Source of the current SIM serial.
pub trait SimReader: Send + Sync {
    /// `Ok(None)` when no SIM is present.
    fn current_serial(&self) -> Result<Option<String>, SimReadError>;
}

/// Reads the serial from a file (e.g. written by a modem helper).
#[derive(Debug, Clone)]
pub struct FileSimReader {
    path: PathBuf,
}

impl FileSimReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SimReader for FileSimReader {
    fn current_serial(&self) -> Result<Option<String>, SimReadError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let serial = raw.trim();
                Ok((!serial.is_empty()).then(|| serial.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(SimReadError::Denied),
            Err(e) => Err(SimReadError::Io(e)),
        }
    }
}

/// Outcome of one SIM check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCheck {
    /// No device id stored, or the serial could not be read.
    Skipped,
    /// No SIM present and none recorded.
    NoSim,
    /// A SIM was recorded but none is present now.
    Removed { previous: String },
    /// First serial recorded.
    FirstSeen(String),
    /// Serial matches the saved one.
    Unchanged,
    /// Serial differs from the saved one.
    Changed { previous: String, current: String },
}

/// Compares the SIM serial against the persisted one.
pub struct SimChangeObserver<T> {
    triggers: T,
    reader: Arc<dyn SimReader>,
    prefs: Arc<dyn PreferenceStore>,
}

impl<T: ReportingTriggers> SimChangeObserver<T> {
    pub fn new(triggers: T, reader: Arc<dyn SimReader>, prefs: Arc<dyn PreferenceStore>) -> Self {
        Self {
            triggers,
            reader,
            prefs,
        }
    }

    /// Run one check after the host reports the SIM as ready.
    ///
    /// A denied read skips this cycle. Preference errors propagate.
    pub fn on_sim_ready(&self) -> Result<SimCheck, PreferencesError> {
        if self.prefs.device_id()?.is_none() {
            tracing::debug!("No device id, skipping SIM check");
            return Ok(SimCheck::Skipped);
        }
        let saved = self.prefs.sim_serial()?;

        let current = match self.reader.current_serial() {
            Ok(current) => current,
            Err(e) => {
                tracing::error!(error = %e, "SIM serial unavailable, skipping check");
                return Ok(SimCheck::Skipped);
            }
        };

        let outcome = match (saved, &current) {
            (None, None) => SimCheck::NoSim,
            (Some(previous), None) => SimCheck::Removed { previous },
            (None, Some(current)) => SimCheck::FirstSeen(current.clone()),
            (Some(saved), Some(current)) if &saved == current => SimCheck::Unchanged,
            (Some(previous), Some(current)) => SimCheck::Changed {
                previous,
                current: current.clone(),
            },
        };

        if matches!(outcome, SimCheck::Changed { .. } | SimCheck::Removed { .. }) {
            tracing::warn!(?outcome, "SIM card changed");
            self.triggers.submit_event(EVENT_SIM_CHANGE);
            self.triggers.raise_alert(EVENT_SIM_CHANGE, SIM_CHANGE_MESSAGE);
        }

        if let Some(current) = current {
            self.prefs.save_sim_serial(&current)?;
        }
        Ok(outcome)
    }
}

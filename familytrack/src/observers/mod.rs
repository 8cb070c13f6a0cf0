//! Host observers that feed triggers into the reporting core.
//!
//! - [`BatteryObserver`] reports the battery level and raises a low-battery
//!   burst and alert at or below the threshold.
//! - [`SimChangeObserver`] compares the SIM serial against the last one seen
//!   and raises a SIM-change burst and alert when it differs.
//! - [`should_start_on_boot`] decides whether reporting starts automatically.
//!
//! Observers talk to the core through [`ReportingTriggers`], which
//! [`ReportingHandle`] implements.

mod battery;
mod boot;
mod sim;

pub use battery::{
    BatteryObserver, BatteryReadError, BatteryReading, BatterySource, SysfsBattery,
    DEFAULT_BATTERY_DEVICE, LOW_BATTERY_MESSAGE, LOW_BATTERY_THRESHOLD,
};
pub use boot::should_start_on_boot;
pub use sim::{FileSimReader, SimCheck, SimChangeObserver, SimReadError, SimReader, SIM_CHANGE_MESSAGE};

use std::sync::Arc;

use crate::reporting::ReportingHandle;

/// The subset of the reporting handle observers need.
pub trait ReportingTriggers: Send + Sync {
    /// Request a burst.
    fn submit_event(&self, reason: &str);

    /// Deliver an alert without a position.
    fn raise_alert(&self, alert_type: &str, message: &str);

    /// Deliver an online status.
    fn report_status(&self, battery_level: Option<u8>);
}

impl ReportingTriggers for ReportingHandle {
    fn submit_event(&self, reason: &str) {
        ReportingHandle::submit_event(self, reason);
    }

    fn raise_alert(&self, alert_type: &str, message: &str) {
        ReportingHandle::raise_alert(self, alert_type, message);
    }

    fn report_status(&self, battery_level: Option<u8>) {
        ReportingHandle::report_status(self, battery_level);
    }
}

impl<T: ReportingTriggers + ?Sized> ReportingTriggers for Arc<T> {
    fn submit_event(&self, reason: &str) {
        (**self).submit_event(reason);
    }

    fn raise_alert(&self, alert_type: &str, message: &str) {
        (**self).raise_alert(alert_type, message);
    }

    fn report_status(&self, battery_level: Option<u8>) {
        (**self).report_status(battery_level);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::ReportingTriggers;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Event(String),
        Alert(String, String),
        Status(Option<u8>),
    }

    #[derive(Debug, Default)]
    pub struct RecordingTriggers {
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingTriggers {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl ReportingTriggers for RecordingTriggers {
        fn submit_event(&self, reason: &str) {
            self.push(Call::Event(reason.to_string()));
        }

        fn raise_alert(&self, alert_type: &str, message: &str) {
            self.push(Call::Alert(alert_type.to_string(), message.to_string()));
        }

        fn report_status(&self, battery_level: Option<u8>) {
            self.push(Call::Status(battery_level));
        }
    }
}

//! Sink adapter - delivery of samples, alerts and status to the backend.
//!
//! Every operation is a single best-effort attempt. The scheduler logs a
//! failed delivery and drops it: there is no retry, queue or local
//! persistence, so delivery is at-most-once. Timeouts, if any, belong to the
//! implementation (see [`RestSink`]).

mod rest;

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use super::model::{AlertRecord, DeviceStatus, LocationSample};
use crate::identity::DeviceId;

pub use rest::{RestSink, RestSinkConfig, DEFAULT_SINK_TIMEOUT};

/// Delivery failures.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The request never got a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend rejected request with status {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        SinkError::Transport(e.to_string())
    }
}

/// Remote store for reporting records.
pub trait Sink: Send + Sync + 'static {
    /// Store one location sample.
    fn report_location(
        &self,
        device_id: &DeviceId,
        sample: &LocationSample,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Store one alert.
    fn report_alert(
        &self,
        device_id: &DeviceId,
        alert: &AlertRecord,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Update the device's battery / online status.
    fn report_status(
        &self,
        device_id: &DeviceId,
        status: &DeviceStatus,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// A single record queued for delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Location(LocationSample),
    Alert(AlertRecord),
    Status(DeviceStatus),
}

impl Delivery {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Delivery::Location(_) => "location",
            Delivery::Alert(_) => "alert",
            Delivery::Status(_) => "status",
        }
    }
}

/// Attempt one delivery and log the outcome. Failures are dropped.
pub async fn deliver<S: Sink>(sink: Arc<S>, device_id: DeviceId, delivery: Delivery) {
    let result = match &delivery {
        Delivery::Location(sample) => sink.report_location(&device_id, sample).await,
        Delivery::Alert(alert) => sink.report_alert(&device_id, alert).await,
        Delivery::Status(status) => sink.report_status(&device_id, status).await,
    };

    match result {
        Ok(()) => match &delivery {
            Delivery::Location(sample) => tracing::debug!(
                lat = sample.latitude,
                lon = sample.longitude,
                event_type = %sample.event_type,
                "Location sent"
            ),
            Delivery::Alert(alert) => {
                tracing::debug!(alert_type = %alert.alert_type, "Alert sent")
            }
            Delivery::Status(status) => tracing::debug!(
                battery = ?status.battery_level,
                online = status.is_online,
                "Status sent"
            ),
        },
        Err(e) => {
            tracing::warn!(
                kind = delivery.kind(),
                device_id = %device_id,
                error = %e,
                "Delivery failed, dropping"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::model::{LocationFix, EVENT_NORMAL};
    use crate::testing::RecordingSink;
    use chrono::Utc;

    fn device() -> DeviceId {
        DeviceId::parse("11111111-1111-1111-1111-111111111111").unwrap()
    }

    #[tokio::test]
    async fn deliver_forwards_to_sink() {
        let sink = Arc::new(RecordingSink::new());
        let sample = LocationSample::from_fix(LocationFix::new(1.0, 2.0), EVENT_NORMAL, Utc::now());

        deliver(sink.clone(), device(), Delivery::Location(sample.clone())).await;

        assert_eq!(sink.locations(), vec![sample]);
    }

    #[tokio::test]
    async fn deliver_swallows_failure() {
        let sink = Arc::new(RecordingSink::new());
        sink.fail_all(true);
        let status = DeviceStatus {
            battery_level: Some(40),
            is_online: true,
            timestamp: Utc::now(),
        };

        deliver(sink.clone(), device(), Delivery::Status(status)).await;

        assert_eq!(sink.failed_attempts(), 1);
        assert!(sink.statuses().is_empty());
    }

    #[tokio::test]
    async fn client_errors_map_to_transport() {
        let e = reqwest::Client::new()
            .get("not a url")
            .send()
            .await
            .unwrap_err();

        assert!(matches!(SinkError::from(e), SinkError::Transport(_)));
    }

    #[test]
    fn delivery_kind_names() {
        let now = Utc::now();
        assert_eq!(
            Delivery::Alert(AlertRecord::new("d", "sos", "m", now)).kind(),
            "alert"
        );
        assert_eq!(
            Delivery::Status(DeviceStatus {
                battery_level: None,
                is_online: true,
                timestamp: now
            })
            .kind(),
            "status"
        );
    }
}

//! PostgREST sink for the hosted FamilyTrack backend.
//!
//! Rows are written to the `locations`, `alerts` and `devices` tables through
//! the backend's REST endpoint using the project API key. A reusable
//! `reqwest::Client` carries the request timeout; the scheduler itself never
//! times out deliveries.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::{Sink, SinkError};
use crate::identity::DeviceId;
use crate::reporting::model::{AlertRecord, DeviceStatus, LocationSample};

/// Default HTTP timeout for a single delivery.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection settings for [`RestSink`].
#[derive(Debug, Clone)]
pub struct RestSinkConfig {
    /// Project base URL, e.g. `https://example.supabase.co`.
    pub base_url: String,

    /// Project API key, sent as both `apikey` and bearer token.
    pub api_key: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl RestSinkConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_SINK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct LocationRow<'a> {
    device_id: &'a str,
    latitude: f64,
    longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    accuracy: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f32>,
    event_type: &'a str,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct AlertRow<'a> {
    device_id: &'a str,
    alert_type: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    longitude: Option<f64>,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct DeviceStatusPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    battery_level: Option<u8>,
    is_online: bool,
    last_seen: String,
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// HTTP sink writing to a PostgREST endpoint.
pub struct RestSink {
    http: reqwest::Client,
    rest_url: String,
    api_key: String,
}

impl RestSink {
    /// Build the sink and its HTTP client.
    pub fn new(config: RestSinkConfig) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", config.base_url.trim_end_matches('/')),
            api_key: config.api_key,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
    }

    async fn check(response: reqwest::Response) -> Result<(), SinkError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SinkError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl Sink for RestSink {
    async fn report_location(
        &self,
        device_id: &DeviceId,
        sample: &LocationSample,
    ) -> Result<(), SinkError> {
        let row = LocationRow {
            device_id: device_id.as_str(),
            latitude: sample.latitude,
            longitude: sample.longitude,
            accuracy: sample.accuracy,
            speed: sample.speed,
            event_type: &sample.event_type,
            created_at: timestamp(&sample.timestamp),
        };

        let response = self
            .authorized(self.http.post(self.table_url("locations")))
            .json(&row)
            .send()
            .await?;
        Self::check(response).await
    }

    async fn report_alert(&self, device_id: &DeviceId, alert: &AlertRecord) -> Result<(), SinkError> {
        let row = AlertRow {
            device_id: device_id.as_str(),
            alert_type: &alert.alert_type,
            message: &alert.message,
            latitude: alert.latitude,
            longitude: alert.longitude,
            created_at: timestamp(&alert.timestamp),
        };

        let response = self
            .authorized(self.http.post(self.table_url("alerts")))
            .json(&row)
            .send()
            .await?;
        Self::check(response).await
    }

    async fn report_status(
        &self,
        device_id: &DeviceId,
        status: &DeviceStatus,
    ) -> Result<(), SinkError> {
        let patch = DeviceStatusPatch {
            battery_level: status.battery_level,
            is_online: status.is_online,
            last_seen: timestamp(&status.timestamp),
        };

        let response = self
            .authorized(self.http.patch(self.table_url("devices")))
            .query(&[("id", format!("eq.{}", device_id))])
            .json(&patch)
            .send()
            .await?;
        Self::check(response).await
    }
}

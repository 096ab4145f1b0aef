//! # Telemetry Sink
//!
//! Coarse usage events. `track` never blocks and never fails; delivery
//! problems are logged and dropped.

use chrono::{DateTime, Utc};
use devstate_devfile::api::TelemetrySettings;
use devstate_devfile::SectionKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Default Segment-compatible collector
pub const DEFAULT_TELEMETRY_ENDPOINT: &str = "https://api.segment.io";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    pub name: String,
    pub properties: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn page(name: &str) -> Self {
        Self::new("page").with("name", name)
    }

    /// `"<kind> created"` and friends
    pub fn section(kind: SectionKind, action: SectionAction) -> Self {
        Self::new(format!("{} {}", kind.as_str(), action.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionAction {
    Created,
    Updated,
    Deleted,
}

impl SectionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionAction::Created => "created",
            SectionAction::Updated => "updated",
            SectionAction::Deleted => "deleted",
        }
    }
}

pub trait TelemetrySink: Send + Sync {
    fn track(&self, event: TelemetryEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn track(&self, _event: TelemetryEvent) {}
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingSink {
    pub fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn track(&self, event: TelemetryEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TrackCall<'a> {
    user_id: &'a str,
    event: &'a str,
    properties: &'a BTreeMap<String, String>,
    timestamp: &'a DateTime<Utc>,
}

/// Posts each event to a Segment-compatible `/v1/track` endpoint
#[derive(Debug, Clone)]
pub struct SegmentSink {
    client: reqwest::Client,
    endpoint: String,
    write_key: String,
    user_id: String,
}

impl SegmentSink {
    pub fn new(endpoint: impl Into<String>, write_key: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            write_key: write_key.into(),
            user_id: user_id.into(),
        }
    }
}

impl TelemetrySink for SegmentSink {
    fn track(&self, event: TelemetryEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(event = %event.name, "No runtime, telemetry event dropped");
            return;
        };

        let request = self
            .client
            .post(format!("{}/v1/track", self.endpoint.trim_end_matches('/')))
            .basic_auth(&self.write_key, Some(""))
            .json(&TrackCall {
                user_id: &self.user_id,
                event: &event.name,
                properties: &event.properties,
                timestamp: &event.timestamp,
            });

        runtime.spawn(async move {
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::debug!(status = %response.status(), "Telemetry endpoint refused event");
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "Telemetry event not delivered"),
            }
        });
    }
}

/// Sink matching the service's telemetry settings
pub fn sink_from_settings(settings: &TelemetrySettings, endpoint: &str) -> Arc<dyn TelemetrySink> {
    if settings.enabled && !settings.apikey.is_empty() {
        Arc::new(SegmentSink::new(endpoint, &settings.apikey, &settings.userid))
    } else {
        Arc::new(NoopSink)
    }
}

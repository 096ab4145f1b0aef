//! # Backend Gateway
//!
//! Client side of the document service. [`BackendGateway`] is the seam the
//! rest of the editor depends on; [`HttpGateway`] talks HTTP/JSON to the
//! service and reads its server-sent notification stream.

use async_trait::async_trait;
use devstate_devfile::api::{
    CommandMove, ContentBody, ErrorBody, EventUpdate, QuantityRequest, SetDefaultRequest,
    TelemetrySettings, API_PREFIX, DEVFILE_UPDATED_EVENT,
};
use devstate_devfile::{
    Command, Container, DevfileContent, Events, Image, Metadata, Resource, SectionKind, Volume,
};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Out-of-band change pushed by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    DevfileUpdated { content: String },
}

/// A section value sent to the create and patch endpoints
#[derive(Debug, Clone, PartialEq)]
pub enum SectionValue {
    Metadata(Metadata),
    Container(Container),
    Image(Image),
    Resource(Resource),
    Volume(Volume),
    Command(Command),
    Events(Events),
}

impl SectionValue {
    pub fn kind(&self) -> SectionKind {
        match self {
            SectionValue::Metadata(_) => SectionKind::Metadata,
            SectionValue::Container(_) => SectionKind::Container,
            SectionValue::Image(_) => SectionKind::Image,
            SectionValue::Resource(_) => SectionKind::Resource,
            SectionValue::Volume(_) => SectionKind::Volume,
            SectionValue::Command(command) => command.kind(),
            SectionValue::Events(_) => SectionKind::Events,
        }
    }

    /// Identifier of the entity; metadata and events have none
    pub fn name(&self) -> Option<&str> {
        match self {
            SectionValue::Metadata(_) | SectionValue::Events(_) => None,
            SectionValue::Container(v) => Some(&v.name),
            SectionValue::Image(v) => Some(&v.name),
            SectionValue::Resource(v) => Some(&v.name),
            SectionValue::Volume(v) => Some(&v.name),
            SectionValue::Command(v) => Some(&v.name),
        }
    }
}

#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Raw text of the devfile on disk
    async fn fetch_devfile(&self) -> GatewayResult<String>;

    async fn save_devfile(&self, content: &str) -> GatewayResult<()>;

    async fn get_devstate(&self) -> GatewayResult<DevfileContent>;

    async fn set_devstate(&self, content: &str) -> GatewayResult<DevfileContent>;

    async fn clear_devstate(&self) -> GatewayResult<DevfileContent>;

    async fn create_section(&self, value: &SectionValue) -> GatewayResult<DevfileContent>;

    async fn patch_section(&self, value: &SectionValue) -> GatewayResult<DevfileContent>;

    async fn delete_section(&self, kind: SectionKind, name: &str) -> GatewayResult<DevfileContent>;

    async fn move_command(&self, name: &str, request: &CommandMove) -> GatewayResult<DevfileContent>;

    async fn set_default_command(&self, name: &str, group: &str) -> GatewayResult<DevfileContent>;

    async fn unset_default_command(&self, name: &str) -> GatewayResult<DevfileContent>;

    async fn update_event(&self, event: &str, commands: &[String]) -> GatewayResult<DevfileContent>;

    async fn validate_quantity(&self, value: &str) -> GatewayResult<bool>;

    async fn telemetry_settings(&self) -> GatewayResult<TelemetrySettings>;

    /// Endless stream of notifications; transport failures only show up as gaps
    fn subscribe_notifications(&self) -> BoxStream<'static, Notification>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Service origin, e.g. `http://127.0.0.1:20000`
    pub base_url: String,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:20000".to_string(),
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.config.base_url.trim_end_matches('/'),
            API_PREFIX,
            path
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> GatewayResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .map(|e| e.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> GatewayResult<DevfileContent> {
        self.send(self.request(method, path).json(body)).await
    }
}

fn section_body(value: &SectionValue) -> GatewayResult<serde_json::Value> {
    Ok(match value {
        SectionValue::Metadata(v) => serde_json::to_value(v)?,
        SectionValue::Container(v) => serde_json::to_value(v)?,
        SectionValue::Image(v) => serde_json::to_value(v)?,
        SectionValue::Resource(v) => serde_json::to_value(v)?,
        SectionValue::Volume(v) => serde_json::to_value(v)?,
        SectionValue::Command(v) => serde_json::to_value(v)?,
        SectionValue::Events(v) => serde_json::to_value(v)?,
    })
}

/// Collection path for a kind, e.g. `/devstate/execCommand`
fn section_path(kind: SectionKind) -> String {
    format!("/devstate/{}", kind.as_str())
}

fn segment(name: &str) -> String {
    name.replace('%', "%25").replace('/', "%2F")
}

#[async_trait]
impl BackendGateway for HttpGateway {
    async fn fetch_devfile(&self) -> GatewayResult<String> {
        let body: ContentBody = self.send(self.request(Method::GET, "/devfile")).await?;
        Ok(body.content)
    }

    async fn save_devfile(&self, content: &str) -> GatewayResult<()> {
        let body = ContentBody {
            content: content.to_string(),
        };
        let _: serde_json::Value = self
            .send(self.request(Method::PUT, "/devfile").json(&body))
            .await?;
        Ok(())
    }

    async fn get_devstate(&self) -> GatewayResult<DevfileContent> {
        self.send(self.request(Method::GET, "/devstate/devfile")).await
    }

    async fn set_devstate(&self, content: &str) -> GatewayResult<DevfileContent> {
        let body = ContentBody {
            content: content.to_string(),
        };
        self.send_json(Method::PUT, "/devstate/devfile", &body).await
    }

    async fn clear_devstate(&self) -> GatewayResult<DevfileContent> {
        self.send(self.request(Method::DELETE, "/devstate/devfile")).await
    }

    async fn create_section(&self, value: &SectionValue) -> GatewayResult<DevfileContent> {
        match value {
            SectionValue::Metadata(_) | SectionValue::Events(_) => self.patch_section(value).await,
            _ => {
                let body = section_body(value)?;
                self.send_json(Method::POST, &section_path(value.kind()), &body)
                    .await
            }
        }
    }

    async fn patch_section(&self, value: &SectionValue) -> GatewayResult<DevfileContent> {
        match value {
            SectionValue::Metadata(_) => {
                let body = section_body(value)?;
                self.send_json(Method::PUT, "/devstate/metadata", &body).await
            }
            // all four lists in one request, so a failure changes none of them
            SectionValue::Events(events) => {
                self.send_json(Method::PUT, "/devstate/events/all", events).await
            }
            _ => {
                let body = section_body(value)?;
                let name = value.name().unwrap_or_default();
                let path = format!("{}/{}", section_path(value.kind()), segment(name));
                self.send_json(Method::PATCH, &path, &body).await
            }
        }
    }

    async fn delete_section(&self, kind: SectionKind, name: &str) -> GatewayResult<DevfileContent> {
        let collection = if kind.is_command() {
            "/devstate/command".to_string()
        } else {
            section_path(kind)
        };
        let path = format!("{}/{}", collection, segment(name));
        self.send(self.request(Method::DELETE, &path)).await
    }

    async fn move_command(&self, name: &str, request: &CommandMove) -> GatewayResult<DevfileContent> {
        let path = format!("/devstate/command/{}/move", segment(name));
        self.send_json(Method::POST, &path, request).await
    }

    async fn set_default_command(&self, name: &str, group: &str) -> GatewayResult<DevfileContent> {
        let path = format!("/devstate/command/{}/setDefault", segment(name));
        let body = SetDefaultRequest {
            group: group.to_string(),
        };
        self.send_json(Method::POST, &path, &body).await
    }

    async fn unset_default_command(&self, name: &str) -> GatewayResult<DevfileContent> {
        let path = format!("/devstate/command/{}/unsetDefault", segment(name));
        self.send(self.request(Method::POST, &path)).await
    }

    async fn update_event(&self, event: &str, commands: &[String]) -> GatewayResult<DevfileContent> {
        let body = EventUpdate {
            event_name: event.to_string(),
            commands: commands.to_vec(),
        };
        self.send_json(Method::PUT, "/devstate/events", &body).await
    }

    async fn validate_quantity(&self, value: &str) -> GatewayResult<bool> {
        let body = QuantityRequest {
            quantity: value.to_string(),
        };
        let response = self
            .request(Method::POST, "/devstate/quantityValid")
            .json(&body)
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    async fn telemetry_settings(&self) -> GatewayResult<TelemetrySettings> {
        self.send(self.request(Method::GET, "/telemetry")).await
    }

    fn subscribe_notifications(&self) -> BoxStream<'static, Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(pump_notifications(
            self.client.clone(),
            self.url("/notifications"),
            self.config.clone(),
            tx,
        ));
        UnboundedReceiverStream::new(rx).boxed()
    }
}

/// Keeps an SSE connection open, reconnecting with exponential backoff,
/// until the receiving side is dropped.
async fn pump_notifications(
    client: reqwest::Client,
    url: String,
    config: GatewayConfig,
    tx: mpsc::UnboundedSender<Notification>,
) {
    let mut delay = config.reconnect_initial;

    loop {
        if tx.is_closed() {
            return;
        }

        let response = match client
            .get(&url)
            .header("Accept", "text/event-stream")
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Notification subscription refused, will retry");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(config.reconnect_max);
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Notification subscription failed, will retry");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(config.reconnect_max);
                continue;
            }
        };

        tracing::debug!(url = %url, "Notification stream connected");
        delay = config.reconnect_initial;

        let mut parser = SseParser::default();
        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    tracing::debug!("Notification subscriber gone, closing stream");
                    return;
                }
                next = stream.next() => next,
            };
            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Notification stream interrupted");
                    break;
                }
                None => break,
            };
            for event in parser.feed(&chunk) {
                if let Some(notification) = event.into_notification() {
                    if tx.send(notification).is_err() {
                        return;
                    }
                }
            }
        }

        tracing::warn!("Notification stream closed, will reconnect");
        tokio::select! {
            _ = tx.closed() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(config.reconnect_max);
    }
}

/// One dispatched server-sent event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

impl SseEvent {
    fn into_notification(self) -> Option<Notification> {
        if self.event != DEVFILE_UPDATED_EVENT {
            return None;
        }
        match serde_json::from_str::<ContentBody>(&self.data) {
            Ok(body) => Some(Notification::DevfileUpdated {
                content: body.content,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed notification payload");
                None
            }
        }
    }
}

/// Incremental `text/event-stream` decoder. Bytes are buffered until a
/// whole line is available, so characters split across chunks survive.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: String,
    data: Vec<String>,
}

impl SseParser {
    /// Feed a chunk; returns the events completed by it
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = match String::from_utf8(raw) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping non UTF-8 event stream line");
                    continue;
                }
            };
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(SseEvent {
                        event: std::mem::take(&mut self.event),
                        data: self.data.join("\n"),
                    });
                    self.data.clear();
                } else {
                    self.event.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = value.to_string(),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }

        events
    }
}

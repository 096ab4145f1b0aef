//! # HTTP surface
//!
//! JSON routes under `/api/v1`. Every `/devstate` mutation answers with the
//! full [`DevfileContent`]; failures answer `{"message": "..."}` with a 4xx
//! or 5xx status. `/notifications` is a server-sent event stream carrying
//! `DevfileUpdated` whenever the devfile changes on disk.

use crate::config::ServerConfig;
use crate::state::{DevfileState, StateError, StateResult};
use crate::watcher::{watch_devfile, EchoGuard, WatcherResult};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use devstate_common::{CommonError, FileSystem};
use devstate_devfile::api::{
    CommandMove, ContentBody, ErrorBody, EventUpdate, QuantityRequest, SetDefaultRequest,
    TelemetrySettings, API_PREFIX, DEVFILE_UPDATED_EVENT,
};
use devstate_devfile::{
    is_valid_quantity, Command, Container, DevfileContent, DevfileError, Events, Image, Metadata,
    Resource, SectionKind, Volume,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;

/// Buffered notifications per subscriber before it starts lagging
const NOTIFICATION_CAPACITY: usize = 16;

#[derive(Clone)]
pub struct DevstateServer {
    inner: Arc<Shared>,
}

struct Shared {
    root_dir: PathBuf,
    config: ServerConfig,
    fs: Arc<dyn FileSystem>,
    state: Mutex<DevfileState>,
    notifications: broadcast::Sender<String>,
    echo: EchoGuard,
}

impl DevstateServer {
    pub fn new(root_dir: PathBuf, config: ServerConfig, fs: Arc<dyn FileSystem>) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            inner: Arc::new(Shared {
                root_dir,
                config,
                fs,
                state: Mutex::new(DevfileState::new()),
                notifications,
                echo: EchoGuard::default(),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn devfile_path(&self) -> PathBuf {
        self.inner.root_dir.join(&self.inner.config.devfile_path)
    }

    pub fn echo_guard(&self) -> EchoGuard {
        self.inner.echo.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.inner.notifications.subscribe()
    }

    /// Push new devfile content to every notification subscriber; returns
    /// how many received it
    pub fn broadcast(&self, content: String) -> usize {
        self.inner.notifications.send(content).unwrap_or(0)
    }

    /// Forward on-disk changes of the devfile to subscribers
    pub fn watch(&self) -> WatcherResult<()> {
        let server = self.clone();
        watch_devfile(self.devfile_path(), self.echo_guard(), move |content| {
            let receivers = server.broadcast(content);
            tracing::debug!(receivers, "Devfile update broadcast");
        })
    }

    async fn apply(
        &self,
        mutation: impl FnOnce(&mut DevfileState) -> StateResult<DevfileContent>,
    ) -> ApiResult<DevfileContent> {
        let mut state = self.inner.state.lock().await;
        Ok(Json(mutation(&mut *state)?))
    }

    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/devfile", get(get_devfile).put(put_devfile))
            .route(
                "/devstate/devfile",
                get(get_devstate).put(put_devstate).delete(clear_devstate),
            )
            .route("/devstate/metadata", put(put_metadata))
            .route("/devstate/events", put(put_events))
            .route("/devstate/events/all", put(put_all_events))
            .route("/devstate/quantityValid", post(quantity_valid))
            .route("/devstate/container", post(add_container))
            .route(
                "/devstate/container/:name",
                patch(patch_container).delete(delete_container),
            )
            .route("/devstate/image", post(add_image))
            .route("/devstate/image/:name", patch(patch_image).delete(delete_image))
            .route("/devstate/resource", post(add_resource))
            .route(
                "/devstate/resource/:name",
                patch(patch_resource).delete(delete_resource),
            )
            .route("/devstate/volume", post(add_volume))
            .route("/devstate/volume/:name", patch(patch_volume).delete(delete_volume))
            .route("/devstate/command/:name", axum::routing::delete(delete_command))
            .route("/devstate/command/:name/move", post(move_command))
            .route("/devstate/command/:name/setDefault", post(set_default))
            .route("/devstate/command/:name/unsetDefault", post(unset_default))
            .route("/telemetry", get(telemetry))
            .route("/notifications", get(notifications))
            .merge(command_routes());

        Router::new()
            .nest(API_PREFIX, api)
            .layer(CorsLayer::permissive())
            .with_state(self.clone())
    }
}

/// Create and patch routes of the four command kinds
fn command_routes() -> Router<DevstateServer> {
    [
        SectionKind::ExecCommand,
        SectionKind::ApplyCommand,
        SectionKind::ImageCommand,
        SectionKind::CompositeCommand,
    ]
    .into_iter()
    .fold(Router::new(), |router, kind| {
        router
            .route(
                &format!("/devstate/{}", kind.as_str()),
                post(move |State(server): State<DevstateServer>, Json(command): Json<Command>| {
                    add_command(server, kind, command)
                }),
            )
            .route(
                &format!("/devstate/{}/:name", kind.as_str()),
                patch(
                    move |State(server): State<DevstateServer>,
                          Path(name): Path<String>,
                          Json(command): Json<Command>| {
                        patch_command(server, kind, name, command)
                    },
                ),
            )
    })
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<StateError> for ApiError {
    fn from(e: StateError) -> Self {
        let status = match &e {
            StateError::Devfile(DevfileError::NotFound { .. }) => StatusCode::NOT_FOUND,
            StateError::Devfile(_) => StatusCode::BAD_REQUEST,
            StateError::Io(CommonError::NotFound(_)) => StatusCode::NOT_FOUND,
            StateError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, message = %self.message, "Request failed");
        } else {
            tracing::debug!(status = %self.status, message = %self.message, "Request rejected");
        }
        (self.status, Json(ErrorBody { message: self.message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Disk
// ============================================================================

/// Missing devfile reads as empty content
async fn get_devfile(State(server): State<DevstateServer>) -> ApiResult<ContentBody> {
    let content = match server.inner.fs.read_to_string(&server.devfile_path()) {
        Ok(content) => content,
        Err(CommonError::NotFound(_)) => String::new(),
        Err(e) => return Err(StateError::from(e).into()),
    };
    Ok(Json(ContentBody { content }))
}

async fn put_devfile(
    State(server): State<DevstateServer>,
    Json(body): Json<ContentBody>,
) -> ApiResult<serde_json::Value> {
    let path = server.devfile_path();
    server.inner.echo.record(&body.content);
    server
        .inner
        .fs
        .write(&path, &body.content)
        .map_err(StateError::from)?;
    tracing::info!(path = %path.display(), "Devfile saved");
    Ok(Json(serde_json::json!({})))
}

// ============================================================================
// Devstate
// ============================================================================

async fn get_devstate(State(server): State<DevstateServer>) -> ApiResult<DevfileContent> {
    server.apply(|state| state.content()).await
}

async fn put_devstate(
    State(server): State<DevstateServer>,
    Json(body): Json<ContentBody>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.set_content(&body.content)).await
}

async fn clear_devstate(State(server): State<DevstateServer>) -> ApiResult<DevfileContent> {
    server.apply(DevfileState::clear).await
}

async fn put_metadata(
    State(server): State<DevstateServer>,
    Json(metadata): Json<Metadata>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.set_metadata(&metadata)).await
}

async fn put_events(
    State(server): State<DevstateServer>,
    Json(update): Json<EventUpdate>,
) -> ApiResult<DevfileContent> {
    server
        .apply(|state| state.update_event(&update.event_name, &update.commands))
        .await
}

async fn put_all_events(
    State(server): State<DevstateServer>,
    Json(events): Json<Events>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.set_events(&events)).await
}

async fn quantity_valid(Json(request): Json<QuantityRequest>) -> ApiResult<serde_json::Value> {
    if is_valid_quantity(&request.quantity) {
        Ok(Json(serde_json::json!({})))
    } else {
        Err(ApiError::bad_request(format!(
            "quantity {:?} is not valid",
            request.quantity
        )))
    }
}

async fn add_container(
    State(server): State<DevstateServer>,
    Json(container): Json<Container>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.add_container(&container)).await
}

async fn patch_container(
    State(server): State<DevstateServer>,
    Path(name): Path<String>,
    Json(container): Json<Container>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.patch_container(&name, &container)).await
}

async fn delete_container(
    State(server): State<DevstateServer>,
    Path(name): Path<String>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.delete_container(&name)).await
}

async fn add_image(
    State(server): State<DevstateServer>,
    Json(image): Json<Image>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.add_image(&image)).await
}

async fn patch_image(
    State(server): State<DevstateServer>,
    Path(name): Path<String>,
    Json(image): Json<Image>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.patch_image(&name, &image)).await
}

async fn delete_image(
    State(server): State<DevstateServer>,
    Path(name): Path<String>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.delete_image(&name)).await
}

async fn add_resource(
    State(server): State<DevstateServer>,
    Json(resource): Json<Resource>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.add_resource(&resource)).await
}

async fn patch_resource(
    State(server): State<DevstateServer>,
    Path(name): Path<String>,
    Json(resource): Json<Resource>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.patch_resource(&name, &resource)).await
}

async fn delete_resource(
    State(server): State<DevstateServer>,
    Path(name): Path<String>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.delete_resource(&name)).await
}

async fn add_volume(
    State(server): State<DevstateServer>,
    Json(volume): Json<Volume>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.add_volume(&volume)).await
}

async fn patch_volume(
    State(server): State<DevstateServer>,
    Path(name): Path<String>,
    Json(volume): Json<Volume>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.patch_volume(&name, &volume)).await
}

async fn delete_volume(
    State(server): State<DevstateServer>,
    Path(name): Path<String>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.delete_volume(&name)).await
}

fn check_command_kind(kind: SectionKind, command: &Command) -> Result<(), ApiError> {
    if command.kind() == kind {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "command {:?} is a {}, not a {}",
            command.name,
            command.kind(),
            kind
        )))
    }
}

async fn add_command(
    server: DevstateServer,
    kind: SectionKind,
    command: Command,
) -> ApiResult<DevfileContent> {
    check_command_kind(kind, &command)?;
    server.apply(|state| state.add_command(&command)).await
}

async fn patch_command(
    server: DevstateServer,
    kind: SectionKind,
    name: String,
    command: Command,
) -> ApiResult<DevfileContent> {
    check_command_kind(kind, &command)?;
    server.apply(|state| state.patch_command(&name, &command)).await
}

async fn delete_command(
    State(server): State<DevstateServer>,
    Path(name): Path<String>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.delete_command(&name)).await
}

async fn move_command(
    State(server): State<DevstateServer>,
    Path(name): Path<String>,
    Json(request): Json<CommandMove>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.move_command(&name, &request)).await
}

async fn set_default(
    State(server): State<DevstateServer>,
    Path(name): Path<String>,
    Json(request): Json<SetDefaultRequest>,
) -> ApiResult<DevfileContent> {
    server
        .apply(|state| state.set_default_command(&name, &request.group))
        .await
}

async fn unset_default(
    State(server): State<DevstateServer>,
    Path(name): Path<String>,
) -> ApiResult<DevfileContent> {
    server.apply(|state| state.unset_default_command(&name)).await
}

// ============================================================================
// Telemetry and notifications
// ============================================================================

async fn telemetry(State(server): State<DevstateServer>) -> Json<TelemetrySettings> {
    Json(server.inner.config.telemetry_settings())
}

async fn notifications(
    State(server): State<DevstateServer>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("Notification subscriber connected");

    let stream = BroadcastStream::new(server.subscribe()).filter_map(|update| {
        let content = match update {
            Ok(content) => content,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Notification subscriber lagged");
                return None;
            }
        };
        match Event::default()
            .event(DEVFILE_UPDATED_EVENT)
            .json_data(ContentBody { content })
        {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode notification");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(server.inner.config.keep_alive())
            .text("ping"),
    )
}

//! Integration tests for the editor crate: the HTTP gateway against a mock
//! service, and editing sessions against an in-memory backend.

use async_trait::async_trait;
use devstate_devfile::api::{CommandMove, TelemetrySettings};
use devstate_devfile::{
    Command, CommandBody, Container, DevfileContent, Events, Image, Resource, SectionKind, Volume,
};
use devstate_editor::forms::{
    BoundForm, ContainerForm, ExecCommandForm, MetadataForm, SectionForm, Submission,
};
use devstate_editor::{
    BackendGateway, Decision, EditorError, ExternalOutcome, GatewayConfig, GatewayError, GatewayResult,
    HttpGateway, Notification, RecordingPrompter, RecordingSink, SectionValue, Session,
};
use futures::stream::BoxStream;
use futures::StreamExt;
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEVFILE: &str = indoc! {r#"
    schemaVersion: 2.2.0
    metadata:
      name: test-devfile
    components:
      - name: c1
        container:
          image: node:18
      - name: v1
        volume: {}
      - name: i1
        image:
          imageName: registry/app
          dockerfile:
            uri: Dockerfile
      - name: r1
        kubernetes:
          inlined: "kind: Pod"
    commands:
      - id: cmd1
        exec:
          component: c1
          commandLine: npm start
"#};

// ---------------------------------------------------------------------------
// HttpGateway against a mock service

fn gateway_for(server: &MockServer) -> HttpGateway {
    gateway_at(server.uri())
}

fn gateway_at(base_url: String) -> HttpGateway {
    HttpGateway::new(GatewayConfig {
        base_url,
        reconnect_initial: Duration::from_millis(20),
        reconnect_max: Duration::from_millis(100),
    })
}

#[tokio::test]
async fn test_fetch_devfile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/devfile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "content": DEVFILE })))
        .mount(&server)
        .await;

    let text = gateway_for(&server).fetch_devfile().await.unwrap();
    assert_eq!(text, DEVFILE);
}

#[tokio::test]
async fn test_create_section_posts_to_kind_collection() {
    let server = MockServer::start().await;
    let content = DevfileContent::parse(DEVFILE).unwrap();
    Mock::given(method("POST"))
        .and(path("/api/v1/devstate/container"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&content))
        .expect(1)
        .mount(&server)
        .await;

    let container = Container {
        name: "c2".to_string(),
        image: "alpine".to_string(),
        ..Default::default()
    };
    let result = gateway_for(&server)
        .create_section(&SectionValue::Container(container))
        .await
        .unwrap();
    assert_eq!(result.metadata.name, "test-devfile");
}

#[tokio::test]
async fn test_service_error_carries_message() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/devstate/volume/v1"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({ "message": "volume \"v1\" is mounted by container \"c1\"" })),
        )
        .mount(&server)
        .await;

    let err = gateway_for(&server)
        .delete_section(SectionKind::Volume, "v1")
        .await
        .unwrap_err();
    match err {
        GatewayError::Status { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "volume \"v1\" is mounted by container \"c1\"");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_command_actions_use_command_paths() {
    let server = MockServer::start().await;
    let content = DevfileContent::parse(DEVFILE).unwrap();
    for route in [
        "/api/v1/devstate/command/cmd1/move",
        "/api/v1/devstate/command/cmd1/setDefault",
        "/api/v1/devstate/command/cmd1/unsetDefault",
    ] {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(&content))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("DELETE"))
        .and(path("/api/v1/devstate/command/cmd1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&content))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let request = CommandMove {
        previous_group: "".to_string(),
        new_group: "run".to_string(),
        previous_index: 0,
        new_index: 0,
    };
    gateway.move_command("cmd1", &request).await.unwrap();
    gateway.set_default_command("cmd1", "run").await.unwrap();
    gateway.unset_default_command("cmd1").await.unwrap();
    gateway.delete_section(SectionKind::ExecCommand, "cmd1").await.unwrap();
}

#[tokio::test]
async fn test_quantity_validation_follows_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/devstate/quantityValid"))
        .and(body_json(serde_json::json!({ "quantity": "512Mi" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/devstate/quantityValid"))
        .and(body_json(serde_json::json!({ "quantity": "lots" })))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({ "message": "invalid" })))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    assert!(gateway.validate_quantity("512Mi").await.unwrap());
    assert!(!gateway.validate_quantity("lots").await.unwrap());
}

#[tokio::test]
async fn test_notifications_delivered_from_event_stream() {
    let server = MockServer::start().await;
    let body = format!(
        ": keep-alive\n\nevent: DevfileUpdated\ndata: {}\n\n",
        serde_json::json!({ "content": "schemaVersion: 2.2.0\n" })
    );
    Mock::given(method("GET"))
        .and(path("/api/v1/notifications"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let mut notifications = gateway_for(&server).subscribe_notifications();
    let first = tokio::time::timeout(Duration::from_secs(5), notifications.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        first,
        Notification::DevfileUpdated {
            content: "schemaVersion: 2.2.0\n".to_string()
        }
    );
}

#[tokio::test]
async fn test_events_patch_is_a_single_request() {
    let server = MockServer::start().await;
    let events = Events {
        pre_start: vec!["init".to_string()],
        post_stop: vec!["cleanup".to_string()],
        ..Default::default()
    };
    Mock::given(method("PUT"))
        .and(path("/api/v1/devstate/events/all"))
        .and(body_json(serde_json::json!({
            "preStart": ["init"],
            "postStart": [],
            "preStop": [],
            "postStop": ["cleanup"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(DevfileContent::default()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/devstate/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(DevfileContent::default()))
        .expect(0)
        .mount(&server)
        .await;

    gateway_for(&server)
        .patch_section(&SectionValue::Events(events))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rejected_events_patch_reports_service_message() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/devstate/events/all"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({ "message": "event preStop references unknown command" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = gateway_for(&server)
        .patch_section(&SectionValue::Events(Events {
            pre_stop: vec!["missing".to_string()],
            ..Default::default()
        }))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Status { status: 400, .. }));
}

const EVENT_STREAM_HEAD: &[u8] =
    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n";

/// Accept one connection and consume its request head
async fn accept_event_stream(listener: &TcpListener) -> TcpStream {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed before request head");
        head.extend_from_slice(&buf[..n]);
    }
    socket.write_all(EVENT_STREAM_HEAD).await.unwrap();
    socket
}

#[tokio::test]
async fn test_notification_survives_character_split_across_packets() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let mut socket = accept_event_stream(&listener).await;
        let body = "event: DevfileUpdated\ndata: {\"content\":\"name: café\"}\n\n".as_bytes();
        let split = body.iter().position(|b| *b == 0xC3).unwrap() + 1;

        socket.write_all(&body[..split]).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        socket.write_all(&body[split..]).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let mut notifications = gateway_at(base_url).subscribe_notifications();
    let first = tokio::time::timeout(Duration::from_secs(5), notifications.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        first,
        Notification::DevfileUpdated {
            content: "name: café".to_string()
        }
    );
}

#[tokio::test]
async fn test_dropping_subscription_closes_idle_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let (connected_tx, connected_rx) = oneshot::channel();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut socket = accept_event_stream(&listener).await;
        socket.write_all(b": ping\n\n").await.unwrap();
        socket.flush().await.unwrap();
        let _ = connected_tx.send(());

        let mut buf = [0u8; 64];
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
        let _ = closed_tx.send(());
    });

    let notifications = gateway_at(base_url).subscribe_notifications();
    tokio::time::timeout(Duration::from_secs(5), connected_rx)
        .await
        .unwrap()
        .unwrap();
    // Let the client read the ping before dropping
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(notifications);

    tokio::time::timeout(Duration::from_secs(5), closed_rx)
        .await
        .expect("connection should close once the subscriber is gone")
        .unwrap();
}

// ---------------------------------------------------------------------------
// Sessions against an in-memory backend

#[derive(Default)]
struct FakeState {
    disk: String,
    content: DevfileContent,
    revision: u32,
    calls: Vec<String>,
    fail_on: Option<String>,
    notifications: Vec<Notification>,
}

impl FakeState {
    fn record(&mut self, call: &str) -> GatewayResult<()> {
        self.calls.push(call.to_string());
        match &self.fail_on {
            Some(name) if call.contains(name.as_str()) => Err(GatewayError::Status {
                status: 500,
                message: format!("{call} failed"),
            }),
            _ => Ok(()),
        }
    }
}

/// Backend that keeps sections in memory without re-serializing YAML; every
/// mutation produces a new revision of the content text.
#[derive(Default)]
struct FakeGateway {
    state: Mutex<FakeState>,
}

impl FakeGateway {
    fn with_disk(disk: &str) -> Arc<Self> {
        let gateway = Self::default();
        gateway.state.lock().unwrap().disk = disk.to_string();
        Arc::new(gateway)
    }

    fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Fail every later call whose description contains `name`
    fn fail_on(&self, name: &str) {
        self.state.lock().unwrap().fail_on = Some(name.to_string());
    }

    fn recover(&self) {
        self.state.lock().unwrap().fail_on = None;
    }

    fn queue(&self, notification: Notification) {
        self.state.lock().unwrap().notifications.push(notification);
    }

    fn disk(&self) -> String {
        self.state.lock().unwrap().disk.clone()
    }

    fn mutate(&self, call: String, edit: impl FnOnce(&mut DevfileContent)) -> GatewayResult<DevfileContent> {
        let mut state = self.state.lock().unwrap();
        state.record(&call)?;
        edit(&mut state.content);
        state.revision += 1;
        state.content.content = format!("{}# revision {}\n", DEVFILE, state.revision);
        Ok(state.content.clone())
    }
}

#[async_trait]
impl BackendGateway for FakeGateway {
    async fn fetch_devfile(&self) -> GatewayResult<String> {
        Ok(self.disk())
    }

    async fn save_devfile(&self, content: &str) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("save".to_string());
        state.disk = content.to_string();
        Ok(())
    }

    async fn get_devstate(&self) -> GatewayResult<DevfileContent> {
        Ok(self.state.lock().unwrap().content.clone())
    }

    async fn set_devstate(&self, content: &str) -> GatewayResult<DevfileContent> {
        let parsed = DevfileContent::parse(content).map_err(|e| GatewayError::Status {
            status: 400,
            message: e.to_string(),
        })?;
        let mut state = self.state.lock().unwrap();
        state.record("set devstate")?;
        state.content = parsed;
        Ok(state.content.clone())
    }

    async fn clear_devstate(&self) -> GatewayResult<DevfileContent> {
        self.set_devstate("schemaVersion: 2.2.0\n").await
    }

    async fn create_section(&self, value: &SectionValue) -> GatewayResult<DevfileContent> {
        let call = format!("create {} {}", value.kind(), value.name().unwrap_or_default());
        let value = value.clone();
        self.mutate(call, move |content| match value {
            SectionValue::Container(v) => content.containers.push(v),
            SectionValue::Image(v) => content.images.push(v),
            SectionValue::Resource(v) => content.resources.push(v),
            SectionValue::Volume(v) => content.volumes.push(v),
            SectionValue::Command(v) => content.commands.push(v),
            SectionValue::Metadata(v) => content.metadata = v,
            SectionValue::Events(v) => content.events = v,
        })
    }

    async fn patch_section(&self, value: &SectionValue) -> GatewayResult<DevfileContent> {
        let call = format!("patch {} {}", value.kind(), value.name().unwrap_or_default());
        let value = value.clone();
        self.mutate(call, move |content| match value {
            SectionValue::Metadata(v) => content.metadata = v,
            SectionValue::Events(v) => content.events = v,
            SectionValue::Container(v) => {
                if let Some(existing) = content.containers.iter_mut().find(|c| c.name == v.name) {
                    *existing = v;
                }
            }
            _ => {}
        })
    }

    async fn delete_section(&self, kind: SectionKind, name: &str) -> GatewayResult<DevfileContent> {
        let target = name.to_string();
        self.mutate(format!("delete {kind} {name}"), move |content| {
            content.volumes.retain(|v| v.name != target);
            content.containers.retain(|c| c.name != target);
            content.commands.retain(|c| c.name != target);
        })
    }

    async fn move_command(&self, name: &str, _request: &CommandMove) -> GatewayResult<DevfileContent> {
        self.mutate(format!("move {name}"), |_| {})
    }

    async fn set_default_command(&self, name: &str, _group: &str) -> GatewayResult<DevfileContent> {
        self.mutate(format!("setDefault {name}"), |_| {})
    }

    async fn unset_default_command(&self, name: &str) -> GatewayResult<DevfileContent> {
        self.mutate(format!("unsetDefault {name}"), |_| {})
    }

    async fn update_event(&self, event: &str, commands: &[String]) -> GatewayResult<DevfileContent> {
        let commands = commands.to_vec();
        let event = event.to_string();
        self.mutate(format!("event {event}"), move |content| {
            if let Some(list) = content.events.get_mut(&event) {
                *list = commands;
            }
        })
    }

    async fn validate_quantity(&self, _value: &str) -> GatewayResult<bool> {
        Ok(true)
    }

    async fn telemetry_settings(&self) -> GatewayResult<TelemetrySettings> {
        Ok(TelemetrySettings::default())
    }

    fn subscribe_notifications(&self) -> BoxStream<'static, Notification> {
        let queued = std::mem::take(&mut self.state.lock().unwrap().notifications);
        futures::stream::iter(queued).boxed()
    }
}

struct Harness {
    gateway: Arc<FakeGateway>,
    prompter: Arc<RecordingPrompter>,
    telemetry: Arc<RecordingSink>,
    session: Session,
}

async fn started() -> Harness {
    let gateway = FakeGateway::with_disk(DEVFILE);
    let prompter = Arc::new(RecordingPrompter::default());
    let telemetry = Arc::new(RecordingSink::default());
    let session = Session::new(gateway.clone(), prompter.clone(), telemetry.clone());
    session.start().await.unwrap();
    Harness {
        gateway,
        prompter,
        telemetry,
        session,
    }
}

#[tokio::test]
async fn test_start_loads_disk_content_unmodified() {
    let h = started().await;
    let store = h.session.store();

    assert_eq!(store.current().unwrap().metadata.name, "test-devfile");
    assert!(!store.is_modified());
    assert_eq!(h.gateway.calls(), vec!["set devstate"]);
}

#[tokio::test]
async fn test_create_container_from_form() {
    let h = started().await;

    let mut form = ContainerForm::new();
    form.load(None);
    form.set_name("created-container").unwrap();
    form.set_image("an-image");

    let content = h.session.submit(form.submit().unwrap()).await.unwrap();

    let created = content.container("created-container").unwrap();
    assert_eq!(created.image, "an-image");
    assert!(h.session.store().is_modified());
    assert_eq!(h.telemetry.names(), vec!["container created"]);
}

#[tokio::test]
async fn test_container_with_new_volume_creates_volume_first() {
    let h = started().await;

    let mut form = ContainerForm::new();
    form.load(None);
    form.set_name("with-cache").unwrap();
    form.set_image("alpine");
    form.add_pending_volume(
        Volume {
            name: "cache".to_string(),
            size: "1Gi".to_string(),
            ..Default::default()
        },
        "/cache",
    )
    .unwrap();

    let content = h.session.submit(form.submit().unwrap()).await.unwrap();

    assert_eq!(
        h.gateway.calls()[1..].to_vec(),
        vec!["create volume cache", "create container with-cache"]
    );
    assert!(content.volume("cache").is_some());
    assert_eq!(content.container("with-cache").unwrap().volume_mounts[0].path, "/cache");
}

#[tokio::test]
async fn test_failed_dependency_aborts_submission() {
    let h = started().await;
    h.gateway.fail_on("bad-container");

    let mut form = ExecCommandForm::new();
    form.load(None);
    form.set_name("run-bad").unwrap();
    form.set_command_line("./run.sh");
    form.set_pending_container(Container {
        name: "bad-container".to_string(),
        image: "alpine".to_string(),
        ..Default::default()
    })
    .unwrap();

    let before = h.session.store().current().unwrap();
    let err = h.session.submit(form.submit().unwrap()).await.unwrap_err();

    assert!(matches!(err, EditorError::Gateway(GatewayError::Status { status: 500, .. })));
    assert_eq!(h.gateway.calls()[1..].to_vec(), vec!["create container bad-container"]);
    assert_eq!(h.session.store().current().unwrap(), before);
}

#[tokio::test]
async fn test_duplicate_names_rejected_before_backend_call() {
    let h = started().await;

    let duplicates = vec![
        SectionValue::Container(Container {
            name: "c1".to_string(),
            image: "x".to_string(),
            ..Default::default()
        }),
        SectionValue::Image(Image {
            name: "i1".to_string(),
            image_name: "x".to_string(),
            ..Default::default()
        }),
        SectionValue::Resource(Resource {
            name: "r1".to_string(),
            inlined: "kind: Pod".to_string(),
            ..Default::default()
        }),
        SectionValue::Volume(Volume {
            name: "v1".to_string(),
            ..Default::default()
        }),
        SectionValue::Command(Command {
            name: "cmd1".to_string(),
            group: String::new(),
            default: false,
            body: CommandBody::Composite(Default::default()),
        }),
    ];

    for value in duplicates {
        let err = h.session.submit(Submission::create(value)).await.unwrap_err();
        assert!(matches!(err, EditorError::Conflict { .. }), "{err}");
    }
    assert_eq!(h.gateway.calls(), vec!["set devstate"]);
}

#[tokio::test]
async fn test_apply_raw_updates_metadata() {
    let h = started().await;
    let text = DEVFILE.replace("name: test-devfile", "name: renamed");

    h.session.apply_raw(&text).await.unwrap();

    assert_eq!(h.session.store().current().unwrap().metadata.name, "renamed");
    assert!(h.session.store().is_modified());
}

#[tokio::test]
async fn test_apply_raw_rejects_malformed_yaml_locally() {
    let h = started().await;

    let err = h.session.apply_raw("schemaVersion: [").await.unwrap_err();

    assert!(matches!(err, EditorError::Devfile(_)));
    assert_eq!(h.gateway.calls(), vec!["set devstate"]);
}

#[tokio::test]
async fn test_delete_unknown_entity_is_conflict() {
    let h = started().await;
    let err = h.session.delete(SectionKind::Volume, "missing").await.unwrap_err();
    assert!(matches!(err, EditorError::Conflict { .. }));

    h.session.delete(SectionKind::ExecCommand, "cmd1").await.unwrap();
    assert!(h.session.store().current().unwrap().command("cmd1").is_none());
}

#[tokio::test]
async fn test_save_writes_disk_and_clears_modified() {
    let h = started().await;
    h.session
        .set_default_command("cmd1", "run")
        .await
        .unwrap();
    assert!(h.session.store().is_modified());

    h.session.save().await.unwrap();

    let current = h.session.store().current().unwrap();
    assert_eq!(h.gateway.disk(), current.content);
    assert!(!h.session.store().is_modified());
    assert!(h.telemetry.names().contains(&"devfile saved".to_string()));
}

#[tokio::test]
async fn test_external_change_over_local_edit_prompts() {
    let h = started().await;
    h.session.unset_default_command("cmd1").await.unwrap();

    let external = DEVFILE.replace("name: test-devfile", "name: from-disk");
    let outcome = h
        .session
        .handle_notification(Notification::DevfileUpdated {
            content: external.clone(),
        })
        .await
        .unwrap();

    let ExternalOutcome::Prompted { id, superseded } = outcome else {
        panic!("expected a prompt, got {outcome:?}");
    };
    assert_eq!(superseded, None);
    assert_eq!(h.prompter.visible(), vec![id]);

    h.session.resolve_prompt(id, Decision::AcceptExternal).await.unwrap();

    let current = h.session.store().current().unwrap();
    assert_eq!(current.metadata.name, "from-disk");
    assert!(!h.session.store().is_modified());
    assert_eq!(h.gateway.calls().last().map(String::as_str), Some("set devstate"));
}

#[tokio::test]
async fn test_notification_stream_applies_clean_updates() {
    let h = started().await;
    let external = DEVFILE.replace("name: test-devfile", "name: from-disk");
    h.gateway.queue(Notification::DevfileUpdated {
        content: "not: [valid".to_string(),
    });
    h.gateway.queue(Notification::DevfileUpdated { content: external });

    h.session.run_notifications().await;

    assert_eq!(h.session.store().current().unwrap().metadata.name, "from-disk");
    assert!(h.prompter.calls().is_empty());
    assert_eq!(h.telemetry.names(), vec!["external update applied"]);
}

#[tokio::test]
async fn test_failed_sync_leaves_clean_store_untouched() {
    let h = started().await;
    let before = h.session.store().current().unwrap();
    let saved = h.session.store().saved_snapshot();
    h.gateway.fail_on("set devstate");

    let external = DEVFILE.replace("name: test-devfile", "name: from-disk");
    let err = h
        .session
        .handle_notification(Notification::DevfileUpdated { content: external.clone() })
        .await
        .unwrap_err();

    assert!(matches!(err, EditorError::Gateway(GatewayError::Status { status: 500, .. })));
    assert_eq!(h.session.store().current().unwrap(), before);
    assert_eq!(h.session.store().saved_snapshot(), saved);
    assert!(!h.session.store().is_modified());
    assert!(h.telemetry.names().is_empty());

    // The same update goes through once the service is back
    h.gateway.recover();
    let outcome = h
        .session
        .handle_notification(Notification::DevfileUpdated { content: external })
        .await
        .unwrap();
    assert_eq!(outcome, ExternalOutcome::Applied);
    assert_eq!(h.session.store().current().unwrap().metadata.name, "from-disk");
}

#[tokio::test]
async fn test_failed_sync_on_accept_keeps_prompt_and_local_edits() {
    let h = started().await;
    h.session.set_default_command("cmd1", "run").await.unwrap();
    let local = h.session.store().current().unwrap();

    let external = DEVFILE.replace("name: test-devfile", "name: from-disk");
    let ExternalOutcome::Prompted { id, .. } = h
        .session
        .handle_notification(Notification::DevfileUpdated { content: external })
        .await
        .unwrap()
    else {
        panic!("expected a prompt");
    };

    h.gateway.fail_on("set devstate");
    let err = h.session.resolve_prompt(id, Decision::AcceptExternal).await.unwrap_err();
    assert!(matches!(err, EditorError::Gateway(_)));
    assert_eq!(h.session.store().current().unwrap(), local);
    assert!(h.session.store().is_modified());
    assert_eq!(h.session.propagator().pending_prompt().map(|p| p.id), Some(id));

    h.gateway.recover();
    h.session.resolve_prompt(id, Decision::AcceptExternal).await.unwrap();
    assert_eq!(h.session.store().current().unwrap().metadata.name, "from-disk");
    assert!(!h.session.store().is_modified());
}

#[tokio::test]
async fn test_failed_events_update_leaves_store_untouched() {
    let h = started().await;
    let before = h.session.store().current().unwrap();
    h.gateway.fail_on("patch events");

    let err = h
        .session
        .submit(Submission::edit(SectionValue::Events(Events {
            pre_start: vec!["cmd1".to_string()],
            post_start: vec!["cmd1".to_string()],
            ..Default::default()
        })))
        .await
        .unwrap_err();

    assert!(matches!(err, EditorError::Gateway(_)));
    assert_eq!(h.session.store().current().unwrap(), before);
    assert_eq!(h.gateway.calls().last().map(String::as_str), Some("patch events "));
}

#[tokio::test]
async fn test_raw_metadata_name_shows_in_metadata_form() {
    let gateway = FakeGateway::with_disk(&DEVFILE.replace("name: test-devfile", "name: before-edit"));
    let session = Session::new(
        gateway,
        Arc::new(RecordingPrompter::default()),
        Arc::new(RecordingSink::default()),
    );
    session.start().await.unwrap();

    session.apply_raw(DEVFILE).await.unwrap();

    let Some(SectionValue::Metadata(metadata)) = session.section(SectionKind::Metadata, "") else {
        panic!("metadata section missing");
    };
    let mut form = MetadataForm::new();
    form.load(Some(&metadata));
    assert_eq!(form.current_value().name, "test-devfile");
}

#[tokio::test]
async fn test_edit_form_loads_entity_from_store() {
    let h = started().await;

    let Some(SectionValue::Container(container)) = h.session.section(SectionKind::Container, "c1") else {
        panic!("container c1 missing");
    };
    let mut form = ContainerForm::new();
    form.load(Some(&container));

    assert_eq!(form.name(), "c1");
    assert_eq!(form.current_value().image, "node:18");
    assert!(matches!(form.set_name("renamed"), Err(EditorError::NameLocked)));

    assert!(h.session.section(SectionKind::Container, "v1").is_none());
    assert!(h.session.section(SectionKind::ExecCommand, "cmd1").is_some());
    assert!(h.session.section(SectionKind::CompositeCommand, "cmd1").is_none());
}

//! # Editing Session
//!
//! Ties the gateway, the propagator and telemetry together for one open
//! devfile.
//!
//! ```text
//! start:        GET /devfile → PUT /devstate/devfile → load_initial
//! raw edit:     parse locally → PUT /devstate/devfile → apply_local
//! form submit:  check against store → dependencies, one by one → value
//! save:         PUT /devfile → save_completed
//! notification: parse → plan → (apply) PUT /devstate/devfile → store
//! ```
//!
//! Every backend mutation returns the full new document, which goes into
//! the store as a local edit. A failed call leaves the store untouched.

use crate::errors::{EditorError, EditorResult};
use crate::forms::{FormMode, Submission};
use crate::gateway::{BackendGateway, Notification, SectionValue};
use crate::propagator::{
    ChangePropagator, ConflictPrompter, Decision, ExternalOutcome, ExternalPlan, PromptId,
};
use crate::store::DocumentStore;
use crate::telemetry::{sink_from_settings, NoopSink, SectionAction, TelemetryEvent, TelemetrySink};
use devstate_devfile::api::CommandMove;
use devstate_devfile::{DevfileContent, SectionKind};
use futures::StreamExt;
use std::sync::Arc;

pub struct Session {
    gateway: Arc<dyn BackendGateway>,
    propagator: ChangePropagator,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Session {
    pub fn new(
        gateway: Arc<dyn BackendGateway>,
        prompter: Arc<dyn ConflictPrompter>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self::with_store(DocumentStore::new(), gateway, prompter, telemetry)
    }

    pub fn with_store(
        store: DocumentStore,
        gateway: Arc<dyn BackendGateway>,
        prompter: Arc<dyn ConflictPrompter>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            gateway,
            propagator: ChangePropagator::new(store, prompter),
            telemetry,
        }
    }

    /// Session whose telemetry follows the service's settings. Failing to
    /// read the settings disables telemetry.
    pub async fn connect(
        gateway: Arc<dyn BackendGateway>,
        prompter: Arc<dyn ConflictPrompter>,
        telemetry_endpoint: &str,
    ) -> Self {
        let telemetry = match gateway.telemetry_settings().await {
            Ok(settings) => sink_from_settings(&settings, telemetry_endpoint),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read telemetry settings, telemetry disabled");
                Arc::new(NoopSink)
            }
        };
        Self::new(gateway, prompter, telemetry)
    }

    pub fn store(&self) -> &DocumentStore {
        self.propagator.store()
    }

    pub fn propagator(&self) -> &ChangePropagator {
        &self.propagator
    }

    pub fn gateway(&self) -> &dyn BackendGateway {
        self.gateway.as_ref()
    }

    pub fn track(&self, event: TelemetryEvent) {
        self.telemetry.track(event);
    }

    /// Load the on-disk devfile into the service and the store
    pub async fn start(&self) -> EditorResult<DevfileContent> {
        let disk = self.gateway.fetch_devfile().await?;
        let content = if disk.trim().is_empty() {
            self.gateway.clear_devstate().await?
        } else {
            self.gateway.set_devstate(&disk).await?
        };
        self.propagator.load_initial(content.clone());
        tracing::info!(name = %content.metadata.name, "Devfile loaded");
        Ok(content)
    }

    /// Replace the whole document with user-typed YAML
    pub async fn apply_raw(&self, text: &str) -> EditorResult<DevfileContent> {
        DevfileContent::parse(text)?;
        let content = self.gateway.set_devstate(text).await?;
        self.propagator.apply_local(content.clone());
        self.track(TelemetryEvent::new("raw devfile applied"));
        Ok(content)
    }

    pub async fn submit(&self, submission: Submission) -> EditorResult<DevfileContent> {
        let current = self.store().current().ok_or(EditorError::NotLoaded)?;
        submission.check(&current)?;

        for dependency in &submission.dependencies {
            tracing::debug!(kind = %dependency.kind(), name = ?dependency.name(), "Creating dependency");
            let content = self.gateway.create_section(dependency).await?;
            self.propagator.apply_local(content);
            self.track(TelemetryEvent::section(dependency.kind(), SectionAction::Created));
        }

        let (content, action) = match submission.mode {
            FormMode::Create => (
                self.gateway.create_section(&submission.value).await?,
                SectionAction::Created,
            ),
            FormMode::Edit => (
                self.gateway.patch_section(&submission.value).await?,
                SectionAction::Updated,
            ),
        };
        self.propagator.apply_local(content.clone());
        self.track(TelemetryEvent::section(submission.value.kind(), action));
        Ok(content)
    }

    pub async fn delete(&self, kind: SectionKind, name: &str) -> EditorResult<DevfileContent> {
        let current = self.store().current().ok_or(EditorError::NotLoaded)?;
        if !current.has_name(kind, name) {
            return Err(EditorError::conflict(name, "does not exist"));
        }
        let content = self.gateway.delete_section(kind, name).await?;
        self.propagator.apply_local(content.clone());
        self.track(TelemetryEvent::section(kind, SectionAction::Deleted));
        Ok(content)
    }

    pub async fn move_command(&self, name: &str, request: &CommandMove) -> EditorResult<DevfileContent> {
        let content = self.gateway.move_command(name, request).await?;
        self.propagator.apply_local(content.clone());
        self.track(
            TelemetryEvent::new("command moved")
                .with("from", request.previous_group.as_str())
                .with("to", request.new_group.as_str()),
        );
        Ok(content)
    }

    pub async fn set_default_command(&self, name: &str, group: &str) -> EditorResult<DevfileContent> {
        let content = self.gateway.set_default_command(name, group).await?;
        self.propagator.apply_local(content.clone());
        Ok(content)
    }

    pub async fn unset_default_command(&self, name: &str) -> EditorResult<DevfileContent> {
        let content = self.gateway.unset_default_command(name).await?;
        self.propagator.apply_local(content.clone());
        Ok(content)
    }

    /// Reset the document to an empty devfile
    pub async fn clear(&self) -> EditorResult<DevfileContent> {
        let content = self.gateway.clear_devstate().await?;
        self.propagator.apply_local(content.clone());
        Ok(content)
    }

    /// Persist the current text to disk
    pub async fn save(&self) -> EditorResult<()> {
        let current = self.store().current().ok_or(EditorError::NotLoaded)?;
        self.gateway.save_devfile(&current.content).await?;
        self.propagator.save_completed(current);
        self.track(TelemetryEvent::new("devfile saved"));
        Ok(())
    }

    /// Apply, prompt for or ignore an external document. The service's
    /// devstate is synced before the store changes, so a failed sync leaves
    /// the store untouched.
    pub async fn handle_notification(&self, notification: Notification) -> EditorResult<ExternalOutcome> {
        let Notification::DevfileUpdated { content: text } = notification;
        let content = DevfileContent::parse(&text)?;

        let outcome = match self.propagator.plan_external(&content) {
            ExternalPlan::Ignore => {
                tracing::debug!("External update matches saved snapshot, ignoring");
                ExternalOutcome::Ignored
            }
            ExternalPlan::Apply => {
                self.gateway.set_devstate(&text).await?;
                self.propagator.apply_external(content);
                self.track(TelemetryEvent::new("external update applied"));
                ExternalOutcome::Applied
            }
            ExternalPlan::Prompt => {
                let outcome = self.propagator.raise_prompt(content);
                self.track(TelemetryEvent::new("external update prompted"));
                outcome
            }
        };
        Ok(outcome)
    }

    /// Answer a prompt. Accepting syncs devstate first; if that fails the
    /// prompt stays pending and the store keeps the local edits.
    pub async fn resolve_prompt(&self, id: PromptId, decision: Decision) -> EditorResult<()> {
        let prompt = self.propagator.prompt(id)?;
        if decision == Decision::AcceptExternal {
            self.gateway.set_devstate(&prompt.content.content).await?;
        }

        if let Err(e) = self.propagator.resolve_prompt(id, decision) {
            // superseded while syncing
            if decision == Decision::AcceptExternal {
                self.resync_devstate().await;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Put the service back in step with the store
    async fn resync_devstate(&self) {
        let Some(current) = self.store().current() else {
            return;
        };
        if let Err(e) = self.gateway.set_devstate(&current.content).await {
            tracing::warn!(error = %e, "Could not restore devstate from the editor");
        }
    }

    /// Process server notifications until the stream ends. Errors on single
    /// notifications are logged and skipped.
    pub async fn run_notifications(&self) {
        let mut notifications = self.gateway.subscribe_notifications();
        while let Some(notification) = notifications.next().await {
            if let Err(e) = self.handle_notification(notification).await {
                tracing::warn!(error = %e, "Dropping external update");
            }
        }
    }

    /// Value currently in the store for a named entity, for loading a form
    pub fn section(&self, kind: SectionKind, name: &str) -> Option<SectionValue> {
        let current = self.store().current()?;
        match kind {
            SectionKind::Container => current.container(name).cloned().map(SectionValue::Container),
            SectionKind::Image => current.image(name).cloned().map(SectionValue::Image),
            SectionKind::Resource => current.resource(name).cloned().map(SectionValue::Resource),
            SectionKind::Volume => current.volume(name).cloned().map(SectionValue::Volume),
            SectionKind::Metadata => Some(SectionValue::Metadata(current.metadata)),
            SectionKind::Events => Some(SectionValue::Events(current.events)),
            _ => current
                .command(name)
                .filter(|c| c.kind() == kind)
                .cloned()
                .map(SectionValue::Command),
        }
    }
}

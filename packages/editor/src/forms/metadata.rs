//! Metadata and event binding forms. Neither has an identifier, so both are
//! always in edit mode.

use super::{
    submit_if_valid, BoundForm, ChangeCallback, FormMode, ListForm, Notifier, SectionForm,
    Submission,
};
use crate::errors::EditorResult;
use crate::gateway::SectionValue;
use devstate_devfile::{Events, Metadata, SectionKind};

#[derive(Default)]
pub struct MetadataForm {
    metadata: Metadata,
    notifier: Notifier<Metadata>,
}

impl MetadataForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edit any metadata field
    pub fn edit(&mut self, edit: impl FnOnce(&mut Metadata)) {
        edit(&mut self.metadata);
        self.notifier.emit(&self.metadata);
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl BoundForm for MetadataForm {
    type Value = Metadata;

    fn load(&mut self, value: Option<&Metadata>) {
        self.metadata = value.cloned().unwrap_or_default();
    }

    fn current_value(&self) -> Metadata {
        self.metadata.clone()
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn on_change(&mut self, callback: ChangeCallback<Metadata>) {
        self.notifier.set(callback);
    }
}

impl SectionForm for MetadataForm {
    fn kind(&self) -> SectionKind {
        SectionKind::Metadata
    }

    fn mode(&self) -> FormMode {
        FormMode::Edit
    }

    fn problems(&self) -> Vec<String> {
        Vec::new()
    }

    fn submit(&self) -> EditorResult<Submission> {
        submit_if_valid(self, || {
            Submission::edit(SectionValue::Metadata(self.current_value()))
        })
    }
}

#[derive(Default)]
pub struct EventsForm {
    pre_start: ListForm<String>,
    post_start: ListForm<String>,
    pre_stop: ListForm<String>,
    post_stop: ListForm<String>,
    notifier: Notifier<Events>,
}

impl EventsForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edit the command list of one event (`preStart`, `postStart`,
    /// `preStop`, `postStop`). Unknown names leave the form untouched.
    pub fn with_event<R>(
        &mut self,
        event: &str,
        edit: impl FnOnce(&mut ListForm<String>) -> R,
    ) -> Option<R> {
        let list = match event {
            "preStart" => &mut self.pre_start,
            "postStart" => &mut self.post_start,
            "preStop" => &mut self.pre_stop,
            "postStop" => &mut self.post_stop,
            _ => return None,
        };
        let result = edit(list);
        self.notifier.emit(&self.current_value());
        Some(result)
    }
}

impl BoundForm for EventsForm {
    type Value = Events;

    fn load(&mut self, value: Option<&Events>) {
        let events = value.cloned().unwrap_or_default();
        self.pre_start.load(Some(&events.pre_start));
        self.post_start.load(Some(&events.post_start));
        self.pre_stop.load(Some(&events.pre_stop));
        self.post_stop.load(Some(&events.post_stop));
    }

    fn current_value(&self) -> Events {
        Events {
            pre_start: self.pre_start.values(),
            post_start: self.post_start.values(),
            pre_stop: self.pre_stop.values(),
            post_stop: self.post_stop.values(),
        }
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn on_change(&mut self, callback: ChangeCallback<Events>) {
        self.notifier.set(callback);
    }
}

impl SectionForm for EventsForm {
    fn kind(&self) -> SectionKind {
        SectionKind::Events
    }

    fn mode(&self) -> FormMode {
        FormMode::Edit
    }

    fn problems(&self) -> Vec<String> {
        Vec::new()
    }

    fn submit(&self) -> EditorResult<Submission> {
        submit_if_valid(self, || {
            Submission::edit(SectionValue::Events(self.current_value()))
        })
    }
}

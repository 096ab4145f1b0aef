//! # Structured Editors
//!
//! One form controller per section kind. Every form (and every list inside a
//! form) implements [`BoundForm`]: it can be loaded from an existing value
//! or started empty, it reports its current value and validity, and it calls
//! back on every change.
//!
//! ```text
//! load(None)          → create mode, name editable
//! load(Some(value))   → edit mode, name locked
//! submit()            → Submission { value, dependencies }   (only when valid)
//! Submission::check() → uniqueness + references against the store content
//! ```
//!
//! Dependencies are entities created inline from the form (a volume from a
//! container form, a container from an exec command form, ...). They are
//! sent to the backend one at a time, in order, before the main value.

pub mod commands;
pub mod components;
pub mod list;
pub mod metadata;
pub mod quantity;

use crate::errors::{EditorError, EditorResult};
use crate::gateway::SectionValue;
use devstate_devfile::{
    is_valid_name, CommandBody, DevfileContent, Events, SectionKind, MAX_NAME_LEN,
};
use std::collections::HashSet;

pub use commands::{
    ApplyCommandForm, CompositeCommandForm, ExecCommandForm, ImageCommandForm, ReferenceCommandForm,
};
pub use components::{ContainerForm, ContainerQuantity, ImageForm, ResourceForm, TriState, VolumeForm};
pub use list::{KeyValue, ListEntry, ListForm};
pub use metadata::{EventsForm, MetadataForm};
pub use quantity::{FieldStatus, QuantityField};

pub type ChangeCallback<T> = Box<dyn Fn(&T) + Send + Sync>;

pub trait BoundForm {
    type Value;

    /// `None` starts an empty form in create mode
    fn load(&mut self, value: Option<&Self::Value>);

    fn current_value(&self) -> Self::Value;

    fn is_valid(&self) -> bool;

    fn on_change(&mut self, callback: ChangeCallback<Self::Value>);
}

/// A top-level form that produces a backend submission
pub trait SectionForm: BoundForm {
    fn kind(&self) -> SectionKind;

    fn mode(&self) -> FormMode;

    /// Human-readable reasons the form is not valid
    fn problems(&self) -> Vec<String>;

    fn submit(&self) -> EditorResult<Submission>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormMode {
    #[default]
    Create,
    Edit,
}

/// Candidate value of a submitted form
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub mode: FormMode,
    pub value: SectionValue,
    /// Entities to create first, in order
    pub dependencies: Vec<SectionValue>,
}

impl Submission {
    pub fn create(value: SectionValue) -> Self {
        Self {
            mode: FormMode::Create,
            value,
            dependencies: Vec::new(),
        }
    }

    pub fn edit(value: SectionValue) -> Self {
        Self {
            mode: FormMode::Edit,
            value,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<SectionValue>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Uniqueness and reference checks against `content`, run before any
    /// backend call.
    pub fn check(&self, content: &DevfileContent) -> EditorResult<()> {
        let mut created_components = HashSet::new();
        let mut created_commands = HashSet::new();

        let creations = self
            .dependencies
            .iter()
            .chain((self.mode == FormMode::Create).then_some(&self.value));
        for value in creations {
            let Some(name) = value.name() else {
                continue;
            };
            let fresh = if value.kind().is_command() {
                created_commands.insert(name)
            } else {
                created_components.insert(name)
            };
            if !fresh || content.has_name(value.kind(), name) {
                return Err(EditorError::conflict(name, "already exists"));
            }
        }

        if self.mode == FormMode::Edit {
            if let Some(name) = self.value.name() {
                if !content.has_name(self.value.kind(), name) {
                    return Err(EditorError::conflict(name, "does not exist"));
                }
            }
        }

        let pending = |kind: SectionKind, name: &str| {
            self.dependencies
                .iter()
                .any(|d| d.kind() == kind && d.name() == Some(name))
        };

        for value in self.dependencies.iter().chain(std::iter::once(&self.value)) {
            match value {
                SectionValue::Container(container) => {
                    for mount in &container.volume_mounts {
                        if content.volume(&mount.name).is_none()
                            && !pending(SectionKind::Volume, &mount.name)
                        {
                            return Err(EditorError::conflict(&mount.name, "is not a volume"));
                        }
                    }
                }
                SectionValue::Command(command) => match &command.body {
                    CommandBody::Exec(exec) => {
                        if content.container(&exec.component).is_none()
                            && !pending(SectionKind::Container, &exec.component)
                        {
                            return Err(EditorError::conflict(&exec.component, "is not a container"));
                        }
                    }
                    CommandBody::Apply(apply) => {
                        if content.resource(&apply.component).is_none()
                            && !pending(SectionKind::Resource, &apply.component)
                        {
                            return Err(EditorError::conflict(&apply.component, "is not a resource"));
                        }
                    }
                    CommandBody::Image(image) => {
                        if content.image(&image.component).is_none()
                            && !pending(SectionKind::Image, &image.component)
                        {
                            return Err(EditorError::conflict(&image.component, "is not an image"));
                        }
                    }
                    CommandBody::Composite(composite) => {
                        for member in &composite.commands {
                            if member == &command.name || content.command(member).is_none() {
                                return Err(EditorError::conflict(member, "is not a command"));
                            }
                        }
                    }
                },
                SectionValue::Events(events) => check_events(content, events)?,
                _ => {}
            }
        }

        Ok(())
    }
}

fn check_events(content: &DevfileContent, events: &Events) -> EditorResult<()> {
    let bound = events
        .pre_start
        .iter()
        .chain(&events.post_start)
        .chain(&events.pre_stop)
        .chain(&events.post_stop);
    for command in bound {
        if content.command(command).is_none() {
            return Err(EditorError::conflict(command, "is not a command"));
        }
    }
    Ok(())
}

/// Identifier field shared by every named form; locked in edit mode
#[derive(Debug, Clone, Default)]
pub struct NameField {
    value: String,
    locked: bool,
}

impl NameField {
    pub fn load(&mut self, name: Option<&str>) {
        match name {
            Some(name) => {
                self.value = name.to_string();
                self.locked = true;
            }
            None => {
                self.value.clear();
                self.locked = false;
            }
        }
    }

    pub fn set(&mut self, name: &str) -> EditorResult<()> {
        if self.locked {
            return Err(EditorError::NameLocked);
        }
        self.value = name.to_string();
        Ok(())
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn mode(&self) -> FormMode {
        if self.locked {
            FormMode::Edit
        } else {
            FormMode::Create
        }
    }

    pub fn problem(&self) -> Option<String> {
        if self.value.is_empty() {
            Some("name is required".to_string())
        } else if !is_valid_name(&self.value) {
            Some(format!(
                "name {:?} must be lower case alphanumeric characters or '-', start and end with an alphanumeric character, at most {} characters",
                self.value, MAX_NAME_LEN
            ))
        } else {
            None
        }
    }
}

/// Holds the optional change callback of a form
pub struct Notifier<T> {
    callback: Option<ChangeCallback<T>>,
}

impl<T> Default for Notifier<T> {
    fn default() -> Self {
        Self { callback: None }
    }
}

impl<T> Notifier<T> {
    pub fn set(&mut self, callback: ChangeCallback<T>) {
        self.callback = Some(callback);
    }

    pub fn emit(&self, value: &T) {
        if let Some(callback) = &self.callback {
            callback(value);
        }
    }
}

impl<T> std::fmt::Debug for Notifier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribed", &self.callback.is_some())
            .finish()
    }
}

/// Shared `submit` body: fail with the problems, or build the submission
pub(crate) fn submit_if_valid<F>(form: &F, build: impl FnOnce() -> Submission) -> EditorResult<Submission>
where
    F: SectionForm + ?Sized,
{
    let problems = form.problems();
    if problems.is_empty() {
        Ok(build())
    } else {
        Err(EditorError::InvalidForm(problems.join("; ")))
    }
}

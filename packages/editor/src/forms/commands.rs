//! Forms for exec, apply, image and composite commands.
//!
//! Group and default flag are not edited here (see command moves on the
//! session); forms carry the loaded values through unchanged.

use super::{
    submit_if_valid, BoundForm, ChangeCallback, FormMode, ListForm, NameField, Notifier,
    SectionForm, Submission,
};
use crate::errors::{EditorError, EditorResult};
use crate::gateway::SectionValue;
use devstate_devfile::{
    Command, CommandBody, ComponentRef, CompositeCommand, Container, ExecCommand, Image, Resource,
    SectionKind,
};

fn submission(mode: FormMode, command: Command, dependency: Option<SectionValue>) -> Submission {
    let value = SectionValue::Command(command);
    let submission = match mode {
        FormMode::Create => Submission::create(value),
        FormMode::Edit => Submission::edit(value),
    };
    submission.with_dependencies(dependency.into_iter().collect())
}

fn check_pending_name(name: &str) -> EditorResult<()> {
    let mut field = NameField::default();
    field.set(name)?;
    match field.problem() {
        Some(problem) => Err(EditorError::InvalidForm(problem)),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Exec

#[derive(Default)]
pub struct ExecCommandForm {
    name: NameField,
    group: String,
    default: bool,
    exec: ExecCommand,
    pending_container: Option<Container>,
    notifier: Notifier<Command>,
}

impl ExecCommandForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: &str) -> EditorResult<()> {
        self.name.set(name)?;
        self.changed();
        Ok(())
    }

    pub fn set_component(&mut self, component: &str) {
        self.exec.component = component.to_string();
        self.pending_container = None;
        self.changed();
    }

    pub fn set_command_line(&mut self, command_line: &str) {
        self.exec.command_line = command_line.to_string();
        self.changed();
    }

    pub fn set_working_dir(&mut self, working_dir: &str) {
        self.exec.working_dir = working_dir.to_string();
        self.changed();
    }

    pub fn set_hot_reload_capable(&mut self, capable: bool) {
        self.exec.hot_reload_capable = capable;
        self.changed();
    }

    /// Create `container` before the command and run the command in it
    pub fn set_pending_container(&mut self, container: Container) -> EditorResult<()> {
        check_pending_name(&container.name)?;
        self.exec.component = container.name.clone();
        self.pending_container = Some(container);
        self.changed();
        Ok(())
    }

    fn changed(&self) {
        self.notifier.emit(&self.current_value());
    }
}

impl BoundForm for ExecCommandForm {
    type Value = Command;

    fn load(&mut self, value: Option<&Command>) {
        self.name.load(value.map(|c| c.name.as_str()));
        self.group = value.map(|c| c.group.clone()).unwrap_or_default();
        self.default = value.is_some_and(|c| c.default);
        self.exec = match value.map(|c| &c.body) {
            Some(CommandBody::Exec(exec)) => exec.clone(),
            _ => ExecCommand::default(),
        };
        self.pending_container = None;
    }

    fn current_value(&self) -> Command {
        Command {
            name: self.name.value().to_string(),
            group: self.group.clone(),
            default: self.default,
            body: CommandBody::Exec(self.exec.clone()),
        }
    }

    fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    fn on_change(&mut self, callback: ChangeCallback<Command>) {
        self.notifier.set(callback);
    }
}

impl SectionForm for ExecCommandForm {
    fn kind(&self) -> SectionKind {
        SectionKind::ExecCommand
    }

    fn mode(&self) -> FormMode {
        self.name.mode()
    }

    fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = self.name.problem().into_iter().collect();
        if self.exec.component.is_empty() {
            problems.push("container is required".to_string());
        }
        if self.exec.command_line.trim().is_empty() {
            problems.push("command line is required".to_string());
        }
        problems
    }

    fn submit(&self) -> EditorResult<Submission> {
        submit_if_valid(self, || {
            submission(
                self.mode(),
                self.current_value(),
                self.pending_container.clone().map(SectionValue::Container),
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Apply and image

/// Form for commands that apply one component: a resource (apply command)
/// or an image (image command)
pub struct ReferenceCommandForm {
    kind: SectionKind,
    name: NameField,
    group: String,
    default: bool,
    component: String,
    pending: Option<SectionValue>,
    notifier: Notifier<Command>,
}

pub type ApplyCommandForm = ReferenceCommandForm;
pub type ImageCommandForm = ReferenceCommandForm;

impl ReferenceCommandForm {
    fn with_kind(kind: SectionKind) -> Self {
        Self {
            kind,
            name: NameField::default(),
            group: String::new(),
            default: false,
            component: String::new(),
            pending: None,
            notifier: Notifier::default(),
        }
    }

    /// Apply command, referencing a Kubernetes/OpenShift resource
    pub fn apply() -> Self {
        Self::with_kind(SectionKind::ApplyCommand)
    }

    /// Image command, referencing an image build
    pub fn image() -> Self {
        Self::with_kind(SectionKind::ImageCommand)
    }

    pub fn set_name(&mut self, name: &str) -> EditorResult<()> {
        self.name.set(name)?;
        self.changed();
        Ok(())
    }

    pub fn set_component(&mut self, component: &str) {
        self.component = component.to_string();
        self.pending = None;
        self.changed();
    }

    /// Only valid on an apply command form
    pub fn set_pending_resource(&mut self, resource: Resource) -> EditorResult<()> {
        if self.kind != SectionKind::ApplyCommand {
            return Err(EditorError::InvalidForm(
                "an image command references an image, not a resource".to_string(),
            ));
        }
        check_pending_name(&resource.name)?;
        self.component = resource.name.clone();
        self.pending = Some(SectionValue::Resource(resource));
        self.changed();
        Ok(())
    }

    /// Only valid on an image command form
    pub fn set_pending_image(&mut self, image: Image) -> EditorResult<()> {
        if self.kind != SectionKind::ImageCommand {
            return Err(EditorError::InvalidForm(
                "an apply command references a resource, not an image".to_string(),
            ));
        }
        check_pending_name(&image.name)?;
        self.component = image.name.clone();
        self.pending = Some(SectionValue::Image(image));
        self.changed();
        Ok(())
    }

    fn changed(&self) {
        self.notifier.emit(&self.current_value());
    }
}

impl BoundForm for ReferenceCommandForm {
    type Value = Command;

    fn load(&mut self, value: Option<&Command>) {
        self.name.load(value.map(|c| c.name.as_str()));
        self.group = value.map(|c| c.group.clone()).unwrap_or_default();
        self.default = value.is_some_and(|c| c.default);
        self.component = value
            .and_then(|c| c.component())
            .unwrap_or_default()
            .to_string();
        self.pending = None;
    }

    fn current_value(&self) -> Command {
        let reference = ComponentRef {
            component: self.component.clone(),
        };
        Command {
            name: self.name.value().to_string(),
            group: self.group.clone(),
            default: self.default,
            body: if self.kind == SectionKind::ImageCommand {
                CommandBody::Image(reference)
            } else {
                CommandBody::Apply(reference)
            },
        }
    }

    fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    fn on_change(&mut self, callback: ChangeCallback<Command>) {
        self.notifier.set(callback);
    }
}

impl SectionForm for ReferenceCommandForm {
    fn kind(&self) -> SectionKind {
        self.kind
    }

    fn mode(&self) -> FormMode {
        self.name.mode()
    }

    fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = self.name.problem().into_iter().collect();
        if self.component.is_empty() {
            problems.push(match self.kind {
                SectionKind::ImageCommand => "image is required".to_string(),
                _ => "resource is required".to_string(),
            });
        }
        problems
    }

    fn submit(&self) -> EditorResult<Submission> {
        submit_if_valid(self, || {
            submission(self.mode(), self.current_value(), self.pending.clone())
        })
    }
}

// ---------------------------------------------------------------------------
// Composite

#[derive(Default)]
pub struct CompositeCommandForm {
    name: NameField,
    group: String,
    default: bool,
    commands: ListForm<String>,
    parallel: bool,
    notifier: Notifier<Command>,
}

impl CompositeCommandForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: &str) -> EditorResult<()> {
        self.name.set(name)?;
        self.changed();
        Ok(())
    }

    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
        self.changed();
    }

    pub fn with_commands<R>(&mut self, edit: impl FnOnce(&mut ListForm<String>) -> R) -> R {
        let result = edit(&mut self.commands);
        self.changed();
        result
    }

    fn changed(&self) {
        self.notifier.emit(&self.current_value());
    }
}

impl BoundForm for CompositeCommandForm {
    type Value = Command;

    fn load(&mut self, value: Option<&Command>) {
        self.name.load(value.map(|c| c.name.as_str()));
        self.group = value.map(|c| c.group.clone()).unwrap_or_default();
        self.default = value.is_some_and(|c| c.default);
        let composite = match value.map(|c| &c.body) {
            Some(CommandBody::Composite(composite)) => composite.clone(),
            _ => CompositeCommand::default(),
        };
        self.commands.load(Some(&composite.commands));
        self.parallel = composite.parallel;
    }

    fn current_value(&self) -> Command {
        Command {
            name: self.name.value().to_string(),
            group: self.group.clone(),
            default: self.default,
            body: CommandBody::Composite(CompositeCommand {
                commands: self.commands.values(),
                parallel: self.parallel,
            }),
        }
    }

    fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    fn on_change(&mut self, callback: ChangeCallback<Command>) {
        self.notifier.set(callback);
    }
}

impl SectionForm for CompositeCommandForm {
    fn kind(&self) -> SectionKind {
        SectionKind::CompositeCommand
    }

    fn mode(&self) -> FormMode {
        self.name.mode()
    }

    fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = self.name.problem().into_iter().collect();
        let members = self.commands.values();
        if members.is_empty() {
            problems.push("at least one command is required".to_string());
        }
        if members.iter().any(|m| m == self.name.value()) {
            problems.push("a composite command cannot include itself".to_string());
        }
        problems
    }

    fn submit(&self) -> EditorResult<Submission> {
        submit_if_valid(self, || submission(self.mode(), self.current_value(), None))
    }
}

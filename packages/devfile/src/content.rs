//! # Devfile content
//!
//! `DevfileContent` is the flattened, editor-facing view of a devfile: the raw
//! YAML text plus one list per section kind. It is what the document service
//! returns from every mutation and what the editor keeps in its store.
//!
//! Sections are always derived together from a single parsed [`Devfile`], so
//! they can never disagree with `content`.

use crate::error::{DevfileError, DevfileResult};
use crate::schema::{
    self, ApplyCommand as SchemaApply, CommandGroup, Component, ComponentKind,
    CompositeCommand as SchemaComposite, ContainerComponent, DevCommand, Devfile, DevfileMetadata,
    DockerfileImage, ExecCommand as SchemaExec, ImageComponent, K8sLikeComponent, VolumeComponent,
};
use crate::validate;
use serde::{Deserialize, Serialize};

pub use crate::schema::{Annotation, Endpoint, EnvVar, VolumeMount};

/// Separator used for list-valued metadata fields (tags, architectures)
pub const LIST_SEPARATOR: &str = ",";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevfileContent {
    pub content: String,
    pub metadata: Metadata,
    pub commands: Vec<Command>,
    pub containers: Vec<Container>,
    pub images: Vec<Image>,
    pub resources: Vec<Resource>,
    pub volumes: Vec<Volume>,
    pub events: Events,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub name: String,
    pub version: String,
    pub display_name: String,
    pub description: String,
    pub tags: String,
    pub architectures: String,
    pub icon: String,
    pub global_memory_limit: String,
    pub project_type: String,
    pub language: String,
    pub website: String,
    pub provider: String,
    pub support_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub name: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub default: bool,
    #[serde(flatten)]
    pub body: CommandBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CommandBody {
    Exec(ExecCommand),
    Apply(ComponentRef),
    Image(ComponentRef),
    Composite(CompositeCommand),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecCommand {
    pub component: String,
    pub command_line: String,
    pub working_dir: String,
    pub hot_reload_capable: bool,
}

/// Payload of apply and image commands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentRef {
    pub component: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeCommand {
    pub commands: Vec<String>,
    pub parallel: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Container {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub env: Vec<EnvVar>,
    pub volume_mounts: Vec<VolumeMount>,
    pub memory_request: String,
    pub memory_limit: String,
    pub cpu_request: String,
    pub cpu_limit: String,
    pub endpoints: Vec<Endpoint>,
    pub configure_sources: bool,
    pub mount_sources: bool,
    pub source_mapping: String,
    pub annotation: Annotation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Image {
    pub name: String,
    pub image_name: String,
    pub args: Vec<String>,
    pub build_context: String,
    pub root_required: bool,
    pub uri: String,
    /// `""`, `"always"` or `"never"`
    pub auto_build: String,
    pub orphan: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Resource {
    pub name: String,
    pub inlined: String,
    pub uri: String,
    /// `""`, `"always"` or `"never"`
    pub deploy_by_default: String,
    pub orphan: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Volume {
    pub name: String,
    pub ephemeral: bool,
    pub size: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Events {
    pub pre_start: Vec<String>,
    pub post_start: Vec<String>,
    pub pre_stop: Vec<String>,
    pub post_stop: Vec<String>,
}

/// Every editable section kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    Metadata,
    Container,
    Image,
    Resource,
    Volume,
    ExecCommand,
    ApplyCommand,
    ImageCommand,
    CompositeCommand,
    Events,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Metadata => "metadata",
            SectionKind::Container => "container",
            SectionKind::Image => "image",
            SectionKind::Resource => "resource",
            SectionKind::Volume => "volume",
            SectionKind::ExecCommand => "execCommand",
            SectionKind::ApplyCommand => "applyCommand",
            SectionKind::ImageCommand => "imageCommand",
            SectionKind::CompositeCommand => "compositeCommand",
            SectionKind::Events => "events",
        }
    }

    pub fn is_command(&self) -> bool {
        matches!(
            self,
            SectionKind::ExecCommand
                | SectionKind::ApplyCommand
                | SectionKind::ImageCommand
                | SectionKind::CompositeCommand
        )
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DevfileContent {
    /// Parse and validate raw YAML. `content` keeps the text as given.
    pub fn parse(text: &str) -> DevfileResult<Self> {
        let devfile = Devfile::from_yaml(text)?;
        validate::validate(&devfile)?;
        let mut content = Self::derive_sections(&devfile)?;
        content.content = text.to_string();
        Ok(content)
    }

    /// Serialize a devfile and derive its sections
    pub fn from_devfile(devfile: &Devfile) -> DevfileResult<Self> {
        let mut content = Self::derive_sections(devfile)?;
        content.content = devfile.to_yaml()?;
        Ok(content)
    }

    fn derive_sections(devfile: &Devfile) -> DevfileResult<Self> {
        let commands = devfile
            .commands
            .iter()
            .map(|c| Command::from_schema(c, devfile))
            .collect::<DevfileResult<Vec<_>>>()?;

        let containers = devfile
            .components
            .iter()
            .filter_map(|c| c.container.as_ref().map(|inner| Container::from_schema(&c.name, inner)))
            .collect();

        let images = devfile
            .components
            .iter()
            .filter_map(|c| {
                c.image.as_ref().map(|inner| {
                    let orphan = !is_applied(devfile, &c.name);
                    Image::from_schema(&c.name, inner, orphan)
                })
            })
            .collect();

        let resources = devfile
            .components
            .iter()
            .filter_map(|c| {
                c.k8s_like().map(|inner| {
                    let orphan = !is_applied(devfile, &c.name);
                    Resource::from_schema(&c.name, inner, orphan)
                })
            })
            .collect();

        let volumes = devfile
            .components
            .iter()
            .filter_map(|c| c.volume.as_ref().map(|inner| Volume::from_schema(&c.name, inner)))
            .collect();

        Ok(Self {
            content: String::new(),
            metadata: Metadata::from_schema(&devfile.metadata),
            commands,
            containers,
            images,
            resources,
            volumes,
            events: Events::from_schema(&devfile.events()),
        })
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.name == name)
    }

    pub fn image(&self, name: &str) -> Option<&Image> {
        self.images.iter().find(|c| c.name == name)
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|c| c.name == name)
    }

    pub fn volume(&self, name: &str) -> Option<&Volume> {
        self.volumes.iter().find(|c| c.name == name)
    }

    /// Names of every component, whatever its kind
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.containers
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.images.iter().map(|c| c.name.as_str()))
            .chain(self.resources.iter().map(|c| c.name.as_str()))
            .chain(self.volumes.iter().map(|c| c.name.as_str()))
    }

    /// Whether an entity of `kind` named `name` already exists.
    /// Component kinds share one namespace, command kinds another.
    pub fn has_name(&self, kind: SectionKind, name: &str) -> bool {
        match kind {
            SectionKind::Metadata | SectionKind::Events => false,
            k if k.is_command() => self.command(name).is_some(),
            _ => self.component_names().any(|n| n == name),
        }
    }
}

/// Whether any apply command references the component
fn is_applied(devfile: &Devfile, component: &str) -> bool {
    devfile
        .commands
        .iter()
        .filter_map(|c| c.apply.as_ref())
        .any(|a| a.component == component)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn tri_state_from(value: Option<bool>) -> String {
    match value {
        Some(true) => "always".to_string(),
        Some(false) => "never".to_string(),
        None => String::new(),
    }
}

fn tri_state_to(value: &str) -> Option<bool> {
    match value {
        "always" => Some(true),
        "never" => Some(false),
        _ => None,
    }
}

fn non_default(value: bool) -> Option<bool> {
    value.then_some(true)
}

impl Metadata {
    pub fn from_schema(metadata: &DevfileMetadata) -> Self {
        Self {
            name: metadata.name.clone(),
            version: metadata.version.clone(),
            display_name: metadata.display_name.clone(),
            description: metadata.description.clone(),
            tags: metadata.tags.join(LIST_SEPARATOR),
            architectures: metadata.architectures.join(LIST_SEPARATOR),
            icon: metadata.icon.clone(),
            global_memory_limit: metadata.global_memory_limit.clone(),
            project_type: metadata.project_type.clone(),
            language: metadata.language.clone(),
            website: metadata.website.clone(),
            provider: metadata.provider.clone(),
            support_url: metadata.support_url.clone(),
        }
    }

    /// Overwrite the typed fields, keeping unknown keys
    pub fn apply_to(&self, metadata: &mut DevfileMetadata) {
        metadata.name = self.name.clone();
        metadata.version = self.version.clone();
        metadata.display_name = self.display_name.clone();
        metadata.description = self.description.clone();
        metadata.tags = split_list(&self.tags);
        metadata.architectures = split_list(&self.architectures);
        metadata.icon = self.icon.clone();
        metadata.global_memory_limit = self.global_memory_limit.clone();
        metadata.project_type = self.project_type.clone();
        metadata.language = self.language.clone();
        metadata.website = self.website.clone();
        metadata.provider = self.provider.clone();
        metadata.support_url = self.support_url.clone();
    }
}

impl Command {
    fn from_schema(command: &DevCommand, devfile: &Devfile) -> DevfileResult<Self> {
        let body = if let Some(exec) = &command.exec {
            CommandBody::Exec(ExecCommand {
                component: exec.component.clone(),
                command_line: exec.command_line.clone(),
                working_dir: exec.working_dir.clone(),
                hot_reload_capable: exec.hot_reload_capable.unwrap_or(false),
            })
        } else if let Some(apply) = &command.apply {
            let reference = ComponentRef {
                component: apply.component.clone(),
            };
            match devfile.component(&apply.component).and_then(Component::kind) {
                Some(ComponentKind::Image) => CommandBody::Image(reference),
                Some(ComponentKind::Kubernetes | ComponentKind::Openshift) => {
                    CommandBody::Apply(reference)
                }
                _ => {
                    return Err(DevfileError::UnknownReference {
                        kind: "command",
                        name: command.id.clone(),
                        target: "component",
                        reference: apply.component.clone(),
                    })
                }
            }
        } else if let Some(composite) = &command.composite {
            CommandBody::Composite(CompositeCommand {
                commands: composite.commands.clone(),
                parallel: composite.parallel.unwrap_or(false),
            })
        } else {
            return Err(DevfileError::Invalid(format!(
                "command {:?} has no supported type",
                command.id
            )));
        };

        Ok(Self {
            name: command.id.clone(),
            group: command.group_kind().to_string(),
            default: command.is_default(),
            body,
        })
    }

    pub fn kind(&self) -> SectionKind {
        match self.body {
            CommandBody::Exec(_) => SectionKind::ExecCommand,
            CommandBody::Apply(_) => SectionKind::ApplyCommand,
            CommandBody::Image(_) => SectionKind::ImageCommand,
            CommandBody::Composite(_) => SectionKind::CompositeCommand,
        }
    }

    /// Component referenced by exec, apply and image commands
    pub fn component(&self) -> Option<&str> {
        match &self.body {
            CommandBody::Exec(exec) => Some(&exec.component),
            CommandBody::Apply(r) | CommandBody::Image(r) => Some(&r.component),
            CommandBody::Composite(_) => None,
        }
    }

    /// Schema form; `extra` is left empty for the caller to carry over
    pub fn to_schema(&self) -> DevCommand {
        let group = (!self.group.is_empty()).then(|| CommandGroup {
            is_default: non_default(self.default),
            kind: self.group.clone(),
        });
        let mut command = DevCommand {
            id: self.name.clone(),
            ..Default::default()
        };
        match &self.body {
            CommandBody::Exec(exec) => {
                command.exec = Some(SchemaExec {
                    command_line: exec.command_line.clone(),
                    component: exec.component.clone(),
                    group,
                    hot_reload_capable: non_default(exec.hot_reload_capable),
                    working_dir: exec.working_dir.clone(),
                    ..Default::default()
                })
            }
            CommandBody::Apply(r) | CommandBody::Image(r) => {
                command.apply = Some(SchemaApply {
                    component: r.component.clone(),
                    group,
                    ..Default::default()
                })
            }
            CommandBody::Composite(composite) => {
                command.composite = Some(SchemaComposite {
                    commands: composite.commands.clone(),
                    group,
                    parallel: non_default(composite.parallel),
                    ..Default::default()
                })
            }
        }
        command
    }
}

impl Container {
    fn from_schema(name: &str, container: &ContainerComponent) -> Self {
        Self {
            name: name.to_string(),
            image: container.image.clone(),
            command: container.command.clone(),
            args: container.args.clone(),
            env: container.env.clone(),
            volume_mounts: container.volume_mounts.clone(),
            memory_request: container.memory_request.clone(),
            memory_limit: container.memory_limit.clone(),
            cpu_request: container.cpu_request.clone(),
            cpu_limit: container.cpu_limit.clone(),
            endpoints: container.endpoints.clone(),
            configure_sources: container.mount_sources.is_some()
                || !container.source_mapping.is_empty(),
            mount_sources: container.mount_sources.unwrap_or(true),
            source_mapping: container.source_mapping.clone(),
            annotation: container.annotation.clone(),
        }
    }

    pub fn to_schema(&self) -> ContainerComponent {
        ContainerComponent {
            annotation: self.annotation.clone(),
            args: self.args.clone(),
            command: self.command.clone(),
            cpu_limit: self.cpu_limit.clone(),
            cpu_request: self.cpu_request.clone(),
            endpoints: self.endpoints.clone(),
            env: self.env.clone(),
            image: self.image.clone(),
            memory_limit: self.memory_limit.clone(),
            memory_request: self.memory_request.clone(),
            mount_sources: self.configure_sources.then_some(self.mount_sources),
            source_mapping: if self.configure_sources {
                self.source_mapping.clone()
            } else {
                String::new()
            },
            volume_mounts: self.volume_mounts.clone(),
            extra: Default::default(),
        }
    }

    pub fn to_component(&self) -> Component {
        Component {
            name: self.name.clone(),
            container: Some(self.to_schema()),
            ..Default::default()
        }
    }
}

impl Image {
    fn from_schema(name: &str, image: &ImageComponent, orphan: bool) -> Self {
        let dockerfile = image.dockerfile.clone().unwrap_or_default();
        Self {
            name: name.to_string(),
            image_name: image.image_name.clone(),
            args: dockerfile.args,
            build_context: dockerfile.build_context,
            root_required: dockerfile.root_required.unwrap_or(false),
            uri: dockerfile.uri,
            auto_build: tri_state_from(image.auto_build),
            orphan,
        }
    }

    pub fn to_schema(&self) -> ImageComponent {
        ImageComponent {
            auto_build: tri_state_to(&self.auto_build),
            dockerfile: Some(DockerfileImage {
                args: self.args.clone(),
                build_context: self.build_context.clone(),
                root_required: non_default(self.root_required),
                uri: self.uri.clone(),
                extra: Default::default(),
            }),
            image_name: self.image_name.clone(),
            extra: Default::default(),
        }
    }

    pub fn to_component(&self) -> Component {
        Component {
            name: self.name.clone(),
            image: Some(self.to_schema()),
            ..Default::default()
        }
    }
}

impl Resource {
    fn from_schema(name: &str, resource: &K8sLikeComponent, orphan: bool) -> Self {
        Self {
            name: name.to_string(),
            inlined: resource.inlined.clone(),
            uri: resource.uri.clone(),
            deploy_by_default: tri_state_from(resource.deploy_by_default),
            orphan,
        }
    }

    pub fn to_schema(&self) -> K8sLikeComponent {
        K8sLikeComponent {
            deploy_by_default: tri_state_to(&self.deploy_by_default),
            inlined: self.inlined.clone(),
            uri: self.uri.clone(),
            extra: Default::default(),
        }
    }

    /// New resources are always written as Kubernetes components
    pub fn to_component(&self) -> Component {
        Component {
            name: self.name.clone(),
            kubernetes: Some(self.to_schema()),
            ..Default::default()
        }
    }
}

impl Volume {
    fn from_schema(name: &str, volume: &VolumeComponent) -> Self {
        Self {
            name: name.to_string(),
            ephemeral: volume.ephemeral.unwrap_or(false),
            size: volume.size.clone(),
        }
    }

    pub fn to_schema(&self) -> VolumeComponent {
        VolumeComponent {
            ephemeral: Some(self.ephemeral),
            size: self.size.clone(),
        }
    }

    pub fn to_component(&self) -> Component {
        Component {
            name: self.name.clone(),
            volume: Some(self.to_schema()),
            ..Default::default()
        }
    }
}

impl Events {
    pub fn from_schema(events: &schema::Events) -> Self {
        Self {
            pre_start: events.pre_start.clone(),
            post_start: events.post_start.clone(),
            pre_stop: events.pre_stop.clone(),
            post_stop: events.post_stop.clone(),
        }
    }

    pub fn to_schema(&self) -> schema::Events {
        schema::Events {
            post_start: self.post_start.clone(),
            post_stop: self.post_stop.clone(),
            pre_start: self.pre_start.clone(),
            pre_stop: self.pre_stop.clone(),
        }
    }

    /// Command list bound to one event, by its camelCase name
    pub fn get(&self, event: &str) -> Option<&Vec<String>> {
        match event {
            "preStart" => Some(&self.pre_start),
            "postStart" => Some(&self.post_start),
            "preStop" => Some(&self.pre_stop),
            "postStop" => Some(&self.post_stop),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, event: &str) -> Option<&mut Vec<String>> {
        match event {
            "preStart" => Some(&mut self.pre_start),
            "postStart" => Some(&mut self.post_start),
            "preStop" => Some(&mut self.pre_stop),
            "postStop" => Some(&mut self.post_stop),
            _ => None,
        }
    }
}

/// Event names, in lifecycle order
pub const EVENT_NAMES: [&str; 4] = ["preStart", "postStart", "preStop", "postStop"];

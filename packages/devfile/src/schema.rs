//! # Devfile YAML schema
//!
//! Serde mirror of the devfile 2.x document. Only the parts the editor works
//! with are typed; every other key is carried in an `extra` map so that a
//! parse → serialize cycle never drops user content.
//!
//! Fields are declared in alphabetical order, which is the key order the
//! serialized YAML ends up with.

use crate::error::DevfileError;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Schema version written into freshly created documents
pub const DEFAULT_SCHEMA_VERSION: &str = "2.2.0";

type Extra = BTreeMap<String, Value>;

fn is_false(b: &bool) -> bool {
    !*b
}

/// Root devfile document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Devfile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<DevCommand>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Events>,

    #[serde(default)]
    pub metadata: DevfileMetadata,

    #[serde(default)]
    pub schema_version: String,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Default for Devfile {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            components: Vec::new(),
            events: None,
            metadata: DevfileMetadata::default(),
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            extra: Extra::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevfileMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub architectures: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub global_memory_limit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub support_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub website: String,

    #[serde(flatten)]
    pub extra: Extra,
}

/// A named component; exactly one of the kind fields is expected to be set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerComponent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageComponent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<K8sLikeComponent>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openshift: Option<K8sLikeComponent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeComponent>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Which union member a component carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Container,
    Image,
    Kubernetes,
    Openshift,
    Volume,
}

impl Component {
    pub fn kind(&self) -> Option<ComponentKind> {
        if self.container.is_some() {
            Some(ComponentKind::Container)
        } else if self.image.is_some() {
            Some(ComponentKind::Image)
        } else if self.kubernetes.is_some() {
            Some(ComponentKind::Kubernetes)
        } else if self.openshift.is_some() {
            Some(ComponentKind::Openshift)
        } else if self.volume.is_some() {
            Some(ComponentKind::Volume)
        } else {
            None
        }
    }

    /// Kubernetes or OpenShift manifest, whichever is set
    pub fn k8s_like(&self) -> Option<&K8sLikeComponent> {
        self.kubernetes.as_ref().or(self.openshift.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerComponent {
    #[serde(default, skip_serializing_if = "Annotation::is_empty")]
    pub annotation: Annotation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cpu_limit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cpu_request: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Endpoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memory_limit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memory_request: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_sources: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_mapping: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Environment variable of a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Mount of a volume component into a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// Port exposed by a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub exposure: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub secure: bool,
    #[serde(default)]
    pub target_port: u16,
}

/// Annotations added to the generated Deployment and Service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deployment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub service: BTreeMap<String, String>,
}

impl Annotation {
    pub fn is_empty(&self) -> bool {
        self.deployment.is_empty() && self.service.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageComponent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_build: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<DockerfileImage>,
    #[serde(default)]
    pub image_name: String,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerfileImage {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub build_context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_required: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Kubernetes or OpenShift manifest, inlined or referenced by URI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct K8sLikeComponent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_by_default: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub inlined: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeComponent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub size: String,
}

/// A devfile command; exactly one of the kind fields is expected to be set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply: Option<ApplyCommand>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<CompositeCommand>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecCommand>,

    pub id: String,

    #[serde(flatten)]
    pub extra: Extra,
}

impl DevCommand {
    pub fn group(&self) -> Option<&CommandGroup> {
        match (&self.exec, &self.apply, &self.composite) {
            (Some(exec), _, _) => exec.group.as_ref(),
            (_, Some(apply), _) => apply.group.as_ref(),
            (_, _, Some(composite)) => composite.group.as_ref(),
            _ => None,
        }
    }

    pub fn group_mut(&mut self) -> Option<&mut Option<CommandGroup>> {
        if let Some(exec) = &mut self.exec {
            Some(&mut exec.group)
        } else if let Some(apply) = &mut self.apply {
            Some(&mut apply.group)
        } else if let Some(composite) = &mut self.composite {
            Some(&mut composite.group)
        } else {
            None
        }
    }

    /// Group kind, or `""` for commands outside any group
    pub fn group_kind(&self) -> &str {
        self.group().map(|g| g.kind.as_str()).unwrap_or("")
    }

    pub fn is_default(&self) -> bool {
        self.group().and_then(|g| g.is_default).unwrap_or(false)
    }

    /// Component referenced by an exec or apply command
    pub fn component(&self) -> Option<&str> {
        self.exec
            .as_ref()
            .map(|e| e.component.as_str())
            .or_else(|| self.apply.as_ref().map(|a| a.component.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCommand {
    #[serde(default)]
    pub command_line: String,
    #[serde(default)]
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<CommandGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hot_reload_capable: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub working_dir: String,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCommand {
    #[serde(default)]
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<CommandGroup>,

    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeCommand {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<CommandGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Lifecycle bindings, each a list of command ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Events {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_start: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_stop: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_start: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_stop: Vec<String>,
}

impl Events {
    /// All bound command ids, in event order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &String)> {
        self.pre_start
            .iter()
            .map(|c| ("preStart", c))
            .chain(self.post_start.iter().map(|c| ("postStart", c)))
            .chain(self.pre_stop.iter().map(|c| ("preStop", c)))
            .chain(self.post_stop.iter().map(|c| ("postStop", c)))
    }
}

impl Devfile {
    /// Parse YAML text. Blank input and a missing `schemaVersion` are rejected.
    pub fn from_yaml(source: &str) -> Result<Self, DevfileError> {
        if source.trim().is_empty() {
            return Err(DevfileError::Invalid("document is empty".to_string()));
        }
        let devfile: Devfile = serde_yaml::from_str(source)?;
        if devfile.schema_version.trim().is_empty() {
            return Err(DevfileError::Invalid("schemaVersion is required".to_string()));
        }
        Ok(devfile)
    }

    pub fn to_yaml(&self) -> Result<String, DevfileError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.name == name)
    }

    pub fn command(&self, id: &str) -> Option<&DevCommand> {
        self.commands.iter().find(|c| c.id == id)
    }

    pub fn command_mut(&mut self, id: &str) -> Option<&mut DevCommand> {
        self.commands.iter_mut().find(|c| c.id == id)
    }

    /// Components of one kind, in document order
    pub fn components_of(&self, kind: ComponentKind) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(move |c| c.kind() == Some(kind))
    }

    pub fn events(&self) -> Events {
        self.events.clone().unwrap_or_default()
    }
}

//! Forms for container, image, resource and volume components

use super::{
    submit_if_valid, BoundForm, ChangeCallback, FormMode, KeyValue, ListForm, NameField, Notifier,
    QuantityField, SectionForm, Submission,
};
use crate::errors::{EditorError, EditorResult};
use crate::gateway::{BackendGateway, SectionValue};
use devstate_devfile::{
    Annotation, Container, Endpoint, EnvVar, Image, Resource, SectionKind, Volume, VolumeMount,
};

/// `autoBuild` / `deployByDefault` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    /// Left to the tooling
    #[default]
    Unset,
    Always,
    Never,
}

impl TriState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriState::Unset => "",
            TriState::Always => "always",
            TriState::Never => "never",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "always" => TriState::Always,
            "never" => TriState::Never,
            _ => TriState::Unset,
        }
    }
}

fn required(value: &str, label: &str, problems: &mut Vec<String>) {
    if value.trim().is_empty() {
        problems.push(format!("{label} is required"));
    }
}

// ---------------------------------------------------------------------------
// Container

#[derive(Default)]
pub struct ContainerForm {
    name: NameField,
    image: String,
    command: ListForm<String>,
    args: ListForm<String>,
    env: ListForm<EnvVar>,
    volume_mounts: ListForm<VolumeMount>,
    memory_request: QuantityField,
    memory_limit: QuantityField,
    cpu_request: QuantityField,
    cpu_limit: QuantityField,
    endpoints: ListForm<Endpoint>,
    configure_sources: bool,
    mount_sources: bool,
    source_mapping: String,
    deployment_annotations: ListForm<KeyValue>,
    service_annotations: ListForm<KeyValue>,
    pending_volumes: Vec<Volume>,
    notifier: Notifier<Container>,
}

/// Which container quantity is being edited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerQuantity {
    MemoryRequest,
    MemoryLimit,
    CpuRequest,
    CpuLimit,
}

impl ContainerForm {
    pub fn new() -> Self {
        Self {
            mount_sources: true,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        self.name.value()
    }

    pub fn set_name(&mut self, name: &str) -> EditorResult<()> {
        self.name.set(name)?;
        self.changed();
        Ok(())
    }

    pub fn set_image(&mut self, image: &str) {
        self.image = image.to_string();
        self.changed();
    }

    pub fn set_configure_sources(&mut self, configure: bool) {
        self.configure_sources = configure;
        self.changed();
    }

    pub fn set_mount_sources(&mut self, mount: bool) {
        self.mount_sources = mount;
        self.changed();
    }

    pub fn set_source_mapping(&mut self, mapping: &str) {
        self.source_mapping = mapping.to_string();
        self.changed();
    }

    fn quantity_mut(&mut self, which: ContainerQuantity) -> &mut QuantityField {
        match which {
            ContainerQuantity::MemoryRequest => &mut self.memory_request,
            ContainerQuantity::MemoryLimit => &mut self.memory_limit,
            ContainerQuantity::CpuRequest => &mut self.cpu_request,
            ContainerQuantity::CpuLimit => &mut self.cpu_limit,
        }
    }

    pub fn quantity(&self, which: ContainerQuantity) -> &QuantityField {
        match which {
            ContainerQuantity::MemoryRequest => &self.memory_request,
            ContainerQuantity::MemoryLimit => &self.memory_limit,
            ContainerQuantity::CpuRequest => &self.cpu_request,
            ContainerQuantity::CpuLimit => &self.cpu_limit,
        }
    }

    /// The field stays `Pending` until [`Self::validate_quantities`] runs
    pub fn set_quantity(&mut self, which: ContainerQuantity, value: &str) {
        self.quantity_mut(which).set(value);
        self.changed();
    }

    pub async fn validate_quantities<G>(&mut self, gateway: &G)
    where
        G: BackendGateway + ?Sized,
    {
        self.memory_request.validate_pending(gateway).await;
        self.memory_limit.validate_pending(gateway).await;
        self.cpu_request.validate_pending(gateway).await;
        self.cpu_limit.validate_pending(gateway).await;
    }

    pub fn with_command<R>(&mut self, edit: impl FnOnce(&mut ListForm<String>) -> R) -> R {
        let result = edit(&mut self.command);
        self.changed();
        result
    }

    pub fn with_args<R>(&mut self, edit: impl FnOnce(&mut ListForm<String>) -> R) -> R {
        let result = edit(&mut self.args);
        self.changed();
        result
    }

    pub fn with_env<R>(&mut self, edit: impl FnOnce(&mut ListForm<EnvVar>) -> R) -> R {
        let result = edit(&mut self.env);
        self.changed();
        result
    }

    pub fn with_volume_mounts<R>(&mut self, edit: impl FnOnce(&mut ListForm<VolumeMount>) -> R) -> R {
        let result = edit(&mut self.volume_mounts);
        self.changed();
        result
    }

    pub fn with_endpoints<R>(&mut self, edit: impl FnOnce(&mut ListForm<Endpoint>) -> R) -> R {
        let result = edit(&mut self.endpoints);
        self.changed();
        result
    }

    pub fn with_annotations<R>(
        &mut self,
        edit: impl FnOnce(&mut ListForm<KeyValue>, &mut ListForm<KeyValue>) -> R,
    ) -> R {
        let result = edit(&mut self.deployment_annotations, &mut self.service_annotations);
        self.changed();
        result
    }

    /// Create a volume together with the container and mount it at `path`
    pub fn add_pending_volume(&mut self, volume: Volume, path: &str) -> EditorResult<()> {
        let mut name = NameField::default();
        name.set(&volume.name)?;
        if let Some(problem) = name.problem() {
            return Err(EditorError::InvalidForm(problem));
        }
        if self.pending_volumes.iter().any(|v| v.name == volume.name) {
            return Err(EditorError::conflict(&volume.name, "already exists"));
        }
        self.volume_mounts.append(VolumeMount {
            name: volume.name.clone(),
            path: path.to_string(),
        });
        self.pending_volumes.push(volume);
        self.changed();
        Ok(())
    }

    pub fn pending_volumes(&self) -> &[Volume] {
        &self.pending_volumes
    }

    fn changed(&self) {
        self.notifier.emit(&self.current_value());
    }
}

impl BoundForm for ContainerForm {
    type Value = Container;

    fn load(&mut self, value: Option<&Container>) {
        let default = Container {
            mount_sources: true,
            ..Default::default()
        };
        let container = value.unwrap_or(&default);

        self.name.load(value.map(|c| c.name.as_str()));
        self.image = container.image.clone();
        self.command.load(Some(&container.command));
        self.args.load(Some(&container.args));
        self.env.load(Some(&container.env));
        self.volume_mounts.load(Some(&container.volume_mounts));
        self.memory_request.load(&container.memory_request);
        self.memory_limit.load(&container.memory_limit);
        self.cpu_request.load(&container.cpu_request);
        self.cpu_limit.load(&container.cpu_limit);
        self.endpoints.load(Some(&container.endpoints));
        self.configure_sources = container.configure_sources;
        self.mount_sources = container.mount_sources;
        self.source_mapping = container.source_mapping.clone();
        self.deployment_annotations.load_map(&container.annotation.deployment);
        self.service_annotations.load_map(&container.annotation.service);
        self.pending_volumes.clear();
    }

    fn current_value(&self) -> Container {
        Container {
            name: self.name.value().to_string(),
            image: self.image.clone(),
            command: self.command.values(),
            args: self.args.values(),
            env: self.env.values(),
            volume_mounts: self.volume_mounts.values(),
            memory_request: self.memory_request.value().to_string(),
            memory_limit: self.memory_limit.value().to_string(),
            cpu_request: self.cpu_request.value().to_string(),
            cpu_limit: self.cpu_limit.value().to_string(),
            endpoints: self.endpoints.values(),
            configure_sources: self.configure_sources,
            mount_sources: self.mount_sources,
            source_mapping: if self.configure_sources {
                self.source_mapping.clone()
            } else {
                String::new()
            },
            annotation: Annotation {
                deployment: self.deployment_annotations.to_map(),
                service: self.service_annotations.to_map(),
            },
        }
    }

    fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    fn on_change(&mut self, callback: ChangeCallback<Container>) {
        self.notifier.set(callback);
    }
}

impl SectionForm for ContainerForm {
    fn kind(&self) -> SectionKind {
        SectionKind::Container
    }

    fn mode(&self) -> FormMode {
        self.name.mode()
    }

    fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = self.name.problem().into_iter().collect();
        required(&self.image, "image", &mut problems);
        problems.extend(self.env.problems());
        problems.extend(self.volume_mounts.problems());
        problems.extend(self.endpoints.problems());
        problems.extend(self.deployment_annotations.problems());
        problems.extend(self.service_annotations.problems());
        problems.extend(self.memory_request.problem("memory request"));
        problems.extend(self.memory_limit.problem("memory limit"));
        problems.extend(self.cpu_request.problem("CPU request"));
        problems.extend(self.cpu_limit.problem("CPU limit"));
        problems
    }

    fn submit(&self) -> EditorResult<Submission> {
        submit_if_valid(self, || {
            let value = SectionValue::Container(self.current_value());
            let submission = match self.mode() {
                FormMode::Create => Submission::create(value),
                FormMode::Edit => Submission::edit(value),
            };
            submission.with_dependencies(
                self.pending_volumes
                    .iter()
                    .cloned()
                    .map(SectionValue::Volume)
                    .collect(),
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Image

#[derive(Default)]
pub struct ImageForm {
    name: NameField,
    image_name: String,
    args: ListForm<String>,
    build_context: String,
    root_required: bool,
    uri: String,
    auto_build: TriState,
    notifier: Notifier<Image>,
}

impl ImageForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: &str) -> EditorResult<()> {
        self.name.set(name)?;
        self.changed();
        Ok(())
    }

    pub fn set_image_name(&mut self, image_name: &str) {
        self.image_name = image_name.to_string();
        self.changed();
    }

    pub fn set_build_context(&mut self, build_context: &str) {
        self.build_context = build_context.to_string();
        self.changed();
    }

    pub fn set_root_required(&mut self, root_required: bool) {
        self.root_required = root_required;
        self.changed();
    }

    pub fn set_uri(&mut self, uri: &str) {
        self.uri = uri.to_string();
        self.changed();
    }

    pub fn set_auto_build(&mut self, auto_build: TriState) {
        self.auto_build = auto_build;
        self.changed();
    }

    pub fn with_args<R>(&mut self, edit: impl FnOnce(&mut ListForm<String>) -> R) -> R {
        let result = edit(&mut self.args);
        self.changed();
        result
    }

    fn changed(&self) {
        self.notifier.emit(&self.current_value());
    }
}

impl BoundForm for ImageForm {
    type Value = Image;

    fn load(&mut self, value: Option<&Image>) {
        let image = value.cloned().unwrap_or_default();
        self.name.load(value.map(|i| i.name.as_str()));
        self.image_name = image.image_name;
        self.args.load(Some(&image.args));
        self.build_context = image.build_context;
        self.root_required = image.root_required;
        self.uri = image.uri;
        self.auto_build = TriState::parse(&image.auto_build);
    }

    fn current_value(&self) -> Image {
        Image {
            name: self.name.value().to_string(),
            image_name: self.image_name.clone(),
            args: self.args.values(),
            build_context: self.build_context.clone(),
            root_required: self.root_required,
            uri: self.uri.clone(),
            auto_build: self.auto_build.as_str().to_string(),
            orphan: false,
        }
    }

    fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    fn on_change(&mut self, callback: ChangeCallback<Image>) {
        self.notifier.set(callback);
    }
}

impl SectionForm for ImageForm {
    fn kind(&self) -> SectionKind {
        SectionKind::Image
    }

    fn mode(&self) -> FormMode {
        self.name.mode()
    }

    fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = self.name.problem().into_iter().collect();
        required(&self.image_name, "image name", &mut problems);
        problems
    }

    fn submit(&self) -> EditorResult<Submission> {
        submit_if_valid(self, || {
            let value = SectionValue::Image(self.current_value());
            match self.mode() {
                FormMode::Create => Submission::create(value),
                FormMode::Edit => Submission::edit(value),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Resource

#[derive(Default)]
pub struct ResourceForm {
    name: NameField,
    inlined: String,
    uri: String,
    deploy_by_default: TriState,
    notifier: Notifier<Resource>,
}

impl ResourceForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: &str) -> EditorResult<()> {
        self.name.set(name)?;
        self.changed();
        Ok(())
    }

    pub fn set_inlined(&mut self, inlined: &str) {
        self.inlined = inlined.to_string();
        self.changed();
    }

    pub fn set_uri(&mut self, uri: &str) {
        self.uri = uri.to_string();
        self.changed();
    }

    pub fn set_deploy_by_default(&mut self, deploy: TriState) {
        self.deploy_by_default = deploy;
        self.changed();
    }

    fn changed(&self) {
        self.notifier.emit(&self.current_value());
    }
}

impl BoundForm for ResourceForm {
    type Value = Resource;

    fn load(&mut self, value: Option<&Resource>) {
        let resource = value.cloned().unwrap_or_default();
        self.name.load(value.map(|r| r.name.as_str()));
        self.inlined = resource.inlined;
        self.uri = resource.uri;
        self.deploy_by_default = TriState::parse(&resource.deploy_by_default);
    }

    fn current_value(&self) -> Resource {
        Resource {
            name: self.name.value().to_string(),
            inlined: self.inlined.clone(),
            uri: self.uri.clone(),
            deploy_by_default: self.deploy_by_default.as_str().to_string(),
            orphan: false,
        }
    }

    fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    fn on_change(&mut self, callback: ChangeCallback<Resource>) {
        self.notifier.set(callback);
    }
}

impl SectionForm for ResourceForm {
    fn kind(&self) -> SectionKind {
        SectionKind::Resource
    }

    fn mode(&self) -> FormMode {
        self.name.mode()
    }

    fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = self.name.problem().into_iter().collect();
        match (self.inlined.trim().is_empty(), self.uri.trim().is_empty()) {
            (true, true) => problems.push("either inlined content or uri is required".to_string()),
            (false, false) => problems.push("inlined content and uri are mutually exclusive".to_string()),
            _ => {}
        }
        problems
    }

    fn submit(&self) -> EditorResult<Submission> {
        submit_if_valid(self, || {
            let value = SectionValue::Resource(self.current_value());
            match self.mode() {
                FormMode::Create => Submission::create(value),
                FormMode::Edit => Submission::edit(value),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Volume

#[derive(Default)]
pub struct VolumeForm {
    name: NameField,
    ephemeral: bool,
    size: QuantityField,
    notifier: Notifier<Volume>,
}

impl VolumeForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: &str) -> EditorResult<()> {
        self.name.set(name)?;
        self.changed();
        Ok(())
    }

    pub fn set_ephemeral(&mut self, ephemeral: bool) {
        self.ephemeral = ephemeral;
        self.changed();
    }

    pub fn set_size(&mut self, size: &str) {
        self.size.set(size);
        self.changed();
    }

    pub fn size(&self) -> &QuantityField {
        &self.size
    }

    pub async fn validate_quantities<G>(&mut self, gateway: &G)
    where
        G: BackendGateway + ?Sized,
    {
        self.size.validate_pending(gateway).await;
    }

    fn changed(&self) {
        self.notifier.emit(&self.current_value());
    }
}

impl BoundForm for VolumeForm {
    type Value = Volume;

    fn load(&mut self, value: Option<&Volume>) {
        let volume = value.cloned().unwrap_or_default();
        self.name.load(value.map(|v| v.name.as_str()));
        self.ephemeral = volume.ephemeral;
        self.size.load(&volume.size);
    }

    fn current_value(&self) -> Volume {
        Volume {
            name: self.name.value().to_string(),
            ephemeral: self.ephemeral,
            size: self.size.value().to_string(),
        }
    }

    fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    fn on_change(&mut self, callback: ChangeCallback<Volume>) {
        self.notifier.set(callback);
    }
}

impl SectionForm for VolumeForm {
    fn kind(&self) -> SectionKind {
        SectionKind::Volume
    }

    fn mode(&self) -> FormMode {
        self.name.mode()
    }

    fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = self.name.problem().into_iter().collect();
        problems.extend(self.size.problem("size"));
        problems
    }

    fn submit(&self) -> EditorResult<Submission> {
        submit_if_valid(self, || {
            let value = SectionValue::Volume(self.current_value());
            match self.mode() {
                FormMode::Create => Submission::create(value),
                FormMode::Edit => Submission::edit(value),
            }
        })
    }
}

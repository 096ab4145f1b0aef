//! In-memory devfile held by the service.
//!
//! Every mutation works on a copy of the document, validates the copy, and
//! only then commits it; a failed mutation leaves the state untouched. Each
//! successful call returns the re-serialized document with its sections.

use devstate_common::CommonError;
use devstate_devfile::api::CommandMove;
use devstate_devfile::schema::{CommandGroup, ComponentKind};
use devstate_devfile::{
    check_name, validate, Command, CommandBody, Container, Devfile, DevfileContent, DevfileError,
    Events, Image, Metadata, Resource, Volume, EVENT_NAMES,
};
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Devfile(#[from] DevfileError),

    #[error(transparent)]
    Io(#[from] CommonError),
}

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Clone, Default)]
pub struct DevfileState {
    devfile: Devfile,
}

impl DevfileState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devfile(&self) -> &Devfile {
        &self.devfile
    }

    pub fn content(&self) -> StateResult<DevfileContent> {
        Ok(DevfileContent::from_devfile(&self.devfile)?)
    }

    /// Apply `edit` to a copy, validate it, then commit
    fn mutate(
        &mut self,
        edit: impl FnOnce(&mut Devfile) -> Result<(), DevfileError>,
    ) -> StateResult<DevfileContent> {
        let mut candidate = self.devfile.clone();
        edit(&mut candidate)?;
        validate(&candidate)?;
        let content = DevfileContent::from_devfile(&candidate)?;
        self.devfile = candidate;
        Ok(content)
    }

    #[instrument(skip(self, text))]
    pub fn set_content(&mut self, text: &str) -> StateResult<DevfileContent> {
        let devfile = Devfile::from_yaml(text)?;
        self.mutate(|d| {
            *d = devfile;
            Ok(())
        })
    }

    #[instrument(skip(self))]
    pub fn clear(&mut self) -> StateResult<DevfileContent> {
        self.devfile = Devfile::default();
        self.content()
    }

    #[instrument(skip(self, metadata))]
    pub fn set_metadata(&mut self, metadata: &Metadata) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            metadata.apply_to(&mut d.metadata);
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Components

    #[instrument(skip(self, container), fields(name = %container.name))]
    pub fn add_container(&mut self, container: &Container) -> StateResult<DevfileContent> {
        self.mutate(|d| add_component(d, container.to_component()))
    }

    #[instrument(skip(self, container))]
    pub fn patch_container(&mut self, name: &str, container: &Container) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            let existing = existing_component(d, "container", name, ComponentKind::Container)?;
            let mut schema = container.to_schema();
            if let Some(previous) = existing.container.take() {
                schema.extra = previous.extra;
            }
            existing.container = Some(schema);
            Ok(())
        })
    }

    #[instrument(skip(self))]
    pub fn delete_container(&mut self, name: &str) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            existing_component(d, "container", name, ComponentKind::Container)?;
            if let Some(user) = d
                .commands
                .iter()
                .find(|c| c.exec.as_ref().is_some_and(|e| e.component == name))
            {
                return Err(in_use("container", name, format!("command {:?}", user.id)));
            }
            remove_component(d, name);
            Ok(())
        })
    }

    #[instrument(skip(self, image), fields(name = %image.name))]
    pub fn add_image(&mut self, image: &Image) -> StateResult<DevfileContent> {
        self.mutate(|d| add_component(d, image.to_component()))
    }

    #[instrument(skip(self, image))]
    pub fn patch_image(&mut self, name: &str, image: &Image) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            let existing = existing_component(d, "image", name, ComponentKind::Image)?;
            let mut schema = image.to_schema();
            if let Some(previous) = existing.image.take() {
                schema.extra = previous.extra;
            }
            existing.image = Some(schema);
            Ok(())
        })
    }

    #[instrument(skip(self))]
    pub fn delete_image(&mut self, name: &str) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            existing_component(d, "image", name, ComponentKind::Image)?;
            refuse_if_applied(d, "image", name)?;
            remove_component(d, name);
            Ok(())
        })
    }

    #[instrument(skip(self, resource), fields(name = %resource.name))]
    pub fn add_resource(&mut self, resource: &Resource) -> StateResult<DevfileContent> {
        check_manifest(resource)?;
        self.mutate(|d| add_component(d, resource.to_component()))
    }

    /// Keeps an OpenShift resource an OpenShift resource
    #[instrument(skip(self, resource))]
    pub fn patch_resource(&mut self, name: &str, resource: &Resource) -> StateResult<DevfileContent> {
        check_manifest(resource)?;
        self.mutate(|d| {
            let existing = d
                .component_mut(name)
                .filter(|c| c.k8s_like().is_some())
                .ok_or_else(|| not_found("resource", name))?;
            let mut schema = resource.to_schema();
            let slot = if existing.openshift.is_some() {
                &mut existing.openshift
            } else {
                &mut existing.kubernetes
            };
            if let Some(previous) = slot.take() {
                schema.extra = previous.extra;
            }
            *slot = Some(schema);
            Ok(())
        })
    }

    #[instrument(skip(self))]
    pub fn delete_resource(&mut self, name: &str) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            d.component(name)
                .filter(|c| c.k8s_like().is_some())
                .ok_or_else(|| not_found("resource", name))?;
            refuse_if_applied(d, "resource", name)?;
            remove_component(d, name);
            Ok(())
        })
    }

    #[instrument(skip(self, volume), fields(name = %volume.name))]
    pub fn add_volume(&mut self, volume: &Volume) -> StateResult<DevfileContent> {
        self.mutate(|d| add_component(d, volume.to_component()))
    }

    #[instrument(skip(self, volume))]
    pub fn patch_volume(&mut self, name: &str, volume: &Volume) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            let existing = existing_component(d, "volume", name, ComponentKind::Volume)?;
            existing.volume = Some(volume.to_schema());
            Ok(())
        })
    }

    #[instrument(skip(self))]
    pub fn delete_volume(&mut self, name: &str) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            existing_component(d, "volume", name, ComponentKind::Volume)?;
            let mounted_by = d.components.iter().find(|c| {
                c.container
                    .as_ref()
                    .is_some_and(|inner| inner.volume_mounts.iter().any(|m| m.name == name))
            });
            if let Some(user) = mounted_by {
                return Err(in_use("volume", name, format!("container {:?}", user.name)));
            }
            remove_component(d, name);
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Commands

    /// Add a command of any kind. The referenced component must already
    /// exist and be of the kind the command expects.
    #[instrument(skip(self, command), fields(name = %command.name, kind = %command.kind()))]
    pub fn add_command(&mut self, command: &Command) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            check_name(&command.name)?;
            if d.command(&command.name).is_some() {
                return Err(DevfileError::DuplicateName {
                    kind: "command",
                    name: command.name.clone(),
                });
            }
            check_command_target(d, command)?;
            d.commands.push(command.to_schema());
            Ok(())
        })
    }

    /// Replace the body of an existing command; its group and default flag
    /// are managed by the move and default operations and are kept.
    #[instrument(skip(self, command))]
    pub fn patch_command(&mut self, name: &str, command: &Command) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            check_command_target(d, command)?;
            let existing = d.command_mut(name).ok_or_else(|| not_found("command", name))?;
            let group = existing.group().cloned();
            let mut schema = command.to_schema();
            schema.id = name.to_string();
            schema.extra = std::mem::take(&mut existing.extra);
            if let Some(slot) = schema.group_mut() {
                *slot = group;
            }
            *existing = schema;
            Ok(())
        })
    }

    #[instrument(skip(self))]
    pub fn delete_command(&mut self, name: &str) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            d.command(name).ok_or_else(|| not_found("command", name))?;
            let composite = d.commands.iter().find(|c| {
                c.composite
                    .as_ref()
                    .is_some_and(|inner| inner.commands.iter().any(|m| m == name))
            });
            if let Some(user) = composite {
                return Err(in_use("command", name, format!("command {:?}", user.id)));
            }
            if let Some((event, _)) = d.events().iter().find(|(_, c)| c.as_str() == name) {
                return Err(in_use("command", name, format!("event {event}")));
            }
            d.commands.retain(|c| c.id != name);
            Ok(())
        })
    }

    /// Move the `previous_index`-th command of `previous_group` so that it
    /// becomes the `new_index`-th command of `new_group`. `""` is the set of
    /// commands outside any group.
    #[instrument(skip(self))]
    pub fn move_command(&mut self, name: &str, request: &CommandMove) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            let position = d
                .commands
                .iter()
                .enumerate()
                .filter(|(_, c)| c.group_kind() == request.previous_group)
                .nth(request.previous_index)
                .map(|(i, _)| i)
                .ok_or_else(|| {
                    not_found(
                        "command",
                        &format!("{}[{}]", request.previous_group, request.previous_index),
                    )
                })?;
            if d.commands[position].id != name {
                return Err(DevfileError::Invalid(format!(
                    "command at {}[{}] is {:?}, not {:?}",
                    request.previous_group, request.previous_index, d.commands[position].id, name
                )));
            }

            let mut command = d.commands.remove(position);
            if command.group_kind() != request.new_group {
                let group = (!request.new_group.is_empty()).then(|| CommandGroup {
                    is_default: None,
                    kind: request.new_group.clone(),
                });
                if let Some(slot) = command.group_mut() {
                    *slot = group;
                }
            }

            let members: Vec<usize> = d
                .commands
                .iter()
                .enumerate()
                .filter(|(_, c)| c.group_kind() == request.new_group)
                .map(|(i, _)| i)
                .collect();
            let at = match (members.get(request.new_index), members.last()) {
                (Some(&i), _) => i,
                (None, Some(&last)) => last + 1,
                (None, None) => d.commands.len(),
            };
            d.commands.insert(at, command);
            Ok(())
        })
    }

    /// Make `name` the default of `group`, clearing the previous default
    #[instrument(skip(self))]
    pub fn set_default_command(&mut self, name: &str, group: &str) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            d.command(name).ok_or_else(|| not_found("command", name))?;
            for command in d.commands.iter_mut() {
                let is_target = command.id == name;
                let Some(slot) = command.group_mut() else {
                    continue;
                };
                if is_target {
                    *slot = Some(CommandGroup {
                        is_default: Some(true),
                        kind: group.to_string(),
                    });
                } else if let Some(existing) = slot.as_mut().filter(|g| g.kind == group) {
                    if existing.is_default == Some(true) {
                        existing.is_default = Some(false);
                    }
                }
            }
            Ok(())
        })
    }

    #[instrument(skip(self))]
    pub fn unset_default_command(&mut self, name: &str) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            let command = d.command_mut(name).ok_or_else(|| not_found("command", name))?;
            if let Some(Some(group)) = command.group_mut() {
                group.is_default = Some(false);
            }
            Ok(())
        })
    }

    /// Replace the commands bound to one lifecycle event
    #[instrument(skip(self, commands))]
    pub fn update_event(&mut self, event: &str, commands: &[String]) -> StateResult<DevfileContent> {
        if !EVENT_NAMES.contains(&event) {
            return Err(DevfileError::Invalid(format!("unknown event {event:?}")).into());
        }
        self.mutate(|d| {
            let mut events = Events::from_schema(&d.events());
            if let Some(list) = events.get_mut(event) {
                *list = commands.to_vec();
            }
            store_events(d, &events);
            Ok(())
        })
    }

    /// Replace the command lists of every lifecycle event at once
    #[instrument(skip(self, events))]
    pub fn set_events(&mut self, events: &Events) -> StateResult<DevfileContent> {
        self.mutate(|d| {
            store_events(d, events);
            Ok(())
        })
    }
}

fn store_events(devfile: &mut Devfile, events: &Events) {
    let schema = events.to_schema();
    devfile.events = (schema != Default::default()).then_some(schema);
}

fn not_found(kind: &'static str, name: &str) -> DevfileError {
    DevfileError::NotFound {
        kind,
        name: name.to_string(),
    }
}

fn in_use(kind: &'static str, name: &str, user: String) -> DevfileError {
    DevfileError::InUse {
        kind,
        name: name.to_string(),
        user,
    }
}

fn add_component(devfile: &mut Devfile, component: devstate_devfile::schema::Component) -> Result<(), DevfileError> {
    check_name(&component.name)?;
    if devfile.component(&component.name).is_some() {
        return Err(DevfileError::DuplicateName {
            kind: "component",
            name: component.name,
        });
    }
    devfile.components.push(component);
    Ok(())
}

fn existing_component<'a>(
    devfile: &'a mut Devfile,
    kind: &'static str,
    name: &str,
    expected: ComponentKind,
) -> Result<&'a mut devstate_devfile::schema::Component, DevfileError> {
    devfile
        .component_mut(name)
        .filter(|c| c.kind() == Some(expected))
        .ok_or_else(|| not_found(kind, name))
}

fn remove_component(devfile: &mut Devfile, name: &str) {
    devfile.components.retain(|c| c.name != name);
}

fn refuse_if_applied(devfile: &Devfile, kind: &'static str, name: &str) -> Result<(), DevfileError> {
    match devfile
        .commands
        .iter()
        .find(|c| c.apply.as_ref().is_some_and(|a| a.component == name))
    {
        Some(user) => Err(in_use(kind, name, format!("command {:?}", user.id))),
        None => Ok(()),
    }
}

fn check_manifest(resource: &Resource) -> Result<(), DevfileError> {
    if !resource.inlined.is_empty() && !resource.uri.is_empty() {
        return Err(DevfileError::Invalid(format!(
            "resource {:?}: inlined and uri cannot both be set",
            resource.name
        )));
    }
    Ok(())
}

/// Component kind a command body must point at
fn check_command_target(devfile: &Devfile, command: &Command) -> Result<(), DevfileError> {
    let (component, expected, target): (&str, &[ComponentKind], &'static str) = match &command.body {
        CommandBody::Exec(exec) => (&exec.component, &[ComponentKind::Container], "container"),
        CommandBody::Apply(r) => (
            &r.component,
            &[ComponentKind::Kubernetes, ComponentKind::Openshift],
            "resource",
        ),
        CommandBody::Image(r) => (&r.component, &[ComponentKind::Image], "image"),
        CommandBody::Composite(_) => return Ok(()),
    };
    let kind = devfile.component(component).and_then(|c| c.kind());
    if kind.is_some_and(|k| expected.contains(&k)) {
        Ok(())
    } else {
        Err(DevfileError::UnknownReference {
            kind: "command",
            name: command.name.clone(),
            target,
            reference: component.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devstate_devfile::schema::DevCommand;
    use devstate_devfile::{ComponentRef, ExecCommand};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn commands_in_group<'a>(devfile: &'a Devfile, group: &'a str) -> impl Iterator<Item = &'a DevCommand> {
        devfile.commands.iter().filter(move |c| c.group_kind() == group)
    }

    fn container(name: &str) -> Container {
        Container {
            name: name.to_string(),
            image: "an-image".to_string(),
            ..Default::default()
        }
    }

    fn exec(name: &str, component: &str) -> Command {
        Command {
            name: name.to_string(),
            group: String::new(),
            default: false,
            body: CommandBody::Exec(ExecCommand {
                component: component.to_string(),
                command_line: "run command".to_string(),
                working_dir: "/path/to/work".to_string(),
                hot_reload_capable: true,
            }),
        }
    }

    fn with_exec() -> DevfileState {
        let mut state = DevfileState::new();
        state.add_container(&container("a-container")).unwrap();
        state.add_command(&exec("an-exec-command", "a-container")).unwrap();
        state
    }

    fn group_names(state: &DevfileState, group: &str) -> Vec<String> {
        commands_in_group(state.devfile(), group).map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_new_state_is_empty_devfile() {
        let content = DevfileState::new().content().unwrap();
        assert_eq!(content.content, "metadata: {}\nschemaVersion: 2.2.0\n");
        assert!(content.commands.is_empty());
    }

    #[test]
    fn test_add_exec_command() {
        let content = with_exec().content().unwrap();
        assert_eq!(
            content.content,
            indoc! {"
                commands:
                - exec:
                    commandLine: run command
                    component: a-container
                    hotReloadCapable: true
                    workingDir: /path/to/work
                  id: an-exec-command
                components:
                - container:
                    image: an-image
                  name: a-container
                metadata: {}
                schemaVersion: 2.2.0
            "}
        );
        assert_eq!(content.commands[0].kind(), devstate_devfile::SectionKind::ExecCommand);
    }

    #[test]
    fn test_add_command_rejects_missing_container() {
        let mut state = DevfileState::new();
        let err = state.add_command(&exec("cmd", "missing")).unwrap_err();
        assert!(matches!(
            err,
            StateError::Devfile(DevfileError::UnknownReference { target: "container", .. })
        ));
        assert!(state.devfile().commands.is_empty());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut state = with_exec();
        assert!(state.add_volume(&Volume {
            name: "a-container".to_string(),
            ..Default::default()
        })
        .is_err());
        assert!(state.add_command(&exec("an-exec-command", "a-container")).is_err());
    }

    #[test]
    fn test_move_from_no_group_to_run() {
        let mut state = with_exec();
        let content = state
            .move_command(
                "an-exec-command",
                &CommandMove {
                    previous_group: String::new(),
                    new_group: "run".to_string(),
                    previous_index: 0,
                    new_index: 0,
                },
            )
            .unwrap();

        assert_eq!(content.commands[0].group, "run");
        assert!(!content.commands[0].default);
        assert!(content.content.contains("group:\n      kind: run\n"));
    }

    #[test]
    fn test_move_not_found() {
        let mut state = DevfileState::new();
        let request = CommandMove {
            previous_group: "build".to_string(),
            new_group: "run".to_string(),
            previous_index: 0,
            new_index: 0,
        };
        assert!(state.move_command("anything", &request).is_err());
    }

    #[test]
    fn test_move_between_groups_keeps_positions() {
        let mut state = DevfileState::new();
        state.add_container(&container("c")).unwrap();
        for (name, group) in [("build1", "build"), ("run1", "run"), ("other-to-build", "other")] {
            state.add_command(&exec(name, "c")).unwrap();
            state
                .move_command(
                    name,
                    &CommandMove {
                        previous_group: String::new(),
                        new_group: group.to_string(),
                        previous_index: 0,
                        new_index: 0,
                    },
                )
                .unwrap();
        }

        state
            .move_command(
                "other-to-build",
                &CommandMove {
                    previous_group: "other".to_string(),
                    new_group: "build".to_string(),
                    previous_index: 0,
                    new_index: 1,
                },
            )
            .unwrap();

        assert_eq!(group_names(&state, "build"), vec!["build1", "other-to-build"]);
        assert_eq!(group_names(&state, "run"), vec!["run1"]);
        assert!(group_names(&state, "other").is_empty());
    }

    #[test]
    fn test_move_checks_name_at_position() {
        let mut state = with_exec();
        let request = CommandMove {
            previous_group: String::new(),
            new_group: "run".to_string(),
            previous_index: 0,
            new_index: 0,
        };
        assert!(state.move_command("someone-else", &request).is_err());
        assert_eq!(state.devfile().commands[0].group_kind(), "");
    }

    #[test]
    fn test_set_and_unset_default() {
        let mut state = with_exec();
        state
            .move_command(
                "an-exec-command",
                &CommandMove {
                    previous_group: String::new(),
                    new_group: "run".to_string(),
                    previous_index: 0,
                    new_index: 0,
                },
            )
            .unwrap();

        let content = state.set_default_command("an-exec-command", "run").unwrap();
        assert!(content.commands[0].default);
        assert!(content.content.contains("isDefault: true"));

        let content = state.unset_default_command("an-exec-command").unwrap();
        assert!(!content.commands[0].default);
        assert!(content.content.contains("isDefault: false"));
    }

    #[test]
    fn test_set_default_clears_previous_default() {
        let mut state = with_exec();
        state.add_command(&exec("second", "a-container")).unwrap();
        state.set_default_command("an-exec-command", "run").unwrap();
        let content = state.set_default_command("second", "run").unwrap();

        assert!(!content.command("an-exec-command").unwrap().default);
        assert!(content.command("second").unwrap().default);
    }

    #[test]
    fn test_delete_referenced_entities_refused() {
        let mut state = with_exec();
        state
            .add_volume(&Volume {
                name: "cache".to_string(),
                size: "1Gi".to_string(),
                ..Default::default()
            })
            .unwrap();
        let mut mounted = container("mounter");
        mounted.volume_mounts.push(devstate_devfile::schema::VolumeMount {
            name: "cache".to_string(),
            path: "/cache".to_string(),
        });
        state.add_container(&mounted).unwrap();
        state
            .add_resource(&Resource {
                name: "deploy".to_string(),
                inlined: "kind: Deployment".to_string(),
                ..Default::default()
            })
            .unwrap();
        state
            .add_command(&Command {
                name: "apply-deploy".to_string(),
                group: String::new(),
                default: false,
                body: CommandBody::Apply(ComponentRef {
                    component: "deploy".to_string(),
                }),
            })
            .unwrap();

        let in_use = |r: StateResult<DevfileContent>| {
            matches!(r, Err(StateError::Devfile(DevfileError::InUse { .. })))
        };
        assert!(in_use(state.delete_container("a-container")));
        assert!(in_use(state.delete_volume("cache")));
        assert!(in_use(state.delete_resource("deploy")));

        state.delete_command("apply-deploy").unwrap();
        state.delete_resource("deploy").unwrap();
        assert!(state.devfile().component("deploy").is_none());
    }

    #[test]
    fn test_delete_missing_command_is_error() {
        let mut state = DevfileState::new();
        assert!(matches!(
            state.delete_command("nope"),
            Err(StateError::Devfile(DevfileError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_resource_inlined_and_uri_exclusive() {
        let mut state = DevfileState::new();
        let resource = Resource {
            name: "both".to_string(),
            inlined: "kind: Pod".to_string(),
            uri: "pod.yaml".to_string(),
            ..Default::default()
        };
        assert!(state.add_resource(&resource).is_err());
    }

    #[test]
    fn test_patch_keeps_openshift_resources() {
        let mut state = DevfileState::new();
        state
            .set_content(indoc! {"
                schemaVersion: 2.2.0
                components:
                  - name: route
                    openshift:
                      uri: route.yaml
            "})
            .unwrap();

        state
            .patch_resource(
                "route",
                &Resource {
                    name: "route".to_string(),
                    uri: "route-v2.yaml".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();

        let component = state.devfile().component("route").unwrap();
        assert!(component.kubernetes.is_none());
        assert_eq!(component.openshift.as_ref().unwrap().uri, "route-v2.yaml");
    }

    #[test]
    fn test_patch_command_keeps_group() {
        let mut state = with_exec();
        state.set_default_command("an-exec-command", "run").unwrap();

        let mut patched = exec("an-exec-command", "a-container");
        if let CommandBody::Exec(body) = &mut patched.body {
            body.command_line = "npm start".to_string();
        }
        let content = state.patch_command("an-exec-command", &patched).unwrap();

        let command = content.command("an-exec-command").unwrap();
        assert_eq!(command.group, "run");
        assert!(command.default);
    }

    #[test]
    fn test_update_event_and_clear() {
        let mut state = with_exec();
        let content = state
            .update_event("postStart", &["an-exec-command".to_string()])
            .unwrap();
        assert_eq!(content.events.post_start, vec!["an-exec-command"]);

        assert!(state.update_event("onCrash", &[]).is_err());
        assert!(state.update_event("preStop", &["missing".to_string()]).is_err());

        let content = state.update_event("postStart", &[]).unwrap();
        assert!(!content.content.contains("events"));

        let content = state.clear().unwrap();
        assert_eq!(content.content, "metadata: {}\nschemaVersion: 2.2.0\n");
    }

    #[test]
    fn test_set_events_is_all_or_nothing() {
        let mut state = with_exec();
        let content = state
            .set_events(&Events {
                pre_start: vec!["an-exec-command".to_string()],
                post_stop: vec!["an-exec-command".to_string()],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(content.events.pre_start, vec!["an-exec-command"]);
        assert_eq!(content.events.post_stop, vec!["an-exec-command"]);

        let err = state
            .set_events(&Events {
                post_start: vec!["an-exec-command".to_string()],
                pre_stop: vec!["missing".to_string()],
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, StateError::Devfile(DevfileError::UnknownReference { .. })));

        let content = state.content().unwrap();
        assert_eq!(content.events.pre_start, vec!["an-exec-command"]);
        assert!(content.events.post_start.is_empty());
    }

    #[test]
    fn test_set_content_rejects_invalid_and_keeps_state() {
        let mut state = with_exec();
        assert!(state.set_content("schemaVersion: [").is_err());
        assert!(state.set_content("metadata:\n  name: x\n").is_err());
        assert_eq!(state.devfile().commands.len(), 1);
    }

    #[test]
    fn test_set_metadata() {
        let mut state = DevfileState::new();
        let content = state
            .set_metadata(&Metadata {
                name: "test-devfile".to_string(),
                tags: "Go, Java".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(content.metadata.name, "test-devfile");
        assert_eq!(state.devfile().metadata.tags, vec!["Go", "Java"]);
    }
}

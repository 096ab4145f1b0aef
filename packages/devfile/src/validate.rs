//! Structural checks run on every parsed devfile: identifier syntax,
//! uniqueness, and cross references between commands, components and events.

use crate::error::{DevfileError, DevfileResult};
use crate::schema::{ComponentKind, Devfile};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Maximum identifier length (DNS label)
pub const MAX_NAME_LEN: usize = 63;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid name regex"))
}

pub fn is_valid_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LEN && name_pattern().is_match(name)
}

pub fn check_name(name: &str) -> DevfileResult<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(DevfileError::InvalidName {
            name: name.to_string(),
        })
    }
}

pub fn validate(devfile: &Devfile) -> DevfileResult<()> {
    if devfile.schema_version.trim().is_empty() {
        return Err(DevfileError::Invalid("schemaVersion is required".to_string()));
    }

    let mut components = HashSet::new();
    for component in &devfile.components {
        check_name(&component.name)?;
        if !components.insert(component.name.as_str()) {
            return Err(DevfileError::DuplicateName {
                kind: "component",
                name: component.name.clone(),
            });
        }
        if let Some(k8s) = component.k8s_like() {
            if !k8s.inlined.is_empty() && !k8s.uri.is_empty() {
                return Err(DevfileError::Invalid(format!(
                    "component {:?}: inlined and uri cannot both be set",
                    component.name
                )));
            }
        }
    }

    let mut commands = HashSet::new();
    for command in &devfile.commands {
        check_name(&command.id)?;
        if !commands.insert(command.id.as_str()) {
            return Err(DevfileError::DuplicateName {
                kind: "command",
                name: command.id.clone(),
            });
        }
    }

    for component in &devfile.components {
        let Some(container) = &component.container else {
            continue;
        };
        for mount in &container.volume_mounts {
            let target = devfile.component(&mount.name).and_then(|c| c.kind());
            if target != Some(ComponentKind::Volume) {
                return Err(unknown("container", &component.name, "volume", &mount.name));
            }
        }
    }

    for command in &devfile.commands {
        if let Some(exec) = &command.exec {
            let target = devfile.component(&exec.component).and_then(|c| c.kind());
            if target != Some(ComponentKind::Container) {
                return Err(unknown("command", &command.id, "container", &exec.component));
            }
        }
        if let Some(apply) = &command.apply {
            let target = devfile.component(&apply.component).and_then(|c| c.kind());
            if !matches!(
                target,
                Some(ComponentKind::Image | ComponentKind::Kubernetes | ComponentKind::Openshift)
            ) {
                return Err(unknown("command", &command.id, "image or resource", &apply.component));
            }
        }
        if let Some(composite) = &command.composite {
            for member in &composite.commands {
                if member == &command.id || !commands.contains(member.as_str()) {
                    return Err(unknown("command", &command.id, "command", member));
                }
            }
        }
    }

    for (event, command) in devfile.events().iter() {
        if !commands.contains(command.as_str()) {
            return Err(unknown("event", event, "command", command));
        }
    }

    Ok(())
}

fn unknown(kind: &'static str, name: &str, target: &'static str, reference: &str) -> DevfileError {
    DevfileError::UnknownReference {
        kind,
        name: name.to_string(),
        target,
        reference: reference.to_string(),
    }
}

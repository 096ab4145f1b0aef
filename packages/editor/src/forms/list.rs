//! Ordered list sub-forms (env vars, build args, endpoints, mounts, ...)

use super::{BoundForm, ChangeCallback, Notifier};
use devstate_devfile::{is_valid_name, Endpoint, EnvVar, VolumeMount};
use std::collections::BTreeMap;

/// An entry of a list sub-form
pub trait ListEntry: Clone + Default {
    /// Blank entries are dropped on submit
    fn is_blank(&self) -> bool;

    fn problem(&self) -> Option<String> {
        None
    }
}

impl ListEntry for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl ListEntry for EnvVar {
    fn is_blank(&self) -> bool {
        self.name.is_empty() && self.value.is_empty()
    }

    fn problem(&self) -> Option<String> {
        self.name
            .is_empty()
            .then(|| format!("environment variable with value {:?} has no name", self.value))
    }
}

impl ListEntry for VolumeMount {
    fn is_blank(&self) -> bool {
        self.name.is_empty() && self.path.is_empty()
    }

    fn problem(&self) -> Option<String> {
        self.name
            .is_empty()
            .then(|| format!("volume mount at {:?} has no volume", self.path))
    }
}

impl ListEntry for Endpoint {
    fn is_blank(&self) -> bool {
        self.name.is_empty() && self.target_port == 0
    }

    fn problem(&self) -> Option<String> {
        if !is_valid_name(&self.name) {
            Some(format!("endpoint name {:?} is invalid", self.name))
        } else if self.target_port == 0 {
            Some(format!("endpoint {:?} needs a target port", self.name))
        } else {
            None
        }
    }
}

/// One annotation entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl ListEntry for KeyValue {
    fn is_blank(&self) -> bool {
        self.key.is_empty() && self.value.is_empty()
    }

    fn problem(&self) -> Option<String> {
        self.key
            .is_empty()
            .then(|| format!("annotation with value {:?} has no key", self.value))
    }
}

pub struct ListForm<T> {
    items: Vec<T>,
    notifier: Notifier<Vec<T>>,
}

impl<T> Default for ListForm<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            notifier: Notifier::default(),
        }
    }
}

impl<T: ListEntry> ListForm<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<T>) -> Self {
        Self {
            items,
            notifier: Notifier::default(),
        }
    }

    /// Every entry, blank ones included
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn append(&mut self, item: T) {
        self.items.push(item);
        self.changed();
    }

    pub fn append_blank(&mut self) {
        self.append(T::default());
    }

    /// Remove one entry; the others keep their order
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);
        self.changed();
        Some(removed)
    }

    pub fn edit(&mut self, index: usize, item: T) -> bool {
        match self.items.get_mut(index) {
            Some(slot) => {
                *slot = item;
                self.changed();
                true
            }
            None => false,
        }
    }

    /// Non-blank entries, in order
    pub fn values(&self) -> Vec<T> {
        self.items.iter().filter(|i| !i.is_blank()).cloned().collect()
    }

    pub fn problems(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|i| !i.is_blank())
            .filter_map(|i| i.problem())
            .collect()
    }

    fn changed(&self) {
        self.notifier.emit(&self.values());
    }
}

impl<T: ListEntry> BoundForm for ListForm<T> {
    type Value = Vec<T>;

    fn load(&mut self, value: Option<&Vec<T>>) {
        self.items = value.cloned().unwrap_or_default();
    }

    fn current_value(&self) -> Vec<T> {
        self.values()
    }

    fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    fn on_change(&mut self, callback: ChangeCallback<Vec<T>>) {
        self.notifier.set(callback);
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ListForm<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

impl ListForm<KeyValue> {
    pub fn load_map(&mut self, map: &BTreeMap<String, String>) {
        self.items = map.iter().map(|(k, v)| KeyValue::new(k, v)).collect();
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.values().into_iter().map(|kv| (kv.key, kv.value)).collect()
    }
}

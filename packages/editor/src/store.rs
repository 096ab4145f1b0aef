//! # Document Store
//!
//! Single holder of the current devfile content and of the last text known
//! to be persisted on disk.
//!
//! The store is a cheap, cloneable handle. Every clone sees the same state.
//!
//! ## Notification contract
//!
//! ```text
//! replace(content, external)
//!   ├─ external? → saved snapshot := content.content
//!   ├─ modified  := content.content != saved snapshot
//!   └─ observers(content, modified), in subscription order, before returning
//! ```
//!
//! Observers run outside the state lock, so they may read the store. They
//! must not call [`DocumentStore::replace`] themselves.

use devstate_devfile::DevfileContent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// What observers receive on every `replace`
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    pub content: DevfileContent,
    pub modified: bool,
    pub from_external_authority: bool,
}

type Observer = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

#[derive(Default)]
struct StoreState {
    current: Option<DevfileContent>,
    saved: Option<String>,
    modified: bool,
}

#[derive(Default)]
struct Inner {
    state: Mutex<StoreState>,
    observers: Mutex<Vec<(u64, Observer)>>,
    next_observer: AtomicU64,
    // Held across update + notification so observers see replaces in call order
    replacing: Mutex<()>,
}

#[derive(Clone, Default)]
pub struct DocumentStore {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current content; `None` until the first load
    pub fn current(&self) -> Option<DevfileContent> {
        lock(&self.inner.state).current.clone()
    }

    /// Raw text last confirmed as persisted
    pub fn saved_snapshot(&self) -> Option<String> {
        lock(&self.inner.state).saved.clone()
    }

    pub fn is_modified(&self) -> bool {
        lock(&self.inner.state).modified
    }

    pub fn replace(&self, content: DevfileContent, from_external_authority: bool) {
        let _order = lock(&self.inner.replacing);

        let event = {
            let mut state = lock(&self.inner.state);
            if from_external_authority {
                state.saved = Some(content.content.clone());
            }
            state.modified = state.saved.as_deref() != Some(content.content.as_str());
            state.current = Some(content.clone());
            StoreEvent {
                content,
                modified: state.modified,
                from_external_authority,
            }
        };

        let observers: Vec<Observer> = lock(&self.inner.observers)
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer(&event);
        }
    }

    /// Register an observer for every later `replace`. Dropping the returned
    /// handle unsubscribes.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.observers).push((id, Arc::new(observer)));
        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    pub fn observer_count(&self) -> usize {
        lock(&self.inner.observers).len()
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("DocumentStore")
            .field("loaded", &state.current.is_some())
            .field("modified", &state.modified)
            .finish()
    }
}

/// Live observer registration
pub struct Subscription {
    id: u64,
    store: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            lock(&inner.observers).retain(|(id, _)| *id != self.id);
        }
    }
}

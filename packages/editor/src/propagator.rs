//! # Change Propagator
//!
//! The only path by which candidate documents reach the [`DocumentStore`].
//!
//! ## Origins
//!
//! | origin               | store call                     |
//! |----------------------|--------------------------------|
//! | local edit           | `replace(c, false)`            |
//! | initial load         | `replace(c, true)`             |
//! | save completed       | `replace(c, true)`             |
//! | external, unchanged  | nothing                        |
//! | external, clean      | `replace(c, true)`             |
//! | external, dirty      | prompt; accept → `replace(c, true)` |
//!
//! ## Prompt state machine
//!
//! ```text
//!            dirty notification            newer dirty notification
//!   Idle ───────────────────────▶ PromptShown ◀──────────────┐
//!    ▲                               │   └───────────────────┘
//!    └──── accept / decline ─────────┘      (old prompt dismissed)
//! ```
//!
//! A local edit leaves a pending prompt alone; the prompt keeps the payload
//! captured when it was raised.
//!
//! [`ChangePropagator::plan_external`] decides without side effects, so a
//! caller that must sync the backend first can do that before
//! [`ChangePropagator::apply_external`] commits to the store.

use crate::errors::{EditorError, EditorResult};
use crate::store::DocumentStore;
use devstate_devfile::DevfileContent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type PromptId = u64;

/// A pending "keep my edits / take the update" question
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictPrompt {
    pub id: PromptId,
    pub content: DevfileContent,
}

/// UI side of the prompt. `show` is called when a prompt is raised, `dismiss`
/// when a shown prompt is withdrawn without a user decision.
pub trait ConflictPrompter: Send + Sync {
    fn show(&self, prompt: &ConflictPrompt);
    fn dismiss(&self, id: PromptId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep local edits; the store is untouched
    KeepLocal,
    /// Replace local content with the external document
    AcceptExternal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalOutcome {
    /// Same text as the saved snapshot
    Ignored,
    /// Applied without asking
    Applied,
    Prompted {
        id: PromptId,
        superseded: Option<PromptId>,
    },
}

/// What an external document calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalPlan {
    Ignore,
    Apply,
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagatorState {
    Idle,
    PromptShown(PromptId),
}

pub struct ChangePropagator {
    store: DocumentStore,
    prompter: Arc<dyn ConflictPrompter>,
    pending: Mutex<Option<ConflictPrompt>>,
    next_prompt: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChangePropagator {
    pub fn new(store: DocumentStore, prompter: Arc<dyn ConflictPrompter>) -> Self {
        Self {
            store,
            prompter,
            pending: Mutex::new(None),
            next_prompt: AtomicU64::new(1),
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn load_initial(&self, content: DevfileContent) {
        tracing::debug!("Initial document loaded");
        self.store.replace(content, true);
    }

    pub fn apply_local(&self, content: DevfileContent) {
        self.store.replace(content, false);
    }

    /// The given content is now what is on disk
    pub fn save_completed(&self, content: DevfileContent) {
        tracing::debug!("Save completed");
        self.store.replace(content, true);
    }

    /// Decide what an external document calls for, without touching the
    /// store or the prompt slot
    pub fn plan_external(&self, content: &DevfileContent) -> ExternalPlan {
        if self.store.saved_snapshot().as_deref() == Some(content.content.as_str()) {
            ExternalPlan::Ignore
        } else if !self.store.is_modified() {
            ExternalPlan::Apply
        } else {
            ExternalPlan::Prompt
        }
    }

    /// Take an external document as the new saved state, withdrawing any
    /// pending prompt
    pub fn apply_external(&self, content: DevfileContent) {
        let withdrawn = lock(&self.pending).take();
        if let Some(prompt) = withdrawn {
            self.prompter.dismiss(prompt.id);
        }
        tracing::info!("Applying external update");
        self.store.replace(content, true);
    }

    /// Ask the user about an external document, superseding any pending
    /// prompt. The store is not touched.
    pub fn raise_prompt(&self, content: DevfileContent) -> ExternalOutcome {
        let id = self.next_prompt.fetch_add(1, Ordering::Relaxed);
        let prompt = ConflictPrompt { id, content };
        let superseded = lock(&self.pending)
            .replace(prompt.clone())
            .map(|old| old.id);

        if let Some(old) = superseded {
            self.prompter.dismiss(old);
        }
        tracing::info!(prompt = id, superseded = ?superseded, "External update conflicts with unsaved edits");
        self.prompter.show(&prompt);

        ExternalOutcome::Prompted { id, superseded }
    }

    /// Plan and carry out an external document in one step
    pub fn on_external(&self, content: DevfileContent) -> ExternalOutcome {
        match self.plan_external(&content) {
            ExternalPlan::Ignore => {
                tracing::debug!("External update matches saved snapshot, ignoring");
                ExternalOutcome::Ignored
            }
            ExternalPlan::Apply => {
                self.apply_external(content);
                ExternalOutcome::Applied
            }
            ExternalPlan::Prompt => self.raise_prompt(content),
        }
    }

    /// The pending prompt, if `id` is still the one shown
    pub fn prompt(&self, id: PromptId) -> EditorResult<ConflictPrompt> {
        match lock(&self.pending).as_ref() {
            Some(prompt) if prompt.id == id => Ok(prompt.clone()),
            _ => Err(EditorError::StalePrompt(id)),
        }
    }

    pub fn resolve_prompt(&self, id: PromptId, decision: Decision) -> EditorResult<()> {
        let prompt = {
            let mut pending = lock(&self.pending);
            match pending.as_ref() {
                Some(prompt) if prompt.id == id => pending.take(),
                _ => None,
            }
        };
        let Some(prompt) = prompt else {
            return Err(EditorError::StalePrompt(id));
        };

        match decision {
            Decision::AcceptExternal => {
                tracing::info!(prompt = id, "External update accepted");
                self.store.replace(prompt.content, true);
            }
            Decision::KeepLocal => {
                tracing::info!(prompt = id, "External update declined");
            }
        }
        Ok(())
    }

    pub fn pending_prompt(&self) -> Option<ConflictPrompt> {
        lock(&self.pending).clone()
    }

    pub fn state(&self) -> PropagatorState {
        match lock(&self.pending).as_ref() {
            Some(prompt) => PropagatorState::PromptShown(prompt.id),
            None => PropagatorState::Idle,
        }
    }
}

/// Prompter that records calls, for tests and headless use
#[derive(Debug, Default)]
pub struct RecordingPrompter {
    calls: Mutex<Vec<PrompterCall>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrompterCall {
    Show(ConflictPrompt),
    Dismiss(PromptId),
}

impl RecordingPrompter {
    pub fn calls(&self) -> Vec<PrompterCall> {
        lock(&self.calls).clone()
    }

    /// Prompts shown and not dismissed, in order
    pub fn visible(&self) -> Vec<PromptId> {
        let mut visible = Vec::new();
        for call in lock(&self.calls).iter() {
            match call {
                PrompterCall::Show(prompt) => visible.push(prompt.id),
                PrompterCall::Dismiss(id) => visible.retain(|v| v != id),
            }
        }
        visible
    }
}

impl ConflictPrompter for RecordingPrompter {
    fn show(&self, prompt: &ConflictPrompt) {
        lock(&self.calls).push(PrompterCall::Show(prompt.clone()));
    }

    fn dismiss(&self, id: PromptId) {
        lock(&self.calls).push(PrompterCall::Dismiss(id));
    }
}

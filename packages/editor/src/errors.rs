//! Error types for the editor

use crate::gateway::GatewayError;
use devstate_devfile::DevfileError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Devfile error: {0}")]
    Devfile(#[from] DevfileError),

    #[error("Backend error: {0}")]
    Gateway(#[from] GatewayError),

    /// Uniqueness or reference check failed before reaching the backend
    #[error("{identifier:?} {reason}")]
    Conflict { identifier: String, reason: String },

    #[error("Invalid form: {0}")]
    InvalidForm(String),

    #[error("Name is locked in edit mode")]
    NameLocked,

    #[error("No document loaded")]
    NotLoaded,

    #[error("Prompt {0} is not pending")]
    StalePrompt(u64),
}

impl EditorError {
    pub fn conflict(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        EditorError::Conflict {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }
}

pub type EditorResult<T> = Result<T, EditorError>;

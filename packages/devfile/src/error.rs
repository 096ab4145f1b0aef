use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevfileError {
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid devfile: {0}")]
    Invalid(String),

    #[error("Invalid name {name:?}: must consist of lower case alphanumeric characters or '-', start and end with an alphanumeric character, and be at most 63 characters")]
    InvalidName { name: String },

    #[error("{kind} {name:?} already exists")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{kind} {name:?} references unknown {target} {reference:?}")]
    UnknownReference {
        kind: &'static str,
        name: String,
        target: &'static str,
        reference: String,
    },

    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} {name:?} is used by {user}")]
    InUse {
        kind: &'static str,
        name: String,
        user: String,
    },
}

impl DevfileError {
    /// Identifier the error is about, when there is one
    pub fn identifier(&self) -> Option<&str> {
        match self {
            DevfileError::InvalidName { name }
            | DevfileError::DuplicateName { name, .. }
            | DevfileError::NotFound { name, .. }
            | DevfileError::InUse { name, .. } => Some(name),
            DevfileError::UnknownReference { reference, .. } => Some(reference),
            DevfileError::Parse(_) | DevfileError::Invalid(_) => None,
        }
    }
}

pub type DevfileResult<T> = Result<T, DevfileError>;

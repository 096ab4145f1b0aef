//! # Devfile model
//!
//! Parsing, validation and serialization of devfile documents, and the
//! per-section view ([`DevfileContent`]) that the editor and the document
//! service exchange.
//!
//! ```text
//! YAML text ──parse──▶ Devfile (schema) ──validate──▶ DevfileContent
//!     ▲                     │
//!     └─────── to_yaml ─────┘
//! ```

pub mod api;
pub mod content;
pub mod error;
pub mod quantity;
pub mod schema;
pub mod validate;

pub use content::{
    Annotation, Command, CommandBody, CompositeCommand, ComponentRef, Container, DevfileContent,
    Endpoint, EnvVar, Events, ExecCommand, Image, Metadata, Resource, SectionKind, Volume,
    VolumeMount, EVENT_NAMES,
};
pub use error::{DevfileError, DevfileResult};
pub use quantity::is_valid_quantity;
pub use schema::{Devfile, DEFAULT_SCHEMA_VERSION};
pub use validate::{check_name, is_valid_name, validate, MAX_NAME_LEN};

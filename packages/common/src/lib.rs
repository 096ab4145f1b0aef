//! Shared error type and the file system seam used by the devstate crates.

pub mod error;
pub mod filesystem;

pub use error::*;
pub use filesystem::*;

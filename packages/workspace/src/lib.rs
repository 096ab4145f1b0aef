//! # Devstate service
//!
//! Keeps an in-memory devfile ("devstate") that clients edit section by
//! section, persists it to disk on request, and pushes on-disk changes to
//! subscribers.
//!
//! ```text
//! client ──HTTP──▶ server ──▶ DevfileState (validate, commit)
//!        ◀──SSE─── server ◀── watcher (devfile on disk)
//! ```

pub mod config;
pub mod server;
pub mod state;
pub mod watcher;

pub use config::{ConfigError, ServerConfig, TelemetryConfig, CONFIG_FILE_NAME};
pub use server::{ApiError, DevstateServer};
pub use state::{DevfileState, StateError, StateResult};
pub use watcher::{watch_devfile, EchoGuard, FileWatcher, WatcherError, WatcherResult};

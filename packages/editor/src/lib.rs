//! # Devstate Editor
//!
//! Client-side editing core for a devfile kept by the devstate service.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ forms: structured editors per section       │
//! │  - create / edit mode, locked identifiers   │
//! │  - inline creation of dependencies          │
//! └─────────────────────────────────────────────┘
//!                     ↓ Submission
//! ┌─────────────────────────────────────────────┐
//! │ session: gateway call → propagator          │
//! │  - HTTP + SSE to the service (gateway)      │
//! │  - local vs external changes (propagator)   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ store: current content + saved snapshot     │
//! │  - observers notified on every replace      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Service is the authority**: every mutation returns the full document
//! 2. **One writer**: the store is only replaced through the propagator
//! 3. **Never drop local work silently**: external changes over unsaved
//!    edits raise a conflict prompt
//!
//! ## Usage
//!
//! ```rust,ignore
//! use devstate_editor::{forms::{BoundForm, ContainerForm, SectionForm}, HttpGateway, Session};
//!
//! let gateway = Arc::new(HttpGateway::new(GatewayConfig::default()));
//! let session = Session::connect(gateway, prompter, DEFAULT_TELEMETRY_ENDPOINT).await;
//! session.start().await?;
//!
//! let mut form = ContainerForm::new();
//! form.load(None);
//! form.set_name("runtime")?;
//! form.set_image("node:18");
//! session.submit(form.submit()?).await?;
//! session.save().await?;
//! ```

mod errors;
pub mod forms;
pub mod gateway;
mod propagator;
mod session;
mod store;
pub mod telemetry;

pub use errors::{EditorError, EditorResult};
pub use gateway::{
    BackendGateway, GatewayConfig, GatewayError, GatewayResult, HttpGateway, Notification,
    SectionValue,
};
pub use propagator::{
    ChangePropagator, ConflictPrompt, ConflictPrompter, Decision, ExternalOutcome, ExternalPlan,
    PromptId, PrompterCall, PropagatorState, RecordingPrompter,
};
pub use session::Session;
pub use store::{DocumentStore, StoreEvent, Subscription};
pub use telemetry::{
    NoopSink, RecordingSink, SectionAction, SegmentSink, TelemetryEvent, TelemetrySink,
    DEFAULT_TELEMETRY_ENDPOINT,
};

// Re-export devfile types used throughout the editor API
pub use devstate_devfile::{DevfileContent, SectionKind};

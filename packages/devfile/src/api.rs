//! Request and response bodies of the document service, shared by the
//! service routes and the HTTP gateway.

use serde::{Deserialize, Serialize};

/// Path prefix of every service route
pub const API_PREFIX: &str = "/api/v1";

/// SSE event name for out-of-band devfile changes
pub const DEVFILE_UPDATED_EVENT: &str = "DevfileUpdated";

/// Raw devfile text, used by `/devfile`, `/devstate/devfile` and notifications
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBody {
    pub content: String,
}

/// Error body returned with every non-2xx response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityRequest {
    pub quantity: String,
}

/// Move of a command between (or within) groups, addressed by position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMove {
    pub previous_group: String,
    pub new_group: String,
    pub previous_index: usize,
    pub new_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDefaultRequest {
    pub group: String,
}

/// New command list for one lifecycle event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    pub event_name: String,
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySettings {
    pub enabled: bool,
    #[serde(default)]
    pub apikey: String,
    #[serde(default)]
    pub userid: String,
}

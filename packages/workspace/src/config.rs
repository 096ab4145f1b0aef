//! Service configuration, read from `devstate.config.json` in the root
//! directory. Every field is optional.
//!
//! ```json
//! {
//!   "bind": "127.0.0.1:20000",
//!   "devfilePath": "devfile.yaml",
//!   "keepAliveSecs": 15,
//!   "telemetry": { "enabled": true, "apikey": "...", "userid": "" }
//! }
//! ```

use devstate_common::{CommonError, FileSystem};
use devstate_devfile::api::TelemetrySettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "devstate.config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[from] CommonError),

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub bind: String,
    /// Devfile location, relative to the root directory
    pub devfile_path: PathBuf,
    pub keep_alive_secs: u64,
    pub telemetry: TelemetryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:20000".to_string(),
            devfile_path: PathBuf::from("devfile.yaml"),
            keep_alive_secs: 15,
            telemetry: TelemetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub apikey: String,
    /// Generated once per process when empty
    pub userid: String,
}

impl ServerConfig {
    /// Load `devstate.config.json` from `root`, or defaults when absent
    pub fn load(root: &Path, fs: &dyn FileSystem) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE_NAME);
        if !fs.exists(&path) {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default().resolved());
        }
        let text = fs.read_to_string(&path)?;
        let config: ServerConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path, source })?;
        Ok(config.resolved())
    }

    fn resolved(mut self) -> Self {
        if self.telemetry.enabled && self.telemetry.userid.is_empty() {
            self.telemetry.userid = uuid::Uuid::new_v4().to_string();
        }
        self
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn telemetry_settings(&self) -> TelemetrySettings {
        if !self.telemetry.enabled {
            return TelemetrySettings::default();
        }
        TelemetrySettings {
            enabled: true,
            apikey: self.telemetry.apikey.clone(),
            userid: self.telemetry.userid.clone(),
        }
    }
}

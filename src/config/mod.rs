//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`SIMLINK_*`)
//! - CLI arguments (for the `simlink` binary)
//!
//! ```toml
//! base_port = 5005
//! worker_id = 0
//! seed = 0
//! timeout_wait_secs = 60
//!
//! [engine]
//! width = 84
//! height = 84
//! time_scale = 20.0
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimLinkError};
use crate::protocol::{BASE_ENVIRONMENT_PORT, DEFAULT_EDITOR_PORT};
use crate::side_channel::EngineConfig;

/// Environment connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// First port used by launched simulations
    pub base_port: u16,

    /// Offset added to `base_port`, one per concurrent environment
    pub worker_id: u16,

    /// Connect to a simulation running in the editor instead of a build
    pub editor: bool,

    /// Seed forwarded to the simulation during the handshake
    pub seed: i32,

    /// Seconds to wait for the simulation to connect and answer the handshake
    pub timeout_wait_secs: u64,

    /// Directory for simulation logs
    pub log_folder: Option<PathBuf>,

    /// Engine settings pushed through the engine configuration channel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineConfig>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            base_port: BASE_ENVIRONMENT_PORT,
            worker_id: 0,
            editor: false,
            seed: 0,
            timeout_wait_secs: 60,
            log_folder: dirs::cache_dir().map(|p| p.join("simlink").join("logs")),
            engine: None,
        }
    }
}

impl EnvConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            SimLinkError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        toml::from_str(&content)
            .map_err(|e| SimLinkError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; unparsable values are ignored
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(port) = lookup("SIMLINK_BASE_PORT").and_then(|v| v.parse().ok()) {
            config.base_port = port;
        }
        if let Some(id) = lookup("SIMLINK_WORKER_ID").and_then(|v| v.parse().ok()) {
            config.worker_id = id;
        }
        if let Some(editor) = lookup("SIMLINK_EDITOR").and_then(|v| parse_flag(&v)) {
            config.editor = editor;
        }
        if let Some(seed) = lookup("SIMLINK_SEED").and_then(|v| v.parse().ok()) {
            config.seed = seed;
        }
        if let Some(secs) = lookup("SIMLINK_TIMEOUT_WAIT").and_then(|v| v.parse().ok()) {
            config.timeout_wait_secs = secs;
        }
        if let Some(folder) = lookup("SIMLINK_LOG_FOLDER") {
            config.log_folder = Some(PathBuf::from(folder));
        }

        config
    }

    /// Merge with another config (other takes precedence where it differs from defaults)
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        let defaults = Self::default();
        Self {
            base_port: if other.base_port != defaults.base_port {
                other.base_port
            } else {
                self.base_port
            },
            worker_id: if other.worker_id != defaults.worker_id {
                other.worker_id
            } else {
                self.worker_id
            },
            editor: other.editor || self.editor,
            seed: if other.seed != defaults.seed {
                other.seed
            } else {
                self.seed
            },
            timeout_wait_secs: if other.timeout_wait_secs != defaults.timeout_wait_secs {
                other.timeout_wait_secs
            } else {
                self.timeout_wait_secs
            },
            log_folder: if other.log_folder != defaults.log_folder {
                other.log_folder
            } else {
                self.log_folder
            },
            engine: other.engine.or(self.engine),
        }
    }

    /// Port to listen on: the editor port, or `base_port + worker_id`
    pub fn port(&self) -> Result<u16> {
        if self.editor {
            return Ok(DEFAULT_EDITOR_PORT);
        }
        self.base_port.checked_add(self.worker_id).ok_or_else(|| {
            SimLinkError::Config(format!(
                "base_port {} + worker_id {} overflows the port range",
                self.base_port, self.worker_id
            ))
        })
    }

    /// Handshake/connection timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_wait_secs)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

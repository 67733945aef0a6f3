//! Session and transport configuration.
//!
//! Every field has a default, so an embedding host can pass an empty JSON
//! object, or only override what its own config file sets.
//!
//! # Example
//!
//! ```
//! use scriptwire_host::config::SessionConfig;
//!
//! let config = SessionConfig::from_json_str(r#"{ "debug": { "enabled": false } }"#).unwrap();
//! assert!(!config.debug.enabled);
//! assert_eq!(config.init_callback, "OnGameModeInit");
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::control::{build_version, PROTOCOL_VERSION};
use crate::error::Result;
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;

/// Default pipe name.
pub const DEFAULT_PIPE_NAME: &str = "scriptwire";

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Largest payload accepted or produced, in bytes.
    pub max_payload_size: u32,
    /// Protocol version sent in the announcement.
    pub protocol_version: u32,
    /// Build version sent in the announcement.
    pub build_version: u32,
    /// Directory announced to the remote; the process cwd when unset.
    pub working_dir: Option<PathBuf>,
    /// Callback marking the host script's init.
    pub init_callback: String,
    /// Callback marking the host script's exit.
    pub exit_callback: String,
    /// Host command run for the restart start mode.
    pub init_command: String,
    /// Suspended-peer detection.
    pub debug: DebugConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            protocol_version: PROTOCOL_VERSION,
            build_version: build_version(),
            working_dir: None,
            init_callback: "OnGameModeInit".to_string(),
            exit_callback: "OnGameModeExit".to_string(),
            init_command: "gmx".to_string(),
            debug: DebugConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Timings for the suspended-peer heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    /// Staleness after which the peer is presumed paused.
    pub pause_timeout_secs: u64,
    /// Minimum gap between keepalive heartbeats while paused.
    pub keepalive_interval_secs: u64,
    /// Heartbeats that must be skipped before a keepalive is let through.
    pub keepalive_min_skipped: u32,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pause_timeout_secs: 5,
            keepalive_interval_secs: 7,
            keepalive_min_skipped: 50,
        }
    }
}

impl DebugConfig {
    pub fn pause_timeout(&self) -> Duration {
        Duration::from_secs(self.pause_timeout_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

/// Configuration for [`PipeChannel`](crate::transport::PipeChannel).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Pipe name used to derive the default path.
    pub name: String,
    /// Explicit socket/pipe path, overriding `name`.
    pub path: Option<String>,
    /// Longest wait for inbound data per receive call. Every tick pays this
    /// once when the pipe is idle.
    pub poll_interval_ms: u64,
    /// Longest wait for a peer per connect call.
    pub connect_timeout_ms: u64,
    /// Largest inbound payload accepted.
    pub max_payload_size: u32,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_PIPE_NAME.to_string(),
            path: None,
            poll_interval_ms: 1,
            connect_timeout_ms: 1,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl PipeConfig {
    /// Receive wait, at least one timer tick so the reactor gets to run.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Connect wait, at least one timer tick.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }

    /// Resolve the platform path for this pipe.
    ///
    /// - Unix: `/tmp/{name}.sock`
    /// - Windows: `\\.\pipe\{name}`
    pub fn resolved_path(&self) -> String {
        if let Some(path) = &self.path {
            return path.clone();
        }

        #[cfg(unix)]
        {
            format!("/tmp/{}.sock", self.name)
        }

        #[cfg(windows)]
        {
            format!(r"\\.\pipe\{}", self.name)
        }
    }
}

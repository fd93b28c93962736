//! Optional TOML configuration file.
//!
//! Everything the command line does not cover lives here.  Every key is
//! optional; an absent key keeps the built-in default.
//!
//! ```toml
//! [module]
//! name = "ROS Bridge"
//! manufacturer = "CREST"
//! capabilities_path = "config/ros_bridge_capabilities.xml"
//! configuration_path = "config/ros_bridge_configuration.xml"
//!
//! [link]
//! retry_delay_secs = 5
//! connect_timeout_secs = 10
//! handshake_timeout_secs = 30
//! user_agent = "ros-bridge/0.1.0 websocket-client-async"
//! ```
//!
//! Host, port, and target come from the command line only; naming them in
//! `[link]` is a parse error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::config::{BridgeConfig, ModuleIdentity};

/// Error type for configuration file loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// Top-level file layout.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub module: ModuleSection,
    #[serde(default)]
    pub link: LinkSection,
}

/// `[module]`: identity announced on the middleware bus.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleSection {
    pub name: String,
    pub model: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub version: String,
    pub description: String,
    pub capabilities_path: PathBuf,
    pub configuration_path: PathBuf,
}

impl Default for ModuleSection {
    fn default() -> Self {
        let identity = ModuleIdentity::default();
        Self {
            name: identity.name,
            model: identity.model,
            manufacturer: identity.manufacturer,
            serial_number: identity.serial_number,
            version: identity.version,
            description: identity.description,
            capabilities_path: identity.capabilities_path,
            configuration_path: identity.configuration_path,
        }
    }
}

/// `[link]`: reconnect and per-attempt settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LinkSection {
    /// Seconds between the end of one attempt and the next.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Seconds allowed for the TCP connect phase.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Seconds allowed for the websocket upgrade.
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// Overrides the default `User-Agent`.
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_retry_delay_secs() -> u64 {
    5
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_handshake_timeout_secs() -> u64 {
    30
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            retry_delay_secs: default_retry_delay_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            user_agent: None,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
pub fn parse(text: &str) -> Result<FileConfig, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Reads and parses the file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, or
/// [`ConfigError::Parse`] if it is not valid.
pub fn load(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text)
}

impl FileConfig {
    /// Writes every file setting into `config`.
    pub fn apply_to(self, config: &mut BridgeConfig) {
        let module = self.module;
        config.module = ModuleIdentity {
            name: module.name,
            model: module.model,
            manufacturer: module.manufacturer,
            serial_number: module.serial_number,
            version: module.version,
            description: module.description,
            capabilities_path: module.capabilities_path,
            configuration_path: module.configuration_path,
        };

        let link = self.link;
        config.link.retry_delay = Duration::from_secs(link.retry_delay_secs);
        config.link.session.connect_timeout = Duration::from_secs(link.connect_timeout_secs);
        config.link.session.handshake_timeout = Duration::from_secs(link.handshake_timeout_secs);
        if let Some(user_agent) = link.user_agent {
            config.link.session.user_agent = user_agent;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

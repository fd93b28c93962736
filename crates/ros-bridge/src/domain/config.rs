//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! `main.rs` builds it from CLI arguments layered over the optional TOML file
//! (see [`crate::infrastructure::config_file`]); tests build it directly or
//! start from [`BridgeConfig::default`].
//!
//! The struct is split by consumer:
//!
//! - [`LinkConfig`] – everything the reconnect supervisor needs to open
//!   connection attempts (peer address plus [`SessionOptions`]).
//! - [`ModuleIdentity`] – what the bridge announces about itself on the
//!   middleware bus at startup.

use std::path::PathBuf;
use std::time::Duration;

/// Default rosbridge host.
pub const DEFAULT_HOST: &str = "10.0.0.195";
/// Default rosbridge port.
pub const DEFAULT_PORT: u16 = 9090;
/// Default websocket request target.
pub const DEFAULT_TARGET: &str = "/";

/// Timeouts and decoration for one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Upper bound on the TCP connect phase (all resolved candidates).
    pub connect_timeout: Duration,
    /// Upper bound on the websocket upgrade handshake.
    pub handshake_timeout: Duration,
    /// `User-Agent` header sent with the upgrade request.
    pub user_agent: String,
    /// Log outbound queue depth and per-write traces.
    pub verbose: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(30),
            user_agent: default_user_agent(),
            verbose: false,
        }
    }
}

/// Returns the `User-Agent` sent when none is configured.
pub fn default_user_agent() -> String {
    format!("ros-bridge/{} websocket-client-async", env!("CARGO_PKG_VERSION"))
}

/// Where the peer lives and how to keep reconnecting to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Host name or IP address of the rosbridge server.
    pub host: String,
    /// TCP port of the rosbridge server.
    pub port: u16,
    /// Request target of the websocket upgrade, e.g. `/`.
    pub target: String,
    /// Pause between the end of one attempt and the start of the next.
    pub retry_delay: Duration,
    /// Per-attempt options.
    pub session: SessionOptions,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            target: DEFAULT_TARGET.to_string(),
            retry_delay: Duration::from_secs(5),
            session: SessionOptions::default(),
        }
    }
}

/// How the bridge describes itself to the middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleIdentity {
    /// Module display name.
    pub name: String,
    /// Model name.
    pub model: String,
    /// Manufacturer.
    pub manufacturer: String,
    /// Serial number.
    pub serial_number: String,
    /// Module version.
    pub version: String,
    /// One-line description.
    pub description: String,
    /// File holding the capabilities schema document.
    pub capabilities_path: PathBuf,
    /// File holding the capabilities configuration document.
    pub configuration_path: PathBuf,
}

impl Default for ModuleIdentity {
    fn default() -> Self {
        Self {
            name: "ROS Bridge".to_string(),
            model: "ROS Bridge".to_string(),
            manufacturer: "CREST".to_string(),
            serial_number: "0000".to_string(),
            version: "0.1.0".to_string(),
            description: "A bridge module to connect MoHSES to a ROS instance.".to_string(),
            capabilities_path: PathBuf::from("config/ros_bridge_capabilities.xml"),
            configuration_path: PathBuf::from("config/ros_bridge_configuration.xml"),
        }
    }
}

/// All runtime configuration for the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Peer address and reconnect policy.
    pub link: LinkConfig,
    /// Identity announced on the middleware bus.
    pub module: ModuleIdentity,
    /// Verbose diagnostics (debug logging, queue depth, first samples).
    pub verbose: bool,
    /// Start the simulation automatically once linked.  Carried for
    /// operators and reported at startup; the bridge logic does not act on it.
    pub autostart: bool,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

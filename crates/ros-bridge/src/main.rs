//! ROS Bridge entry point.
//!
//! Joins the simulation-middleware bus, announces the module, and keeps a
//! websocket link to a rosbridge server alive until the operator exits.
//!
//! # Usage
//!
//! ```text
//! ros-bridge [OPTIONS]
//!
//! Options:
//!   --host <HOST>       rosbridge host [default: 10.0.0.195]
//!   --port <PORT>       rosbridge port [default: 9090]
//!   --target <PATH>     websocket request target [default: /]
//!   -v, --verbose       debug logging and diagnostics
//!   --autostart         start the simulation once linked
//!   --config <FILE>     optional TOML file ([module], [link])
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable             | Default      | Description                |
//! |----------------------|--------------|----------------------------|
//! | `ROS_BRIDGE_HOST`    | `10.0.0.195` | rosbridge host             |
//! | `ROS_BRIDGE_PORT`    | `9090`       | rosbridge port             |
//! | `ROS_BRIDGE_TARGET`  | `/`          | websocket request target   |
//! | `ROS_BRIDGE_CONFIG`  | (none)       | TOML configuration file    |
//! | `RUST_LOG`           | `info`       | log filter; wins over `-v` |
//!
//! # Startup sequence
//!
//! ```text
//! main()
//!  └─ EventBridge::register_handlers()  -- one handler per event kind
//!  └─ LocalBus::serve()                 -- middleware dispatch loop
//!  └─ publish_module_documents()        -- description + configuration
//!  └─ watch_operator()                  -- stdin line / Ctrl+C
//!  └─ ReconnectSupervisor::run()        -- until shutdown
//!  └─ Middleware::shutdown()
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use amm_core::{HandlerTable, LocalBus, Middleware, ModuleId};
use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ros_bridge::application::EventBridge;
use ros_bridge::domain::config::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TARGET};
use ros_bridge::domain::BridgeConfig;
use ros_bridge::infrastructure::{
    config_file, publish_module_documents, watch_operator, ReconnectSupervisor, ShutdownHandle,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Bridges simulation-middleware events to a rosbridge websocket server.
#[derive(Debug, Parser)]
#[command(
    name = "ros-bridge",
    about = "Bridges simulation-middleware events to a rosbridge websocket server",
    version
)]
struct Cli {
    /// Host name or IP address of the rosbridge server.
    #[arg(long, default_value = DEFAULT_HOST, env = "ROS_BRIDGE_HOST")]
    host: String,

    /// TCP port of the rosbridge server.
    #[arg(long, default_value_t = DEFAULT_PORT, env = "ROS_BRIDGE_PORT")]
    port: u16,

    /// Request target of the websocket upgrade.
    #[arg(long, default_value = DEFAULT_TARGET, env = "ROS_BRIDGE_TARGET")]
    target: String,

    /// Debug logging, queue depth traces, and first-sample diagnostics.
    #[arg(short, long)]
    verbose: bool,

    /// Start the simulation automatically once linked.
    #[arg(long)]
    autostart: bool,

    /// Optional TOML configuration file.
    #[arg(long, env = "ROS_BRIDGE_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Resolves the final configuration: defaults, then the file, then the
    /// command line.
    ///
    /// # Errors
    ///
    /// Returns an error if `--config` names a file that cannot be read or
    /// parsed.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let mut config = BridgeConfig::default();

        if let Some(path) = &self.config {
            config_file::load(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?
                .apply_to(&mut config);
        }

        config.link.host = self.host;
        config.link.port = self.port;
        config.link.target = self.target;
        config.link.session.verbose = self.verbose;
        config.verbose = self.verbose;
        config.autostart = self.autostart;
        Ok(config)
    }
}

/// `RUST_LOG` when set, otherwise `info` (or `debug` with `--verbose`).
fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(cli.verbose))
        .init();

    let config = cli.into_bridge_config()?;

    info!(
        "ROS Bridge starting: host={} port={} target={} autostart={}",
        config.link.host, config.link.port, config.link.target, config.autostart
    );

    // ── Middleware ────────────────────────────────────────────────────────────
    let bus = LocalBus::new();
    let bridge = Arc::new(EventBridge::new(config.verbose));

    let mut table = HandlerTable::new();
    bridge
        .register_handlers(&mut table)
        .context("failed to register middleware handlers")?;
    let serve = bus
        .serve(table)
        .context("failed to start middleware dispatch")?;

    publish_module_documents(&bus, &config.module, ModuleId::generate())
        .context("failed to announce module")?;

    // ── Link ──────────────────────────────────────────────────────────────────
    let shutdown = ShutdownHandle::new();
    watch_operator(&shutdown);
    info!("ROS Bridge ready. Press return to exit.");

    let supervisor = ReconnectSupervisor::new(config.link.clone(), Arc::clone(&bridge), shutdown);
    supervisor.run().await;

    // ── Teardown ──────────────────────────────────────────────────────────────
    bus.shutdown();
    if let Err(e) = serve.await {
        warn!("middleware dispatch task failed: {e}");
    }

    info!("ROS Bridge shutdown.");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

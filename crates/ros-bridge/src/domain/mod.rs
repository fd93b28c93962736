//! Domain layer for ros-bridge.
//!
//! Pure types with no I/O, no async runtime, and no sockets:
//!
//! - configuration ([`BridgeConfig`] and its parts),
//! - the rosbridge JSON message shapes,
//! - the telemetry cache and the simulation status machine.

pub mod config;
pub mod messages;
pub mod simulation;
pub mod telemetry;

pub use config::{BridgeConfig, LinkConfig, ModuleIdentity, SessionOptions};
pub use messages::{PublishEnvelope, SpeechText};
pub use simulation::{SimulationState, SimulationStatus};
pub use telemetry::{channels, TelemetryCache};

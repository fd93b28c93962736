//! ros-bridge library crate.
//!
//! Bridges the simulation-middleware bus to a rosbridge websocket peer.
//! Selected middleware events become rosbridge `publish` messages, and what
//! the peer sends back is interpreted and logged.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! middleware bus (amm-core)
//!         ↓ SimEvent
//! [ros-bridge]
//!   ├── domain/            Config, wire message shapes, telemetry cache,
//!   │                      simulation status
//!   ├── application/       EventBridge, inbound interpretation,
//!   │                      physiology-modification parsing
//!   └── infrastructure/
//!         ├── session/         One websocket attempt (tokio-tungstenite)
//!         ├── outbound_queue/  Single-flight FIFO writer
//!         ├── supervisor/      Reconnect loop
//!         └── shutdown/        Operator shutdown (stdin, Ctrl+C)
//!         ↕ JSON text frames
//! rosbridge peer
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async runtime.
//! - `application` depends on `domain` and `amm-core`; it sends through the
//!   [`application::MessageSink`] trait and never sees a socket.
//! - `infrastructure` depends on all other layers plus `tokio` and
//!   `tokio-tungstenite`.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: what crosses the bridge and when.
pub mod application;

/// Infrastructure layer: websocket session, reconnect loop, startup.
pub mod infrastructure;

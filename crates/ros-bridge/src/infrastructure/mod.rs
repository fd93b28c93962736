//! Infrastructure layer for ros-bridge.
//!
//! Everything that touches the network, the terminal, or the file system.
//!
//! # Responsibilities
//!
//! - Running one websocket connection attempt ([`session`])
//! - Serialising outbound writes ([`outbound_queue`])
//! - Retrying attempts until shutdown ([`supervisor`])
//! - Watching for operator shutdown ([`shutdown`])
//! - Announcing the module on the middleware bus ([`startup`])
//! - Reading the optional TOML file ([`config_file`])
//!
//! # What does NOT belong here?
//!
//! - Deciding what to send or how to read inbound traffic (application layer)
//! - Message shapes and the simulation status machine (domain layer)

pub mod config_file;
pub mod outbound_queue;
pub mod session;
pub mod shutdown;
pub mod startup;
pub mod supervisor;

pub use outbound_queue::{OutboundMessage, OutboundQueue};
pub use session::{
    ConnectionSession, EndKind, EndReason, FailureClass, SessionError, SessionHandle, SessionState,
};
pub use shutdown::{watch_operator, ShutdownHandle};
pub use startup::publish_module_documents;
pub use supervisor::ReconnectSupervisor;

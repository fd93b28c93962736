//! Application layer for ros-bridge.
//!
//! Decides what crosses the boundary between the middleware and the peer:
//!
//! - [`EventBridge`] keeps the telemetry cache and simulation status, and
//!   turns selected middleware events into outbound messages.
//! - [`inbound`] classifies what the peer sends.
//! - [`physmod`] reads physiology-modification instructions.
//!
//! Nothing here opens sockets.  Outbound text leaves through a
//! [`MessageSink`], which the infrastructure layer implements with its
//! write queue.

pub mod event_bridge;
pub mod inbound;
pub mod physmod;

pub use event_bridge::EventBridge;
pub use inbound::{interpret_inbound, InboundDisposition};
pub use physmod::{parse_physiology_modification, PhysmodAction, PhysmodError};

/// Destination for outbound wire text.
///
/// Implementations must accept calls from any thread and must preserve call
/// order on the wire.
pub trait MessageSink: Send + Sync {
    /// Hands `text` over for transmission.
    fn send_text(&self, text: String);
}

//! Interpretation of messages received from the peer.
//!
//! The peer echoes a `{"type":"ros_topic", ...}` message for traffic it sees;
//! those are acknowledged with a terse marker.  Anything else with a string
//! `"type"` is logged in full.  Documents without one, and bodies that are not
//! JSON at all, are anomalies: logged once at warn and dropped.

use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::messages::{KIND_FIELD, PASSIVE_ECHO_KIND};

/// What the bridge did with one inbound body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundDisposition {
    /// A passive topic echo; only a marker was logged.
    PassiveEcho,
    /// A typed message that was logged in full.
    Forwarded {
        /// Value of the `"type"` field.
        kind: String,
    },
    /// Valid JSON without a string `"type"` field.
    MissingKind,
    /// Not a JSON document.
    Malformed,
}

/// Classifies and logs one inbound body.
pub fn interpret_inbound(body: &str) -> InboundDisposition {
    let document: Value = match serde_json::from_str(body) {
        Ok(document) => document,
        Err(e) => {
            warn!("ROS message is not valid JSON ({e}): {body}");
            return InboundDisposition::Malformed;
        }
    };

    match document.get(KIND_FIELD).and_then(Value::as_str) {
        Some(PASSIVE_ECHO_KIND) => {
            debug!(r#"ros message: {{"type": "ros_topic", ...}}"#);
            InboundDisposition::PassiveEcho
        }
        Some(kind) => {
            debug!("ROS message: {body}");
            InboundDisposition::Forwarded {
                kind: kind.to_string(),
            }
        }
        None => {
            warn!("ROS message (no type): {body}");
            InboundDisposition::MissingKind
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

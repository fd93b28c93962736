//! JSON message types for the rosbridge wire protocol.
//!
//! Outbound traffic uses the rosbridge `publish` operation:
//!
//! ```json
//! {"op":"publish","topic":"/hr/control/speech/say","msg":{"text":"Greetings from MoHSES"}}
//! ```
//!
//! Inbound traffic is arbitrary JSON.  The only field the bridge looks at is a
//! string `"type"` discriminator, used to recognise the peer's passive topic
//! echoes (see [`PASSIVE_ECHO_KIND`]).

use serde::{Deserialize, Serialize};

/// Topic the robot speaks from.  Both the greeting and the telemetry report
/// are published here.
pub const SPEECH_TOPIC: &str = "/hr/control/speech/say";

/// Text of the first message sent on every new link.
pub const GREETING_TEXT: &str = "Greetings from MoHSES";

/// Inbound `"type"` value of messages the peer echoes for every topic it
/// sees.  These are acknowledged with a terse log marker only.
pub const PASSIVE_ECHO_KIND: &str = "ros_topic";

/// Name of the inbound discriminator field.
pub const KIND_FIELD: &str = "type";

// ── Outbound ──────────────────────────────────────────────────────────────────

/// A rosbridge `publish` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishEnvelope<T> {
    /// Always `"publish"`.
    pub op: String,
    /// Destination topic.
    pub topic: String,
    /// Topic-specific payload.
    pub msg: T,
}

impl<T> PublishEnvelope<T> {
    /// Wraps `msg` for publication on `topic`.
    pub fn new(topic: &str, msg: T) -> Self {
        Self {
            op: "publish".to_string(),
            topic: topic.to_string(),
            msg,
        }
    }
}

/// Payload of the speech topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechText {
    /// Sentence to speak.
    pub text: String,
}

/// Serialises the greeting sent when a link comes up.
///
/// # Errors
///
/// Returns the serialisation error, which cannot occur for these plain
/// string payloads but is propagated rather than unwrapped.
pub fn greeting() -> serde_json::Result<String> {
    speech(GREETING_TEXT.to_string())
}

/// Serialises the periodic heart-rate report.
///
/// `heart_rate` is embedded verbatim as cached.
///
/// # Errors
///
/// See [`greeting`].
pub fn heart_rate_report(heart_rate: &str) -> serde_json::Result<String> {
    speech(format!("My heart rate is {heart_rate} bpm."))
}

fn speech(text: String) -> serde_json::Result<String> {
    serde_json::to_string(&PublishEnvelope::new(SPEECH_TOPIC, SpeechText { text }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Wire payloads.
//!
//! Each datagram is one small JSON map.  A control message carries the
//! wrist value and its capture time:
//!
//! ```json
//! { "frequency": -0.42, "timestamp": 1716300000.125 }
//! ```
//!
//! The key is `frequency` for compatibility with existing senders even
//! though the value is a raw pitch angle; `value` is accepted as an alias.
//! A greeting is `{ "message": "..." }` and has no effect on the
//! instrument.

use serde::{Deserialize, Serialize};
use theremin_map::epoch_seconds;

use crate::error::LinkError;

/// A control value plus the moment it was captured.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(rename = "frequency", alias = "value")]
    pub value:     f64,
    /// Seconds since the Unix epoch; `0.0` when the sender omitted it.
    #[serde(default)]
    pub timestamp: f64,
}

impl ControlMessage {
    pub fn new(value: f64, timestamp: f64) -> Self {
        ControlMessage { value, timestamp }
    }

    /// Stamp `value` with the current time.
    pub fn now(value: f64) -> Self {
        ControlMessage { value, timestamp: epoch_seconds() }
    }

    /// Seconds between capture and `now`, when the sender stamped it.
    pub fn latency(&self, now: f64) -> Option<f64> {
        if self.timestamp > 0.0 && self.timestamp.is_finite() {
            Some(now - self.timestamp)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    pub message: String,
}

/// Everything that travels over the link.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Control(ControlMessage),
    Greeting(Greeting),
}

impl Payload {
    pub fn greeting(text: impl Into<String>) -> Self {
        Payload::Greeting(Greeting { message: text.into() })
    }

    pub fn encode(&self) -> Result<Vec<u8>, LinkError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, LinkError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl From<ControlMessage> for Payload {
    fn from(m: ControlMessage) -> Self { Payload::Control(m) }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn control_uses_frequency_key() {
        let bytes = Payload::from(ControlMessage::new(0.5, 12.0)).encode().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"frequency\":0.5"));
        assert!(text.contains("\"timestamp\":12.0"));
    }

    #[test]
    fn decodes_value_alias() {
        let p = Payload::decode(br#"{"value": -1.0, "timestamp": 3.0}"#).unwrap();
        assert_eq!(p, Payload::Control(ControlMessage::new(-1.0, 3.0)));
    }

    #[test]
    fn timestamp_is_optional() {
        let p = Payload::decode(br#"{"frequency": 0.25}"#).unwrap();
        match p {
            Payload::Control(m) => {
                assert_eq!(m.value, 0.25);
                assert_eq!(m.latency(100.0), None);
            }
            other => panic!("expected control, got {:?}", other),
        }
    }

    #[test]
    fn greeting_is_not_control() {
        let p = Payload::decode(br#"{"message": "Hello iPhone"}"#).unwrap();
        assert_eq!(p, Payload::greeting("Hello iPhone"));
    }

    #[test]
    fn garbage_is_a_codec_error() {
        assert!(matches!(Payload::decode(b"{nope"), Err(LinkError::Codec(_))));
        assert!(matches!(Payload::decode(br#"{"other": 1}"#), Err(LinkError::Codec(_))));
    }

    #[test]
    fn latency_from_timestamp() {
        let m = ControlMessage::new(0.0, 100.0);
        assert!(approx_eq!(f64, m.latency(100.25).unwrap(), 0.25, epsilon = 1e-12));
    }
}

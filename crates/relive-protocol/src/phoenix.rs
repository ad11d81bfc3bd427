//! The positional tuple codec used by Phoenix-compatible clients.
//!
//! On the wire every message is a 5-element JSON array:
//!
//! ```text
//! [join_ref, ref, topic, event, payload]
//!  "1"      "7"  "lv:x" "event" {"value": 3}
//! ```
//!
//! There is no `type` slot. Decoding reads the event and derives the
//! [`MessageType`] from it.

use serde_json::Value;

use crate::message::{lenient_ref, non_null_payload};
use crate::{Codec, Message, MessageType, ProtocolError};

/// Number of slots in a tuple message.
const TUPLE_LEN: usize = 5;

/// A [`Codec`] for the `[join_ref, ref, topic, event, payload]` layout.
///
/// By default the payload slot is lenient: `null` (or a tuple whose
/// payload is `null`) decodes to an empty object. [`PhoenixCodec::strict`]
/// turns that into an error for deployments that want exact interop.
///
/// The arity check is never lenient. Anything other than exactly five
/// elements is [`ProtocolError::InvalidMessage`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoenixCodec {
    strict_payload: bool,
}

impl PhoenixCodec {
    pub const NAME: &'static str = "phoenix";

    /// Lenient codec: a missing payload becomes `{}`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec that rejects a `null` payload.
    pub fn strict() -> Self {
        Self {
            strict_payload: true,
        }
    }
}

impl Codec for PhoenixCodec {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn content_type(&self) -> &str {
        "application/json"
    }

    fn encode(&self, message: &Message) -> Result<Vec<u8>, ProtocolError> {
        // Empty refs go out as `null`, which is what Phoenix clients send
        // for "no ref".
        let tuple = (
            optional_ref(&message.join_ref),
            optional_ref(&message.reference),
            &message.topic,
            &message.event,
            &message.payload,
        );
        serde_json::to_vec(&tuple).map_err(ProtocolError::encode)
    }

    fn decode(&self, data: &[u8]) -> Result<Message, ProtocolError> {
        let value: Value =
            serde_json::from_slice(data).map_err(ProtocolError::invalid)?;

        let Value::Array(items) = value else {
            return Err(ProtocolError::invalid("expected a JSON array"));
        };

        // Slice patterns destructure the array in one step and give us
        // the length check for free.
        let [join_ref, reference, topic, event, payload] =
            <[Value; TUPLE_LEN]>::try_from(items).map_err(|items| {
                ProtocolError::InvalidMessage(format!(
                    "expected {TUPLE_LEN} elements, got {}",
                    items.len()
                ))
            })?;

        let topic = required_string(topic, "topic")?;
        let event = required_string(event, "event")?;

        if self.strict_payload && payload.is_null() {
            return Err(ProtocolError::invalid("payload must not be null"));
        }

        Ok(Message {
            message_type: MessageType::from_event(&event),
            join_ref: lenient_ref(join_ref),
            reference: lenient_ref(reference),
            topic,
            event,
            payload: non_null_payload(payload),
        })
    }
}

fn optional_ref(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}

fn required_string(value: Value, slot: &str) -> Result<String, ProtocolError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(ProtocolError::InvalidMessage(format!(
            "{slot} must be a string, got {other}"
        ))),
    }
}

// =========================================================================
// Tests
// =========================================================================

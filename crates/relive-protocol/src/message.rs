//! The canonical in-memory message and its type classification.
//!
//! A [`Message`] is one protocol exchange: a client request, a server
//! reply, or a server push. Every codec decodes into it and encodes from
//! it, so the rest of the framework never sees wire bytes.

use std::fmt;

use serde::de::value::MapAccessDeserializer;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Well-known event names
// ---------------------------------------------------------------------------

/// Event names with a fixed meaning on the wire.
///
/// These are the exact strings used by Phoenix-compatible clients, so
/// they must never be renamed.
pub mod events {
    /// A client asks to join a topic.
    pub const JOIN: &str = "phx_join";
    /// A client leaves a topic.
    pub const LEAVE: &str = "phx_leave";
    /// The server answers a request carrying a `ref`.
    pub const REPLY: &str = "phx_reply";
    /// A channel crashed on the server side.
    pub const ERROR: &str = "phx_error";
    /// Keep-alive, sent on the `phoenix` topic.
    pub const HEARTBEAT: &str = "heartbeat";
    /// A rendered diff pushed to the client.
    pub const DIFF: &str = "diff";
    /// Incremental presence update.
    pub const PRESENCE_DIFF: &str = "presence_diff";
    /// Full presence snapshot.
    pub const PRESENCE_STATE: &str = "presence_state";
}

/// The topic heartbeats travel on.
pub const HEARTBEAT_TOPIC: &str = "phoenix";

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// Classification of a message, derived from its event name.
///
/// The type is never sent in the tuple wire format; decoders compute it
/// with [`MessageType::from_event`] after reading the event. The mapping
/// is closed: any event not listed below is a plain [`MessageType::Event`].
///
/// ```text
/// phx_join                        → Join
/// phx_leave                       → Leave
/// phx_reply                       → Reply
/// phx_error                       → Error
/// heartbeat                       → Heartbeat
/// diff                            → Diff
/// presence_diff | presence_state  → Presence
/// anything else                   → Event
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Join,
    Leave,
    Reply,
    Error,
    Heartbeat,
    Diff,
    Presence,
    /// An application event (`phx_click`, `"validate"`, ...).
    #[default]
    Event,
}

impl MessageType {
    /// Maps an event name to its message type.
    pub fn from_event(event: &str) -> Self {
        match event {
            events::JOIN => Self::Join,
            events::LEAVE => Self::Leave,
            events::REPLY => Self::Reply,
            events::ERROR => Self::Error,
            events::HEARTBEAT => Self::Heartbeat,
            events::DIFF => Self::Diff,
            events::PRESENCE_DIFF | events::PRESENCE_STATE => Self::Presence,
            _ => Self::Event,
        }
    }

    /// Stable lowercase name, used in logs and named encodings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Reply => "reply",
            Self::Error => "error",
            Self::Heartbeat => "heartbeat",
            Self::Diff => "diff",
            Self::Presence => "presence",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One protocol exchange.
///
/// ```text
/// ┌──────────────────────────────────────────┐
/// │ join_ref: "1"        ← which join attempt│
/// │ ref:      "7"        ← request ↔ reply   │
/// │ topic:    "lv:page"  ← logical channel   │
/// │ event:    "event"    ← the verb          │
/// │ payload:  {...}      ← any JSON value    │
/// └──────────────────────────────────────────┘
/// ```
///
/// `join_ref` and `reference` use the empty string for "absent". That
/// matches the tuple format, where a `null` ref decodes to `""`, and lets
/// callers compare refs without unwrapping.
///
/// The payload is a [`serde_json::Value`], a tagged union over every
/// JSON shape, so handlers pattern-match on it instead of casting. It is
/// never `null` after a decode: a missing payload becomes `{}`.
///
/// The derived `Serialize` produces the named-field layout used by the
/// JSON and MessagePack codecs:
///
/// ```json
/// {"type":"event","join_ref":"1","ref":"7","topic":"lv:page","event":"event","payload":{}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub message_type: MessageType,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub join_ref: String,

    #[serde(rename = "ref", skip_serializing_if = "String::is_empty")]
    pub reference: String,

    pub topic: String,

    pub event: String,

    pub payload: Value,
}

impl Message {
    /// Builds a message, deriving its type from `event`.
    ///
    /// A `null` payload is replaced with an empty object.
    pub fn new(
        topic: impl Into<String>,
        event: impl Into<String>,
        payload: Value,
    ) -> Self {
        let event = event.into();
        Self {
            message_type: MessageType::from_event(&event),
            join_ref: String::new(),
            reference: String::new(),
            topic: topic.into(),
            event,
            payload: non_null_payload(payload),
        }
    }

    /// Sets the join ref and request ref.
    pub fn with_refs(
        mut self,
        join_ref: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        self.join_ref = join_ref.into();
        self.reference = reference.into();
        self
    }

    /// Builds the `phx_reply` that answers this message.
    ///
    /// The reply keeps the topic and both refs so the client can match it
    /// to its pending request.
    pub fn reply(&self, status: &str, response: Value) -> Self {
        let mut payload = Map::new();
        payload.insert("status".into(), Value::String(status.into()));
        payload.insert("response".into(), non_null_payload(response));
        Self::new(self.topic.clone(), events::REPLY, Value::Object(payload))
            .with_refs(self.join_ref.clone(), self.reference.clone())
    }

    /// Builds a heartbeat on the `phoenix` topic.
    pub fn heartbeat(reference: impl Into<String>) -> Self {
        Self::new(HEARTBEAT_TOPIC, events::HEARTBEAT, Value::Object(Map::new()))
            .with_refs(String::new(), reference)
    }

    /// Returns the payload as a map, if it is one.
    pub fn payload_object(&self) -> Option<&Map<String, Value>> {
        self.payload.as_object()
    }
}

/// Replaces `null` with `{}`.
pub(crate) fn non_null_payload(payload: Value) -> Value {
    match payload {
        Value::Null => Value::Object(Map::new()),
        other => other,
    }
}

/// `null` and non-string refs both become `""`.
pub(crate) fn lenient_ref(value: Value) -> String {
    match value {
        Value::String(s) => s,
        _ => String::new(),
    }
}

/// Wire shape accepted by the named-field decoders.
///
/// Everything except topic and event is optional here; the
/// `From<NamedFields>` impl fills in the defaults. A `type` sent by the
/// peer is ignored: the type always comes from the event, exactly as in
/// the tuple layout.
#[derive(Deserialize)]
struct NamedFields {
    #[serde(default, deserialize_with = "lenient_ref_field")]
    join_ref: String,

    #[serde(rename = "ref", default, deserialize_with = "lenient_ref_field")]
    reference: String,

    topic: String,

    event: String,

    #[serde(default)]
    payload: Option<Value>,
}

impl From<NamedFields> for Message {
    fn from(fields: NamedFields) -> Self {
        Self {
            message_type: MessageType::from_event(&fields.event),
            join_ref: fields.join_ref,
            reference: fields.reference,
            topic: fields.topic,
            event: fields.event,
            payload: non_null_payload(fields.payload.unwrap_or(Value::Null)),
        }
    }
}

/// Only a map is accepted. A derived impl would also take a sequence and
/// fill the fields by position, so a tuple frame could slip through the
/// named-field codecs.
impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NamedVisitor;

        impl<'de> Visitor<'de> for NamedVisitor {
            type Value = Message;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a message object with named fields")
            }

            fn visit_map<A>(self, map: A) -> Result<Message, A::Error>
            where
                A: MapAccess<'de>,
            {
                NamedFields::deserialize(MapAccessDeserializer::new(map)).map(Message::from)
            }
        }

        deserializer.deserialize_map(NamedVisitor)
    }
}

fn lenient_ref_field<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(lenient_ref)
}

// =========================================================================
// Tests
// =========================================================================

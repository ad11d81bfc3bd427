//! Codec trait and the named-field codecs.
//!
//! A "codec" (coder/decoder) converts between [`Message`] and raw bytes.
//! The rest of the framework doesn't care HOW messages are serialized; it
//! just needs something that implements [`Codec`]. This is the strategy
//! pattern: one interface, swappable implementations.
//!
//! - [`JsonCodec`] — named-field JSON, easy to read in DevTools.
//! - [`MsgPackCodec`] — the same fields as MessagePack, smaller on the wire.
//! - [`PhoenixCodec`](crate::PhoenixCodec) — positional 5-tuple, lives in
//!   its own module because its layout is nothing like the other two.

use crate::{Message, ProtocolError};

/// Encodes messages to bytes and decodes bytes back into messages.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → codecs are shared between connection tasks through
///   the [`CodecRegistry`](crate::CodecRegistry).
/// - `'static` → a codec owns everything it needs, so it can live inside
///   an `Arc` for the lifetime of the server.
///
/// Unlike a generic `encode<T>` method, every method here is concrete.
/// That keeps the trait *object safe*: the registry stores codecs as
/// `Arc<dyn Codec>` and picks one by name at runtime.
pub trait Codec: Send + Sync + 'static {
    /// Registry key, e.g. `"json"`.
    fn name(&self) -> &str;

    /// MIME type of the encoded bytes.
    fn content_type(&self) -> &str;

    /// Serializes a message into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the payload cannot be
    /// represented in this format.
    fn encode(&self, message: &Message) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a message.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] if the bytes are
    /// malformed or structurally wrong for this format.
    fn decode(&self, data: &[u8]) -> Result<Message, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that writes the named-field JSON object.
///
/// ## Example
///
/// ```rust
/// use relive_protocol::{Codec, JsonCodec, Message};
/// use serde_json::json;
///
/// let codec = JsonCodec;
/// let msg = Message::new("lv:page", "event", json!({"count": 1}));
///
/// let bytes = codec.encode(&msg).unwrap();
/// let decoded = codec.decode(&bytes).unwrap();
/// assert_eq!(msg, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub const NAME: &'static str = "json";
}

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn content_type(&self) -> &str {
        "application/json"
    }

    fn encode(&self, message: &Message) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(message).map_err(ProtocolError::encode)
    }

    fn decode(&self, data: &[u8]) -> Result<Message, ProtocolError> {
        // `from_slice` parses a borrowed `&[u8]` without copying it first.
        serde_json::from_slice(data).map_err(ProtocolError::invalid)
    }
}

// ---------------------------------------------------------------------------
// MsgPackCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that writes the named-field layout as MessagePack.
///
/// Uses `rmp_serde::to_vec_named`, so fields are keyed by name (not by
/// position) and JavaScript MessagePack decoders see the same object the
/// JSON codec produces. The output is deterministic for a given message:
/// `serde_json::Map` keeps its keys sorted.
#[cfg(feature = "msgpack")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

#[cfg(feature = "msgpack")]
impl MsgPackCodec {
    pub const NAME: &'static str = "msgpack";
}

#[cfg(feature = "msgpack")]
impl Codec for MsgPackCodec {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn content_type(&self) -> &str {
        "application/msgpack"
    }

    fn encode(&self, message: &Message) -> Result<Vec<u8>, ProtocolError> {
        rmp_serde::to_vec_named(message).map_err(ProtocolError::encode)
    }

    fn decode(&self, data: &[u8]) -> Result<Message, ProtocolError> {
        rmp_serde::from_slice(data).map_err(ProtocolError::invalid)
    }
}

// =========================================================================
// Tests
// =========================================================================

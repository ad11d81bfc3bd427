//! Error types for the protocol layer.
//!
//! Each crate in Relive defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in turning messages into
//! bytes (or back), not in state persistence.

/// Errors that can occur in the protocol layer.
///
/// `#[derive(thiserror::Error)]` auto-generates the `std::error::Error`
/// implementation. The `#[error("...")]` attributes define the
/// human-readable message for each variant.
///
/// The variants carry `String`s rather than the underlying library
/// errors because three codecs (JSON, MessagePack, tuple) feed into the
/// same enum, and callers branch on the variant, not on the source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a [`Message`](crate::Message) into
    /// bytes).
    #[error("encode failed: {0}")]
    Encode(String),

    /// The bytes do not form a valid message.
    ///
    /// Covers malformed JSON/MessagePack, a tuple whose length is not
    /// exactly 5, and a missing or non-string topic/event. A malformed
    /// message can never be acted upon, so this is always surfaced to
    /// the caller.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// No codec is registered under the requested name.
    #[error("unknown codec: {0}")]
    UnknownCodec(String),
}

impl ProtocolError {
    /// Shorthand used by the codecs to wrap a decode failure.
    pub(crate) fn invalid(reason: impl std::fmt::Display) -> Self {
        Self::InvalidMessage(reason.to_string())
    }

    pub(crate) fn encode(reason: impl std::fmt::Display) -> Self {
        Self::Encode(reason.to_string())
    }
}

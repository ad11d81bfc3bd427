//! Error types for the state layer.
//!
//! Two enums live here. [`StoreError`] is what a key/value backend can
//! report; [`StateError`] is what the state manager, serializer, and
//! recovery tokens report to the application.

/// Errors a [`Store`](crate::Store) backend can return.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No live value exists under the key.
    ///
    /// Backends must return this (not an empty value) on a miss so the
    /// state manager can tell "absent" apart from "empty".
    #[error("key not found: {0}")]
    NotFound(String),

    /// The key pattern passed to `keys` is not a valid glob.
    #[error("invalid key pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The store was closed; no further operations are accepted.
    #[error("store is closed")]
    Closed,

    /// Any other backend failure (network, protocol, ...).
    #[error("store backend failed: {0}")]
    Backend(String),
}

/// Errors that can occur while persisting or recovering component state.
///
/// The variants fall into three groups, and callers usually only need to
/// tell the first apart from the rest:
///
/// - **Absent**: [`NotFound`](Self::NotFound),
///   [`TokenExpired`](Self::TokenExpired),
///   [`InvalidChecksum`](Self::InvalidChecksum),
///   [`TokenSuperseded`](Self::TokenSuperseded). The right response is a
///   fresh session, never a retry. See [`StateError::is_absent`].
/// - **Corrupt data**: [`InvalidData`](Self::InvalidData),
///   [`Serialization`](Self::Serialization),
///   [`Compression`](Self::Compression).
/// - **Backend faults**: [`Store`](Self::Store).
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// No live state exists for the socket. Expired state is reported
    /// this way too.
    #[error("no state for socket {0}")]
    NotFound(String),

    /// The recovery token's lifetime has passed.
    #[error("recovery token for socket {0} has expired")]
    TokenExpired(String),

    /// The recovery token's checksum does not match its contents.
    #[error("recovery token checksum mismatch")]
    InvalidChecksum,

    /// The token refers to an older save than the one in the store.
    /// A later disconnect issued a newer token.
    #[error(
        "recovery token for socket {socket_id} is for version {token_version}, state is at {state_version}"
    )]
    TokenSuperseded {
        socket_id: String,
        token_version: u64,
        state_version: u64,
    },

    /// The bytes are not a serializer envelope (empty, unknown marker).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// MessagePack encoding or decoding failed.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// zstd could not decompress a payload marked as compressed.
    #[error("decompression failed: {0}")]
    Compression(#[source] std::io::Error),

    /// The backing store failed.
    #[error(transparent)]
    Store(StoreError),
}

impl StateError {
    /// Returns `true` if the error means "there is nothing to resume".
    ///
    /// The framework reacts to these by bootstrapping a fresh session
    /// instead of showing an error page.
    pub fn is_absent(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::TokenExpired(_)
                | Self::InvalidChecksum
                | Self::TokenSuperseded { .. }
        )
    }
}

/// A store miss becomes [`StateError::NotFound`]; everything else stays a
/// backend error.
impl From<StoreError> for StateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => Self::NotFound(key),
            other => Self::Store(other),
        }
    }
}

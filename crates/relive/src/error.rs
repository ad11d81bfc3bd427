//! Unified error type for the Relive framework.

use relive_protocol::ProtocolError;
use relive_state::{StateError, StoreError};

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `relive` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ReliveError {
    /// A protocol-level error (encode, decode, unknown codec).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A state-level error (not found, token rejected, corrupt data).
    #[error(transparent)]
    State(#[from] StateError),
}

impl From<StoreError> for ReliveError {
    fn from(err: StoreError) -> Self {
        Self::State(err.into())
    }
}

impl ReliveError {
    /// Returns `true` when the caller should bootstrap a fresh session:
    /// the state is gone, the token expired or was superseded, or the
    /// token didn't verify.
    ///
    /// Corrupt data and backend failures return `false`; those deserve a
    /// log line, not a silent restart.
    pub fn is_absent(&self) -> bool {
        match self {
            Self::State(err) => err.is_absent(),
            Self::Protocol(_) => false,
        }
    }
}

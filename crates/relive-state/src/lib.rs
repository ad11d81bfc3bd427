//! Component state persistence and session recovery for Relive.
//!
//! This crate keeps a connection's application state alive across a
//! dropped WebSocket:
//!
//! 1. **Serialization** — values to bytes and back, zstd-compressed when
//!    large ([`Serializer`], [`BinarySerializer`])
//! 2. **Storage** — a key/value backend with TTLs ([`Store`],
//!    [`MemoryStore`])
//! 3. **State** — versioned, expiring snapshots per socket
//!    ([`ComponentState`], [`StateManager`])
//! 4. **Recovery** — signed tokens naming the snapshot a reconnecting
//!    client resumes ([`RecoveryToken`], [`TokenSigner`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Component lifecycle (above)  ← captures assigns on disconnect
//!     ↕
//! State layer (this crate)     ← save / load / expire / verify
//!     ↕
//! Store backend (below)        ← memory here, network stores elsewhere
//! ```

mod clock;
mod error;
mod manager;
mod memory;
mod serializer;
mod state;
mod store;
mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StateError, StoreError};
pub use manager::{StateConfig, StateManager};
pub use memory::MemoryStore;
pub use serializer::{
    BinarySerializer, MARKER_PLAIN, MARKER_ZSTD, Serializer, SerializerConfig,
};
pub use state::ComponentState;
pub use store::Store;
pub use token::{RecoveryToken, SECRET_LEN, TokenSigner};

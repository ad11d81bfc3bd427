//! # Relive
//!
//! Wire protocol and session recovery for server-driven real-time UIs.
//!
//! Relive turns in-process messages into bytes for three wire formats
//! and keeps each connection's component state alive across a dropped
//! socket, so a reconnecting client resumes where it left off.
//!
//! - [`relive_protocol`] — messages, codecs, the codec registry
//! - [`relive_state`] — serializer, stores, state manager, recovery tokens
//! - this crate — [`Relive`] (everything wired from a [`ReliveConfig`]),
//!   [`SessionRecovery`], the background cleanup task, and logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relive::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ReliveError> {
//! relive::telemetry::init_tracing();
//!
//! let relive = Relive::new(MemoryStore::new(), TokenSigner::random(), ReliveConfig::default())?;
//! let _sweeper = relive.start_cleanup();
//!
//! // On disconnect:
//! let manager = relive.recovery().manager();
//! let mut state = manager.create("socket-1", "Counter", Default::default());
//! let token = relive.recovery().disconnect(&mut state).await?;
//!
//! // On reconnect, with the token the client kept:
//! let resumed = relive.recovery().resume(&token).await?;
//! assert_eq!(resumed.version, state.version);
//! # Ok(())
//! # }
//! ```

mod app;
mod config;
mod error;
mod recovery;
pub mod telemetry;

pub use app::Relive;
pub use config::{ReliveConfig, ReliveConfigBuilder};
pub use error::ReliveError;
pub use recovery::{SessionRecovery, spawn_cleanup};

pub use relive_protocol;
pub use relive_state;

/// Everything a connection handler typically needs.
pub mod prelude {
    pub use crate::{Relive, ReliveConfig, ReliveError, SessionRecovery};
    pub use relive_protocol::{
        Codec, CodecRegistry, JsonCodec, Message, MessageType, PhoenixCodec,
        ProtocolError,
    };
    pub use relive_state::{
        BinarySerializer, Clock, ComponentState, ManualClock, MemoryStore,
        RecoveryToken, Serializer, StateError, StateManager, Store,
        StoreError, SystemClock, TokenSigner,
    };
}

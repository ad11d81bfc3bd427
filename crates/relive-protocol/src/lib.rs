//! Wire protocol for Relive.
//!
//! This crate defines how messages travel between the browser and the
//! server:
//!
//! - **Message** ([`Message`], [`MessageType`]) — one request, reply, or
//!   push, with an open-ended JSON payload.
//! - **Codecs** ([`Codec`] trait, [`JsonCodec`], [`MsgPackCodec`],
//!   [`PhoenixCodec`]) — three byte layouts for the same message.
//! - **Registry** ([`CodecRegistry`]) — picks a codec by name, with the
//!   Phoenix tuple format as the default.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (raw frames) and the
//! event dispatcher. It doesn't know about sockets or component state.
//!
//! ```text
//! Transport (bytes) → Protocol (Message) → Dispatcher (handlers)
//! ```
//!
//! # Feature Flags
//!
//! - `msgpack` (default) — [`MsgPackCodec`] via `rmp-serde`

mod codec;
mod error;
mod message;
mod phoenix;
mod registry;

pub use codec::Codec;
pub use codec::JsonCodec;
#[cfg(feature = "msgpack")]
pub use codec::MsgPackCodec;
pub use error::ProtocolError;
pub use message::{HEARTBEAT_TOPIC, Message, MessageType, events};
pub use phoenix::PhoenixCodec;
pub use registry::CodecRegistry;

//! `Relive` — the assembled protocol and recovery layer.
//!
//! This is what a server's startup code builds once and shares with every
//! connection handler. It ties together the codec registry, the state
//! manager, and the token signer according to a [`ReliveConfig`].

use std::sync::Arc;

use relive_protocol::{Codec, CodecRegistry, Message};
use relive_state::{
    BinarySerializer, Clock, StateManager, Store, SystemClock, TokenSigner,
};
use tokio::task::JoinHandle;

use crate::{ReliveConfig, ReliveError, SessionRecovery};

/// The protocol/recovery layer, ready to serve connections.
///
/// # Example
///
/// ```rust
/// use relive::prelude::*;
/// use serde_json::json;
///
/// let relive = Relive::new(
///     MemoryStore::new(),
///     TokenSigner::random(),
///     ReliveConfig::default(),
/// )
/// .unwrap();
///
/// let msg = relive.decode(None, br#"["1", "2", "lv:page", "phx_join", {}]"#).unwrap();
/// assert_eq!(msg.message_type, MessageType::Join);
///
/// let reply = relive.encode(None, &msg.reply("ok", json!({}))).unwrap();
/// assert!(reply.starts_with(br#"["1","2","lv:page","phx_reply""#));
/// ```
pub struct Relive<S: Store> {
    codecs: Arc<CodecRegistry>,
    recovery: SessionRecovery<S>,
    config: ReliveConfig,
}

impl<S: Store> Relive<S> {
    /// Builds the layer on the system clock.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownCodec`](relive_protocol::ProtocolError::UnknownCodec)
    /// if `config.default_codec` isn't a built-in codec.
    pub fn new(store: S, signer: TokenSigner, config: ReliveConfig) -> Result<Self, ReliveError> {
        Self::with_clock(store, signer, config, Arc::new(SystemClock))
    }

    /// Builds the layer with an explicit clock (tests pass a
    /// [`ManualClock`](relive_state::ManualClock)).
    pub fn with_clock(
        store: S,
        signer: TokenSigner,
        config: ReliveConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ReliveError> {
        let codecs = Arc::new(CodecRegistry::new());
        codecs.set_default(&config.default_codec)?;

        let manager = StateManager::with_parts(
            store,
            BinarySerializer::new(config.serializer.clone()),
            config.state.clone(),
            clock,
        );
        let recovery = SessionRecovery::new(manager, signer, config.token_ttl);

        tracing::info!(
            default_codec = %config.default_codec,
            key_prefix = %config.state.key_prefix,
            "relive initialized"
        );
        Ok(Self {
            codecs,
            recovery,
            config,
        })
    }

    /// The codec registry. Register custom codecs here at startup.
    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.codecs
    }

    pub fn recovery(&self) -> &SessionRecovery<S> {
        &self.recovery
    }

    pub fn config(&self) -> &ReliveConfig {
        &self.config
    }

    /// Decodes a frame with the named codec, or the default one.
    pub fn decode(&self, codec: Option<&str>, data: &[u8]) -> Result<Message, ReliveError> {
        Ok(self.resolve(codec)?.decode(data)?)
    }

    /// Encodes a message with the named codec, or the default one.
    pub fn encode(&self, codec: Option<&str>, message: &Message) -> Result<Vec<u8>, ReliveError> {
        Ok(self.resolve(codec)?.encode(message)?)
    }

    /// Starts the periodic cleanup sweep, unless the configured interval
    /// is zero.
    pub fn start_cleanup(&self) -> Option<JoinHandle<()>> {
        if self.config.cleanup_interval.is_zero() {
            return None;
        }
        Some(self.recovery.spawn_cleanup(self.config.cleanup_interval))
    }

    fn resolve(&self, codec: Option<&str>) -> Result<Arc<dyn Codec>, ReliveError> {
        match codec {
            Some(name) => Ok(self.codecs.require(name)?),
            None => Ok(self.codecs.default_codec()),
        }
    }
}

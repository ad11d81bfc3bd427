//! Named lookup of codecs with one designated default.
//!
//! The registry is an ordinary value, constructed by the server's startup
//! code and shared through an `Arc`. There is no global table, so tests
//! can build as many isolated registries as they like.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::{Codec, JsonCodec, PhoenixCodec, ProtocolError};

/// A table of codecs keyed by [`Codec::name`].
///
/// Reads vastly outnumber writes (codecs are registered at startup), so
/// the table sits behind a `RwLock`: any number of connection tasks can
/// look codecs up at once, and a registration only blocks them briefly.
///
/// ```rust
/// use relive_protocol::CodecRegistry;
///
/// let registry = CodecRegistry::new();
/// assert_eq!(registry.default_codec().name(), "phoenix");
/// assert!(registry.get("json").is_some());
/// ```
pub struct CodecRegistry {
    inner: RwLock<Inner>,
}

struct Inner {
    codecs: HashMap<String, Arc<dyn Codec>>,
    default: Option<String>,
}

impl CodecRegistry {
    /// Creates a registry holding the built-in codecs, with the Phoenix
    /// tuple codec as the default.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register(Arc::new(JsonCodec));
        #[cfg(feature = "msgpack")]
        registry.register(Arc::new(crate::MsgPackCodec));
        registry.register(Arc::new(PhoenixCodec::new()));
        registry.install_default(PhoenixCodec::NAME);
        registry
    }

    /// Creates a registry with no codecs and no default.
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(Inner {
                codecs: HashMap::new(),
                default: None,
            }),
        }
    }

    /// Adds a codec, replacing any codec already registered under the
    /// same name.
    pub fn register(&self, codec: Arc<dyn Codec>) {
        let name = codec.name().to_owned();
        let replaced = self.write().codecs.insert(name.clone(), codec).is_some();
        tracing::debug!(codec = %name, replaced, "codec registered");
    }

    /// Looks a codec up by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Codec>> {
        self.read().codecs.get(name).cloned()
    }

    /// Looks a codec up by name, failing with
    /// [`ProtocolError::UnknownCodec`] on a miss.
    pub fn require(&self, name: &str) -> Result<Arc<dyn Codec>, ProtocolError> {
        self.get(name)
            .ok_or_else(|| ProtocolError::UnknownCodec(name.to_owned()))
    }

    /// Returns `true` if a codec is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.read().codecs.contains_key(name)
    }

    /// Registered codec names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().codecs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Finds the first codec (in name order) producing `content_type`.
    ///
    /// `json` and `phoenix` both produce `application/json`; `json` wins
    /// because it sorts first.
    pub fn find_by_content_type(
        &self,
        content_type: &str,
    ) -> Option<Arc<dyn Codec>> {
        let inner = self.read();
        let mut matches: Vec<&Arc<dyn Codec>> = inner
            .codecs
            .values()
            .filter(|codec| codec.content_type() == content_type)
            .collect();
        matches.sort_by(|a, b| a.name().cmp(b.name()));
        matches.first().map(|&codec| Arc::clone(codec))
    }

    /// Makes `name` the default codec.
    ///
    /// # Errors
    /// Returns [`ProtocolError::UnknownCodec`] if nothing is registered
    /// under `name`. The previous default stays in place.
    pub fn set_default(&self, name: &str) -> Result<(), ProtocolError> {
        let mut inner = self.write();
        if !inner.codecs.contains_key(name) {
            return Err(ProtocolError::UnknownCodec(name.to_owned()));
        }
        inner.default = Some(name.to_owned());
        tracing::info!(codec = %name, "default codec changed");
        Ok(())
    }

    /// Name of the default codec, if one is set.
    pub fn default_name(&self) -> Option<String> {
        self.read().default.clone()
    }

    /// Returns the default codec.
    ///
    /// # Panics
    /// Panics if no default was ever set (only possible with
    /// [`CodecRegistry::empty`]). That is a startup wiring mistake, not a
    /// request-time condition.
    pub fn default_codec(&self) -> Arc<dyn Codec> {
        let inner = self.read();
        let name = inner
            .default
            .as_deref()
            .unwrap_or_else(|| panic!("codec registry has no default codec"));
        match inner.codecs.get(name) {
            Some(codec) => Arc::clone(codec),
            None => panic!("default codec {name:?} is not registered"),
        }
    }

    fn install_default(&self, name: &str) {
        self.write().default = Some(name.to_owned());
    }

    // A panic while holding the lock cannot leave the map half-updated
    // (every write is a single insert or assignment), so a poisoned lock
    // is still safe to use.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("codecs", &self.names())
            .field("default", &self.default_name())
            .finish()
    }
}

// =========================================================================
// Tests
// =========================================================================

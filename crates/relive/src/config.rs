//! Framework configuration and its builder.

use std::time::Duration;

use relive_protocol::PhoenixCodec;
use relive_state::{SerializerConfig, StateConfig};
use serde::{Deserialize, Serialize};

/// Configuration for a [`Relive`](crate::Relive) instance.
///
/// Every field has a sensible default; start from
/// `ReliveConfig::default()` or [`ReliveConfig::builder()`] and override
/// only what you need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReliveConfig {
    /// Key prefix and default lifetime of saved component state.
    pub state: StateConfig,

    /// Compression settings for persisted state and token blobs.
    pub serializer: SerializerConfig,

    /// How long a recovery token stays valid after a disconnect.
    pub token_ttl: Duration,

    /// How often the background sweep runs [`cleanup`]. Zero disables it.
    ///
    /// [`cleanup`]: relive_state::StateManager::cleanup
    pub cleanup_interval: Duration,

    /// Codec used when a client doesn't ask for one.
    pub default_codec: String,
}

impl Default for ReliveConfig {
    fn default() -> Self {
        Self {
            state: StateConfig::default(),
            serializer: SerializerConfig::default(),
            token_ttl: Duration::from_secs(5 * 60),
            cleanup_interval: Duration::from_secs(60),
            default_codec: PhoenixCodec::NAME.to_owned(),
        }
    }
}

impl ReliveConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> ReliveConfigBuilder {
        ReliveConfigBuilder::new()
    }
}

/// Builder for [`ReliveConfig`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use relive::ReliveConfig;
///
/// let config = ReliveConfig::builder()
///     .key_prefix("myapp:lv:")
///     .state_ttl(Duration::from_secs(600))
///     .compression_threshold(4096)
///     .default_codec("json")
///     .build();
///
/// assert_eq!(config.state.key_prefix, "myapp:lv:");
/// assert_eq!(config.serializer.compression_threshold, 4096);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReliveConfigBuilder {
    config: ReliveConfig,
}

impl ReliveConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the namespace for state keys.
    pub fn key_prefix(mut self, prefix: &str) -> Self {
        self.config.state.key_prefix = prefix.to_owned();
        self
    }

    /// Sets the lifetime of newly created state.
    pub fn state_ttl(mut self, ttl: Duration) -> Self {
        self.config.state.default_ttl = ttl;
        self
    }

    /// Sets how long recovery tokens stay valid.
    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        self.config.token_ttl = ttl;
        self
    }

    /// Turns compression of persisted state on or off.
    pub fn compression(mut self, enabled: bool) -> Self {
        self.config.serializer.compression = enabled;
        self
    }

    /// Sets the smallest body size that gets compressed.
    pub fn compression_threshold(mut self, bytes: usize) -> Self {
        self.config.serializer.compression_threshold = bytes;
        self
    }

    /// Sets the zstd level.
    pub fn compression_level(mut self, level: i32) -> Self {
        self.config.serializer.compression_level = level;
        self
    }

    /// Sets the background cleanup period (zero disables it).
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    /// Sets the default codec by name.
    pub fn default_codec(mut self, name: &str) -> Self {
        self.config.default_codec = name.to_owned();
        self
    }

    pub fn build(self) -> ReliveConfig {
        self.config
    }
}

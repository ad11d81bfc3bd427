//! Value ↔ bytes conversion for persisted state, with optional zstd
//! compression.
//!
//! Every blob this crate writes to a store is an envelope:
//!
//! ```text
//! ┌────────┬─────────────────────────────────────┐
//! │ marker │ body                                │
//! │ 1 byte │ MessagePack (0x00) or zstd(MP) (0x01)│
//! └────────┴─────────────────────────────────────┘
//! ```
//!
//! An operator inspecting a raw backend sees this envelope, not JSON.

use std::io;

use serde::{Serialize, de::DeserializeOwned};

use crate::StateError;

/// Marker for an uncompressed body.
pub const MARKER_PLAIN: u8 = 0x00;
/// Marker for a zstd-compressed body.
pub const MARKER_ZSTD: u8 = 0x01;

/// Converts values to bytes and back.
///
/// The methods are generic over the value type, the same shape serde
/// itself uses: any `T: Serialize` can be marshaled, any
/// `T: DeserializeOwned` unmarshaled. `DeserializeOwned` means the
/// result doesn't borrow from the input, so the buffer can be dropped
/// right after decoding.
pub trait Serializer: Send + Sync + 'static {
    /// Serializes a value into an envelope.
    ///
    /// # Errors
    /// Returns [`StateError::Serialization`] if the value cannot be
    /// encoded.
    fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, StateError>;

    /// Deserializes an envelope back into a value.
    ///
    /// # Errors
    /// - [`StateError::InvalidData`] — empty input or unknown marker
    /// - [`StateError::Compression`] — the compressed body is corrupt
    /// - [`StateError::Serialization`] — the body doesn't decode as `T`
    fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, StateError>;
}

// ---------------------------------------------------------------------------
// SerializerConfig
// ---------------------------------------------------------------------------

/// Settings for [`BinarySerializer`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SerializerConfig {
    /// Compress bodies at or above the threshold.
    pub compression: bool,

    /// Smallest encoded size (in bytes) worth compressing.
    pub compression_threshold: usize,

    /// zstd level, 1 (fastest) to 21 (smallest).
    pub compression_level: i32,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            compression: true,
            compression_threshold: 1024,
            compression_level: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// BinarySerializer
// ---------------------------------------------------------------------------

/// The reference [`Serializer`]: MessagePack bodies, zstd above a size
/// threshold.
///
/// Compression is an optimization only. If zstd fails while writing, the
/// body is stored uncompressed and a warning is logged. Reading never
/// guesses: a body marked compressed that fails to decompress is an
/// error.
#[derive(Debug, Clone, Default)]
pub struct BinarySerializer {
    config: SerializerConfig,
}

impl BinarySerializer {
    pub fn new(config: SerializerConfig) -> Self {
        Self { config }
    }

    /// A serializer that never compresses.
    pub fn uncompressed() -> Self {
        Self::new(SerializerConfig {
            compression: false,
            ..SerializerConfig::default()
        })
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    fn should_compress(&self, len: usize) -> bool {
        self.config.compression && len >= self.config.compression_threshold
    }
}

impl Serializer for BinarySerializer {
    fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, StateError> {
        // `to_vec_named` writes structs as maps keyed by field name, so a
        // field added later doesn't shift the meaning of older blobs.
        let body = rmp_serde::to_vec_named(value)
            .map_err(|e| StateError::Serialization(e.to_string()))?;

        if self.should_compress(body.len()) {
            match zstd::bulk::compress(&body, self.config.compression_level) {
                Ok(compressed) => {
                    tracing::trace!(
                        raw = body.len(),
                        compressed = compressed.len(),
                        "state body compressed"
                    );
                    return Ok(envelope(MARKER_ZSTD, &compressed));
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        size = body.len(),
                        "compression failed, storing uncompressed"
                    );
                }
            }
        }

        Ok(envelope(MARKER_PLAIN, &body))
    }

    fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, StateError> {
        let Some((&marker, body)) = data.split_first() else {
            return Err(StateError::InvalidData("empty input".into()));
        };

        match marker {
            MARKER_PLAIN => decode_body(body),
            MARKER_ZSTD => {
                let raw = decompress(body).map_err(StateError::Compression)?;
                decode_body(&raw)
            }
            other => Err(StateError::InvalidData(format!(
                "unknown compression marker {other:#04x}"
            ))),
        }
    }
}

fn envelope(marker: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(marker);
    out.extend_from_slice(body);
    out
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, StateError> {
    rmp_serde::from_slice(body).map_err(|e| StateError::Serialization(e.to_string()))
}

/// Streaming decode, so the uncompressed size doesn't have to be known
/// up front.
fn decompress(body: &[u8]) -> io::Result<Vec<u8>> {
    zstd::stream::decode_all(body)
}

// =========================================================================
// Tests
// =========================================================================

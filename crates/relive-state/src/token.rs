//! Recovery tokens: signed proof of which saved session a client is
//! resuming.
//!
//! When a socket disconnects, the server saves its state and hands the
//! client a [`RecoveryToken`]. On reconnect the client presents it; the
//! server checks it hasn't expired and that its checksum matches, then
//! loads the state it names.
//!
//! The checksum is HMAC-SHA256 over every other field, keyed with a
//! secret only the server holds, so a client cannot forge a token for
//! another socket or bump the version it claims. Comparison is constant
//! time (`subtle`).

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::clock::expiry_after;
use crate::{ComponentState, Serializer, StateError};

type HmacSha256 = Hmac<Sha256>;

/// Length of secrets produced by [`TokenSigner::random`].
pub const SECRET_LEN: usize = 32;

/// A time-bounded capability to resume one saved state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryToken {
    pub socket_id: String,
    pub component_name: String,
    /// `ComponentState::version` at the moment the token was minted.
    pub state_version: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// HMAC-SHA256 over the fields above.
    pub checksum: Vec<u8>,
}

impl RecoveryToken {
    /// `true` once the wall clock is past `expires_at`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Serializes the token into an opaque blob for a URL or cookie.
    pub fn encode<Z: Serializer>(&self, serializer: &Z) -> Result<Vec<u8>, StateError> {
        serializer.marshal(self)
    }

    /// Reads a blob produced by [`encode`](Self::encode).
    ///
    /// Decoding proves nothing; call [`TokenSigner::verify`] next.
    pub fn decode<Z: Serializer>(data: &[u8], serializer: &Z) -> Result<Self, StateError> {
        serializer.unmarshal(data)
    }
}

/// Mints and verifies [`RecoveryToken`]s with a server-held secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    /// Uses `secret` as the HMAC key. Every server instance that should
    /// accept the same tokens needs the same secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Generates a fresh random secret. Tokens minted by this signer are
    /// only accepted by this process.
    pub fn random() -> Self {
        let secret: [u8; SECRET_LEN] = rand::rng().random();
        Self::new(secret.to_vec())
    }

    /// Issues a token for `state`'s current version, valid for `ttl`.
    pub fn mint(
        &self,
        state: &ComponentState,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> RecoveryToken {
        let mut token = RecoveryToken {
            socket_id: state.socket_id.clone(),
            component_name: state.component_name.clone(),
            state_version: state.version,
            created_at: now,
            expires_at: expiry_after(now, ttl),
            checksum: Vec::new(),
        };
        token.checksum = self.checksum(&token);
        token
    }

    /// Checks that `token` is unexpired at `now` and untampered.
    ///
    /// # Errors
    /// - [`StateError::TokenExpired`] — `now` is past `expires_at`
    /// - [`StateError::InvalidChecksum`] — any field was altered, or the
    ///   token was signed with another secret
    pub fn verify(&self, token: &RecoveryToken, now: DateTime<Utc>) -> Result<(), StateError> {
        if !self.checksum_matches(token) {
            tracing::warn!(socket_id = %token.socket_id, "recovery token checksum mismatch");
            return Err(StateError::InvalidChecksum);
        }
        if token.is_expired_at(now) {
            return Err(StateError::TokenExpired(token.socket_id.clone()));
        }
        Ok(())
    }

    /// Constant-time checksum comparison, ignoring expiry.
    pub fn checksum_matches(&self, token: &RecoveryToken) -> bool {
        let expected = self.checksum(token);
        expected.ct_eq(&token.checksum).into()
    }

    fn checksum(&self, token: &RecoveryToken) -> Vec<u8> {
        // HMAC accepts keys of any length, so this cannot fail.
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return Vec::new();
        };
        // Length-prefix the strings so ("ab", "c") and ("a", "bc") hash
        // differently.
        for field in [&token.socket_id, &token.component_name] {
            mac.update(&(field.len() as u64).to_be_bytes());
            mac.update(field.as_bytes());
        }
        mac.update(&token.state_version.to_be_bytes());
        for instant in [token.created_at, token.expires_at] {
            mac.update(instant.to_rfc3339_opts(SecondsFormat::Nanos, true).as_bytes());
        }
        mac.finalize().into_bytes().to_vec()
    }
}

/// Never prints the secret.
impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"<redacted>")
            .finish()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use serde_json::Map;

    use super::*;
    use crate::BinarySerializer;

    const FIVE_MIN: Duration = Duration::from_secs(300);

    fn state(now: DateTime<Utc>) -> ComponentState {
        ComponentState::new("s1", "Counter", Map::new(), Duration::from_secs(3600), now)
    }

    #[test]
    fn test_mint_captures_state_identity_and_version() {
        let now = Utc::now();
        let signer = TokenSigner::new(b"secret".to_vec());
        let mut state = state(now);
        state.version = 7;

        let token = signer.mint(&state, FIVE_MIN, now);

        assert_eq!(token.socket_id, "s1");
        assert_eq!(token.component_name, "Counter");
        assert_eq!(token.state_version, 7);
        assert_eq!(token.expires_at, now + TimeDelta::minutes(5));
        assert_eq!(token.checksum.len(), 32);
    }

    #[test]
    fn test_verify_fresh_token_succeeds() {
        let now = Utc::now();
        let signer = TokenSigner::random();
        let token = signer.mint(&state(now), FIVE_MIN, now);

        signer.verify(&token, now).unwrap();
        assert!(!token.is_expired_at(now));
    }

    #[test]
    fn test_verify_after_expiry_returns_token_expired() {
        let now = Utc::now();
        let signer = TokenSigner::random();
        let token = signer.mint(&state(now), FIVE_MIN, now);
        let later = now + TimeDelta::minutes(6);

        assert!(token.is_expired_at(later));
        assert!(matches!(
            signer.verify(&token, later),
            Err(StateError::TokenExpired(id)) if id == "s1"
        ));
    }

    #[test]
    fn test_verify_tampered_version_returns_invalid_checksum() {
        let now = Utc::now();
        let signer = TokenSigner::random();
        let mut token = signer.mint(&state(now), FIVE_MIN, now);

        token.state_version += 1;

        assert!(matches!(signer.verify(&token, now), Err(StateError::InvalidChecksum)));
    }

    #[test]
    fn test_verify_extended_expiry_returns_invalid_checksum() {
        let now = Utc::now();
        let signer = TokenSigner::random();
        let mut token = signer.mint(&state(now), FIVE_MIN, now);

        token.expires_at += TimeDelta::days(1);

        assert!(!signer.checksum_matches(&token));
    }

    #[test]
    fn test_verify_with_other_secret_returns_invalid_checksum() {
        let now = Utc::now();
        let token = TokenSigner::new(b"one".to_vec()).mint(&state(now), FIVE_MIN, now);

        let result = TokenSigner::new(b"two".to_vec()).verify(&token, now);

        assert!(matches!(result, Err(StateError::InvalidChecksum)));
    }

    #[test]
    fn test_encode_decode_preserves_verifiable_token() {
        let now = Utc::now();
        let signer = TokenSigner::random();
        let serializer = BinarySerializer::default();
        let token = signer.mint(&state(now), FIVE_MIN, now);

        let blob = token.encode(&serializer).unwrap();
        let decoded = RecoveryToken::decode(&blob, &serializer).unwrap();

        assert_eq!(decoded, token);
        signer.verify(&decoded, now).unwrap();
    }

    #[test]
    fn test_debug_hides_secret() {
        let signer = TokenSigner::new(b"hunter2".to_vec());
        let printed = format!("{signer:?}");
        assert!(!printed.contains("hunter2"));
    }
}

//! Key/value backend abstraction.
//!
//! A [`Store`] is the only part of the state layer that performs I/O.
//! The in-process [`MemoryStore`](crate::MemoryStore) is the default;
//! network-backed stores (Redis and friends) live outside this crate and
//! only need to implement this trait.

use std::future::Future;
use std::time::Duration;

use crate::StoreError;

/// A byte-oriented key/value store with per-key TTLs.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one store is shared by every connection
///   task for the lifetime of the server.
/// - Every method returns a `Send` future so callers can `.await` it
///   inside `tokio::spawn`.
///
/// # Cancellation
///
/// In async Rust a caller cancels an operation by dropping its future,
/// and a timeout is just `tokio::time::timeout` around the call.
/// Implementations must therefore not detach work into background tasks
/// that outlive the future.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use relive_state::{MemoryStore, Store};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MemoryStore::new();
/// store.set("k", b"v".to_vec(), Some(Duration::from_secs(60))).await.unwrap();
/// assert_eq!(store.get("k").await.unwrap(), b"v");
/// assert!(store.exists("k").await.unwrap());
/// # }
/// ```
pub trait Store: Send + Sync + 'static {
    /// Reads a value.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the key is missing or expired.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Vec<u8>, StoreError>> + Send;

    /// Writes a value.
    ///
    /// `ttl: None` keeps the value until deleted. `Some(Duration::ZERO)`
    /// stores an already-expired value, which readers treat as absent.
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns `true` if a live value exists under `key`.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Lists live keys matching a glob pattern (`*`, `?`, `[...]`).
    ///
    /// # Errors
    /// [`StoreError::InvalidPattern`] if the pattern doesn't parse.
    fn keys(
        &self,
        pattern: &str,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Drops expired values whose keys match `pattern` and returns how
    /// many were removed.
    ///
    /// `keys` never lists expired values, so this is the only way a sweep
    /// can reach them. Backends that evict on their own (Redis TTLs) keep
    /// the default, which removes nothing.
    fn purge_expired(
        &self,
        pattern: &str,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send {
        let _ = pattern;
        async { Ok(0) }
    }

    /// Releases the backend. Later calls fail with [`StoreError::Closed`].
    fn close(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Compiles a key pattern, mapping parse failures to
/// [`StoreError::InvalidPattern`].
pub(crate) fn compile_pattern(pattern: &str) -> Result<glob::Pattern, StoreError> {
    glob::Pattern::new(pattern).map_err(|e| StoreError::InvalidPattern {
        pattern: pattern.to_owned(),
        reason: e.msg.to_owned(),
    })
}

//! The state manager: persists and rehydrates component state.
//!
//! This is the central piece of the state layer. It's responsible for:
//! - Saving a socket's [`ComponentState`] with a bounded lifetime
//! - Loading it back on reconnect, never returning expired state
//! - Listing, deleting, and sweeping stored sockets
//!
//! # Concurrency note
//!
//! `StateManager` holds no per-socket locks. Each socket's updates come
//! from that socket's own task, so they are already serialized; writes
//! for different sockets never touch the same key. [`cleanup`] can run
//! alongside live traffic: before deleting an expired record the manager
//! reads the key again and leaves it alone if a save replaced it. The
//! [`Store`] trait has no compare-and-delete, so a save landing between
//! that second read and the delete can still be lost.
//!
//! [`cleanup`]: StateManager::cleanup

use std::sync::Arc;
use std::time::Duration;

use crate::{
    BinarySerializer, Clock, ComponentState, Serializer, StateError, Store,
    StoreError, SystemClock,
};

// ---------------------------------------------------------------------------
// StateConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`StateManager`].
///
/// `#[derive(Clone)]` because the facade keeps a copy alongside the one
/// the manager owns.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StateConfig {
    /// Namespace prepended to every socket id, so state keys don't
    /// collide with anything else sharing the store.
    pub key_prefix: String,

    /// Lifetime given to state created through
    /// [`StateManager::create`].
    pub default_ttl: Duration,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            key_prefix: "relive:state:".to_owned(),
            default_ttl: Duration::from_secs(60 * 60),
        }
    }
}

/// What a single read found.
enum Fetched {
    Live(ComponentState),
    /// The record had expired and was deleted by this read.
    Purged,
}

// ---------------------------------------------------------------------------
// StateManager
// ---------------------------------------------------------------------------

/// Saves and loads [`ComponentState`] through a [`Store`].
///
/// ## Lifecycle
///
/// ```text
/// create() ──→ save() ──→ (disconnect) ──→ load() ──→ save() ...
///                │                           │
///                ▼                           ▼ (expired)
///          store.set(ttl)              delete + NotFound
///                                            │
/// cleanup() ── load() every socket ──────────┘
/// ```
///
/// Generic over the store `S` and the serializer `Z`, so tests and
/// alternative backends plug in without dynamic dispatch.
pub struct StateManager<S: Store, Z: Serializer = BinarySerializer> {
    store: S,
    serializer: Z,
    config: StateConfig,
    clock: Arc<dyn Clock>,
}

impl<S: Store> StateManager<S> {
    /// Creates a manager with the default serializer and system clock.
    pub fn new(store: S, config: StateConfig) -> Self {
        Self::with_parts(store, BinarySerializer::default(), config, Arc::new(SystemClock))
    }
}

impl<S: Store, Z: Serializer> StateManager<S, Z> {
    /// Creates a manager from explicit parts.
    pub fn with_parts(
        store: S,
        serializer: Z,
        config: StateConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            serializer,
            config,
            clock,
        }
    }

    /// Builds a new state with the configured default TTL, stamped with
    /// this manager's clock. Nothing is written until [`save`](Self::save).
    pub fn create(
        &self,
        socket_id: impl Into<String>,
        component_name: impl Into<String>,
        assigns: serde_json::Map<String, serde_json::Value>,
    ) -> ComponentState {
        ComponentState::new(
            socket_id,
            component_name,
            assigns,
            self.config.default_ttl,
            self.clock.now(),
        )
    }

    /// Persists `state`.
    ///
    /// Bumps `state.version`, stamps `updated_at`, and writes the
    /// serialized state with a store TTL of `expires_at - now`. A state
    /// whose deadline has already passed is still written (with a zero
    /// TTL) and is immediately absent to readers.
    ///
    /// # Errors
    /// [`StateError::Serialization`] or a store failure. On error the
    /// version bump is rolled back.
    pub async fn save(&self, state: &mut ComponentState) -> Result<(), StateError> {
        let now = self.clock.now();
        let previous = (state.version, state.updated_at);
        state.version += 1;
        state.updated_at = now;

        let result = self.write(state, now).await;
        if result.is_err() {
            (state.version, state.updated_at) = previous;
        }
        result
    }

    async fn write(
        &self,
        state: &ComponentState,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), StateError> {
        let bytes = self.serializer.marshal(state)?;
        let ttl = state.remaining_ttl(now);
        self.store
            .set(&self.key(&state.socket_id), bytes, Some(ttl))
            .await?;

        tracing::debug!(
            socket_id = %state.socket_id,
            version = state.version,
            ttl_secs = ttl.as_secs(),
            "state saved"
        );
        Ok(())
    }

    /// Loads the live state for `socket_id`.
    ///
    /// # Errors
    /// - [`StateError::NotFound`] — nothing stored, or the stored state
    ///   has expired (it is deleted before returning)
    /// - corrupt data or store failures otherwise
    pub async fn load(&self, socket_id: &str) -> Result<ComponentState, StateError> {
        match self.fetch(socket_id).await? {
            Fetched::Live(state) => Ok(state),
            Fetched::Purged => Err(StateError::NotFound(socket_id.to_owned())),
        }
    }

    async fn fetch(&self, socket_id: &str) -> Result<Fetched, StateError> {
        let key = self.key(socket_id);
        let bytes = self.store.get(&key).await.map_err(|e| match e {
            StoreError::NotFound(_) => StateError::NotFound(socket_id.to_owned()),
            other => StateError::Store(other),
        })?;
        let state: ComponentState = self.serializer.unmarshal(&bytes)?;
        if !state.is_expired_at(self.clock.now()) {
            return Ok(Fetched::Live(state));
        }

        // Only delete the record we judged expired.
        match self.store.get(&key).await {
            Ok(current) if current == bytes => {}
            Ok(current) => {
                let replaced: ComponentState = self.serializer.unmarshal(&current)?;
                if !replaced.is_expired_at(self.clock.now()) {
                    tracing::debug!(
                        %socket_id,
                        version = replaced.version,
                        "state replaced during expiry check"
                    );
                    return Ok(Fetched::Live(replaced));
                }
            }
            Err(StoreError::NotFound(_)) => {
                return Err(StateError::NotFound(socket_id.to_owned()));
            }
            Err(e) => return Err(e.into()),
        }

        self.store.delete(&key).await?;
        tracing::debug!(%socket_id, version = state.version, "expired state purged");
        Ok(Fetched::Purged)
    }

    /// Pushes the deadline of a stored state to `now + ttl` and saves it.
    ///
    /// Returns the refreshed state (with its bumped version).
    pub async fn refresh(
        &self,
        socket_id: &str,
        ttl: Duration,
    ) -> Result<ComponentState, StateError> {
        let mut state = self.load(socket_id).await?;
        state.extend(ttl, self.clock.now());
        self.save(&mut state).await?;
        Ok(state)
    }

    /// Removes the state for `socket_id`. Missing state is not an error.
    pub async fn delete(&self, socket_id: &str) -> Result<(), StateError> {
        self.store.delete(&self.key(socket_id)).await?;
        tracing::debug!(%socket_id, "state deleted");
        Ok(())
    }

    /// Returns `true` if the store holds live state for `socket_id`.
    pub async fn exists(&self, socket_id: &str) -> Result<bool, StateError> {
        Ok(self.store.exists(&self.key(socket_id)).await?)
    }

    /// Socket ids with stored state, without the key prefix.
    pub async fn list_sockets(&self) -> Result<Vec<String>, StateError> {
        let keys = self.store.keys(&self.key_pattern()).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| {
                key.strip_prefix(&self.config.key_prefix)
                    .map(str::to_owned)
            })
            .collect())
    }

    /// Removes every expired record under the key prefix and returns how
    /// many were removed.
    ///
    /// Two passes: the store drops values past their store TTL (which
    /// `keys` never lists), then every remaining socket is loaded and
    /// purged if its own deadline has passed.
    ///
    /// Idempotent and safe to run on any schedule. Entries that fail to
    /// decode are logged and left alone; they are corrupt, not expired.
    pub async fn cleanup(&self) -> Result<usize, StateError> {
        let mut purged = self.store.purge_expired(&self.key_pattern()).await?;
        let sockets = self.list_sockets().await?;

        for socket_id in &sockets {
            match self.fetch(socket_id).await {
                Ok(Fetched::Purged) => purged += 1,
                Ok(Fetched::Live(_)) => {}
                // Deleted by someone else since we listed it.
                Err(StateError::NotFound(_)) => {}
                Err(StateError::Store(e)) => return Err(StateError::Store(e)),
                Err(e) => {
                    tracing::warn!(%socket_id, error = %e, "skipping unreadable state");
                }
            }
        }

        if purged > 0 {
            tracing::info!(purged, scanned = sockets.len(), "expired state cleaned up");
        }
        Ok(purged)
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    pub fn serializer(&self) -> &Z {
        &self.serializer
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Glob matching every key under the prefix. The prefix is escaped so
    /// a `*` or `[` in it is matched literally.
    fn key_pattern(&self) -> String {
        format!("{}*", glob::Pattern::escape(&self.config.key_prefix))
    }

    fn key(&self, socket_id: &str) -> String {
        format!("{}{}", self.config.key_prefix, socket_id)
    }
}

// =========================================================================
// Tests
// =========================================================================

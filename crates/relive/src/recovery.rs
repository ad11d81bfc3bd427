//! Disconnect / resume orchestration.
//!
//! Ties the state manager and the token signer into the two calls the
//! connection handler actually makes:
//!
//! ```text
//! socket drops ──→ disconnect(state) ──→ save + mint ──→ token blob to client
//!
//! client returns ──→ resume(blob) ──→ decode ──→ verify ──→ load ──→ version check
//!                                        │          │         │            │
//!                                        ▼          ▼         ▼            ▼
//!                                   InvalidData  Expired/  NotFound   Superseded
//!                                               Checksum
//! ```
//!
//! Every rejection except `InvalidData` (and backend faults) is "absent":
//! see [`ReliveError::is_absent`].

use std::sync::Arc;
use std::time::Duration;

use relive_state::{
    ComponentState, RecoveryToken, StateError, StateManager, Store, TokenSigner,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ReliveError;

/// Saves state on disconnect and rehydrates it on reconnect.
///
/// Cheap to share: the manager sits behind an `Arc`, so the background
/// cleanup task and every connection task use the same one.
pub struct SessionRecovery<S: Store> {
    manager: Arc<StateManager<S>>,
    signer: TokenSigner,
    token_ttl: Duration,
}

impl<S: Store> SessionRecovery<S> {
    pub fn new(manager: StateManager<S>, signer: TokenSigner, token_ttl: Duration) -> Self {
        Self {
            manager: Arc::new(manager),
            signer,
            token_ttl,
        }
    }

    /// Persists `state` and returns an encoded recovery token for it.
    ///
    /// The save bumps `state.version`, so any token handed out by an
    /// earlier disconnect of the same socket stops matching and is
    /// rejected by [`resume`](Self::resume).
    pub async fn disconnect(&self, state: &mut ComponentState) -> Result<Vec<u8>, ReliveError> {
        self.manager.save(state).await?;

        let now = self.manager.clock().now();
        let token = self.signer.mint(state, self.token_ttl, now);
        let blob = token.encode(self.manager.serializer())?;

        tracing::info!(
            socket_id = %state.socket_id,
            component = %state.component_name,
            version = state.version,
            "state saved for recovery"
        );
        Ok(blob)
    }

    /// Validates a token blob and loads the state it names.
    ///
    /// # Errors
    /// - `InvalidData` / `Serialization` — the blob isn't a token
    /// - `InvalidChecksum` — forged or tampered token
    /// - `TokenExpired` — presented too late
    /// - `NotFound` — the state expired or was deleted
    /// - `TokenSuperseded` — a newer disconnect issued a newer token
    pub async fn resume(&self, blob: &[u8]) -> Result<ComponentState, ReliveError> {
        let token = RecoveryToken::decode(blob, self.manager.serializer())?;
        let now = self.manager.clock().now();

        if let Err(e) = self.signer.verify(&token, now) {
            tracing::info!(socket_id = %token.socket_id, reason = %e, "recovery rejected");
            return Err(e.into());
        }

        let state = self.manager.load(&token.socket_id).await?;
        if state.version != token.state_version || state.component_name != token.component_name {
            tracing::info!(
                socket_id = %token.socket_id,
                token_version = token.state_version,
                state_version = state.version,
                "recovery rejected: token superseded"
            );
            return Err(StateError::TokenSuperseded {
                socket_id: token.socket_id,
                token_version: token.state_version,
                state_version: state.version,
            }
            .into());
        }

        tracing::info!(
            socket_id = %state.socket_id,
            version = state.version,
            "session resumed"
        );
        Ok(state)
    }

    /// Forgets a socket's state on explicit logout.
    pub async fn logout(&self, socket_id: &str) -> Result<(), ReliveError> {
        self.manager.delete(socket_id).await?;
        tracing::info!(%socket_id, "state discarded on logout");
        Ok(())
    }

    pub fn manager(&self) -> &Arc<StateManager<S>> {
        &self.manager
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Starts a task that runs [`StateManager::cleanup`] every
    /// `interval` until the returned handle is aborted.
    pub fn spawn_cleanup(&self, interval: Duration) -> JoinHandle<()> {
        spawn_cleanup(Arc::clone(&self.manager), interval)
    }
}

/// Runs `manager.cleanup()` on a fixed period.
///
/// A slow sweep doesn't cause a burst of catch-up sweeps: missed ticks
/// are skipped. Errors are logged and the loop keeps going.
///
/// # Panics
/// Panics if `interval` is zero (a `tokio::time::interval` requirement).
pub fn spawn_cleanup<S: Store>(manager: Arc<StateManager<S>>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; skip it so the first
        // sweep happens one period after startup.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match manager.cleanup().await {
                Ok(purged) => tracing::debug!(purged, "cleanup sweep finished"),
                Err(e) => tracing::warn!(error = %e, "cleanup sweep failed"),
            }
        }
    })
}

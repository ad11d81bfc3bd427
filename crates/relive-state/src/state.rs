//! The persisted snapshot of one connection's component state.
//!
//! A `ComponentState` is what survives a dropped WebSocket. It records:
//! - WHICH socket it belongs to (`socket_id`, stable across reconnects)
//! - WHAT component was mounted (`component_name`)
//! - the component's `assigns`, the durable payload
//! - WHEN it was created, last saved, and when it stops being valid

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::{expiry_after, remaining};

/// Versioned, time-bounded state for one socket.
///
/// ```text
///  new() ──→ version 1 ──save()──→ version 2 ──save()──→ version 3 ...
///    │                                                     │
///    └──────────────── expires_at ─────────────────────────┘
///                          │
///                          ▼ (now > expires_at)
///                 absent to load(), deleted
/// ```
///
/// `version` starts at 1, standing in for the save that created the
/// state, and the [`StateManager`](crate::StateManager) bumps it on
/// every save. Callers compare versions to detect a concurrent writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentState {
    pub socket_id: String,
    pub component_name: String,
    pub assigns: Map<String, Value>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ComponentState {
    /// Creates state for a freshly mounted component, valid for `ttl`
    /// from `now`.
    pub fn new(
        socket_id: impl Into<String>,
        component_name: impl Into<String>,
        assigns: Map<String, Value>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            socket_id: socket_id.into(),
            component_name: component_name.into(),
            assigns,
            version: 1,
            created_at: now,
            updated_at: now,
            expires_at: expiry_after(now, ttl),
        }
    }

    /// Sets one assign, returning the previous value.
    pub fn assign(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.assigns.insert(key.into(), value)
    }

    pub fn get_assign(&self, key: &str) -> Option<&Value> {
        self.assigns.get(key)
    }

    /// `true` once `now` is past `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Lifetime left at `now`; zero when expired.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        remaining(self.expires_at, now)
    }

    /// Pushes the deadline to `now + ttl`.
    pub fn extend(&mut self, ttl: Duration, now: DateTime<Utc>) {
        self.expires_at = expiry_after(now, ttl);
    }
}

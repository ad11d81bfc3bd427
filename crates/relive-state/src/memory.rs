//! In-process [`Store`] backed by a `HashMap`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::clock::expiry_after;
use crate::store::compile_pattern;
use crate::{Clock, Store, StoreError, SystemClock};

/// One stored value and its deadline.
#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// The default [`Store`]: a map in process memory.
///
/// Expiry is lazy. Expired entries stay in the map until something reads
/// them (or [`Store::purge_expired`] sweeps them), but no
/// read ever reports an expired entry as live.
///
/// The map sits behind a `tokio::sync::RwLock`; lookups from many
/// connection tasks proceed in parallel, writes take the lock briefly.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store that judges expiry with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            closed: AtomicBool::new(false),
        }
    }

    /// Number of entries held, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if the map holds no entries at all.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.ensure_open()?;
        let now = self.clock.now();

        // Fast path under the read lock.
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Err(StoreError::NotFound(key.to_owned())),
                Some(entry) if !entry.is_expired(now) => {
                    return Ok(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        // Expired: drop it while we're here. Re-check under the write
        // lock because a writer may have replaced it in between.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        match entries.get(key) {
            Some(entry) => Ok(entry.value.clone()),
            None => Err(StoreError::NotFound(key.to_owned())),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        let expires_at = ttl.map(|ttl| expiry_after(self.clock.now(), ttl));
        self.entries
            .write()
            .await
            .insert(key.to_owned(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let now = self.clock.now();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now)))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.ensure_open()?;
        let pattern = compile_pattern(pattern)?;
        let now = self.clock.now();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired(now) && pattern.matches(key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn purge_expired(&self, pattern: &str) -> Result<usize, StoreError> {
        self.ensure_open()?;
        let pattern = compile_pattern(pattern)?;
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, entry| !(entry.is_expired(now) && pattern.matches(key)));
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!(purged, "expired entries swept");
        }
        Ok(purged)
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        self.entries.write().await.clear();
        tracing::debug!("memory store closed");
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================

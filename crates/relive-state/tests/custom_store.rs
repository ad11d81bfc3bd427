//! Integration tests for `StateManager` over a user-supplied `Store`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relive_state::{
    BinarySerializer, Clock, ManualClock, MemoryStore, StateConfig, StateError, StateManager, Store,
    StoreError,
};
use serde_json::{Map, json};

// =========================================================================
// Test backend: a MemoryStore that can be told to fail writes, or to
// answer the next read with an older value.
// =========================================================================

#[derive(Debug, Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
    stale_read: Mutex<Option<Vec<u8>>>,
}

impl FlakyStore {
    fn with_clock(clock: &ManualClock) -> Self {
        Self {
            inner: MemoryStore::with_clock(Arc::new(clock.clone())),
            ..Self::default()
        }
    }
}

impl Store for FlakyStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let stale = self.stale_read.lock().unwrap().take();
        if let Some(bytes) = stale {
            return Ok(bytes);
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk full".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.inner.keys(pattern).await
    }

    async fn purge_expired(&self, pattern: &str) -> Result<usize, StoreError> {
        self.inner.purge_expired(pattern).await
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.inner.close().await
    }
}

fn manager(clock: &ManualClock, prefix: &str) -> StateManager<FlakyStore> {
    StateManager::with_parts(
        FlakyStore::with_clock(clock),
        BinarySerializer::default(),
        StateConfig {
            key_prefix: prefix.to_owned(),
            default_ttl: Duration::from_secs(3600),
        },
        Arc::new(clock.clone()),
    )
}

fn assigns(count: i64) -> Map<String, serde_json::Value> {
    let mut assigns = Map::new();
    assigns.insert("count".into(), json!(count));
    assigns
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_failed_write_rolls_back_version() {
    let clock = ManualClock::default();
    let manager = manager(&clock, "app:");
    let mut state = manager.create("s1", "Counter", assigns(0));
    manager.save(&mut state).await.unwrap();
    let saved = state.clone();

    manager.store().fail_writes.store(true, Ordering::SeqCst);
    clock.advance(Duration::from_secs(5));
    let err = manager.save(&mut state).await.unwrap_err();

    assert!(matches!(err, StateError::Store(StoreError::Backend(_))));
    assert!(!err.is_absent());
    assert_eq!(state.version, saved.version);
    assert_eq!(state.updated_at, saved.updated_at);
    assert_eq!(manager.load("s1").await.unwrap(), saved);
}

#[tokio::test]
async fn test_refresh_extends_deadline_past_original_expiry() {
    let clock = ManualClock::default();
    let manager = manager(&clock, "app:");
    let mut state = manager.create("s1", "Counter", assigns(0));
    manager.save(&mut state).await.unwrap();

    clock.advance(Duration::from_secs(3000));
    let refreshed = manager.refresh("s1", Duration::from_secs(3600)).await.unwrap();
    assert_eq!(refreshed.version, state.version + 1);

    // Past the original hour, inside the refreshed one.
    clock.advance(Duration::from_secs(1200));
    let loaded = manager.load("s1").await.unwrap();
    assert_eq!(loaded, refreshed);
    assert_eq!(manager.store().writes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_prefixes_partition_a_shared_keyspace() {
    let clock = ManualClock::default();
    let manager = manager(&clock, "a:");
    let mut mine = manager.create("s1", "Counter", assigns(1));
    manager.save(&mut mine).await.unwrap();

    // A foreign key in the same backend, outside our prefix.
    manager
        .store()
        .set("b:s2", b"not ours".to_vec(), None)
        .await
        .unwrap();

    assert_eq!(manager.list_sockets().await.unwrap(), vec!["s1".to_owned()]);
    assert_eq!(manager.cleanup().await.unwrap(), 0);
    assert!(manager.store().exists("b:s2").await.unwrap());
}

#[tokio::test]
async fn test_cleanup_skips_corrupt_entries_and_purges_expired() {
    let clock = ManualClock::default();
    let manager = manager(&clock, "app:");

    let mut short = manager.create("short", "Counter", assigns(0));
    short.extend(Duration::from_secs(10), clock.now());
    manager.save(&mut short).await.unwrap();
    let mut long = manager.create("long", "Counter", assigns(0));
    manager.save(&mut long).await.unwrap();
    manager
        .store()
        .set("app:garbage", vec![0x7f, 1, 2, 3], None)
        .await
        .unwrap();

    clock.advance(Duration::from_secs(60));
    let purged = manager.cleanup().await.unwrap();

    assert_eq!(purged, 1);
    assert_eq!(manager.store().inner.len().await, 2);
    let mut sockets = manager.list_sockets().await.unwrap();
    sockets.sort();
    assert_eq!(sockets, vec!["garbage".to_owned(), "long".to_owned()]);
    assert!(matches!(
        manager.load("garbage").await,
        Err(StateError::InvalidData(_))
    ));
}

#[tokio::test]
async fn test_load_keeps_state_saved_after_an_expired_read() {
    let clock = ManualClock::default();
    let manager = manager(&clock, "app:");
    let mut state = manager.create("s1", "Counter", assigns(0));
    state.extend(Duration::from_secs(60), clock.now());
    manager.save(&mut state).await.unwrap();
    let old_bytes = manager.store().get("app:s1").await.unwrap();

    // The client reconnects and its state is saved with a fresh deadline.
    state.extend(Duration::from_secs(3600), clock.now());
    manager.save(&mut state).await.unwrap();
    clock.advance(Duration::from_secs(120));

    // The first read still sees the old, now expired, record.
    *manager.store().stale_read.lock().unwrap() = Some(old_bytes);
    let loaded = manager.load("s1").await.unwrap();

    assert_eq!(loaded, state);
    assert!(manager.exists("s1").await.unwrap());
}

#[tokio::test]
async fn test_cleanup_keeps_state_saved_after_an_expired_read() {
    let clock = ManualClock::default();
    let manager = manager(&clock, "app:");
    let mut state = manager.create("s1", "Counter", assigns(0));
    state.extend(Duration::from_secs(60), clock.now());
    manager.save(&mut state).await.unwrap();
    let old_bytes = manager.store().get("app:s1").await.unwrap();
    state.extend(Duration::from_secs(3600), clock.now());
    manager.save(&mut state).await.unwrap();
    clock.advance(Duration::from_secs(120));

    *manager.store().stale_read.lock().unwrap() = Some(old_bytes);

    assert_eq!(manager.cleanup().await.unwrap(), 0);
    assert_eq!(manager.load("s1").await.unwrap().version, state.version);
}

#[tokio::test]
async fn test_concurrent_saves_for_distinct_sockets() {
    let clock = ManualClock::default();
    let manager = Arc::new(manager(&clock, "app:"));

    let mut handles = Vec::new();
    for i in 0..16 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            let mut state = manager.create(format!("s{i}"), "Counter", assigns(i));
            manager.save(&mut state).await.map(|()| state)
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(manager.list_sockets().await.unwrap().len(), 16);
    let loaded = manager.load("s7").await.unwrap();
    assert_eq!(loaded.get_assign("count"), Some(&json!(7)));
}

#[tokio::test]
async fn test_closed_store_surfaces_as_backend_error() {
    let clock = ManualClock::default();
    let manager = manager(&clock, "app:");
    manager.store().close().await.unwrap();

    let err = manager.load("s1").await.unwrap_err();

    assert!(matches!(err, StateError::Store(StoreError::Closed)));
}

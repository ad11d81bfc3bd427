//! End-to-end tests for disconnect → token → resume.
//!
//! Time is driven by a `ManualClock` shared between the store and the
//! state manager, so expiry is tested without sleeping.

use std::sync::Arc;
use std::time::Duration;

use relive::prelude::*;
use serde_json::{Map, json};

const HOUR: Duration = Duration::from_secs(3600);

// =========================================================================
// Helpers
// =========================================================================

fn relive_with_clock(config: ReliveConfig) -> (Relive<MemoryStore>, ManualClock) {
    let clock = ManualClock::default();
    let store = MemoryStore::with_clock(Arc::new(clock.clone()));
    let relive = Relive::with_clock(
        store,
        TokenSigner::new(b"test-secret".to_vec()),
        config,
        Arc::new(clock.clone()),
    )
    .unwrap();
    (relive, clock)
}

fn one_hour_config() -> ReliveConfig {
    ReliveConfig::builder()
        .state_ttl(HOUR)
        .token_ttl(HOUR)
        .build()
}

fn counter_state(relive: &Relive<MemoryStore>, socket_id: &str) -> ComponentState {
    let mut assigns = Map::new();
    assigns.insert("count".into(), json!(0));
    relive.recovery().manager().create(socket_id, "Counter", assigns)
}

// =========================================================================
// Happy path
// =========================================================================

#[tokio::test]
async fn test_full_lifecycle_save_resume_then_expire() {
    let (relive, clock) = relive_with_clock(one_hour_config());
    let recovery = relive.recovery();
    let manager = recovery.manager();

    // 1. Socket drops: state is saved (version 1 → 2) and a token minted.
    let mut state = counter_state(&relive, "s1");
    let blob = recovery.disconnect(&mut state).await.unwrap();

    // 2. Load returns it unchanged at version 2.
    let loaded = manager.load("s1").await.unwrap();
    assert_eq!(loaded.version, 2);
    assert_eq!(loaded.assigns["count"], json!(0));

    // 3. The token names that version and verifies.
    let token = RecoveryToken::decode(&blob, manager.serializer()).unwrap();
    assert_eq!(token.state_version, 2);
    recovery.signer().verify(&token, clock.now()).unwrap();

    // 4. Resume within the window works.
    let resumed = recovery.resume(&blob).await.unwrap();
    assert_eq!(resumed, loaded);

    // 5. The window passes: state is gone and the token is rejected on
    //    its own terms too.
    clock.advance(HOUR + Duration::from_secs(1));

    let err = manager.load("s1").await.unwrap_err();
    assert!(matches!(err, StateError::NotFound(_)));
    assert!(!manager.exists("s1").await.unwrap());
    assert!(token.is_expired_at(clock.now()));
    assert!(matches!(
        recovery.signer().verify(&token, clock.now()),
        Err(StateError::TokenExpired(_))
    ));

    let err = recovery.resume(&blob).await.unwrap_err();
    assert!(err.is_absent());
}

#[tokio::test]
async fn test_resume_preserves_large_assigns() {
    let (relive, _clock) = relive_with_clock(one_hour_config());
    let mut state = counter_state(&relive, "s1");
    let items: Vec<_> = (0..300).map(|i| json!({"id": i, "done": i % 2 == 0})).collect();
    state.assign("todos", json!(items));

    let blob = relive.recovery().disconnect(&mut state).await.unwrap();
    let resumed = relive.recovery().resume(&blob).await.unwrap();

    assert_eq!(resumed.assigns, state.assigns);
}

// =========================================================================
// Rejections
// =========================================================================

#[tokio::test]
async fn test_second_disconnect_supersedes_first_token() {
    let (relive, _clock) = relive_with_clock(one_hour_config());
    let recovery = relive.recovery();
    let mut state = counter_state(&relive, "s1");

    let first = recovery.disconnect(&mut state).await.unwrap();
    state.assign("count", json!(1));
    let second = recovery.disconnect(&mut state).await.unwrap();

    let err = recovery.resume(&first).await.unwrap_err();
    assert!(matches!(
        err,
        ReliveError::State(StateError::TokenSuperseded {
            token_version: 2,
            state_version: 3,
            ..
        })
    ));
    assert!(err.is_absent());

    let resumed = recovery.resume(&second).await.unwrap();
    assert_eq!(resumed.assigns["count"], json!(1));
}

#[tokio::test]
async fn test_token_expires_before_state() {
    let config = ReliveConfig::builder()
        .state_ttl(HOUR)
        .token_ttl(Duration::from_secs(60))
        .build();
    let (relive, clock) = relive_with_clock(config);
    let mut state = counter_state(&relive, "s1");
    let blob = relive.recovery().disconnect(&mut state).await.unwrap();

    clock.advance(Duration::from_secs(120));

    let err = relive.recovery().resume(&blob).await.unwrap_err();
    assert!(matches!(err, ReliveError::State(StateError::TokenExpired(_))));
    // The state itself is still there.
    assert!(relive.recovery().manager().exists("s1").await.unwrap());
}

#[tokio::test]
async fn test_tampered_token_is_rejected() {
    let (relive, _clock) = relive_with_clock(one_hour_config());
    let manager = relive.recovery().manager();
    let mut victim = counter_state(&relive, "victim");
    let mut attacker = counter_state(&relive, "attacker");
    relive.recovery().disconnect(&mut victim).await.unwrap();
    let blob = relive.recovery().disconnect(&mut attacker).await.unwrap();

    let mut token = RecoveryToken::decode(&blob, manager.serializer()).unwrap();
    token.socket_id = "victim".into();
    let forged = token.encode(manager.serializer()).unwrap();

    let err = relive.recovery().resume(&forged).await.unwrap_err();
    assert!(matches!(err, ReliveError::State(StateError::InvalidChecksum)));
}

#[tokio::test]
async fn test_token_from_other_server_secret_is_rejected() {
    let (relive, clock) = relive_with_clock(one_hour_config());
    let mut state = counter_state(&relive, "s1");
    relive.recovery().disconnect(&mut state).await.unwrap();

    let foreign = TokenSigner::new(b"someone-else".to_vec()).mint(&state, HOUR, clock.now());
    let blob = foreign
        .encode(relive.recovery().manager().serializer())
        .unwrap();

    let err = relive.recovery().resume(&blob).await.unwrap_err();
    assert!(matches!(err, ReliveError::State(StateError::InvalidChecksum)));
}

#[tokio::test]
async fn test_garbage_token_is_invalid_data_not_absent() {
    let (relive, _clock) = relive_with_clock(one_hour_config());

    let err = relive.recovery().resume(&[]).await.unwrap_err();

    assert!(matches!(err, ReliveError::State(StateError::InvalidData(_))));
    assert!(!err.is_absent());
}

#[tokio::test]
async fn test_logout_discards_state() {
    let (relive, _clock) = relive_with_clock(one_hour_config());
    let mut state = counter_state(&relive, "s1");
    let blob = relive.recovery().disconnect(&mut state).await.unwrap();

    relive.recovery().logout("s1").await.unwrap();

    let err = relive.recovery().resume(&blob).await.unwrap_err();
    assert!(matches!(err, ReliveError::State(StateError::NotFound(_))));
}

// =========================================================================
// Background cleanup
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_cleanup_task_purges_expired_state() {
    // The store runs on the real clock and still lists the record; the
    // manager's own deadline check has to remove it.
    let clock = ManualClock::default();
    let relive = Relive::with_clock(
        MemoryStore::new(),
        TokenSigner::random(),
        ReliveConfig::builder()
            .state_ttl(HOUR)
            .cleanup_interval(Duration::from_secs(60))
            .build(),
        Arc::new(clock.clone()),
    )
    .unwrap();
    let manager = relive.recovery().manager();
    let mut state = counter_state(&relive, "s1");
    manager.save(&mut state).await.unwrap();

    let sweeper = relive.start_cleanup().unwrap();
    clock.advance(HOUR * 2);
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_secs(61)).await;
        if !manager.exists("s1").await.unwrap() {
            break;
        }
    }

    assert!(!manager.exists("s1").await.unwrap());
    sweeper.abort();
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_task_empties_store_sharing_the_clock() {
    let (relive, clock) = relive_with_clock(one_hour_config());
    let manager = relive.recovery().manager();
    for id in ["s1", "s2", "s3"] {
        let mut state = counter_state(&relive, id);
        relive.recovery().disconnect(&mut state).await.unwrap();
    }
    assert_eq!(manager.store().len().await, 3);

    let sweeper = relive.start_cleanup().unwrap();
    clock.advance(HOUR * 2);
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_secs(61)).await;
        if manager.store().is_empty().await {
            break;
        }
    }

    assert!(manager.store().is_empty().await);
    sweeper.abort();
}

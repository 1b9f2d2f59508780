//! Integration tests for the daily reset workflow.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use questline_core::store::paths;
use questline_core::{
    clock, AuthProvider, ChallengeDraft, DailyChallenge, FixedAuth, MemoryStore, ResetScheduler,
    Store,
};

async fn seed_stale(store: &Arc<dyn Store>, user: &str, id: &str) {
    let mut challenge =
        DailyChallenge::from_draft(&ChallengeDraft::new("Read", 3), user, Utc::now());
    challenge.current = 3;
    challenge.is_completed = true;
    challenge.count_completed = 6;
    challenge.is_completed_data = vec![Utc::now()];
    challenge.last_reset_date = "Tue Aug 05 2025".to_string();
    store
        .write(
            &paths::daily_challenge(user, id),
            challenge.to_value().unwrap(),
        )
        .await
        .unwrap();
}

async fn read_daily(store: &Arc<dyn Store>, user: &str, id: &str) -> DailyChallenge {
    let doc = store
        .read(&paths::daily_challenge(user, id))
        .await
        .unwrap()
        .expect("challenge present");
    DailyChallenge::decode(id, user, doc).unwrap()
}

#[tokio::test]
async fn test_stale_challenges_reset_in_one_pass() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    seed_stale(&store, "u1", "c1").await;
    seed_stale(&store, "u1", "c2").await;

    let scheduler = ResetScheduler::new(
        Arc::clone(&store),
        Arc::new(FixedAuth::signed_in("u1")),
    );
    assert_eq!(scheduler.run_once().await.unwrap(), 2);

    for id in ["c1", "c2"] {
        let challenge = read_daily(&store, "u1", id).await;
        assert_eq!(challenge.current, 0);
        assert!(!challenge.is_completed);
        assert_eq!(challenge.last_reset_date, clock::today_key());
        // History and identity fields survive the reset.
        assert_eq!(challenge.title, "Read");
        assert_eq!(challenge.target, 3);
        assert_eq!(challenge.count_completed, 6);
        assert_eq!(challenge.is_completed_data.len(), 1);
    }
}

#[tokio::test]
async fn test_reset_is_a_noop_on_the_same_day() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let auth: Arc<dyn AuthProvider> = Arc::new(FixedAuth::signed_in("u1"));

    let mut challenge =
        DailyChallenge::from_draft(&ChallengeDraft::new("Read", 3), "u1", Utc::now());
    challenge.current = 2;
    store
        .write(
            &paths::daily_challenge("u1", "c1"),
            challenge.to_value().unwrap(),
        )
        .await
        .unwrap();

    let scheduler = ResetScheduler::new(Arc::clone(&store), auth);
    assert_eq!(scheduler.run_once().await.unwrap(), 0);

    let challenge = read_daily(&store, "u1", "c1").await;
    assert_eq!(challenge.current, 2);
}

#[tokio::test]
async fn test_spawned_scheduler_runs_an_immediate_pass() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    seed_stale(&store, "u1", "c1").await;

    let handle = ResetScheduler::new(
        Arc::clone(&store),
        Arc::new(FixedAuth::signed_in("u1")),
    )
    .spawn();

    // The startup pass is asynchronous; poll until it lands.
    let mut reset = false;
    for _ in 0..50 {
        let challenge = read_daily(&store, "u1", "c1").await;
        if challenge.current == 0 && challenge.last_reset_date == clock::today_key() {
            reset = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(reset, "scheduler never ran its startup pass");

    handle.cancel();
}

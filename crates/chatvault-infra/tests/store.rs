//! End-to-end behavior of `ChatStore` against a real SQLite file.

use chatvault_core::cancel::with_cancellation;
use chatvault_core::event::EventBus;
use chatvault_core::repository::{MaintenanceRepository, MessageRepository, SessionRepository};
use chatvault_core::retention::RetentionPolicy;
use chatvault_infra::ChatStore;
use chatvault_types::chat::{ChatSession, Message, MessageRole};
use chatvault_types::config::{StoreConfig, UpgradePolicy};
use chatvault_types::error::RepositoryError;
use chatvault_types::event::StoreEvent;
use sqlx::Connection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

async fn open_store(dir: &TempDir) -> ChatStore {
    ChatStore::open(dir.path().join("chat.db"), StoreConfig::default(), EventBus::default())
        .await
        .unwrap()
}

fn session(id: &str, user: &str, offline: bool, last_updated: i64) -> ChatSession {
    ChatSession::new(id, user, "New Chat", offline, last_updated)
}

fn message(id: &str, session_id: &str, timestamp: i64) -> Message {
    Message::new(id, session_id, MessageRole::User, format!("text {id}"), timestamp)
}

#[tokio::test]
async fn inserted_sessions_are_listed_for_their_user() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let s = session("s1", "alice", false, 42);
    store.sessions().insert_session(&s).await.unwrap();

    assert_eq!(store.sessions().list_sessions("alice").await.unwrap(), vec![s]);
    assert!(store.sessions().list_sessions("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_users_sessions_cascades_to_messages() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    store.sessions().insert_session(&session("s1", "alice", false, 1)).await.unwrap();
    store.sessions().insert_session(&session("s2", "alice", true, 2)).await.unwrap();
    store.sessions().insert_session(&session("s3", "bob", false, 3)).await.unwrap();
    for (id, sid) in [("m1", "s1"), ("m2", "s1"), ("m3", "s2"), ("m4", "s3")] {
        store.messages().insert_message(&message(id, sid, 10)).await.unwrap();
    }

    assert_eq!(store.sessions().delete_sessions_for_user("alice").await.unwrap(), 2);

    assert_eq!(store.messages().count_messages("s1").await.unwrap(), 0);
    assert_eq!(store.messages().count_messages("s2").await.unwrap(), 0);
    assert_eq!(store.messages().count_messages("s3").await.unwrap(), 1);
    assert!(store.maintenance().integrity_check().await.unwrap().is_healthy());
}

#[tokio::test]
async fn message_for_unknown_session_is_rejected_without_side_effects() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store.sessions().insert_session(&session("s1", "alice", false, 1)).await.unwrap();
    store.messages().insert_message(&message("m1", "s1", 1)).await.unwrap();

    let err = store
        .messages()
        .insert_message(&message("m2", "ghost", 2))
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::ConstraintViolation(_)), "{err:?}");
    assert_eq!(store.messages().count_messages("s1").await.unwrap(), 1);
    assert_eq!(store.messages().count_messages("ghost").await.unwrap(), 0);
}

#[tokio::test]
async fn messages_come_back_in_time_order() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store.sessions().insert_session(&session("s1", "alice", false, 1)).await.unwrap();

    for (id, ts) in [("c", 30), ("a", 10), ("e", 50), ("b", 20), ("d", 40)] {
        store.messages().insert_message(&message(id, "s1", ts)).await.unwrap();
    }

    let stamps: Vec<i64> = store
        .messages()
        .list_messages("s1")
        .await
        .unwrap()
        .iter()
        .map(|m| m.timestamp)
        .collect();
    assert_eq!(stamps, vec![10, 20, 30, 40, 50]);
}

#[tokio::test]
async fn prune_removes_only_stale_offline_messages() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    store.sessions().insert_session(&session("s1", "alice", true, 1)).await.unwrap();
    store.sessions().insert_session(&session("s2", "alice", false, 1)).await.unwrap();
    store.messages().insert_message(&message("m1", "s1", 100)).await.unwrap();
    store.messages().insert_message(&message("m2", "s1", 200)).await.unwrap();
    store.messages().insert_message(&message("m3", "s2", 50)).await.unwrap();

    assert_eq!(store.messages().prune_offline_messages(150).await.unwrap(), 1);

    let s1 = store.messages().list_messages("s1").await.unwrap();
    assert_eq!(s1.len(), 1);
    assert_eq!(s1[0].timestamp, 200);
    assert_eq!(store.messages().count_messages("s2").await.unwrap(), 1);
    assert_eq!(store.sessions().list_sessions("alice").await.unwrap().len(), 2);
}

#[tokio::test]
async fn repeated_insert_is_idempotent_and_keeps_messages() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let s = session("s1", "alice", false, 7);

    store.sessions().insert_session(&s).await.unwrap();
    store.messages().insert_message(&message("m1", "s1", 1)).await.unwrap();
    store.sessions().insert_session(&s).await.unwrap();

    assert_eq!(store.sessions().list_sessions("alice").await.unwrap(), vec![s]);
    assert_eq!(store.messages().count_messages("s1").await.unwrap(), 1);
}

#[tokio::test]
async fn clear_all_leaves_an_empty_healthy_store() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let mut rx = store.events().subscribe();
    store.sessions().insert_session(&session("s1", "alice", true, 1)).await.unwrap();
    store.messages().insert_message(&message("m1", "s1", 1)).await.unwrap();

    store.maintenance().clear_all_tables().await.unwrap();

    assert!(store.sessions().list_sessions("alice").await.unwrap().is_empty());
    assert_eq!(store.messages().count_messages("s1").await.unwrap(), 0);
    let report = store.maintenance().integrity_check().await.unwrap();
    assert!(report.foreign_keys_enabled);
    assert!(report.problems.is_empty());
    store.validate_schema().await.unwrap();
    assert_eq!(rx.recv().await.unwrap(), StoreEvent::Cleared);
}

#[tokio::test]
async fn data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open_store(&dir).await;
        store.sessions().insert_session(&session("s1", "alice", false, 1)).await.unwrap();
        store.messages().insert_message(&message("m1", "s1", 1)).await.unwrap();
        store.close().await;
    }

    let store = open_store(&dir).await;
    assert_eq!(store.sessions().list_sessions("alice").await.unwrap().len(), 1);
    assert_eq!(store.messages().count_messages("s1").await.unwrap(), 1);
}

async fn downgrade_version(dir: &TempDir) {
    let store = open_store(dir).await;
    store.sessions().insert_session(&session("s1", "alice", false, 1)).await.unwrap();
    sqlx::query("UPDATE store_metadata SET schema_version = 1")
        .execute(&store.pool().writer)
        .await
        .unwrap();
    store.close().await;
}

#[tokio::test]
async fn unknown_version_is_reset_and_listeners_are_told() {
    let dir = TempDir::new().unwrap();
    downgrade_version(&dir).await;

    let events = EventBus::default();
    let mut rx = events.subscribe();
    let store = ChatStore::open(dir.path().join("chat.db"), StoreConfig::default(), events)
        .await
        .unwrap();

    assert!(matches!(
        rx.recv().await.unwrap(),
        StoreEvent::DestructiveReset { from_version: Some(1), .. }
    ));
    assert!(store.sessions().list_sessions("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_version_fails_open_under_fail_policy() {
    let dir = TempDir::new().unwrap();
    downgrade_version(&dir).await;

    let config = StoreConfig {
        upgrade_policy: UpgradePolicy::Fail,
        ..StoreConfig::default()
    };
    let result = ChatStore::open(dir.path().join("chat.db"), config, EventBus::default()).await;

    assert!(matches!(result, Err(RepositoryError::SchemaMismatch(_))));
}

#[tokio::test]
async fn cancelled_read_reports_cancelled() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let token = CancellationToken::new();
    token.cancel();

    let result = with_cancellation(&token, store.messages().list_messages("s1")).await;

    assert!(matches!(result, Err(RepositoryError::Cancelled)));
}

#[tokio::test]
async fn chat_service_records_a_full_turn() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let chat = store.chat_service();

    let s = chat.start_session("alice", None, false).await.unwrap();
    chat.save_user_message("alice", &s.id, "What is the capital of Portugal", None)
        .await
        .unwrap();
    chat.record_reply("alice", &s.id, "What is the capital of Portugal", "Lisbon", false)
        .await
        .unwrap();

    let stored = store.sessions().get_session(&s.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "What is the capital of Portugal");
    assert!(stored.is_offline_only);
    assert_eq!(chat.history(&s.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn pruner_uses_retention_window() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store.sessions().insert_session(&session("s1", "alice", true, 1)).await.unwrap();
    store.messages().insert_message(&message("old", "s1", 1_000)).await.unwrap();

    let day = 86_400_000;
    let pruner = store.pruner(RetentionPolicy::new(90));

    assert_eq!(pruner.run_at(1_000 + 90 * day).await.unwrap(), 0);
    assert_eq!(pruner.run_at(1_001 + 90 * day).await.unwrap(), 1);
}

#[tokio::test]
async fn background_pruner_runs_immediately_and_stops_on_cancel() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let mut rx = store.events().subscribe();
    store.sessions().insert_session(&session("s1", "alice", true, 1)).await.unwrap();
    store.messages().insert_message(&message("old", "s1", 1)).await.unwrap();

    let cancel = CancellationToken::new();
    let handle = store.spawn_pruner(cancel.clone());

    let event = rx.recv().await.unwrap();
    assert!(matches!(event, StoreEvent::Pruned { deleted: 1, .. }), "{event:?}");

    cancel.cancel();
    handle.await.unwrap();
    assert_eq!(store.messages().count_messages("s1").await.unwrap(), 0);
}

#[tokio::test]
async fn write_lock_held_elsewhere_surfaces_as_busy() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chat.db");
    let config = StoreConfig {
        busy_timeout_ms: 50,
        busy_retries: 1,
        ..StoreConfig::default()
    };
    let store = ChatStore::open(&path, config, EventBus::default()).await.unwrap();

    let mut other = SqliteConnection::connect_with(&SqliteConnectOptions::new().filename(&path))
        .await
        .unwrap();
    sqlx::query("BEGIN IMMEDIATE").execute(&mut other).await.unwrap();

    let err = store
        .sessions()
        .insert_session(&session("s1", "alice", false, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::ResourceBusy(_)), "{err:?}");

    sqlx::query("ROLLBACK").execute(&mut other).await.unwrap();
    other.close().await.unwrap();

    store.sessions().insert_session(&session("s1", "alice", false, 1)).await.unwrap();
    assert_eq!(store.sessions().list_sessions("alice").await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn readers_never_see_a_partial_cascade() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store.sessions().insert_session(&session("s1", "alice", false, 1)).await.unwrap();
    sqlx::query(
        "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 2000) \
         INSERT INTO messages (id, session_id, role, content, timestamp, image_path) \
         SELECT 'm' || i, 's1', 'user', 'x', i, NULL FROM n",
    )
    .execute(&store.pool().writer)
    .await
    .unwrap();

    let reader = store.pool().reader.clone();
    let done = Arc::new(AtomicBool::new(false));
    let stop = done.clone();
    let observer = tokio::spawn(async move {
        let mut seen = HashSet::new();
        loop {
            let finished = stop.load(Ordering::SeqCst);
            // One statement reads both tables from the same snapshot.
            let state: (i64, i64) = sqlx::query_as(
                "SELECT (SELECT COUNT(*) FROM chat_sessions WHERE id = 's1'), \
                        (SELECT COUNT(*) FROM messages WHERE session_id = 's1')",
            )
            .fetch_one(&reader)
            .await
            .unwrap();
            seen.insert(state);
            if finished {
                return seen;
            }
            tokio::task::yield_now().await;
        }
    });

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(store.sessions().delete_sessions_for_user("alice").await.unwrap(), 1);
    done.store(true, Ordering::SeqCst);

    let seen = observer.await.unwrap();
    assert!(seen.contains(&(0, 0)), "{seen:?}");
    assert!(seen.is_subset(&HashSet::from([(1, 2000), (0, 0)])), "{seen:?}");
}

//! Behaviour every [`ThreadRepository`] backend must show. Shared by the
//! backend test modules.
//!
//! Timestamps compared after a round trip are truncated to microseconds,
//! the precision the SQLite backend stores.

use chrono::{Duration, SubsecRound, Utc};
use serde_json::{Map, json};
use suna_domain::{
    Message, Role, StoreError, SummaryMode, Thread, ThreadPatch, ThreadRepository,
};

fn thread(id: &str) -> Thread {
    let now = Utc::now();
    Thread {
        thread_id: id.to_string(),
        account_id: "user-1".to_string(),
        created_at: now,
        updated_at: now,
        title: Some("Title".to_string()),
        metadata: Some(json!({"source": "test"})),
    }
}

fn message(thread_id: &str, id: &str, role: Role, at: chrono::DateTime<Utc>) -> Message {
    Message {
        message_id: id.to_string(),
        thread_id: thread_id.to_string(),
        role,
        content: format!("content of {id}"),
        metadata: None,
        created_at: at,
        updated_at: at,
    }
}

fn ids(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.message_id.as_str()).collect()
}

pub async fn run_all(store: &dyn ThreadRepository) {
    thread_round_trip(store).await;
    message_ordering_and_limit(store).await;
    missing_thread(store).await;
    metadata_merge(store).await;
    duplicate_message_id(store).await;
    summary_archives_superseded(store).await;
    summary_deletes_superseded(store).await;
    failed_summary_changes_nothing(store).await;
    cascade_and_cleanup_listing(store).await;
}

async fn thread_round_trip(store: &dyn ThreadRepository) {
    let t = thread("rt");
    store.insert_thread(&t).await.unwrap();
    let loaded = store.get_thread("rt").await.unwrap().unwrap();
    assert_eq!(loaded.account_id, "user-1");
    assert_eq!(loaded.title.as_deref(), Some("Title"));
    assert_eq!(loaded.metadata, Some(json!({"source": "test"})));

    let later = (t.updated_at + Duration::seconds(5)).trunc_subsecs(6);
    let patched = store
        .update_thread(
            "rt",
            &ThreadPatch {
                title: Some("Renamed".into()),
                metadata: None,
            },
            later,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(patched.title.as_deref(), Some("Renamed"));
    assert_eq!(patched.metadata, Some(json!({"source": "test"})));
    assert_eq!(patched.updated_at, later);

    assert!(store.get_thread("nope").await.unwrap().is_none());
    assert!(
        store
            .update_thread("nope", &ThreadPatch::default(), later)
            .await
            .unwrap()
            .is_none()
    );
}

async fn message_ordering_and_limit(store: &dyn ThreadRepository) {
    store.insert_thread(&thread("ord")).await.unwrap();
    let base = (Utc::now() + Duration::seconds(1)).trunc_subsecs(6);
    // two messages share a timestamp; insertion order breaks the tie
    store.insert_message(&message("ord", "b", Role::Assistant, base)).await.unwrap();
    store
        .insert_message(&message("ord", "a", Role::User, base - Duration::seconds(1)))
        .await
        .unwrap();
    store.insert_message(&message("ord", "c", Role::User, base)).await.unwrap();

    let all = store.list_messages("ord", None).await.unwrap();
    assert_eq!(ids(&all), ["a", "b", "c"]);
    let first_two = store.list_messages("ord", Some(2)).await.unwrap();
    assert_eq!(ids(&first_two), ["a", "b"]);

    let t = store.get_thread("ord").await.unwrap().unwrap();
    assert!(t.updated_at >= base);
}

async fn missing_thread(store: &dyn ThreadRepository) {
    let err = store
        .insert_message(&message("ghost", "m", Role::User, Utc::now()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ThreadNotFound(id) if id == "ghost"));
    assert!(store.list_messages("ghost", None).await.unwrap().is_empty());
}

async fn metadata_merge(store: &dyn ThreadRepository) {
    store.insert_thread(&thread("meta")).await.unwrap();
    let mut m = message("meta", "meta-1", Role::Assistant, Utc::now());
    m.metadata = Some(Map::from_iter([("usage".to_string(), json!({"totalTokens": 3}))]));
    store.insert_message(&m).await.unwrap();

    let patch = Map::from_iter([("finishReason".to_string(), json!("stop"))]);
    let updated = store
        .update_message_metadata("meta", "meta-1", &patch, Utc::now())
        .await
        .unwrap()
        .unwrap();
    let metadata = updated.metadata.unwrap();
    assert_eq!(metadata["finishReason"], "stop");
    assert_eq!(metadata["usage"]["totalTokens"], 3);

    assert!(
        store
            .update_message_metadata("meta", "missing", &patch, Utc::now())
            .await
            .unwrap()
            .is_none()
    );
}

async fn duplicate_message_id(store: &dyn ThreadRepository) {
    store.insert_thread(&thread("dup-a")).await.unwrap();
    store.insert_thread(&thread("dup-b")).await.unwrap();
    store
        .insert_message(&message("dup-a", "dup-1", Role::User, Utc::now()))
        .await
        .unwrap();

    // ids are unique across threads, not just within one
    for target in ["dup-a", "dup-b"] {
        let err = store
            .insert_message(&message(target, "dup-1", Role::Assistant, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateMessage(id) if id == "dup-1"));
    }
    assert_eq!(ids(&store.list_messages("dup-a", None).await.unwrap()), ["dup-1"]);
    assert!(store.list_messages("dup-b", None).await.unwrap().is_empty());
}

/// Thread `id` holding `<id>-1` .. `<id>-4`, one millisecond apart.
async fn four_messages(store: &dyn ThreadRepository, id: &str) -> chrono::DateTime<Utc> {
    store.insert_thread(&thread(id)).await.unwrap();
    let base = Utc::now();
    for i in 1..=4 {
        let at = base + Duration::milliseconds(i);
        store
            .insert_message(&message(id, &format!("{id}-{i}"), Role::User, at))
            .await
            .unwrap();
    }
    base + Duration::milliseconds(10)
}

fn summary_of(thread_id: &str, id: &str, at: chrono::DateTime<Utc>) -> Message {
    message(thread_id, id, Role::System, at)
}

async fn summary_archives_superseded(store: &dyn ThreadRepository) {
    let after = four_messages(store, "arc").await;
    let superseded = ["arc-1".to_string(), "arc-2".to_string(), "zzz".to_string()];

    let affected = store
        .replace_with_summary(&summary_of("arc", "arc-sum", after), &superseded, SummaryMode::Archive)
        .await
        .unwrap();
    assert_eq!(affected, 2);
    assert_eq!(
        ids(&store.list_messages("arc", None).await.unwrap()),
        ["arc-3", "arc-4", "arc-sum"]
    );
    assert_eq!(ids(&store.list_archived_messages("arc").await.unwrap()), ["arc-1", "arc-2"]);

    // already archived messages are not counted again
    let again = store
        .replace_with_summary(
            &summary_of("arc", "arc-sum-2", after + Duration::seconds(1)),
            &["arc-1".to_string()],
            SummaryMode::Archive,
        )
        .await
        .unwrap();
    assert_eq!(again, 0);
}

async fn summary_deletes_superseded(store: &dyn ThreadRepository) {
    let after = four_messages(store, "del").await;
    let superseded = ["del-1".to_string(), "del-2".to_string(), "del-3".to_string()];

    let affected = store
        .replace_with_summary(&summary_of("del", "del-sum", after), &superseded, SummaryMode::Delete)
        .await
        .unwrap();
    assert_eq!(affected, 3);
    assert_eq!(ids(&store.list_messages("del", None).await.unwrap()), ["del-4", "del-sum"]);
    assert!(store.list_archived_messages("del").await.unwrap().is_empty());
}

async fn failed_summary_changes_nothing(store: &dyn ThreadRepository) {
    let after = four_messages(store, "tx").await;
    let superseded = ["tx-1".to_string(), "tx-2".to_string()];

    // the summary id collides with a live message, so the insert fails
    for mode in [SummaryMode::Archive, SummaryMode::Delete] {
        let err = store
            .replace_with_summary(&summary_of("tx", "tx-4", after), &superseded, mode)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateMessage(_)));
        assert_eq!(
            ids(&store.list_messages("tx", None).await.unwrap()),
            ["tx-1", "tx-2", "tx-3", "tx-4"]
        );
        assert!(store.list_archived_messages("tx").await.unwrap().is_empty());
    }

    let err = store
        .replace_with_summary(&summary_of("ghost", "ghost-sum", after), &superseded, SummaryMode::Delete)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ThreadNotFound(id) if id == "ghost"));
    assert_eq!(store.list_messages("tx", None).await.unwrap().len(), 4);
}

async fn cascade_and_cleanup_listing(store: &dyn ThreadRepository) {
    let mut old = thread("old");
    old.updated_at = Utc::now() - Duration::days(40);
    old.created_at = old.updated_at;
    store.insert_thread(&old).await.unwrap();
    store.insert_thread(&thread("fresh")).await.unwrap();
    store
        .insert_message(&message("old", "o1", Role::User, old.created_at))
        .await
        .unwrap();

    let stale = store
        .list_threads_updated_before(Utc::now() - Duration::days(30))
        .await
        .unwrap();
    assert_eq!(stale, vec!["old".to_string()]);

    assert!(store.delete_thread("old").await.unwrap());
    assert!(!store.delete_thread("old").await.unwrap());
    assert!(store.list_messages("old", None).await.unwrap().is_empty());
    assert!(store.list_archived_messages("old").await.unwrap().is_empty());
}

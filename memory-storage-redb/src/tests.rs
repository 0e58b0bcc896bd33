use crate::RedbKvAdapter;
use memory_core::storage::{KvAdapter, ScrollFilter, StorageAdapter};

fn adapter() -> RedbKvAdapter {
    RedbKvAdapter::new_ephemeral().expect("ephemeral redb adapter")
}

#[tokio::test]
async fn store_then_retrieve_round_trips() {
    let db = adapter();
    db.connect().await.unwrap();
    db.store(&"session-1:turn-1".to_string(), b"hello", None)
        .await
        .unwrap();
    let got = db.retrieve(&"session-1:turn-1".to_string()).await.unwrap();
    assert_eq!(got.as_deref(), Some(b"hello".as_slice()));
}

#[tokio::test]
async fn retrieve_missing_key_is_none() {
    let db = adapter();
    let got = db.retrieve(&"nope".to_string()).await.unwrap();
    assert!(got.is_none());
}

#[tokio::test]
async fn delete_then_retrieve_is_none() {
    let db = adapter();
    db.store(&"k".to_string(), b"v", None).await.unwrap();
    assert!(db.delete(&"k".to_string()).await.unwrap());
    assert!(db.retrieve(&"k".to_string()).await.unwrap().is_none());
    assert!(!db.delete(&"k".to_string()).await.unwrap());
}

#[tokio::test]
async fn ttl_zero_expires_immediately() {
    let db = adapter();
    db.store(&"k".to_string(), b"v", Some(0)).await.unwrap();
    // A 0-second TTL should read as already expired on the next call.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert!(db.retrieve(&"k".to_string()).await.unwrap().is_none());
}

#[tokio::test]
async fn atomic_append_with_windowing_trims_to_maxlen() {
    let db = adapter();
    for i in 0..5 {
        db.atomic_append_with_windowing("stream", format!("entry-{i}").as_bytes(), 3)
            .await
            .unwrap();
    }
    let batch = db.atomic_promotion("stream", "inflight", 10).await.unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch[0], b"entry-2");
    assert_eq!(batch[2], b"entry-4");
}

#[tokio::test]
async fn cas_workspace_update_rejects_version_mismatch() {
    let db = adapter();
    db.cas_workspace_update(&"ws".to_string(), None, b"v1", "v1")
        .await
        .unwrap();
    let err = db
        .cas_workspace_update(&"ws".to_string(), Some("wrong"), b"v2", "v2")
        .await
        .unwrap_err();
    assert!(matches!(err, memory_core::Error::DataValidation(_)));

    db.cas_workspace_update(&"ws".to_string(), Some("v1"), b"v2", "v2")
        .await
        .unwrap();
    assert_eq!(
        db.retrieve(&"ws".to_string()).await.unwrap().as_deref(),
        Some(b"v2".as_slice())
    );
}

#[tokio::test]
async fn atomic_promotion_dequeues_in_order_without_double_processing() {
    let db = adapter();
    for i in 0..4 {
        db.atomic_append_with_windowing("queue", format!("t{i}").as_bytes(), 0)
            .await
            .unwrap();
    }
    let first = db.atomic_promotion("queue", "inflight", 2).await.unwrap();
    assert_eq!(first, vec![b"t0".to_vec(), b"t1".to_vec()]);
    let second = db.atomic_promotion("queue", "inflight", 2).await.unwrap();
    assert_eq!(second, vec![b"t2".to_vec(), b"t3".to_vec()]);
    let third = db.atomic_promotion("queue", "inflight", 2).await.unwrap();
    assert!(third.is_empty());
}

#[tokio::test]
async fn lease_acquire_blocks_other_owner_until_released() {
    let db = adapter();
    let token_a = db.acquire_lease("lock", "owner-a", 60).await.unwrap();
    assert!(token_a.is_some());
    let blocked = db.acquire_lease("lock", "owner-b", 60).await.unwrap();
    assert!(blocked.is_none());

    db.release_lease("lock", token_a.as_deref().unwrap())
        .await
        .unwrap();
    let token_b = db.acquire_lease("lock", "owner-b", 60).await.unwrap();
    assert!(token_b.is_some());
}

#[tokio::test]
async fn scroll_filters_by_prefix_and_equals() {
    let db = adapter();
    db.store(
        &"{s1}:turn:1".to_string(),
        br#"{"session_id":"s1","role":"user"}"#,
        None,
    )
    .await
    .unwrap();
    db.store(
        &"{s1}:turn:2".to_string(),
        br#"{"session_id":"s1","role":"assistant"}"#,
        None,
    )
    .await
    .unwrap();
    db.store(
        &"{s2}:turn:1".to_string(),
        br#"{"session_id":"s2","role":"user"}"#,
        None,
    )
    .await
    .unwrap();

    let mut filter = ScrollFilter::default();
    filter
        .equals
        .insert("role".to_string(), serde_json::json!("user"));
    let page = db.scroll("{s1}", &filter).await.unwrap();
    assert_eq!(page.items, vec!["{s1}:turn:1".to_string()]);
}

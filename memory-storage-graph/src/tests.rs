use crate::PetgraphAdapter;
use memory_core::storage::{GraphAdapter, ScrollFilter};

#[tokio::test]
async fn store_then_retrieve_round_trips() {
    let g = PetgraphAdapter::new();
    g.store(
        &"episode-1".to_string(),
        &["Episode".to_string()],
        br#"{"importance":0.8}"#,
    )
    .await
    .unwrap();
    let got = g.retrieve(&"episode-1".to_string()).await.unwrap();
    assert_eq!(got.as_deref(), Some(br#"{"importance":0.8}"#.as_slice()));
}

#[tokio::test]
async fn delete_removes_node_and_incident_edges() {
    let g = PetgraphAdapter::new();
    g.store(&"a".to_string(), &["Episode".to_string()], b"{}")
        .await
        .unwrap();
    g.store(&"b".to_string(), &["Entity".to_string()], b"{}")
        .await
        .unwrap();
    g.link(&"a".to_string(), &"b".to_string(), "MENTIONS", b"{}")
        .await
        .unwrap();
    assert!(g.delete(&"a".to_string()).await.unwrap());
    assert!(g.retrieve(&"a".to_string()).await.unwrap().is_none());
    let related = g.search(&"b".to_string(), None, 2).await.unwrap();
    assert!(related.is_empty());
}

#[tokio::test]
async fn link_to_missing_endpoint_is_not_found() {
    let g = PetgraphAdapter::new();
    g.store(&"a".to_string(), &["Episode".to_string()], b"{}")
        .await
        .unwrap();
    let err = g
        .link(&"a".to_string(), &"ghost".to_string(), "MENTIONS", b"{}")
        .await
        .unwrap_err();
    assert!(matches!(err, memory_core::Error::NotFound(_)));
}

#[tokio::test]
async fn search_traverses_by_relation_and_depth() {
    let g = PetgraphAdapter::new();
    for id in ["episode-1", "entity-a", "entity-b", "entity-c"] {
        g.store(&id.to_string(), &["Node".to_string()], b"{}")
            .await
            .unwrap();
    }
    g.link(&"episode-1".to_string(), &"entity-a".to_string(), "MENTIONS", b"{}")
        .await
        .unwrap();
    g.link(&"entity-a".to_string(), &"entity-b".to_string(), "RELATED_TO", b"{}")
        .await
        .unwrap();
    g.link(&"episode-1".to_string(), &"entity-c".to_string(), "REFERENCES", b"{}")
        .await
        .unwrap();

    let one_hop = g
        .search(&"episode-1".to_string(), Some("MENTIONS"), 1)
        .await
        .unwrap();
    assert_eq!(one_hop, vec!["entity-a".to_string()]);

    let two_hop = g.search(&"episode-1".to_string(), None, 2).await.unwrap();
    assert_eq!(two_hop.len(), 3);
}

#[tokio::test]
async fn scroll_filters_by_label_and_equals() {
    let g = PetgraphAdapter::new();
    g.store(
        &"episode-1".to_string(),
        &["Episode".to_string()],
        br#"{"session_id":"s1"}"#,
    )
    .await
    .unwrap();
    g.store(
        &"episode-2".to_string(),
        &["Episode".to_string()],
        br#"{"session_id":"s2"}"#,
    )
    .await
    .unwrap();
    g.store(&"entity-1".to_string(), &["Entity".to_string()], b"{}")
        .await
        .unwrap();

    let mut filter = ScrollFilter::default();
    filter
        .equals
        .insert("session_id".to_string(), serde_json::json!("s1"));
    let page = g.scroll("Episode", &filter).await.unwrap();
    assert_eq!(page.items, vec!["episode-1".to_string()]);
}

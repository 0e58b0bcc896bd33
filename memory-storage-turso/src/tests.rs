use crate::connection::TursoConnection;
use crate::fulltext::TursoFullTextAdapter;
use crate::relational::TursoRelationalAdapter;
use crate::vector::TursoVectorAdapter;
use memory_core::storage::{FullTextAdapter, RelationalAdapter, ScrollFilter, VectorAdapter};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Fact {
    id: String,
    subject: String,
    tags: Vec<String>,
    confidence: f64,
}

#[tokio::test]
async fn relational_store_then_retrieve_round_trips() {
    let conn = TursoConnection::open_in_memory().await.expect("open");
    let adapter = TursoRelationalAdapter::<Fact>::new(conn, "facts").await.expect("migrate");
    let fact = Fact {
        id: "f1".into(),
        subject: "SKU-1234".into(),
        tags: vec!["inventory".into()],
        confidence: 0.9,
    };
    adapter.store(&"f1".into(), &fact).await.expect("store");
    let got = adapter.retrieve(&"f1".into()).await.expect("retrieve");
    assert_eq!(got, Some(fact));
}

#[tokio::test]
async fn relational_search_matches_exact_token_without_stemming() {
    let conn = TursoConnection::open_in_memory().await.expect("open");
    let adapter = TursoRelationalAdapter::<Fact>::new(conn, "facts").await.expect("migrate");
    adapter
        .store(
            &"f1".into(),
            &Fact {
                id: "f1".into(),
                subject: "SKU-99001-A".into(),
                tags: vec![],
                confidence: 0.5,
            },
        )
        .await
        .expect("store");
    let filter = ScrollFilter::default();
    let hits = adapter.search("SKU-99001-A", &filter).await.expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].item.subject, "SKU-99001-A");
}

#[tokio::test]
async fn relational_scroll_filters_by_tag_equals() {
    let conn = TursoConnection::open_in_memory().await.expect("open");
    let adapter = TursoRelationalAdapter::<Fact>::new(conn, "facts").await.expect("migrate");
    for (id, subject, tags) in [
        ("f1", "alpha", vec!["billing".to_string()]),
        ("f2", "beta", vec!["support".to_string()]),
    ] {
        adapter
            .store(
                &id.into(),
                &Fact {
                    id: id.into(),
                    subject: subject.into(),
                    tags,
                    confidence: 0.7,
                },
            )
            .await
            .expect("store");
    }
    let mut filter = ScrollFilter::default();
    filter
        .equals
        .insert("tags".into(), serde_json::json!(["billing"]));
    let page = adapter.scroll(&filter).await.expect("scroll");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].subject, "alpha");
}

#[tokio::test]
async fn relational_delete_removes_row_and_fts_entry() {
    let conn = TursoConnection::open_in_memory().await.expect("open");
    let adapter = TursoRelationalAdapter::<Fact>::new(conn, "facts").await.expect("migrate");
    adapter
        .store(
            &"f1".into(),
            &Fact {
                id: "f1".into(),
                subject: "gamma".into(),
                tags: vec![],
                confidence: 0.3,
            },
        )
        .await
        .expect("store");
    assert!(adapter.delete(&"f1".into()).await.expect("delete"));
    assert_eq!(adapter.retrieve(&"f1".into()).await.expect("retrieve"), None);
    let filter = ScrollFilter::default();
    assert!(adapter.search("gamma", &filter).await.expect("search").is_empty());
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Episode {
    id: String,
    summary: String,
}

#[tokio::test]
async fn vector_search_ranks_by_cosine_similarity() {
    let conn = TursoConnection::open_in_memory().await.expect("open");
    let adapter = TursoVectorAdapter::<Episode>::new(conn, "episodes", 3).await.expect("migrate");
    adapter
        .store(
            &"e1".into(),
            &Episode {
                id: "e1".into(),
                summary: "close match".into(),
            },
            &[1.0, 0.0, 0.0],
        )
        .await
        .expect("store");
    adapter
        .store(
            &"e2".into(),
            &Episode {
                id: "e2".into(),
                summary: "orthogonal".into(),
            },
            &[0.0, 1.0, 0.0],
        )
        .await
        .expect("store");
    let filter = ScrollFilter::default();
    let hits = adapter
        .search(&[0.9, 0.1, 0.0], &filter, 1)
        .await
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].item.summary, "close match");
}

#[tokio::test]
async fn vector_store_rejects_wrong_dimension() {
    let conn = TursoConnection::open_in_memory().await.expect("open");
    let adapter = TursoVectorAdapter::<Episode>::new(conn, "episodes", 4).await.expect("migrate");
    let result = adapter
        .store(
            &"e1".into(),
            &Episode {
                id: "e1".into(),
                summary: "bad".into(),
            },
            &[1.0, 0.0],
        )
        .await;
    assert!(result.is_err());
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct KnowledgeDoc {
    id: String,
    title: String,
    knowledge_type: String,
}

#[tokio::test]
async fn fulltext_search_indexes_explicit_body_not_whole_json() {
    let conn = TursoConnection::open_in_memory().await.expect("open");
    let adapter = TursoFullTextAdapter::<KnowledgeDoc>::new(conn, "knowledge").await.expect("migrate");
    adapter
        .store(
            &"k1".into(),
            &KnowledgeDoc {
                id: "k1".into(),
                title: "Refund policy".into(),
                knowledge_type: "procedure".into(),
            },
            "Refund policy: customers may request a refund within thirty days",
        )
        .await
        .expect("store");
    let filter = ScrollFilter::default();
    let hits = adapter.search("refund", &filter).await.expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].item.title, "Refund policy");
}

#[tokio::test]
async fn fulltext_scroll_filters_by_knowledge_type() {
    let conn = TursoConnection::open_in_memory().await.expect("open");
    let adapter = TursoFullTextAdapter::<KnowledgeDoc>::new(conn, "knowledge").await.expect("migrate");
    adapter
        .store(
            &"k1".into(),
            &KnowledgeDoc {
                id: "k1".into(),
                title: "Procedure doc".into(),
                knowledge_type: "procedure".into(),
            },
            "how to process a return",
        )
        .await
        .expect("store");
    adapter
        .store(
            &"k2".into(),
            &KnowledgeDoc {
                id: "k2".into(),
                title: "Fact doc".into(),
                knowledge_type: "fact".into(),
            },
            "our warehouse is in Ohio",
        )
        .await
        .expect("store");
    let mut filter = ScrollFilter::default();
    filter
        .equals
        .insert("knowledge_type".into(), serde_json::json!("fact"));
    let page = adapter.scroll(&filter).await.expect("scroll");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].title, "Fact doc");
}

#[tokio::test]
async fn fulltext_delete_removes_document_from_search_results() {
    let conn = TursoConnection::open_in_memory().await.expect("open");
    let adapter = TursoFullTextAdapter::<KnowledgeDoc>::new(conn, "knowledge").await.expect("migrate");
    adapter
        .store(
            &"k1".into(),
            &KnowledgeDoc {
                id: "k1".into(),
                title: "Doomed doc".into(),
                knowledge_type: "fact".into(),
            },
            "this document will be deleted",
        )
        .await
        .expect("store");
    assert!(adapter.delete(&"k1".into()).await.expect("delete"));
    let filter = ScrollFilter::default();
    assert!(adapter
        .search("deleted", &filter)
        .await
        .expect("search")
        .is_empty());
}

//! L4 `SemanticMemory`: durable synthesized knowledge (spec §3, §4.1, §4.8).

use crate::storage::{FullTextAdapter, ScrollFilter};
use crate::telemetry::{NoopTelemetrySink, TelemetrySink};
use crate::types::config::L4Config;
use crate::types::enums::{Category, KnowledgeType, LifecycleEventType};
use crate::types::KnowledgeDocument;
use crate::{Error, Result};
use std::sync::Arc;
use uuid::Uuid;

/// Filter set for [`SemanticMemory::search`] (spec §4.2 L4 `search`):
/// `knowledge_type`/`category` exact-match, `tags` AND-combined,
/// `min_confidence` a floor. All fields `None`/empty match everything.
#[derive(Debug, Clone, Default)]
pub struct L4Filters {
    pub domain: Option<String>,
    pub knowledge_type: Option<KnowledgeType>,
    pub category: Option<Category>,
    pub tags: Vec<String>,
    pub min_confidence: Option<f32>,
}

/// Wraps a [`FullTextAdapter<KnowledgeDocument>`] with access-count
/// bookkeeping and domain-scoped retrieval.
pub struct SemanticMemory<A: FullTextAdapter<KnowledgeDocument>> {
    adapter: Arc<A>,
    config: L4Config,
    events: Arc<dyn TelemetrySink>,
}

impl<A: FullTextAdapter<KnowledgeDocument>> SemanticMemory<A> {
    #[must_use]
    pub fn new(adapter: Arc<A>, config: L4Config) -> Self {
        Self { adapter, config, events: Arc::new(NoopTelemetrySink) }
    }

    /// Wire in the lifecycle event stream so every public method emits a
    /// `tier_access` event (spec §4.2c).
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn TelemetrySink>) -> Self {
        self.events = events;
        self
    }

    /// The configured default confidence floor (spec §6
    /// `L4: {default_min_confidence}`), applied by callers that don't
    /// supply an explicit [`L4Filters::min_confidence`].
    #[must_use]
    pub fn default_min_confidence(&self) -> f32 {
        self.config.default_min_confidence
    }

    /// Index a synthesized document (spec §4.2 L4 `store`).
    ///
    /// # Errors
    /// Returns [`Error::DataValidation`] if `source_episode_ids` is
    /// empty — a document must carry provenance. Confidence is not
    /// gated here: the Distillation Engine's rule-based fallback
    /// deliberately stores documents at `confidence_score <= 0.4`
    /// (spec §4.4.3) and `default_min_confidence` instead floors
    /// `search` results.
    pub async fn store_document(&self, document: &KnowledgeDocument) -> Result<()> {
        if document.source_episode_ids.is_empty() {
            return Err(Error::DataValidation(
                "KnowledgeDocument requires at least one source_episode_id".to_string(),
            ));
        }
        let body = format!("{}\n{}", document.title, document.body);
        self.adapter.store(&document.id.to_string(), document, &body).await?;
        self.events
            .emit_event(
                LifecycleEventType::TierAccess,
                None,
                serde_json::json!({"tier": "l4_semantic_memory", "op": "store_document", "knowledge_id": document.id}),
            )
            .await;
        Ok(())
    }

    /// Retrieve a document by id, monotonically incrementing its access
    /// count (spec §3 invariant: never decreases).
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if absent.
    pub async fn retrieve(&self, id: Uuid) -> Result<KnowledgeDocument> {
        let key = id.to_string();
        let mut document = self
            .adapter
            .retrieve(&key)
            .await?
            .ok_or_else(|| Error::not_found(format!("knowledge document {id}")))?;
        document.access_count += 1;
        let adapter = Arc::clone(&self.adapter);
        let body = format!("{}\n{}", document.title, document.body);
        let updated = document.clone();
        tokio::spawn(async move {
            if let Err(err) = adapter.store(&key, &updated, &body).await {
                tracing::warn!(%err, document_id = %updated.id, "failed to persist access-tracking update");
            }
        });
        self.events
            .emit_event(
                LifecycleEventType::TierAccess,
                None,
                serde_json::json!({"tier": "l4_semantic_memory", "op": "retrieve", "knowledge_id": id}),
            )
            .await;
        Ok(document)
    }

    /// Full-text query narrowed by `filters` (spec §4.2 L4 `search`):
    /// `domain`/`knowledge_type`/`category` exact-match, `tags`
    /// AND-combined, `min_confidence` a floor. Updates `access_count` on
    /// every returned document, matching `retrieve`'s bookkeeping.
    ///
    /// # Errors
    /// Propagates the underlying adapter's error.
    pub async fn search(
        &self,
        query: &str,
        filters: &L4Filters,
        limit: usize,
    ) -> Result<Vec<(KnowledgeDocument, f32)>> {
        let mut adapter_filter = ScrollFilter { limit: limit.max(1) * 4, ..ScrollFilter::default() };
        if let Some(domain) = &filters.domain {
            adapter_filter.equals.insert("domain".to_string(), serde_json::json!(domain));
        }
        let matches = self.adapter.search(query, &adapter_filter).await?;
        let mut results: Vec<(KnowledgeDocument, f32)> = matches
            .into_iter()
            .map(|m| (m.item, m.score))
            .filter(|(doc, _)| {
                filters.knowledge_type.is_none_or(|kt| doc.knowledge_type == kt)
                    && filters.category.is_none_or(|c| doc.category == c)
                    && filters.tags.iter().all(|tag| doc.tags.contains(tag))
                    && filters.min_confidence.is_none_or(|min| doc.confidence_score >= min)
            })
            .collect();
        results.truncate(limit);

        for (document, _) in &results {
            let adapter = Arc::clone(&self.adapter);
            let mut bumped = document.clone();
            bumped.access_count += 1;
            let body = format!("{}\n{}", bumped.title, bumped.body);
            let key = bumped.id.to_string();
            tokio::spawn(async move {
                if let Err(err) = adapter.store(&key, &bumped, &body).await {
                    tracing::warn!(%err, document_id = %bumped.id, "failed to persist access-tracking update");
                }
            });
        }
        self.events
            .emit_event(
                LifecycleEventType::TierAccess,
                None,
                serde_json::json!({"tier": "l4_semantic_memory", "op": "search", "count": results.len()}),
            )
            .await;
        Ok(results)
    }

    /// Apply caller feedback to a stored document's usefulness score
    /// (spec §4.2 L4 `update_usefulness`).
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if absent.
    pub async fn update_usefulness(&self, id: Uuid, delta: f32) -> Result<()> {
        let key = id.to_string();
        let mut document = self
            .adapter
            .retrieve(&key)
            .await?
            .ok_or_else(|| Error::not_found(format!("knowledge document {id}")))?;
        document.update_usefulness(delta);
        let body = format!("{}\n{}", document.title, document.body);
        self.adapter.store(&key, &document, &body).await?;
        self.events
            .emit_event(
                LifecycleEventType::TierAccess,
                None,
                serde_json::json!({"tier": "l4_semantic_memory", "op": "update_usefulness", "knowledge_id": id}),
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryFullTextAdapter;
    use crate::types::{Category, KnowledgeType, SynthesisMethod};

    #[tokio::test]
    async fn store_rejects_documents_without_provenance() {
        let adapter = Arc::new(MemoryFullTextAdapter::<KnowledgeDocument>::new());
        let tier = SemanticMemory::new(adapter, L4Config::default());

        let document = KnowledgeDocument::new(
            "title",
            "body",
            KnowledgeType::Rule,
            Category::Operational,
            SynthesisMethod::RuleBasedFallback,
        )
        .unwrap();
        assert!(document.source_episode_ids.is_empty());
        assert!(tier.store_document(&document).await.is_err());
    }

    #[tokio::test]
    async fn store_accepts_low_confidence_fallback_documents_with_provenance() {
        let adapter = Arc::new(MemoryFullTextAdapter::<KnowledgeDocument>::new());
        let tier = SemanticMemory::new(adapter, L4Config::default());

        let mut document = KnowledgeDocument::new(
            "title",
            "body",
            KnowledgeType::Rule,
            Category::Operational,
            SynthesisMethod::RuleBasedFallback,
        )
        .unwrap();
        assert!((document.confidence_score - 0.4).abs() < 1e-6);
        document.source_episode_ids.push(uuid::Uuid::new_v4());
        tier.store_document(&document).await.unwrap();
    }

    #[tokio::test]
    async fn retrieve_increments_access_count() {
        let adapter = Arc::new(MemoryFullTextAdapter::<KnowledgeDocument>::new());
        let tier = SemanticMemory::new(adapter, L4Config::default());

        let mut document = KnowledgeDocument::new(
            "title",
            "deploy policy body",
            KnowledgeType::Rule,
            Category::Operational,
            SynthesisMethod::LlmSynthesized,
        )
        .unwrap();
        document.source_episode_ids.push(uuid::Uuid::new_v4());
        tier.store_document(&document).await.unwrap();

        let fetched = tier.retrieve(document.id).await.unwrap();
        assert_eq!(fetched.access_count, 1);
    }

    #[tokio::test]
    async fn search_filters_by_min_confidence_and_tags() {
        let adapter = Arc::new(MemoryFullTextAdapter::<KnowledgeDocument>::new());
        let tier = SemanticMemory::new(adapter, L4Config::default());

        let mut high = KnowledgeDocument::new(
            "deploy policy",
            "deploys happen Tuesdays",
            KnowledgeType::Rule,
            Category::Operational,
            SynthesisMethod::LlmSynthesized,
        )
        .unwrap();
        high.source_episode_ids.push(uuid::Uuid::new_v4());
        high.tags.insert("deploys".to_string());
        tier.store_document(&high).await.unwrap();

        let mut low = KnowledgeDocument::new(
            "deploy policy fallback",
            "deploys happen Tuesdays",
            KnowledgeType::Rule,
            Category::Operational,
            SynthesisMethod::RuleBasedFallback,
        )
        .unwrap();
        low.source_episode_ids.push(uuid::Uuid::new_v4());
        tier.store_document(&low).await.unwrap();

        let filters = L4Filters { min_confidence: Some(0.5), tags: vec!["deploys".to_string()], ..Default::default() };
        let results = tier.search("deploy", &filters, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, high.id);
    }
}

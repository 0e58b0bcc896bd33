//! L3 `EpisodicMemory`: dual-indexed episodes (vector + graph) (spec §3, §4.1).

use crate::storage::{GraphAdapter, ScrollFilter, VectorAdapter};
use crate::telemetry::{NoopTelemetrySink, TelemetrySink};
use crate::types::config::L3Config;
use crate::types::enums::LifecycleEventType;
use crate::types::Episode;
use crate::{Error, Result};
use std::sync::Arc;
use uuid::Uuid;

/// Wraps a [`VectorAdapter<Episode>`] and a [`GraphAdapter`] with the
/// dual-index consistency invariant (spec §3): every episode write lands
/// in both indexes, cross-referenced by `Episode.vector_id`, before the
/// call returns.
pub struct EpisodicMemory<V: VectorAdapter<Episode>, G: GraphAdapter> {
    vector: Arc<V>,
    graph: Arc<G>,
    config: L3Config,
    events: Arc<dyn TelemetrySink>,
}

impl<V: VectorAdapter<Episode>, G: GraphAdapter> EpisodicMemory<V, G> {
    #[must_use]
    pub fn new(vector: Arc<V>, graph: Arc<G>, config: L3Config) -> Self {
        Self { vector, graph, config, events: Arc::new(NoopTelemetrySink) }
    }

    /// Wire in the lifecycle event stream so every public method emits a
    /// `tier_access` event (spec §4.2c).
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn TelemetrySink>) -> Self {
        self.events = events;
        self
    }

    /// Store an episode in both indexes. `embedding` must match the
    /// vector adapter's configured dimension.
    ///
    /// # Errors
    /// Returns [`Error::DataValidation`] if `embedding.len()` doesn't
    /// match `config.embedding_dimension`, otherwise propagates the
    /// adapters' errors. If the graph write fails after the vector
    /// write succeeds, the vector record is rolled back so the two
    /// indexes never diverge.
    pub async fn store_episode(&self, episode: &mut Episode, embedding: Vec<f32>) -> Result<()> {
        if embedding.len() != self.config.embedding_dimension {
            return Err(Error::DataValidation(format!(
                "embedding dimension {} does not match configured {}",
                embedding.len(),
                self.config.embedding_dimension
            )));
        }
        let id = episode.id.to_string();
        episode.embedding = Some(embedding.clone());
        episode.vector_id = Some(id.clone());

        self.vector.store(&id, episode, &embedding).await?;

        let properties = serde_json::to_vec(episode)?;
        if let Err(err) = self.graph.store(&id, &["episode".to_string()], &properties).await {
            let _ = self.vector.delete(&id).await;
            return Err(err);
        }

        for entity in &episode.entities {
            let entity_props = serde_json::to_vec(entity)?;
            if let Err(err) = self
                .graph
                .store(&entity.entity_id, &["entity".to_string(), entity.entity_type.clone()], &entity_props)
                .await
            {
                let _ = self.vector.delete(&id).await;
                let _ = self.graph.delete(&id).await;
                return Err(err);
            }
            let mentions_payload = serde_json::to_vec(&serde_json::json!({"confidence": entity.confidence}))?;
            if let Err(err) = self.graph.link(&id, &entity.entity_id, "mentions", &mentions_payload).await {
                let _ = self.vector.delete(&id).await;
                let _ = self.graph.delete(&id).await;
                return Err(err);
            }
        }

        for related in &episode.related_episode_ids {
            self.graph.link(&id, &related.to_string(), "related_to", b"{}").await?;
        }
        self.events
            .emit_event(
                LifecycleEventType::TierAccess,
                Some(&episode.session_id),
                serde_json::json!({"tier": "l3_episodic_memory", "op": "store_episode", "episode_id": episode.id}),
            )
            .await;
        Ok(())
    }

    /// Retrieve an episode by id from the vector index (the
    /// authoritative record; the graph index holds the same payload for
    /// traversal only).
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if absent from either index.
    pub async fn retrieve(&self, id: Uuid) -> Result<Episode> {
        let episode = self
            .vector
            .retrieve(&id.to_string())
            .await?
            .ok_or_else(|| Error::not_found(format!("episode {id}")))?;
        self.events
            .emit_event(
                LifecycleEventType::TierAccess,
                Some(&episode.session_id),
                serde_json::json!({"tier": "l3_episodic_memory", "op": "retrieve", "episode_id": id}),
            )
            .await;
        Ok(episode)
    }

    /// Nearest-neighbor search over episode embeddings.
    ///
    /// # Errors
    /// Propagates the underlying adapter's error.
    pub async fn search_similar(&self, query: &[f32], top_k: usize) -> Result<Vec<(Episode, f32)>> {
        let matches = self.vector.search(query, &ScrollFilter::default(), top_k).await?;
        let results: Vec<(Episode, f32)> = matches.into_iter().map(|m| (m.item, m.score)).collect();
        self.events
            .emit_event(
                LifecycleEventType::TierAccess,
                None,
                serde_json::json!({"tier": "l3_episodic_memory", "op": "search_similar", "count": results.len()}),
            )
            .await;
        Ok(results)
    }

    /// Traverse related episodes via the graph index.
    ///
    /// # Errors
    /// Propagates the underlying adapter's error.
    pub async fn related_episode_ids(&self, id: Uuid, depth: usize) -> Result<Vec<Uuid>> {
        let raw = self.graph.search(&id.to_string(), Some("related_to"), depth).await?;
        let related: Vec<Uuid> = raw.into_iter().filter_map(|s| s.parse().ok()).collect();
        self.events
            .emit_event(
                LifecycleEventType::TierAccess,
                None,
                serde_json::json!({"tier": "l3_episodic_memory", "op": "related_episode_ids", "episode_id": id, "count": related.len()}),
            )
            .await;
        Ok(related)
    }

    /// Query episodes valid at a point in time, per the bi-temporal model
    /// (spec §4.2 `query_temporal`).
    ///
    /// # Errors
    /// Propagates the underlying adapter's error.
    pub async fn query_temporal(
        &self,
        session_id: &str,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Episode>> {
        let mut filter = ScrollFilter::default();
        filter.equals.insert("session_id".to_string(), serde_json::json!(session_id));
        filter.limit = 1000;
        let page = self.vector.scroll(&filter).await?;
        let valid: Vec<Episode> = page.items.into_iter().filter(|e| e.valid_at(at)).collect();
        self.events
            .emit_event(
                LifecycleEventType::TierAccess,
                Some(session_id),
                serde_json::json!({"tier": "l3_episodic_memory", "op": "query_temporal", "count": valid.len()}),
            )
            .await;
        Ok(valid)
    }

    /// Wake-up sweep (spec §4.4.4): scan the vector index for episodes
    /// with no matching graph node and delete the orphan, restoring the
    /// dual-index consistency invariant `store_episode` normally upholds.
    /// An orphan can only arise from a crash between the vector write and
    /// the graph write, since `store_episode` rolls the vector write back
    /// on graph failure — this never happens on a clean shutdown.
    ///
    /// # Errors
    /// Propagates the underlying adapters' errors.
    pub async fn recover(&self) -> Result<usize> {
        let mut filter = ScrollFilter::default();
        filter.limit = 100_000;
        let page = self.vector.scroll(&filter).await?;

        let mut orphans_removed = 0;
        for episode in page.items {
            let Some(vector_id) = episode.vector_id.clone() else { continue };
            if self.graph.retrieve(&vector_id).await?.is_none() {
                self.vector.delete(&vector_id).await?;
                orphans_removed += 1;
            }
        }
        Ok(orphans_removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{MemoryGraphAdapter, MemoryVectorAdapter};
    use crate::types::ConsolidationStrategy;

    fn embedding() -> Vec<f32> {
        vec![0.1; 768]
    }

    #[tokio::test]
    async fn store_writes_both_indexes_with_matching_vector_id() {
        let vector = Arc::new(MemoryVectorAdapter::<Episode>::new(768));
        let graph = Arc::new(MemoryGraphAdapter::new());
        let tier = EpisodicMemory::new(vector, graph, L3Config::default());

        let mut episode =
            Episode::new("session-1", "summary", ConsolidationStrategy::TimeWindow).unwrap();
        tier.store_episode(&mut episode, embedding()).await.unwrap();

        assert_eq!(episode.vector_id, Some(episode.id.to_string()));
        let fetched = tier.retrieve(episode.id).await.unwrap();
        assert_eq!(fetched.id, episode.id);
    }

    #[tokio::test]
    async fn recover_removes_vector_entries_with_no_graph_counterpart() {
        let vector = Arc::new(MemoryVectorAdapter::<Episode>::new(768));
        let graph = Arc::new(MemoryGraphAdapter::new());
        let tier = EpisodicMemory::new(Arc::clone(&vector), graph, L3Config::default());

        let mut episode =
            Episode::new("session-1", "summary", ConsolidationStrategy::TimeWindow).unwrap();
        tier.store_episode(&mut episode, embedding()).await.unwrap();

        // Simulate a crash between the vector write and the graph write
        // for a second episode by writing directly to the vector index.
        let mut orphan = Episode::new("session-1", "orphaned summary", ConsolidationStrategy::TimeWindow).unwrap();
        let orphan_id = orphan.id.to_string();
        orphan.vector_id = Some(orphan_id.clone());
        vector.store(&orphan_id, &orphan, &embedding()).await.unwrap();

        let removed = tier.recover().await.unwrap();
        assert_eq!(removed, 1);
        assert!(tier.retrieve(episode.id).await.is_ok());
        assert!(tier.retrieve(orphan.id).await.is_err());
    }

    #[tokio::test]
    async fn store_rejects_mismatched_embedding_dimension() {
        let vector = Arc::new(MemoryVectorAdapter::<Episode>::new(768));
        let graph = Arc::new(MemoryGraphAdapter::new());
        let tier = EpisodicMemory::new(vector, graph, L3Config::default());

        let mut episode =
            Episode::new("session-1", "summary", ConsolidationStrategy::TimeWindow).unwrap();
        let result = tier.store_episode(&mut episode, vec![0.1; 10]).await;
        assert!(result.is_err());
    }
}

//! Unified Memory Surface (spec §4.6): the single facade callers use.
//!
//! Everything elsewhere in this crate — tiers, engines, the CIAR
//! scorer, the cross-tier search normalizer, the lifecycle event
//! stream — is plumbing a [`MemorySurface`] wires together into one
//! coherent API: ingest a turn, query across tiers, assemble a prompt
//! context block, or manually drive a lifecycle cycle. Callers that
//! only need one tier can still reach into [`crate::tiers`] directly;
//! `MemorySurface` is the batteries-included entry point.

use crate::domain::DomainRegistry;
use crate::engines::{ConsolidationEngine, DistillationEngine, LifecycleEngine, PromotionEngine};
use crate::llm::LlmClient;
use crate::namespace::validate_session_id;
use crate::search::{merge_tiers, TierHit};
use crate::storage::memory::{
    MemoryFullTextAdapter, MemoryGraphAdapter, MemoryKvAdapter, MemoryRelationalAdapter, MemoryVectorAdapter,
};
use crate::storage::{FullTextAdapter, GraphAdapter, KvAdapter, RelationalAdapter, VectorAdapter};
use crate::telemetry::{LifecycleEvent, LifecycleEventStream};
use crate::tiers::{ActiveContext, EpisodicMemory, L4Filters, SemanticMemory, WorkingMemory};
use crate::types::config::SystemConfig;
use crate::types::enums::{LifecycleEventType, Trigger};
use crate::types::{ContextBlock, Episode, Fact, KnowledgeDocument, SearchWeights, Turn};
use crate::{engines::CycleReport, Error, Result};
use chrono::Utc;
use std::sync::Arc;

/// One hit from [`MemorySurface::query_memory`], tagging which tier it
/// came from since the item payloads differ per tier.
#[derive(Debug, Clone)]
pub enum MemoryItem {
    Fact(Fact),
    Episode(Episode),
    Document(KnowledgeDocument),
}

/// In-memory convenience alias used by the crate's doc examples and the
/// seed-scenario integration tests: every adapter backed by
/// [`crate::storage::memory`], nothing persisted across process restarts.
pub type InMemorySurface = MemorySurface<
    MemoryKvAdapter,
    MemoryRelationalAdapter<Fact>,
    MemoryVectorAdapter<Episode>,
    MemoryGraphAdapter,
    MemoryFullTextAdapter<KnowledgeDocument>,
>;

/// The unified entry point tying every tier, lifecycle engine, and
/// cross-cutting concern (search, telemetry, domain config) together.
pub struct MemorySurface<K, R, V, G, A>
where
    K: KvAdapter,
    R: RelationalAdapter<Fact>,
    V: VectorAdapter<Episode>,
    G: GraphAdapter,
    A: FullTextAdapter<KnowledgeDocument>,
{
    l1: Arc<ActiveContext<K>>,
    l2: Arc<WorkingMemory<R>>,
    l3: Arc<EpisodicMemory<V, G>>,
    l4: Arc<SemanticMemory<A>>,
    promotion: PromotionEngine<K, R>,
    consolidation: ConsolidationEngine<R, V, G>,
    distillation: DistillationEngine<V, G, A>,
    llm: Arc<dyn LlmClient>,
    events: Arc<LifecycleEventStream<K>>,
    domains: DomainRegistry,
    config: SystemConfig,
}

impl<K, R, V, G, A> MemorySurface<K, R, V, G, A>
where
    K: KvAdapter,
    R: RelationalAdapter<Fact>,
    V: VectorAdapter<Episode>,
    G: GraphAdapter,
    A: FullTextAdapter<KnowledgeDocument>,
{
    /// Assemble a surface from already-constructed tiers and a shared
    /// KV adapter for the lifecycle stream. Every tier and engine is
    /// wired to the same stream here, so every public tier method and
    /// every lifecycle cycle shows up on it (spec §4.2c, §4.7). Prefer
    /// [`MemorySurface::new_in_memory`] for tests and examples.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kv: Arc<K>,
        l1: ActiveContext<K>,
        l2: WorkingMemory<R>,
        l3: EpisodicMemory<V, G>,
        l4: SemanticMemory<A>,
        llm: Arc<dyn LlmClient>,
        config: SystemConfig,
        domains: DomainRegistry,
    ) -> Self {
        let events = Arc::new(LifecycleEventStream::new(kv, config.telemetry_stream.clone()));
        let sink = Arc::clone(&events) as Arc<dyn crate::telemetry::TelemetrySink>;
        let l1 = Arc::new(l1.with_events(Arc::clone(&sink)));
        let l2 = Arc::new(l2.with_events(Arc::clone(&sink)));
        let l3 = Arc::new(l3.with_events(Arc::clone(&sink)));
        let l4 = Arc::new(l4.with_events(Arc::clone(&sink)));

        let promotion = PromotionEngine::new(Arc::clone(&l1), Arc::clone(&l2), Arc::clone(&llm), config.promotion.clone())
            .with_events(Arc::clone(&sink));
        let consolidation = ConsolidationEngine::new(
            Arc::clone(&l2),
            Arc::clone(&l3),
            Arc::clone(&llm),
            config.consolidation.clone(),
            crate::types::enums::ConsolidationStrategy::TimeWindow,
        )
        .with_events(Arc::clone(&sink));
        let distillation =
            DistillationEngine::new(Arc::clone(&l3), Arc::clone(&l4), Arc::clone(&llm), config.distillation.clone(), &config.l4)
                .with_events(sink);
        Self { l1, l2, l3, l4, promotion, consolidation, distillation, llm, events, domains, config }
    }

    /// Record a turn into L1. The L1 tier itself emits the `tier_access`
    /// telemetry event (spec §4.2c); the ingest itself still fails
    /// loudly if the L1 write fails, since a dropped turn is a real
    /// data-loss bug where a missed telemetry event is not.
    ///
    /// # Errors
    /// Propagates L1's storage error.
    pub async fn ingest(&self, turn: &Turn) -> Result<()> {
        validate_session_id(&turn.session_id)?;
        self.l1.append_turn(turn).await?;
        Ok(())
    }

    /// Assemble a prompt-ready context block: the most recent turns
    /// plus every L2 fact at or above `min_ciar`, truncated to
    /// `max_turns`/`max_facts`.
    ///
    /// # Errors
    /// Propagates the underlying tiers' storage errors.
    pub async fn get_context_block(
        &self,
        session_id: &str,
        min_ciar: f32,
        max_turns: usize,
        max_facts: usize,
    ) -> Result<ContextBlock> {
        let recent_turns = self.l1.recent_turns(session_id, max_turns).await?;
        let mut facts = self.l2.promotable_facts(session_id, max_facts * 4).await.unwrap_or_default();
        facts.retain(|f| f.ciar_score >= min_ciar);
        facts.truncate(max_facts);

        let estimated_tokens = recent_turns.iter().map(|t| crate::types::estimate_tokens(&t.content)).sum::<usize>()
            + facts.iter().map(|f| crate::types::estimate_tokens(&f.statement)).sum::<usize>();

        Ok(ContextBlock {
            turn_count: recent_turns.len(),
            fact_count: facts.len(),
            recent_turns,
            facts,
            estimated_tokens,
            assembled_at: Utc::now(),
        })
    }

    /// Cross-tier hybrid query over L2/L3/L4, normalized and merged per
    /// [`crate::search`]. `weights` defaults to
    /// `config.search_weights` when `None`.
    ///
    /// # Errors
    /// Propagates the underlying tiers' storage or LLM errors. A
    /// failure to embed `query` for the L3 leg degrades that leg to no
    /// results rather than failing the whole query.
    pub async fn query_memory(
        &self,
        session_id: &str,
        query: &str,
        limit: usize,
        weights: Option<SearchWeights>,
    ) -> Result<Vec<MemoryItem>> {
        let weights = weights.unwrap_or_else(|| SearchWeights {
            working_memory: self.config.search_weights.working_memory,
            episodic_memory: self.config.search_weights.episodic_memory,
            semantic_memory: self.config.search_weights.semantic_memory,
        });

        let mut l2_filter = crate::storage::ScrollFilter::default();
        l2_filter.equals.insert("session_id".to_string(), serde_json::json!(session_id));
        l2_filter.limit = limit.max(1) * 4;
        let l2_hits: Vec<TierHit<MemoryItem>> = self
            .l2
            .search(query, &l2_filter)
            .await?
            .into_iter()
            .map(|(fact, score)| TierHit { tier: crate::types::Tier::WorkingMemory, item: MemoryItem::Fact(fact), raw_score: score })
            .collect();

        let l3_hits: Vec<TierHit<MemoryItem>> = match self.llm.embed(query).await {
            Ok(embedding) => self
                .l3
                .search_similar(&embedding, limit.max(1) * 4)
                .await
                .unwrap_or_default()
                .into_iter()
                .map(|(episode, score)| TierHit { tier: crate::types::Tier::EpisodicMemory, item: MemoryItem::Episode(episode), raw_score: score })
                .collect(),
            Err(err) => {
                tracing::warn!(%err, "query embedding failed, L3 leg of hybrid query skipped");
                Vec::new()
            }
        };

        let l4_filters = L4Filters { min_confidence: Some(self.l4.default_min_confidence()), ..L4Filters::default() };
        let l4_hits: Vec<TierHit<MemoryItem>> = self
            .l4
            .search(query, &l4_filters, limit.max(1) * 4)
            .await?
            .into_iter()
            .map(|(document, score)| TierHit { tier: crate::types::Tier::SemanticMemory, item: MemoryItem::Document(document), raw_score: score })
            .collect();

        let merged = merge_tiers(vec![l2_hits, l3_hits, l4_hits], &weights, limit);
        Ok(merged.into_iter().map(|hit| hit.item).collect())
    }

    /// Store content directly, auto-picking a tier: short content
    /// (under 200 characters, roughly one conversational turn) goes to
    /// L1 as a synthetic system turn; anything longer is treated as an
    /// already-extracted fact and stored directly to L2, skipping
    /// Promotion (spec §4.6 `store_memory`).
    ///
    /// Unlike a fact the `FactExtractor` infers from noisy conversation,
    /// content passed here was handed to us verbatim by the caller for
    /// exactly this purpose, so it is seeded at full certainty with
    /// above-default impact — comfortably above `L2Config::promotion_threshold`'s
    /// default of 0.6, so the auto path stays usable without the caller
    /// having to separately override the gate.
    ///
    /// # Errors
    /// Propagates the destination tier's storage error, including
    /// [`Error::DataValidation`] if a non-default, stricter
    /// `promotion_threshold` rejects it.
    pub async fn store_memory(&self, session_id: &str, content: &str, metadata: serde_json::Value) -> Result<()> {
        const AUTO_TIER_CHAR_THRESHOLD: usize = 200;
        if content.len() < AUTO_TIER_CHAR_THRESHOLD {
            let mut turn = Turn::new(session_id, "system", content)?;
            turn.metadata = metadata;
            self.ingest(&turn).await
        } else {
            let fact = Fact::new(
                session_id,
                content,
                crate::types::FactType::Mention,
                crate::types::Category::Technical,
                1.0,
                0.7,
            )?;
            self.l2.store_fact(&fact).await?;
            self.events
                .emit_event(
                    LifecycleEventType::FactPromoted,
                    Some(session_id),
                    serde_json::json!({"fact_id": fact.id, "source": "store_memory"}),
                )
                .await;
            Ok(())
        }
    }

    /// Manually drive one Promotion cycle (L1 -> L2). Promotion has no
    /// cycle-level started/completed pair of its own — the engine emits
    /// `significance_scored`/`fact_promoted` per item as it goes.
    ///
    /// # Errors
    /// Propagates the engine's error.
    pub async fn run_promotion_cycle(&self, session_id: &str, trigger: Trigger) -> Result<CycleReport> {
        self.run_cycle_with_telemetry(&self.promotion, session_id, trigger, None, None).await
    }

    /// Manually drive one Consolidation cycle (L2 -> L3). Emits
    /// `consolidation_started` before the engine runs and
    /// `consolidation_completed` after, bracketing the engine's own
    /// per-cluster `facts_clustered`/`episode_created` events (spec's
    /// `*_started -> unit -> *_completed` ordering).
    ///
    /// # Errors
    /// Propagates the engine's error.
    pub async fn run_consolidation_cycle(&self, session_id: &str, trigger: Trigger) -> Result<CycleReport> {
        self.run_cycle_with_telemetry(
            &self.consolidation,
            session_id,
            trigger,
            Some(LifecycleEventType::ConsolidationStarted),
            Some(LifecycleEventType::ConsolidationCompleted),
        )
        .await
    }

    /// Manually drive one Distillation cycle (L3 -> L4). Emits
    /// `distillation_started` before the engine runs and
    /// `distillation_completed` after, bracketing the engine's own
    /// per-document `knowledge_created` events.
    ///
    /// # Errors
    /// Propagates the engine's error.
    pub async fn run_distillation_cycle(&self, session_id: &str, trigger: Trigger) -> Result<CycleReport> {
        self.run_cycle_with_telemetry(
            &self.distillation,
            session_id,
            trigger,
            Some(LifecycleEventType::DistillationStarted),
            Some(LifecycleEventType::DistillationCompleted),
        )
        .await
    }

    async fn run_cycle_with_telemetry(
        &self,
        engine: &dyn LifecycleEngine,
        session_id: &str,
        trigger: Trigger,
        started_event: Option<LifecycleEventType>,
        completed_event: Option<LifecycleEventType>,
    ) -> Result<CycleReport> {
        if let Some(event_type) = started_event {
            self.events.emit_event(event_type, Some(session_id), serde_json::json!({"engine": engine.name()})).await;
        }

        let report = engine.run_cycle(session_id, trigger).await?;

        if let Some(event_type) = completed_event {
            self.events
                .emit(LifecycleEvent::new(
                    event_type,
                    Some(session_id),
                    serde_json::json!({
                        "engine": engine.name(),
                        "succeeded": report.succeeded_count(),
                        "failed": report.failed_count(),
                    }),
                ))
                .await;
        }
        Ok(report)
    }

    /// Wake-up sweep (spec §4.4.4), run once before a surface starts
    /// serving traffic after a restart: repairs any L3 dual-index
    /// inconsistency left by a crash between the vector and graph
    /// writes `EpisodicMemory::store_episode` otherwise keeps atomic.
    /// Returns the number of orphaned records removed.
    ///
    /// # Errors
    /// Propagates the underlying adapters' errors.
    pub async fn initialize(&self) -> Result<usize> {
        self.l3.recover().await
    }

    /// The domain registry backing `query_memory`'s facet boosting,
    /// mutable so callers can hot-reload configs at runtime.
    pub fn domains_mut(&mut self) -> &mut DomainRegistry {
        &mut self.domains
    }

    /// Access the lifecycle event stream directly, e.g. to register a
    /// handler before the surface starts processing traffic.
    #[must_use]
    pub fn events(&self) -> &Arc<LifecycleEventStream<K>> {
        &self.events
    }
}

impl InMemorySurface {
    /// Build a fully in-memory surface: useful for tests, examples, and
    /// the crate's doc comments. No state survives past the process.
    #[must_use]
    pub fn new_in_memory(llm: Arc<dyn LlmClient>, config: SystemConfig) -> Self {
        let kv = Arc::new(MemoryKvAdapter::new());
        let l1 = ActiveContext::new(Arc::clone(&kv), config.l1.clone());
        let l2 = WorkingMemory::new(Arc::new(MemoryRelationalAdapter::<Fact>::new()), config.l2.clone());
        let l3 = EpisodicMemory::new(
            Arc::new(MemoryVectorAdapter::<Episode>::new(config.l3.embedding_dimension)),
            Arc::new(MemoryGraphAdapter::new()),
            config.l3.clone(),
        );
        let l4 = SemanticMemory::new(Arc::new(MemoryFullTextAdapter::<KnowledgeDocument>::new()), config.l4.clone());
        Self::new(kv, l1, l2, l3, l4, llm, config, DomainRegistry::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmRequest;

    struct StubLlm;

    #[async_trait::async_trait]
    impl LlmClient for StubLlm {
        async fn call(&self, request: LlmRequest) -> Result<crate::llm::LlmResponse> {
            Ok(crate::llm::LlmResponse { text: request.prompt, parsed: None, provider: "stub".to_string() })
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.1; 768])
        }
    }

    #[tokio::test]
    async fn ingest_then_get_context_block_round_trips_a_turn() {
        let surface = MemorySurface::new_in_memory(Arc::new(StubLlm), SystemConfig::default());
        let turn = Turn::new("session-1", "user", "remember the deploy window is Tuesday").unwrap();
        surface.ingest(&turn).await.unwrap();

        let context = surface.get_context_block("session-1", 0.0, 10, 10).await.unwrap();
        assert_eq!(context.turn_count, 1);
        assert_eq!(context.recent_turns[0].content, "remember the deploy window is Tuesday");
    }

    #[tokio::test]
    async fn store_memory_routes_short_content_to_l1() {
        let surface = MemorySurface::new_in_memory(Arc::new(StubLlm), SystemConfig::default());
        surface.store_memory("session-1", "short note", serde_json::json!({})).await.unwrap();
        let context = surface.get_context_block("session-1", 0.0, 10, 10).await.unwrap();
        assert_eq!(context.turn_count, 1);
    }

    #[tokio::test]
    async fn store_memory_routes_long_content_to_l2() {
        let surface = MemorySurface::new_in_memory(Arc::new(StubLlm), SystemConfig::default());
        let long_content = "x".repeat(250);
        surface.store_memory("session-1", &long_content, serde_json::json!({})).await.unwrap();
        let context = surface.get_context_block("session-1", 0.0, 10, 10).await.unwrap();
        assert_eq!(context.turn_count, 0);
        assert_eq!(context.fact_count, 1);
    }

    #[tokio::test]
    async fn query_memory_merges_hits_across_tiers() {
        let surface = MemorySurface::new_in_memory(Arc::new(StubLlm), SystemConfig::default());
        surface.store_memory("session-1", &"deploy policy notes for the platform team".repeat(10), serde_json::json!({})).await.unwrap();

        let results = surface.query_memory("session-1", "deploy policy", 5, None).await.unwrap();
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn ingest_rejects_invalid_session_id() {
        let surface = MemorySurface::new_in_memory(Arc::new(StubLlm), SystemConfig::default());
        let turn = Turn::new("ok-session", "user", "hi").unwrap();
        let mut bad_turn = turn.clone();
        bad_turn.session_id = "{bad}".to_string();
        assert!(surface.ingest(&bad_turn).await.is_err());
    }
}

//! Consolidation Engine: L2 facts -> L3 episodes (spec §4.4.2).
//!
//! Facts crossing the promotion threshold are grouped into time-window
//! buckets; when `ConsolidationStrategy::EmbeddingSubcluster` is
//! configured, each bucket is further split by embedding similarity
//! before being summarized into an episode. Consolidation is designed
//! to be idempotent: re-running over the same fact set with the same
//! window produces the same episode boundaries (spec §3 invariant).

use super::{CycleReport, ItemResult, LifecycleEngine};
use crate::llm::{LlmClient, LlmRequest};
use crate::storage::{GraphAdapter, RelationalAdapter, VectorAdapter};
use crate::telemetry::{NoopTelemetrySink, TelemetrySink};
use crate::tiers::{EpisodicMemory, WorkingMemory};
use crate::types::config::ConsolidationEngineConfig;
use crate::types::enums::{ConsolidationStrategy, ItemOutcome, LifecycleEventType, LlmTask, Trigger};
use crate::types::{Entity, Episode, Fact};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;

/// Result of [`ConsolidationEngine::summarize`]: the narrative summary
/// plus the entities and topics the summarization call surfaced, which
/// populate `Episode.entities`/`Episode.topics` (spec §4.4.2 step 4).
struct SummaryResult {
    summary: String,
    importance: f32,
    entities: Vec<Entity>,
    topics: Vec<String>,
}

fn entity_id(session_id: &str, name: &str) -> String {
    let slug: String =
        name.trim().to_lowercase().chars().map(|c| if c.is_alphanumeric() { c } else { '-' }).collect();
    format!("{session_id}:{slug}")
}

fn parse_entity(session_id: &str, value: &serde_json::Value) -> Option<Entity> {
    let obj = value.as_object()?;
    let name = obj.get("name")?.as_str()?.to_string();
    let entity_type = obj.get("type").and_then(serde_json::Value::as_str).unwrap_or("unknown").to_string();
    let confidence = obj.get("confidence").and_then(serde_json::Value::as_f64).unwrap_or(0.5) as f32;
    Some(Entity { entity_id: entity_id(session_id, &name), name, entity_type, confidence: confidence.clamp(0.0, 1.0) })
}

fn bucket_key(fact: &Fact, window_secs: i64) -> i64 {
    fact.created_at.timestamp() / window_secs.max(1)
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Single-linkage sub-clustering of facts within a time-window bucket by
/// embedding cosine similarity, used when
/// `ConsolidationStrategy::EmbeddingSubcluster` is selected.
fn subcluster(facts_with_embeddings: Vec<(Fact, Vec<f32>)>, similarity_threshold: f32) -> Vec<Vec<Fact>> {
    let mut clusters: Vec<Vec<(Fact, Vec<f32>)>> = Vec::new();
    'outer: for (fact, embedding) in facts_with_embeddings {
        for cluster in &mut clusters {
            if cluster.iter().any(|(_, e)| cosine(e, &embedding) >= similarity_threshold) {
                cluster.push((fact, embedding));
                continue 'outer;
            }
        }
        clusters.push(vec![(fact, embedding)]);
    }
    clusters.into_iter().map(|c| c.into_iter().map(|(f, _)| f).collect()).collect()
}

/// Drives the Consolidation pipeline for one session.
pub struct ConsolidationEngine<R: RelationalAdapter<Fact>, V: VectorAdapter<Episode>, G: GraphAdapter> {
    l2: Arc<WorkingMemory<R>>,
    l3: Arc<EpisodicMemory<V, G>>,
    llm: Arc<dyn LlmClient>,
    config: ConsolidationEngineConfig,
    strategy: ConsolidationStrategy,
    events: Arc<dyn TelemetrySink>,
}

impl<R: RelationalAdapter<Fact>, V: VectorAdapter<Episode>, G: GraphAdapter> ConsolidationEngine<R, V, G> {
    #[must_use]
    pub fn new(
        l2: Arc<WorkingMemory<R>>,
        l3: Arc<EpisodicMemory<V, G>>,
        llm: Arc<dyn LlmClient>,
        config: ConsolidationEngineConfig,
        strategy: ConsolidationStrategy,
    ) -> Self {
        Self { l2, l3, llm, config, strategy, events: Arc::new(NoopTelemetrySink) }
    }

    /// Wire in the lifecycle event stream so every fact cluster emits
    /// `facts_clustered` and every stored episode emits `episode_created`
    /// (spec §4.4.2).
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn TelemetrySink>) -> Self {
        self.events = events;
        self
    }

    async fn summarize(&self, session_id: &str, facts: &[Fact]) -> SummaryResult {
        let joined = facts.iter().map(|f| f.statement.as_str()).collect::<Vec<_>>().join("; ");
        let request = LlmRequest::new(LlmTask::EpisodeSummarization, &joined)
            .with_system_instruction(
                "Summarize these related facts into one coherent narrative paragraph, and list \
                 the entities mentioned and the topics covered. Respond with JSON: summary, \
                 entities (each with name, type, confidence), topics.",
            )
            .with_schema(serde_json::json!({
                "type": "object",
                "required": ["summary"]
            }));

        match self.llm.call(request).await {
            Ok(response) => match response.parsed.as_ref().and_then(|v| v.as_object()) {
                Some(obj) => {
                    let summary =
                        obj.get("summary").and_then(serde_json::Value::as_str).unwrap_or(&response.text).to_string();
                    let entities = obj
                        .get("entities")
                        .and_then(serde_json::Value::as_array)
                        .map(|arr| arr.iter().filter_map(|v| parse_entity(session_id, v)).collect())
                        .unwrap_or_default();
                    let topics = obj
                        .get("topics")
                        .and_then(serde_json::Value::as_array)
                        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                        .unwrap_or_default();
                    SummaryResult { summary, importance: 0.7, entities, topics }
                }
                None => {
                    tracing::warn!(
                        "episode summarization LLM response failed schema validation, using concatenation fallback"
                    );
                    SummaryResult { summary: joined, importance: 0.3, entities: Vec::new(), topics: Vec::new() }
                }
            },
            Err(err) => {
                tracing::warn!(%err, "episode summarization LLM call failed, using concatenation fallback");
                SummaryResult { summary: joined, importance: 0.3, entities: Vec::new(), topics: Vec::new() }
            }
        }
    }
}

#[async_trait::async_trait]
impl<R: RelationalAdapter<Fact>, V: VectorAdapter<Episode>, G: GraphAdapter> LifecycleEngine
    for ConsolidationEngine<R, V, G>
{
    fn name(&self) -> &'static str {
        "consolidation"
    }

    async fn run_cycle(&self, session_id: &str, trigger: Trigger) -> Result<CycleReport> {
        let started_at = Utc::now();
        let facts = self.l2.unconsolidated_facts(session_id, self.config.pressure_threshold.max(1) * 2).await?;

        let mut buckets: std::collections::BTreeMap<i64, Vec<Fact>> = std::collections::BTreeMap::new();
        for fact in facts {
            buckets.entry(bucket_key(&fact, self.config.time_window.as_secs() as i64)).or_default().push(fact);
        }

        let mut items = Vec::new();
        for (_, bucket_facts) in buckets {
            let groups = match self.strategy {
                ConsolidationStrategy::TimeWindow => vec![bucket_facts],
                ConsolidationStrategy::EmbeddingSubcluster => {
                    let mut with_embeddings = Vec::with_capacity(bucket_facts.len());
                    for fact in bucket_facts {
                        match self.llm.embed(&fact.statement).await {
                            Ok(embedding) => with_embeddings.push((fact, embedding)),
                            Err(_) => with_embeddings.push((fact, vec![0.0; 768])),
                        }
                    }
                    subcluster(with_embeddings, 0.7)
                }
            };

            for group in groups {
                if group.is_empty() {
                    continue;
                }
                let group_id = group[0].id.to_string();
                self.events
                    .emit_event(
                        LifecycleEventType::FactsClustered,
                        Some(session_id),
                        serde_json::json!({"cluster_id": group_id, "fact_count": group.len()}),
                    )
                    .await;
                let result = self.summarize(session_id, &group).await;
                let mut episode = match Episode::new(session_id, result.summary, self.strategy) {
                    Ok(episode) => episode,
                    Err(err) => {
                        items.push(ItemResult {
                            item_id: group_id,
                            outcome: ItemOutcome::Failed,
                            detail: Some(err.to_string()),
                        });
                        continue;
                    }
                };
                episode.source_fact_ids = group.iter().map(|f| f.id).collect();
                let mut topics: std::collections::HashSet<String> =
                    group.iter().filter_map(|f| f.topic.clone()).collect();
                topics.extend(result.topics);
                episode.topics = topics.into_iter().collect();
                episode.entities = result.entities;
                episode.importance = result.importance;
                episode.window_start = group.iter().map(|f| f.created_at).min().unwrap_or_else(Utc::now);
                episode.window_end = group.iter().map(|f| f.created_at).max().unwrap_or_else(Utc::now);
                episode.fact_valid_from = episode.window_start;

                let embedding = match self.llm.embed(&episode.summary).await {
                    Ok(embedding) => embedding,
                    Err(_) => vec![0.0; 768],
                };

                match self.l3.store_episode(&mut episode, embedding).await {
                    Ok(()) => {
                        for fact in &group {
                            if let Err(err) = self.l2.mark_consolidated(fact.id, episode.id).await {
                                tracing::warn!(%err, fact_id = %fact.id, episode_id = %episode.id, "failed to mark fact consolidated");
                            }
                        }
                        items.push(ItemResult {
                            item_id: episode.id.to_string(),
                            outcome: ItemOutcome::Succeeded,
                            detail: None,
                        });
                        self.events
                            .emit_event(
                                LifecycleEventType::EpisodeCreated,
                                Some(session_id),
                                serde_json::json!({"episode_id": episode.id, "entity_count": episode.entities.len()}),
                            )
                            .await;
                    }
                    Err(err) => items.push(ItemResult {
                        item_id: episode.id.to_string(),
                        outcome: ItemOutcome::Failed,
                        detail: Some(err.to_string()),
                    }),
                }
            }
        }

        Ok(CycleReport { trigger, started_at, finished_at: Utc::now(), items })
    }
}

//! Distillation Engine: L3 episodes -> L4 knowledge documents (spec §4.4.3).
//!
//! Episodes sharing a topic are handed to the [`KnowledgeSynthesizer`],
//! which asks the LLM for one coherent document and falls back to
//! concatenation when the call fails. Before a document is written, it
//! is checked against existing L4 documents for near-duplicates via a
//! trigram Jaccard similarity; conflicts are recorded rather than
//! silently overwritten. A short-lived cache avoids re-synthesizing the
//! same episode cluster across back-to-back cycles.

use super::{CycleReport, ItemResult, LifecycleEngine};
use crate::llm::{LlmClient, LlmRequest};
use crate::storage::{FullTextAdapter, GraphAdapter, VectorAdapter};
use crate::telemetry::{NoopTelemetrySink, TelemetrySink};
use crate::tiers::{EpisodicMemory, L4Filters, SemanticMemory};
use crate::types::config::{DistillationEngineConfig, L4Config};
use crate::types::enums::{ItemOutcome, KnowledgeType, LifecycleEventType, LlmTask, SynthesisMethod, Trigger};
use crate::types::{Category, Episode, KnowledgeDocument};
use crate::Result;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

fn trigrams(text: &str) -> HashSet<String> {
    let normalized: Vec<char> = text.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
    if normalized.len() < 3 {
        return normalized.iter().collect::<String>().chars().map(String::from).collect();
    }
    normalized.windows(3).map(|w| w.iter().collect()).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Synthesizes a coherent [`KnowledgeDocument`] from a cluster of
/// related episodes, via the LLM with a concatenation-based fallback.
pub struct KnowledgeSynthesizer {
    llm: Arc<dyn LlmClient>,
    cache: Mutex<HashMap<String, (Instant, KnowledgeDocument)>>,
    cache_ttl: std::time::Duration,
}

impl KnowledgeSynthesizer {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>, cache_ttl: std::time::Duration) -> Self {
        Self { llm, cache: Mutex::new(HashMap::new()), cache_ttl }
    }

    fn cluster_key(episodes: &[Episode]) -> String {
        let mut ids: Vec<String> = episodes.iter().map(|e| e.id.to_string()).collect();
        ids.sort();
        ids.join(",")
    }

    /// Synthesize `episodes` (assumed topically related) into one
    /// document, or return a cached result if this exact cluster was
    /// synthesized within `cache_ttl`.
    ///
    /// # Errors
    /// Never returns an error: a failed LLM call degrades to the
    /// concatenation fallback rather than propagating.
    pub async fn synthesize(&self, episodes: &[Episode]) -> Result<KnowledgeDocument> {
        let key = Self::cluster_key(episodes);
        if let Some((cached_at, document)) = self.cache.lock().get(&key) {
            if cached_at.elapsed() < self.cache_ttl {
                return Ok(document.clone());
            }
        }

        let joined = episodes.iter().map(|e| e.summary.as_str()).collect::<Vec<_>>().join("\n\n");
        let request = LlmRequest::new(LlmTask::KnowledgeSynthesis, &joined)
            .with_system_instruction(
                "Synthesize these related episode summaries into one knowledge document. \
                 Respond with JSON: title, body, knowledge_type, category, tags, confidence_score.",
            )
            .with_schema(serde_json::json!({
                "type": "object",
                "required": ["title", "body"]
            }));

        let mut document = match self.llm.call(request).await {
            Ok(response) => match response.parsed.as_ref().and_then(|v| v.as_object()) {
                Some(obj) => {
                    let title = obj.get("title").and_then(serde_json::Value::as_str).unwrap_or("Untitled").to_string();
                    let body = obj.get("body").and_then(serde_json::Value::as_str).unwrap_or(&joined).to_string();
                    let knowledge_type = parse_knowledge_type(obj.get("knowledge_type").and_then(serde_json::Value::as_str));
                    let category = parse_category(obj.get("category").and_then(serde_json::Value::as_str));
                    let mut doc = KnowledgeDocument::new(title, body, knowledge_type, category, SynthesisMethod::LlmSynthesized)?;
                    if let Some(tags) = obj.get("tags").and_then(serde_json::Value::as_array) {
                        doc.tags.extend(tags.iter().filter_map(|t| t.as_str().map(String::from)));
                    }
                    if let Some(confidence) = obj.get("confidence_score").and_then(serde_json::Value::as_f64) {
                        doc.confidence_score = (confidence as f32).clamp(0.0, 1.0);
                    }
                    Ok(doc)
                }
                None => {
                    tracing::warn!("knowledge synthesis LLM response failed schema validation, using concatenation fallback");
                    Self::fallback_document(episodes, &joined)
                }
            },
            Err(err) => {
                tracing::warn!(%err, "knowledge synthesis LLM call failed, using concatenation fallback");
                Self::fallback_document(episodes, &joined)
            }
        }?;

        for topic in episodes.iter().flat_map(|e| e.topics.iter()) {
            document.tags.insert(topic.clone());
        }

        self.cache.lock().insert(key, (Instant::now(), document.clone()));
        Ok(document)
    }

    fn fallback_document(episodes: &[Episode], joined: &str) -> Result<KnowledgeDocument> {
        let title = episodes.first().map_or("Untitled".to_string(), |e| {
            e.topics.first().cloned().unwrap_or_else(|| "Untitled".to_string())
        });
        KnowledgeDocument::new(title, joined, KnowledgeType::Summary, Category::Personal, SynthesisMethod::RuleBasedFallback)
    }
}

fn parse_knowledge_type(value: Option<&str>) -> KnowledgeType {
    match value {
        Some("insight") => KnowledgeType::Insight,
        Some("pattern") => KnowledgeType::Pattern,
        Some("recommendation") => KnowledgeType::Recommendation,
        Some("rule") => KnowledgeType::Rule,
        _ => KnowledgeType::Summary,
    }
}

fn parse_category(value: Option<&str>) -> Category {
    match value {
        Some("business") => Category::Business,
        Some("technical") => Category::Technical,
        Some("operational") => Category::Operational,
        _ => Category::Personal,
    }
}

/// Drives the Distillation pipeline for one session: fetch
/// not-yet-distilled episodes, group by topic, synthesize, surface
/// conflicts, store.
pub struct DistillationEngine<V: VectorAdapter<Episode>, G: GraphAdapter, A: FullTextAdapter<KnowledgeDocument>> {
    l3: Arc<EpisodicMemory<V, G>>,
    l4: Arc<SemanticMemory<A>>,
    synthesizer: KnowledgeSynthesizer,
    config: DistillationEngineConfig,
    near_duplicate_threshold: f32,
    events: Arc<dyn TelemetrySink>,
}

impl<V: VectorAdapter<Episode>, G: GraphAdapter, A: FullTextAdapter<KnowledgeDocument>> DistillationEngine<V, G, A> {
    #[must_use]
    pub fn new(
        l3: Arc<EpisodicMemory<V, G>>,
        l4: Arc<SemanticMemory<A>>,
        llm: Arc<dyn LlmClient>,
        config: DistillationEngineConfig,
        l4_config: &L4Config,
    ) -> Self {
        let synthesizer = KnowledgeSynthesizer::new(llm, config.cache_ttl);
        Self {
            l3,
            l4,
            synthesizer,
            config,
            near_duplicate_threshold: l4_config.near_duplicate_threshold,
            events: Arc::new(NoopTelemetrySink),
        }
    }

    /// Wire in the lifecycle event stream so every stored document emits
    /// `knowledge_created` (spec §4.4.3).
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn TelemetrySink>) -> Self {
        self.events = events;
        self
    }

    async fn nearest_existing(&self, document: &KnowledgeDocument) -> Result<Option<(KnowledgeDocument, f32)>> {
        let filters = L4Filters { domain: document.domain.clone(), ..L4Filters::default() };
        let matches = self.l4.search(&document.title, &filters, 5).await?;
        let target = trigrams(&document.body);
        Ok(matches
            .into_iter()
            .map(|(candidate, _)| {
                let similarity = jaccard(&target, &trigrams(&candidate.body));
                (candidate, similarity)
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)))
    }
}

#[async_trait::async_trait]
impl<V: VectorAdapter<Episode>, G: GraphAdapter, A: FullTextAdapter<KnowledgeDocument>> LifecycleEngine
    for DistillationEngine<V, G, A>
{
    fn name(&self) -> &'static str {
        "distillation"
    }

    async fn run_cycle(&self, session_id: &str, trigger: Trigger) -> Result<CycleReport> {
        let started_at = Utc::now();
        let episodes = self.l3.query_temporal(session_id, Utc::now()).await?;

        let mut by_topic: HashMap<String, Vec<Episode>> = HashMap::new();
        for episode in episodes {
            let topic = episode.topics.first().cloned().unwrap_or_else(|| "general".to_string());
            by_topic.entry(topic).or_default().push(episode);
        }

        let mut items = Vec::new();
        for (topic, cluster) in by_topic {
            if cluster.len() < self.config.episode_threshold.max(1) {
                items.push(ItemResult {
                    item_id: topic,
                    outcome: ItemOutcome::Skipped,
                    detail: Some("cluster below episode threshold".to_string()),
                });
                continue;
            }

            let mut document = match self.synthesizer.synthesize(&cluster).await {
                Ok(document) => document,
                Err(err) => {
                    items.push(ItemResult { item_id: topic, outcome: ItemOutcome::Failed, detail: Some(err.to_string()) });
                    continue;
                }
            };
            document.source_episode_ids = cluster.iter().map(|e| e.id).collect();
            document.domain = Some(topic.clone());
            document.tags.insert(topic.clone());

            match self.nearest_existing(&document).await {
                Ok(Some((existing, similarity))) if similarity >= self.near_duplicate_threshold => {
                    document.conflicts_with.push(existing.id);
                    document.novelty_score = 1.0 - similarity;
                }
                Ok(Some((_, similarity))) => document.novelty_score = 1.0 - similarity,
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(%err, "conflict-surfacing search failed, storing without novelty check");
                }
            }

            match self.l4.store_document(&document).await {
                Ok(()) => {
                    items.push(ItemResult { item_id: document.id.to_string(), outcome: ItemOutcome::Succeeded, detail: None });
                    self.events
                        .emit_event(
                            LifecycleEventType::KnowledgeCreated,
                            Some(session_id),
                            serde_json::json!({"knowledge_id": document.id, "topic": topic}),
                        )
                        .await;
                }
                Err(err) => items.push(ItemResult {
                    item_id: document.id.to_string(),
                    outcome: ItemOutcome::Failed,
                    detail: Some(err.to_string()),
                }),
            }
        }

        Ok(CycleReport { trigger, started_at, finished_at: Utc::now(), items })
    }
}

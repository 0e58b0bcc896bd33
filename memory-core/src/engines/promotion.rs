//! Promotion Engine: L1 turns -> L2 facts (spec §4.4.1).
//!
//! Pipeline: buffered turns are split into [`TopicSegment`]s by the
//! `TopicSegmenter`, each segment is pre-filtered by a CIAR estimate so
//! low-signal chit-chat never reaches the LLM, and surviving segments
//! go through the `FactExtractor`, which calls the LLM with a
//! schema-enforced prompt and falls back to a rule-based extractor if
//! the call fails or the circuit is open.

use super::{CycleReport, ItemResult, LifecycleEngine};
use crate::llm::{LlmClient, LlmRequest};
use crate::storage::{KvAdapter, RelationalAdapter};
use crate::telemetry::{NoopTelemetrySink, TelemetrySink};
use crate::tiers::{ActiveContext, WorkingMemory};
use crate::types::config::{L2Config, PromotionEngineConfig};
use crate::types::enums::{ItemOutcome, LifecycleEventType, LlmTask, Trigger};
use crate::types::{Category, Fact, FactType, TopicSegment, Turn};
use crate::Result;
use chrono::Utc;
use regex::Regex;
use std::sync::Arc;

/// Splits a batch of turns into topically coherent segments.
///
/// The LLM-backed implementation asks for topic boundaries in one call;
/// [`TopicSegmenter::rule_based`] provides a deterministic fallback that
/// groups every turn into a single segment, used when the LLM path is
/// unavailable.
pub struct TopicSegmenter {
    llm: Arc<dyn LlmClient>,
}

impl TopicSegmenter {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Segment `turns` via the LLM, falling back to one whole-batch
    /// segment if the call fails. The returned `bool` is `true` when the
    /// rule-based fallback was used instead of the LLM's segmentation.
    ///
    /// # Errors
    /// Never returns an error: a failed LLM call degrades to the
    /// rule-based fallback rather than propagating.
    pub async fn segment(&self, turns: &[Turn]) -> Result<(Vec<TopicSegment>, bool)> {
        if turns.is_empty() {
            return Ok((Vec::new(), false));
        }
        let transcript = turns
            .iter()
            .enumerate()
            .map(|(i, t)| format!("[{i}] {}: {}", t.speaker, t.content))
            .collect::<Vec<_>>()
            .join("\n");
        let request = LlmRequest::new(LlmTask::TopicSegmentation, transcript)
            .with_system_instruction(
                "Split the conversation into topically coherent segments. \
                 Respond with a JSON array of segments, each with topic, summary, \
                 key_points, turn_indices, certainty, impact.",
            )
            .with_schema(serde_json::json!({
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["topic", "summary", "turn_indices", "certainty", "impact"]
                }
            }));

        match self.llm.call(request).await {
            Ok(response) => match response.parsed {
                Some(serde_json::Value::Array(segments)) => {
                    let parsed = segments
                        .into_iter()
                        .filter_map(|v| parse_segment(turns, &v))
                        .collect::<Vec<_>>();
                    if parsed.is_empty() {
                        Ok((vec![Self::rule_based(turns)], true))
                    } else {
                        Ok((parsed, false))
                    }
                }
                _ => Ok((vec![Self::rule_based(turns)], true)),
            },
            Err(err) => {
                tracing::warn!(%err, "topic segmentation LLM call failed, using rule-based fallback");
                Ok((vec![Self::rule_based(turns)], true))
            }
        }
    }

    /// Deterministic fallback: treat the whole batch as one segment.
    #[must_use]
    pub fn rule_based(turns: &[Turn]) -> TopicSegment {
        let participants: std::collections::HashSet<&str> =
            turns.iter().map(|t| t.speaker.as_str()).collect();
        TopicSegment {
            turn_ids: turns.iter().map(|t| t.id).collect(),
            turn_indices: (0..turns.len()).collect(),
            topic: "general".to_string(),
            summary: turns.iter().map(|t| t.content.as_str()).collect::<Vec<_>>().join(" "),
            key_points: Vec::new(),
            certainty: 0.5,
            impact: 0.5,
            participant_count: participants.len(),
            message_count: turns.len(),
            temporal_context: "single batch".to_string(),
        }
    }
}

fn parse_segment(turns: &[Turn], value: &serde_json::Value) -> Option<TopicSegment> {
    let obj = value.as_object()?;
    let turn_indices: Vec<usize> = obj
        .get("turn_indices")?
        .as_array()?
        .iter()
        .filter_map(serde_json::Value::as_u64)
        .map(|i| i as usize)
        .collect();
    let turn_ids = turn_indices.iter().filter_map(|i| turns.get(*i)).map(|t| t.id).collect();
    let participants: std::collections::HashSet<&str> = turn_indices
        .iter()
        .filter_map(|i| turns.get(*i))
        .map(|t| t.speaker.as_str())
        .collect();
    Some(TopicSegment {
        turn_ids,
        message_count: turn_indices.len(),
        participant_count: participants.len(),
        turn_indices,
        topic: obj.get("topic")?.as_str()?.to_string(),
        summary: obj.get("summary").and_then(serde_json::Value::as_str).unwrap_or("").to_string(),
        key_points: obj
            .get("key_points")
            .and_then(serde_json::Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default(),
        certainty: obj.get("certainty")?.as_f64()? as f32,
        impact: obj.get("impact")?.as_f64()? as f32,
        temporal_context: String::new(),
    })
}

/// Extracts structured [`Fact`]s from a [`TopicSegment`], via the LLM
/// with a regex/keyword-based fallback.
pub struct FactExtractor {
    llm: Arc<dyn LlmClient>,
    preference_re: Regex,
    constraint_re: Regex,
}

impl FactExtractor {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            preference_re: Regex::new(r"(?i)\b(prefer|like|want|favorite)\b").expect("valid regex"),
            constraint_re: Regex::new(r"(?i)\b(must|require|cannot|never|always|deadline)\b")
                .expect("valid regex"),
        }
    }

    /// Extract facts from `segment`, belonging to `session_id`. The
    /// returned `bool` is `true` when the rule-based fallback was used
    /// instead of the LLM's extraction.
    ///
    /// # Errors
    /// Never returns an error: a failed LLM call degrades to the
    /// rule-based fallback rather than propagating.
    pub async fn extract(&self, session_id: &str, segment: &TopicSegment) -> Result<(Vec<Fact>, bool)> {
        let request = LlmRequest::new(LlmTask::FactExtraction, &segment.summary)
            .with_system_instruction(
                "Extract discrete facts from this conversation segment. Respond with a \
                 JSON array of facts, each with statement, fact_type, category, certainty, \
                 impact, justification.",
            )
            .with_schema(serde_json::json!({
                "type": "array",
                "items": {"type": "object", "required": ["statement", "certainty", "impact"]}
            }));

        match self.llm.call(request).await {
            Ok(response) => match response.parsed {
                Some(serde_json::Value::Array(items)) if !items.is_empty() => Ok((
                    items.into_iter().filter_map(|v| self.parse_fact(session_id, segment, &v)).collect(),
                    false,
                )),
                _ => Ok((self.rule_based(session_id, segment), true)),
            },
            Err(err) => {
                tracing::warn!(%err, "fact extraction LLM call failed, using rule-based fallback");
                Ok((self.rule_based(session_id, segment), true))
            }
        }
    }

    fn parse_fact(&self, session_id: &str, segment: &TopicSegment, value: &serde_json::Value) -> Option<Fact> {
        let obj = value.as_object()?;
        let statement = obj.get("statement")?.as_str()?.to_string();
        let certainty = obj.get("certainty")?.as_f64()? as f32;
        let impact = obj.get("impact")?.as_f64()? as f32;
        let fact_type = parse_fact_type(obj.get("fact_type").and_then(serde_json::Value::as_str));
        let category = parse_category(obj.get("category").and_then(serde_json::Value::as_str));
        let mut fact = Fact::new(
            session_id,
            statement,
            fact_type,
            category,
            certainty.clamp(0.0, 1.0),
            impact.clamp(0.0, 1.0),
        )
        .ok()?;
        fact.topic = Some(segment.topic.clone());
        fact.source_turn_ids = segment.turn_ids.clone();
        fact.justification = obj.get("justification").and_then(serde_json::Value::as_str).map(String::from);
        Some(fact)
    }

    /// Keyword-based fallback: one fact per key point (or the segment
    /// summary if there are none), classified by a small regex set.
    #[must_use]
    pub fn rule_based(&self, session_id: &str, segment: &TopicSegment) -> Vec<Fact> {
        let candidates = if segment.key_points.is_empty() {
            vec![segment.summary.clone()]
        } else {
            segment.key_points.clone()
        };
        candidates
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .filter_map(|statement| {
                let fact_type = if self.preference_re.is_match(&statement) {
                    FactType::Preference
                } else if self.constraint_re.is_match(&statement) {
                    FactType::Constraint
                } else {
                    FactType::Mention
                };
                let mut fact =
                    Fact::new(session_id, statement, fact_type, Category::Personal, 0.5, 0.4).ok()?;
                fact.topic = Some(segment.topic.clone());
                fact.source_turn_ids = segment.turn_ids.clone();
                Some(fact)
            })
            .collect()
    }
}

fn parse_fact_type(value: Option<&str>) -> FactType {
    match value {
        Some("preference") => FactType::Preference,
        Some("constraint") => FactType::Constraint,
        Some("entity") => FactType::Entity,
        Some("relationship") => FactType::Relationship,
        Some("event") => FactType::Event,
        Some("instruction") => FactType::Instruction,
        _ => FactType::Mention,
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

/// Drives the Promotion pipeline for one session: fetch buffered turns,
/// segment, pre-filter, extract, store.
pub struct PromotionEngine<K: KvAdapter, R: RelationalAdapter<Fact>> {
    l1: Arc<ActiveContext<K>>,
    l2: Arc<WorkingMemory<R>>,
    segmenter: TopicSegmenter,
    extractor: FactExtractor,
    config: PromotionEngineConfig,
    events: Arc<dyn TelemetrySink>,
}

impl<K: KvAdapter, R: RelationalAdapter<Fact>> PromotionEngine<K, R> {
    #[must_use]
    pub fn new(
        l1: Arc<ActiveContext<K>>,
        l2: Arc<WorkingMemory<R>>,
        llm: Arc<dyn LlmClient>,
        config: PromotionEngineConfig,
    ) -> Self {
        Self {
            l1,
            l2,
            segmenter: TopicSegmenter::new(Arc::clone(&llm)),
            extractor: FactExtractor::new(llm),
            config,
            events: Arc::new(NoopTelemetrySink),
        }
    }

    /// Wire in the lifecycle event stream so every scored segment/fact
    /// emits `significance_scored` and every stored fact emits
    /// `fact_promoted` (spec §4.4.1 step 6).
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn TelemetrySink>) -> Self {
        self.events = events;
        self
    }
}

#[async_trait::async_trait]
impl<K: KvAdapter, R: RelationalAdapter<Fact>> LifecycleEngine for PromotionEngine<K, R> {
    fn name(&self) -> &'static str {
        "promotion"
    }

    async fn run_cycle(&self, session_id: &str, trigger: Trigger) -> Result<CycleReport> {
        let started_at = Utc::now();
        let turns = self.l1.recent_turns(session_id, self.config.batch_threshold.max(1)).await?;
        let batch_start = turns.first().map_or(started_at, |t| t.created_at);
        let (segments, segment_fallback) = self.segmenter.segment(&turns).await?;

        let mut items = Vec::new();
        for segment in segments {
            let segment_id = segment.topic.clone();
            let prefilter = segment.prefilter_score(batch_start, Utc::now());
            self.events
                .emit_event(
                    LifecycleEventType::SignificanceScored,
                    Some(session_id),
                    serde_json::json!({
                        "kind": "segment",
                        "segment": segment_id,
                        "score": prefilter,
                        "fallback": segment_fallback,
                    }),
                )
                .await;
            if prefilter < self.config.segment_ciar_prefilter {
                items.push(ItemResult {
                    item_id: segment_id,
                    outcome: ItemOutcome::Skipped,
                    detail: Some(format!("prefilter score {prefilter:.3} below threshold")),
                });
                continue;
            }

            let (facts, fact_fallback) = match self.extractor.extract(session_id, &segment).await {
                Ok(result) => result,
                Err(err) => {
                    items.push(ItemResult {
                        item_id: segment_id,
                        outcome: ItemOutcome::Failed,
                        detail: Some(err.to_string()),
                    });
                    continue;
                }
            };

            for fact in &facts {
                self.events
                    .emit_event(
                        LifecycleEventType::SignificanceScored,
                        Some(session_id),
                        serde_json::json!({
                            "kind": "fact",
                            "fact_id": fact.id,
                            "score": fact.ciar_score,
                            "fallback": fact_fallback,
                        }),
                    )
                    .await;
                match self.l2.store_fact(fact).await {
                    Ok(()) => {
                        items.push(ItemResult {
                            item_id: fact.id.to_string(),
                            outcome: ItemOutcome::Succeeded,
                            detail: None,
                        });
                        self.events
                            .emit_event(
                                LifecycleEventType::FactPromoted,
                                Some(session_id),
                                serde_json::json!({"fact_id": fact.id, "fallback": fact_fallback}),
                            )
                            .await;
                    }
                    Err(err @ crate::Error::DataValidation(_)) => items.push(ItemResult {
                        item_id: fact.id.to_string(),
                        outcome: ItemOutcome::Skipped,
                        detail: Some(format!("ciar_score {:.3} below promotion threshold: {err}", fact.ciar_score)),
                    }),
                    Err(err) => items.push(ItemResult {
                        item_id: fact.id.to_string(),
                        outcome: ItemOutcome::Failed,
                        detail: Some(err.to_string()),
                    }),
                }
            }
        }

        Ok(CycleReport { trigger, started_at, finished_at: Utc::now(), items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{MemoryKvAdapter, MemoryRelationalAdapter};
    use crate::types::config::L1Config;

    struct NoLlm;

    #[async_trait::async_trait]
    impl LlmClient for NoLlm {
        async fn call(&self, _request: LlmRequest) -> Result<crate::llm::LlmResponse> {
            Err(crate::Error::CircuitOpen("no provider configured".to_string()))
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; 768])
        }
    }

    #[tokio::test]
    async fn run_cycle_falls_back_to_rule_based_extraction_when_llm_unavailable() {
        let l1 = Arc::new(ActiveContext::new(Arc::new(MemoryKvAdapter::new()), L1Config::default()));
        // The rule-based fallback extractor seeds certainty/impact
        // conservatively (0.5/0.4), well under the default 0.6 promotion
        // threshold; lower it here so the fallback path's output is
        // actually admitted to L2 instead of being skipped at the gate.
        let mut l2_config = L2Config::default();
        l2_config.promotion_threshold = 0.0;
        let l2 = Arc::new(WorkingMemory::new(Arc::new(MemoryRelationalAdapter::new()), l2_config));
        let mut config = PromotionEngineConfig::default();
        config.segment_ciar_prefilter = 0.0;

        let turn = Turn::new("session-1", "user", "I must deploy before Friday").unwrap();
        l1.append_turn(&turn).await.unwrap();

        let engine = PromotionEngine::new(l1, l2, Arc::new(NoLlm), config);
        let report = engine.run_cycle("session-1", Trigger::Manual).await.unwrap();
        assert!(report.succeeded_count() >= 1);
    }

    #[tokio::test]
    async fn run_cycle_skips_facts_below_promotion_threshold() {
        let l1 = Arc::new(ActiveContext::new(Arc::new(MemoryKvAdapter::new()), L1Config::default()));
        let l2 = Arc::new(WorkingMemory::new(Arc::new(MemoryRelationalAdapter::new()), L2Config::default()));
        let mut config = PromotionEngineConfig::default();
        config.segment_ciar_prefilter = 0.0;

        let turn = Turn::new("session-1", "user", "I must deploy before Friday").unwrap();
        l1.append_turn(&turn).await.unwrap();

        let engine = PromotionEngine::new(l1, l2, Arc::new(NoLlm), config);
        let report = engine.run_cycle("session-1", Trigger::Manual).await.unwrap();
        assert_eq!(report.succeeded_count(), 0);
        assert!(report.items.iter().any(|i| i.outcome == ItemOutcome::Skipped));
    }
}

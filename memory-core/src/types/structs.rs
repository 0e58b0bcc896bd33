use super::enums::{Category, ConsolidationStrategy, FactType, KnowledgeType, SynthesisMethod};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// L1: raw conversation turn
// ============================================================================

/// A single conversational turn, the unit stored at L1 `ActiveContext`.
///
/// # Examples
///
/// ```
/// use memory_core::Turn;
///
/// let turn = Turn::new("session-1", "user", "What's the deploy window?").unwrap();
/// assert_eq!(turn.speaker, "user");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique identifier.
    pub id: Uuid,
    /// Session this turn belongs to.
    pub session_id: String,
    /// Who produced the turn (e.g. `"user"`, `"assistant"`, an agent name).
    pub speaker: String,
    /// Raw text content.
    pub content: String,
    /// Opaque caller-supplied metadata.
    pub metadata: serde_json::Value,
    /// Extractor's confidence in the speaker attribution/content
    /// transcription, when available. Feeds CIAR certainty seeding
    /// during fact extraction.
    pub speaker_confidence: Option<f32>,
    /// When the turn occurred.
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Construct a new turn, validating that required fields are non-empty.
    ///
    /// # Errors
    /// Returns [`Error::DataValidation`] if `session_id`, `speaker`, or
    /// `content` is empty.
    pub fn new(
        session_id: impl Into<String>,
        speaker: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self> {
        let session_id = session_id.into();
        let speaker = speaker.into();
        let content = content.into();
        if session_id.is_empty() || speaker.is_empty() || content.is_empty() {
            return Err(Error::DataValidation(
                "Turn requires non-empty session_id, speaker, and content".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            session_id,
            speaker,
            content,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            speaker_confidence: None,
            created_at: Utc::now(),
        })
    }

    /// Whether this turn was produced by a human user, as opposed to an
    /// assistant or system role. Used by the Promotion Engine's topic
    /// segmenter to weigh participant diversity.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.speaker.eq_ignore_ascii_case("user")
    }
}

// ============================================================================
// L2: extracted fact
// ============================================================================

/// A discrete fact extracted from one or more turns, the unit stored at
/// L2 `WorkingMemory`.
///
/// # Examples
///
/// ```
/// use memory_core::{Fact, FactType, Category};
///
/// let fact = Fact::new(
///     "session-1",
///     "Deploy window is Tuesdays 2-4pm UTC",
///     FactType::Constraint,
///     Category::Operational,
///     0.9,
///     0.6,
/// ).unwrap();
/// assert!(fact.certainty > 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Unique identifier.
    pub id: Uuid,
    /// Session this fact was extracted from.
    pub session_id: String,
    /// The extracted statement.
    pub statement: String,
    /// What kind of statement this is.
    pub fact_type: FactType,
    /// Coarse business-domain classification.
    pub category: Category,
    /// Extractor's confidence that the statement is accurate, `[0, 1]`.
    pub certainty: f32,
    /// Estimated downstream importance if true, `[0, 1]`.
    pub impact: f32,
    /// Number of times this fact has been retrieved, feeds CIAR recency boost.
    pub access_count: u32,
    /// Last time this fact was retrieved via `WorkingMemory::retrieve`.
    pub last_accessed: Option<DateTime<Utc>>,
    /// Most recently computed age-decay component, refreshed lazily on
    /// read or by a maintenance pass.
    pub age_decay: f32,
    /// Most recently computed recency-boost component.
    pub recency_boost: f32,
    /// `clamp01((certainty * impact) * age_decay * recency_boost)`,
    /// recomputed whenever any input changes.
    pub ciar_score: f32,
    /// Ids of the source turns this fact was derived from.
    pub source_turn_ids: Vec<Uuid>,
    /// Character offsets `(start, end)` into the primary source turn's
    /// content, for UI highlighting.
    pub provenance_span: Option<(usize, usize)>,
    /// Free-form topic label assigned by the `TopicSegmenter`.
    pub topic: Option<String>,
    /// Id of the `TopicSegment` this fact was extracted from, if any.
    pub topic_segment_id: Option<Uuid>,
    /// The LLM's stated reasoning for extracting this fact, when the
    /// extractor call returns one. Useful for audit and debugging.
    pub justification: Option<String>,
    /// Id of the episode this fact was consolidated into, if any. Set by
    /// `ConsolidationEngine` as its idempotency back-reference (spec
    /// §4.4.2 step 7): the fact is never deleted on consolidation, only
    /// marked, so it remains independently retrievable/expirable (spec
    /// §3 ownership) and excluded from the next consolidation cycle's
    /// candidate set.
    pub episode_id: Option<Uuid>,
    /// When the fact was extracted.
    pub created_at: DateTime<Utc>,
}

impl Fact {
    /// Construct a new fact, validating certainty/impact are in `[0, 1]`
    /// and computing the initial CIAR score (age zero, no accesses yet).
    ///
    /// # Errors
    /// Returns [`Error::DataValidation`] if `statement` is empty or
    /// `certainty`/`impact` fall outside `[0, 1]`.
    pub fn new(
        session_id: impl Into<String>,
        statement: impl Into<String>,
        fact_type: FactType,
        category: Category,
        certainty: f32,
        impact: f32,
    ) -> Result<Self> {
        let statement = statement.into();
        if statement.is_empty() {
            return Err(Error::DataValidation("Fact statement cannot be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&certainty) || !(0.0..=1.0).contains(&impact) {
            return Err(Error::DataValidation(format!(
                "Fact certainty/impact must be in [0,1], got certainty={certainty}, impact={impact}"
            )));
        }
        let now = Utc::now();
        let breakdown = crate::ciar::score(
            certainty,
            impact,
            now,
            now,
            0,
            crate::types::constants::defaults::CIAR_AGE_DECAY_LAMBDA,
            crate::types::constants::defaults::CIAR_RECENCY_BOOST_ALPHA,
        );
        Ok(Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            statement,
            fact_type,
            category,
            certainty,
            impact,
            access_count: 0,
            last_accessed: None,
            age_decay: breakdown.age_decay,
            recency_boost: breakdown.recency_boost,
            ciar_score: breakdown.score,
            source_turn_ids: Vec::new(),
            provenance_span: None,
            topic: None,
            topic_segment_id: None,
            justification: None,
            episode_id: None,
            created_at: now,
        })
    }

    /// Recompute `age_decay`, `recency_boost`, and `ciar_score` against
    /// the current time, using the configured decay/boost rate
    /// constants. Called on read (access tracking) and by L2's
    /// maintenance pass.
    pub fn recompute_ciar(&mut self, now: DateTime<Utc>, lambda: f64, alpha: f64) {
        let breakdown =
            crate::ciar::score(self.certainty, self.impact, self.created_at, now, self.access_count, lambda, alpha);
        self.age_decay = breakdown.age_decay;
        self.recency_boost = breakdown.recency_boost;
        self.ciar_score = breakdown.score;
    }
}

// ============================================================================
// L3: consolidated episode
// ============================================================================

/// An entity mentioned within a consolidated episode, with the
/// extractor's confidence in the mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier for this entity within the session/domain.
    pub entity_id: String,
    /// Display name.
    pub name: String,
    /// Free-form entity type (e.g. `"person"`, `"service"`, `"sku"`).
    pub entity_type: String,
    /// Extractor's confidence in the mention, `[0, 1]`.
    pub confidence: f32,
}

/// A consolidated cluster of facts, the unit stored at L3 `EpisodicMemory`.
///
/// # Examples
///
/// ```
/// use memory_core::{Episode, ConsolidationStrategy};
///
/// let episode = Episode::new(
///     "session-1",
///     "Deploy windows and rollback procedure discussed",
///     ConsolidationStrategy::TimeWindow,
/// ).unwrap();
/// assert_eq!(episode.strategy, ConsolidationStrategy::TimeWindow);
/// assert!(episode.fact_valid_to.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Unique identifier.
    pub id: Uuid,
    /// Session this episode was consolidated from.
    pub session_id: String,
    /// LLM-generated (or rule-based fallback) narrative summary.
    pub summary: String,
    /// Ids of the L2 facts this episode consolidates.
    pub source_fact_ids: Vec<Uuid>,
    /// Which clustering path produced this episode.
    pub strategy: ConsolidationStrategy,
    /// Centroid embedding of the consolidated facts, if computed.
    pub embedding: Option<Vec<f32>>,
    /// Id of the vector-store point cross-referencing this episode's
    /// graph node. `None` until the L3 dual-index write completes.
    pub vector_id: Option<String>,
    /// Entities mentioned across the consolidated facts.
    pub entities: Vec<Entity>,
    /// Topic labels inherited from the consolidated facts' segments.
    pub topics: Vec<String>,
    /// LLM-assessed importance of this episode, `[0, 1]`.
    pub importance: f32,
    /// Ids of graph-linked related episodes.
    pub related_episode_ids: Vec<Uuid>,
    /// Start of the consolidated time window.
    pub window_start: DateTime<Utc>,
    /// End of the consolidated time window.
    pub window_end: DateTime<Utc>,
    /// Start of bi-temporal validity, normally equal to `window_start`.
    pub fact_valid_from: DateTime<Utc>,
    /// End of bi-temporal validity. `None` means "currently valid".
    pub fact_valid_to: Option<DateTime<Utc>>,
    /// Number of times this episode has been retrieved.
    pub access_count: u32,
    /// When the episode was created.
    pub created_at: DateTime<Utc>,
}

impl Episode {
    /// Construct a new episode over an empty (not-yet-populated) time window.
    ///
    /// # Errors
    /// Returns [`Error::DataValidation`] if `summary` is empty.
    pub fn new(
        session_id: impl Into<String>,
        summary: impl Into<String>,
        strategy: ConsolidationStrategy,
    ) -> Result<Self> {
        let summary = summary.into();
        if summary.is_empty() {
            return Err(Error::DataValidation("Episode summary cannot be empty".to_string()));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            summary,
            source_fact_ids: Vec::new(),
            strategy,
            embedding: None,
            vector_id: None,
            entities: Vec::new(),
            topics: Vec::new(),
            importance: 0.0,
            related_episode_ids: Vec::new(),
            window_start: now,
            window_end: now,
            fact_valid_from: now,
            fact_valid_to: None,
            access_count: 0,
            created_at: now,
        })
    }

    /// Whether this episode was valid (not yet superseded) at time `t`,
    /// per the bi-temporal query spec (§4.2 `query_temporal`).
    #[must_use]
    pub fn valid_at(&self, t: DateTime<Utc>) -> bool {
        self.fact_valid_from <= t && self.fact_valid_to.is_none_or(|end| end > t)
    }
}

// ============================================================================
// L4: synthesized knowledge document
// ============================================================================

/// A synthesized, durable knowledge document, the unit stored at L4
/// `SemanticMemory`.
///
/// # Examples
///
/// ```
/// use memory_core::{KnowledgeDocument, KnowledgeType, Category, SynthesisMethod};
///
/// let doc = KnowledgeDocument::new(
///     "Deployment Policy",
///     "Deploys happen Tuesdays 2-4pm UTC; rollbacks require on-call sign-off.",
///     KnowledgeType::Rule,
///     Category::Operational,
///     SynthesisMethod::LlmSynthesized,
/// ).unwrap();
/// assert_eq!(doc.synthesis_method, SynthesisMethod::LlmSynthesized);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    /// Unique identifier.
    pub id: Uuid,
    /// Short human-readable title.
    pub title: String,
    /// Synthesized body text.
    pub body: String,
    /// What kind of knowledge this document represents.
    pub knowledge_type: KnowledgeType,
    /// Coarse business-domain classification.
    pub category: Category,
    /// Free-form tags for faceted search.
    pub tags: std::collections::BTreeSet<String>,
    /// Domain partition this document belongs to (spec §4.8), used to
    /// select a `DomainSchema` for filter/boost construction.
    pub domain: Option<String>,
    /// Domain-specific metadata facets (schema defined by `domain_config`).
    pub facets: serde_json::Value,
    /// Ids of the L3 episodes this document was synthesized from.
    pub source_episode_ids: Vec<Uuid>,
    /// Ids of episodes providing indirect provenance (e.g. episodes
    /// related to, but not directly synthesized into, this document).
    pub provenance_links: Vec<Uuid>,
    /// Which path produced this document.
    pub synthesis_method: SynthesisMethod,
    /// Confidence in the synthesis, `[0, 1]`. Rule-based fallback
    /// documents are capped at 0.4 per spec §4.4.3.
    pub confidence_score: f32,
    /// Caller feedback signal, adjusted via `update_usefulness`. Not
    /// bounded to `[0, 1]`: a running score that biases future ranking.
    pub usefulness_score: f32,
    /// Number of times this document has been retrieved. Monotonically
    /// non-decreasing (spec §3 invariant).
    pub access_count: u32,
    /// Number of times this document's content has been independently
    /// corroborated by a later Distillation pass.
    pub validation_count: u32,
    /// Ids of existing L4 documents this one was flagged as conflicting
    /// with during synthesis (near-identical or contradictory content).
    pub conflicts_with: Vec<Uuid>,
    /// Trigram-overlap-based divergence from the nearest existing
    /// document at synthesis time, `[0, 1]`, higher is more novel.
    pub novelty_score: f32,
    /// When the document was created.
    pub created_at: DateTime<Utc>,
    /// When the document was last updated (re-synthesis).
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeDocument {
    /// Construct a new knowledge document with default confidence and
    /// an empty facet/tag set.
    ///
    /// # Errors
    /// Returns [`Error::DataValidation`] if `title` or `body` is empty.
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        knowledge_type: KnowledgeType,
        category: Category,
        synthesis_method: SynthesisMethod,
    ) -> Result<Self> {
        let title = title.into();
        let body = body.into();
        if title.is_empty() || body.is_empty() {
            return Err(Error::DataValidation(
                "KnowledgeDocument requires non-empty title and body".to_string(),
            ));
        }
        let confidence_score = match synthesis_method {
            SynthesisMethod::LlmSynthesized => 0.8,
            SynthesisMethod::RuleBasedFallback => 0.4,
        };
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            title,
            body,
            knowledge_type,
            category,
            tags: std::collections::BTreeSet::new(),
            domain: None,
            facets: serde_json::Value::Object(serde_json::Map::new()),
            source_episode_ids: Vec::new(),
            provenance_links: Vec::new(),
            synthesis_method,
            confidence_score,
            usefulness_score: 0.0,
            access_count: 0,
            validation_count: 0,
            conflicts_with: Vec::new(),
            novelty_score: 1.0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply caller feedback to the running usefulness score. Last-writer-wins
    /// under concurrent callers (spec §5 L4 single-writer-per-id policy).
    pub fn update_usefulness(&mut self, delta: f32) {
        self.usefulness_score += delta;
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Query surface types
// ============================================================================

/// Weights applied when merging per-tier query results in
/// `query_memory` (spec §4.6). Auto-renormalized to sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchWeights {
    /// Weight given to L2 working-memory matches.
    pub working_memory: f32,
    /// Weight given to L3 episodic-memory matches.
    pub episodic_memory: f32,
    /// Weight given to L4 semantic-memory matches.
    pub semantic_memory: f32,
}

impl Default for SearchWeights {
    fn default() -> Self {
        Self {
            working_memory: 0.3,
            episodic_memory: 0.5,
            semantic_memory: 0.2,
        }
    }
}

impl SearchWeights {
    /// Normalize the three weights so they sum to 1.0.
    ///
    /// Falls back to [`SearchWeights::default`] if all three are zero.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let total = self.working_memory + self.episodic_memory + self.semantic_memory;
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            working_memory: self.working_memory / total,
            episodic_memory: self.episodic_memory / total,
            semantic_memory: self.semantic_memory / total,
        }
    }
}

/// A topically coherent slice of consecutive turns, produced by the
/// `TopicSegmenter` sub-component of the Promotion Engine. Lives only
/// as intermediate input to the `FactExtractor` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSegment {
    /// Turns belonging to this segment, in order.
    pub turn_ids: Vec<Uuid>,
    /// Indices of `turn_ids` into the original batch, preserved so
    /// extracted facts can inherit a monotonic ordering (spec §5).
    pub turn_indices: Vec<usize>,
    /// Segmenter's label for the segment's topic.
    pub topic: String,
    /// Narrative summary of the segment.
    pub summary: String,
    /// Bullet-point key facts the segmenter noticed, passed to the
    /// `FactExtractor` as a hint.
    pub key_points: Vec<String>,
    /// Segment-level certainty estimate, feeds the CIAR pre-filter.
    pub certainty: f32,
    /// Segment-level impact estimate, feeds the CIAR pre-filter.
    pub impact: f32,
    /// Distinct speakers participating in the segment.
    pub participant_count: usize,
    /// Number of turns in the segment.
    pub message_count: usize,
    /// Free-form description of when the segment occurred relative to
    /// the batch (e.g. "start of session", "after a 2-day gap").
    pub temporal_context: String,
}

impl TopicSegment {
    /// Compute the segment-level CIAR pre-filter score (spec §4.4.1 step 3).
    #[must_use]
    pub fn prefilter_score(&self, batch_start: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
        crate::ciar::score(
            self.certainty,
            self.impact,
            batch_start,
            now,
            0,
            crate::types::constants::defaults::CIAR_AGE_DECAY_LAMBDA,
            crate::types::constants::defaults::CIAR_RECENCY_BOOST_ALPHA,
        )
        .score
    }
}

/// A merged context block returned by `get_context_block`, combining
/// the most relevant items from every tier into one payload suitable
/// for injection into an LLM prompt (spec §3). Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBlock {
    /// Recent raw turns from L1, ordered oldest-first.
    pub recent_turns: Vec<Turn>,
    /// High-CIAR facts from L2, ordered by descending `ciar_score`.
    pub facts: Vec<Fact>,
    /// Number of turns included (redundant with `recent_turns.len()`,
    /// kept as its own field per spec §3 so callers needn't compute it).
    pub turn_count: usize,
    /// Number of facts included.
    pub fact_count: usize,
    /// Approximate token budget consumed: `ceil(len(text) / 4)`.
    pub estimated_tokens: usize,
    /// When this block was assembled.
    pub assembled_at: DateTime<Utc>,
}

impl ContextBlock {
    /// Render the block as a prompt-ready text section, turns first
    /// (chronological), then facts ranked by significance.
    #[must_use]
    pub fn to_prompt_text(&self) -> String {
        let mut out = String::new();
        out.push_str("# Recent conversation\n");
        for turn in &self.recent_turns {
            out.push_str(&format!("- {}: {}\n", turn.speaker, turn.content));
        }
        out.push_str("\n# Known facts\n");
        for fact in &self.facts {
            out.push_str(&format!("- ({:.2}) {}\n", fact.ciar_score, fact.statement));
        }
        out
    }
}

/// Estimate a token count as `ceil(len(text) / 4)`, the approximation
/// spec §3/§4.6 uses throughout for `ContextBlock.estimated_tokens`.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// One of the four memory tiers.
///
/// Used wherever code needs to name a tier generically — telemetry
/// payloads, the unified surface's `store_memory` auto-selection, the
/// Wake-Up Sweep's per-tier recovery loop.
///
/// # Examples
///
/// ```
/// use memory_core::Tier;
///
/// let tier = Tier::WorkingMemory;
/// assert_eq!(tier.to_string(), "l2_working_memory");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// L1: raw conversation turns, short retention.
    ActiveContext,
    /// L2: extracted facts, medium retention.
    WorkingMemory,
    /// L3: consolidated episodes, long retention.
    EpisodicMemory,
    /// L4: synthesized knowledge documents, durable retention.
    SemanticMemory,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Tier::ActiveContext => "l1_active_context",
            Tier::WorkingMemory => "l2_working_memory",
            Tier::EpisodicMemory => "l3_episodic_memory",
            Tier::SemanticMemory => "l4_semantic_memory",
        };
        write!(f, "{s}")
    }
}

/// Which clustering path produced an [`crate::Episode`] during
/// Consolidation (spec §9 Open Question: clustering strategy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsolidationStrategy {
    /// Facts grouped purely by arrival-time window.
    TimeWindow,
    /// Time-window buckets further split by embedding sub-cluster.
    EmbeddingSubcluster,
}

/// Which path produced a [`crate::KnowledgeDocument`] during Distillation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynthesisMethod {
    /// Synthesized by an LLM call.
    LlmSynthesized,
    /// LLM call failed or returned an unparseable response; produced by
    /// the rule-based fallback (concatenation + heuristic extraction).
    RuleBasedFallback,
}

/// Task types dispatched to the LLM client (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LlmTask {
    /// Extract structured facts from a topic segment.
    FactExtraction,
    /// Split a turn window into topically coherent segments.
    TopicSegmentation,
    /// Summarize a cluster of facts into an episode narrative.
    EpisodeSummarization,
    /// Synthesize a cluster of episodes into a knowledge document.
    KnowledgeSynthesis,
    /// Produce a dense embedding vector for text.
    Embedding,
}

impl std::fmt::Display for LlmTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LlmTask::FactExtraction => "fact_extraction",
            LlmTask::TopicSegmentation => "topic_segmentation",
            LlmTask::EpisodeSummarization => "episode_summarization",
            LlmTask::KnowledgeSynthesis => "knowledge_synthesis",
            LlmTask::Embedding => "embedding",
        };
        write!(f, "{s}")
    }
}

/// Outcome of a single item processed during a lifecycle cycle, used to
/// build a [`crate::engines::CycleReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemOutcome {
    /// Item processed and promoted/consolidated/distilled successfully.
    Succeeded,
    /// Item failed and was left for a later retry.
    Failed,
    /// Item was below threshold or otherwise intentionally skipped.
    Skipped,
}

/// What triggered a lifecycle engine to run a cycle (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// A scheduled/periodic sweep.
    Scheduled,
    /// Triggered synchronously by a threshold crossing (e.g. queue depth).
    ThresholdCrossed,
    /// Triggered manually via the unified surface's `run_*_cycle` call.
    Manual,
    /// Triggered by the Wake-Up Sweep on startup.
    Recovery,
}

/// The kind of statement a [`crate::Fact`] represents (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactType {
    Preference,
    Constraint,
    Entity,
    Mention,
    Relationship,
    Event,
    Instruction,
}

impl std::fmt::Display for FactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FactType::Preference => "preference",
            FactType::Constraint => "constraint",
            FactType::Entity => "entity",
            FactType::Mention => "mention",
            FactType::Relationship => "relationship",
            FactType::Event => "event",
            FactType::Instruction => "instruction",
        };
        write!(f, "{s}")
    }
}

/// Coarse business-domain classification shared by [`crate::Fact`] and
/// [`crate::KnowledgeDocument`] (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Personal,
    Business,
    Technical,
    Operational,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Personal => "personal",
            Category::Business => "business",
            Category::Technical => "technical",
            Category::Operational => "operational",
        };
        write!(f, "{s}")
    }
}

/// The kind of document a Distillation synthesis produced (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnowledgeType {
    Summary,
    Insight,
    Pattern,
    Recommendation,
    Rule,
}

impl std::fmt::Display for KnowledgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            KnowledgeType::Summary => "summary",
            KnowledgeType::Insight => "insight",
            KnowledgeType::Pattern => "pattern",
            KnowledgeType::Recommendation => "recommendation",
            KnowledgeType::Rule => "rule",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle telemetry event kinds (spec §3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEventType {
    TierAccess,
    SignificanceScored,
    FactPromoted,
    ConsolidationStarted,
    ConsolidationCompleted,
    FactsClustered,
    EpisodeCreated,
    DistillationStarted,
    DistillationCompleted,
    KnowledgeCreated,
}

impl std::fmt::Display for LifecycleEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleEventType::TierAccess => "tier_access",
            LifecycleEventType::SignificanceScored => "significance_scored",
            LifecycleEventType::FactPromoted => "fact_promoted",
            LifecycleEventType::ConsolidationStarted => "consolidation_started",
            LifecycleEventType::ConsolidationCompleted => "consolidation_completed",
            LifecycleEventType::FactsClustered => "facts_clustered",
            LifecycleEventType::EpisodeCreated => "episode_created",
            LifecycleEventType::DistillationStarted => "distillation_started",
            LifecycleEventType::DistillationCompleted => "distillation_completed",
            LifecycleEventType::KnowledgeCreated => "knowledge_created",
        };
        write!(f, "{s}")
    }
}

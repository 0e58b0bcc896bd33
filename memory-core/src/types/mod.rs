// ============================================================================
// Type Definitions
//
// Split into submodules: `structs` for the core data model (Turn, Fact,
// Episode, KnowledgeDocument, ...), `enums` for tier/task/outcome
// vocabularies, `config` for per-component configuration, `constants` for
// shared defaults and naming.
// ============================================================================

pub mod config;
pub mod constants;
pub mod enums;
pub mod structs;

pub use config::{
    ConcurrencyConfig, ConsolidationEngineConfig, DistillationEngineConfig, L1Config, L2Config,
    L3Config, L4Config, PromotionEngineConfig, RetryConfig, SearchWeightsConfig, SystemConfig,
    TelemetryStreamConfig,
};
pub use enums::{
    Category, ConsolidationStrategy, FactType, ItemOutcome, KnowledgeType, LifecycleEventType,
    LlmTask, SynthesisMethod, Tier, Trigger,
};
pub use structs::{
    estimate_tokens, ContextBlock, Entity, Episode, Fact, KnowledgeDocument, SearchWeights,
    TopicSegment, Turn,
};

#[cfg(test)]
mod tests;

//! Tests for memory-core types.

use super::*;
use chrono::Utc;

#[test]
fn turn_new_rejects_empty_fields() {
    assert!(Turn::new("", "user", "hi").is_err());
    assert!(Turn::new("session-1", "", "hi").is_err());
    assert!(Turn::new("session-1", "user", "").is_err());
}

#[test]
fn turn_new_populates_defaults() {
    let turn = Turn::new("session-1", "user", "hello").unwrap();
    assert_eq!(turn.session_id, "session-1");
    assert_eq!(turn.speaker, "user");
    assert_eq!(turn.content, "hello");
    assert!(turn.speaker_confidence.is_none());
    assert!(turn.is_user());
}

#[test]
fn fact_new_rejects_empty_statement() {
    assert!(Fact::new("session-1", "", FactType::Preference, Category::Personal, 0.5, 0.5).is_err());
}

#[test]
fn fact_new_rejects_out_of_range_scores() {
    assert!(
        Fact::new("session-1", "stmt", FactType::Preference, Category::Personal, 1.5, 0.5).is_err()
    );
    assert!(
        Fact::new("session-1", "stmt", FactType::Preference, Category::Personal, 0.5, -0.1).is_err()
    );
}

#[test]
fn fact_new_accepts_boundary_scores_and_seeds_ciar() {
    let fact =
        Fact::new("session-1", "stmt", FactType::Constraint, Category::Operational, 0.0, 1.0)
            .unwrap();
    assert!((fact.ciar_score - 0.0).abs() < 1e-6);
    assert_eq!(fact.access_count, 0);
}

#[test]
fn fact_recompute_ciar_reflects_access_count() {
    let mut fact =
        Fact::new("session-1", "stmt", FactType::Constraint, Category::Operational, 0.8, 0.8)
            .unwrap();
    let before = fact.ciar_score;
    fact.access_count = 50;
    fact.recompute_ciar(Utc::now(), 0.1, 0.05);
    assert!(fact.ciar_score >= before);
}

#[test]
fn episode_new_rejects_empty_summary() {
    assert!(Episode::new("session-1", "", ConsolidationStrategy::TimeWindow).is_err());
}

#[test]
fn episode_new_starts_with_empty_window_and_open_validity() {
    let episode =
        Episode::new("session-1", "summary text", ConsolidationStrategy::EmbeddingSubcluster)
            .unwrap();
    assert_eq!(episode.window_start, episode.window_end);
    assert!(episode.source_fact_ids.is_empty());
    assert_eq!(episode.strategy, ConsolidationStrategy::EmbeddingSubcluster);
    assert!(episode.fact_valid_to.is_none());
    assert!(episode.valid_at(Utc::now()));
}

#[test]
fn knowledge_document_confidence_tracks_synthesis_method() {
    let llm_doc = KnowledgeDocument::new(
        "title",
        "body",
        KnowledgeType::Summary,
        Category::Business,
        SynthesisMethod::LlmSynthesized,
    )
    .unwrap();
    assert!((llm_doc.confidence_score - 0.8).abs() < f32::EPSILON);

    let fallback_doc = KnowledgeDocument::new(
        "title",
        "body",
        KnowledgeType::Summary,
        Category::Business,
        SynthesisMethod::RuleBasedFallback,
    )
    .unwrap();
    assert!((fallback_doc.confidence_score - 0.4).abs() < f32::EPSILON);
}

#[test]
fn knowledge_document_rejects_empty_title_or_body() {
    assert!(KnowledgeDocument::new(
        "",
        "body",
        KnowledgeType::Summary,
        Category::Business,
        SynthesisMethod::LlmSynthesized
    )
    .is_err());
    assert!(KnowledgeDocument::new(
        "title",
        "",
        KnowledgeType::Summary,
        Category::Business,
        SynthesisMethod::LlmSynthesized
    )
    .is_err());
}

#[test]
fn knowledge_document_update_usefulness_accumulates() {
    let mut doc = KnowledgeDocument::new(
        "title",
        "body",
        KnowledgeType::Insight,
        Category::Technical,
        SynthesisMethod::LlmSynthesized,
    )
    .unwrap();
    doc.update_usefulness(0.5);
    doc.update_usefulness(0.25);
    assert!((doc.usefulness_score - 0.75).abs() < 1e-6);
}

#[test]
fn search_weights_default_matches_spec_ratios() {
    let weights = SearchWeights::default();
    assert!((weights.working_memory - 0.3).abs() < 1e-6);
    assert!((weights.episodic_memory - 0.5).abs() < 1e-6);
    assert!((weights.semantic_memory - 0.2).abs() < 1e-6);
}

#[test]
fn search_weights_normalize_to_unit_sum() {
    let weights = SearchWeights {
        working_memory: 1.0,
        episodic_memory: 1.0,
        semantic_memory: 2.0,
    };
    let normalized = weights.normalized();
    let sum = normalized.working_memory + normalized.episodic_memory + normalized.semantic_memory;
    assert!((sum - 1.0).abs() < 1e-6);
    assert!((normalized.semantic_memory - 0.5).abs() < 1e-6);
}

#[test]
fn search_weights_fall_back_to_default_when_all_zero() {
    let weights = SearchWeights {
        working_memory: 0.0,
        episodic_memory: 0.0,
        semantic_memory: 0.0,
    };
    let normalized = weights.normalized();
    assert!((normalized.working_memory - SearchWeights::default().working_memory).abs() < 1e-6);
}

#[test]
fn tier_display_uses_spec_naming() {
    assert_eq!(Tier::ActiveContext.to_string(), "l1_active_context");
    assert_eq!(Tier::SemanticMemory.to_string(), "l4_semantic_memory");
}

#[test]
fn lifecycle_event_type_display_uses_spec_naming() {
    assert_eq!(LifecycleEventType::FactPromoted.to_string(), "fact_promoted");
    assert_eq!(LifecycleEventType::KnowledgeCreated.to_string(), "knowledge_created");
}

#[test]
fn estimate_tokens_rounds_up() {
    assert_eq!(estimate_tokens(""), 0);
    assert_eq!(estimate_tokens("abc"), 1);
    assert_eq!(estimate_tokens("abcde"), 2);
}

#[test]
fn system_config_from_env_falls_back_without_panicking() {
    let config = config::SystemConfig::from_env();
    assert!(config.l2.promotion_threshold >= 0.0 && config.l2.promotion_threshold <= 1.0);
}

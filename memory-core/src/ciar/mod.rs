//! CIAR significance scoring (spec §4.3).
//!
//! `ciar_score = clamp01((certainty * impact) * age_decay * recency_boost)`
//! where `age_decay = 2^(-lambda * age_days)` and
//! `recency_boost = 1 + alpha * access_count`.
//!
//! Pure free functions, no storage or I/O, so the scorer is cheap to call
//! from the Promotion Engine's segment-level pre-filter as well as from
//! Consolidation/Distillation eligibility checks.

use chrono::{DateTime, Utc};

/// Breakdown of a CIAR score into its components, useful for logging and
/// for explaining why an item was or wasn't promoted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CiarBreakdown {
    pub certainty: f32,
    pub impact: f32,
    pub age_decay: f32,
    pub recency_boost: f32,
    pub score: f32,
}

/// Age-based decay factor, `2^(-lambda * age_days)`.
#[must_use]
pub fn age_decay(age_days: f64, lambda: f64) -> f32 {
    2.0_f64.powf(-lambda * age_days.max(0.0)) as f32
}

/// Access-count-based recency boost, `1 + alpha * access_count`.
#[must_use]
pub fn recency_boost(access_count: u32, alpha: f64) -> f32 {
    (1.0 + alpha * f64::from(access_count)) as f32
}

/// Compute the full CIAR score for an item, clamped to `[0, 1]`.
///
/// `created_at`/`now` are used to derive the item's age in days; a
/// `now` before `created_at` (clock skew) is treated as zero age.
#[must_use]
pub fn score(
    certainty: f32,
    impact: f32,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    access_count: u32,
    lambda: f64,
    alpha: f64,
) -> CiarBreakdown {
    let age_days = (now - created_at).num_seconds().max(0) as f64 / 86_400.0;
    let decay = age_decay(age_days, lambda);
    let boost = recency_boost(access_count, alpha);
    let raw = certainty * impact * decay * boost;
    CiarBreakdown {
        certainty,
        impact,
        age_decay: decay,
        recency_boost: boost,
        score: raw.clamp(0.0, 1.0),
    }
}

/// Whether a computed score clears a promotion/consolidation threshold.
#[must_use]
pub fn clears_threshold(breakdown: &CiarBreakdown, threshold: f32) -> bool {
    breakdown.score >= threshold
}

/// Full explanation of a CIAR score: the breakdown, whether it clears
/// `threshold`, and which tier the item should be promoted into if so.
/// Used by diagnostic/debug surfaces and by the Promotion Engine to log
/// why a fact was or wasn't promoted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CiarExplanation {
    pub breakdown: CiarBreakdown,
    pub promotable: bool,
    pub recommended_tier: crate::types::enums::Tier,
}

/// Compute a full [`CiarExplanation`] for an item under consideration for
/// promotion from `from_tier` into the next tier up, given the current
/// tier's promotion `threshold`.
#[must_use]
pub fn explain(
    certainty: f32,
    impact: f32,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    access_count: u32,
    lambda: f64,
    alpha: f64,
    threshold: f32,
    from_tier: crate::types::enums::Tier,
) -> CiarExplanation {
    use crate::types::enums::Tier;

    let breakdown = score(certainty, impact, created_at, now, access_count, lambda, alpha);
    let promotable = clears_threshold(&breakdown, threshold);
    let next_tier = match from_tier {
        Tier::ActiveContext => Tier::WorkingMemory,
        Tier::WorkingMemory => Tier::EpisodicMemory,
        Tier::EpisodicMemory => Tier::SemanticMemory,
        Tier::SemanticMemory => Tier::SemanticMemory,
    };
    CiarExplanation {
        breakdown,
        promotable,
        recommended_tier: if promotable { next_tier } else { from_tier },
    }
}

//! Cross-tier hybrid search (spec §4.6).
//!
//! The unified surface's `query_memory` runs the same query against L2,
//! L3, and L4 independently, then merges the three ranked lists into
//! one composite ordering. Each tier's native relevance score lives on
//! a different scale (FTS token-overlap vs. cosine similarity vs.
//! trigram similarity), so merging raw scores would let whichever tier
//! happens to produce the largest numbers dominate. This module
//! min-max normalizes each tier's scores to `[0, 1]` before applying
//! [`crate::types::SearchWeights`].

use crate::types::{SearchWeights, Tier};

/// One result from a single tier's native search, before cross-tier
/// merging.
#[derive(Debug, Clone)]
pub struct TierHit<T> {
    pub tier: Tier,
    pub item: T,
    pub raw_score: f32,
}

/// One result after cross-tier normalization and weighting.
#[derive(Debug, Clone)]
pub struct RankedHit<T> {
    pub tier: Tier,
    pub item: T,
    pub normalized_score: f32,
    pub composite_score: f32,
}

/// Min-max normalize a tier's raw scores to `[0, 1]`.
///
/// A tier with zero or one hit (no spread to normalize against) maps
/// every hit to `1.0` rather than dividing by zero — a single match is
/// the best match that tier has to offer.
fn normalize(raw_scores: &[f32]) -> Vec<f32> {
    if raw_scores.is_empty() {
        return Vec::new();
    }
    let min = raw_scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = raw_scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let spread = max - min;
    if spread <= f32::EPSILON {
        return raw_scores.iter().map(|_| 1.0).collect();
    }
    raw_scores.iter().map(|s| (s - min) / spread).collect()
}

fn weight_for(tier: Tier, weights: &SearchWeights) -> f32 {
    match tier {
        Tier::WorkingMemory => weights.working_memory,
        Tier::EpisodicMemory => weights.episodic_memory,
        Tier::SemanticMemory => weights.semantic_memory,
        Tier::ActiveContext => 0.0,
    }
}

/// Merge per-tier hit lists into one composite-ranked list, normalizing
/// each tier's scores independently before applying `weights`
/// (auto-renormalized via [`SearchWeights::normalized`] so a caller who
/// zeroes out a tier or supplies an unnormalized triple still gets a
/// sane ordering).
///
/// # Examples
///
/// ```
/// use memory_core::search::{merge_tiers, TierHit};
/// use memory_core::types::{SearchWeights, Tier};
///
/// let l2 = vec![TierHit { tier: Tier::WorkingMemory, item: "fact", raw_score: 0.4 }];
/// let l3 = vec![TierHit { tier: Tier::EpisodicMemory, item: "episode", raw_score: 0.9 }];
/// let merged = merge_tiers(vec![l2, l3], &SearchWeights::default(), 10);
/// assert_eq!(merged.len(), 2);
/// ```
#[must_use]
pub fn merge_tiers<T>(tier_hits: Vec<Vec<TierHit<T>>>, weights: &SearchWeights, limit: usize) -> Vec<RankedHit<T>> {
    let weights = weights.normalized();
    let mut merged = Vec::new();

    for hits in tier_hits {
        if hits.is_empty() {
            continue;
        }
        let raw: Vec<f32> = hits.iter().map(|h| h.raw_score).collect();
        let normalized = normalize(&raw);
        let tier = hits[0].tier;
        let weight = weight_for(tier, &weights);
        for (hit, norm) in hits.into_iter().zip(normalized) {
            merged.push(RankedHit {
                tier: hit.tier,
                item: hit.item,
                normalized_score: norm,
                composite_score: norm * weight,
            });
        }
    }

    merged.sort_by(|a, b| b.composite_score.partial_cmp(&a.composite_score).unwrap_or(std::cmp::Ordering::Equal));
    merged.truncate(limit);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_single_hit_tier_scores_as_best_match() {
        assert_eq!(normalize(&[0.42]), vec![1.0]);
    }

    #[test]
    fn normalize_spreads_scores_across_unit_range() {
        let normalized = normalize(&[0.0, 0.5, 1.0]);
        assert!(normalized[0].abs() < 1e-6);
        assert!((normalized[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn merge_tiers_respects_weighting_over_raw_magnitude() {
        let l2 = vec![TierHit { tier: Tier::WorkingMemory, item: "low-weight-tier-best-hit", raw_score: 100.0 }];
        let l3 = vec![
            TierHit { tier: Tier::EpisodicMemory, item: "high-weight-tier-best-hit", raw_score: 0.9 },
            TierHit { tier: Tier::EpisodicMemory, item: "high-weight-tier-worst-hit", raw_score: 0.1 },
        ];
        let weights = SearchWeights { working_memory: 0.1, episodic_memory: 0.9, semantic_memory: 0.0 };
        let merged = merge_tiers(vec![l2, l3], &weights, 10);
        assert_eq!(merged[0].item, "high-weight-tier-best-hit");
    }

    #[test]
    fn merge_tiers_truncates_to_limit() {
        let hits = vec![TierHit { tier: Tier::WorkingMemory, item: 1, raw_score: 0.5 }; 5];
        let merged = merge_tiers(vec![hits], &SearchWeights::default(), 2);
        assert_eq!(merged.len(), 2);
    }
}

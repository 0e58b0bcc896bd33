//! Lifecycle engines: Promotion (L1->L2), Consolidation (L2->L3),
//! Distillation (L3->L4) (spec §4.4).
//!
//! Every engine implements [`LifecycleEngine`] so the unified surface's
//! `run_*_cycle` methods and the Wake-Up Sweep can drive them uniformly,
//! and every cycle — successful or not — produces a [`CycleReport`] for
//! the lifecycle telemetry stream.

mod consolidation;
mod distillation;
mod promotion;

pub use consolidation::ConsolidationEngine;
pub use distillation::{DistillationEngine, KnowledgeSynthesizer};
pub use promotion::{FactExtractor, PromotionEngine, TopicSegmenter};

use crate::types::enums::{ItemOutcome, Trigger};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Outcome of processing one item within a cycle, attributed to its id
/// for audit/debug.
#[derive(Debug, Clone)]
pub struct ItemResult {
    pub item_id: String,
    pub outcome: ItemOutcome,
    pub detail: Option<String>,
}

/// Summary of one lifecycle engine run, the payload logged to the
/// lifecycle telemetry stream (spec §4.7).
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub items: Vec<ItemResult>,
}

impl CycleReport {
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.items.iter().filter(|i| i.outcome == ItemOutcome::Succeeded).count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.items.iter().filter(|i| i.outcome == ItemOutcome::Failed).count()
    }
}

/// Uniform entry point every lifecycle engine implements.
#[async_trait]
pub trait LifecycleEngine: Send + Sync {
    /// Stable engine name (`"promotion"`, `"consolidation"`, `"distillation"`),
    /// used in telemetry and logging.
    fn name(&self) -> &'static str;

    /// Run one cycle over the given session, returning a report even on
    /// partial failure — individual item failures are recorded as
    /// [`ItemOutcome::Failed`] rather than aborting the whole cycle.
    ///
    /// # Errors
    /// Returns an error only if the cycle could not start at all (e.g.
    /// the source tier is unreachable).
    async fn run_cycle(&self, session_id: &str, trigger: Trigger) -> Result<CycleReport>;
}

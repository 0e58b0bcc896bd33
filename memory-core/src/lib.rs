#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unused_self)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::borrowed_box)]
#![allow(clippy::float_cmp)]
#![allow(clippy::ref_option)]

//! # Memory Core
//!
//! A hierarchical long-term memory substrate for LLM-driven multi-agent
//! conversations: four storage tiers of increasing durability and
//! decreasing granularity, connected by three background lifecycle
//! engines, behind one unified query surface.
//!
//! ## Module Organization
//!
//! - [`types`]: Shared data model (`Turn`, `Fact`, `Episode`,
//!   `KnowledgeDocument`) and configuration.
//! - [`ciar`]: Certainty/Impact/Age/Recency significance scoring.
//! - [`storage`]: Backend-agnostic adapter contracts (`KvAdapter`,
//!   `RelationalAdapter`, `VectorAdapter`, `GraphAdapter`,
//!   `FullTextAdapter`) plus an in-memory reference implementation and
//!   a shared circuit breaker.
//! - [`tiers`]: `ActiveContext` (L1), `WorkingMemory` (L2),
//!   `EpisodicMemory` (L3), `SemanticMemory` (L4) — thin, typed wrappers
//!   over the storage adapters.
//! - [`engines`]: `PromotionEngine` (L1->L2), `ConsolidationEngine`
//!   (L2->L3), `DistillationEngine` (L3->L4).
//! - [`llm`]: Multi-provider LLM client contract with rate limiting,
//!   circuit breaking, and ordered fallback.
//! - [`namespace`]: Session-key colocation, the lifecycle stream key,
//!   and the distributed lease guard used by lifecycle engines.
//! - [`retry`]: Exponential-backoff retry policy shared by storage
//!   adapters and the LLM client.
//! - [`telemetry`]: In-process counters/histograms/gauges (ambient
//!   observability) plus the lifecycle event stream consumers read from.
//! - [`search`]: Cross-tier hybrid ranking used by the unified surface.
//! - [`domain`]: YAML-driven per-domain L4 metadata schema and ranking
//!   boosts.
//! - [`skills`]: Optional markdown-manifest policy layer declaring
//!   which tools a skill may invoke.
//! - [`surface`]: The unified `MemorySurface` facade tying every tier,
//!   engine, and cross-cutting concern together into the single entry
//!   point callers use.
//!
//! ## Quick Start
//!
//! ```no_run
//! use memory_core::storage::memory::{
//!     MemoryKvAdapter, MemoryRelationalAdapter, MemoryVectorAdapter,
//!     MemoryGraphAdapter, MemoryFullTextAdapter,
//! };
//! use memory_core::surface::MemorySurface;
//! use memory_core::types::Turn;
//! use std::sync::Arc;
//!
//! # async fn example(llm: std::sync::Arc<dyn memory_core::llm::LlmClient>) -> memory_core::Result<()> {
//! let surface = MemorySurface::new_in_memory(llm, memory_core::types::config::SystemConfig::default());
//!
//! let turn = Turn::new("session-1", "user", "I prefer dark mode")?;
//! surface.ingest(&turn).await?;
//!
//! let context = surface.get_context_block("session-1", 0.0, 20, 50).await?;
//! println!("{}", context.to_prompt_text());
//! # Ok(())
//! # }
//! ```

pub mod ciar;
pub mod domain;
pub mod engines;
pub mod error;
pub mod llm;
pub mod namespace;
pub mod retry;
pub mod search;
pub mod skills;
pub mod storage;
pub mod surface;
pub mod telemetry;
pub mod tiers;
pub mod types;

pub use error::{Error, Result};
pub use types::{Category, Episode, Fact, FactType, KnowledgeDocument, Tier, Turn};

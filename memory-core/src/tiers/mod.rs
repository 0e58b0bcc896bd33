//! Tier wrappers (spec §4.1, §3).
//!
//! Each tier wraps the generic storage-adapter trait appropriate to it
//! with the domain logic the spec assigns that tier: windowing for L1,
//! CIAR bookkeeping for L2, dual-index writes for L3, domain-aware
//! facets for L4. Lifecycle engines and the unified surface depend on
//! these wrappers, never on the raw adapters.

mod active_context;
mod episodic_memory;
mod semantic_memory;
mod working_memory;

pub use active_context::ActiveContext;
pub use episodic_memory::EpisodicMemory;
pub use semantic_memory::{L4Filters, SemanticMemory};
pub use working_memory::WorkingMemory;

//! Global constants for memory-core
//!
//! Centralizes magic numbers used across tiers, engines, and the
//! storage/LLM adapter contracts.

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    // CIAR scoring (spec §4.3)
    pub const CIAR_AGE_DECAY_LAMBDA: f64 = 0.1;
    pub const CIAR_RECENCY_BOOST_ALPHA: f64 = 0.05;
    pub const CIAR_PROMOTION_THRESHOLD: f32 = 0.6;

    // Embedding dimension (spec §9 Open Question, resolved in DESIGN.md)
    pub const EMBEDDING_DIMENSION: usize = 768;

    // L4 near-duplicate detection (spec §9 Open Question)
    pub const NEAR_DUPLICATE_TRIGRAM_THRESHOLD: f32 = 0.8;

    // Namespace / locking (spec §9 Open Question: lock renewal interval)
    pub const LOCK_LEASE_TTL_SECONDS: u64 = 90;
    pub const LOCK_RENEWAL_INTERVAL_SECONDS: u64 = 30;

    // Telemetry stream (spec §4.7)
    pub const TELEMETRY_STREAM_MAXLEN: usize = 50_000;

    // Circuit breaker (spec §4.2, §4.4)
    pub const CIRCUIT_BREAKER_FAILURE_THRESHOLD: u32 = 5;
    pub const CIRCUIT_BREAKER_COOLDOWN_SECONDS: u64 = 60;

    // Batch processing
    pub const DEFAULT_BATCH_SIZE: usize = 100;
    pub const MAX_BATCH_SIZE: usize = 1000;

    // Timeouts (spec §5)
    pub const DEFAULT_STORAGE_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_LLM_CALL_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

    // Retry configuration
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;

    // Distillation cache (spec §4.4.3)
    pub const DISTILLATION_CACHE_TTL_SECONDS: u64 = 3600;

    // Similarity thresholds
    pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;
}

/// Error messages
pub mod errors {
    pub const TURN_NOT_FOUND: &str = "Turn not found";
    pub const FACT_NOT_FOUND: &str = "Fact not found";
    pub const EPISODE_NOT_FOUND: &str = "Episode not found";
    pub const KNOWLEDGE_DOCUMENT_NOT_FOUND: &str = "Knowledge document not found";
    pub const STORAGE_CONNECTION_FAILED: &str = "Failed to connect to storage backend";
    pub const SERIALIZATION_FAILED: &str = "Failed to serialize record";
    pub const LLM_SCHEMA_VIOLATION: &str = "LLM response did not conform to requested schema";
}

/// Database table / collection names, shared across storage adapters so
/// each backend's migration matches the others' expectations.
pub mod db {
    pub const TABLE_TURNS: &str = "turns";
    pub const TABLE_FACTS: &str = "facts";
    pub const TABLE_EPISODES: &str = "episodes";
    pub const TABLE_KNOWLEDGE: &str = "knowledge_documents";
    pub const TABLE_TELEMETRY_STREAM: &str = "lifecycle_events";

    pub const COL_ID: &str = "id";
    pub const COL_SESSION_ID: &str = "session_id";
    pub const COL_CREATED_AT: &str = "created_at";
    pub const COL_UPDATED_AT: &str = "updated_at";
}

// ============================================================================
// Configuration
// ============================================================================
//
// Each tier and lifecycle engine owns a small config struct with a
// `Default` impl and a `from_env()` constructor that reads overrides from
// environment variables, clamping to valid ranges and warning on parse
// failure rather than erroring. `SystemConfig` aggregates all of them.

use crate::types::constants::defaults;
use std::time::Duration;

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!("invalid value for {key}, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Configuration for the L1 active-context tier.
#[derive(Debug, Clone)]
pub struct L1Config {
    /// Maximum number of turns retained per session before the oldest are
    /// windowed out of the KV-backed ring buffer.
    pub max_turns_per_session: usize,
    /// Time-to-live for a turn before it expires out of L1 regardless of
    /// window occupancy.
    pub ttl_hours: u64,
    /// Whether to mirror turns into a relational backup store in addition
    /// to the primary KV ring buffer, for durability across KV restarts.
    pub enable_relational_backup: bool,
    /// Storage operation timeout.
    pub operation_timeout: Duration,
}

impl Default for L1Config {
    fn default() -> Self {
        Self {
            max_turns_per_session: 200,
            ttl_hours: 24,
            enable_relational_backup: true,
            operation_timeout: defaults::DEFAULT_STORAGE_OPERATION_TIMEOUT,
        }
    }
}

impl L1Config {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.max_turns_per_session =
            env_parse("MEMORY_L1_MAX_TURNS_PER_SESSION", config.max_turns_per_session);
        config.ttl_hours = env_parse("MEMORY_L1_TTL_HOURS", config.ttl_hours);
        config.enable_relational_backup =
            env_bool("MEMORY_L1_ENABLE_RELATIONAL_BACKUP", config.enable_relational_backup);
        config
    }
}

/// Configuration for the L2 working-memory tier.
#[derive(Debug, Clone)]
pub struct L2Config {
    /// CIAR score above which a fact is eligible for Consolidation.
    pub promotion_threshold: f32,
    /// Time-to-live for a fact before it is evicted from L2 if it never
    /// crosses `promotion_threshold`.
    pub ttl_days: u64,
    /// `alpha` in the CIAR recency-boost term, `1 + alpha * access_count`.
    pub recency_boost_alpha: f64,
    /// `lambda` in the CIAR age-decay term, `2^(-lambda * age_days)`.
    pub age_decay_lambda: f64,
    pub operation_timeout: Duration,
}

impl Default for L2Config {
    fn default() -> Self {
        Self {
            promotion_threshold: defaults::CIAR_PROMOTION_THRESHOLD,
            ttl_days: 7,
            recency_boost_alpha: defaults::CIAR_RECENCY_BOOST_ALPHA,
            age_decay_lambda: defaults::CIAR_AGE_DECAY_LAMBDA,
            operation_timeout: defaults::DEFAULT_STORAGE_OPERATION_TIMEOUT,
        }
    }
}

impl L2Config {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let threshold = env_parse("MEMORY_L2_PROMOTION_THRESHOLD", config.promotion_threshold);
        config.promotion_threshold = threshold.clamp(0.0, 1.0);
        config.ttl_days = env_parse("MEMORY_L2_TTL_DAYS", config.ttl_days);
        config.recency_boost_alpha =
            env_parse("MEMORY_L2_RECENCY_BOOST_ALPHA", config.recency_boost_alpha);
        config.age_decay_lambda = env_parse("MEMORY_L2_AGE_DECAY_LAMBDA", config.age_decay_lambda);
        config
    }
}

/// Configuration for the L3 episodic-memory tier.
#[derive(Debug, Clone)]
pub struct L3Config {
    /// Dimensionality of stored episode embeddings.
    pub embedding_dimension: usize,
    /// Width of the time window Consolidation groups facts into before
    /// producing an episode (mirrors `ConsolidationEngineConfig::time_window`
    /// but expressed in hours for operator-facing config surfaces).
    pub time_window_hours: u64,
    pub operation_timeout: Duration,
}

impl Default for L3Config {
    fn default() -> Self {
        Self {
            embedding_dimension: defaults::EMBEDDING_DIMENSION,
            time_window_hours: 24,
            operation_timeout: defaults::DEFAULT_STORAGE_OPERATION_TIMEOUT,
        }
    }
}

impl L3Config {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.embedding_dimension =
            env_parse("MEMORY_L3_EMBEDDING_DIMENSION", config.embedding_dimension);
        config.time_window_hours =
            env_parse("MEMORY_L3_TIME_WINDOW_HOURS", config.time_window_hours);
        config
    }
}

/// Configuration for the L4 semantic-memory tier.
#[derive(Debug, Clone)]
pub struct L4Config {
    /// Trigram Jaccard similarity above which two documents are treated as
    /// near-duplicates during Distillation's conflict surfacing.
    pub near_duplicate_threshold: f32,
    /// Floor confidence a synthesized document must clear to be stored,
    /// absent a domain-specific override from `domain_config_path`.
    pub default_min_confidence: f32,
    /// Path to a YAML domain-configuration file (spec §4.8). `None` means
    /// only the built-in default domain schema is available.
    pub domain_config_path: Option<String>,
    pub operation_timeout: Duration,
}

impl Default for L4Config {
    fn default() -> Self {
        Self {
            near_duplicate_threshold: defaults::NEAR_DUPLICATE_TRIGRAM_THRESHOLD,
            default_min_confidence: 0.5,
            domain_config_path: None,
            operation_timeout: defaults::DEFAULT_STORAGE_OPERATION_TIMEOUT,
        }
    }
}

impl L4Config {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let threshold =
            env_parse("MEMORY_L4_NEAR_DUPLICATE_THRESHOLD", config.near_duplicate_threshold);
        config.near_duplicate_threshold = threshold.clamp(0.0, 1.0);
        config.default_min_confidence =
            env_parse("MEMORY_L4_DEFAULT_MIN_CONFIDENCE", config.default_min_confidence);
        config.domain_config_path = std::env::var("MEMORY_L4_DOMAIN_CONFIG_PATH").ok();
        config
    }
}

/// Configuration for the Promotion engine (L1 -> L2).
#[derive(Debug, Clone)]
pub struct PromotionEngineConfig {
    /// Segment-level CIAR pre-filter: segments scoring below this are
    /// skipped before ever reaching the LLM fact extractor.
    pub segment_ciar_prefilter: f32,
    /// Number of buffered L1 turns that triggers an eager (threshold-crossed)
    /// Promotion cycle rather than waiting for the next scheduled sweep.
    pub batch_threshold: usize,
    /// Whether to fall back to rule-based extraction (keyword/regex) when
    /// the LLM call fails or the circuit breaker is open, instead of
    /// dropping the segment.
    pub enable_rule_fallback: bool,
    pub llm_call_timeout: Duration,
    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_cooldown: Duration,
}

impl Default for PromotionEngineConfig {
    fn default() -> Self {
        Self {
            segment_ciar_prefilter: 0.3,
            batch_threshold: 15,
            enable_rule_fallback: true,
            llm_call_timeout: defaults::DEFAULT_LLM_CALL_TIMEOUT,
            circuit_breaker_failure_threshold: defaults::CIRCUIT_BREAKER_FAILURE_THRESHOLD,
            circuit_breaker_cooldown: Duration::from_secs(
                defaults::CIRCUIT_BREAKER_COOLDOWN_SECONDS,
            ),
        }
    }
}

impl PromotionEngineConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let threshold = env_parse("MEMORY_PROMOTION_SEGMENT_PREFILTER", config.segment_ciar_prefilter);
        config.segment_ciar_prefilter = threshold.clamp(0.0, 1.0);
        config.batch_threshold = env_parse("MEMORY_PROMOTION_BATCH_THRESHOLD", config.batch_threshold);
        config.enable_rule_fallback =
            env_bool("MEMORY_PROMOTION_ENABLE_RULE_FALLBACK", config.enable_rule_fallback);
        config
    }
}

/// Configuration for the Consolidation engine (L2 -> L3).
#[derive(Debug, Clone)]
pub struct ConsolidationEngineConfig {
    /// Width of the time-window bucket used to group facts before
    /// embedding sub-clustering.
    pub time_window: Duration,
    /// Number of unconsolidated L2 facts that triggers an eager
    /// (threshold-crossed) Consolidation cycle.
    pub pressure_threshold: usize,
    pub llm_call_timeout: Duration,
}

impl Default for ConsolidationEngineConfig {
    fn default() -> Self {
        Self {
            time_window: Duration::from_secs(3600),
            pressure_threshold: 50,
            llm_call_timeout: defaults::DEFAULT_LLM_CALL_TIMEOUT,
        }
    }
}

impl ConsolidationEngineConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let secs = env_parse("MEMORY_CONSOLIDATION_WINDOW_SECS", config.time_window.as_secs());
        config.time_window = Duration::from_secs(secs);
        config.pressure_threshold =
            env_parse("MEMORY_CONSOLIDATION_PRESSURE_THRESHOLD", config.pressure_threshold);
        config
    }
}

/// Configuration for the Distillation engine (L3 -> L4).
#[derive(Debug, Clone)]
pub struct DistillationEngineConfig {
    pub cache_ttl: Duration,
    /// Number of unconsolidated-into-L4 L3 episodes that triggers an eager
    /// (threshold-crossed) Distillation cycle.
    pub episode_threshold: usize,
    pub llm_call_timeout: Duration,
}

impl Default for DistillationEngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(defaults::DISTILLATION_CACHE_TTL_SECONDS),
            episode_threshold: 5,
            llm_call_timeout: defaults::DEFAULT_LLM_CALL_TIMEOUT,
        }
    }
}

impl DistillationEngineConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let secs = env_parse("MEMORY_DISTILLATION_CACHE_TTL_SECS", config.cache_ttl.as_secs());
        config.cache_ttl = Duration::from_secs(secs);
        config.episode_threshold =
            env_parse("MEMORY_DISTILLATION_EPISODE_THRESHOLD", config.episode_threshold);
        config
    }
}

/// Configuration for the telemetry / lifecycle event stream (spec §4.7).
///
/// Distinct from the metrics-oriented [`crate::telemetry`] module: this
/// governs the append-only KV-backed event stream the lifecycle engines
/// publish to, not in-process counters/histograms/gauges.
#[derive(Debug, Clone)]
pub struct TelemetryStreamConfig {
    pub maxlen: usize,
    pub stream_key: String,
    /// Name of the consumer group the Wake-Up Sweep and named handlers
    /// register under, so restarts resume from a shared cursor rather
    /// than re-delivering from the start of the stream.
    pub consumer_group: String,
}

impl Default for TelemetryStreamConfig {
    fn default() -> Self {
        Self {
            maxlen: defaults::TELEMETRY_STREAM_MAXLEN,
            stream_key: "lifecycle_events".to_string(),
            consumer_group: "memory-lifecycle".to_string(),
        }
    }
}

impl TelemetryStreamConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.maxlen = env_parse("MEMORY_TELEMETRY_STREAM_MAXLEN", config.maxlen);
        config.consumer_group =
            std::env::var("MEMORY_TELEMETRY_CONSUMER_GROUP").unwrap_or(config.consumer_group);
        config
    }
}

/// Cross-tier query weighting (spec §4.6), held as config so operators can
/// retune retrieval without a redeploy.
#[derive(Debug, Clone)]
pub struct SearchWeightsConfig {
    pub working_memory: f32,
    pub episodic_memory: f32,
    pub semantic_memory: f32,
}

impl Default for SearchWeightsConfig {
    fn default() -> Self {
        Self {
            working_memory: 0.3,
            episodic_memory: 0.5,
            semantic_memory: 0.2,
        }
    }
}

impl SearchWeightsConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.working_memory = env_parse("MEMORY_SEARCH_WEIGHT_L2", config.working_memory);
        config.episodic_memory = env_parse("MEMORY_SEARCH_WEIGHT_L3", config.episodic_memory);
        config.semantic_memory = env_parse("MEMORY_SEARCH_WEIGHT_L4", config.semantic_memory);
        config
    }
}

/// Concurrency control, prevents cache/storage contention under many
/// simultaneous callers (e.g. multiple agents sharing one surface).
#[derive(Debug, Clone)]
pub struct ConcurrencyConfig {
    /// Maximum number of concurrent storage operations allowed.
    pub max_concurrent_storage_ops: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_storage_ops: 10,
        }
    }
}

impl ConcurrencyConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.max_concurrent_storage_ops =
            env_parse("MEMORY_MAX_CONCURRENT_STORAGE_OPS", config.max_concurrent_storage_ops);
        config
    }
}

/// Retry behavior shared by storage adapters and the LLM client.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(defaults::DEFAULT_RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.max_retries = env_parse("MEMORY_MAX_RETRIES", config.max_retries);
        config
    }
}

/// Top-level configuration for the memory substrate, aggregating every
/// tier and engine config plus cross-cutting concerns.
///
/// # Examples
///
/// ```
/// use memory_core::types::config::SystemConfig;
///
/// let config = SystemConfig::default();
/// assert!(config.l2.promotion_threshold > 0.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SystemConfig {
    pub l1: L1Config,
    pub l2: L2Config,
    pub l3: L3Config,
    pub l4: L4Config,
    pub promotion: PromotionEngineConfig,
    pub consolidation: ConsolidationEngineConfig,
    pub distillation: DistillationEngineConfig,
    pub telemetry_stream: TelemetryStreamConfig,
    pub search_weights: SearchWeightsConfig,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
}

impl SystemConfig {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            l1: L1Config::from_env(),
            l2: L2Config::from_env(),
            l3: L3Config::from_env(),
            l4: L4Config::from_env(),
            promotion: PromotionEngineConfig::from_env(),
            consolidation: ConsolidationEngineConfig::from_env(),
            distillation: DistillationEngineConfig::from_env(),
            telemetry_stream: TelemetryStreamConfig::from_env(),
            search_weights: SearchWeightsConfig::from_env(),
            concurrency: ConcurrencyConfig::from_env(),
            retry: RetryConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = SystemConfig::default();
        assert!(config.l2.promotion_threshold > 0.0 && config.l2.promotion_threshold < 1.0);
        assert_eq!(config.l3.embedding_dimension, 768);
    }

    #[test]
    fn env_bool_falls_back_on_missing_var() {
        std::env::remove_var("MEMORY_CONFIG_TEST_FLAG_DOES_NOT_EXIST");
        assert!(env_bool("MEMORY_CONFIG_TEST_FLAG_DOES_NOT_EXIST", true));
        assert!(!env_bool("MEMORY_CONFIG_TEST_FLAG_DOES_NOT_EXIST", false));
    }
}

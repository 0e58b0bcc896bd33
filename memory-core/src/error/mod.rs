//! Error taxonomy for the memory substrate.
//!
//! Every fallible operation across tiers, engines, storage adapters and
//! the LLM client returns [`Result`]. The taxonomy distinguishes errors a
//! caller can retry from ones it cannot, so the retry policy and circuit
//! breakers can make that decision mechanically via [`Error::is_recoverable`]
//! instead of callers inspecting error text.

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types produced by the memory substrate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A component's configuration failed validation (bad weights, an
    /// out-of-range threshold, a missing required field).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A storage adapter could not establish or maintain a connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// A record failed validation before being written (e.g. a CIAR
    /// score outside `[0, 1]`, an empty required field).
    #[error("data validation error: {0}")]
    DataValidation(String),

    /// A lookup by id found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A storage backend failed in a way expected to be transient
    /// (timeout, temporary unavailability). Recoverable.
    #[error("transient backend error: {0}")]
    TransientBackend(String),

    /// The LLM returned a response that did not conform to the
    /// requested schema and could not be repaired.
    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    /// A provider (storage or LLM) rejected the call due to rate
    /// limiting. Recoverable after backoff.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// A circuit breaker is open and is short-circuiting calls.
    #[error("circuit open: {0}")]
    CircuitOpen(String),

    /// Serialization/deserialization of a stored record failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying filesystem or network IO failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for adapter-specific failures not worth a dedicated
    /// variant (wraps the adapter crate's own error type via `anyhow`).
    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl Error {
    /// Whether a caller may retry the operation that produced this error.
    ///
    /// Mirrors spec §7's retry semantics: transient backend failures,
    /// rate limiting, and connection errors are retryable with backoff;
    /// validation, not-found, and parse failures are not (retrying would
    /// reproduce the same error).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Connection(_)
                | Error::TransientBackend(_)
                | Error::RateLimited(_)
                | Error::CircuitOpen(_)
                | Error::Io(_)
        )
    }

    /// Whether this error should trip a circuit breaker's failure counter.
    #[must_use]
    pub fn counts_as_circuit_failure(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::TransientBackend(_) | Error::Backend(_)
        )
    }

    #[must_use]
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Error::NotFound(what.to_string())
    }
}

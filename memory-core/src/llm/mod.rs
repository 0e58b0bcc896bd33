//! LLM client contract (spec §4.2).
//!
//! The lifecycle engines never talk to a provider SDK directly — they
//! depend on [`LlmClient`], a schema-enforced, task-typed call surface
//! that a [`MultiProviderLlmClient`] fans out across a fallback chain of
//! providers, each independently rate-limited and circuit-broken the
//! same way [`crate::storage::circuit_breaker::CircuitBreaker`] protects
//! storage adapters.

mod multi_provider;
mod rate_limiter;

pub use multi_provider::{LlmProvider, MultiProviderLlmClient, ProviderConfig};
pub use rate_limiter::RateLimiter;

use crate::types::enums::LlmTask;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A single request to the LLM client.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Which of the five lifecycle tasks this call serves.
    pub task: LlmTask,
    /// The user/content prompt.
    pub prompt: String,
    /// Optional system instruction steering the model's behavior.
    pub system_instruction: Option<String>,
    /// Optional JSON Schema the response must conform to. When set, a
    /// response that fails to parse against it surfaces as
    /// [`crate::Error::LlmParse`] rather than being handed back raw.
    pub response_schema: Option<Value>,
    /// Sampling temperature, provider-dependent default if `None`.
    pub temperature: Option<f32>,
}

impl LlmRequest {
    /// Build a request for `task`/`prompt` with no schema or system
    /// instruction, the common case for free-text tasks.
    #[must_use]
    pub fn new(task: LlmTask, prompt: impl Into<String>) -> Self {
        Self {
            task,
            prompt: prompt.into(),
            system_instruction: None,
            response_schema: None,
            temperature: None,
        }
    }

    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// The LLM's response to an [`LlmRequest`].
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Raw text returned by the model.
    pub text: String,
    /// Parsed JSON value, present when the request carried a
    /// `response_schema` and the response validated against it.
    pub parsed: Option<Value>,
    /// Name of the provider that ultimately served this call, useful for
    /// telemetry and for diagnosing which fallback tier was exercised.
    pub provider: String,
}

/// Uniform entry point lifecycle engines call into, independent of which
/// provider(s) back it.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Dispatch `request`, retrying/falling back per the client's own
    /// policy, returning a parsed response if a schema was supplied.
    ///
    /// # Errors
    /// Returns [`crate::Error::CircuitOpen`] if every provider's circuit
    /// is open, [`crate::Error::RateLimited`] if every provider is
    /// currently throttled, or [`crate::Error::LlmParse`] if the
    /// response fails schema validation on every attempt.
    async fn call(&self, request: LlmRequest) -> Result<LlmResponse>;

    /// Produce a dense embedding vector for `text`. Implemented as a
    /// convenience wrapper over `call` with `task = LlmTask::Embedding`
    /// for clients that expose a distinct embeddings endpoint.
    ///
    /// # Errors
    /// Same as [`LlmClient::call`].
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

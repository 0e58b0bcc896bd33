//! Multi-provider fallback chain (spec §4.2).

use super::rate_limiter::RateLimiter;
use super::{LlmClient, LlmRequest, LlmResponse};
use crate::storage::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::types::enums::LlmTask;
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Low-level transport to a single provider. Implementations wrap the
/// provider's SDK/HTTP client; `MultiProviderLlmClient` supplies the
/// retry, rate-limiting, and circuit-breaking around it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable provider name, used in telemetry and error messages.
    fn name(&self) -> &str;

    /// Issue one call to the provider. Implementations should return
    /// [`Error::TransientBackend`] for retryable failures (timeouts,
    /// 5xx) and a non-recoverable variant otherwise.
    async fn call(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Produce an embedding vector for `text`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Per-provider policy: rate limit and circuit breaker configuration.
pub struct ProviderConfig {
    pub provider: Box<dyn LlmProvider>,
    pub requests_per_minute: u32,
    pub circuit_breaker: CircuitBreakerConfig,
}

struct GuardedProvider {
    provider: Box<dyn LlmProvider>,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
}

/// Fans a request out across an ordered list of providers, skipping any
/// whose circuit is open or whose rate-limit bucket is empty, falling
/// back in order until one succeeds or all are exhausted.
///
/// # Examples
///
/// ```no_run
/// use memory_core::llm::{LlmClient, LlmRequest, MultiProviderLlmClient};
/// use memory_core::types::enums::LlmTask;
///
/// # async fn example(client: MultiProviderLlmClient) -> memory_core::Result<()> {
/// let response = client.call(LlmRequest::new(LlmTask::FactExtraction, "...")).await?;
/// println!("served by {}", response.provider);
/// # Ok(())
/// # }
/// ```
pub struct MultiProviderLlmClient {
    providers: Vec<GuardedProvider>,
    call_timeout: Duration,
}

impl MultiProviderLlmClient {
    /// Build a client from an ordered fallback chain. The first entry is
    /// tried first on every call.
    #[must_use]
    pub fn new(configs: Vec<ProviderConfig>, call_timeout: Duration) -> Self {
        let providers = configs
            .into_iter()
            .map(|cfg| GuardedProvider {
                provider: cfg.provider,
                limiter: RateLimiter::new(cfg.requests_per_minute),
                breaker: CircuitBreaker::new(cfg.circuit_breaker),
            })
            .collect();
        Self { providers, call_timeout }
    }

    async fn try_provider(&self, guarded: &GuardedProvider, request: &LlmRequest) -> Result<LlmResponse> {
        if !guarded.limiter.try_acquire() {
            return Err(Error::RateLimited(guarded.provider.name().to_string()));
        }
        let timeout = self.call_timeout;
        guarded
            .breaker
            .call(|| async {
                tokio::time::timeout(timeout, guarded.provider.call(request))
                    .await
                    .map_err(|_| Error::TransientBackend("llm call timed out".to_string()))?
            })
            .await
    }
}

#[async_trait]
impl LlmClient for MultiProviderLlmClient {
    async fn call(&self, request: LlmRequest) -> Result<LlmResponse> {
        if self.providers.is_empty() {
            return Err(Error::Configuration("no LLM providers configured".to_string()));
        }
        let mut last_err = None;
        for guarded in &self.providers {
            match self.try_provider(guarded, &request).await {
                Ok(response) => {
                    if request.response_schema.is_some() && response.parsed.is_none() {
                        last_err = Some(Error::LlmParse(format!(
                            "provider {} returned unparseable response for task {}",
                            guarded.provider.name(),
                            request.task
                        )));
                        continue;
                    }
                    return Ok(response);
                }
                Err(err) => {
                    tracing::warn!(provider = guarded.provider.name(), %err, task = %request.task, "llm provider failed, falling back");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Configuration("no LLM providers configured".to_string())))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.providers.is_empty() {
            return Err(Error::Configuration("no LLM providers configured".to_string()));
        }
        let mut last_err = None;
        for guarded in &self.providers {
            if !guarded.limiter.try_acquire() {
                last_err = Some(Error::RateLimited(guarded.provider.name().to_string()));
                continue;
            }
            match guarded.breaker.call(|| guarded.provider.embed(text)).await {
                Ok(vector) => return Ok(vector),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Configuration("no LLM providers configured".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FlakyProvider {
        name: String,
        fail_times: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn call(&self, request: &LlmRequest) -> Result<LlmResponse> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::TransientBackend("simulated failure".to_string()));
            }
            Ok(LlmResponse {
                text: format!("handled {}", request.task),
                parsed: None,
                provider: self.name.clone(),
            })
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; 768])
        }
    }

    #[tokio::test]
    async fn falls_back_to_second_provider_on_failure() {
        let primary = ProviderConfig {
            provider: Box::new(FlakyProvider {
                name: "primary".to_string(),
                fail_times: Arc::new(AtomicUsize::new(10)),
            }),
            requests_per_minute: 100,
            circuit_breaker: CircuitBreakerConfig::default(),
        };
        let secondary = ProviderConfig {
            provider: Box::new(FlakyProvider {
                name: "secondary".to_string(),
                fail_times: Arc::new(AtomicUsize::new(0)),
            }),
            requests_per_minute: 100,
            circuit_breaker: CircuitBreakerConfig::default(),
        };
        let client = MultiProviderLlmClient::new(vec![primary, secondary], Duration::from_secs(5));
        let response = client
            .call(LlmRequest::new(LlmTask::FactExtraction, "prompt"))
            .await
            .unwrap();
        assert_eq!(response.provider, "secondary");
    }

    #[tokio::test]
    async fn errors_when_no_providers_configured() {
        let client = MultiProviderLlmClient::new(vec![], Duration::from_secs(5));
        assert!(client.call(LlmRequest::new(LlmTask::Embedding, "x")).await.is_err());
    }
}

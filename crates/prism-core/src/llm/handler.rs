//! Provider handler: one configured provider wrapped with timeout and retry.
//!
//! The handler pins the provider spec's temperature and token limit onto every
//! request, bounds each attempt with a timeout, and retries transient
//! failures with exponential backoff. Rate limits and auth errors are
//! returned on the first attempt.

use super::provider::{LlmProvider, LlmProviderFactory, LlmRequest, LlmResponse};
use super::retry::{self, FailureKind};
use crate::config::{CredentialsConfig, ProviderSpec, RetryConfig};
use crate::error::LlmError;
use std::sync::Arc;
use std::time::Duration;

/// Retry settings for a handler.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base backoff delay in milliseconds
    pub base_delay_ms: u64,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            timeout_ms: config.timeout_ms,
        }
    }
}

/// A successful call plus the number of attempts it took.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub response: LlmResponse,
    pub attempts: u32,
}

/// The last error of a call that never succeeded.
#[derive(Debug, Clone)]
pub struct InvocationFailure {
    pub error: LlmError,
    pub attempts: u32,
}

impl InvocationFailure {
    pub fn kind(&self) -> FailureKind {
        retry::classify(&self.error)
    }
}

/// A provider bound to its spec and retry policy.
pub struct ProviderHandler {
    provider: Arc<dyn LlmProvider>,
    spec: ProviderSpec,
    key: String,
    policy: RetryPolicy,
}

impl ProviderHandler {
    pub fn new(provider: Box<dyn LlmProvider>, spec: ProviderSpec, policy: RetryPolicy) -> Self {
        let key = spec.key();
        Self {
            provider: Arc::from(provider),
            spec,
            key,
            policy,
        }
    }

    /// Build the provider for `spec` and wrap it.
    pub fn from_spec(
        spec: &ProviderSpec,
        credentials: &CredentialsConfig,
        policy: RetryPolicy,
    ) -> Result<Self, LlmError> {
        let provider = LlmProviderFactory::create(spec, credentials)?;
        Ok(Self::new(provider, spec.clone(), policy))
    }

    /// Key under which this handler's results are reported.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn spec(&self) -> &ProviderSpec {
        &self.spec
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send `request` with this handler's temperature and token limit,
    /// retrying transient failures.
    pub async fn invoke(&self, request: &LlmRequest) -> Result<Invocation, InvocationFailure> {
        let request = LlmRequest {
            temperature: self.spec.temperature,
            max_tokens: self.spec.max_tokens,
            ..request.clone()
        };

        let mut last_error = LlmError::Timeout {
            timeout_ms: self.policy.timeout_ms,
        };
        let mut attempts = 0;
        for attempt in 0..=self.policy.max_retries {
            if attempt > 0 {
                let delay = retry::backoff_duration(attempt - 1, self.policy.base_delay_ms);
                tracing::debug!(
                    "Retry {attempt}/{} for {} after {delay:?}",
                    self.policy.max_retries,
                    self.key
                );
                tokio::time::sleep(delay).await;
            }
            attempts += 1;

            match tokio::time::timeout(
                Duration::from_millis(self.policy.timeout_ms),
                self.provider.generate(&request),
            )
            .await
            {
                Ok(Ok(response)) => return Ok(Invocation { response, attempts }),
                Ok(Err(e)) => {
                    let retryable = retry::is_retryable(&e);
                    tracing::warn!(
                        provider = %self.key,
                        attempt = attempts,
                        retryable,
                        "Provider call failed: {e}"
                    );
                    last_error = e;
                    if !retryable {
                        break;
                    }
                }
                Err(_) => {
                    tracing::warn!(
                        provider = %self.key,
                        attempt = attempts,
                        "Provider call timed out after {}ms",
                        self.policy.timeout_ms
                    );
                    last_error = LlmError::Timeout {
                        timeout_ms: self.policy.timeout_ms,
                    };
                }
            }
        }

        Err(InvocationFailure {
            error: last_error,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use std::sync::atomic::Ordering;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay_ms: 5,
            timeout_ms: 5000,
        }
    }

    fn http(status: u16, message: &str) -> LlmError {
        LlmError::Http {
            provider: "mock".to_string(),
            status,
            message: message.to_string(),
        }
    }

    fn handler(provider: ScriptedProvider, policy: RetryPolicy) -> ProviderHandler {
        ProviderHandler::new(
            Box::new(provider),
            ProviderSpec::new("mock", "mock-v1", 0.7),
            policy,
        )
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let provider = ScriptedProvider::success("mock", "Linen Shirt");
        let calls = provider.call_count_handle();
        let result = handler(provider, fast_policy(3))
            .invoke(&LlmRequest::new("x"))
            .await
            .unwrap();
        assert_eq!(result.response.text, "Linen Shirt");
        assert_eq!(result.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_spec_overrides_temperature_and_max_tokens() {
        let provider = ScriptedProvider::new("mock", |_, request| {
            Ok(ScriptedProvider::response(&format!(
                "{}:{}",
                request.temperature, request.max_tokens
            )))
        });
        let mut spec = ProviderSpec::new("mock", "mock-v1", 0.7);
        spec.max_tokens = 77;
        let handler = ProviderHandler::new(Box::new(provider), spec, fast_policy(0));
        let mut request = LlmRequest::new("x");
        request.temperature = 0.0;
        let result = handler.invoke(&request).await.unwrap();
        assert_eq!(result.response.text, "0.7:77");
    }

    #[tokio::test]
    async fn test_retry_on_server_error() {
        let provider =
            ScriptedProvider::fail_then_succeed("mock", http(503, "unavailable"), "Recovered");
        let calls = provider.call_count_handle();
        let result = handler(provider, fast_policy(2))
            .invoke(&LlmRequest::new("x"))
            .await
            .unwrap();
        assert_eq!(result.response.text, "Recovered");
        assert_eq!(result.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_immediately() {
        let provider = ScriptedProvider::failing("mock", http(429, "rate limited"));
        let calls = provider.call_count_handle();
        let failure = handler(provider, fast_policy(3))
            .invoke(&LlmRequest::new("x"))
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.kind(), FailureKind::RateLimited);
        assert!(failure.error.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_auth_error_surfaces_immediately() {
        let provider = ScriptedProvider::failing("mock", http(401, "unauthorized"));
        let calls = provider.call_count_handle();
        let failure = handler(provider, fast_policy(3))
            .invoke(&LlmRequest::new("x"))
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(failure.kind(), FailureKind::Auth);
    }

    #[tokio::test]
    async fn test_exhausts_retries_on_network_errors() {
        let provider = ScriptedProvider::failing(
            "mock",
            LlmError::Network {
                provider: "mock".to_string(),
                message: "connection reset".to_string(),
            },
        );
        let calls = provider.call_count_handle();
        let failure = handler(provider, fast_policy(2))
            .invoke(&LlmRequest::new("x"))
            .await
            .unwrap_err();
        // 1 initial + 2 retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.kind(), FailureKind::Network);
    }

    #[tokio::test]
    async fn test_timeout_is_retried_then_reported() {
        let provider =
            ScriptedProvider::success("mock", "too slow").with_delay(Duration::from_secs(5));
        let calls = provider.call_count_handle();
        let policy = RetryPolicy {
            max_retries: 1,
            base_delay_ms: 5,
            timeout_ms: 30,
        };
        let failure = handler(provider, policy)
            .invoke(&LlmRequest::new("x"))
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(failure.kind(), FailureKind::Timeout);
        assert!(failure.error.to_string().contains("Timeout after 30ms"));
    }

    #[test]
    fn test_key_uses_label() {
        let mut spec = ProviderSpec::new("openai", "gpt-4o-mini", 0.2);
        assert_eq!(
            ProviderHandler::new(
                Box::new(ScriptedProvider::success("openai", "x")),
                spec.clone(),
                RetryPolicy::default()
            )
            .key(),
            "openai/gpt-4o-mini"
        );
        spec.label = Some("openai-cold".into());
        let handler = ProviderHandler::new(
            Box::new(ScriptedProvider::success("openai", "x")),
            spec,
            RetryPolicy::default(),
        );
        assert_eq!(handler.key(), "openai-cold");
        assert_eq!(handler.provider_name(), "openai");
    }
}

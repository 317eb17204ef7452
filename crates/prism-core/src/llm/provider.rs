//! LLM provider trait and request/response types.
//!
//! Defines the interface that all LLM providers implement, plus the
//! factory that creates the right provider from a configured
//! `(name, model, temperature)` tuple.

use crate::config::{ApiCredentials, CredentialsConfig, ProviderSpec};
use crate::error::LlmError;
use async_trait::async_trait;

/// A single prompt to send to a provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Optional system instruction
    pub system: Option<String>,
    /// Rendered user prompt
    pub prompt: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f64,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.2,
        }
    }

    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }
}

/// The response from a provider call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated text
    pub text: String,
    /// Model identifier reported by the provider
    pub model: String,
    /// Number of tokens used (input + output), if reported
    pub tokens_used: Option<u32>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all LLM providers implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (handlers hold `Arc<dyn LlmProvider>`).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging (e.g., "openai", "gemini").
    fn name(&self) -> &str;

    /// Check whether the provider is configured.
    async fn is_available(&self) -> bool;

    /// Generate a completion for the given request.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Expand `${ENV_VAR}` segments anywhere inside an endpoint URL.
pub fn resolve_endpoint(value: &str) -> Option<String> {
    shellexpand::env(value)
        .ok()
        .map(|s| s.trim_end_matches('/').to_string())
}

/// Map a `reqwest` transport error to a structured provider error.
///
/// Call deadlines are enforced by the handler, which reports them as
/// `LlmError::Timeout` with the configured limit. A timeout raised inside
/// the client carries no duration, so it is reported as a network error.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> LlmError {
    let message = if err.is_timeout() {
        format!("request timed out: {err}")
    } else {
        err.to_string()
    };
    LlmError::Network {
        provider: provider.to_string(),
        message,
    }
}

/// Turn a non-success response into an `LlmError::Http`.
pub(crate) async fn http_error(provider: &str, resp: reqwest::Response) -> LlmError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    LlmError::Http {
        provider: provider.to_string(),
        status: status.as_u16(),
        message: text,
    }
}

/// Factory that creates the appropriate provider from a spec and credentials.
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create an LLM provider for a configured `(name, model)` pair.
    pub fn create(
        spec: &ProviderSpec,
        credentials: &CredentialsConfig,
    ) -> Result<Box<dyn LlmProvider>, LlmError> {
        match spec.name.as_str() {
            "openai" => {
                let (api_key, endpoint) =
                    resolve(&spec.name, &credentials.openai, "OPENAI_API_KEY")?;
                Ok(Box::new(super::openai::OpenAiProvider::with_endpoint(
                    &api_key,
                    &spec.model,
                    &format!("{endpoint}/chat/completions"),
                )))
            }
            "gemini" => {
                let (api_key, endpoint) =
                    resolve(&spec.name, &credentials.gemini, "GEMINI_API_KEY")?;
                Ok(Box::new(super::gemini::GeminiProvider::new(
                    &endpoint,
                    &api_key,
                    &spec.model,
                )))
            }
            "anthropic" => {
                let (api_key, endpoint) =
                    resolve(&spec.name, &credentials.anthropic, "ANTHROPIC_API_KEY")?;
                Ok(Box::new(super::anthropic::AnthropicProvider::new(
                    &endpoint,
                    &api_key,
                    &spec.model,
                )))
            }
            "runpod" => {
                let (api_key, endpoint) =
                    resolve(&spec.name, &credentials.runpod, "RUNPOD_API_KEY")?;
                Ok(Box::new(super::runpod::RunPodProvider::new(
                    &endpoint,
                    &api_key,
                    &spec.model,
                )))
            }
            other => Err(LlmError::UnknownProvider(other.to_string())),
        }
    }
}

fn resolve(
    provider: &str,
    creds: &ApiCredentials,
    default_env: &str,
) -> Result<(String, String), LlmError> {
    let api_key = resolve_env_var(&creds.api_key).ok_or_else(|| LlmError::MissingApiKey {
        provider: provider.to_string(),
        env_var: env_var_name(&creds.api_key).unwrap_or(default_env).to_string(),
    })?;
    let endpoint = resolve_endpoint(&creds.endpoint)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| LlmError::UnresolvedEndpoint {
            provider: provider.to_string(),
            endpoint: creds.endpoint.clone(),
        })?;
    Ok((api_key, endpoint))
}

fn env_var_name(value: &str) -> Option<&str> {
    value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(api_key: &str, endpoint: &str) -> ApiCredentials {
        ApiCredentials {
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    #[test]
    fn test_resolve_env_var() {
        // Non-env-var strings pass through
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        // Empty returns None
        assert_eq!(resolve_env_var(""), None);
        // Unset env var returns None
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }

    #[test]
    fn test_resolve_endpoint_trims_trailing_slash() {
        assert_eq!(
            resolve_endpoint("https://api.openai.com/v1/"),
            Some("https://api.openai.com/v1".to_string())
        );
        assert_eq!(resolve_endpoint("https://x/${DEFINITELY_NOT_SET_XYZ_123}/v1"), None);
    }

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::new("Rewrite this title").with_system(Some("Be brief".into()));
        assert_eq!(request.prompt, "Rewrite this title");
        assert_eq!(request.system.as_deref(), Some("Be brief"));
    }

    #[test]
    fn test_factory_builds_each_known_provider() {
        let mut credentials = CredentialsConfig::default();
        credentials.openai = creds("sk-test", "https://api.openai.com/v1");
        credentials.gemini = creds("g-test", "https://generativelanguage.googleapis.com/v1beta");
        credentials.anthropic = creds("a-test", "https://api.anthropic.com/v1");
        credentials.runpod = creds("r-test", "https://api.runpod.ai/v2/abc/openai/v1");

        for name in ["openai", "gemini", "anthropic", "runpod"] {
            let spec = ProviderSpec::new(name, "some-model", 0.2);
            let provider = LlmProviderFactory::create(&spec, &credentials).unwrap();
            assert_eq!(provider.name(), name);
        }
    }

    #[test]
    fn test_factory_reports_missing_key_with_env_var_name() {
        let mut credentials = CredentialsConfig::default();
        credentials.openai = creds("${DEFINITELY_NOT_SET_OPENAI_KEY}", "https://api.openai.com/v1");
        let spec = ProviderSpec::new("openai", "gpt-4o-mini", 0.2);
        let err = LlmProviderFactory::create(&spec, &credentials).err().unwrap();
        assert!(matches!(err, LlmError::MissingApiKey { .. }));
        assert!(err.to_string().contains("DEFINITELY_NOT_SET_OPENAI_KEY"));
    }

    #[tokio::test]
    async fn test_client_timeout_is_network_error_not_zero_timeout() {
        // Accepts the connection but never answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/v1", listener.local_addr().unwrap());
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(50))
            .build()
            .unwrap();

        let err = client.get(&url).send().await.unwrap_err();
        assert!(err.is_timeout());

        match transport_error("openai", err) {
            LlmError::Network { provider, message } => {
                assert_eq!(provider, "openai");
                assert!(message.starts_with("request timed out"), "got {message}");
            }
            other => panic!("expected network error, got {other:?}"),
        }
        drop(listener);
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let spec = ProviderSpec::new("carrier-pigeon", "v1", 0.2);
        let err = LlmProviderFactory::create(&spec, &CredentialsConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, LlmError::UnknownProvider(name) if name == "carrier-pigeon"));
    }
}

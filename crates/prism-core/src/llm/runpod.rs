//! RunPod-hosted open-weights models (OpenAI-compatible API).
//!
//! RunPod serverless vLLM workers expose the Chat Completions format,
//! so this delegates to `OpenAiProvider` with the worker's base URL.

use super::openai::OpenAiProvider;
use super::provider::{LlmProvider, LlmRequest, LlmResponse};
use crate::error::LlmError;
use async_trait::async_trait;

/// RunPod provider wrapping an OpenAI-compatible endpoint.
pub struct RunPodProvider {
    inner: OpenAiProvider,
}

impl RunPodProvider {
    pub fn new(endpoint: &str, api_key: &str, model: &str) -> Self {
        let url = format!("{}/chat/completions", endpoint.trim_end_matches('/'));
        Self {
            inner: OpenAiProvider::with_endpoint(api_key, model, &url).named("runpod"),
        }
    }
}

#[async_trait]
impl LlmProvider for RunPodProvider {
    fn name(&self) -> &str {
        "runpod"
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.inner.generate(request).await
    }
}

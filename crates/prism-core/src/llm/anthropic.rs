//! Anthropic LLM provider using the Messages API.

use super::provider::{http_error, transport_error, LlmProvider, LlmRequest, LlmResponse};
use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Anthropic provider using the Messages API.
pub struct AnthropicProvider {
    endpoint: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(endpoint: &str, api_key: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContent>,
    model: String,
    usage: Usage,
}

#[derive(Deserialize)]
struct ResponseContent {
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();

        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            temperature: request.temperature.min(1.0),
            messages: vec![Message {
                role: "user",
                content: request.prompt.clone(),
            }],
        };

        let resp = self
            .client
            .post(format!("{}/messages", self.endpoint))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("anthropic", e))?;

        if !resp.status().is_success() {
            return Err(http_error("anthropic", resp).await);
        }

        let messages_resp: MessagesResponse =
            resp.json().await.map_err(|e| LlmError::InvalidResponse {
                provider: "anthropic".to_string(),
                message: e.to_string(),
            })?;

        let text = messages_resp
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: "anthropic".to_string(),
            });
        }

        Ok(LlmResponse {
            text,
            model: messages_resp.model,
            tokens_used: Some(messages_resp.usage.input_tokens + messages_resp.usage.output_tokens),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_is_top_level() {
        let body = MessagesRequest {
            model: "claude-3-5-haiku-latest".into(),
            max_tokens: 256,
            system: Some("You write copy".into()),
            messages: vec![Message {
                role: "user",
                content: "Rewrite".into(),
            }],
            temperature: 0.2,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["system"], "You write copy");
        assert_eq!(json["messages"][0]["role"], "user");

        let without = MessagesRequest { system: None, ..body };
        assert!(serde_json::to_value(&without).unwrap().get("system").is_none());
    }

    #[test]
    fn test_response_skips_non_text_blocks() {
        let resp: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"Linen"},{"type":"tool_use"}],
                "model":"claude-3-5-haiku-latest",
                "usage":{"input_tokens":10,"output_tokens":3}}"#,
        )
        .unwrap();
        let texts: Vec<_> = resp.content.into_iter().filter_map(|c| c.text).collect();
        assert_eq!(texts, ["Linen"]);
        assert_eq!(resp.usage.input_tokens + resp.usage.output_tokens, 13);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let provider = AnthropicProvider::new("http://127.0.0.1:9/v1", "key", "claude");
        let err = provider.generate(&LlmRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, LlmError::Network { .. }), "got {err:?}");
    }
}

//! OpenAI-compatible chat backend used for inventory extraction.
//!
//! Requests JSON output via `response_format`, but the merge engine still
//! parses defensively — the response-format hint is not honored by every
//! compatible server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use curio_core::{defaults, Error, GenerationBackend, Result};

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL, without the `/v1` suffix.
    pub base_url: String,
    /// API key (None for unauthenticated local servers).
    pub api_key: Option<String>,
    /// Chat model used for extraction.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    /// Create config from environment variables (with defaults).
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var(defaults::ENV_OPENAI_BASE_URL)
                .unwrap_or_else(|_| defaults::DEFAULT_OPENAI_BASE_URL.to_string()),
            api_key: std::env::var(defaults::ENV_OPENAI_API_KEY).ok(),
            model: std::env::var(defaults::ENV_EXTRACTION_MODEL)
                .unwrap_or_else(|_| defaults::DEFAULT_EXTRACTION_MODEL.to_string()),
            timeout_secs: defaults::EXTRACTION_TIMEOUT_SECS,
        }
    }
}

/// OpenAI-compatible chat completion backend.
pub struct OpenAiBackend {
    config: OpenAiConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env())
    }

    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/v1{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint
        );
        let mut req = self.client.post(&url);
        if let Some(api_key) = &self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }
        req.header("Content-Type", "application/json")
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String> {
        debug!(
            subsystem = "inference",
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Generating structured output"
        );

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: 0.2,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        };

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: OpenAiErrorResponse = response.json().await.unwrap_or(OpenAiErrorResponse {
                error: OpenAiError {
                    message: "Unknown error".to_string(),
                },
            });
            return Err(Error::Inference(format!(
                "OpenAI-compatible API returned {}: {}",
                status, body.error.message
            )));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        debug!(
            subsystem = "inference",
            response_len = content.len(),
            "Generation complete"
        );
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env_defaults() {
        // Only assert the static defaults; env vars may be set in CI.
        let config = OpenAiConfig {
            base_url: curio_core::defaults::DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key: None,
            model: curio_core::defaults::DEFAULT_EXTRACTION_MODEL.to_string(),
            timeout_secs: curio_core::defaults::EXTRACTION_TIMEOUT_SECS,
        };
        assert_eq!(config.base_url, "https://api.openai.com");
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn test_backend_reports_model_name() {
        let backend = OpenAiBackend::new(OpenAiConfig {
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            model: "test-model".to_string(),
            timeout_secs: 10,
        })
        .unwrap();
        assert_eq!(backend.model_name(), "test-model");
    }

    #[test]
    fn test_chat_response_deserialization() {
        let json = r#"{
            "choices": [{"message": {"role": "assistant", "content": "[]"}}]
        }"#;
        let response: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices[0].message.content, "[]");
    }
}

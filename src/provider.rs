//! OpenAI-compatible HTTP generation client.
//!
//! Works against any server exposing `POST {endpoint}/chat/completions` (OpenAI, Ollama,
//! vLLM, llama.cpp server). HTTP failures are mapped onto [`GenerationError`] so the
//! retry policy can classify them.

use crate::error::{GenerationError, PipelineError};
use crate::generation::client::{GenerationClient, GenerationOptions};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Provider connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL, e.g. `https://api.openai.com/v1` or `http://localhost:11434/v1`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key; a missing key sends no auth header
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        let endpoint = self.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(format!(
                "Endpoint '{}' must start with http:// or https://",
                self.endpoint
            ));
        }
        if self.model.trim().is_empty() {
            return Err("Model cannot be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn map_send_error(error: reqwest::Error) -> GenerationError {
    if error.is_timeout() {
        GenerationError::Timeout(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        GenerationError::Request(format!("Connection error: {}", error))
    } else {
        GenerationError::Request(format!("HTTP error: {}", error))
    }
}

fn map_status(status: u16, body: &str) -> GenerationError {
    match status {
        401 | 403 => GenerationError::Unauthorized(format!("Authentication failed: {}", body)),
        404 => GenerationError::Configuration(format!("Model or endpoint not found: {}", body)),
        _ => GenerationError::Request(format!("Request failed with status {}: {}", status, body)),
    }
}

fn extract_completion(response: ChatCompletionResponse) -> Result<String, GenerationError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Malformed("No choices in response".to_string()))?;

    if choice.finish_reason.as_deref() == Some("length") {
        return Err(GenerationError::Malformed(
            "Response truncated at the token limit".to_string(),
        ));
    }

    match choice.message.content {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(GenerationError::Malformed("Empty completion".to_string())),
    }
}

/// [`GenerationClient`] for OpenAI-compatible chat completion endpoints.
pub struct OpenAiCompatibleClient {
    client: Client,
    model: String,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &ProviderConfig, api_key: Option<String>) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::ProviderError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            model: config.model.clone(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: config.endpoint.trim().trim_end_matches('/').to_string(),
        })
    }

    /// Build a client, reading the API key from `config.api_key_env`.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::ProviderError)?;
        Self::new(config, std::env::var(&config.api_key_env).ok())
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerationClient for OpenAiCompatibleClient {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = &options.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system_prompt.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt.to_string(),
        });

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, prompt_chars = prompt.len(), "Sending generation request");

        let mut builder = self.client.post(&url).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder.send().await.map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status(status.as_u16(), &body));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(format!("Reading response timed out: {}", e))
            } else {
                GenerationError::Malformed(format!("Failed to decode response: {}", e))
            }
        })?;
        extract_completion(completion)
    }
}

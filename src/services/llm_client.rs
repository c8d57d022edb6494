//! Narrow text-completion interface over the LLM provider.
//!
//! Extraction and digest generation only ever need "prompt in, text out", so
//! that is all [`LlmClient`] exposes. [`AnthropicClient`] talks to the
//! Anthropic Messages API; [`DisabledLlmClient`] stands in when no API key is
//! configured and fails every call, which pushes callers onto their fallbacks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::AppConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM client is not configured")]
    NotConfigured,
    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("LLM API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("LLM response contained no text")]
    EmptyResponse,
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait LlmClient: Send + Sync {
    /// Sends a single user-turn prompt and returns the concatenated text reply.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: vec![RequestMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: MessagesResponse = response.json().await?;
        let text: String = body
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(text)
    }
}

pub struct DisabledLlmClient;

#[async_trait]
impl LlmClient for DisabledLlmClient {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured)
    }
}

pub fn create_llm_client(config: &AppConfig) -> std::sync::Arc<dyn LlmClient> {
    match config.anthropic_api_key.as_deref() {
        Some(api_key) => {
            tracing::info!("Using Anthropic LLM client (model {})", config.anthropic_model);
            std::sync::Arc::new(AnthropicClient::new(
                &config.anthropic_base_url,
                api_key,
                &config.anthropic_model,
                config.llm_timeout,
            ))
        }
        None => {
            tracing::info!("ANTHROPIC_API_KEY not configured. LLM calls are disabled");
            std::sync::Arc::new(DisabledLlmClient)
        }
    }
}

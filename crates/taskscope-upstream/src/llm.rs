//! LLM completion client
//!
//! Speaks the OpenAI-compatible chat completions protocol (non-streaming):
//! ```text
//! POST {base_url}/chat/completions
//! {"model": "...", "messages": [{"role": "user", "content": "<prompt>"}]}
//! ```

use crate::{transport_error, with_bearer};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taskscope_core::{Error, Result};
use tracing::{debug, error};

/// Longest slice of an error body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Anything that turns a prompt into completion text
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send a single-turn prompt and return the raw completion text
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Model identifier, for logs
    fn model(&self) -> &str;
}

/// Chat completions request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct Message {
    role: String,
    content: String,
}

/// Chat completions response (non-streaming)
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completions endpoint
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl ChatCompletionsClient {
    /// Create a client
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            max_tokens: None,
            temperature: None,
        }
    }

    /// Cap the completion length
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionsClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!("Sending {} char prompt to {}", prompt.len(), self.model);
        let response = with_bearer(self.client.post(&url), self.api_key.as_deref())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::llm(transport_error(e).to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::llm(transport_error(e).to_string()))?;

        if !status.is_success() {
            error!("Completion request failed: {}", status);
            let excerpt: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(Error::llm(format!("status {}: {}", status, excerpt)));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| Error::llm(format!("malformed completion response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::llm("completion returned no content"))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

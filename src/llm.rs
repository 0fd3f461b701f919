//! Language model access through an OpenAI-compatible chat completions API.
//!
//! The pipeline treats the model as an opaque text-to-text function; this
//! module only handles the transport, retries and token accounting.

use crate::config::LlmSettings;
use crate::error::{ProfilerError, Result};
use crate::retry::{retry_after_secs, RetryPolicy};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Token usage tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// One `timestamp,prompt,completion,total` log line.
    pub fn log_line(&self, timestamp: &str) -> String {
        format!(
            "{},{},{},{}",
            timestamp, self.prompt_tokens, self.completion_tokens, self.total_tokens
        )
    }
}

/// Accumulated token usage with atomic counters
#[derive(Debug, Default)]
struct AtomicTokenUsage {
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_tokens: AtomicU64,
}

impl AtomicTokenUsage {
    fn add(&self, usage: &TokenUsage) {
        self.prompt_tokens.fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.completion_tokens.fetch_add(usage.completion_tokens, Ordering::Relaxed);
        self.total_tokens.fetch_add(usage.total_tokens, Ordering::Relaxed);
    }

    fn get(&self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
        }
    }
}

/// A text-to-text model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete a system + user message pair.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Tokens consumed so far. Models without accounting report zero.
    fn usage(&self) -> TokenUsage {
        TokenUsage::default()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatRequestMessage<'a>; 2],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// OpenAI-compatible API response structures
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

/// Chat completions client.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    retry: RetryPolicy,
    usage: AtomicTokenUsage,
}

impl OpenAiClient {
    pub fn new(settings: &LlmSettings, api_key: String, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(retry.timeout())
            .build()
            .map_err(|e| ProfilerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            retry,
            usage: AtomicTokenUsage::default(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, system: &str, user: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatRequestMessage { role: "system", content: system },
                ChatRequestMessage { role: "user", content: user },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let api_url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, prompt_chars = user.len(), "Sending LLM request");

        let response = self
            .client
            .post(&api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProfilerError::RateLimited(retry_after_secs(response.headers())));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProfilerError::Api {
                code: status.as_u16(),
                message: format!("LLM API error: {} - {}", status, error_text),
            });
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProfilerError::Parse(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(u) = api_response.usage {
            self.usage.add(&TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });
        }

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProfilerError::Parse("LLM response has no message content".to_string()))
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.retry.run("llm completion", || self.send(system, user)).await
    }

    fn usage(&self) -> TokenUsage {
        self.usage.get()
    }
}

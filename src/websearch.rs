//! Tavily web search client.
//!
//! Turns a free-text query into one block of text, one `title: content`
//! line per hit, suitable for feeding into a summarization prompt.

use crate::config::WebSearchSettings;
use crate::error::{ProfilerError, Result};
use crate::retry::{retry_after_secs, RetryPolicy};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Source of open-web search results.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Search text for `query`, at most `max_results` hits.
    async fn search(&self, query: &str, max_results: usize) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

/// Render hits as newline-separated `title: content` lines.
fn format_hits(hits: &[TavilyHit]) -> String {
    hits.iter()
        .map(|hit| format!("{}: {}", hit.title, hit.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tavily search API client.
pub struct TavilyClient {
    client: Client,
    base_url: String,
    api_key: String,
    search_depth: String,
    retry: RetryPolicy,
}

impl TavilyClient {
    pub fn new(settings: &WebSearchSettings, api_key: String, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(retry.timeout())
            .build()
            .map_err(|e| ProfilerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            search_depth: settings.search_depth.clone(),
            retry,
        })
    }

    async fn do_search(&self, query: &str, max_results: usize) -> Result<String> {
        let url = format!("{}/search", self.base_url);
        let body = TavilyRequest {
            query,
            search_depth: &self.search_depth,
            max_results,
        };

        debug!(query, max_results, "Sending Tavily request");

        let response = self
            .client
            .post(&url)
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
                message: format!("Tavily API error: {} - {}", status, error_text),
            });
        }

        let data: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ProfilerError::Parse(format!("Failed to parse Tavily response: {}", e)))?;

        info!(query, hits = data.results.len(), "Web search complete");
        Ok(format_hits(&data.results))
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<String> {
        self.retry
            .run("tavily search", || self.do_search(query, max_results))
            .await
    }
}

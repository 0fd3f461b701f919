//! Semantic Scholar API Client
//!
//! Resolves a paper title to its metadata and fetches the profile of every
//! co-author (citations, h-index, publication list).
//!
//! API Details:
//! - Title search: GET /graph/v1/paper/search (first hit only)
//! - Author profile: GET /graph/v1/author/{id}
//! - Rate limit: 1 req/s (unauthenticated), higher with API key

use crate::config::ScholarSettings;
use crate::error::{ProfilerError, Result};
use crate::models::{AuthorRecord, PaperEntry, PaperRecord};
use crate::retry::{retry_after_secs, RetryPolicy};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fields requested for the paper under study
const PAPER_FIELDS: &str = "title,abstract,year,authors,citationCount,url,externalIds";

/// Fields requested for each author profile
const AUTHOR_FIELDS: &str =
    "name,affiliations,citationCount,hIndex,papers.title,papers.year,papers.citationCount,papers.abstract";

/// Paper metadata together with the raw co-author profiles.
#[derive(Debug, Clone, PartialEq)]
pub struct ScholarLookup {
    pub paper: PaperRecord,
    pub authors: Vec<AuthorRecord>,
}

/// Source of bibliometric data.
#[async_trait]
pub trait BibliometricSource: Send + Sync {
    /// `Ok(None)` when no paper matches the title, `Err` on transport failure.
    async fn lookup(&self, title: &str) -> Result<Option<ScholarLookup>>;
}

#[derive(Debug, Deserialize)]
struct SSSearchResponse {
    #[serde(default)]
    data: Option<Vec<PaperRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SSAuthor {
    name: Option<String>,
    #[serde(default)]
    affiliations: Option<Vec<String>>,
    citation_count: Option<u64>,
    h_index: Option<u64>,
    #[serde(default)]
    papers: Option<Vec<SSAuthorPaper>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SSAuthorPaper {
    title: Option<String>,
    year: Option<i32>,
    citation_count: Option<u64>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
}

impl SSAuthor {
    fn into_record(self) -> Option<AuthorRecord> {
        let name = self.name?;
        let papers = self
            .papers
            .unwrap_or_default()
            .into_iter()
            .map(|p| PaperEntry {
                title: p.title.unwrap_or_default(),
                year: p.year,
                citations: p.citation_count.unwrap_or(0),
                r#abstract: p.abstract_text,
                abstract_summary: None,
            })
            .collect();

        Some(AuthorRecord {
            name,
            affiliations: self.affiliations.unwrap_or_default(),
            citation_count: self.citation_count.unwrap_or(0),
            h_index: self.h_index.unwrap_or(0),
            papers,
        })
    }
}

/// Semantic Scholar client with retry and request pacing.
pub struct SemanticScholarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    request_delay: Duration,
    retry: RetryPolicy,
}

impl SemanticScholarClient {
    pub fn new(settings: &ScholarSettings, api_key: Option<String>, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(retry.timeout())
            .build()
            .map_err(|e| ProfilerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            request_delay: Duration::from_millis(settings.request_delay_ms),
            retry,
        })
    }

    /// Search for a paper by title, returning the best match.
    pub async fn search_paper(&self, title: &str) -> Result<Option<PaperRecord>> {
        let url = format!("{}/paper/search", self.base_url);
        let query = [("query", title), ("limit", "1"), ("fields", PAPER_FIELDS)];

        let response: SSSearchResponse = self
            .retry
            .run("semantic scholar paper search", || self.get_json(&url, &query))
            .await?;

        Ok(response.data.and_then(|papers| papers.into_iter().next()))
    }

    /// Fetch one author's profile. `Ok(None)` when the response has no name.
    pub async fn author_profile(&self, author_id: &str) -> Result<Option<AuthorRecord>> {
        let url = format!("{}/author/{}", self.base_url, urlencoding::encode(author_id));
        let query = [("fields", AUTHOR_FIELDS)];

        let author: SSAuthor = self
            .retry
            .run("semantic scholar author profile", || self.get_json(&url, &query))
            .await?;

        Ok(author.into_record())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        debug!(url = %url, "Sending Semantic Scholar request");

        let mut request = self.client.get(url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProfilerError::RateLimited(retry_after_secs(response.headers())));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProfilerError::Api {
                code: status.as_u16(),
                message: format!("Semantic Scholar API error: {} - {}", status, error_text),
            });
        }

        response.json().await.map_err(|e| {
            ProfilerError::Parse(format!("Failed to parse Semantic Scholar response: {}", e))
        })
    }
}

#[async_trait]
impl BibliometricSource for SemanticScholarClient {
    async fn lookup(&self, title: &str) -> Result<Option<ScholarLookup>> {
        let paper = match self.search_paper(title).await? {
            Some(paper) => paper,
            None => {
                info!(title, "No paper matched the title");
                return Ok(None);
            }
        };

        info!(
            title = %paper.title,
            citations = paper.citation_count,
            authors = paper.authors.len(),
            "Paper found"
        );

        let mut authors = Vec::with_capacity(paper.authors.len());
        for (idx, author_ref) in paper.authors.iter().enumerate() {
            let name = author_ref.name.as_deref().unwrap_or("unknown");
            let Some(author_id) = author_ref.author_id.as_deref() else {
                warn!(author = name, "Author has no Semantic Scholar ID, skipping");
                continue;
            };

            if idx > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            match self.author_profile(author_id).await {
                Ok(Some(record)) => authors.push(record),
                Ok(None) => warn!(author = name, "Author profile has no name, skipping"),
                Err(e) => warn!(author = name, error = %e, "Could not extract author info"),
            }
        }

        Ok(Some(ScholarLookup { paper, authors }))
    }
}

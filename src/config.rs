//! Configuration for a profiling run.
//!
//! Settings come from a YAML file; API keys come from the environment
//! (after loading an optional `.env` file).

use crate::error::{ProfilerError, Result};
use crate::filter::FilterParams;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Default endpoints
pub mod api {
    pub const SEMANTIC_SCHOLAR_GRAPH: &str = "https://api.semanticscholar.org/graph/v1";
    pub const TAVILY: &str = "https://api.tavily.com";
    pub const OPENAI: &str = "https://api.openai.com/v1";
}

/// Environment variable names for API keys
pub mod env {
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const TAVILY_API_KEY: &str = "TAVILY_API_KEY";
    pub const SEMANTIC_SCHOLAR_API_KEY: &str = "SEMANTIC_SCHOLAR_API_KEY";
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
    pub max_tokens: Option<u32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            base_url: api::OPENAI.to_string(),
            max_tokens: None,
        }
    }
}

/// Semantic Scholar settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScholarSettings {
    pub base_url: String,
    /// Pause between consecutive author requests
    pub request_delay_ms: u64,
}

impl Default for ScholarSettings {
    fn default() -> Self {
        Self {
            base_url: api::SEMANTIC_SCHOLAR_GRAPH.to_string(),
            request_delay_ms: 1000,
        }
    }
}

/// Web search settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebSearchSettings {
    pub base_url: String,
    /// "basic" or "advanced"
    pub search_depth: String,
}

impl Default for WebSearchSettings {
    fn default() -> Self {
        Self {
            base_url: api::TAVILY.to_string(),
            search_depth: "basic".to_string(),
        }
    }
}

/// Run configuration as read from the YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Prompt for paper titles on stdin instead of using `paper_name`
    pub is_user_input: bool,
    pub paper_name: Option<String>,
    /// Top-K papers kept per author
    pub num_papers_considered: usize,
    /// Minimum citation margin over the studied paper
    pub author_citations_threshold: i64,
    pub num_web_results: usize,
    /// Reuse artifacts of a previous run where present
    pub is_load_precomputed_results: bool,
    /// Abort the run when one author's search or summary fails
    pub abort_on_author_failure: bool,
    pub output_dir: PathBuf,
    pub llm: LlmSettings,
    pub semantic_scholar: ScholarSettings,
    pub web_search: WebSearchSettings,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            is_user_input: false,
            paper_name: None,
            num_papers_considered: 5,
            author_citations_threshold: 100,
            num_web_results: 5,
            is_load_precomputed_results: false,
            abort_on_author_failure: false,
            output_dir: PathBuf::from("output"),
            llm: LlmSettings::default(),
            semantic_scholar: ScholarSettings::default(),
            web_search: WebSearchSettings::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Parse and validate a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file without validating it.
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProfilerError::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Profile `paper` once instead of prompting or using `paper_name`.
    pub fn override_paper(&mut self, paper: String) {
        self.paper_name = Some(paper);
        self.is_user_input = false;
    }

    pub fn filter_params(&self) -> FilterParams {
        FilterParams {
            top_k: self.num_papers_considered,
            threshold: self.author_citations_threshold,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_papers_considered == 0 {
            return Err(ProfilerError::Validation(
                "num_papers_considered must be at least 1".to_string(),
            ));
        }
        if self.num_web_results == 0 {
            return Err(ProfilerError::Validation(
                "num_web_results must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ProfilerError::Validation(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ProfilerError::Validation("llm.model must not be empty".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ProfilerError::Validation(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        for (field, value) in [
            ("llm.base_url", &self.llm.base_url),
            ("semantic_scholar.base_url", &self.semantic_scholar.base_url),
            ("web_search.base_url", &self.web_search.base_url),
        ] {
            Url::parse(value).map_err(|e| {
                ProfilerError::Validation(format!("{} is not a valid URL ({}): {}", field, value, e))
            })?;
        }
        let has_paper = self
            .paper_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty());
        if !self.is_user_input && !has_paper {
            return Err(ProfilerError::Validation(
                "paper_name is required when is_user_input is false".to_string(),
            ));
        }
        Ok(())
    }
}

/// API keys read from the environment.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub tavily: Option<String>,
    pub semantic_scholar: Option<String>,
}

impl ApiKeys {
    /// Load `.env` if present, then read the key variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            openai: read(env::OPENAI_API_KEY),
            tavily: read(env::TAVILY_API_KEY),
            semantic_scholar: read(env::SEMANTIC_SCHOLAR_API_KEY),
        }
    }

    pub fn require_openai(&self) -> Result<String> {
        self.openai
            .clone()
            .ok_or_else(|| ProfilerError::Config(format!("{} is not set", env::OPENAI_API_KEY)))
    }

    pub fn require_tavily(&self) -> Result<String> {
        self.tavily
            .clone()
            .ok_or_else(|| ProfilerError::Config(format!("{} is not set", env::TAVILY_API_KEY)))
    }
}

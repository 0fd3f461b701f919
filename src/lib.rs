//! # coauthor_profiler
//!
//! Builds a readable profile of a paper's co-authors from bibliometric data
//! and open-web search results, summarized by a language model.
//!
//! ## Modules
//!
//! - [`pipeline`] - Stage orchestration with cached, resumable stages
//! - [`filter`] - Top-K paper trim, author ranking, citation-margin filter
//! - [`store`] - Artifact store and typed stage cache
//! - [`semanticscholar`] - Semantic Scholar paper and author lookup
//! - [`websearch`] - Tavily web search
//! - [`llm`] / [`summarizer`] / [`prompts`] - Language model summaries
//! - [`config`] - YAML configuration and API keys
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use coauthor_profiler::config::{ApiKeys, Config};
//! use coauthor_profiler::llm::OpenAiClient;
//! use coauthor_profiler::pipeline::AuthorProfiler;
//! use coauthor_profiler::semanticscholar::SemanticScholarClient;
//! use coauthor_profiler::store::FsStore;
//! use coauthor_profiler::summarizer::Summarizer;
//! use coauthor_profiler::websearch::TavilyClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml".as_ref())?;
//!     let keys = ApiKeys::from_env();
//!     let profiler = AuthorProfiler::new(
//!         Arc::new(SemanticScholarClient::new(&config.semantic_scholar, keys.semantic_scholar.clone(), config.retry.clone())?),
//!         Arc::new(TavilyClient::new(&config.web_search, keys.require_tavily()?, config.retry.clone())?),
//!         Summarizer::new(Arc::new(OpenAiClient::new(&config.llm, keys.require_openai()?, config.retry.clone())?)),
//!         Arc::new(FsStore::new(&config.output_dir)),
//!         (&config).into(),
//!     );
//!     let outcome = profiler.run("Attention Is All You Need").await?;
//!     println!("success: {}", outcome.is_success());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod retry;
pub mod semanticscholar;
pub mod store;
pub mod summarizer;
pub mod websearch;

pub use error::{ProfilerError, Result};

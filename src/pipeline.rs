//! Pipeline orchestrator.
//!
//! Runs the profiling stages for one paper, strictly in order:
//!
//! 1. Scholar extraction (cached as `scholar.json`)
//! 2. Filter & rank (skipped when stage 1 came from cache)
//! 3. Abstract summarization (part of stage 1's recompute path)
//! 4. Scholar synthesis (cached as `scholar_summary.txt`)
//! 5. Web search per author (cached as `search_result_<author>.txt`)
//! 6. Web synthesis per author (cached as `<author>_websummary.txt`)
//! 7. Final synthesis + HTML rendering (always recomputed)
//!
//! With reuse enabled, a stage whose artifact exists is loaded instead of
//! recomputed. An artifact that exists but cannot be read aborts the run.
//! For stages 5 and 6 the skip decision is "any file matches the stage
//! pattern"; each author's file must then exist, otherwise the run aborts.

use crate::config::Config;
use crate::error::Result;
use crate::filter::{filter_authors, removed_authors, FilterParams};
use crate::llm::TokenUsage;
use crate::models::AuthorRecord;
use crate::semanticscholar::BibliometricSource;
use crate::store::{author_file_stems, ArtifactKey, ArtifactPattern, ArtifactStore, StageCache};
use crate::summarizer::Summarizer;
use crate::websearch::WebSearch;
use chrono::Local;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Search text used when a search returns no hits.
pub const NO_WEB_RESULTS: &str = "No web search results found.";

/// Placeholder for an author whose web search failed.
pub const SEARCH_UNAVAILABLE: &str = "Web search results are unavailable for this author.";

/// Placeholder for an author whose web synthesis failed.
pub const SUMMARY_UNAVAILABLE: &str = "No web profile summary is available for this author.";

/// Placeholder for a paper whose abstract summary failed.
pub const ABSTRACT_UNAVAILABLE: &str = "Abstract summary unavailable.";

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ScholarExtraction,
    FilterRank,
    AbstractSummaries,
    ScholarSummary,
    WebSearch,
    WebSummary,
    FinalSynthesis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ScholarExtraction => "scholar extraction",
            Stage::FilterRank => "filter & rank",
            Stage::AbstractSummaries => "abstract summarization",
            Stage::ScholarSummary => "scholar synthesis",
            Stage::WebSearch => "web search",
            Stage::WebSummary => "web synthesis",
            Stage::FinalSynthesis => "final synthesis",
        };
        f.write_str(name)
    }
}

/// Knobs of a profiling run.
#[derive(Debug, Clone, Copy)]
pub struct ProfilerSettings {
    pub filter: FilterParams,
    pub num_web_results: usize,
    /// Load precomputed stage artifacts where present
    pub reuse_cached: bool,
    /// Propagate per-author failures instead of using placeholders
    pub abort_on_author_failure: bool,
}

impl From<&Config> for ProfilerSettings {
    fn from(config: &Config) -> Self {
        Self {
            filter: config.filter_params(),
            num_web_results: config.num_web_results,
            reuse_cached: config.is_load_precomputed_results,
            abort_on_author_failure: config.abort_on_author_failure,
        }
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileReport {
    pub paper_name: String,
    /// Final plain-text report, including the removed-authors note
    pub summary: String,
    pub html: String,
    /// Authors the report covers, in ranked order
    pub authors: Vec<AuthorRecord>,
    /// Authors dropped by the citation-margin filter
    pub removed_authors: Vec<String>,
    /// Stages that were loaded from cache instead of recomputed
    pub cached_stages: Vec<Stage>,
    pub token_usage: TokenUsage,
}

/// Result of one run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Success(ProfileReport),
    /// No paper matched the title
    PaperNotFound,
    /// The bibliometric lookup itself failed
    LookupFailed(String),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }

    pub fn report(&self) -> Option<&ProfileReport> {
        match self {
            RunOutcome::Success(report) => Some(report),
            _ => None,
        }
    }
}

/// Note appended to the final report when authors were filtered out.
pub fn removed_authors_note(removed: &[String]) -> String {
    format!("\n\nThe authors: {} are not well known.", removed.join(", "))
}

/// Concatenate per-author summaries as `name:\nsummary\n` blocks.
pub fn join_author_summaries(summaries: &[(String, String)]) -> String {
    summaries
        .iter()
        .map(|(name, summary)| format!("{}:\n{}\n", name, summary))
        .collect()
}

enum ScholarStage {
    Ready {
        authors: Vec<AuthorRecord>,
        removed: Vec<String>,
    },
    NotFound,
    Failed(String),
}

/// Drives all stages for one paper at a time.
pub struct AuthorProfiler {
    scholar: Arc<dyn BibliometricSource>,
    web: Arc<dyn WebSearch>,
    summarizer: Summarizer,
    store: Arc<dyn ArtifactStore>,
    settings: ProfilerSettings,
}

impl AuthorProfiler {
    pub fn new(
        scholar: Arc<dyn BibliometricSource>,
        web: Arc<dyn WebSearch>,
        summarizer: Summarizer,
        store: Arc<dyn ArtifactStore>,
        settings: ProfilerSettings,
    ) -> Self {
        Self {
            scholar,
            web,
            summarizer,
            store,
            settings,
        }
    }

    /// Profile the co-authors of `paper_name`.
    ///
    /// Lookup problems come back as `Ok(RunOutcome::PaperNotFound)` or
    /// `Ok(RunOutcome::LookupFailed)`. Broken cached artifacts and
    /// unrecoverable collaborator failures come back as `Err`.
    pub async fn run(&self, paper_name: &str) -> Result<RunOutcome> {
        let cache = StageCache::new(self.store.as_ref(), paper_name, self.settings.reuse_cached);
        let mut cached_stages = Vec::new();

        info!(paper = paper_name, dir = %cache.paper_dir().display(), "Starting author profile");

        // Stages 1-3
        let (authors, removed) = match cache.try_load_json::<Vec<AuthorRecord>>(&ArtifactKey::Scholar)? {
            Some(authors) => {
                info!(authors = authors.len(), "Loaded scholar data from cache, skipping extraction and filtering");
                cached_stages.extend([Stage::ScholarExtraction, Stage::FilterRank, Stage::AbstractSummaries]);
                (authors, Vec::new())
            }
            None => match self.extract_scholar_data(&cache, paper_name).await? {
                ScholarStage::Ready { authors, removed } => (authors, removed),
                ScholarStage::NotFound => return Ok(RunOutcome::PaperNotFound),
                ScholarStage::Failed(reason) => return Ok(RunOutcome::LookupFailed(reason)),
            },
        };
        let names = unique_names(&authors);
        let slots: Vec<(String, String)> = names
            .iter()
            .cloned()
            .zip(author_file_stems(&names))
            .collect();

        // Stage 4
        let scholar_summary = match cache.try_load_text(&ArtifactKey::ScholarSummary)? {
            Some(summary) => {
                info!(stage = %Stage::ScholarSummary, "Loaded from cache");
                cached_stages.push(Stage::ScholarSummary);
                summary
            }
            None => {
                info!(stage = %Stage::ScholarSummary, authors = authors.len(), "Computing");
                let summary = self.summarizer.summarize_scholar(paper_name, &authors).await?;
                cache.store_text(&ArtifactKey::ScholarSummary, &summary);
                summary
            }
        };

        // Stage 5
        let searches = if cache.is_pattern_cached(ArtifactPattern::SearchResults)? {
            info!(stage = %Stage::WebSearch, "Loading per-author search results from cache");
            cached_stages.push(Stage::WebSearch);
            load_per_author(&cache, &slots, |stem| ArtifactKey::SearchResult(stem.to_string()))?
        } else {
            info!(stage = %Stage::WebSearch, authors = slots.len(), "Computing");
            let mut searches = Vec::with_capacity(slots.len());
            for (name, stem) in &slots {
                let text = self.isolate(name, Stage::WebSearch, self.search_author(name).await, SEARCH_UNAVAILABLE)?;
                cache.store_text(&ArtifactKey::SearchResult(stem.clone()), &text);
                searches.push((name.clone(), text));
            }
            searches
        };

        // Stage 6
        let web_summaries = if cache.is_pattern_cached(ArtifactPattern::WebSummaries)? {
            info!(stage = %Stage::WebSummary, "Loading per-author web summaries from cache");
            cached_stages.push(Stage::WebSummary);
            load_per_author(&cache, &slots, |stem| ArtifactKey::WebSummary(stem.to_string()))?
        } else {
            info!(stage = %Stage::WebSummary, authors = searches.len(), "Computing");
            let mut summaries = Vec::with_capacity(searches.len());
            for ((name, search_text), (_, stem)) in searches.iter().zip(&slots) {
                let summary = self.isolate(
                    name,
                    Stage::WebSummary,
                    self.summarize_author(name, search_text).await,
                    SUMMARY_UNAVAILABLE,
                )?;
                cache.store_text(&ArtifactKey::WebSummary(stem.clone()), &summary);
                summaries.push((name.clone(), summary));
            }
            summaries
        };

        // Stage 7
        info!(stage = %Stage::FinalSynthesis, "Computing");
        let web_block = join_author_summaries(&web_summaries);
        let mut summary = self
            .summarizer
            .final_summary(paper_name, &scholar_summary, &web_block)
            .await?;
        if !removed.is_empty() {
            summary.push_str(&removed_authors_note(&removed));
        }
        cache.store_text(&ArtifactKey::FinalSummary, &summary);

        let html = self.summarizer.render_html(&summary).await?;
        cache.store_text(&ArtifactKey::FinalHtml, &html);

        let token_usage = self.summarizer.usage();
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        cache.store_text(&ArtifactKey::TokenUsage, &token_usage.log_line(&timestamp));

        info!(
            authors = authors.len(),
            removed = removed.len(),
            cached = cached_stages.len(),
            total_tokens = token_usage.total_tokens,
            "Author profile complete"
        );

        Ok(RunOutcome::Success(ProfileReport {
            paper_name: paper_name.to_string(),
            summary,
            html,
            authors,
            removed_authors: removed,
            cached_stages,
            token_usage,
        }))
    }

    /// Stages 1-3 on the recompute path: lookup, filter, abstract summaries.
    async fn extract_scholar_data(
        &self,
        cache: &StageCache<'_, dyn ArtifactStore>,
        paper_name: &str,
    ) -> Result<ScholarStage> {
        let lookup = match self.scholar.lookup(paper_name).await {
            Ok(Some(lookup)) => lookup,
            Ok(None) => {
                warn!(paper = paper_name, "Paper not found");
                return Ok(ScholarStage::NotFound);
            }
            Err(e) => {
                error!(paper = paper_name, error = %e, "Scholar request for the paper failed");
                return Ok(ScholarStage::Failed(e.to_string()));
            }
        };

        info!(stage = %Stage::ScholarExtraction, authors = lookup.authors.len(), "Computed");
        let raw_authors = lookup.authors;
        let mut authors = filter_authors(
            raw_authors.clone(),
            lookup.paper.citation_count,
            self.settings.filter,
        );
        let removed = removed_authors(&raw_authors, &authors);
        info!(
            kept = authors.len(),
            removed = removed.len(),
            paper_citations = lookup.paper.citation_count,
            "Authors filtered and ranked"
        );
        if authors.is_empty() {
            warn!(paper = paper_name, "No author passed the citation filter");
        }

        for author in &mut authors {
            for paper in &mut author.papers {
                let summary = self.summarizer.summarize_abstract(paper.r#abstract.as_deref()).await;
                paper.abstract_summary =
                    Some(self.isolate(&author.name, Stage::AbstractSummaries, summary, ABSTRACT_UNAVAILABLE)?);
            }
        }
        cache.store_json(&ArtifactKey::Scholar, &authors);

        Ok(ScholarStage::Ready { authors, removed })
    }

    /// Stage 5 for a single author.
    pub async fn search_author(&self, name: &str) -> Result<String> {
        let text = self.web.search(name, self.settings.num_web_results).await?;
        if text.trim().is_empty() {
            Ok(NO_WEB_RESULTS.to_string())
        } else {
            Ok(text)
        }
    }

    /// Stage 6 for a single author.
    pub async fn summarize_author(&self, name: &str, search_text: &str) -> Result<String> {
        self.summarizer.summarize_web(name, search_text).await
    }

    /// Replace a per-author failure by `placeholder` unless failures abort the run.
    fn isolate(&self, author: &str, stage: Stage, result: Result<String>, placeholder: &str) -> Result<String> {
        match result {
            Ok(text) => Ok(text),
            Err(e) if self.settings.abort_on_author_failure => Err(e),
            Err(e) => {
                warn!(author, stage = %stage, error = %e, "Author step failed, using placeholder");
                Ok(placeholder.to_string())
            }
        }
    }
}

/// Author names in order, first occurrence wins.
fn unique_names(authors: &[AuthorRecord]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(authors.len());
    for author in authors {
        if !names.contains(&author.name) {
            names.push(author.name.clone());
        }
    }
    names
}

/// Load one cached text per `(name, file stem)` slot. A missing file is fatal.
fn load_per_author<F>(
    cache: &StageCache<'_, dyn ArtifactStore>,
    slots: &[(String, String)],
    key: F,
) -> Result<Vec<(String, String)>>
where
    F: Fn(&str) -> ArtifactKey,
{
    let mut loaded = Vec::with_capacity(slots.len());
    for (name, stem) in slots {
        loaded.push((name.clone(), cache.load_text(&key(stem))?));
    }
    Ok(loaded)
}

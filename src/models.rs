//! Paper and author records flowing through the pipeline.
//!
//! `PaperRecord` is produced once by the bibliometric lookup and never changed.
//! `AuthorRecord` is trimmed by the filter stage and gains per-paper
//! `abstract_summary` values during abstract summarization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Author reference as listed on a paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRef {
    /// Semantic Scholar author ID, absent for unresolved authors
    #[serde(default)]
    pub author_id: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

/// Metadata of the paper under study.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub r#abstract: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    /// Citations of this paper. Missing counts are read as 0.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub citation_count: u64,
    #[serde(default)]
    pub authors: Vec<AuthorRef>,
    #[serde(default)]
    pub url: Option<String>,
    /// DOI, ArXiv, CorpusId, ... (values are strings or integers)
    #[serde(default)]
    pub external_ids: Option<BTreeMap<String, serde_json::Value>>,
}

/// One of an author's own publications.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    /// Sort key for the top-K trim.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub citations: u64,
    #[serde(default)]
    pub r#abstract: Option<String>,
    /// Set by the abstract-summarization stage. `None` means not yet processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_summary: Option<String>,
}

/// Bibliometric profile of one co-author.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub name: String,
    #[serde(default)]
    pub affiliations: Vec<String>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub citation_count: u64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub h_index: u64,
    #[serde(default)]
    pub papers: Vec<PaperEntry>,
}

impl AuthorRecord {
    /// Whether every paper already carries an abstract summary.
    pub fn is_summarized(&self) -> bool {
        self.papers.iter().all(|p| p.abstract_summary.is_some())
    }

    /// Plain-text profile handed to the scholar synthesis prompt.
    pub fn profile_text(&self) -> String {
        let papers = self
            .papers
            .iter()
            .map(|paper| {
                format!(
                    "paper title: {}, year: {}, number citations: {}. Summary of abstract: {}",
                    paper.title,
                    paper.year.map(|y| y.to_string()).unwrap_or_else(|| "unknown".to_string()),
                    paper.citations,
                    paper.abstract_summary.as_deref().unwrap_or("n/a"),
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Author: {}\nTotal Citations: {}\nh-index: {}\nThese are their papers with most citations:\n {}\n",
            self.name, self.citation_count, self.h_index, papers
        )
    }
}

/// Concatenated profiles of all authors, one blank line apart.
pub fn authors_info_text(authors: &[AuthorRecord]) -> String {
    authors
        .iter()
        .map(|a| a.profile_text() + "\n")
        .collect()
}

fn null_as_zero<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

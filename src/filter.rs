//! Author filtering and ranking.
//!
//! Pure functions over author records. The fixed order is:
//! trim papers per author, rank authors by citations, then drop authors
//! whose citation margin over the studied paper is below the threshold.

use crate::models::{AuthorRecord, PaperEntry};
use tracing::warn;

/// Keep the `k` most-cited papers. Equal citation counts keep input order.
pub fn top_k_papers(papers: &[PaperEntry], k: usize) -> Vec<PaperEntry> {
    let mut sorted = papers.to_vec();
    sorted.sort_by(|a, b| b.citations.cmp(&a.citations));
    sorted.truncate(k);
    sorted
}

/// Sort authors by total citations, descending. Stable for equal counts.
pub fn rank_authors(mut authors: Vec<AuthorRecord>) -> Vec<AuthorRecord> {
    authors.sort_by(|a, b| b.citation_count.cmp(&a.citation_count));
    authors
}

/// Citations an author has beyond those of the studied paper.
pub fn citation_margin(author: &AuthorRecord, paper_citations: u64) -> i64 {
    author.citation_count as i64 - paper_citations as i64
}

/// Keep authors with `citation_count - paper_citations >= threshold`.
pub fn filter_by_citation_margin(
    authors: Vec<AuthorRecord>,
    threshold: i64,
    paper_citations: u64,
) -> Vec<AuthorRecord> {
    authors
        .into_iter()
        .filter(|author| {
            let keep = citation_margin(author, paper_citations) >= threshold;
            if !keep {
                warn!(
                    author = %author.name,
                    citations = author.citation_count,
                    paper_citations,
                    threshold,
                    "Author filtered out because of low number of citations"
                );
            }
            keep
        })
        .collect()
}

/// Parameters of the filter stage.
#[derive(Debug, Clone, Copy)]
pub struct FilterParams {
    /// Papers kept per author
    pub top_k: usize,
    /// Minimum citation margin
    pub threshold: i64,
}

/// Full filter stage: trim, rank, then apply the margin filter.
pub fn filter_authors(
    authors: Vec<AuthorRecord>,
    paper_citations: u64,
    params: FilterParams,
) -> Vec<AuthorRecord> {
    let trimmed = authors
        .into_iter()
        .map(|mut author| {
            author.papers = top_k_papers(&author.papers, params.top_k);
            author
        })
        .collect();

    filter_by_citation_margin(rank_authors(trimmed), params.threshold, paper_citations)
}

/// Names present before filtering but absent after, in input order without duplicates.
pub fn removed_authors(before: &[AuthorRecord], after: &[AuthorRecord]) -> Vec<String> {
    let mut removed: Vec<String> = Vec::new();
    for author in before {
        let survived = after.iter().any(|a| a.name == author.name);
        if !survived && !removed.contains(&author.name) {
            removed.push(author.name.clone());
        }
    }
    removed
}

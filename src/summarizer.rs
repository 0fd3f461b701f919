//! Summarization engine.
//!
//! Binds the fixed prompt templates to a [`LanguageModel`]. Stateless apart
//! from the model's own token accounting.

use crate::error::Result;
use crate::llm::{LanguageModel, TokenUsage};
use crate::models::{authors_info_text, AuthorRecord};
use crate::prompts::{PromptTemplate, PromptVars};
use std::sync::Arc;
use tracing::debug;

/// Summary recorded for papers without an abstract. No model call is made.
pub const NO_ABSTRACT_SUMMARY: &str = "No abstract available.";

#[derive(Clone)]
pub struct Summarizer {
    model: Arc<dyn LanguageModel>,
}

impl Summarizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Render `template` with `vars` and run it through the model.
    pub async fn infer(&self, template: PromptTemplate, vars: PromptVars) -> Result<String> {
        let prompt = template.render(&vars)?;
        debug!(template = ?template, "Running inference");
        self.model.complete(prompt.system, &prompt.user).await
    }

    pub async fn summarize_abstract(&self, abstract_text: Option<&str>) -> Result<String> {
        match abstract_text.map(str::trim).filter(|a| !a.is_empty()) {
            Some(text) => {
                self.infer(
                    PromptTemplate::AbstractSummary,
                    PromptVars::from([("abstract_text", text.to_string())]),
                )
                .await
            }
            None => Ok(NO_ABSTRACT_SUMMARY.to_string()),
        }
    }

    /// Academic impact of all authors, from their bibliometric profiles.
    pub async fn summarize_scholar(&self, paper_name: &str, authors: &[AuthorRecord]) -> Result<String> {
        self.infer(
            PromptTemplate::ScholarSummary,
            PromptVars::from([
                ("paper_name", paper_name.to_string()),
                ("authors_info", authors_info_text(authors)),
            ]),
        )
        .await
    }

    pub async fn summarize_web(&self, author_name: &str, search_text: &str) -> Result<String> {
        self.infer(
            PromptTemplate::WebSummary,
            PromptVars::from([
                ("author_name", author_name.to_string()),
                ("search_text", search_text.to_string()),
            ]),
        )
        .await
    }

    pub async fn final_summary(
        &self,
        paper_name: &str,
        scholar_summary: &str,
        web_summary: &str,
    ) -> Result<String> {
        self.infer(
            PromptTemplate::FinalSummary,
            PromptVars::from([
                ("paper_name", paper_name.to_string()),
                ("scholar_summary", scholar_summary.to_string()),
                ("web_summary", web_summary.to_string()),
            ]),
        )
        .await
    }

    pub async fn render_html(&self, final_summary: &str) -> Result<String> {
        self.infer(
            PromptTemplate::HtmlRender,
            PromptVars::from([("author_summary", final_summary.to_string())]),
        )
        .await
    }

    pub fn usage(&self) -> TokenUsage {
        self.model.usage()
    }
}

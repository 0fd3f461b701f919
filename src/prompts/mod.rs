//! Prompt module for LLM-based operations.
//!
//! The summarization engine knows five fixed templates. Each declares the
//! variable slots it needs; rendering fails when one is missing.

pub mod author_profile;

use crate::error::{ProfilerError, Result};
use author_profile::*;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static SLOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("static pattern is valid"));

/// Variables bound to template slots.
pub type PromptVars = BTreeMap<&'static str, String>;

/// The fixed prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptTemplate {
    AbstractSummary,
    ScholarSummary,
    WebSummary,
    FinalSummary,
    HtmlRender,
}

/// A rendered system + user message pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: &'static str,
    pub user: String,
}

impl PromptTemplate {
    pub fn system(&self) -> &'static str {
        match self {
            PromptTemplate::HtmlRender => HTML_FORMATTER_SYSTEM,
            _ => RESEARCH_ASSISTANT_SYSTEM,
        }
    }

    fn user_template(&self) -> &'static str {
        match self {
            PromptTemplate::AbstractSummary => ABSTRACT_SUMMARY_TEMPLATE,
            PromptTemplate::ScholarSummary => SCHOLAR_SUMMARY_TEMPLATE,
            PromptTemplate::WebSummary => WEB_SUMMARY_TEMPLATE,
            PromptTemplate::FinalSummary => FINAL_SUMMARY_TEMPLATE,
            PromptTemplate::HtmlRender => HTML_RENDER_TEMPLATE,
        }
    }

    /// Slot names the template expects.
    pub fn slots(&self) -> &'static [&'static str] {
        match self {
            PromptTemplate::AbstractSummary => &["abstract_text"],
            PromptTemplate::ScholarSummary => &["paper_name", "authors_info"],
            PromptTemplate::WebSummary => &["author_name", "search_text"],
            PromptTemplate::FinalSummary => &["paper_name", "scholar_summary", "web_summary"],
            PromptTemplate::HtmlRender => &["author_summary"],
        }
    }

    /// Fill all slots in one pass, so braces inside values stay untouched.
    pub fn render(&self, vars: &PromptVars) -> Result<Prompt> {
        if let Some(missing) = self.slots().iter().find(|slot| !vars.contains_key(*slot)) {
            return Err(ProfilerError::Validation(format!(
                "prompt {:?} is missing variable '{}'",
                self, missing
            )));
        }

        let user = SLOT.replace_all(self.user_template(), |caps: &Captures| {
            vars.get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        });

        Ok(Prompt {
            system: self.system(),
            user: user.into_owned(),
        })
    }
}

//! Prompts for building a co-author profile.
//!
//! Every template is a system prompt plus a user prompt with `{slot}`
//! placeholders. Slots are filled by [`super::PromptTemplate::render`].

/// Shared system prompt for the summarization steps
pub const RESEARCH_ASSISTANT_SYSTEM: &str =
    "You are an expert research assistant who writes concise academic summaries.";

/// System prompt for the HTML rendering step
pub const HTML_FORMATTER_SYSTEM: &str =
    "You are an expert at formatting academic content for clean HTML display.";

/// Placeholders: {abstract_text}
pub const ABSTRACT_SUMMARY_TEMPLATE: &str = "Summarize the following abstract in a maximum of 3 short sentences or keywords. \
Focus mainly on the research direction and avoid long formulations:\n\n{abstract_text}";

/// Placeholders: {paper_name}, {authors_info}
pub const SCHOLAR_SUMMARY_TEMPLATE: &str = r#"Summarize the academic impact of each of the following authors in a short paragraph.
They coauthored the paper {paper_name}.
If they coauthored an impactful paper, do not list it for every author; state that they coauthored it.
It should be clear from your summary which authors have other impactful papers and which only have the common one.

{authors_info}"#;

/// Placeholders: {author_name}, {search_text}
pub const WEB_SUMMARY_TEMPLATE: &str =
    "Summarize the public research profile and affiliations of {author_name} based on this search:\n\n{search_text}";

/// Placeholders: {paper_name}, {scholar_summary}, {web_summary}
pub const FINAL_SUMMARY_TEMPLATE: &str = r#"From the scholar summary and the web search summary below about these researchers, create a final summary of each author.
Highlight their affiliations, the focus of their research, and important papers or projects they worked on. Specifically mention their citation count.
Do not highlight the paper {paper_name}, as the reader already knows that the authors coauthored it.

Scholar summary:
{scholar_summary}

Web search summary:
{web_summary}"#;

/// Placeholders: {author_summary}
pub const HTML_RENDER_TEMPLATE: &str = r#"Format the following author summary into clean, semantic HTML for use on a webpage.

- Use <h2> for each author name.
- Display the text content for each author unchanged below the author name.

Author summary:

{author_summary}"#;

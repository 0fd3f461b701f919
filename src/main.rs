//! coauthor-profiler - profile the co-authors of a paper
//!
//! Looks the paper up on Semantic Scholar, filters and ranks its authors,
//! searches the web for each of them and merges everything into a final
//! report (`final_summary.txt` and `final_summary.html`).
//!
//! ## Usage
//!
//! ```bash
//! coauthor-profiler --config config.yaml
//! coauthor-profiler --config config.yaml --paper "Attention Is All You Need"
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use coauthor_profiler::config::{ApiKeys, Config};
use coauthor_profiler::llm::OpenAiClient;
use coauthor_profiler::pipeline::{AuthorProfiler, RunOutcome};
use coauthor_profiler::semanticscholar::SemanticScholarClient;
use coauthor_profiler::store::FsStore;
use coauthor_profiler::summarizer::Summarizer;
use coauthor_profiler::websearch::TavilyClient;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Co-author profiles from bibliometrics, web search and LLM summaries
#[derive(Parser)]
#[command(name = "coauthor-profiler")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Paper title, overrides `paper_name` and disables interactive input
    #[arg(short, long)]
    paper: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.json_logs);

    let mut config = Config::read(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    if let Some(paper) = cli.paper {
        config.override_paper(paper);
    }
    config
        .validate()
        .with_context(|| format!("Invalid config {}", cli.config.display()))?;

    let profiler = build_profiler(&config)?;
    run_loop(&profiler, &config).await
}

fn init_logging(debug: bool, json: bool) {
    let log_level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let builder = fmt().with_env_filter(filter).with_target(true).with_thread_ids(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_profiler(config: &Config) -> Result<AuthorProfiler> {
    let keys = ApiKeys::from_env();

    let scholar = SemanticScholarClient::new(
        &config.semantic_scholar,
        keys.semantic_scholar.clone(),
        config.retry.clone(),
    )?;
    let web = TavilyClient::new(&config.web_search, keys.require_tavily()?, config.retry.clone())?;
    let llm = OpenAiClient::new(&config.llm, keys.require_openai()?, config.retry.clone())?;
    info!(model = %llm.model(), output = %config.output_dir.display(), "Clients ready");

    Ok(AuthorProfiler::new(
        Arc::new(scholar),
        Arc::new(web),
        Summarizer::new(Arc::new(llm)),
        Arc::new(FsStore::new(&config.output_dir)),
        config.into(),
    ))
}

// ============================================================================
// Run Loop
// ============================================================================

/// Non-interactive: one attempt. Interactive: re-prompt until a run succeeds.
async fn run_loop(profiler: &AuthorProfiler, config: &Config) -> Result<()> {
    loop {
        let paper_name = if config.is_user_input {
            match prompt_paper_name()? {
                Some(name) => name,
                None => {
                    println!("No input, exiting.");
                    return Ok(());
                }
            }
        } else {
            config
                .paper_name
                .clone()
                .context("paper_name is missing from the config")?
        };

        let outcome = profiler
            .run(&paper_name)
            .await
            .with_context(|| format!("Profiling '{}' aborted", paper_name))?;

        match outcome {
            RunOutcome::Success(report) => {
                println!("{}", report.summary);
                println!(
                    "\n✓ Profile complete. Results in: {}",
                    config.output_dir.display()
                );
                return Ok(());
            }
            RunOutcome::PaperNotFound | RunOutcome::LookupFailed(_) => {
                if let RunOutcome::LookupFailed(reason) = &outcome {
                    error!(reason = %reason, "Paper lookup failed");
                }
                println!("Fetching Author information failed.");
                if config.is_user_input {
                    println!("Input paper name again, check for typos.");
                } else {
                    println!("Check config 'paper_name' field for typos.");
                    return Ok(());
                }
            }
        }
    }
}

/// Read one non-empty title from stdin. `None` on end of input.
fn prompt_paper_name() -> Result<Option<String>> {
    let stdin = io::stdin();
    loop {
        print!("Enter the paper name: ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        let input = input.trim();
        if !input.is_empty() {
            return Ok(Some(input.to_string()));
        }
    }
}

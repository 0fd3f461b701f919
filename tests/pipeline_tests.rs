//! End-to-end pipeline tests against deterministic in-process collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use coauthor_profiler::filter::FilterParams;
use coauthor_profiler::llm::LanguageModel;
use coauthor_profiler::models::{AuthorRecord, PaperEntry, PaperRecord};
use coauthor_profiler::pipeline::{
    AuthorProfiler, ProfilerSettings, RunOutcome, Stage, NO_WEB_RESULTS, SEARCH_UNAVAILABLE,
};
use coauthor_profiler::semanticscholar::{BibliometricSource, ScholarLookup};
use coauthor_profiler::store::{ArtifactStore, FsStore, MemoryStore};
use coauthor_profiler::summarizer::{Summarizer, NO_ABSTRACT_SUMMARY};
use coauthor_profiler::websearch::WebSearch;
use coauthor_profiler::{ProfilerError, Result};

const PAPER: &str = "Test Paper";

// =============================================================================
// Fakes
// =============================================================================

enum LookupMode {
    Found(ScholarLookup),
    NotFound,
    Fails,
}

struct FakeScholar {
    mode: LookupMode,
    calls: AtomicUsize,
}

#[async_trait]
impl BibliometricSource for FakeScholar {
    async fn lookup(&self, _title: &str) -> Result<Option<ScholarLookup>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            LookupMode::Found(lookup) => Ok(Some(lookup.clone())),
            LookupMode::NotFound => Ok(None),
            LookupMode::Fails => Err(ProfilerError::Api {
                code: 503,
                message: "service unavailable".to_string(),
            }),
        }
    }
}

/// Returns one line per author; fails for `fail_for`, empty for `empty_for`.
#[derive(Default)]
struct FakeWeb {
    fail_for: Option<&'static str>,
    empty_for: Option<&'static str>,
    calls: AtomicUsize,
}

#[async_trait]
impl WebSearch for FakeWeb {
    async fn search(&self, query: &str, _max_results: usize) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_for == Some(query) {
            return Err(ProfilerError::Api {
                code: 500,
                message: "search backend down".to_string(),
            });
        }
        if self.empty_for == Some(query) {
            return Ok(String::new());
        }
        Ok(format!("Homepage: {} is a researcher", query))
    }
}

/// Output depends only on the prompt, so reruns are reproducible.
#[derive(Default)]
struct FakeModel {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(user.to_string());
        Ok(format!("summary[{}:{}]", system.len(), user.len()))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn paper(title: &str, citations: u64, abstract_text: Option<&str>) -> PaperEntry {
    PaperEntry {
        title: title.to_string(),
        year: Some(2020),
        citations,
        r#abstract: abstract_text.map(String::from),
        abstract_summary: None,
    }
}

fn author(name: &str, citation_count: u64, papers: Vec<PaperEntry>) -> AuthorRecord {
    AuthorRecord {
        name: name.to_string(),
        affiliations: vec!["Example University".to_string()],
        citation_count,
        h_index: 10,
        papers,
    }
}

/// Paper with 1000 citations. Bob's margin is 50 and falls below the threshold.
fn sample_lookup() -> ScholarLookup {
    ScholarLookup {
        paper: PaperRecord {
            title: PAPER.to_string(),
            citation_count: 1000,
            ..Default::default()
        },
        authors: vec![
            author("Bob", 1050, vec![paper("B1", 5, Some("Bob's abstract"))]),
            author(
                "Alice",
                5000,
                vec![
                    paper("A1", 10, Some("Low impact")),
                    paper("A2", 500, Some("High impact")),
                    paper("A3", 100, None),
                ],
            ),
            author("Carol", 2000, vec![paper("C1", 50, Some("Carol's abstract"))]),
        ],
    }
}

fn settings(reuse_cached: bool) -> ProfilerSettings {
    ProfilerSettings {
        filter: FilterParams {
            top_k: 2,
            threshold: 100,
        },
        num_web_results: 3,
        reuse_cached,
        abort_on_author_failure: false,
    }
}

struct Harness {
    profiler: AuthorProfiler,
    scholar: Arc<FakeScholar>,
    web: Arc<FakeWeb>,
    model: Arc<FakeModel>,
}

fn harness(
    mode: LookupMode,
    web: FakeWeb,
    store: Arc<dyn ArtifactStore>,
    settings: ProfilerSettings,
) -> Harness {
    let scholar = Arc::new(FakeScholar {
        mode,
        calls: AtomicUsize::new(0),
    });
    let web = Arc::new(web);
    let model = Arc::new(FakeModel::default());
    let profiler = AuthorProfiler::new(
        scholar.clone(),
        web.clone(),
        Summarizer::new(model.clone()),
        store,
        settings,
    );
    Harness {
        profiler,
        scholar,
        web,
        model,
    }
}

fn artifact(name: &str) -> String {
    format!("{}/{}", PAPER, name)
}

fn intermediate(name: &str) -> String {
    format!("{}/intermediate_results/{}", PAPER, name)
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_full_run_writes_every_artifact() {
    let store = Arc::new(MemoryStore::new());
    let h = harness(LookupMode::Found(sample_lookup()), FakeWeb::default(), store.clone(), settings(false));

    let outcome = h.profiler.run(PAPER).await.unwrap();
    let report = outcome.report().expect("run should succeed");

    let names: Vec<&str> = report.authors.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Carol"]);
    assert_eq!(report.removed_authors, vec!["Bob"]);
    assert!(report.summary.ends_with("\n\nThe authors: Bob are not well known."));
    assert!(report.cached_stages.is_empty());

    // Top-2 papers, most cited first, every paper summarized
    let alice = &report.authors[0];
    let titles: Vec<&str> = alice.papers.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["A2", "A3"]);
    assert!(report.authors.iter().all(AuthorRecord::is_summarized));
    assert_eq!(alice.papers[1].abstract_summary.as_deref(), Some(NO_ABSTRACT_SUMMARY));

    // 2 abstracts + scholar + 2 web summaries + final + html
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 7);
    assert_eq!(h.web.calls.load(Ordering::SeqCst), 2);

    assert_eq!(store.get(artifact("final_summary.txt")), Some(report.summary.clone()));
    assert_eq!(store.get(artifact("final_summary.html")), Some(report.html.clone()));
    assert!(store.get(artifact("scholar_summary.txt")).is_some());
    assert_eq!(
        store.get(intermediate("search_result_Alice.txt")).as_deref(),
        Some("Homepage: Alice is a researcher")
    );
    assert!(store.get(intermediate("Carol_websummary.txt")).is_some());
    assert!(store.get(intermediate("token_usage.log")).is_some());
    assert!(store.get(intermediate("search_result_Bob.txt")).is_none());

    let persisted: Vec<AuthorRecord> =
        serde_json::from_str(&store.get(intermediate("scholar.json")).unwrap()).unwrap();
    assert_eq!(persisted, report.authors);
}

#[tokio::test]
async fn test_paper_not_found_writes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let h = harness(LookupMode::NotFound, FakeWeb::default(), store.clone(), settings(false));

    let outcome = h.profiler.run("Nonexistent Paper Title XYZ").await.unwrap();
    assert_eq!(outcome, RunOutcome::PaperNotFound);
    assert!(store.paths().is_empty());
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.web.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_lookup_failure_is_reported_not_raised() {
    let store = Arc::new(MemoryStore::new());
    let h = harness(LookupMode::Fails, FakeWeb::default(), store.clone(), settings(false));

    match h.profiler.run(PAPER).await.unwrap() {
        RunOutcome::LookupFailed(reason) => assert!(reason.contains("503")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(store.paths().is_empty());
}

#[tokio::test]
async fn test_cached_run_skips_extraction_and_search() {
    let store = Arc::new(MemoryStore::new());
    let first = harness(LookupMode::Found(sample_lookup()), FakeWeb::default(), store.clone(), settings(true));
    let first_report = first.profiler.run(PAPER).await.unwrap();
    assert!(first_report.is_success());

    let second = harness(LookupMode::Found(sample_lookup()), FakeWeb::default(), store.clone(), settings(true));
    let outcome = second.profiler.run(PAPER).await.unwrap();
    let report = outcome.report().expect("cached run should succeed");

    assert_eq!(second.scholar.calls.load(Ordering::SeqCst), 0);
    assert_eq!(second.web.calls.load(Ordering::SeqCst), 0);
    // final + html only
    assert_eq!(second.model.calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        report.cached_stages,
        vec![
            Stage::ScholarExtraction,
            Stage::FilterRank,
            Stage::AbstractSummaries,
            Stage::ScholarSummary,
            Stage::WebSearch,
            Stage::WebSummary,
        ]
    );
    // The removed list is not persisted, so a cached run carries no note
    assert!(report.removed_authors.is_empty());
    assert!(!report.summary.contains("not well known"));
}

#[tokio::test]
async fn test_cached_reruns_are_byte_identical() {
    let store = Arc::new(MemoryStore::new());
    let seed = harness(LookupMode::Found(sample_lookup()), FakeWeb::default(), store.clone(), settings(true));
    seed.profiler.run(PAPER).await.unwrap();

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let h = harness(LookupMode::Found(sample_lookup()), FakeWeb::default(), store.clone(), settings(true));
        h.profiler.run(PAPER).await.unwrap();
        outputs.push(store.get(artifact("final_summary.txt")).unwrap());
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn test_corrupt_scholar_cache_aborts_before_any_call() {
    let store = Arc::new(MemoryStore::new());
    store.insert(intermediate("scholar.json"), "{ not json");
    let h = harness(LookupMode::Found(sample_lookup()), FakeWeb::default(), store.clone(), settings(true));

    let err = h.profiler.run(PAPER).await.unwrap_err();
    assert!(matches!(err, ProfilerError::CorruptArtifact { .. }));
    assert!(err.is_fatal_cache_error());
    assert_eq!(h.scholar.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
    assert!(store.get(artifact("final_summary.txt")).is_none());
}

#[tokio::test]
async fn test_empty_cached_artifact_is_corrupt() {
    let store = Arc::new(MemoryStore::new());
    store.insert(intermediate("scholar.json"), "[]");
    store.insert(artifact("scholar_summary.txt"), "   ");
    let h = harness(LookupMode::Found(sample_lookup()), FakeWeb::default(), store.clone(), settings(true));

    let err = h.profiler.run(PAPER).await.unwrap_err();
    assert!(matches!(err, ProfilerError::CorruptArtifact { .. }));
}

#[tokio::test]
async fn test_reuse_disabled_ignores_existing_artifacts() {
    let store = Arc::new(MemoryStore::new());
    store.insert(intermediate("scholar.json"), "{ not json");
    let h = harness(LookupMode::Found(sample_lookup()), FakeWeb::default(), store.clone(), settings(false));

    assert!(h.profiler.run(PAPER).await.unwrap().is_success());
    assert_eq!(h.scholar.calls.load(Ordering::SeqCst), 1);
    // Overwritten with fresh data
    let persisted: Vec<AuthorRecord> =
        serde_json::from_str(&store.get(intermediate("scholar.json")).unwrap()).unwrap();
    assert_eq!(persisted.len(), 2);
}

#[tokio::test]
async fn test_missing_per_author_file_is_fatal() {
    let authors = vec![author("Alice", 5000, vec![]), author("Carol", 2000, vec![])];
    let store = Arc::new(MemoryStore::new());
    store.insert(intermediate("scholar.json"), serde_json::to_string(&authors).unwrap());
    store.insert(artifact("scholar_summary.txt"), "Scholar summary");
    store.insert(intermediate("search_result_Alice.txt"), "Homepage: Alice");

    let h = harness(LookupMode::Found(sample_lookup()), FakeWeb::default(), store.clone(), settings(true));
    match h.profiler.run(PAPER).await.unwrap_err() {
        ProfilerError::MissingArtifact { path } => {
            assert!(path.ends_with("search_result_Carol.txt"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(h.web.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_author_failure_uses_placeholder() {
    let store = Arc::new(MemoryStore::new());
    let web = FakeWeb {
        fail_for: Some("Carol"),
        ..Default::default()
    };
    let h = harness(LookupMode::Found(sample_lookup()), web, store.clone(), settings(false));

    assert!(h.profiler.run(PAPER).await.unwrap().is_success());
    assert_eq!(
        store.get(intermediate("search_result_Carol.txt")).as_deref(),
        Some(SEARCH_UNAVAILABLE)
    );
    assert!(store.get(intermediate("Carol_websummary.txt")).is_some());
}

#[tokio::test]
async fn test_author_failure_aborts_when_configured() {
    let store = Arc::new(MemoryStore::new());
    let web = FakeWeb {
        fail_for: Some("Carol"),
        ..Default::default()
    };
    let strict = ProfilerSettings {
        abort_on_author_failure: true,
        ..settings(false)
    };
    let h = harness(LookupMode::Found(sample_lookup()), web, store.clone(), strict);

    let err = h.profiler.run(PAPER).await.unwrap_err();
    assert!(matches!(err, ProfilerError::Api { code: 500, .. }));
    assert!(store.get(artifact("final_summary.txt")).is_none());
}

#[tokio::test]
async fn test_empty_search_text_is_replaced() {
    let store = Arc::new(MemoryStore::new());
    let web = FakeWeb {
        empty_for: Some("Alice"),
        ..Default::default()
    };
    let h = harness(LookupMode::Found(sample_lookup()), web, store.clone(), settings(false));

    assert_eq!(h.profiler.search_author("Alice").await.unwrap(), NO_WEB_RESULTS);
    assert!(h.profiler.run(PAPER).await.unwrap().is_success());
    assert_eq!(
        store.get(intermediate("search_result_Alice.txt")).as_deref(),
        Some(NO_WEB_RESULTS)
    );
}

#[tokio::test]
async fn test_write_failures_do_not_fail_the_run() {
    let store = Arc::new(MemoryStore::failing_writes());
    let h = harness(LookupMode::Found(sample_lookup()), FakeWeb::default(), store.clone(), settings(false));

    let outcome = h.profiler.run(PAPER).await.unwrap();
    assert!(outcome.is_success());
    assert!(store.paths().is_empty());
}

#[tokio::test]
async fn test_filesystem_store_layout() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FsStore::new(dir.path()));
    let h = harness(LookupMode::Found(sample_lookup()), FakeWeb::default(), store, settings(true));

    assert!(h.profiler.run(PAPER).await.unwrap().is_success());

    let paper_dir = dir.path().join(PAPER);
    assert!(paper_dir.join("final_summary.txt").is_file());
    assert!(paper_dir.join("final_summary.html").is_file());
    assert!(paper_dir.join("scholar_summary.txt").is_file());
    assert!(paper_dir.join("intermediate_results/scholar.json").is_file());
    assert!(paper_dir.join("intermediate_results/Alice_websummary.txt").is_file());
}

#[tokio::test]
async fn test_cached_author_list_is_used_verbatim() {
    // Unsorted, untrimmed and below the citation threshold: the filter would change all of it
    let cached = vec![
        author(
            "Low",
            10,
            vec![paper("L1", 1, None), paper("L2", 2, None), paper("L3", 3, None)],
        ),
        author("High", 9000, vec![]),
    ];
    let store = Arc::new(MemoryStore::new());
    store.insert(intermediate("scholar.json"), serde_json::to_string(&cached).unwrap());
    let h = harness(LookupMode::Found(sample_lookup()), FakeWeb::default(), store.clone(), settings(true));

    let outcome = h.profiler.run(PAPER).await.unwrap();
    let report = outcome.report().expect("cached run should succeed");

    assert_eq!(report.authors, cached);
    assert!(report.removed_authors.is_empty());
    assert_eq!(h.scholar.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.web.calls.load(Ordering::SeqCst), 2);
}

fn colliding_lookup() -> ScholarLookup {
    ScholarLookup {
        paper: PaperRecord {
            title: PAPER.to_string(),
            citation_count: 0,
            ..Default::default()
        },
        authors: vec![author("Jane Doe", 5000, vec![]), author("Jane Doe.", 4000, vec![])],
    }
}

#[tokio::test]
async fn test_colliding_author_names_get_separate_artifacts() {
    let store = Arc::new(MemoryStore::new());
    let h = harness(LookupMode::Found(colliding_lookup()), FakeWeb::default(), store.clone(), settings(true));

    let outcome = h.profiler.run(PAPER).await.unwrap();
    assert_eq!(outcome.report().map(|r| r.authors.len()), Some(2));

    assert_eq!(
        store.get(intermediate("search_result_Jane Doe.txt")).as_deref(),
        Some("Homepage: Jane Doe is a researcher")
    );
    assert_eq!(
        store.get(intermediate("search_result_Jane Doe_2.txt")).as_deref(),
        Some("Homepage: Jane Doe. is a researcher")
    );
    assert!(store.get(intermediate("Jane Doe_websummary.txt")).is_some());
    assert!(store.get(intermediate("Jane Doe_2_websummary.txt")).is_some());
}

#[tokio::test]
async fn test_colliding_author_names_load_their_own_cache() {
    let authors = colliding_lookup().authors;
    let store = Arc::new(MemoryStore::new());
    store.insert(intermediate("scholar.json"), serde_json::to_string(&authors).unwrap());
    store.insert(artifact("scholar_summary.txt"), "Scholar summary");
    store.insert(intermediate("search_result_Jane Doe.txt"), "Robotics lab");
    store.insert(intermediate("search_result_Jane Doe_2.txt"), "Database group");
    store.insert(intermediate("Jane Doe_websummary.txt"), "Works on robotics");
    store.insert(intermediate("Jane Doe_2_websummary.txt"), "Works on databases");

    let h = harness(LookupMode::Found(colliding_lookup()), FakeWeb::default(), store.clone(), settings(true));
    assert!(h.profiler.run(PAPER).await.unwrap().is_success());

    // final synthesis, then html
    let prompts = h.model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("Jane Doe:\nWorks on robotics\nJane Doe.:\nWorks on databases\n"));
}

//! Artifact store and stage cache.
//!
//! Every pipeline stage persists its output under a per-paper directory:
//!
//! ```text
//! <root>/<sanitized-paper-name>/
//!   intermediate_results/scholar.json
//!   intermediate_results/search_result_<author>.txt
//!   intermediate_results/<author>_websummary.txt
//!   intermediate_results/token_usage.log
//!   scholar_summary.txt
//!   final_summary.txt
//!   final_summary.html
//! ```
//!
//! [`ArtifactStore`] is the raw byte-level backend (filesystem or memory).
//! [`StageCache`] layers typed keys and the load/store contract on top:
//! writes never fail the run, while reading an artifact that a stage was
//! told to trust is fatal when it is absent or unreadable.

use crate::error::{ProfilerError, Result};
use globset::Glob;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use tracing::{debug, error, info, warn};

/// Sub-directory holding per-stage intermediate artifacts.
pub const INTERMEDIATE_DIR: &str = "intermediate_results";

static ILLEGAL_PATH_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"|?*/\\\n\r\t]"#).expect("static pattern is valid"));

/// Make a string safe to use as a single path component.
///
/// Removes characters illegal in file names, trims whitespace and strips
/// trailing dots and spaces. Falls back to `untitled` when nothing is left.
pub fn sanitize_component(name: &str) -> String {
    let cleaned = ILLEGAL_PATH_CHARS.replace_all(name, "");
    let trimmed = cleaned.trim().trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// One file-name stem per author, distinct even when names sanitize alike.
///
/// Stems are assigned in input order: the first author keeps the plain
/// sanitized name, later collisions get `_2`, `_3`, ... appended.
pub fn author_file_stems(names: &[String]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::with_capacity(names.len());
    let mut stems = Vec::with_capacity(names.len());
    for name in names {
        let base = sanitize_component(name);
        let mut stem = base.clone();
        let mut ordinal = 2;
        while used.contains(&stem) {
            stem = format!("{}_{}", base, ordinal);
            ordinal += 1;
        }
        if stem != base {
            warn!(author = %name, file = %stem, "Author name collides with another after sanitizing");
        }
        used.insert(stem.clone());
        stems.push(stem);
    }
    stems
}

/// Named artifact inside a paper directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKey {
    /// Filtered and abstract-summarized author list (JSON)
    Scholar,
    /// Scholar synthesis text
    ScholarSummary,
    /// Raw web search text, keyed by author file stem
    SearchResult(String),
    /// Web synthesis, keyed by author file stem
    WebSummary(String),
    FinalSummary,
    FinalHtml,
    /// Token accounting log line
    TokenUsage,
}

impl ArtifactKey {
    /// Path relative to the paper directory.
    pub fn relative_path(&self) -> PathBuf {
        let intermediate = Path::new(INTERMEDIATE_DIR);
        match self {
            ArtifactKey::Scholar => intermediate.join("scholar.json"),
            ArtifactKey::ScholarSummary => PathBuf::from("scholar_summary.txt"),
            ArtifactKey::SearchResult(author) => {
                intermediate.join(format!("search_result_{}.txt", sanitize_component(author)))
            }
            ArtifactKey::WebSummary(author) => {
                intermediate.join(format!("{}_websummary.txt", sanitize_component(author)))
            }
            ArtifactKey::FinalSummary => PathBuf::from("final_summary.txt"),
            ArtifactKey::FinalHtml => PathBuf::from("final_summary.html"),
            ArtifactKey::TokenUsage => intermediate.join("token_usage.log"),
        }
    }
}

/// File-name pattern for a per-author stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactPattern {
    SearchResults,
    WebSummaries,
}

impl ArtifactPattern {
    /// Directory (relative to the paper directory) and glob over file names.
    pub fn parts(&self) -> (&'static str, &'static str) {
        match self {
            ArtifactPattern::SearchResults => (INTERMEDIATE_DIR, "search_result_*.txt"),
            ArtifactPattern::WebSummaries => (INTERMEDIATE_DIR, "*_websummary.txt"),
        }
    }
}

/// Byte-level storage backend. Paths are relative to the store root.
pub trait ArtifactStore: Send + Sync {
    /// Read a file. `Ok(None)` when it does not exist.
    fn read(&self, path: &Path) -> Result<Option<String>>;

    /// Write a file, creating any missing parent directory.
    fn write(&self, path: &Path, contents: &str) -> Result<()>;

    /// Whether a file exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// File names directly inside `dir`. Empty when `dir` does not exist.
    fn list(&self, dir: &Path) -> Result<Vec<String>>;
}

/// Store rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArtifactStore for FsStore {
    fn read(&self, path: &Path) -> Result<Option<String>> {
        let full = self.root.join(path);
        match std::fs::read(&full) {
            Ok(bytes) => Ok(Some(decode_text(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, contents)?;
        debug!(path = %full.display(), bytes = contents.len(), "Artifact written");
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.root.join(path).is_file()
    }

    fn list(&self, dir: &Path) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(self.root.join(dir)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// UTF-8 first, Latin-1 as a fallback that always succeeds.
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<PathBuf, String>>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail.
    pub fn failing_writes() -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            fail_writes: true,
        }
    }

    /// Seed a file directly.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), contents.into());
        }
    }

    /// Current contents of a file.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().ok()?.get(path.as_ref()).cloned()
    }

    /// All stored paths in sorted order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl ArtifactStore for MemoryStore {
    fn read(&self, path: &Path) -> Result<Option<String>> {
        let files = self
            .files
            .lock()
            .map_err(|_| ProfilerError::Config("memory store lock poisoned".to_string()))?;
        Ok(files.get(path).cloned())
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        if self.fail_writes {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "memory store is read-only",
            )
            .into());
        }
        self.insert(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }

    fn list(&self, dir: &Path) -> Result<Vec<String>> {
        let files = self
            .files
            .lock()
            .map_err(|_| ProfilerError::Config("memory store lock poisoned".to_string()))?;
        Ok(files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect())
    }
}

/// Typed, per-paper view of an [`ArtifactStore`].
pub struct StageCache<'a, S: ArtifactStore + ?Sized> {
    store: &'a S,
    paper_dir: PathBuf,
    reuse: bool,
}

impl<'a, S: ArtifactStore + ?Sized> StageCache<'a, S> {
    /// Cache scoped to `paper_name`. `reuse` enables loading precomputed stages.
    pub fn new(store: &'a S, paper_name: &str, reuse: bool) -> Self {
        Self {
            store,
            paper_dir: PathBuf::from(sanitize_component(paper_name)),
            reuse,
        }
    }

    /// Directory of this paper relative to the store root.
    pub fn paper_dir(&self) -> &Path {
        &self.paper_dir
    }

    /// Store-relative path of an artifact.
    pub fn path(&self, key: &ArtifactKey) -> PathBuf {
        self.paper_dir.join(key.relative_path())
    }

    /// Reuse is enabled and the artifact exists.
    pub fn is_cached(&self, key: &ArtifactKey) -> bool {
        self.reuse && self.store.exists(&self.path(key))
    }

    /// Reuse is enabled and at least one file matches the pattern.
    pub fn is_pattern_cached(&self, pattern: ArtifactPattern) -> Result<bool> {
        if !self.reuse {
            return Ok(false);
        }
        let (dir, glob) = pattern.parts();
        let matcher = Glob::new(glob)?.compile_matcher();
        let names = self.store.list(&self.paper_dir.join(dir))?;
        Ok(names.iter().any(|name| matcher.is_match(name)))
    }

    /// Load text that must exist and be non-empty.
    pub fn load_text(&self, key: &ArtifactKey) -> Result<String> {
        let path = self.path(key);
        let text = match self.store.read(&path) {
            Ok(Some(text)) => text,
            Ok(None) => return Err(ProfilerError::MissingArtifact { path }),
            Err(e) => {
                return Err(ProfilerError::CorruptArtifact {
                    path,
                    reason: e.to_string(),
                })
            }
        };
        if text.trim().is_empty() {
            return Err(ProfilerError::CorruptArtifact {
                path,
                reason: "file is empty".to_string(),
            });
        }
        info!(path = %path.display(), "Loaded cached artifact");
        Ok(text)
    }

    /// Load and parse a JSON artifact that must exist.
    pub fn load_json<T: DeserializeOwned>(&self, key: &ArtifactKey) -> Result<T> {
        let text = self.load_text(key)?;
        serde_json::from_str(&text).map_err(|e| ProfilerError::CorruptArtifact {
            path: self.path(key),
            reason: e.to_string(),
        })
    }

    /// `Ok(None)` when the stage must be recomputed, the value when cached.
    pub fn try_load_text(&self, key: &ArtifactKey) -> Result<Option<String>> {
        if !self.is_cached(key) {
            return Ok(None);
        }
        self.load_text(key).map(Some)
    }

    /// JSON counterpart of [`StageCache::try_load_text`].
    pub fn try_load_json<T: DeserializeOwned>(&self, key: &ArtifactKey) -> Result<Option<T>> {
        if !self.is_cached(key) {
            return Ok(None);
        }
        self.load_json(key).map(Some)
    }

    /// Persist text. Failures are logged and reported as `false`.
    pub fn store_text(&self, key: &ArtifactKey, contents: &str) -> bool {
        let path = self.path(key);
        match self.store.write(&path, contents) {
            Ok(()) => true,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Saving artifact failed");
                false
            }
        }
    }

    /// Persist a value as pretty JSON. Failures are logged and reported as `false`.
    pub fn store_json<T: Serialize + ?Sized>(&self, key: &ArtifactKey, value: &T) -> bool {
        match serde_json::to_string_pretty(value) {
            Ok(json) => self.store_text(key, &json),
            Err(e) => {
                error!(path = %self.path(key).display(), error = %e, "Serializing artifact failed");
                false
            }
        }
    }
}

//! Custom error types for coauthor-profiler.
//!
//! All library functions return `Result<T, ProfilerError>` instead of using `unwrap()`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for coauthor-profiler operations.
#[derive(Debug, Error)]
pub enum ProfilerError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// External API returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message from API
        message: String,
    },

    /// Rate limited by external API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// A single request attempt exceeded its deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Response body could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid artifact name pattern
    #[error("Glob error: {0}")]
    Glob(#[from] globset::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A cached artifact was expected to be usable but is not
    #[error("Cached artifact {path} is corrupt: {reason}")]
    CorruptArtifact {
        /// Artifact path relative to the output root
        path: PathBuf,
        /// What went wrong while reading it
        reason: String,
    },

    /// A cached artifact expected by a skipped stage does not exist
    #[error("Cached artifact {path} is missing")]
    MissingArtifact {
        /// Artifact path relative to the output root
        path: PathBuf,
    },
}

impl ProfilerError {
    /// Whether a retry of the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProfilerError::Network(e) => !e.is_builder() && !e.is_decode(),
            ProfilerError::Timeout(_) | ProfilerError::RateLimited(_) => true,
            ProfilerError::Api { code, .. } => *code >= 500,
            _ => false,
        }
    }

    /// Errors that mean "the cache was trusted but is broken".
    pub fn is_fatal_cache_error(&self) -> bool {
        matches!(
            self,
            ProfilerError::CorruptArtifact { .. } | ProfilerError::MissingArtifact { .. }
        )
    }
}

/// Result type alias using `ProfilerError`
pub type Result<T> = std::result::Result<T, ProfilerError>;

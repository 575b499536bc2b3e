//! Error types for mnema.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using mnema's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for mnema operations.
///
/// Only `NoteNotFound`, `InvalidInput`, `IndexUnavailable` and `Conflict` ever
/// reach callers of the memory system. `EnrichmentDegraded` and
/// `CandidateSkipped` are produced internally, logged, and downgraded to
/// report entries so the surrounding operation still succeeds.
#[derive(Error, Debug)]
pub enum Error {
    /// Note does not exist (never created, or deleted)
    #[error("Note not found: {0}")]
    NoteNotFound(Uuid),

    /// Malformed input, rejected before any mutation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Embedding index failed; the in-flight operation was aborted
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// Analysis service failed while generating metadata
    #[error("Enrichment degraded: {0}")]
    EnrichmentDegraded(String),

    /// Analysis service failed while evaluating one evolution candidate
    #[error("Evolution candidate {candidate} skipped: {reason}")]
    CandidateSkipped { candidate: Uuid, reason: String },

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// External capability call exceeded its deadline
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// Identifier collision or reuse of a retired identifier
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Re-tag any failure coming out of the embedding index as `IndexUnavailable`.
    pub fn into_index_unavailable(self) -> Self {
        match self {
            Error::IndexUnavailable(_) => self,
            other => Error::IndexUnavailable(other.to_string()),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::IndexUnavailable(_) | Error::Timeout(_) | Error::Request(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

//! Core traits for mnema abstractions.
//!
//! These traits define the capabilities the memory system consumes, so
//! concrete LLM backends and vector indexes stay pluggable and testable.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// Returns a vector of embedding vectors, one per input text.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Generate text constrained to JSON output where the backend supports it.
    async fn generate_json(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }

    /// Generate JSON output with system context.
    async fn generate_json_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate_with_system(system, prompt).await
    }

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Combined inference backend supporting both embedding and generation.
#[async_trait]
pub trait InferenceBackend: EmbeddingBackend + GenerationBackend {
    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool>;
}

// =============================================================================
// MEMORY CAPABILITIES
// =============================================================================

/// Vector index over note composite embeddings.
///
/// `knn` returns hits ordered by descending cosine similarity.
#[async_trait]
pub trait EmbeddingIndex: Send + Sync {
    /// Embed a composite text without storing it.
    async fn embed(&self, text: &str) -> Result<Vector>;

    /// Insert or replace the vector stored for a note.
    async fn upsert(&self, id: Uuid, vector: Vector) -> Result<()>;

    /// Embed a composite text and store it for a note.
    async fn embed_and_upsert(&self, id: Uuid, text: &str) -> Result<Vector> {
        let vector = self.embed(text).await?;
        self.upsert(id, vector.clone()).await?;
        Ok(vector)
    }

    /// Stored vector for a note, if any.
    async fn vector(&self, id: Uuid) -> Result<Option<Vector>>;

    /// Remove a note's vector. Returns whether one was present.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// The `k` stored vectors most similar to `query`.
    async fn knn(&self, query: &Vector, k: usize) -> Result<Vec<Neighbor>>;

    /// The `k` nearest stored vectors plus every further one scoring the
    /// same as the `k`-th.
    ///
    /// `knn` cuts a tie group wherever the index's own order puts it, so
    /// callers that break ties by note metadata need the whole group.
    /// Re-queries with a doubled `k` until a hit scores below the `k`-th
    /// or the index is exhausted.
    async fn knn_with_ties(&self, query: &Vector, k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut fetch = k.saturating_add(1);
        loop {
            let mut hits = self.knn(query, fetch).await?;
            if hits.len() <= k {
                return Ok(hits);
            }
            let boundary = hits[k - 1].score;
            if let Some(end) = hits[k..].iter().position(|h| h.score < boundary) {
                hits.truncate(k + end);
                return Ok(hits);
            }
            if hits.len() < fetch || fetch == usize::MAX {
                return Ok(hits);
            }
            fetch = fetch.saturating_mul(2);
        }
    }

    /// Number of stored vectors.
    async fn count(&self) -> Result<usize>;
}

/// Content analysis used for enrichment and evolution decisions.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Generate metadata for `content`. Supplied fields in `hints` are
    /// context for the model; the caller keeps them regardless of output.
    async fn analyze(&self, content: &str, hints: &PartialMetadata) -> Result<Analysis>;

    /// Decide whether `candidate` should be linked to `anchor`, and whether
    /// the candidate's tags or context should absorb anything from it.
    async fn joint_analyze(
        &self,
        anchor: &Note,
        candidate: &Note,
        similarity: f32,
    ) -> Result<LinkDecision>;
}

//! Brute-force in-memory vector index.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, instrument, trace};
use uuid::Uuid;

use mnema_core::{EmbeddingBackend, EmbeddingIndex, Error, Neighbor, Result, Vector};

use crate::similarity::cosine_similarity;

/// Embedding index holding one vector per note in memory.
pub struct InMemoryIndex {
    backend: Arc<dyn EmbeddingBackend>,
    vectors: RwLock<HashMap<Uuid, Vector>>,
}

impl InMemoryIndex {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            backend,
            vectors: RwLock::new(HashMap::new()),
        }
    }

    /// Name of the embedding model behind the index.
    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    fn check_dimension(&self, vector: &Vector) -> Result<()> {
        let expected = self.backend.dimension();
        let actual = vector.as_slice().len();
        if actual != expected {
            return Err(Error::Embedding(format!(
                "expected {}-dimensional vector, got {}",
                expected, actual
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingIndex for InMemoryIndex {
    #[instrument(skip(self, text), fields(subsystem = "index", component = "memory", op = "embed", text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vector> {
        let mut vectors = self.backend.embed_texts(&[text.to_string()]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| Error::Embedding("backend returned no embedding".to_string()))?;
        self.check_dimension(&vector)?;
        Ok(vector)
    }

    async fn upsert(&self, id: Uuid, vector: Vector) -> Result<()> {
        self.check_dimension(&vector)?;
        let mut vectors = self.vectors.write().unwrap_or_else(PoisonError::into_inner);
        vectors.insert(id, vector);
        trace!(note_id = %id, "Vector upserted");
        Ok(())
    }

    async fn vector(&self, id: Uuid) -> Result<Option<Vector>> {
        let vectors = self.vectors.read().unwrap_or_else(PoisonError::into_inner);
        Ok(vectors.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut vectors = self.vectors.write().unwrap_or_else(PoisonError::into_inner);
        Ok(vectors.remove(&id).is_some())
    }

    #[instrument(skip(self, query), fields(subsystem = "index", component = "memory", op = "knn"))]
    async fn knn(&self, query: &Vector, k: usize) -> Result<Vec<Neighbor>> {
        let start = Instant::now();
        let mut hits: Vec<Neighbor> = {
            let vectors = self.vectors.read().unwrap_or_else(PoisonError::into_inner);
            vectors
                .iter()
                .map(|(id, v)| Neighbor {
                    id: *id,
                    score: cosine_similarity(query.as_slice(), v.as_slice()),
                })
                .collect()
        };
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        debug!(
            result_count = hits.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "kNN query complete"
        );
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.vectors.read().unwrap_or_else(PoisonError::into_inner).len())
    }
}

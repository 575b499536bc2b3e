//! Nearest-neighbor candidate selection for evolution passes.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};
use uuid::Uuid;

use mnema_core::{with_deadline, EmbeddingIndex, Note, Result, Vector};
use mnema_store::MemoryStore;

/// A neighbor considered for linking, as it was when discovered.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub note: Note,
    pub score: f32,
}

/// Keep the `k` best candidates scoring at least `min_similarity`.
///
/// Order is descending similarity, then earlier creation instant, then
/// ascending identifier. The anchor itself is never a candidate.
pub fn rank_candidates(
    anchor: Uuid,
    mut scored: Vec<Candidate>,
    k: usize,
    min_similarity: f32,
) -> Vec<Candidate> {
    scored.retain(|c| c.note.id != anchor && c.score >= min_similarity);
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.note.created_at.cmp(&b.note.created_at))
            .then_with(|| a.note.id.cmp(&b.note.id))
    });
    scored.truncate(k);
    scored
}

/// Finds link candidates through the embedding index.
pub struct LinkDiscovery {
    store: Arc<MemoryStore>,
    index: Arc<dyn EmbeddingIndex>,
    k: usize,
    min_similarity: f32,
    timeout: Duration,
}

impl LinkDiscovery {
    pub fn new(
        store: Arc<MemoryStore>,
        index: Arc<dyn EmbeddingIndex>,
        k: usize,
        min_similarity: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            index,
            k,
            min_similarity,
            timeout,
        }
    }

    /// Minimum neighbors fetched from the index per pass. Extra rows leave
    /// room for the anchor itself; the fetch also extends through any tie
    /// at the last row.
    pub fn fetch_size(&self) -> usize {
        self.k.saturating_add(1).saturating_mul(2)
    }

    /// Up to `k` stored notes most similar to `vector`, excluding `anchor`.
    #[instrument(skip(self, vector), fields(subsystem = "engine", component = "discovery", op = "candidates", note_id = %anchor))]
    pub async fn candidates(&self, anchor: Uuid, vector: &Vector) -> Result<Vec<Candidate>> {
        if self.k == 0 {
            return Ok(Vec::new());
        }
        let neighbors = with_deadline(
            self.timeout,
            self.index.knn_with_ties(vector, self.fetch_size()),
        )
        .await
        .map_err(|e| e.into_index_unavailable())?;

        let scored: Vec<Candidate> = neighbors
            .into_iter()
            .filter(|n| n.id != anchor)
            .filter_map(|n| {
                self.store.peek(n.id).map(|note| Candidate {
                    note,
                    score: n.score,
                })
            })
            .collect();
        let fetched = scored.len();
        let candidates = rank_candidates(anchor, scored, self.k, self.min_similarity);

        debug!(
            candidate_count = candidates.len(),
            fetched,
            threshold = self.min_similarity,
            "Link candidates selected"
        );
        Ok(candidates)
    }
}

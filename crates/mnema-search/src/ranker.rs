//! Retrieval ranking over the embedding index and the note store.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use mnema_core::validation::validate_search;
use mnema_core::{
    with_deadline, EmbeddingIndex, MemoryConfig, Note, Result, SearchHit, SearchRequest,
    SearchResponse,
};
use mnema_store::MemoryStore;

use crate::filter::SearchFilter;

/// Filter scored notes, order them and truncate to `limit`.
///
/// Order is descending score, then descending retrieval count, then
/// ascending identifier. `total` counts survivors before truncation.
pub fn rank(scored: Vec<(Note, f32)>, filter: &SearchFilter, limit: usize) -> SearchResponse {
    let mut survivors: Vec<(Note, f32)> = scored
        .into_iter()
        .filter(|(note, _)| filter.matches_type(note))
        .filter(|(note, _)| filter.matches_tags(note))
        .filter(|(_, score)| filter.matches_similarity(*score))
        .collect();

    survivors.sort_by(|(a, sa), (b, sb)| {
        sb.partial_cmp(sa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.retrieval_count.cmp(&a.retrieval_count))
            .then_with(|| a.id.cmp(&b.id))
    });

    let total = survivors.len();
    let hits = survivors
        .iter()
        .take(limit)
        .map(|(note, score)| SearchHit::from_note(note, *score))
        .collect();

    SearchResponse { hits, total }
}

/// Query-time search combining vector similarity with metadata filters.
pub struct RetrievalRanker {
    store: Arc<MemoryStore>,
    index: Arc<dyn EmbeddingIndex>,
    config: MemoryConfig,
}

impl RetrievalRanker {
    pub fn new(store: Arc<MemoryStore>, index: Arc<dyn EmbeddingIndex>, config: MemoryConfig) -> Self {
        Self {
            store,
            index,
            config,
        }
    }

    /// Minimum neighbors fetched from the index for a given limit. The fetch
    /// extends through any tie at the last row so retrieval counts can
    /// order the whole tie group.
    pub fn fetch_size(&self, limit: usize) -> usize {
        limit.saturating_mul(self.config.search_overfetch.max(1))
    }

    /// Search notes by semantic similarity to `req.query`.
    ///
    /// Does not count as a read of the returned notes.
    #[instrument(skip(self, req), fields(subsystem = "search", component = "ranker", op = "search", query = %req.query, limit = req.limit))]
    pub async fn search(&self, req: &SearchRequest) -> Result<SearchResponse> {
        let start = Instant::now();
        validate_search(req)?;

        let timeout = self.config.index_timeout();
        let query = with_deadline(timeout, self.index.embed(req.query.trim()))
            .await
            .map_err(|e| e.into_index_unavailable())?;

        let fetch = self.fetch_size(req.limit);
        let neighbors = with_deadline(timeout, self.index.knn_with_ties(&query, fetch))
            .await
            .map_err(|e| e.into_index_unavailable())?;
        debug!(candidate_count = neighbors.len(), fetch, "Nearest neighbors fetched");

        let ids: Vec<Uuid> = neighbors.iter().map(|n| n.id).collect();
        let notes = self.store.peek_many(&ids);
        if notes.len() < ids.len() {
            // Index entries outlive their notes only during a concurrent delete.
            warn!(
                missing = ids.len() - notes.len(),
                "Index returned notes absent from the store"
            );
        }

        let scores: HashMap<Uuid, f32> = neighbors.iter().map(|n| (n.id, n.score)).collect();
        let scored: Vec<(Note, f32)> = notes
            .into_iter()
            .filter_map(|note| scores.get(&note.id).map(|s| (note, *s)))
            .collect();

        let filter = SearchFilter::from_request(req);
        let response = rank(scored, &filter, req.limit);

        info!(
            result_count = response.hits.len(),
            total = response.total,
            duration_ms = start.elapsed().as_millis() as u64,
            "Search completed"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mnema_core::{new_note_id, MemoryType, NoteMetadata};

    fn note(retrieval_count: u64, tags: &[&str]) -> Note {
        let mut note = Note::new(new_note_id(), "n", NoteMetadata::default(), Utc::now());
        note.retrieval_count = retrieval_count;
        note.tags = tags.iter().map(|t| t.to_string()).collect();
        note
    }

    #[test]
    fn test_rank_orders_by_score_then_retrievals_then_id() {
        let a = note(0, &[]);
        let b = note(5, &[]);
        let c = note(5, &[]);
        let d = note(0, &[]);
        let (low, high) = if b.id < c.id { (b.id, c.id) } else { (c.id, b.id) };

        let response = rank(
            vec![(a.clone(), 0.7), (b, 0.9), (c, 0.9), (d.clone(), 0.95)],
            &SearchFilter::default(),
            10,
        );
        let order: Vec<Uuid> = response.hits.iter().map(|h| h.id).collect();
        assert_eq!(order, vec![d.id, low, high, a.id]);
    }

    #[test]
    fn test_retrieval_count_breaks_score_ties() {
        let popular = note(9, &[]);
        let quiet = note(1, &[]);
        let response = rank(
            vec![(quiet.clone(), 0.8), (popular.clone(), 0.8)],
            &SearchFilter::default(),
            10,
        );
        assert_eq!(response.hits[0].id, popular.id);
        assert_eq!(response.hits[1].id, quiet.id);
    }

    #[test]
    fn test_total_counts_survivors_before_truncation() {
        let notes: Vec<(Note, f32)> = (0..6)
            .map(|i| {
                let tags: &[&str] = if i % 2 == 0 { &["keep"] } else { &[] };
                (note(0, tags), 0.5 + i as f32 * 0.05)
            })
            .collect();
        let filter = SearchFilter {
            tags: vec!["keep".to_string()],
            ..Default::default()
        };
        let response = rank(notes, &filter, 2);
        assert_eq!(response.total, 3);
        assert_eq!(response.hits.len(), 2);
    }

    #[test]
    fn test_min_similarity_excludes_rather_than_clamps() {
        let filter = SearchFilter {
            min_similarity: Some(0.6),
            ..Default::default()
        };
        let response = rank(vec![(note(0, &[]), 0.59), (note(0, &[]), 0.61)], &filter, 10);
        assert_eq!(response.total, 1);
        assert!((response.hits[0].similarity - 0.61).abs() < f32::EPSILON);
    }

    #[test]
    fn test_memory_type_filter_applies() {
        let mut knowledge = note(0, &[]);
        knowledge.memory_type = Some(MemoryType::Knowledge);
        let filter = SearchFilter {
            memory_types: vec![MemoryType::Knowledge],
            ..Default::default()
        };
        let response = rank(vec![(knowledge.clone(), 0.5), (note(0, &[]), 0.9)], &filter, 10);
        assert_eq!(response.total, 1);
        assert_eq!(response.hits[0].id, knowledge.id);
    }
}

//! Post-filters applied to nearest-neighbor candidates.

use mnema_core::{MemoryType, Note, SearchRequest};

/// Filters applied in order: memory type, tags, minimum similarity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    /// Accepted memory types; empty accepts every note.
    pub memory_types: Vec<MemoryType>,
    /// Tags a note must all carry.
    pub tags: Vec<String>,
    /// Candidates scoring below this are excluded.
    pub min_similarity: Option<f32>,
}

impl SearchFilter {
    pub fn from_request(req: &SearchRequest) -> Self {
        Self {
            memory_types: req.memory_types.clone(),
            tags: req
                .tags
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            min_similarity: req.min_similarity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.memory_types.is_empty() && self.tags.is_empty() && self.min_similarity.is_none()
    }

    /// Notes without a memory type never match a type restriction.
    pub fn matches_type(&self, note: &Note) -> bool {
        self.memory_types.is_empty()
            || note
                .memory_type
                .is_some_and(|t| self.memory_types.contains(&t))
    }

    pub fn matches_tags(&self, note: &Note) -> bool {
        self.tags.iter().all(|t| note.tags.contains(t))
    }

    pub fn matches_similarity(&self, score: f32) -> bool {
        self.min_similarity.map_or(true, |min| score >= min)
    }

    pub fn matches(&self, note: &Note, score: f32) -> bool {
        self.matches_type(note) && self.matches_tags(note) && self.matches_similarity(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mnema_core::{new_note_id, NoteMetadata};

    fn note(tags: &[&str], memory_type: Option<MemoryType>) -> Note {
        let mut note = Note::new(new_note_id(), "n", NoteMetadata::default(), Utc::now());
        note.tags = tags.iter().map(|t| t.to_string()).collect();
        note.memory_type = memory_type;
        note
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        let filter = SearchFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&note(&[], None), 0.0));
    }

    #[test]
    fn test_tags_require_all() {
        let filter = SearchFilter::from_request(
            &SearchRequest::new("q").with_tags(["rust", " async "]),
        );
        assert!(filter.matches_tags(&note(&["rust", "async", "tokio"], None)));
        assert!(!filter.matches_tags(&note(&["rust"], None)));
    }

    #[test]
    fn test_memory_type_restriction() {
        let filter = SearchFilter::from_request(
            &SearchRequest::new("q").with_memory_types([MemoryType::Knowledge]),
        );
        assert!(filter.matches_type(&note(&[], Some(MemoryType::Knowledge))));
        assert!(!filter.matches_type(&note(&[], Some(MemoryType::Conversation))));
        assert!(!filter.matches_type(&note(&[], None)));
    }

    #[test]
    fn test_min_similarity_is_inclusive() {
        let filter = SearchFilter::from_request(&SearchRequest::new("q").with_min_similarity(0.5));
        assert!(filter.matches_similarity(0.5));
        assert!(!filter.matches_similarity(0.49));
    }
}

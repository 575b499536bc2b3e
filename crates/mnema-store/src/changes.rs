//! Mutations applied to the store in a single commit.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use mnema_core::{
    composite_text, new_note_id, parse_timestamp, Importance, MemoryType,
    MetadataDelta, Note, NoteMetadata, UpdateNoteRequest,
};

/// A note that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NoteDraft {
    pub id: Uuid,
    pub content: String,
    pub metadata: NoteMetadata,
    /// Caller-supplied creation timestamp, kept verbatim.
    pub timestamp: Option<String>,
    pub memory_type: Option<MemoryType>,
    pub importance: Option<Importance>,
}

impl NoteDraft {
    /// New draft with a fresh UUIDv7 identifier and empty metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: new_note_id(),
            content: content.into(),
            metadata: NoteMetadata::default(),
            timestamp: None,
            memory_type: None,
            importance: None,
        }
    }

    pub fn with_metadata(mut self, metadata: NoteMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Option<String>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_classification(
        mut self,
        memory_type: Option<MemoryType>,
        importance: Option<Importance>,
    ) -> Self {
        self.memory_type = memory_type;
        self.importance = importance;
        self
    }

    /// Composite text the note will be embedded from.
    pub fn composite_text(&self) -> String {
        composite_text(
            &self.content,
            &self.metadata.keywords,
            &self.metadata.context,
            &self.metadata.tags,
        )
    }

    /// Materialize the note as of `now`.
    pub fn into_note(self, now: DateTime<Utc>) -> Note {
        let mut note = Note::new(self.id, self.content, self.metadata, now);
        if let Some(raw) = self.timestamp {
            note.created_at = parse_timestamp(&raw).unwrap_or(now);
            note.timestamp = raw;
        }
        note.memory_type = self.memory_type;
        note.importance = self.importance;
        note
    }
}

/// Field replacements for an existing note.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub content: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub context: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub memory_type: Option<MemoryType>,
    pub importance: Option<Importance>,
}

impl From<UpdateNoteRequest> for NoteUpdate {
    fn from(req: UpdateNoteRequest) -> Self {
        Self {
            content: req.content,
            keywords: req.keywords,
            context: req.context,
            tags: req.tags.map(|tags| tags.into_iter().collect()),
            memory_type: req.memory_type,
            importance: req.importance,
        }
    }
}

impl NoteUpdate {
    /// Apply to `note`, returning whether any field changed.
    pub fn apply_to(&self, note: &mut Note) -> bool {
        let mut changed = false;
        if let Some(content) = &self.content {
            changed |= replace(&mut note.content, content.clone());
        }
        if let Some(keywords) = &self.keywords {
            changed |= replace(&mut note.keywords, keywords.clone());
        }
        if let Some(context) = &self.context {
            changed |= replace(&mut note.context, context.clone());
        }
        if let Some(tags) = &self.tags {
            changed |= replace(&mut note.tags, tags.clone());
        }
        if self.memory_type.is_some() {
            changed |= replace(&mut note.memory_type, self.memory_type);
        }
        if self.importance.is_some() {
            changed |= replace(&mut note.importance, self.importance);
        }
        changed
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// One store mutation.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Store a new note.
    Insert(Note),
    /// Replace fields of an existing note.
    Update { id: Uuid, update: NoteUpdate },
    /// Link two notes symmetrically on behalf of `source`'s pass.
    Link { a: Uuid, b: Uuid, source: Uuid },
    /// Merge a tag/context delta into a note on behalf of `source`'s pass.
    /// A note that changes is marked pending evolution.
    Merge {
        id: Uuid,
        delta: MetadataDelta,
        source: Uuid,
    },
    /// Mark a note's own pass as done.
    ClearPending(Uuid),
    /// Delete a note and unlink it from every neighbor.
    Remove(Uuid),
}

/// Ordered list of mutations applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    mutations: Vec<Mutation>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) -> &mut Self {
        self.mutations.push(mutation);
        self
    }

    pub fn insert(mut self, note: Note) -> Self {
        self.mutations.push(Mutation::Insert(note));
        self
    }

    pub fn update(mut self, id: Uuid, update: NoteUpdate) -> Self {
        self.mutations.push(Mutation::Update { id, update });
        self
    }

    pub fn link(mut self, a: Uuid, b: Uuid, source: Uuid) -> Self {
        self.mutations.push(Mutation::Link { a, b, source });
        self
    }

    pub fn merge(mut self, id: Uuid, delta: MetadataDelta, source: Uuid) -> Self {
        self.mutations.push(Mutation::Merge { id, delta, source });
        self
    }

    pub fn clear_pending(mut self, id: Uuid) -> Self {
        self.mutations.push(Mutation::ClearPending(id));
        self
    }

    pub fn remove(mut self, id: Uuid) -> Self {
        self.mutations.push(Mutation::Remove(id));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub(crate) fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

/// What a commit changed.
#[derive(Debug, Clone, Default)]
pub struct CommitSummary {
    /// Links that did not exist before the commit.
    pub links_created: usize,
    /// Notes whose fields changed through `Update`.
    pub updated: Vec<Uuid>,
    /// Notes whose metadata changed through `Merge`.
    pub enriched: Vec<Uuid>,
    /// Notes removed, as they were before removal.
    pub removed: Vec<Note>,
    /// Neighbors that lost a link because of a removal.
    pub unlinked: Vec<Uuid>,
}

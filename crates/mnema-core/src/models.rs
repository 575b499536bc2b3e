//! Core data models for mnema.
//!
//! These types are shared across all mnema crates and represent the note,
//! its metadata, and the request/response shapes of the memory system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

pub use pgvector::Vector;

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// What kind of memory a note records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Conversation,
    Experience,
    Knowledge,
    Context,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Experience => "experience",
            Self::Knowledge => "knowledge",
            Self::Context => "context",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conversation" => Ok(Self::Conversation),
            "experience" => Ok(Self::Experience),
            "knowledge" => Ok(Self::Knowledge),
            "context" => Ok(Self::Context),
            other => Err(Error::InvalidInput(format!("unknown memory type: {}", other))),
        }
    }
}

/// Caller-assigned importance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Critical,
    High,
    Medium,
    Low,
    Temporary,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Temporary => "temporary",
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Importance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            "temporary" => Ok(Self::Temporary),
            other => Err(Error::InvalidInput(format!("unknown importance: {}", other))),
        }
    }
}

// =============================================================================
// NOTE TYPES
// =============================================================================

/// What an evolution pass did to a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionAction {
    /// A link to the source note was added.
    Linked,
    /// Tags or context were merged in from the source note's pass.
    Enriched,
    /// The link to the source note was removed because it was deleted.
    Unlinked,
}

/// One entry of a note's append-only evolution history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionEvent {
    /// Note whose pass (or deletion) caused the change.
    pub source: Uuid,
    pub action: EvolutionAction,
    pub at: DateTime<Utc>,
}

/// A stored memory note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub content: String,
    pub keywords: Vec<String>,
    pub context: String,
    pub tags: BTreeSet<String>,
    /// Creation timestamp as supplied (or `YYYYMMDDHHMM` when generated).
    pub timestamp: String,
    /// Ordering instant derived from `timestamp`, else the insertion time.
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub retrieval_count: u64,
    pub links: BTreeSet<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<MemoryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<Importance>,
    #[serde(default)]
    pub evolution_history: Vec<EvolutionEvent>,
}

impl Note {
    /// Fresh note with a generated `YYYYMMDDHHMM` timestamp and no links.
    pub fn new(id: Uuid, content: impl Into<String>, metadata: NoteMetadata, now: DateTime<Utc>) -> Self {
        Self {
            id,
            content: content.into(),
            keywords: metadata.keywords,
            context: metadata.context,
            tags: metadata.tags,
            timestamp: crate::temporal::format_timestamp(&now),
            created_at: now,
            last_accessed_at: now,
            retrieval_count: 0,
            links: BTreeSet::new(),
            memory_type: None,
            importance: None,
            evolution_history: Vec::new(),
        }
    }

    /// Text the composite embedding is computed from.
    pub fn composite_text(&self) -> String {
        composite_text(&self.content, &self.keywords, &self.context, &self.tags)
    }

    /// Current metadata fields of the note.
    pub fn metadata(&self) -> NoteMetadata {
        NoteMetadata {
            keywords: self.keywords.clone(),
            context: self.context.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Deterministic composite text over content and metadata.
///
/// Keyword order is preserved; tags are emitted in sorted order.
pub fn composite_text<'a, T>(content: &str, keywords: &[String], context: &str, tags: T) -> String
where
    T: IntoIterator<Item = &'a String>,
{
    let tags: Vec<&str> = tags.into_iter().map(String::as_str).collect();
    let mut out = String::with_capacity(content.len() + context.len() + 64);
    out.push_str(content);
    if !context.is_empty() {
        out.push_str("\ncontext: ");
        out.push_str(context);
    }
    if !keywords.is_empty() {
        out.push_str("\nkeywords: ");
        out.push_str(&keywords.join(", "));
    }
    if !tags.is_empty() {
        out.push_str("\ntags: ");
        out.push_str(&tags.join(", "));
    }
    out
}

/// Complete set of enrichable metadata fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteMetadata {
    pub keywords: Vec<String>,
    pub context: String,
    pub tags: BTreeSet<String>,
}

/// Caller-supplied metadata; `None` marks a field for enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl PartialMetadata {
    /// True when no field needs enrichment.
    pub fn is_complete(&self) -> bool {
        self.keywords.is_some() && self.context.is_some() && self.tags.is_some()
    }

    /// Names of the fields the caller left out.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.keywords.is_none() {
            missing.push("keywords");
        }
        if self.context.is_none() {
            missing.push("context");
        }
        if self.tags.is_none() {
            missing.push("tags");
        }
        missing
    }
}

/// Raw analysis output; a `None` field was missing or malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Tag/context change proposed for a neighbor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataDelta {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl MetadataDelta {
    pub fn is_empty(&self) -> bool {
        self.tags.iter().all(|t| t.trim().is_empty())
            && self.context.as_deref().map_or(true, |c| c.trim().is_empty())
    }
}

/// Outcome of a joint anchor/candidate analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LinkDecision {
    LinkOnly,
    LinkAndEnrich { delta: MetadataDelta },
    Skip,
}

impl LinkDecision {
    pub fn links(&self) -> bool {
        !matches!(self, Self::Skip)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinkOnly => "link_only",
            Self::LinkAndEnrich { .. } => "link_and_enrich",
            Self::Skip => "skip",
        }
    }
}

/// A kNN hit from the embedding index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: Uuid,
    pub score: f32,
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Request for adding a note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddNoteRequest {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<MemoryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<Importance>,
}

impl AddNoteRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = Some(keywords.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_memory_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = Some(memory_type);
        self
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = Some(importance);
        self
    }

    /// Caller-supplied metadata fields.
    pub fn partial_metadata(&self) -> PartialMetadata {
        PartialMetadata {
            keywords: self.keywords.clone(),
            context: self.context.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Request for updating a note; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNoteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<MemoryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<Importance>,
}

impl UpdateNoteRequest {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.keywords.is_none()
            && self.context.is_none()
            && self.tags.is_none()
            && self.memory_type.is_none()
            && self.importance.is_none()
    }

    /// True when the update touches a field the composite embedding covers.
    pub fn touches_embedding(&self) -> bool {
        self.content.is_some()
            || self.keywords.is_some()
            || self.context.is_some()
            || self.tags.is_some()
    }
}

/// Query-time search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Restrict to these memory types; empty means no restriction.
    #[serde(default)]
    pub memory_types: Vec<MemoryType>,
    /// Notes must carry every listed tag.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_similarity: Option<f32>,
}

fn default_search_limit() -> usize {
    crate::defaults::SEARCH_LIMIT
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            memory_types: Vec::new(),
            tags: Vec::new(),
            limit: default_search_limit(),
            min_similarity: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_memory_types(mut self, types: impl IntoIterator<Item = MemoryType>) -> Self {
        self.memory_types = types.into_iter().collect();
        self
    }

    pub fn with_min_similarity(mut self, min: f32) -> Self {
        self.min_similarity = Some(min);
        self
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

/// A single ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: Uuid,
    pub content: String,
    pub keywords: Vec<String>,
    pub context: String,
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<MemoryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<Importance>,
    pub timestamp: String,
    pub similarity: f32,
    pub retrieval_count: u64,
}

impl SearchHit {
    pub fn from_note(note: &Note, similarity: f32) -> Self {
        Self {
            id: note.id,
            content: note.content.clone(),
            keywords: note.keywords.clone(),
            context: note.context.clone(),
            tags: note.tags.clone(),
            memory_type: note.memory_type,
            importance: note.importance,
            timestamp: note.timestamp.clone(),
            similarity,
            retrieval_count: note.retrieval_count,
        }
    }
}

/// Ranked search results plus the pre-truncation match count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub total: usize,
}

/// Stage an evolution pass reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionState {
    CandidatesGathered,
    Evaluated,
    Applied,
}

/// Candidate dropped from a pass and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCandidate {
    pub id: Uuid,
    pub reason: String,
}

/// Summary of one evolution pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionReport {
    pub anchor: Uuid,
    pub state: EvolutionState,
    pub candidates: Vec<Neighbor>,
    /// Candidates linked to the anchor (new or already present).
    pub linked: Vec<Uuid>,
    /// Neighbors whose metadata changed.
    pub enriched: Vec<Uuid>,
    pub skipped: Vec<SkippedCandidate>,
    /// Links that did not exist before the pass.
    pub links_created: usize,
}

impl EvolutionReport {
    pub fn empty(anchor: Uuid) -> Self {
        Self {
            anchor,
            state: EvolutionState::CandidatesGathered,
            candidates: Vec::new(),
            linked: Vec::new(),
            enriched: Vec::new(),
            skipped: Vec::new(),
            links_created: 0,
        }
    }
}

/// Result of adding a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNoteResponse {
    pub note: Note,
    pub evolution: EvolutionReport,
    /// Metadata fields left empty because enrichment failed.
    pub degraded: Vec<String>,
}

/// Result of updating a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNoteResponse {
    pub note: Note,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evolution: Option<EvolutionReport>,
}

//! Field names and level conventions for `tracing` events.
//!
//! Every crate logs with these keys so one query works across subsystems,
//! e.g. `note_id` follows a note from `add` through its evolution pass.
//!
//! ## Levels
//!
//! | Level | Used for |
//! |-------|----------|
//! | ERROR | Service degraded, operator attention needed |
//! | WARN  | Recovered with a fallback: enrichment degraded, candidate skipped, pass aborted |
//! | INFO  | Completions: note added or deleted, pass applied, search completed |
//! | DEBUG | Decisions: candidate verdicts, no-op updates, config choices |
//! | TRACE | Per-item detail such as individual kNN hits |
//!
//! Spans opened by `#[instrument]` always carry [`SUBSYSTEM`], [`COMPONENT`]
//! and [`OPERATION`].

/// One of [`SUBSYSTEMS`].
pub const SUBSYSTEM: &str = "subsystem";
/// Part of a subsystem, e.g. "evolution", "discovery", "ranker", "ollama".
pub const COMPONENT: &str = "component";
/// Operation, e.g. "add", "evolve", "knn", "analyze".
pub const OPERATION: &str = "op";

pub const SUBSYSTEMS: &[&str] = &["store", "index", "inference", "search", "engine", "cli"];

// Notes and passes
pub const NOTE_ID: &str = "note_id";
/// A candidate or neighbor of the pass anchor.
pub const NEIGHBOR_ID: &str = "neighbor_id";
pub const ACTION: &str = "action";
pub const SIMILARITY: &str = "similarity";
pub const CANDIDATE_COUNT: &str = "candidate_count";
pub const LINKS_CREATED: &str = "links_created";
pub const UNLINKED: &str = "unlinked";
/// Metadata fields the analysis service was asked to fill.
pub const MISSING: &str = "missing";

// Queries
pub const QUERY: &str = "query";
pub const LIMIT: &str = "limit";
pub const RESULT_COUNT: &str = "result_count";

// Inference
pub const MODEL: &str = "model";
pub const INPUT_COUNT: &str = "input_count";
pub const PROMPT_LEN: &str = "prompt_len";
pub const RESPONSE_LEN: &str = "response_len";

// Outcome
pub const DURATION_MS: &str = "duration_ms";
pub const ERROR: &str = "error";
/// Set on events for calls past their slow threshold.
pub const SLOW: &str = "slow";

pub const ALL_FIELDS: &[&str] = &[
    SUBSYSTEM,
    COMPONENT,
    OPERATION,
    NOTE_ID,
    NEIGHBOR_ID,
    ACTION,
    SIMILARITY,
    CANDIDATE_COUNT,
    LINKS_CREATED,
    UNLINKED,
    MISSING,
    QUERY,
    LIMIT,
    RESULT_COUNT,
    MODEL,
    INPUT_COUNT,
    PROMPT_LEN,
    RESPONSE_LEN,
    DURATION_MS,
    ERROR,
    SLOW,
];

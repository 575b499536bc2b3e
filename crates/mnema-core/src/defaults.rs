//! Centralized default constants for mnema.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Runtime overrides live in [`crate::config::MemoryConfig`].

// =============================================================================
// LINK DISCOVERY
// =============================================================================

/// Number of nearest neighbors considered per evolution pass.
pub const LINK_K: usize = 10;

/// Minimum cosine similarity for a neighbor to become an evolution candidate.
pub const LINK_MIN_SIMILARITY: f32 = 0.5;

/// Upper bound accepted for `MNEMA_LINK_K`.
pub const LINK_K_MAX: usize = 100;

// =============================================================================
// CAPABILITY TIMEOUTS
// =============================================================================

/// Deadline for a single analysis service call in seconds.
pub const ANALYSIS_TIMEOUT_SECS: u64 = 60;

/// Deadline for a single embedding index call in seconds.
pub const INDEX_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// SEARCH
// =============================================================================

/// Default number of search results.
pub const SEARCH_LIMIT: usize = 10;

/// Maximum number of search results per request.
pub const SEARCH_LIMIT_MAX: usize = 100;

/// kNN over-fetch factor so post-filters still leave `k` results.
pub const SEARCH_OVERFETCH: usize = 3;

// =============================================================================
// VALIDATION
// =============================================================================

/// Maximum note content length in characters.
pub const MAX_CONTENT_LENGTH: usize = 10_000;

/// Maximum number of tags on a note.
pub const MAX_TAGS: usize = 20;

/// Maximum tag length in characters.
pub const MAX_TAG_LENGTH: usize = 50;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "llama3.1:8b";

/// Timeout for embedding requests in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Default OpenAI-compatible API base URL.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default OpenAI embedding model.
pub const OPENAI_EMBED_MODEL: &str = "text-embedding-3-small";

/// Default OpenAI embedding dimension.
pub const OPENAI_EMBED_DIMENSION: usize = 1536;

/// Default OpenAI generation model.
pub const OPENAI_GEN_MODEL: &str = "gpt-4o-mini";

/// Embedding dimension of the deterministic mock backend.
pub const MOCK_EMBED_DIMENSION: usize = 384;

// =============================================================================
// PROMPT PREVIEWS
// =============================================================================

/// Characters of note content included in an analysis prompt.
pub const PREVIEW_ANALYSIS: usize = 4000;

/// Characters of each note's content included in a joint-analysis prompt.
pub const PREVIEW_JOINT: usize = 1000;

/// Fewest tags the analysis prompt asks for.
pub const TAG_MIN_SUGGESTED: usize = 3;

/// Most tags the analysis prompt asks for.
pub const TAG_MAX_SUGGESTED: usize = 7;

// =============================================================================
// EVOLUTION
// =============================================================================

/// Separator placed between an existing context and an appended fragment.
pub const CONTEXT_SEPARATOR: &str = "\n";

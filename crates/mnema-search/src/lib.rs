//! # mnema-search
//!
//! Query-time retrieval over the note store.
//!
//! This crate provides:
//! - [`RetrievalRanker`]: embeds the query, over-fetches nearest notes from
//!   the embedding index, filters them against the store and ranks them
//! - [`SearchFilter`]: memory type, tag and minimum-similarity post-filters
//!
//! ## Example
//!
//! ```ignore
//! use mnema_search::{RetrievalRanker, SearchRequest};
//!
//! let ranker = RetrievalRanker::new(store, index, config);
//! let response = ranker
//!     .search(&SearchRequest::new("borrow checker").with_tags(["rust"]).with_limit(5))
//!     .await?;
//! println!("{} of {} hits", response.hits.len(), response.total);
//! ```

pub mod filter;
pub mod ranker;

// Re-export core types
pub use mnema_core::*;

pub use filter::SearchFilter;
pub use ranker::{rank, RetrievalRanker};

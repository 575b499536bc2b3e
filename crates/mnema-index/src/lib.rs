//! # mnema-index
//!
//! Reference [`EmbeddingIndex`](mnema_core::EmbeddingIndex) implementation:
//! vectors from any [`EmbeddingBackend`](mnema_core::EmbeddingBackend) kept
//! in memory and searched by brute-force cosine similarity.

pub mod memory;
pub mod similarity;

pub use memory::InMemoryIndex;
pub use similarity::cosine_similarity;

//! # mnema-engine
//!
//! The evolving memory network: enrichment, link discovery, evolution
//! passes and the [`MemorySystem`] facade tying them to the store, the
//! embedding index and the retrieval ranker.
//!
//! This crate provides:
//! - [`EnrichmentCoordinator`]: fills metadata the caller left out
//! - [`LinkDiscovery`]: nearest-neighbor candidates for a note
//! - [`EvolutionEngine`]: decides and applies links and neighbor enrichment
//! - [`MemorySystem`]: add, read, update, delete, search and evolve
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mnema_engine::{AddNoteRequest, MemoryConfig, MemorySystem};
//!
//! let system = MemorySystem::new(index, analysis, MemoryConfig::from_env());
//! let added = system.add(AddNoteRequest::new("Tokio tasks are cheap")).await?;
//! println!("linked to {:?}", added.evolution.linked);
//! ```

pub mod discovery;
pub mod enrichment;
pub mod evolution;
pub mod system;

// Re-export core types
pub use mnema_core::*;

pub use discovery::{rank_candidates, Candidate, LinkDiscovery};
pub use enrichment::{Enrichment, EnrichmentCoordinator};
pub use evolution::{AnchorChange, EvolutionEngine};
pub use system::MemorySystem;

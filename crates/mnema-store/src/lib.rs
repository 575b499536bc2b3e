//! # mnema-store
//!
//! Authoritative in-memory store for mnema notes.
//!
//! This crate provides:
//! - [`MemoryStore`], the note map with access tracking and retired-id bookkeeping
//! - Per-note pass and write locks ([`LockRegistry`]), acquired in ascending
//!   identifier order
//! - [`ChangeSet`] commits that apply multi-note mutations all-or-nothing
//! - Symmetric link maintenance and metadata delta merging
//!
//! ## Example
//!
//! ```rust,ignore
//! use mnema_store::{ChangeSet, MemoryStore, NoteDraft};
//!
//! let store = MemoryStore::new();
//! let id = store.create(NoteDraft::new("Rust ownership rules")).await?;
//! let note = store.read(id)?;
//! assert_eq!(note.retrieval_count, 1);
//! ```

pub mod changes;
pub mod links;
pub mod locks;
pub mod merge;
pub mod store;

pub use changes::{ChangeSet, CommitSummary, Mutation, NoteDraft, NoteUpdate};
pub use locks::{LockRegistry, PassGuard, WriteGuard};
pub use merge::{apply_delta, context_contains};
pub use store::MemoryStore;

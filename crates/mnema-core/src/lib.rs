//! # mnema-core
//!
//! Core types, traits, and abstractions for the mnema memory network.
//!
//! This crate provides the note data model, the capability traits the
//! evolution engine consumes (embedding index, analysis service, LLM
//! backends), the shared error taxonomy, default constants, and runtime
//! configuration. Every other mnema crate depends on it.

pub mod config;
pub mod deadline;
pub mod defaults;
pub mod error;
pub mod ids;
pub mod logging;
pub mod models;
pub mod temporal;
pub mod traits;
pub mod validation;

// Re-export commonly used types at crate root
pub use config::MemoryConfig;
pub use deadline::with_deadline;
pub use error::{Error, Result};
pub use ids::new_note_id;
pub use models::*;
pub use temporal::{format_timestamp, parse_timestamp};
pub use traits::*;

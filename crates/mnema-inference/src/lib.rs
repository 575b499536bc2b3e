//! # mnema-inference
//!
//! LLM inference backends and content analysis for mnema.
//!
//! This crate provides:
//! - [`LlmAnalyzer`], the [`AnalysisService`](mnema_core::AnalysisService)
//!   implementation that turns a generation backend into metadata
//!   enrichment and evolution decisions
//! - Ollama implementation (default)
//! - OpenAI-compatible implementation (optional, feature `openai`), also
//!   usable for GLM and other chat-completions endpoints
//! - Lenient JSON parsing for model output
//! - Deterministic mocks (feature `mock`)
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama backend
//! - `openai`: Enable OpenAI-compatible backend
//! - `mock`: Expose [`mock`] for downstream tests
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mnema_inference::{LlmAnalyzer, OllamaBackend};
//! use mnema_core::{AnalysisService, PartialMetadata};
//!
//! #[tokio::main]
//! async fn main() {
//!     let analyzer = LlmAnalyzer::new(Arc::new(OllamaBackend::from_env()));
//!     let analysis = analyzer
//!         .analyze("Borrowing rules in Rust", &PartialMetadata::default())
//!         .await
//!         .unwrap();
//!     println!("{:?}", analysis.keywords);
//! }
//! ```

pub mod analysis;
pub mod json;
pub mod prompts;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

// Mock backends for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use mnema_core::*;

pub use analysis::LlmAnalyzer;
pub use json::{clean_response, parse_json_lenient};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaBackend, OllamaConfig};

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};

//! OpenAI-compatible inference backend.
//!
//! Works with any endpoint that speaks the chat-completions and embeddings
//! APIs: OpenAI itself, GLM (`https://open.bigmodel.cn/api/paas/v4`),
//! vLLM, LM Studio, or Ollama's `/v1` compatibility layer.
//!
//! # Example
//!
//! ```rust,no_run
//! use mnema_inference::openai::{OpenAIBackend, OpenAIConfig};
//!
//! let glm = OpenAIBackend::new(OpenAIConfig {
//!     base_url: "https://open.bigmodel.cn/api/paas/v4".to_string(),
//!     api_key: std::env::var("GLM_API_KEY").ok(),
//!     gen_model: "glm-4".to_string(),
//!     ..Default::default()
//! })
//! .unwrap();
//! ```

mod backend;
mod error;
mod types;

pub use backend::{
    OpenAIBackend, OpenAIConfig, DEFAULT_DIMENSION, DEFAULT_EMBED_MODEL, DEFAULT_GEN_MODEL,
    DEFAULT_OPENAI_URL, DEFAULT_TIMEOUT_SECS,
};
pub use error::{to_mnema_error, Capability, OpenAIErrorCode};
pub use types::*;

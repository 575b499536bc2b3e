//! Backend selection for the binary.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::bail;
use tracing::info;

use mnema_core::{AnalysisService, EmbeddingBackend, GenerationBackend, MemoryConfig};
use mnema_engine::MemorySystem;
use mnema_index::InMemoryIndex;
use mnema_inference::mock::{MockAnalysisService, MockEmbeddingBackend};
use mnema_inference::{LlmAnalyzer, OllamaBackend};

/// Inference backend named by `MNEMA_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Ollama,
    OpenAI,
    Mock,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
            Self::Mock => "mock",
        }
    }

    /// Read `MNEMA_BACKEND`, defaulting to Ollama.
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var("MNEMA_BACKEND") {
            Ok(value) => value.parse(),
            Err(_) => Ok(Self::Ollama),
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" | "glm" => Ok(Self::OpenAI),
            "mock" => Ok(Self::Mock),
            other => bail!(
                "unknown backend '{}' (expected ollama, openai or mock)",
                other
            ),
        }
    }
}

/// Assemble a memory system over the selected backend.
pub fn build_system(kind: BackendKind, config: MemoryConfig) -> anyhow::Result<MemorySystem> {
    let system = match kind {
        BackendKind::Ollama => {
            let backend = Arc::new(OllamaBackend::from_env());
            assemble(backend.clone(), backend, config)
        }
        #[cfg(feature = "openai")]
        BackendKind::OpenAI => {
            let backend = Arc::new(mnema_inference::OpenAIBackend::from_env()?);
            assemble(backend.clone(), backend, config)
        }
        #[cfg(not(feature = "openai"))]
        BackendKind::OpenAI => bail!("mnema was built without the `openai` feature"),
        BackendKind::Mock => {
            let analysis: Arc<dyn AnalysisService> = Arc::new(MockAnalysisService::new());
            let index = Arc::new(InMemoryIndex::new(Arc::new(MockEmbeddingBackend::new())));
            MemorySystem::new(index, analysis, config)
        }
    };
    info!(backend = kind.as_str(), "Memory system ready");
    Ok(system)
}

fn assemble(
    embeddings: Arc<dyn EmbeddingBackend>,
    generation: Arc<dyn GenerationBackend>,
    config: MemoryConfig,
) -> MemorySystem {
    let index = Arc::new(InMemoryIndex::new(embeddings));
    let analysis = Arc::new(LlmAnalyzer::new(generation));
    MemorySystem::new(index, analysis, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("ollama".parse::<BackendKind>().unwrap(), BackendKind::Ollama);
        assert_eq!(" OpenAI ".parse::<BackendKind>().unwrap(), BackendKind::OpenAI);
        assert_eq!("glm".parse::<BackendKind>().unwrap(), BackendKind::OpenAI);
        assert_eq!("mock".parse::<BackendKind>().unwrap(), BackendKind::Mock);
        assert!("pgvector".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_mock_backend_builds_empty_system() {
        let system = build_system(BackendKind::Mock, MemoryConfig::default()).unwrap();
        assert!(system.is_empty());
    }
}

//! Mock backends for deterministic testing.
//!
//! Available in this crate's tests and to downstream crates through the
//! `mock` feature.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mnema_inference::mock::{MockAnalysisService, MockEmbeddingBackend};
//!
//! let embeddings = MockEmbeddingBackend::new()
//!     .with_dimension(8)
//!     .with_fixed_vector("ownership", vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
//! let analysis = MockAnalysisService::new().with_analysis(Analysis {
//!     keywords: Some(vec!["x".into()]),
//!     context: Some("c".into()),
//!     tags: Some(vec!["t".into()]),
//! });
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use mnema_core::defaults::MOCK_EMBED_DIMENSION;
use mnema_core::{
    Analysis, AnalysisService, EmbeddingBackend, Error, GenerationBackend, LinkDecision, Note,
    PartialMetadata, Result, Vector,
};

/// One recorded mock invocation.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
    pub timestamp: std::time::Instant,
}

#[derive(Default)]
struct CallLog(Mutex<Vec<MockCall>>);

impl CallLog {
    fn push(&self, operation: &str, input: &str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockCall {
                operation: operation.to_string(),
                input: input.to_string(),
                timestamp: std::time::Instant::now(),
            });
    }

    fn all(&self) -> Vec<MockCall> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn count(&self, operation: &str) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear()
    }
}

fn roll(failure_rate: f64) -> bool {
    use rand::Rng;
    failure_rate > 0.0 && rand::thread_rng().gen::<f64>() < failure_rate
}

async fn simulate_latency(latency_ms: u64) {
    if latency_ms > 0 {
        tokio::time::sleep(Duration::from_millis(latency_ms)).await;
    }
}

// =============================================================================
// EMBEDDINGS
// =============================================================================

/// Mock embedding generator with deterministic output.
pub struct MockEmbeddingGenerator;

impl MockEmbeddingGenerator {
    /// Generate a deterministic embedding from text.
    ///
    /// Uses character-based hashing, so the same text always produces the
    /// same unit vector.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0; dimension.max(1)];
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % vec.len();
            vec[idx] += 0.1;
        }
        Self::normalize(&mut vec);
        vec
    }

    pub fn normalize(vec: &mut [f32]) {
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vec.iter_mut().for_each(|x| *x /= magnitude);
        }
    }
}

#[derive(Debug, Clone)]
struct EmbedConfig {
    dimension: usize,
    fixed: Vec<(String, Vec<f32>)>,
    latency_ms: u64,
    failure_rate: f64,
}

/// Deterministic [`EmbeddingBackend`].
///
/// Texts containing a registered needle map to that needle's vector (first
/// registration wins); everything else is hashed by
/// [`MockEmbeddingGenerator`].
#[derive(Clone)]
pub struct MockEmbeddingBackend {
    config: Arc<EmbedConfig>,
    failing: Arc<AtomicBool>,
    calls: Arc<CallLog>,
}

impl MockEmbeddingBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(EmbedConfig {
                dimension: MOCK_EMBED_DIMENSION,
                fixed: Vec::new(),
                latency_ms: 0,
                failure_rate: 0.0,
            }),
            failing: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(CallLog::default()),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Map any text containing `needle` to `vector` (resized to the dimension).
    pub fn with_fixed_vector(mut self, needle: impl Into<String>, vector: Vec<f32>) -> Self {
        Arc::make_mut(&mut self.config)
            .fixed
            .push((needle.into(), vector));
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Set failure rate (0.0 - 1.0) for testing error handling.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.all()
    }

    pub fn embed_call_count(&self) -> usize {
        self.calls.count("embed")
    }

    pub fn clear_calls(&self) {
        self.calls.clear()
    }

    /// Vector the backend returns for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let dimension = self.config.dimension;
        for (needle, vector) in &self.config.fixed {
            if text.contains(needle.as_str()) {
                let mut v = vector.clone();
                v.resize(dimension, 0.0);
                return v;
            }
        }
        MockEmbeddingGenerator::generate(text, dimension)
    }
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        simulate_latency(self.config.latency_ms).await;
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            self.calls.push("embed", text);
            if self.failing.load(Ordering::SeqCst) || roll(self.config.failure_rate) {
                return Err(Error::Embedding("Simulated failure for testing".to_string()));
            }
            out.push(Vector::from(self.vector_for(text)));
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

// =============================================================================
// GENERATION
// =============================================================================

#[derive(Debug, Clone)]
struct GenConfig {
    fixed_responses: Vec<(String, String)>,
    default_response: String,
    latency_ms: u64,
    failure_rate: f64,
}

/// Scripted [`GenerationBackend`].
#[derive(Clone)]
pub struct MockGenerationBackend {
    config: Arc<GenConfig>,
    calls: Arc<CallLog>,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(GenConfig {
                fixed_responses: Vec::new(),
                default_response: "{}".to_string(),
                latency_ms: 0,
                failure_rate: 0.0,
            }),
            calls: Arc::new(CallLog::default()),
        }
    }

    /// Set the response returned when no mapping matches.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Respond with `output` to prompts containing `needle`.
    pub fn with_response_mapping(
        mut self,
        needle: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .fixed_responses
            .push((needle.into(), output.into()));
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.all()
    }

    pub fn generate_call_count(&self) -> usize {
        self.calls.count("generate")
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.calls.push("generate", prompt);
        simulate_latency(self.config.latency_ms).await;
        if roll(self.config.failure_rate) {
            return Err(Error::Inference("Simulated failure for testing".to_string()));
        }
        for (needle, response) in &self.config.fixed_responses {
            if prompt.contains(needle.as_str()) {
                return Ok(response.clone());
            }
        }
        Ok(self.config.default_response.clone())
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }
}

// =============================================================================
// ANALYSIS
// =============================================================================

#[derive(Debug, Clone)]
struct AnalysisConfig {
    default_analysis: Analysis,
    analyses: Vec<(String, Analysis)>,
    default_decision: LinkDecision,
    decisions: Vec<(String, LinkDecision)>,
    joint_latency_ms: u64,
}

/// Scripted [`AnalysisService`].
///
/// Decisions resolve in this order: a decision set for the candidate's id
/// at runtime, a decision whose needle occurs in the candidate's content,
/// then the default decision. Analyses resolve by content needle, then the
/// default analysis.
#[derive(Clone)]
pub struct MockAnalysisService {
    config: Arc<AnalysisConfig>,
    by_id: Arc<Mutex<HashMap<Uuid, LinkDecision>>>,
    failing_ids: Arc<Mutex<Vec<Uuid>>>,
    analysis_failing: Arc<AtomicBool>,
    joint_failing: Arc<AtomicBool>,
    calls: Arc<CallLog>,
}

impl MockAnalysisService {
    /// Empty analysis; every candidate linked without enrichment.
    pub fn new() -> Self {
        Self {
            config: Arc::new(AnalysisConfig {
                default_analysis: Analysis::default(),
                analyses: Vec::new(),
                default_decision: LinkDecision::LinkOnly,
                decisions: Vec::new(),
                joint_latency_ms: 0,
            }),
            by_id: Arc::new(Mutex::new(HashMap::new())),
            failing_ids: Arc::new(Mutex::new(Vec::new())),
            analysis_failing: Arc::new(AtomicBool::new(false)),
            joint_failing: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(CallLog::default()),
        }
    }

    /// Analysis returned when no content needle matches.
    pub fn with_analysis(mut self, analysis: Analysis) -> Self {
        Arc::make_mut(&mut self.config).default_analysis = analysis;
        self
    }

    /// Analysis returned for content containing `needle`.
    pub fn with_analysis_for(mut self, needle: impl Into<String>, analysis: Analysis) -> Self {
        Arc::make_mut(&mut self.config)
            .analyses
            .push((needle.into(), analysis));
        self
    }

    /// Decision returned when nothing more specific matches.
    pub fn with_default_decision(mut self, decision: LinkDecision) -> Self {
        Arc::make_mut(&mut self.config).default_decision = decision;
        self
    }

    /// Decision for candidates whose content contains `needle`.
    pub fn with_decision_for(mut self, needle: impl Into<String>, decision: LinkDecision) -> Self {
        Arc::make_mut(&mut self.config)
            .decisions
            .push((needle.into(), decision));
        self
    }

    /// Delay every joint analysis, for timeout tests.
    pub fn with_joint_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).joint_latency_ms = latency_ms;
        self
    }

    /// Decision for one candidate id.
    pub fn set_decision(&self, candidate: Uuid, decision: LinkDecision) {
        self.by_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(candidate, decision);
    }

    /// Make joint analysis fail for one candidate id.
    pub fn fail_candidate(&self, candidate: Uuid) {
        self.failing_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(candidate);
    }

    pub fn set_analysis_failing(&self, failing: bool) {
        self.analysis_failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_joint_failing(&self, failing: bool) {
        self.joint_failing.store(failing, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.all()
    }

    pub fn analyze_call_count(&self) -> usize {
        self.calls.count("analyze")
    }

    pub fn joint_call_count(&self) -> usize {
        self.calls.count("joint_analyze")
    }

    pub fn clear_calls(&self) {
        self.calls.clear()
    }
}

impl Default for MockAnalysisService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisService for MockAnalysisService {
    async fn analyze(&self, content: &str, _hints: &PartialMetadata) -> Result<Analysis> {
        self.calls.push("analyze", content);
        if self.analysis_failing.load(Ordering::SeqCst) {
            return Err(Error::Inference("Simulated failure for testing".to_string()));
        }
        let analysis = self
            .config
            .analyses
            .iter()
            .find(|(needle, _)| content.contains(needle.as_str()))
            .map(|(_, a)| a.clone())
            .unwrap_or_else(|| self.config.default_analysis.clone());
        Ok(analysis)
    }

    async fn joint_analyze(
        &self,
        anchor: &Note,
        candidate: &Note,
        _similarity: f32,
    ) -> Result<LinkDecision> {
        self.calls
            .push("joint_analyze", &format!("{}->{}", anchor.id, candidate.id));
        simulate_latency(self.config.joint_latency_ms).await;

        let fails_here = self
            .failing_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&candidate.id);
        if fails_here || self.joint_failing.load(Ordering::SeqCst) {
            return Err(Error::Inference("Simulated failure for testing".to_string()));
        }

        if let Some(decision) = self
            .by_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&candidate.id)
        {
            return Ok(decision.clone());
        }
        let decision = self
            .config
            .decisions
            .iter()
            .find(|(needle, _)| candidate.content.contains(needle.as_str()))
            .map(|(_, d)| d.clone())
            .unwrap_or_else(|| self.config.default_decision.clone());
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embeddings_deterministic() {
        let backend = MockEmbeddingBackend::new().with_dimension(16);
        let a = backend.embed_texts(&["hello".to_string()]).await.unwrap();
        let b = backend.embed_texts(&["hello".to_string()]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].as_slice().len(), 16);
        assert_eq!(backend.embed_call_count(), 2);
    }

    #[tokio::test]
    async fn test_fixed_vector_by_needle() {
        let backend = MockEmbeddingBackend::new()
            .with_dimension(4)
            .with_fixed_vector("apple", vec![1.0, 0.0]);
        let v = backend.vector_for("an apple a day");
        assert_eq!(v, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_set_failing_toggles() {
        let backend = MockEmbeddingBackend::new();
        backend.set_failing(true);
        assert!(backend.embed_texts(&["x".to_string()]).await.is_err());
        backend.set_failing(false);
        assert!(backend.embed_texts(&["x".to_string()]).await.is_ok());
    }

    #[test]
    fn test_generator_unit_length() {
        let v = MockEmbeddingGenerator::generate("some text", 32);
        let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
        assert_eq!(v, MockEmbeddingGenerator::generate("some text", 32));
    }

    #[tokio::test]
    async fn test_generation_mapping() {
        let backend = MockGenerationBackend::new()
            .with_fixed_response("default")
            .with_response_mapping("special", "mapped");
        assert_eq!(backend.generate("a special prompt").await.unwrap(), "mapped");
        assert_eq!(backend.generate("other").await.unwrap(), "default");
        assert_eq!(backend.generate_call_count(), 2);
    }
}

//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mnema_core::{EmbeddingIndex, Error, MemoryConfig, Neighbor, Result, Vector};
use mnema_engine::MemorySystem;
use mnema_index::InMemoryIndex;
use mnema_inference::mock::{MockAnalysisService, MockEmbeddingBackend};
use uuid::Uuid;

/// Index wrapper that fails on demand.
pub struct FlakyIndex {
    inner: InMemoryIndex,
    /// Upserts still allowed before failing; negative means unlimited.
    upsert_budget: AtomicI64,
    fail_deletes: AtomicBool,
}

impl FlakyIndex {
    pub fn new(inner: InMemoryIndex) -> Self {
        Self {
            inner,
            upsert_budget: AtomicI64::new(-1),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Allow `n` more upserts, then fail every one after.
    pub fn fail_upserts_after(&self, n: i64) {
        self.upsert_budget.store(n, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.upsert_budget.store(-1, Ordering::SeqCst);
        self.fail_deletes.store(false, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, failing: bool) {
        self.fail_deletes.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingIndex for FlakyIndex {
    async fn embed(&self, text: &str) -> Result<Vector> {
        self.inner.embed(text).await
    }

    async fn upsert(&self, id: Uuid, vector: Vector) -> Result<()> {
        let budget = self
            .upsert_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| {
                if b > 0 {
                    Some(b - 1)
                } else {
                    None
                }
            });
        if budget == Err(0) {
            return Err(Error::Embedding("simulated upsert failure".to_string()));
        }
        self.inner.upsert(id, vector).await
    }

    async fn vector(&self, id: Uuid) -> Result<Option<Vector>> {
        self.inner.vector(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Embedding("simulated delete failure".to_string()));
        }
        self.inner.delete(id).await
    }

    async fn knn(&self, query: &Vector, k: usize) -> Result<Vec<Neighbor>> {
        self.inner.knn(query, k).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}

/// Embeddings keyed by words in the note content:
/// `alpha` and `cluster` are identical, `beta` is close to `alpha`
/// (cosine 0.9), `gamma` is orthogonal to `alpha`.
pub fn embeddings() -> MockEmbeddingBackend {
    MockEmbeddingBackend::new()
        .with_dimension(3)
        .with_fixed_vector("alpha", vec![1.0, 0.0, 0.0])
        .with_fixed_vector("cluster", vec![1.0, 0.0, 0.0])
        .with_fixed_vector("beta", vec![0.9, 0.435_889_9, 0.0])
        .with_fixed_vector("gamma", vec![0.0, 1.0, 0.0])
}

pub struct Harness {
    pub system: Arc<MemorySystem>,
    pub index: Arc<FlakyIndex>,
    pub analysis: MockAnalysisService,
    pub embeddings: MockEmbeddingBackend,
}

pub fn harness(analysis: MockAnalysisService) -> Harness {
    harness_with(analysis, MemoryConfig::default())
}

pub fn harness_with(analysis: MockAnalysisService, config: MemoryConfig) -> Harness {
    let embeddings = embeddings();
    let index = Arc::new(FlakyIndex::new(InMemoryIndex::new(Arc::new(
        embeddings.clone(),
    ))));
    let system = Arc::new(MemorySystem::new(
        index.clone(),
        Arc::new(analysis.clone()),
        config,
    ));
    Harness {
        system,
        index,
        analysis,
        embeddings,
    }
}

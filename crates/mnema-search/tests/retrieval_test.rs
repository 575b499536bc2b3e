//! Retrieval ranker over a real store and in-memory index.

use std::sync::Arc;

use mnema_core::{
    EmbeddingIndex, Error, MemoryConfig, MemoryType, NoteMetadata, SearchRequest,
};
use mnema_index::InMemoryIndex;
use mnema_inference::mock::MockEmbeddingBackend;
use mnema_search::RetrievalRanker;
use mnema_store::{MemoryStore, NoteDraft};
use uuid::Uuid;

struct Fixture {
    store: Arc<MemoryStore>,
    index: Arc<InMemoryIndex>,
    backend: MockEmbeddingBackend,
    ranker: RetrievalRanker,
}

fn fixture() -> Fixture {
    let backend = MockEmbeddingBackend::new()
        .with_dimension(3)
        .with_fixed_vector("needle query", vec![1.0, 0.0, 0.0])
        .with_fixed_vector("alpha", vec![1.0, 0.0, 0.0])
        .with_fixed_vector("beta", vec![0.8, 0.6, 0.0])
        .with_fixed_vector("gamma", vec![0.0, 1.0, 0.0])
        .with_fixed_vector("delta", vec![0.6, 0.8, 0.0]);
    let store = Arc::new(MemoryStore::new());
    let index = Arc::new(InMemoryIndex::new(Arc::new(backend.clone())));
    let ranker = RetrievalRanker::new(store.clone(), index.clone(), MemoryConfig::default());
    Fixture {
        store,
        index,
        backend,
        ranker,
    }
}

async fn add(fx: &Fixture, content: &str, tags: &[&str], memory_type: Option<MemoryType>) -> Uuid {
    let draft = NoteDraft::new(content)
        .with_metadata(NoteMetadata {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        })
        .with_classification(memory_type, None);
    let text = draft.composite_text();
    let id = fx.store.create(draft).await.unwrap();
    fx.index.embed_and_upsert(id, &text).await.unwrap();
    id
}

#[tokio::test]
async fn test_search_orders_by_similarity() {
    let fx = fixture();
    let alpha = add(&fx, "alpha note", &[], None).await;
    let beta = add(&fx, "beta note", &[], None).await;
    let gamma = add(&fx, "gamma note", &[], None).await;

    let response = fx
        .ranker
        .search(&SearchRequest::new("needle query"))
        .await
        .unwrap();

    let order: Vec<Uuid> = response.hits.iter().map(|h| h.id).collect();
    assert_eq!(order, vec![alpha, beta, gamma]);
    assert_eq!(response.total, 3);
    assert!(response.hits[0].similarity > 0.99);
}

#[tokio::test]
async fn test_search_is_not_a_read() {
    let fx = fixture();
    let alpha = add(&fx, "alpha note", &[], None).await;

    fx.ranker
        .search(&SearchRequest::new("needle query"))
        .await
        .unwrap();

    assert_eq!(fx.store.peek(alpha).unwrap().retrieval_count, 0);
}

#[tokio::test]
async fn test_filters_apply_in_order_and_total_counts_survivors() {
    let fx = fixture();
    add(&fx, "alpha note", &["rust"], Some(MemoryType::Knowledge)).await;
    let beta = add(&fx, "beta note", &["rust", "async"], Some(MemoryType::Knowledge)).await;
    add(&fx, "gamma note", &["rust", "async"], Some(MemoryType::Knowledge)).await;
    add(&fx, "delta note", &["rust", "async"], Some(MemoryType::Conversation)).await;

    let req = SearchRequest::new("needle query")
        .with_memory_types([MemoryType::Knowledge])
        .with_tags(["rust", "async"])
        .with_min_similarity(0.5);
    let response = fx.ranker.search(&req).await.unwrap();

    assert_eq!(response.total, 1);
    assert_eq!(response.hits[0].id, beta);
}

#[tokio::test]
async fn test_limit_truncates_after_total() {
    let fx = fixture();
    for content in ["alpha one", "beta two", "gamma three", "delta four"] {
        add(&fx, content, &[], None).await;
    }

    let response = fx
        .ranker
        .search(&SearchRequest::new("needle query").with_limit(2))
        .await
        .unwrap();

    assert_eq!(response.hits.len(), 2);
    assert_eq!(response.total, 4);
}

#[tokio::test]
async fn test_retrieval_count_orders_ties_beyond_overfetch() {
    let fx = fixture();
    let mut tied = Vec::new();
    for i in 0..5 {
        tied.push(add(&fx, &format!("alpha twin {}", i), &[], None).await);
    }
    // Highest id, so an id-ordered cut at the fetch size drops it first.
    let popular = *tied.iter().max().unwrap();
    fx.store.read(popular).unwrap();
    fx.store.read(popular).unwrap();

    let response = fx
        .ranker
        .search(&SearchRequest::new("needle query").with_limit(1))
        .await
        .unwrap();

    assert!(fx.ranker.fetch_size(1) < tied.len());
    assert_eq!(response.hits.len(), 1);
    assert_eq!(response.hits[0].id, popular);
    assert_eq!(response.hits[0].retrieval_count, 2);
    assert_eq!(response.total, 5);
}

#[tokio::test]
async fn test_deleted_notes_never_surface() {
    let fx = fixture();
    let alpha = add(&fx, "alpha note", &[], None).await;
    let beta = add(&fx, "beta note", &[], None).await;

    // Store delete without index delete, as during a concurrent removal.
    fx.store.delete(alpha).await.unwrap();

    let response = fx
        .ranker
        .search(&SearchRequest::new("needle query"))
        .await
        .unwrap();
    assert_eq!(response.total, 1);
    assert_eq!(response.hits[0].id, beta);
}

#[tokio::test]
async fn test_validation_limits() {
    let fx = fixture();
    for req in [
        SearchRequest::new("   "),
        SearchRequest::new("q").with_limit(0),
        SearchRequest::new("q").with_limit(101),
        SearchRequest::new("q").with_min_similarity(1.5),
        SearchRequest::new("q").with_min_similarity(-0.1),
    ] {
        let err = fx.ranker.search(&req).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{:?}", err);
    }
    assert_eq!(fx.backend.embed_call_count(), 0);
}

#[tokio::test]
async fn test_embedding_failure_is_index_unavailable() {
    let fx = fixture();
    add(&fx, "alpha note", &[], None).await;
    fx.backend.set_failing(true);

    let err = fx
        .ranker
        .search(&SearchRequest::new("needle query"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::IndexUnavailable(_)), "{:?}", err);
    assert!(err.is_retryable());
}

//! Link graph consistency tests for the note store.

use std::sync::Arc;

use chrono::Utc;
use mnema_core::{Error, EvolutionAction, MetadataDelta};
use mnema_store::{ChangeSet, MemoryStore, NoteDraft, NoteUpdate};
use uuid::Uuid;

async fn seed(store: &MemoryStore, n: usize) -> Vec<Uuid> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        ids.push(store.create(NoteDraft::new(format!("note {}", i))).await.unwrap());
    }
    ids
}

#[tokio::test]
async fn test_delete_cascades_link_removal() {
    let store = MemoryStore::new();
    let ids = seed(&store, 3).await;
    let (a, b, c) = (ids[0], ids[1], ids[2]);

    let guard = store.lock_write([a, b, c]).await;
    store
        .commit(&guard, ChangeSet::new().link(a, b, a).link(a, c, a))
        .unwrap();
    drop(guard);

    let removed = store.delete(a).await.unwrap();
    assert_eq!(removed.links.len(), 2);
    assert!(!store.contains(a));
    for neighbor in [b, c] {
        let note = store.peek(neighbor).unwrap();
        assert!(note.links.is_empty());
        assert_eq!(
            note.evolution_history.last().map(|e| (e.source, e.action)),
            Some((a, EvolutionAction::Unlinked))
        );
    }
    assert!(store.violations().is_empty());
}

#[tokio::test]
async fn test_delete_missing_note() {
    let store = MemoryStore::new();
    let id = Uuid::now_v7();
    assert!(matches!(store.delete(id).await, Err(Error::NoteNotFound(x)) if x == id));
}

#[tokio::test]
async fn test_delete_hook_failure_leaves_note_linked() {
    let store = MemoryStore::new();
    let ids = seed(&store, 2).await;
    let (a, b) = (ids[0], ids[1]);
    let guard = store.lock_write([a, b]).await;
    store.commit(&guard, ChangeSet::new().link(a, b, a)).unwrap();
    drop(guard);

    let err = store
        .delete_with(a, || async { Err(Error::IndexUnavailable("down".into())) })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::IndexUnavailable(_)));
    assert!(store.contains(a));
    assert!(store.peek(b).unwrap().links.contains(&a));

    let mut hook_ran = false;
    store
        .delete_with(a, || {
            hook_ran = true;
            async { Ok(()) }
        })
        .await
        .unwrap();
    assert!(hook_ran);
    assert!(!store.contains(a));
}

#[tokio::test]
async fn test_retired_identifier_never_reused() {
    let store = MemoryStore::new();
    let mut draft = NoteDraft::new("first");
    let id = draft.id;
    store.create(draft.clone()).await.unwrap();
    store.delete(id).await.unwrap();
    assert!(store.is_retired(id));

    draft.content = "second".to_string();
    assert!(matches!(store.create(draft).await, Err(Error::Conflict(_))));
    assert!(!store.contains(id));
}

#[tokio::test]
async fn test_duplicate_identifier_rejected() {
    let store = MemoryStore::new();
    let draft = NoteDraft::new("x");
    store.create(draft.clone()).await.unwrap();
    assert!(matches!(store.create(draft).await, Err(Error::Conflict(_))));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_self_link_rejected() {
    let store = MemoryStore::new();
    let a = seed(&store, 1).await[0];
    let guard = store.lock_write([a]).await;
    assert!(matches!(
        store.commit(&guard, ChangeSet::new().link(a, a, a)),
        Err(Error::InvalidInput(_))
    ));
    assert!(store.peek(a).unwrap().links.is_empty());
}

#[tokio::test]
async fn test_update_missing_note() {
    let store = MemoryStore::new();
    let result = store.update(Uuid::now_v7(), NoteUpdate::default()).await;
    assert!(matches!(result, Err(Error::NoteNotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_links_and_deletes_stay_symmetric() {
    let store = Arc::new(MemoryStore::new());
    let ids = seed(&store, 12).await;

    let mut tasks = Vec::new();
    for (i, &a) in ids.iter().enumerate() {
        for &b in ids.iter().skip(i + 1) {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let guard = store.lock_write([b, a]).await;
                let _ = store.commit(&guard, ChangeSet::new().link(a, b, a));
            }));
        }
    }
    for &victim in ids.iter().step_by(4) {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let _ = store.delete(victim).await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert!(store.violations().is_empty());
    assert_eq!(store.len(), 9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_merges_keep_every_fragment() {
    let store = Arc::new(MemoryStore::new());
    let ids = seed(&store, 5).await;
    let target = ids[0];

    let mut tasks = Vec::new();
    for &source in &ids[1..] {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let guard = store.lock_write([source, target]).await;
            let delta = MetadataDelta {
                tags: vec![format!("from-{}", source)],
                context: Some(format!("fragment {}", source)),
            };
            store
                .commit(
                    &guard,
                    ChangeSet::new().link(source, target, source).merge(target, delta, source),
                )
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let note = store.peek(target).unwrap();
    assert_eq!(note.tags.len(), 4);
    assert_eq!(note.links.len(), 4);
    for &source in &ids[1..] {
        assert!(note.context.contains(&format!("fragment {}", source)));
    }
    assert_eq!(store.pending_evolution(), vec![target]);
}

#[tokio::test]
async fn test_reads_see_committed_state_only() {
    let store = MemoryStore::new();
    let ids = seed(&store, 2).await;
    let (a, b) = (ids[0], ids[1]);
    let before = store.read(a).unwrap();

    let guard = store.lock_write([a, b]).await;
    store.commit(&guard, ChangeSet::new().link(a, b, b)).unwrap();
    drop(guard);

    let after = store.read(a).unwrap();
    assert!(before.links.is_empty());
    assert_eq!(after.links.len(), 1);
    assert_eq!(after.retrieval_count, 2);
    assert!(after.last_accessed_at >= before.last_accessed_at);
    assert!(after.last_accessed_at <= Utc::now());
}

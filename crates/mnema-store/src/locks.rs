//! Per-note lock registry.
//!
//! Every note owns two async locks:
//! - the *pass* lock serializes evolution passes, updates and deletes
//!   anchored on the note;
//! - the *write* lock guards store commits touching the note.
//!
//! Write locks for several notes are always taken in ascending identifier
//! order, which keeps concurrent multi-note commits deadlock-free.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct NoteLocks {
    pass: Arc<AsyncMutex<()>>,
    write: Arc<AsyncMutex<()>>,
}

impl NoteLocks {
    /// No guard or waiter holds a clone of either lock.
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.pass) == 1 && Arc::strong_count(&self.write) == 1
    }
}

/// Lazily-populated registry of per-note locks.
#[derive(Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<Uuid, NoteLocks>>,
}

/// Held pass lock for one note.
pub struct PassGuard {
    id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl PassGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Held write locks for a set of notes.
pub struct WriteGuard {
    ids: BTreeSet<Uuid>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl WriteGuard {
    /// Whether this guard covers writes to `id`.
    pub fn covers(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> &BTreeSet<Uuid> {
        &self.ids
    }
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn pass_lock(&self, id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id).or_default().pass.clone()
    }

    fn write_lock(&self, id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id).or_default().write.clone()
    }

    /// Acquire the pass lock of a single note.
    pub async fn lock_pass(&self, id: Uuid) -> PassGuard {
        let lock = self.pass_lock(id);
        PassGuard {
            id,
            _guard: lock.lock_owned().await,
        }
    }

    /// Acquire write locks for every id, in ascending order.
    pub async fn lock_write<I>(&self, ids: I) -> WriteGuard
    where
        I: IntoIterator<Item = Uuid>,
    {
        let ids: BTreeSet<Uuid> = ids.into_iter().collect();
        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            let lock = self.write_lock(*id);
            guards.push(lock.lock_owned().await);
        }
        tracing::trace!(count = ids.len(), "Acquired note write locks");
        WriteGuard {
            ids,
            _guards: guards,
        }
    }

    /// Drop the entries of `ids` that no task holds or waits on.
    ///
    /// Returns how many entries were dropped. Later lockers of a dropped id
    /// get fresh locks.
    pub fn forget_idle<I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut dropped = 0;
        for id in ids {
            if locks.get(&id).is_some_and(NoteLocks::is_idle) {
                locks.remove(&id);
                dropped += 1;
            }
        }
        dropped
    }

    /// Number of notes with registered locks.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

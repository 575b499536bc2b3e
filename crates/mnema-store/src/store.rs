//! The note store.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, trace};
use uuid::Uuid;

use mnema_core::{Error, EvolutionAction, EvolutionEvent, Note, Result};

use crate::changes::{ChangeSet, CommitSummary, Mutation, NoteDraft, NoteUpdate};
use crate::links::{self, LinkViolation};
use crate::locks::{LockRegistry, PassGuard, WriteGuard};
use crate::merge::apply_delta;

#[derive(Default)]
struct StoreState {
    notes: HashMap<Uuid, Note>,
    retired: HashSet<Uuid>,
    pending: BTreeSet<Uuid>,
}

/// In-memory note store; the source of truth for content, metadata and links.
///
/// Reads clone a snapshot under the map lock. Writes go through
/// [`MemoryStore::commit`] while holding the write locks of every touched note.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    locks: LockRegistry,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // LOCKING
    // =========================================================================

    /// Acquire the pass lock of `id`.
    pub async fn lock_pass(&self, id: Uuid) -> PassGuard {
        self.locks.lock_pass(id).await
    }

    /// Acquire write locks for `ids` in ascending order.
    pub async fn lock_write<I>(&self, ids: I) -> WriteGuard
    where
        I: IntoIterator<Item = Uuid>,
    {
        self.locks.lock_write(ids).await
    }

    /// Release `guard`, dropping the lock entries of covered notes that are
    /// not stored.
    pub fn release(&self, guard: WriteGuard) {
        let ids: Vec<Uuid> = guard.ids().iter().copied().collect();
        drop(guard);
        self.forget_absent(ids);
    }

    /// Release a pass lock, dropping its entry when the note is not stored.
    pub fn release_pass(&self, guard: PassGuard) {
        let id = guard.id();
        drop(guard);
        self.forget_absent([id]);
    }

    fn forget_absent<I>(&self, ids: I)
    where
        I: IntoIterator<Item = Uuid>,
    {
        let absent: Vec<Uuid> = {
            let state = self.read_state();
            ids.into_iter()
                .filter(|id| !state.notes.contains_key(id))
                .collect()
        };
        if absent.is_empty() {
            return;
        }
        let dropped = self.locks.forget_idle(absent);
        trace!(dropped, "Released locks of absent notes");
    }

    /// Notes with registered locks.
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Fetch a note, counting it as a retrieval.
    pub fn read(&self, id: Uuid) -> Result<Note> {
        let mut state = self.write_state();
        let note = state.notes.get_mut(&id).ok_or(Error::NoteNotFound(id))?;
        note.retrieval_count += 1;
        note.last_accessed_at = Utc::now();
        trace!(note_id = %id, retrieval_count = note.retrieval_count, "Note read");
        Ok(note.clone())
    }

    /// Snapshot of a note without access tracking.
    pub fn peek(&self, id: Uuid) -> Option<Note> {
        self.read_state().notes.get(&id).cloned()
    }

    /// Snapshots of every listed note that exists, in input order.
    pub fn peek_many(&self, ids: &[Uuid]) -> Vec<Note> {
        let state = self.read_state();
        ids.iter().filter_map(|id| state.notes.get(id).cloned()).collect()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.read_state().notes.contains_key(&id)
    }

    /// Whether `id` belonged to a deleted note.
    pub fn is_retired(&self, id: Uuid) -> bool {
        self.read_state().retired.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.read_state().notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored identifiers in ascending order.
    pub fn ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.read_state().notes.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Snapshot of every note, in identifier order.
    pub fn snapshot(&self) -> Vec<Note> {
        let state = self.read_state();
        let mut notes: Vec<Note> = state.notes.values().cloned().collect();
        notes.sort_by_key(|n| n.id);
        notes
    }

    /// Notes changed by another note's pass and awaiting their own.
    pub fn pending_evolution(&self) -> Vec<Uuid> {
        self.read_state().pending.iter().copied().collect()
    }

    /// Graph invariant violations currently present.
    pub fn violations(&self) -> Vec<LinkViolation> {
        links::violations(&self.read_state().notes)
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Store a new note and return its identifier.
    #[instrument(skip(self, draft), fields(subsystem = "store", op = "create", note_id = %draft.id))]
    pub async fn create(&self, draft: NoteDraft) -> Result<Uuid> {
        let id = draft.id;
        let guard = self.lock_write([id]).await;
        let note = draft.into_note(Utc::now());
        let result = self.commit(&guard, ChangeSet::new().insert(note));
        self.release(guard);
        result?;
        Ok(id)
    }

    /// Replace fields of a note and return the updated snapshot.
    #[instrument(skip(self, update), fields(subsystem = "store", op = "update", note_id = %id))]
    pub async fn update(&self, id: Uuid, update: NoteUpdate) -> Result<Note> {
        let guard = self.lock_write([id]).await;
        let result = self.commit(&guard, ChangeSet::new().update(id, update));
        self.release(guard);
        result?;
        self.peek(id).ok_or(Error::NoteNotFound(id))
    }

    /// Delete a note and unlink it from every neighbor.
    pub async fn delete(&self, id: Uuid) -> Result<Note> {
        self.delete_with(id, || async { Ok(()) }).await
    }

    /// Delete a note, running `before_commit` while every affected note is
    /// write-locked. An error from `before_commit` leaves the store unchanged.
    ///
    /// The neighbor set can change while locks are being acquired, so the
    /// link set is re-read under the locks and acquisition repeats until
    /// it is stable.
    #[instrument(skip(self, before_commit), fields(subsystem = "store", op = "delete", note_id = %id))]
    pub async fn delete_with<F, Fut>(&self, id: Uuid, before_commit: F) -> Result<Note>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut before_commit = Some(before_commit);
        loop {
            let before = self.peek(id).ok_or(Error::NoteNotFound(id))?.links;
            let guard = self.lock_write(before.iter().copied().chain([id])).await;
            let current = match self.peek(id) {
                Some(note) => note.links,
                None => {
                    self.release(guard);
                    return Err(Error::NoteNotFound(id));
                }
            };
            if current != before {
                debug!(note_id = %id, "Link set changed while locking, retrying delete");
                continue;
            }
            if let Some(hook) = before_commit.take() {
                hook().await?;
            }
            let mut summary = self.commit(&guard, ChangeSet::new().remove(id))?;
            self.release(guard);
            return summary.removed.pop().ok_or(Error::NoteNotFound(id));
        }
    }

    /// Apply a change set all-or-nothing.
    ///
    /// Every note the mutations touch (including neighbors unlinked by a
    /// removal) must be covered by `guard`. Any error leaves the store
    /// unchanged.
    pub fn commit(&self, guard: &WriteGuard, changes: ChangeSet) -> Result<CommitSummary> {
        let now = Utc::now();
        let mut state = self.write_state();
        let mut stage = Stage::new(&state, guard, now);

        for mutation in changes.into_mutations() {
            stage.apply(mutation)?;
        }

        let Stage {
            notes,
            removed,
            pending_add,
            pending_clear,
            summary,
            ..
        } = stage;

        for id in &pending_clear {
            state.pending.remove(id);
        }
        for id in pending_add {
            state.pending.insert(id);
        }
        for (id, note) in notes {
            state.notes.insert(id, note);
        }
        for id in removed {
            state.notes.remove(&id);
            state.pending.remove(&id);
            state.retired.insert(id);
        }

        if summary.links_created > 0 || !summary.removed.is_empty() {
            info!(
                subsystem = "store",
                op = "commit",
                links_created = summary.links_created,
                enriched = summary.enriched.len(),
                removed = summary.removed.len(),
                "Store commit applied"
            );
        }
        Ok(summary)
    }
}

/// Copy-on-write view of the notes a commit touches.
struct Stage<'a> {
    base: &'a StoreState,
    guard: &'a WriteGuard,
    at: DateTime<Utc>,
    notes: HashMap<Uuid, Note>,
    removed: BTreeSet<Uuid>,
    pending_add: BTreeSet<Uuid>,
    pending_clear: BTreeSet<Uuid>,
    summary: CommitSummary,
}

impl<'a> Stage<'a> {
    fn new(base: &'a StoreState, guard: &'a WriteGuard, at: DateTime<Utc>) -> Self {
        Self {
            base,
            guard,
            at,
            notes: HashMap::new(),
            removed: BTreeSet::new(),
            pending_add: BTreeSet::new(),
            pending_clear: BTreeSet::new(),
            summary: CommitSummary::default(),
        }
    }

    fn ensure_locked(&self, id: Uuid) -> Result<()> {
        if self.guard.covers(&id) {
            Ok(())
        } else {
            Err(Error::Internal(format!("commit touches unlocked note {}", id)))
        }
    }

    /// Take a staged copy of `id` out of the stage.
    fn take(&mut self, id: Uuid) -> Result<Note> {
        self.ensure_locked(id)?;
        if self.removed.contains(&id) {
            return Err(Error::NoteNotFound(id));
        }
        if let Some(note) = self.notes.remove(&id) {
            return Ok(note);
        }
        self.base
            .notes
            .get(&id)
            .cloned()
            .ok_or(Error::NoteNotFound(id))
    }

    fn put(&mut self, note: Note) {
        self.notes.insert(note.id, note);
    }

    fn apply(&mut self, mutation: Mutation) -> Result<()> {
        match mutation {
            Mutation::Insert(note) => {
                let id = note.id;
                self.ensure_locked(id)?;
                if self.base.retired.contains(&id) || self.removed.contains(&id) {
                    return Err(Error::Conflict(format!("identifier {} was retired", id)));
                }
                if self.base.notes.contains_key(&id) || self.notes.contains_key(&id) {
                    return Err(Error::Conflict(format!("identifier {} already exists", id)));
                }
                if note.links.contains(&id) {
                    return Err(Error::InvalidInput(format!("note {} links to itself", id)));
                }
                let targets: Vec<Uuid> = note.links.iter().copied().collect();
                self.put(note);
                for target in targets {
                    self.link(id, target, id)?;
                }
            }
            Mutation::Update { id, update } => {
                let mut note = self.take(id)?;
                if update.apply_to(&mut note) {
                    self.summary.updated.push(id);
                }
                self.put(note);
            }
            Mutation::Link { a, b, source } => {
                self.link(a, b, source)?;
            }
            Mutation::Merge { id, delta, source } => {
                let mut note = self.take(id)?;
                let changed = apply_delta(&mut note.tags, &mut note.context, &delta);
                if changed {
                    note.evolution_history.push(EvolutionEvent {
                        source,
                        action: EvolutionAction::Enriched,
                        at: self.at,
                    });
                    self.pending_add.insert(id);
                    self.pending_clear.remove(&id);
                    self.summary.enriched.push(id);
                }
                self.put(note);
            }
            Mutation::ClearPending(id) => {
                self.pending_add.remove(&id);
                self.pending_clear.insert(id);
            }
            Mutation::Remove(id) => {
                let note = self.take(id)?;
                for neighbor in &note.links {
                    let mut other = match self.take(*neighbor) {
                        Ok(other) => other,
                        Err(Error::NoteNotFound(_)) => continue,
                        Err(e) => return Err(e),
                    };
                    if links::unlink_from(&mut other, id, self.at) {
                        self.summary.unlinked.push(other.id);
                    }
                    self.put(other);
                }
                self.pending_add.remove(&id);
                self.removed.insert(id);
                self.summary.removed.push(note);
            }
        }
        Ok(())
    }

    fn link(&mut self, a: Uuid, b: Uuid, source: Uuid) -> Result<()> {
        if a == b {
            return Err(Error::InvalidInput(format!("note {} cannot link to itself", a)));
        }
        let mut first = self.take(a)?;
        let mut second = match self.take(b) {
            Ok(note) => note,
            Err(e) => {
                self.put(first);
                return Err(e);
            }
        };
        if links::link_pair(&mut first, &mut second, source, self.at) {
            self.summary.links_created += 1;
        }
        self.put(first);
        self.put(second);
        Ok(())
    }
}

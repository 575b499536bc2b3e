//! The memory system facade.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use mnema_core::validation::{validate_add, validate_update};
use mnema_core::{
    with_deadline, AddNoteRequest, AddNoteResponse, AnalysisService, EmbeddingIndex, Error,
    EvolutionReport, MemoryConfig, Note, Result, SearchRequest, SearchResponse,
    UpdateNoteRequest, UpdateNoteResponse, Vector,
};
use mnema_search::RetrievalRanker;
use mnema_store::links::LinkViolation;
use mnema_store::{MemoryStore, NoteDraft, NoteUpdate};

use crate::enrichment::EnrichmentCoordinator;
use crate::evolution::{AnchorChange, EvolutionEngine};

/// An evolving network of memory notes.
///
/// `MemorySystem` is `Send + Sync`; share it through an `Arc` and call it
/// from as many tasks as needed.
pub struct MemorySystem {
    store: Arc<MemoryStore>,
    index: Arc<dyn EmbeddingIndex>,
    enrichment: EnrichmentCoordinator,
    engine: EvolutionEngine,
    ranker: RetrievalRanker,
    config: MemoryConfig,
}

impl MemorySystem {
    pub fn new(
        index: Arc<dyn EmbeddingIndex>,
        analysis: Arc<dyn AnalysisService>,
        config: MemoryConfig,
    ) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), index, analysis, config)
    }

    /// Build over an existing store.
    pub fn with_store(
        store: Arc<MemoryStore>,
        index: Arc<dyn EmbeddingIndex>,
        analysis: Arc<dyn AnalysisService>,
        config: MemoryConfig,
    ) -> Self {
        let enrichment = EnrichmentCoordinator::new(analysis.clone(), config.analysis_timeout());
        let engine = EvolutionEngine::new(store.clone(), index.clone(), analysis, &config);
        let ranker = RetrievalRanker::new(store.clone(), index.clone(), config.clone());
        Self {
            store,
            index,
            enrichment,
            engine,
            ranker,
            config,
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    fn index_timeout(&self) -> Duration {
        self.config.index_timeout()
    }

    async fn embed(&self, text: &str) -> Result<Vector> {
        with_deadline(self.index_timeout(), self.index.embed(text))
            .await
            .map_err(|e| e.into_index_unavailable())
    }

    /// Add a note: enrich, embed, run its evolution pass and persist.
    ///
    /// Nothing is persisted when the embedding index fails.
    #[instrument(skip(self, req), fields(subsystem = "engine", component = "system", op = "add", note_id = tracing::field::Empty))]
    pub async fn add(&self, mut req: AddNoteRequest) -> Result<AddNoteResponse> {
        let start = Instant::now();
        validate_add(&mut req, &self.config)?;

        let supplied = req.partial_metadata();
        let enrichment = self.enrichment.enrich(&req.content, &supplied).await;

        let note = NoteDraft::new(req.content)
            .with_metadata(enrichment.metadata)
            .with_timestamp(req.timestamp)
            .with_classification(req.memory_type, req.importance)
            .into_note(Utc::now());
        let id = note.id;
        tracing::Span::current().record("note_id", tracing::field::display(id));

        let vector = self.embed(&note.composite_text()).await?;
        let evolution = self.engine.run(note, vector, AnchorChange::Insert).await?;
        let note = self
            .store
            .peek(id)
            .ok_or_else(|| Error::Internal(format!("note {} missing after insert", id)))?;

        info!(
            note_id = %id,
            links_created = evolution.links_created,
            degraded = enrichment.degraded.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Note added"
        );
        Ok(AddNoteResponse {
            note,
            evolution,
            degraded: enrichment.degraded,
        })
    }

    /// Fetch a note, counting the retrieval.
    pub fn read(&self, id: Uuid) -> Result<Note> {
        self.store.read(id)
    }

    /// Replace fields of a note. When the composite text changes, the note
    /// is re-embedded and an evolution pass runs.
    #[instrument(skip(self, req), fields(subsystem = "engine", component = "system", op = "update", note_id = %id))]
    pub async fn update(&self, id: Uuid, mut req: UpdateNoteRequest) -> Result<UpdateNoteResponse> {
        validate_update(&mut req, &self.config)?;
        let pass = self.store.lock_pass(id).await;
        let result = self.update_locked(id, NoteUpdate::from(req)).await;
        self.store.release_pass(pass);
        result
    }

    async fn update_locked(&self, id: Uuid, update: NoteUpdate) -> Result<UpdateNoteResponse> {
        let current = self.store.peek(id).ok_or(Error::NoteNotFound(id))?;
        let mut updated = current.clone();
        if !update.apply_to(&mut updated) {
            debug!(note_id = %id, "Update changes nothing");
            return Ok(UpdateNoteResponse {
                note: current,
                evolution: None,
            });
        }

        if updated.composite_text() == current.composite_text() {
            let note = self.store.update(id, update).await?;
            return Ok(UpdateNoteResponse {
                note,
                evolution: None,
            });
        }

        let vector = self.embed(&updated.composite_text()).await?;
        let evolution = self
            .engine
            .run(updated, vector, AnchorChange::Update(update))
            .await?;
        let note = self.store.peek(id).ok_or(Error::NoteNotFound(id))?;
        Ok(UpdateNoteResponse {
            note,
            evolution: Some(evolution),
        })
    }

    /// Delete a note, its index entry and every link to it.
    #[instrument(skip(self), fields(subsystem = "engine", component = "system", op = "delete", note_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<Note> {
        let pass = self.store.lock_pass(id).await;
        let index = self.index.clone();
        let timeout = self.index_timeout();
        let result = self
            .store
            .delete_with(id, move || async move {
                with_deadline(timeout, index.delete(id))
                    .await
                    .map(|_| ())
                    .map_err(|e| e.into_index_unavailable())
            })
            .await;
        self.store.release_pass(pass);
        let removed = result?;
        info!(note_id = %id, unlinked = removed.links.len(), "Note deleted");
        Ok(removed)
    }

    /// Semantic search with metadata filters. Not counted as a read.
    pub async fn search(&self, req: &SearchRequest) -> Result<SearchResponse> {
        self.ranker.search(req).await
    }

    /// Run an evolution pass for an existing note, typically one left
    /// pending by another note's pass.
    #[instrument(skip(self), fields(subsystem = "engine", component = "system", op = "evolve", note_id = %id))]
    pub async fn evolve(&self, id: Uuid) -> Result<EvolutionReport> {
        let pass = self.store.lock_pass(id).await;
        let result = self.evolve_locked(id).await;
        self.store.release_pass(pass);
        result
    }

    async fn evolve_locked(&self, id: Uuid) -> Result<EvolutionReport> {
        let note = self.store.peek(id).ok_or(Error::NoteNotFound(id))?;
        let stored = with_deadline(self.index_timeout(), self.index.vector(id))
            .await
            .map_err(|e| e.into_index_unavailable())?;
        let vector = match stored {
            Some(vector) => vector,
            None => self.embed(&note.composite_text()).await?,
        };
        self.engine.run(note, vector, AnchorChange::Unchanged).await
    }

    /// Notes enriched by another note's pass and awaiting their own.
    pub fn pending_evolution(&self) -> Vec<Uuid> {
        self.store.pending_evolution()
    }

    /// Graph invariant violations currently present in the store.
    pub fn violations(&self) -> Vec<LinkViolation> {
        self.store.violations()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

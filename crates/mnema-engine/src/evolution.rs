//! Evolution passes: evaluate link candidates and apply the decisions.
//!
//! A pass moves through `CandidatesGathered → Evaluated → Applied`.
//! Candidates are evaluated concurrently and a failing candidate is skipped
//! on its own. Applying a pass write-locks the anchor and every target,
//! re-embeds whatever changed, writes the index, and commits links and
//! neighbor metadata to the store in one change set. An index failure
//! restores the vectors written so far and leaves the store untouched.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use mnema_core::{
    with_deadline, AnalysisService, EmbeddingIndex, Error, EvolutionReport, EvolutionState,
    LinkDecision, MemoryConfig, MetadataDelta, Neighbor, Note, Result, SkippedCandidate, Vector,
};
use mnema_store::{apply_delta, ChangeSet, MemoryStore, NoteUpdate, WriteGuard};

use crate::discovery::{Candidate, LinkDiscovery};

/// How the anchor itself changes in the pass commit.
#[derive(Debug, Clone)]
pub enum AnchorChange {
    /// The anchor is new and is inserted by the commit.
    Insert,
    /// The anchor's fields are replaced by the commit.
    Update(NoteUpdate),
    /// The anchor is already stored as is.
    Unchanged,
}

/// Runs evolution passes against the store and the embedding index.
pub struct EvolutionEngine {
    store: Arc<MemoryStore>,
    index: Arc<dyn EmbeddingIndex>,
    analysis: Arc<dyn AnalysisService>,
    discovery: LinkDiscovery,
    analysis_timeout: Duration,
    index_timeout: Duration,
}

impl EvolutionEngine {
    pub fn new(
        store: Arc<MemoryStore>,
        index: Arc<dyn EmbeddingIndex>,
        analysis: Arc<dyn AnalysisService>,
        config: &MemoryConfig,
    ) -> Self {
        let discovery = LinkDiscovery::new(
            store.clone(),
            index.clone(),
            config.link_k,
            config.link_min_similarity,
            config.index_timeout(),
        );
        Self {
            store,
            index,
            analysis,
            discovery,
            analysis_timeout: config.analysis_timeout(),
            index_timeout: config.index_timeout(),
        }
    }

    /// Run one pass anchored on `anchor`, whose composite embedding is
    /// `vector`.
    ///
    /// The caller holds the anchor's pass lock. Neighbors changed by the pass
    /// are only marked pending; their own passes are caller-driven.
    #[instrument(skip(self, anchor, vector, change), fields(subsystem = "engine", component = "evolution", op = "run", note_id = %anchor.id))]
    pub async fn run(
        &self,
        anchor: Note,
        vector: Vector,
        change: AnchorChange,
    ) -> Result<EvolutionReport> {
        let start = Instant::now();
        let mut report = EvolutionReport::empty(anchor.id);

        let candidates = self.discovery.candidates(anchor.id, &vector).await?;
        report.candidates = candidates
            .iter()
            .map(|c| Neighbor {
                id: c.note.id,
                score: c.score,
            })
            .collect();
        report.state = EvolutionState::CandidatesGathered;

        let decisions = self.evaluate(&anchor, candidates, &mut report).await;
        report.state = EvolutionState::Evaluated;

        self.apply(anchor, vector, change, decisions, &mut report)
            .await?;
        report.state = EvolutionState::Applied;

        info!(
            note_id = %report.anchor,
            candidate_count = report.candidates.len(),
            links_created = report.links_created,
            enriched = report.enriched.len(),
            skipped = report.skipped.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Evolution pass applied"
        );
        Ok(report)
    }

    /// Ask the analysis service about every candidate concurrently.
    async fn evaluate(
        &self,
        anchor: &Note,
        candidates: Vec<Candidate>,
        report: &mut EvolutionReport,
    ) -> Vec<(Candidate, LinkDecision)> {
        let calls = candidates.iter().map(|c| {
            with_deadline(
                self.analysis_timeout,
                self.analysis.joint_analyze(anchor, &c.note, c.score),
            )
        });
        let results = join_all(calls).await;

        let mut decisions = Vec::with_capacity(candidates.len());
        for (candidate, result) in candidates.into_iter().zip(results) {
            match result {
                Ok(decision) => {
                    debug!(
                        neighbor_id = %candidate.note.id,
                        similarity = candidate.score,
                        action = decision.as_str(),
                        "Candidate evaluated"
                    );
                    decisions.push((candidate, decision));
                }
                Err(e) => {
                    let skipped = Error::CandidateSkipped {
                        candidate: candidate.note.id,
                        reason: e.to_string(),
                    };
                    warn!(error = %skipped, neighbor_id = %candidate.note.id, "EvolutionCandidateSkipped");
                    report.skipped.push(SkippedCandidate {
                        id: candidate.note.id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        decisions
    }

    async fn apply(
        &self,
        anchor: Note,
        anchor_vector: Vector,
        change: AnchorChange,
        decisions: Vec<(Candidate, LinkDecision)>,
        report: &mut EvolutionReport,
    ) -> Result<()> {
        let anchor_id = anchor.id;
        let targets: Vec<(Uuid, Option<MetadataDelta>)> = decisions
            .into_iter()
            .filter_map(|(candidate, decision)| match decision {
                LinkDecision::Skip => None,
                LinkDecision::LinkOnly => Some((candidate.note.id, None)),
                LinkDecision::LinkAndEnrich { delta } => Some((candidate.note.id, Some(delta))),
            })
            .collect();

        let guard = self
            .store
            .lock_write(targets.iter().map(|(id, _)| *id).chain([anchor_id]))
            .await;
        let result = self
            .apply_locked(&guard, anchor, anchor_vector, change, targets, report)
            .await;
        self.store.release(guard);
        result
    }

    /// Build and commit the pass's changes while `guard` covers the anchor
    /// and every linked candidate.
    async fn apply_locked(
        &self,
        guard: &WriteGuard,
        anchor: Note,
        anchor_vector: Vector,
        change: AnchorChange,
        targets: Vec<(Uuid, Option<MetadataDelta>)>,
        report: &mut EvolutionReport,
    ) -> Result<()> {
        let anchor_id = anchor.id;
        let mut changes = ChangeSet::new();
        let mut vectors: Vec<(Uuid, Vector)> = Vec::new();

        match change {
            AnchorChange::Insert => {
                changes = changes.insert(anchor.clone());
                vectors.push((anchor_id, anchor_vector));
            }
            AnchorChange::Update(update) => {
                let mut current = self
                    .store
                    .peek(anchor_id)
                    .ok_or(Error::NoteNotFound(anchor_id))?;
                update.apply_to(&mut current);
                let text = current.composite_text();
                let vector = if text == anchor.composite_text() {
                    anchor_vector
                } else {
                    self.embed(&text).await?
                };
                vectors.push((anchor_id, vector));
                changes = changes.update(anchor_id, update);
            }
            AnchorChange::Unchanged => {
                let current = self
                    .store
                    .peek(anchor_id)
                    .ok_or(Error::NoteNotFound(anchor_id))?;
                let text = current.composite_text();
                if text != anchor.composite_text() {
                    vectors.push((anchor_id, self.embed(&text).await?));
                } else if self.stored_vector(anchor_id).await?.is_none() {
                    vectors.push((anchor_id, anchor_vector));
                }
            }
        }

        for (target, delta) in targets {
            let Some(mut neighbor) = self.store.peek(target) else {
                debug!(neighbor_id = %target, "Candidate deleted during pass");
                report.skipped.push(SkippedCandidate {
                    id: target,
                    reason: "deleted during pass".to_string(),
                });
                continue;
            };
            changes = changes.link(anchor_id, target, anchor_id);
            report.linked.push(target);

            if let Some(delta) = delta {
                if apply_delta(&mut neighbor.tags, &mut neighbor.context, &delta) {
                    let vector = self.embed(&neighbor.composite_text()).await?;
                    vectors.push((target, vector));
                }
                changes = changes.merge(target, delta, anchor_id);
            }
        }
        changes = changes.clear_pending(anchor_id);

        let mut previous = Vec::with_capacity(vectors.len());
        for (id, _) in &vectors {
            previous.push((*id, self.stored_vector(*id).await?));
        }

        let mut written: Vec<Uuid> = Vec::with_capacity(vectors.len());
        for (id, vector) in vectors {
            if let Err(e) = with_deadline(self.index_timeout, self.index.upsert(id, vector)).await {
                warn!(note_id = %anchor_id, neighbor_id = %id, error = %e, "Index upsert failed, aborting pass");
                self.restore(&previous, &written).await;
                return Err(e.into_index_unavailable());
            }
            written.push(id);
        }

        let summary = match self.store.commit(guard, changes) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(note_id = %anchor_id, error = %e, "Store commit failed, aborting pass");
                self.restore(&previous, &written).await;
                return Err(e);
            }
        };

        report.links_created = summary.links_created;
        report.enriched = summary.enriched;
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vector> {
        with_deadline(self.index_timeout, self.index.embed(text))
            .await
            .map_err(|e| e.into_index_unavailable())
    }

    async fn stored_vector(&self, id: Uuid) -> Result<Option<Vector>> {
        with_deadline(self.index_timeout, self.index.vector(id))
            .await
            .map_err(|e| e.into_index_unavailable())
    }

    /// Best-effort rollback of index writes made by an aborted pass.
    async fn restore(&self, previous: &[(Uuid, Option<Vector>)], written: &[Uuid]) {
        for id in written {
            let old = previous
                .iter()
                .find(|(pid, _)| pid == id)
                .and_then(|(_, v)| v.clone());
            let result = match old {
                Some(vector) => {
                    with_deadline(self.index_timeout, self.index.upsert(*id, vector)).await
                }
                None => with_deadline(self.index_timeout, self.index.delete(*id))
                    .await
                    .map(|_| ()),
            };
            if let Err(e) = result {
                warn!(neighbor_id = %id, error = %e, "Failed to restore index entry");
            }
        }
    }
}

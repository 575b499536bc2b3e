//! Metadata enrichment for new notes.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use mnema_core::{with_deadline, Analysis, AnalysisService, Error, NoteMetadata, PartialMetadata};

/// Completed metadata plus the fields that could not be generated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub metadata: NoteMetadata,
    /// Fields left empty because analysis failed or returned nothing usable.
    pub degraded: Vec<String>,
}

/// Fills the metadata fields a caller left out.
///
/// Caller-supplied fields are never replaced. One analysis call covers every
/// missing field; none is made when the caller supplied everything.
pub struct EnrichmentCoordinator {
    analysis: Arc<dyn AnalysisService>,
    timeout: Duration,
}

impl EnrichmentCoordinator {
    pub fn new(analysis: Arc<dyn AnalysisService>, timeout: Duration) -> Self {
        Self { analysis, timeout }
    }

    #[instrument(skip(self, content, supplied), fields(subsystem = "engine", component = "enrichment", op = "enrich", missing = tracing::field::Empty))]
    pub async fn enrich(&self, content: &str, supplied: &PartialMetadata) -> Enrichment {
        let missing = supplied.missing_fields();
        tracing::Span::current().record("missing", missing.len());
        if missing.is_empty() {
            return Enrichment {
                metadata: complete(supplied, Analysis::default()),
                degraded: Vec::new(),
            };
        }

        let start = Instant::now();
        let analysis =
            match with_deadline(self.timeout, self.analysis.analyze(content, supplied)).await {
                Ok(analysis) => analysis,
                Err(e) => {
                    let err = Error::EnrichmentDegraded(e.to_string());
                    warn!(error = %err, fields = ?missing, "Analysis failed, leaving fields empty");
                    return Enrichment {
                        metadata: complete(supplied, Analysis::default()),
                        degraded: missing.iter().map(|f| f.to_string()).collect(),
                    };
                }
            };

        let degraded: Vec<String> = missing
            .iter()
            .filter(|field| match **field {
                "keywords" => analysis.keywords.is_none(),
                "context" => analysis.context.is_none(),
                _ => analysis.tags.is_none(),
            })
            .map(|f| f.to_string())
            .collect();
        if !degraded.is_empty() {
            let err = Error::EnrichmentDegraded(format!("no usable {}", degraded.join(", ")));
            warn!(error = %err, "Analysis output incomplete");
        }

        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            degraded = degraded.len(),
            "Enrichment complete"
        );
        Enrichment {
            metadata: complete(supplied, analysis),
            degraded,
        }
    }
}

/// Supplied fields win; generated ones fill the gaps.
fn complete(supplied: &PartialMetadata, generated: Analysis) -> NoteMetadata {
    let keywords = supplied
        .keywords
        .clone()
        .or(generated.keywords)
        .unwrap_or_default();
    let context = supplied
        .context
        .clone()
        .or(generated.context)
        .unwrap_or_default();
    let tags: BTreeSet<String> = match &supplied.tags {
        Some(tags) => tags.iter().cloned().collect(),
        None => generated
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    };
    NoteMetadata {
        keywords,
        context,
        tags,
    }
}

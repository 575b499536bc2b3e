//! Analysis service backed by an LLM generation backend.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use mnema_core::{
    Analysis, AnalysisService, Error, GenerationBackend, LinkDecision, MetadataDelta, Note,
    PartialMetadata, Result,
};

use crate::json::{non_empty_string, parse_json_lenient, string_array};
use crate::prompts::{analysis_prompt, joint_prompt, JSON_SYSTEM_PROMPT};

/// [`AnalysisService`] that prompts a generation backend for JSON.
///
/// Malformed analysis output degrades to empty fields. A malformed
/// evolution decision is an error, so the caller skips that candidate.
pub struct LlmAnalyzer {
    backend: Arc<dyn GenerationBackend>,
}

impl LlmAnalyzer {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}

/// Per-field extraction of an analysis response.
pub fn analysis_from_response(raw: &str) -> Analysis {
    let value: Value = match parse_json_lenient(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, response_len = raw.len(), "Analysis response was not JSON");
            return Analysis::default();
        }
    };
    Analysis {
        keywords: string_array(&value, "keywords"),
        context: non_empty_string(&value, "context"),
        tags: string_array(&value, "tags"),
    }
}

/// Decode an evolution decision response.
pub fn decision_from_response(raw: &str) -> Result<LinkDecision> {
    let value: Value = parse_json_lenient(raw)
        .map_err(|e| Error::Inference(format!("malformed evolution decision: {}", e)))?;

    let action = value
        .get("action")
        .and_then(Value::as_str)
        .map(|a| a.trim().to_lowercase().replace(['-', ' '], "_"));
    let delta = MetadataDelta {
        tags: string_array(&value, "tags_to_add").unwrap_or_default(),
        context: non_empty_string(&value, "context_addition"),
    };

    let decision = match action.as_deref() {
        Some("skip") => LinkDecision::Skip,
        Some("link_only") => LinkDecision::LinkOnly,
        Some("link_and_enrich") if delta.is_empty() => LinkDecision::LinkOnly,
        Some("link_and_enrich") => LinkDecision::LinkAndEnrich { delta },
        Some(other) => {
            return Err(Error::Inference(format!("unknown evolution action: {}", other)));
        }
        None => match value.get("should_link").and_then(Value::as_bool) {
            Some(false) => LinkDecision::Skip,
            Some(true) if delta.is_empty() => LinkDecision::LinkOnly,
            Some(true) => LinkDecision::LinkAndEnrich { delta },
            None => {
                return Err(Error::Inference(
                    "evolution decision has no action".to_string(),
                ))
            }
        },
    };
    Ok(decision)
}

#[async_trait]
impl AnalysisService for LlmAnalyzer {
    #[instrument(skip(self, content, hints), fields(subsystem = "inference", component = "analyzer", op = "analyze", model = %self.backend.model_name()))]
    async fn analyze(&self, content: &str, hints: &PartialMetadata) -> Result<Analysis> {
        let start = Instant::now();
        let prompt = analysis_prompt(content, hints);
        let raw = self
            .backend
            .generate_json_with_system(JSON_SYSTEM_PROMPT, &prompt)
            .await?;
        let analysis = analysis_from_response(&raw);
        debug!(
            response_len = raw.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            keywords = analysis.keywords.is_some(),
            context = analysis.context.is_some(),
            tags = analysis.tags.is_some(),
            "Analysis complete"
        );
        Ok(analysis)
    }

    #[instrument(skip(self, anchor, candidate), fields(subsystem = "inference", component = "analyzer", op = "joint_analyze", note_id = %anchor.id, neighbor_id = %candidate.id))]
    async fn joint_analyze(
        &self,
        anchor: &Note,
        candidate: &Note,
        similarity: f32,
    ) -> Result<LinkDecision> {
        let prompt = joint_prompt(anchor, candidate, similarity);
        let raw = self
            .backend
            .generate_json_with_system(JSON_SYSTEM_PROMPT, &prompt)
            .await?;
        let decision = decision_from_response(&raw)?;
        debug!(action = decision.as_str(), "Evolution decision");
        Ok(decision)
    }
}

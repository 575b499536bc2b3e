//! Replay scripted operations against a memory system.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use mnema_core::{Error, Result};
use mnema_engine::MemorySystem;

use crate::script::{Op, Step};

/// Result of one replayed step, printed as a JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub line: usize,
    pub op: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Executes steps in order, tracking note labels.
///
/// A failed step is reported and the replay continues.
pub struct Replayer {
    system: Arc<MemorySystem>,
    labels: HashMap<String, Uuid>,
}

impl Replayer {
    pub fn new(system: Arc<MemorySystem>) -> Self {
        Self {
            system,
            labels: HashMap::new(),
        }
    }

    pub fn system(&self) -> &Arc<MemorySystem> {
        &self.system
    }

    /// Resolve a label or a literal note id.
    pub fn resolve(&self, reference: &str) -> Result<Uuid> {
        if let Some(id) = self.labels.get(reference) {
            return Ok(*id);
        }
        Uuid::parse_str(reference)
            .map_err(|_| Error::InvalidInput(format!("unknown note reference '{}'", reference)))
    }

    pub async fn apply(&mut self, step: Step) -> Outcome {
        let op = step.op.name();
        match self.execute(step.op).await {
            Ok(result) => Outcome {
                line: step.line,
                op,
                ok: true,
                result: Some(result),
                error: None,
            },
            Err(e) => {
                warn!(line = step.line, op, error = %e, "Replay step failed");
                Outcome {
                    line: step.line,
                    op,
                    ok: false,
                    result: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn run(&mut self, steps: Vec<Step>) -> Vec<Outcome> {
        let total = steps.len();
        let mut outcomes = Vec::with_capacity(total);
        for step in steps {
            outcomes.push(self.apply(step).await);
        }
        let failed = outcomes.iter().filter(|o| !o.ok).count();
        info!(steps = total, failed, "Replay finished");
        outcomes
    }

    async fn execute(&mut self, op: Op) -> Result<Value> {
        match op {
            Op::Add { label, request } => {
                let response = self.system.add(request).await?;
                if let Some(label) = label {
                    self.labels.insert(label, response.note.id);
                }
                Ok(serde_json::to_value(response)?)
            }
            Op::Read { note } => {
                let id = self.resolve(&note)?;
                Ok(serde_json::to_value(self.system.read(id)?)?)
            }
            Op::Update { note, request } => {
                let id = self.resolve(&note)?;
                Ok(serde_json::to_value(self.system.update(id, request).await?)?)
            }
            Op::Delete { note } => {
                let id = self.resolve(&note)?;
                Ok(serde_json::to_value(self.system.delete(id).await?)?)
            }
            Op::Search(request) => Ok(serde_json::to_value(self.system.search(&request).await?)?),
            Op::Evolve { note } => {
                let id = self.resolve(&note)?;
                Ok(serde_json::to_value(self.system.evolve(id).await?)?)
            }
        }
    }
}

/// Link graph summary produced by `mnema check`.
#[derive(Debug, Clone, Serialize)]
pub struct GraphReport {
    pub notes: usize,
    pub links: usize,
    pub pending_evolution: Vec<Uuid>,
    pub violations: Vec<String>,
}

impl GraphReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

pub fn check_graph(system: &MemorySystem) -> GraphReport {
    let endpoints: usize = system
        .store()
        .snapshot()
        .iter()
        .map(|note| note.links.len())
        .sum();
    GraphReport {
        notes: system.len(),
        links: endpoints / 2,
        pending_evolution: system.pending_evolution(),
        violations: system
            .violations()
            .iter()
            .map(ToString::to_string)
            .collect(),
    }
}

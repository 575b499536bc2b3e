//! JSON-lines replay scripts.
//!
//! One operation per line, tagged by `op`. Blank lines and lines starting
//! with `#` are ignored. Notes are referenced by the `label` given when they
//! were added, or by their id.
//!
//! ```text
//! {"op": "add", "label": "a", "content": "Ownership moves values", "tags": ["rust"]}
//! {"op": "update", "note": "a", "context": "Borrowing"}
//! {"op": "search", "query": "ownership", "limit": 5}
//! {"op": "evolve", "note": "a"}
//! {"op": "delete", "note": "a"}
//! ```

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use mnema_core::{AddNoteRequest, SearchRequest, UpdateNoteRequest};

/// A single scripted operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Add {
        #[serde(default)]
        label: Option<String>,
        #[serde(flatten)]
        request: AddNoteRequest,
    },
    Read {
        note: String,
    },
    Update {
        note: String,
        #[serde(flatten)]
        request: UpdateNoteRequest,
    },
    Delete {
        note: String,
    },
    Search(SearchRequest),
    Evolve {
        note: String,
    },
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Add { .. } => "add",
            Op::Read { .. } => "read",
            Op::Update { .. } => "update",
            Op::Delete { .. } => "delete",
            Op::Search(_) => "search",
            Op::Evolve { .. } => "evolve",
        }
    }
}

/// An operation with its 1-based script line.
#[derive(Debug, Clone)]
pub struct Step {
    pub line: usize,
    pub op: Op,
}

/// Parse a script, failing on the first malformed line.
pub fn parse_script(text: &str) -> anyhow::Result<Vec<Step>> {
    let mut steps = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let op: Op = serde_json::from_str(line)
            .with_context(|| format!("line {}: invalid operation", idx + 1))?;
        steps.push(Step { line: idx + 1, op });
    }
    Ok(steps)
}

pub fn load_script(path: &Path) -> anyhow::Result<Vec<Step>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    parse_script(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnema_core::MemoryType;

    #[test]
    fn test_parse_skips_blank_and_comment_lines() {
        let text = r#"
# seed
{"op": "add", "label": "a", "content": "first"}

{"op": "read", "note": "a"}
"#;
        let steps = parse_script(text).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].line, 3);
        assert_eq!(steps[1].line, 5);
        assert_eq!(steps[1].op.name(), "read");
    }

    #[test]
    fn test_parse_add_flattens_request_fields() {
        let text = r#"{"op": "add", "label": "n", "content": "c", "tags": ["x"], "memory_type": "knowledge"}"#;
        let steps = parse_script(text).unwrap();
        match &steps[0].op {
            Op::Add { label, request } => {
                assert_eq!(label.as_deref(), Some("n"));
                assert_eq!(request.content, "c");
                assert_eq!(request.tags, Some(vec!["x".to_string()]));
                assert_eq!(request.memory_type, Some(MemoryType::Knowledge));
                assert!(request.context.is_none());
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_parse_search_uses_request_defaults() {
        let steps = parse_script(r#"{"op": "search", "query": "q"}"#).unwrap();
        match &steps[0].op {
            Op::Search(req) => {
                assert_eq!(req.query, "q");
                assert_eq!(req.limit, SearchRequest::new("q").limit);
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_parse_update_keeps_unset_fields_empty() {
        let steps = parse_script(r#"{"op": "update", "note": "a", "context": "new"}"#).unwrap();
        match &steps[0].op {
            Op::Update { note, request } => {
                assert_eq!(note, "a");
                assert_eq!(request.context.as_deref(), Some("new"));
                assert!(request.content.is_none());
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_names_line() {
        let text = "{\"op\": \"add\", \"content\": \"ok\"}\n{\"op\": \"explode\"}\n";
        let err = parse_script(text).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }
}

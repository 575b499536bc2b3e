//! Replaying scripts end to end over deterministic backends.

use std::sync::Arc;

use mnema_cli::{check_graph, parse_script, Replayer};
use mnema_core::MemoryConfig;
use mnema_engine::MemorySystem;
use mnema_index::InMemoryIndex;
use mnema_inference::mock::{MockAnalysisService, MockEmbeddingBackend};

fn system() -> Arc<MemorySystem> {
    let embeddings = MockEmbeddingBackend::new()
        .with_dimension(3)
        .with_fixed_vector("ownership", vec![1.0, 0.0, 0.0])
        .with_fixed_vector("borrowing", vec![0.95, 0.312_249_9, 0.0])
        .with_fixed_vector("sourdough", vec![0.0, 0.0, 1.0]);
    let index = Arc::new(InMemoryIndex::new(Arc::new(embeddings)));
    Arc::new(MemorySystem::new(
        index,
        Arc::new(MockAnalysisService::new()),
        MemoryConfig::default(),
    ))
}

const SCRIPT: &str = r#"
# two related notes and one unrelated
{"op": "add", "label": "own", "content": "Rust ownership moves values", "tags": ["rust"]}
{"op": "add", "label": "borrow", "content": "Rust borrowing lends references", "tags": ["rust"]}
{"op": "add", "label": "bread", "content": "Feed the sourdough starter daily"}
{"op": "search", "query": "ownership", "limit": 2, "tags": ["rust"]}
{"op": "update", "note": "bread", "context": "Kitchen"}
{"op": "evolve", "note": "own"}
{"op": "delete", "note": "borrow"}
{"op": "read", "note": "borrow"}
{"op": "read", "note": "nobody"}
"#;

#[tokio::test]
async fn test_replay_script_end_to_end() {
    let system = system();
    let mut replayer = Replayer::new(system.clone());
    let outcomes = replayer.run(parse_script(SCRIPT).unwrap()).await;

    let ops: Vec<&str> = outcomes.iter().map(|o| o.op).collect();
    assert_eq!(
        ops,
        ["add", "add", "add", "search", "update", "evolve", "delete", "read", "read"]
    );
    assert!(outcomes[..7].iter().all(|o| o.ok), "{:?}", outcomes);

    let borrow = &outcomes[1].result.as_ref().unwrap()["note"];
    assert_eq!(borrow["links"].as_array().unwrap().len(), 1);

    let search = outcomes[3].result.as_ref().unwrap();
    let hits = search["hits"].as_array().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["content"], "Rust ownership moves values");

    assert!(!outcomes[7].ok);
    assert!(outcomes[7].error.as_ref().unwrap().contains("not found"));
    assert!(!outcomes[8].ok);
    assert!(outcomes[8]
        .error
        .as_ref()
        .unwrap()
        .contains("unknown note reference 'nobody'"));

    assert_eq!(system.len(), 2);
    let report = check_graph(&system);
    assert!(report.is_consistent());
    assert_eq!(report.notes, 2);
    assert_eq!(report.links, 0);
}

#[tokio::test]
async fn test_labels_resolve_to_ids_and_literal_ids_work() {
    let system = system();
    let mut replayer = Replayer::new(system.clone());
    replayer
        .run(parse_script(r#"{"op": "add", "label": "a", "content": "ownership"}"#).unwrap())
        .await;

    let id = replayer.resolve("a").unwrap();
    assert_eq!(replayer.resolve(&id.to_string()).unwrap(), id);

    let script = format!(r#"{{"op": "read", "note": "{}"}}"#, id);
    let outcomes = replayer.run(parse_script(&script).unwrap()).await;
    assert!(outcomes[0].ok);
    assert_eq!(outcomes[0].result.as_ref().unwrap()["content"], "ownership");
}

#[tokio::test]
async fn test_invalid_request_is_reported_and_replay_continues() {
    let system = system();
    let mut replayer = Replayer::new(system.clone());
    let script = r#"
{"op": "add", "content": "   "}
{"op": "add", "content": "ownership survives"}
"#;
    let outcomes = replayer.run(parse_script(script).unwrap()).await;

    assert!(!outcomes[0].ok);
    assert!(outcomes[0].error.as_ref().unwrap().starts_with("Invalid input"));
    assert!(outcomes[1].ok);
    assert_eq!(system.len(), 1);
}

#[tokio::test]
async fn test_outcome_serializes_without_empty_fields() {
    let system = system();
    let mut replayer = Replayer::new(system);
    let outcomes = replayer
        .run(parse_script(r#"{"op": "evolve", "note": "missing"}"#).unwrap())
        .await;

    let json = serde_json::to_value(&outcomes[0]).unwrap();
    assert_eq!(json["line"], 1);
    assert_eq!(json["op"], "evolve");
    assert_eq!(json["ok"], false);
    assert!(json.get("result").is_none());
}

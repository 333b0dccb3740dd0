use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kb_core::config::Settings;
use kb_core::error::BackendError;
use kb_core::traits::{ActionRecord, ActionSink, RetrievalBackend};
use kb_core::types::{BackendId, ResultItem};
use kb_pipeline::{build_cascade, build_service, AnswerSynthesizer, BackendSlot, Cascade, KnowledgeService, QueryRequest};
use tempfile::TempDir;

fn write_corpus(dir: &Path) {
    fs::create_dir_all(dir.join("vedas")).unwrap();
    fs::write(
        dir.join("vedas/dharma.txt"),
        "Dharma is duty. It sustains the order of things.\n\nKarma is action and its fruit.",
    )
    .unwrap();
}

/// Settings with every vector backend pointed at a dead Qdrant and the
/// lexical corpus in `tmp`.
fn offline_settings(tmp: &TempDir) -> Settings {
    let corpus = tmp.path().join("kb");
    write_corpus(&corpus);
    let mut settings = Settings::default();
    settings.qdrant.url = kb_testkit::dead_url();
    settings.lexical.corpus_dir = corpus;
    settings.telemetry.log_path = tmp.path().join("logs/learning_log.jsonl");
    settings
}

fn read_records(path: &Path) -> Vec<serde_json::Value> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect()
}

#[test]
fn bootstrap_marks_unreachable_vector_backends_unavailable() {
    let tmp = TempDir::new().unwrap();
    let cascade = build_cascade(&offline_settings(&tmp)).expect("bootstrap never fails on dead backends");

    let ids: Vec<_> = cascade.slots().iter().map(|s| s.id()).collect();
    assert_eq!(ids, BackendId::ALL.to_vec());
    assert_eq!(cascade.available_count(), 1);
    assert!(cascade.slots()[3].is_available());
    assert!(cascade.slots()[0].unavailable_reason().is_some());
}

#[test]
fn disabled_backends_are_left_out() {
    let tmp = TempDir::new().unwrap();
    let mut settings = offline_settings(&tmp);
    settings.multi_collection.enabled = false;
    settings.vector_b.enabled = false;

    let cascade = build_cascade(&settings).unwrap();
    let ids: Vec<_> = cascade.slots().iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec![BackendId::VectorA, BackendId::Lexical]);
}

#[test]
fn lexical_backend_answers_when_vectors_are_down() {
    let tmp = TempDir::new().unwrap();
    let settings = offline_settings(&tmp);
    let service = build_service(&settings).unwrap();

    let envelope = service.query(QueryRequest::new("what is dharma"));

    assert_eq!(envelope.status_code(), 200);
    assert!(envelope.result_count() >= 1);
    assert_eq!(envelope.retriever(), "lexical");
    assert!(!envelope.sources().is_empty());
    assert!(envelope.sources()[0].ends_with("dharma.txt"));
    assert_eq!(envelope.passages().len(), envelope.result_count());
    assert!(envelope.answer().contains("Dharma is duty."));
    assert_eq!(envelope.metadata()["tags"], serde_json::json!(["keyword_search", "lexical"]));
    assert_eq!(envelope.metadata()["answer_method"], "extractive");
    assert_eq!(envelope.metadata()["fallback_mode"], false);
    assert_eq!(envelope.metadata()["backend_errors"], true);
    let attempts = envelope.metadata()["attempts"].as_array().expect("attempts");
    assert_eq!(attempts.len(), 4);
    assert_eq!(attempts[0]["error_detail"], "unavailable");
    assert_eq!(attempts[3]["outcome"], "success");

    let records = read_records(&settings.telemetry.log_path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["task_id"], envelope.query_id());
    assert_eq!(records[0]["agent"], "knowledge");
    assert_eq!(records[0]["action"], "query");
    assert_eq!(records[0]["metadata"]["query"], "what is dharma");
}

#[test]
fn exhausted_cascade_still_returns_an_answer() {
    let tmp = TempDir::new().unwrap();
    let settings = offline_settings(&tmp);
    let service = build_service(&settings).unwrap();

    let envelope = service.query(QueryRequest::new("xylophone quasar"));

    assert_eq!(envelope.status_code(), 404);
    assert_eq!(envelope.result_count(), 0);
    assert!(envelope.sources().is_empty());
    assert_eq!(envelope.retriever(), "none");
    assert!(envelope.answer().contains("xylophone quasar"));
    assert_eq!(envelope.metadata()["fallback_mode"], true);
    assert_eq!(envelope.metadata()["no_results"], true);
    assert_eq!(envelope.metadata()["tags"], serde_json::json!(["no_results", "fallback"]));
    assert!(envelope.metadata().get("error").is_none(), "lexical backend did run");
    assert!(!settings.telemetry.log_path.exists(), "no telemetry without a winner");
}

#[test]
fn no_available_backend_is_reported() {
    let tmp = TempDir::new().unwrap();
    let mut settings = offline_settings(&tmp);
    settings.lexical.corpus_dir = tmp.path().join("missing");
    let service = build_service(&settings).unwrap();

    let envelope = service.query(QueryRequest::new("what is dharma"));

    assert_eq!(envelope.status_code(), 404);
    assert!(!envelope.answer().is_empty());
    assert_eq!(envelope.metadata()["error"], "no retrieval backend available");
}

#[test]
fn task_id_becomes_query_id() {
    let tmp = TempDir::new().unwrap();
    let service = build_service(&offline_settings(&tmp)).unwrap();

    let envelope = service.query(QueryRequest::new("karma").with_task_id("abc"));
    assert_eq!(envelope.query_id(), "abc");
    assert_eq!(envelope.query_text(), "karma");

    let ids: HashSet<String> = (0..5).map(|_| service.query(QueryRequest::new("karma")).query_id().to_string()).collect();
    assert_eq!(ids.len(), 5, "generated ids are unique");
}

#[test]
fn filters_travel_to_metadata_and_telemetry() {
    let tmp = TempDir::new().unwrap();
    let settings = offline_settings(&tmp);
    let service = build_service(&settings).unwrap();

    let envelope = service.query(QueryRequest::new("dharma").with_filter("category", "vedas").with_top_k(1));

    assert_eq!(envelope.result_count(), 1);
    assert_eq!(envelope.metadata()["filters"]["category"], "vedas");
    let records = read_records(&settings.telemetry.log_path);
    assert_eq!(records[0]["metadata"]["filters"]["category"], "vedas");
}

#[test]
fn envelope_serializes_all_fields() {
    let tmp = TempDir::new().unwrap();
    let service = build_service(&offline_settings(&tmp)).unwrap();

    let json = service.query(QueryRequest::new("dharma").with_task_id("t-1")).to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    for key in ["query_id", "query_text", "answer", "sources", "passages", "result_count", "status_code", "timestamp", "metadata"] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["query_id"], "t-1");
}

struct BrokenSink;

impl ActionSink for BrokenSink {
    fn record(&self, _record: &ActionRecord) -> anyhow::Result<()> { anyhow::bail!("disk full") }
}

#[test]
fn telemetry_failure_does_not_affect_the_response() {
    let tmp = TempDir::new().unwrap();
    let mut settings = offline_settings(&tmp);
    settings.telemetry.enabled = false;
    let service = build_service(&settings).unwrap().with_sink(Box::new(BrokenSink));

    let envelope = service.query(QueryRequest::new("what is dharma"));
    assert_eq!(envelope.status_code(), 200);
}

#[test]
fn vector_backend_wins_when_reachable() {
    let stub = kb_testkit::serve(|req| match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/collections/vedabase") => (200, r#"{"result":{"status":"green"},"status":"ok"}"#.to_string()),
        ("POST", "/collections/vedabase/points/search") => (
            200,
            r#"{"result":[{"id":3,"score":0.9,"payload":{"content":"Dharma is the eternal duty.","document_id":"bg-2-31"}}]}"#.to_string(),
        ),
        _ => (404, r#"{"status":{"error":"Not found"}}"#.to_string()),
    });
    let tmp = TempDir::new().unwrap();
    let mut settings = offline_settings(&tmp);
    settings.qdrant.url = stub.url.clone();

    let service = build_service(&settings).unwrap();
    let envelope = service.query(QueryRequest::new("what is dharma"));

    assert_eq!(envelope.status_code(), 200);
    assert_eq!(envelope.retriever(), "vector_a");
    assert_eq!(envelope.sources(), ["vedabase:bg-2-31".to_string()]);
    assert_eq!(envelope.metadata()["tags"], serde_json::json!(["semantic_search", "vector_a"]));
    assert_eq!(envelope.answer(), "Dharma is the eternal duty.");
}

#[test]
fn oversized_top_k_is_capped() {
    let tmp = TempDir::new().unwrap();
    let mut settings = offline_settings(&tmp);
    settings.retrieval.max_top_k = 1;
    settings.retrieval.default_top_k = 1;
    let service = build_service(&settings).unwrap();

    let envelope = service.query(QueryRequest::new("what is dharma karma").with_top_k(1usize << 40));

    assert_eq!(envelope.status_code(), 200);
    assert_eq!(envelope.result_count(), 1);
}

#[test]
fn oversized_top_k_still_answers_with_default_cap() {
    let tmp = TempDir::new().unwrap();
    let service = build_service(&offline_settings(&tmp)).unwrap();

    let envelope = service.query(QueryRequest::new("what is dharma").with_top_k(1usize << 40));

    assert_eq!(envelope.status_code(), 200);
    assert!(envelope.result_count() >= 1);
}

struct BlankPassages;

impl RetrievalBackend for BlankPassages {
    fn id(&self) -> BackendId { BackendId::VectorA }

    fn search(&self, _query: &str, _limit: usize) -> Result<Vec<ResultItem>, BackendError> {
        Ok(vec![ResultItem::new(BackendId::VectorA, "vedabase:1", ""), ResultItem::new(BackendId::VectorA, "vedabase:2", "")])
    }
}

#[test]
fn blank_passages_win_and_get_a_template_answer() {
    let cascade = Cascade::new(vec![BackendSlot::ready(Arc::new(BlankPassages), Duration::from_secs(1))]);
    let service = KnowledgeService::new(cascade, AnswerSynthesizer::default());

    let envelope = service.query(QueryRequest::new("what is dharma"));

    assert_eq!(envelope.status_code(), 200);
    assert_eq!(envelope.result_count(), 2);
    assert_eq!(envelope.retriever(), "vector_a");
    assert!(!envelope.answer().is_empty());
    assert_eq!(envelope.metadata()["answer_method"], "template");
}

#[test]
fn reinitialized_backend_serves_later_queries() {
    let tmp = TempDir::new().unwrap();
    let mut settings = offline_settings(&tmp);
    settings.lexical.enabled = false;
    let mut service = build_service(&settings).unwrap();
    assert_eq!(service.query(QueryRequest::new("what is dharma")).status_code(), 404);

    service.cascade_mut().reinitialize(Arc::new(BlankPassages), Duration::from_secs(1));

    let envelope = service.query(QueryRequest::new("what is dharma"));
    assert_eq!(envelope.status_code(), 200);
    assert_eq!(envelope.retriever(), "vector_a");
    assert_eq!(service.cascade().slots()[1].id(), BackendId::VectorA, "slot keeps its position");
}

//! The response record returned for every query.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::cascade::CascadeOutcome;
use crate::synthesize::Answer;

pub const STATUS_OK: u16 = 200;
pub const STATUS_NOT_FOUND: u16 = 404;

/// Immutable once built; read through the accessors or serialize it.
#[derive(Debug, Clone, Serialize)]
pub struct QueryEnvelope {
    query_id: String,
    query_text: String,
    answer: String,
    sources: Vec<String>,
    passages: Vec<String>,
    result_count: usize,
    status_code: u16,
    timestamp: String,
    metadata: Map<String, Value>,
}

impl QueryEnvelope {
    pub fn query_id(&self) -> &str { &self.query_id }
    pub fn query_text(&self) -> &str { &self.query_text }
    pub fn answer(&self) -> &str { &self.answer }
    pub fn sources(&self) -> &[String] { &self.sources }
    pub fn passages(&self) -> &[String] { &self.passages }
    pub fn result_count(&self) -> usize { self.result_count }
    pub fn status_code(&self) -> u16 { self.status_code }
    pub fn timestamp(&self) -> &str { &self.timestamp }
    pub fn metadata(&self) -> &Map<String, Value> { &self.metadata }

    /// Tag of the retrieval path that produced the passages, or "none".
    pub fn retriever(&self) -> &str { self.metadata.get("retriever").and_then(Value::as_str).unwrap_or("none") }

    pub fn to_json(&self) -> serde_json::Result<String> { serde_json::to_string_pretty(self) }
}

/// Collects per-request identity, then stamps the envelope in `build`.
pub struct EnvelopeBuilder {
    query_id: String,
    query_text: String,
    filters: BTreeMap<String, String>,
}

impl EnvelopeBuilder {
    /// Uses `task_id` as the query id when given, otherwise generates one.
    pub fn new(query_text: impl Into<String>, task_id: Option<&str>) -> Self {
        let query_id = match task_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        Self { query_id, query_text: query_text.into(), filters: BTreeMap::new() }
    }

    #[must_use]
    pub fn filters(mut self, filters: BTreeMap<String, String>) -> Self {
        self.filters = filters;
        self
    }

    pub fn query_id(&self) -> &str { &self.query_id }

    /// 200 when a backend won the cascade, 404 when it was exhausted.
    pub fn build(self, outcome: &CascadeOutcome, answer: Answer) -> QueryEnvelope {
        let status_code = if outcome.is_exhausted() { STATUS_NOT_FOUND } else { STATUS_OK };
        let metadata = self.metadata(outcome, &answer);
        QueryEnvelope {
            query_id: self.query_id,
            query_text: self.query_text,
            answer: answer.text,
            sources: outcome.sources(),
            passages: outcome.items.iter().map(|i| i.content.clone()).collect(),
            result_count: outcome.items.len(),
            status_code,
            timestamp: chrono::Utc::now().to_rfc3339(),
            metadata,
        }
    }

    fn metadata(&self, outcome: &CascadeOutcome, answer: &Answer) -> Map<String, Value> {
        let mut metadata = Map::new();
        let tags: Vec<&str> = match outcome.winning_backend {
            Some(id) if id.is_semantic() => vec!["semantic_search", id.as_str()],
            Some(id) => vec!["keyword_search", id.as_str()],
            None => vec!["no_results", "fallback"],
        };
        let retriever = outcome.winning_backend.map_or("none", |id| id.as_str());
        metadata.insert("retriever".into(), json!(retriever));
        metadata.insert("tags".into(), json!(tags));
        metadata.insert("total_results".into(), json!(outcome.items.len()));
        metadata.insert("answer_method".into(), json!(answer.method.as_str()));
        metadata.insert("fallback_mode".into(), json!(outcome.is_exhausted()));
        metadata.insert("no_results".into(), json!(outcome.items.is_empty()));
        metadata.insert("backend_errors".into(), json!(outcome.had_errors()));
        metadata.insert(
            "attempts".into(),
            serde_json::to_value(&outcome.backend_attempts).unwrap_or(Value::Null),
        );
        if !self.filters.is_empty() {
            metadata.insert("filters".into(), json!(self.filters));
        }
        if outcome.is_exhausted() && !outcome.any_backend_ran() {
            metadata.insert("error".into(), json!("no retrieval backend available"));
        }
        metadata
    }
}

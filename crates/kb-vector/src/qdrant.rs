//! Minimal blocking client for the Qdrant REST API: collection probing and
//! point search. One `reqwest` client per instance, reused across queries.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use kb_core::error::BackendFailure;

#[derive(Debug, Error)]
pub enum QdrantError {
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<QdrantError> for BackendFailure {
    fn from(e: QdrantError) -> Self {
        match e {
            QdrantError::Timeout(after) => Self::Timeout(after),
            QdrantError::Transport(msg) => Self::Transport(msg),
            QdrantError::Status { status, body } => Self::Status { status, body },
            QdrantError::Malformed(msg) => Self::Malformed(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Uuid(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
}

impl ScoredPoint {
    /// Non-empty text stored under `field`, falling back to `text`.
    pub fn text(&self, field: &str) -> Option<&str> {
        let payload = self.payload.as_ref()?;
        [field, "text"]
            .iter()
            .filter_map(|key| payload.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    /// The originating document id: payload `document_id` when present,
    /// otherwise the point id.
    pub fn document_id(&self) -> String {
        match self.payload.as_ref().and_then(|p| p.get("document_id")) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => self.id.to_string(),
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

pub struct QdrantClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl QdrantClient {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("building Qdrant HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str { &self.base_url }

    /// Succeeds when the collection exists and the server answers.
    pub fn probe_collection(&self, collection: &str) -> Result<(), QdrantError> {
        let url = format!("{}/collections/{}", self.base_url, collection);
        let response = self.with_key(self.http.get(&url)).send().map_err(|e| self.classify(&e))?;
        Self::check_status(response).map(drop)
    }

    pub fn search(&self, collection: &str, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>, QdrantError> {
        let url = format!("{}/collections/{}/points/search", self.base_url, collection);
        tracing::debug!(%url, limit, "qdrant search");
        let body = SearchRequest { vector, limit, with_payload: true };
        let response = self.with_key(self.http.post(&url).json(&body)).send().map_err(|e| self.classify(&e))?;
        let response = Self::check_status(response)?;
        let parsed: SearchResponse = response.json().map_err(|e| {
            if e.is_timeout() { QdrantError::Timeout(self.timeout) } else { QdrantError::Malformed(e.to_string()) }
        })?;
        Ok(parsed.result)
    }

    fn with_key(&self, builder: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    fn classify(&self, e: &reqwest::Error) -> QdrantError {
        if e.is_timeout() { QdrantError::Timeout(self.timeout) } else { QdrantError::Transport(e.to_string()) }
    }

    fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, QdrantError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(QdrantError::Status { status: status.as_u16(), body })
    }
}

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::BackendError;
use crate::types::{BackendId, ResultItem};

/// Produces query vectors for the vector backends.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_text(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// One content store plus its query adapter.
///
/// `search` must return `Ok(vec![])` for "no results" and a `BackendError`
/// for connectivity, timeout or malformed-response conditions. Calls are
/// read-only against the store and safe to repeat.
pub trait RetrievalBackend: Send + Sync {
    fn id(&self) -> BackendId;
    fn search(&self, query: &str, limit: usize) -> Result<Vec<ResultItem>, BackendError>;
}

/// A record written to the reward/telemetry log after a successful query.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    pub task_id: String,
    pub agent: String,
    pub action: String,
    pub metadata: ActionMetadata,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionMetadata {
    pub query: String,
    pub filters: BTreeMap<String, String>,
}

/// Write-only sink for action records; the core never reads it back.
pub trait ActionSink: Send + Sync {
    fn record(&self, record: &ActionRecord) -> anyhow::Result<()>;
}

use std::cmp::Ordering;
use std::sync::Arc;

use kb_core::config::NamedCollection;
use kb_core::error::BackendError;
use kb_core::traits::{Embedder, RetrievalBackend};
use kb_core::types::{BackendId, ResultItem};

use crate::collection::{embed_query, points_to_items};
use crate::qdrant::QdrantClient;

/// Queries several named collections with the same query vector and merges
/// their top-k lists by score. Provenance is
/// `<collection_name>:<backend_collection_id>:<document_id>`.
///
/// The merge is deterministic: ties on score keep configuration order, then
/// each collection's own order. A collection that fails is skipped; the
/// backend fails only when every collection failed.
pub struct MultiCollectionBackend {
    client: QdrantClient,
    collections: Vec<NamedCollection>,
    content_field: String,
    embedder: Arc<dyn Embedder>,
}

impl MultiCollectionBackend {
    pub fn new(client: QdrantClient, collections: Vec<NamedCollection>, content_field: &str, embedder: Arc<dyn Embedder>) -> Self {
        Self { client, collections, content_field: content_field.to_string(), embedder }
    }

    /// Probe every collection and keep the reachable ones. Unavailable when
    /// none can be reached.
    pub fn connect(client: QdrantClient, collections: Vec<NamedCollection>, content_field: &str, embedder: Arc<dyn Embedder>) -> Result<Self, BackendError> {
        let id = BackendId::MultiCollection;
        let mut reachable = Vec::with_capacity(collections.len());
        let mut last_error = None;
        for c in collections {
            match client.probe_collection(&c.collection) {
                Ok(()) => reachable.push(c),
                Err(e) => {
                    tracing::warn!(backend = %id, collection = %c.collection, error = %e, "collection unreachable, skipping");
                    last_error = Some(format!("collection '{}': {e}", c.collection));
                }
            }
        }
        if reachable.is_empty() {
            return Err(BackendError::unavailable(id, last_error.unwrap_or_else(|| "no collections configured".to_string())));
        }
        tracing::info!(backend = %id, collections = reachable.len(), "vector backend ready");
        Ok(Self::new(client, reachable, content_field, embedder))
    }

    pub fn collections(&self) -> &[NamedCollection] { &self.collections }
}

impl RetrievalBackend for MultiCollectionBackend {
    fn id(&self) -> BackendId { BackendId::MultiCollection }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<ResultItem>, BackendError> {
        let id = self.id();
        let vector = embed_query(self.embedder.as_ref(), id, query)?;
        let mut ranked: Vec<(usize, usize, ResultItem)> = Vec::new();
        let mut first_error = None;
        let mut failures = 0usize;
        for (c_idx, c) in self.collections.iter().enumerate() {
            match self.client.search(&c.collection, &vector, limit) {
                Ok(points) => {
                    let items = points_to_items(id, &points, &self.content_field, |doc_id| {
                        format!("{}:{}:{doc_id}", c.name, c.collection)
                    });
                    ranked.extend(items.into_iter().enumerate().map(|(pos, item)| (c_idx, pos, item)));
                }
                Err(e) => {
                    tracing::warn!(backend = %id, collection = %c.collection, error = %e, "collection search failed");
                    failures += 1;
                    first_error.get_or_insert(e);
                }
            }
        }
        if failures == self.collections.len() {
            if let Some(e) = first_error {
                return Err(BackendError::new(id, e.into()));
            }
        }
        ranked.sort_by(|a, b| {
            let sa = a.2.score.unwrap_or(f32::MIN);
            let sb = b.2.score.unwrap_or(f32::MIN);
            sb.partial_cmp(&sa).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1))
        });
        Ok(ranked.into_iter().take(limit).map(|(_, _, item)| item).collect())
    }
}

use std::sync::Arc;

use kb_core::error::{BackendError, BackendFailure};
use kb_core::traits::{Embedder, RetrievalBackend};
use kb_core::types::{BackendId, ResultItem};

use crate::qdrant::{QdrantClient, ScoredPoint};

/// Searches exactly one Qdrant collection. Provenance is
/// `<collection>:<document_id>`.
pub struct CollectionBackend {
    id: BackendId,
    client: QdrantClient,
    collection: String,
    content_field: String,
    embedder: Arc<dyn Embedder>,
}

impl CollectionBackend {
    pub fn new(id: BackendId, client: QdrantClient, collection: &str, content_field: &str, embedder: Arc<dyn Embedder>) -> Self {
        Self { id, client, collection: collection.to_string(), content_field: content_field.to_string(), embedder }
    }

    /// Like `new`, but probes the collection first; any probe failure makes
    /// the backend unavailable.
    pub fn connect(id: BackendId, client: QdrantClient, collection: &str, content_field: &str, embedder: Arc<dyn Embedder>) -> Result<Self, BackendError> {
        client
            .probe_collection(collection)
            .map_err(|e| BackendError::unavailable(id, format!("collection '{collection}' at {}: {e}", client.base_url())))?;
        tracing::info!(backend = %id, collection, "vector backend ready");
        Ok(Self::new(id, client, collection, content_field, embedder))
    }

    pub fn collection(&self) -> &str { &self.collection }
}

impl RetrievalBackend for CollectionBackend {
    fn id(&self) -> BackendId { self.id }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<ResultItem>, BackendError> {
        let vector = embed_query(self.embedder.as_ref(), self.id, query)?;
        let points = self
            .client
            .search(&self.collection, &vector, limit)
            .map_err(|e| BackendError::new(self.id, e.into()))?;
        let mut items = points_to_items(self.id, &points, &self.content_field, |doc_id| format!("{}:{doc_id}", self.collection));
        items.truncate(limit);
        Ok(items)
    }
}

pub(crate) fn embed_query(embedder: &dyn Embedder, id: BackendId, query: &str) -> Result<Vec<f32>, BackendError> {
    embedder
        .embed_text(query)
        .map_err(|e| BackendError::new(id, BackendFailure::Embedding(e.to_string())))
}

/// Points without text in their payload are dropped.
pub(crate) fn points_to_items<F>(id: BackendId, points: &[ScoredPoint], content_field: &str, source: F) -> Vec<ResultItem>
where
    F: Fn(&str) -> String,
{
    points
        .iter()
        .filter_map(|p| {
            let Some(text) = p.text(content_field) else {
                tracing::debug!(backend = %id, point = %p.id, "dropping point without text payload");
                return None;
            };
            Some(ResultItem::new(id, source(&p.document_id()), text).with_score(p.score))
        })
        .collect()
}

use std::path::Path;

use kb_core::data_processor::DataProcessor;
use kb_core::error::{BackendError, BackendFailure};
use kb_core::traits::RetrievalBackend;
use kb_core::types::{BackendId, DocumentChunk, ResultItem};

use crate::index::LexicalIndex;

/// Keyword search over a static text corpus. Falls back to a plain
/// substring scan when the keyword query matches nothing, so phrases made
/// of stop words or word fragments still find their passage.
pub struct LexicalBackend {
    index: LexicalIndex,
}

impl LexicalBackend {
    /// Load and index every matching file under `corpus_dir`. A missing
    /// directory or a failed index build makes the backend unavailable.
    pub fn open(corpus_dir: &Path, extensions: &[String]) -> Result<Self, BackendError> {
        if !corpus_dir.is_dir() {
            return Err(BackendError::unavailable(
                BackendId::Lexical,
                format!("corpus directory {} not found", corpus_dir.display()),
            ));
        }
        let chunks = DataProcessor::new()
            .with_extensions(extensions.iter().cloned())
            .process_directory(corpus_dir)
            .map_err(|e| BackendError::unavailable(BackendId::Lexical, e.to_string()))?;
        let backend = Self::from_chunks(chunks).map_err(|e| BackendError::unavailable(BackendId::Lexical, e.to_string()))?;
        tracing::info!(dir = %corpus_dir.display(), chunks = backend.chunk_count(), "lexical backend ready");
        Ok(backend)
    }

    pub fn from_chunks(chunks: Vec<DocumentChunk>) -> anyhow::Result<Self> { Ok(Self { index: LexicalIndex::build(chunks)? }) }

    pub fn chunk_count(&self) -> usize { self.index.chunks().len() }

    fn item(&self, ord: usize, score: Option<f32>) -> Option<ResultItem> {
        let chunk = self.index.chunk(ord)?;
        let item = ResultItem::new(BackendId::Lexical, chunk.doc_path.clone(), chunk.content.clone());
        Some(match score {
            Some(s) => item.with_score(s),
            None => item,
        })
    }
}

impl RetrievalBackend for LexicalBackend {
    fn id(&self) -> BackendId { BackendId::Lexical }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<ResultItem>, BackendError> {
        let hits = self
            .index
            .search(query, limit)
            .map_err(|e| BackendError::new(BackendId::Lexical, BackendFailure::Index(e.to_string())))?;
        if !hits.is_empty() {
            return Ok(hits.into_iter().filter_map(|h| self.item(h.ord, Some(h.score))).collect());
        }
        let ords = self.index.substring_search(query, limit);
        if !ords.is_empty() {
            tracing::debug!(matches = ords.len(), "keyword search empty, substring scan matched");
        }
        Ok(ords.into_iter().filter_map(|ord| self.item(ord, None)).collect())
    }
}

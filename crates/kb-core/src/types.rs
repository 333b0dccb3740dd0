//! Domain types shared by every retrieval backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ChunkId = String;

/// A chunk of a source document that is independently searchable.
///
/// - `id`: chunk identifier, `<doc_id>:<chunk_index>`
/// - `doc_id`: stable document identity (file stem)
/// - `doc_path`: path of the source file relative to the corpus root
/// - `content`: the text payload of the chunk
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub doc_path: String,
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// Identifies which backend produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BackendId {
    MultiCollection,
    VectorA,
    VectorB,
    Lexical,
}

impl BackendId {
    pub const ALL: [Self; 4] = [Self::MultiCollection, Self::VectorA, Self::VectorB, Self::Lexical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MultiCollection => "multi_collection",
            Self::VectorA => "vector_a",
            Self::VectorB => "vector_b",
            Self::Lexical => "lexical",
        }
    }

    /// True for backends that rank by embedding similarity.
    pub fn is_semantic(self) -> bool { !matches!(self, Self::Lexical) }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for BackendId {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| crate::error::Error::InvalidConfig(format!("unknown backend '{s}'")))
    }
}

/// One retrieved passage, normalized across backends.
///
/// `score` is backend-specific and never compared across backends. `source`
/// is a colon-separated provenance tag meant for humans, not for parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub content: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    pub backend_id: BackendId,
}

impl ResultItem {
    pub fn new(backend_id: BackendId, source: impl Into<String>, content: impl Into<String>) -> Self {
        Self { content: content.into(), source: source.into(), score: None, backend_id }
    }

    #[must_use]
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

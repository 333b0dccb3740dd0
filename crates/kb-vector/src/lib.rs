//! kb-vector
//!
//! Vector retrieval backends over a Qdrant REST endpoint: a single-collection
//! backend (used for both vector slots) and a multi-collection backend that
//! merges per-collection top-k lists.

pub mod collection;
pub mod multi;
pub mod qdrant;

pub use collection::CollectionBackend;
pub use multi::MultiCollectionBackend;
pub use qdrant::{QdrantClient, QdrantError, ScoredPoint};

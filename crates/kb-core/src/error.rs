use std::time::Duration;
use thiserror::Error;

use crate::types::BackendId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single backend call did not produce results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendFailure {
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("query embedding failed: {0}")]
    Embedding(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("backend worker terminated: {0}")]
    Worker(String),
}

/// A failed query against one backend. Recovered by the cascade, never
/// surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{backend}: {cause}")]
pub struct BackendError {
    pub backend: BackendId,
    pub cause: BackendFailure,
}

impl BackendError {
    pub fn new(backend: BackendId, cause: BackendFailure) -> Self { Self { backend, cause } }

    pub fn unavailable(backend: BackendId, reason: impl Into<String>) -> Self {
        Self::new(backend, BackendFailure::Unavailable(reason.into()))
    }

    pub fn timeout(backend: BackendId, after: Duration) -> Self { Self::new(backend, BackendFailure::Timeout(after)) }

    pub fn is_timeout(&self) -> bool { matches!(self.cause, BackendFailure::Timeout(_)) }
}

/// External answer generation failed; the synthesizer falls back locally.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(String),

    #[error("generation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("generation service returned HTTP {0}")]
    Status(u16),

    #[error("generation response had no usable text")]
    NoText,

    #[error("generation response was not valid JSON: {0}")]
    Malformed(String),
}

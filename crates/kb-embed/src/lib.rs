//! kb-embed
//!
//! Query-vector providers for the vector backends. `HashEmbedder` is
//! deterministic and offline; `OllamaEmbedder` calls an Ollama-compatible
//! `/api/embeddings` endpoint.

use anyhow::Result;
use std::time::Duration;

use kb_core::config::{EmbeddingProvider, EmbeddingSettings};
use kb_core::traits::Embedder;

pub mod hashing;
pub mod remote;

pub use hashing::HashEmbedder;
pub use remote::OllamaEmbedder;

/// Build the configured embedder. `APP_USE_FAKE_EMBEDDINGS=1` forces the
/// hash embedder regardless of configuration.
pub fn embedder_from_settings(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if use_fake || settings.provider == EmbeddingProvider::Hash {
        tracing::info!(dim = settings.dim, "using hash embedder");
        return Ok(Box::new(HashEmbedder::new(settings.dim)));
    }
    tracing::info!(url = %settings.url, model = %settings.model, "using remote embedder");
    Ok(Box::new(OllamaEmbedder::new(
        &settings.url,
        &settings.model,
        settings.dim,
        Duration::from_millis(settings.timeout_ms),
    )?))
}

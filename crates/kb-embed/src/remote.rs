use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use kb_core::traits::Embedder;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embeds text through an Ollama-compatible `/api/embeddings` endpoint.
/// The HTTP client is built once and reused across queries.
pub struct OllamaEmbedder {
    http: reqwest::blocking::Client,
    url: String,
    model: String,
    dim: usize,
}

impl OllamaEmbedder {
    pub fn new(url: &str, model: &str, dim: usize, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("building embedding HTTP client")?;
        Ok(Self { http, url: url.to_string(), model: model.to_string(), dim })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .http
            .post(&self.url)
            .json(&EmbeddingRequest { model: &self.model, prompt: text })
            .send()
            .with_context(|| format!("POST {}", self.url))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("embedding service returned HTTP {}", status.as_u16()));
        }
        let body: EmbeddingResponse = response.json().context("decoding embedding response")?;
        if body.embedding.len() != self.dim {
            return Err(anyhow!("expected {}-dim embedding, got {}", self.dim, body.embedding.len()));
        }
        Ok(body.embedding)
    }
}

impl Embedder for OllamaEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}

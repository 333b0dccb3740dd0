use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use kb_core::error::GenerationError;

use super::TextGenerator;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
}

/// Calls an Ollama-style `/api/generate` endpoint (non-streaming).
pub struct OllamaGenerator {
    http: reqwest::blocking::Client,
    url: String,
    model: String,
    timeout: Duration,
}

impl OllamaGenerator {
    pub fn new(url: &str, model: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("building generation HTTP client: {}", e))?;
        Ok(Self { http, url: url.to_string(), model: model.to_string(), timeout })
    }
}

impl TextGenerator for OllamaGenerator {
    fn generate(&self, query: &str, context: &str) -> Result<String, GenerationError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: build_prompt(query, context),
            stream: false,
            options: GenerateOptions { temperature: 0.7, top_p: 0.9 },
        };
        let response = self.http.post(&self.url).json(&body).send().map_err(|e| {
            if e.is_timeout() { GenerationError::Timeout(self.timeout) } else { GenerationError::Transport(e.to_string()) }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Status(status.as_u16()));
        }
        let value: Value = response.json().map_err(|e| {
            if e.is_timeout() { GenerationError::Timeout(self.timeout) } else { GenerationError::Malformed(e.to_string()) }
        })?;
        extract_text(&value).ok_or(GenerationError::NoText)
    }
}

/// Prompt asking for an answer grounded in `context` when it is relevant,
/// and a general answer otherwise.
pub fn build_prompt(query: &str, context: &str) -> String {
    let context = if context.trim().is_empty() { "(no context found)" } else { context.trim() };
    format!(
        "You are a knowledge assistant. Answer the question using the context below when it is relevant. \
         If the context is empty or unrelated to the question, answer from general knowledge instead.\n\n\
         Context:\n{context}\n\nQuestion: {query}\nAnswer:"
    )
}

/// Non-empty trimmed text from `response`, or from `message.content`.
pub fn extract_text(value: &Value) -> Option<String> {
    [value.get("response"), value.get("message").and_then(|m| m.get("content"))]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(ToString::to_string)
}

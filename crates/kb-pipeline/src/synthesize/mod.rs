//! Turns the winning passages into one answer string.
//!
//! Tried in order: the external generator (when configured), local
//! extractive summarization, and finally a fixed "no information" sentence.
//! The result is never empty.

use serde::Serialize;

use kb_core::error::GenerationError;

pub mod extractive;
pub mod generator;

pub use generator::OllamaGenerator;

/// Sentences kept by the extractive fallback.
const EXTRACTIVE_SENTENCES: usize = 3;

/// External text generation, given the query and the joined context.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, query: &str, context: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMethod {
    Generated,
    Extractive,
    Template,
}

impl AnswerMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Extractive => "extractive",
            Self::Template => "template",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub method: AnswerMethod,
}

pub struct AnswerSynthesizer {
    generator: Option<Box<dyn TextGenerator>>,
    max_passages: usize,
}

impl Default for AnswerSynthesizer {
    fn default() -> Self { Self::new(3) }
}

impl AnswerSynthesizer {
    pub fn new(max_passages: usize) -> Self { Self { generator: None, max_passages: max_passages.max(1) } }

    #[must_use]
    pub fn with_generator(mut self, generator: Box<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn max_passages(&self) -> usize { self.max_passages }

    pub fn has_generator(&self) -> bool { self.generator.is_some() }

    /// Answer from the first `max_passages` passages, joined by blank lines.
    pub fn synthesize<S: AsRef<str>>(&self, query: &str, passages: &[S]) -> Answer {
        let context = passages
            .iter()
            .take(self.max_passages)
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        self.synthesize_context(query, &context)
    }

    pub fn synthesize_context(&self, query: &str, context: &str) -> Answer {
        if let Some(generator) = &self.generator {
            match generator.generate(query, context) {
                Ok(text) if !text.trim().is_empty() => {
                    return Answer { text: text.trim().to_string(), method: AnswerMethod::Generated };
                }
                Ok(_) => tracing::warn!("generator returned blank text, using local summary"),
                Err(e) => tracing::warn!(error = %e, "generation failed, using local summary"),
            }
        }

        if context.trim().is_empty() {
            return Answer { text: no_information_answer(query), method: AnswerMethod::Template };
        }

        let summary = extractive::summarize(query, context, EXTRACTIVE_SENTENCES);
        if summary.trim().is_empty() {
            return Answer { text: no_information_answer(query), method: AnswerMethod::Template };
        }
        Answer { text: summary, method: AnswerMethod::Extractive }
    }
}

pub fn no_information_answer(query: &str) -> String {
    format!("I don't have specific information about '{}' in the knowledge base.", query.trim())
}

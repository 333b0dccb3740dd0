//! kb-pipeline
//!
//! The query path: a retrieval cascade over prioritized backends, answer
//! synthesis from the winning passages, and the response envelope handed
//! back to callers. `bootstrap` wires everything from `Settings` once at
//! startup; request handlers then share the resulting `KnowledgeService`.

pub mod bootstrap;
pub mod cascade;
pub mod envelope;
pub mod service;
pub mod synthesize;
pub mod telemetry;

pub use bootstrap::{build_cascade, build_service};
pub use cascade::{AttemptOutcome, BackendAttempt, BackendSlot, Cascade, CascadeOutcome};
pub use envelope::{EnvelopeBuilder, QueryEnvelope};
pub use service::{KnowledgeService, QueryRequest};
pub use synthesize::{Answer, AnswerMethod, AnswerSynthesizer, OllamaGenerator, TextGenerator};
pub use telemetry::JsonlActionSink;

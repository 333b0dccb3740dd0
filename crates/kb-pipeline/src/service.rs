use std::collections::BTreeMap;

use kb_core::traits::{ActionMetadata, ActionRecord, ActionSink};

use crate::cascade::Cascade;
use crate::envelope::{EnvelopeBuilder, QueryEnvelope};
use crate::synthesize::AnswerSynthesizer;

pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_TOP_K: usize = 50;

/// A caller's query. `task_id` becomes the envelope's `query_id`.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub query_text: String,
    pub task_id: Option<String>,
    pub top_k: Option<usize>,
    pub filters: BTreeMap<String, String>,
}

impl QueryRequest {
    pub fn new(query_text: impl Into<String>) -> Self { Self { query_text: query_text.into(), ..Self::default() } }

    #[must_use]
    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

/// Caller-facing query interface: cascade, then synthesis, then envelope.
/// Built once at startup and shared by reference across requests.
pub struct KnowledgeService {
    cascade: Cascade,
    synthesizer: AnswerSynthesizer,
    sink: Option<Box<dyn ActionSink>>,
    default_top_k: usize,
    max_top_k: usize,
}

impl KnowledgeService {
    pub fn new(cascade: Cascade, synthesizer: AnswerSynthesizer) -> Self {
        Self { cascade, synthesizer, sink: None, default_top_k: DEFAULT_TOP_K, max_top_k: MAX_TOP_K }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn ActionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k.max(1);
        self
    }

    /// Caller-supplied `top_k` values above this are clamped down to it.
    #[must_use]
    pub fn with_max_top_k(mut self, top_k: usize) -> Self {
        self.max_top_k = top_k.max(1);
        self
    }

    pub fn cascade(&self) -> &Cascade { &self.cascade }

    pub fn cascade_mut(&mut self) -> &mut Cascade { &mut self.cascade }

    pub fn synthesizer(&self) -> &AnswerSynthesizer { &self.synthesizer }

    /// Always returns a well-formed envelope; backend and generation
    /// failures are folded into its status and metadata.
    pub fn query(&self, request: QueryRequest) -> QueryEnvelope {
        let builder = EnvelopeBuilder::new(request.query_text.clone(), request.task_id.as_deref()).filters(request.filters.clone());
        let span = tracing::info_span!("query", query_id = %builder.query_id());
        let _entered = span.enter();

        let top_k = request.top_k.unwrap_or(self.default_top_k).clamp(1, self.max_top_k.max(self.default_top_k));
        tracing::info!(query = %request.query_text, top_k, "knowledge query");
        let outcome = self.cascade.run(&request.query_text, top_k);

        let passages: Vec<&str> = outcome.items.iter().map(|i| i.content.as_str()).collect();
        let answer = self.synthesizer.synthesize(&request.query_text, &passages);

        if !outcome.is_exhausted() {
            self.emit(builder.query_id(), &request);
        }
        let envelope = builder.build(&outcome, answer);
        tracing::info!(
            status = envelope.status_code(),
            results = envelope.result_count(),
            retriever = envelope.retriever(),
            "query answered"
        );
        envelope
    }

    fn emit(&self, task_id: &str, request: &QueryRequest) {
        let Some(sink) = &self.sink else { return };
        let record = ActionRecord {
            task_id: task_id.to_string(),
            agent: "knowledge".to_string(),
            action: "query".to_string(),
            metadata: ActionMetadata { query: request.query_text.clone(), filters: request.filters.clone() },
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        if let Err(e) = sink.record(&record) {
            tracing::warn!(error = %e, "failed to write action record");
        }
    }
}

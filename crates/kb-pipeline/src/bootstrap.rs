//! One-time wiring of backends, synthesizer and telemetry from `Settings`.
//!
//! A backend that cannot be reached at startup still takes its place in the
//! order as an unavailable slot; startup itself only fails on programming
//! or configuration errors.

use std::sync::Arc;
use std::time::Duration;

use kb_core::config::Settings;
use kb_core::error::BackendError;
use kb_core::traits::{Embedder, RetrievalBackend};
use kb_core::types::BackendId;
use kb_embed::embedder_from_settings;
use kb_text::LexicalBackend;
use kb_vector::{CollectionBackend, MultiCollectionBackend, QdrantClient};

use crate::cascade::{BackendSlot, Cascade};
use crate::service::KnowledgeService;
use crate::synthesize::{AnswerSynthesizer, OllamaGenerator};
use crate::telemetry::JsonlActionSink;

pub fn build_cascade(settings: &Settings) -> anyhow::Result<Cascade> {
    let needs_vectors = settings.retrieval.order.iter().any(|id| id.is_semantic() && settings.backend_enabled(*id));
    let embedder: Result<Arc<dyn Embedder>, String> = if needs_vectors {
        embedder_from_settings(&settings.embedding).map(Arc::from).map_err(|e| format!("embedder: {e}"))
    } else {
        Err("embedder not configured".to_string())
    };

    let mut slots = Vec::with_capacity(settings.retrieval.order.len());
    for &id in &settings.retrieval.order {
        if !settings.backend_enabled(id) {
            tracing::info!(backend = %id, "backend disabled in configuration");
            continue;
        }
        let timeout = settings.backend_timeout(id);
        let init = init_backend(settings, id, timeout, &embedder);
        slots.push(BackendSlot::from_init(id, init, timeout));
    }

    let cascade = Cascade::new(slots).with_request_deadline(settings.retrieval.request_deadline());
    tracing::info!(
        configured = cascade.slots().len(),
        available = cascade.available_count(),
        "retrieval cascade ready"
    );
    Ok(cascade)
}

fn init_backend(
    settings: &Settings,
    id: BackendId,
    timeout: Duration,
    embedder: &Result<Arc<dyn Embedder>, String>,
) -> Result<Arc<dyn RetrievalBackend>, BackendError> {
    let vector_parts = || -> Result<(QdrantClient, Arc<dyn Embedder>), BackendError> {
        let embedder = embedder.as_ref().map_err(|e| BackendError::unavailable(id, e.clone()))?;
        let client = QdrantClient::new(&settings.qdrant.url, settings.qdrant.api_key.as_deref(), timeout)
            .map_err(|e| BackendError::unavailable(id, e.to_string()))?;
        Ok((client, Arc::clone(embedder)))
    };

    let backend: Arc<dyn RetrievalBackend> = match id {
        BackendId::Lexical => Arc::new(LexicalBackend::open(&settings.lexical.corpus_dir, &settings.lexical.extensions)?),
        BackendId::MultiCollection => {
            let (client, embedder) = vector_parts()?;
            let mc = &settings.multi_collection;
            Arc::new(MultiCollectionBackend::connect(client, mc.collections.clone(), &mc.content_field, embedder)?)
        }
        BackendId::VectorA | BackendId::VectorB => {
            let (client, embedder) = vector_parts()?;
            let c = if id == BackendId::VectorA { &settings.vector_a } else { &settings.vector_b };
            Arc::new(CollectionBackend::connect(id, client, &c.collection, &c.content_field, embedder)?)
        }
    };
    Ok(backend)
}

/// Cascade plus synthesizer, generator and telemetry sink as configured.
pub fn build_service(settings: &Settings) -> anyhow::Result<KnowledgeService> {
    let cascade = build_cascade(settings)?;

    let generation = &settings.generation;
    let mut synthesizer = AnswerSynthesizer::new(generation.max_passages);
    if generation.enabled {
        let generator = OllamaGenerator::new(&generation.url, &generation.model, Duration::from_millis(generation.timeout_ms))?;
        tracing::info!(url = %generation.url, model = %generation.model, "answer generation enabled");
        synthesizer = synthesizer.with_generator(Box::new(generator));
    }

    let mut service = KnowledgeService::new(cascade, synthesizer)
        .with_default_top_k(settings.retrieval.default_top_k)
        .with_max_top_k(settings.retrieval.max_top_k);
    if settings.telemetry.enabled {
        service = service.with_sink(Box::new(JsonlActionSink::new(&settings.telemetry.log_path)));
    }
    Ok(service)
}

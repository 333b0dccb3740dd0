//! Ordered fallthrough across retrieval backends.
//!
//! Backends are tried in a fixed priority order. The first one returning a
//! non-empty list wins and no later backend is called. Unavailable backends,
//! errors, timeouts and empty results are recorded as attempts and never
//! escape to the caller.

use serde::Serialize;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use kb_core::error::{BackendError, BackendFailure};
use kb_core::traits::RetrievalBackend;
use kb_core::types::{BackendId, ResultItem};

/// `error_detail` recorded for a backend that never initialized.
pub const UNAVAILABLE: &str = "unavailable";
/// `error_detail` recorded once the overall request budget is spent.
pub const DEADLINE_EXCEEDED: &str = "request deadline exceeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Empty,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendAttempt {
    pub backend: BackendId,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub elapsed_ms: u64,
    /// Set when the backend was never queried (unavailable, or no budget left).
    pub skipped: bool,
}

impl BackendAttempt {
    fn new(backend: BackendId, outcome: AttemptOutcome, error_detail: Option<String>, elapsed: Duration) -> Self {
        Self {
            backend,
            outcome,
            error_detail,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            skipped: false,
        }
    }

    fn skip(backend: BackendId, reason: &str) -> Self {
        Self { backend, outcome: AttemptOutcome::Error, error_detail: Some(reason.to_string()), elapsed_ms: 0, skipped: true }
    }

    /// True when the backend was actually queried.
    pub fn ran(&self) -> bool { !self.skipped }
}

/// Result of one cascade run. Items all come from `winning_backend`.
#[derive(Debug, Clone, Default)]
pub struct CascadeOutcome {
    pub items: Vec<ResultItem>,
    pub winning_backend: Option<BackendId>,
    pub backend_attempts: Vec<BackendAttempt>,
}

impl CascadeOutcome {
    pub fn is_exhausted(&self) -> bool { self.winning_backend.is_none() }

    /// At least one backend was queried (as opposed to all being unavailable).
    pub fn any_backend_ran(&self) -> bool { self.backend_attempts.iter().any(BackendAttempt::ran) }

    pub fn had_errors(&self) -> bool { self.backend_attempts.iter().any(|a| a.outcome == AttemptOutcome::Error) }

    pub fn sources(&self) -> Vec<String> { self.items.iter().map(|i| i.source.clone()).collect() }
}

enum SlotState {
    Ready(Arc<dyn RetrievalBackend>),
    Unavailable(String),
}

/// One position in the priority order: a backend or the reason it is missing.
pub struct BackendSlot {
    id: BackendId,
    state: SlotState,
    timeout: Duration,
}

impl BackendSlot {
    pub fn ready(backend: Arc<dyn RetrievalBackend>, timeout: Duration) -> Self {
        Self { id: backend.id(), state: SlotState::Ready(backend), timeout }
    }

    pub fn unavailable(id: BackendId, reason: impl Into<String>) -> Self {
        Self { id, state: SlotState::Unavailable(reason.into()), timeout: Duration::ZERO }
    }

    /// Slot for a startup attempt: ready on success, unavailable with the
    /// error as reason otherwise.
    pub fn from_init(id: BackendId, init: Result<Arc<dyn RetrievalBackend>, BackendError>, timeout: Duration) -> Self {
        match init {
            Ok(backend) => Self::ready(backend, timeout),
            Err(e) => {
                let reason = match e.cause {
                    BackendFailure::Unavailable(reason) => reason,
                    other => other.to_string(),
                };
                tracing::warn!(backend = %id, %reason, "backend unavailable, it will be skipped");
                Self::unavailable(id, reason)
            }
        }
    }

    pub fn id(&self) -> BackendId { self.id }

    pub fn timeout(&self) -> Duration { self.timeout }

    pub fn is_available(&self) -> bool { matches!(self.state, SlotState::Ready(_)) }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.state {
            SlotState::Unavailable(reason) => Some(reason),
            SlotState::Ready(_) => None,
        }
    }
}

pub struct Cascade {
    slots: Vec<BackendSlot>,
    request_deadline: Option<Duration>,
}

impl Cascade {
    /// Slots are tried in the order given.
    pub fn new(slots: Vec<BackendSlot>) -> Self { Self { slots, request_deadline: None } }

    #[must_use]
    pub fn with_request_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.request_deadline = deadline;
        self
    }

    pub fn slots(&self) -> &[BackendSlot] { &self.slots }

    pub fn available_count(&self) -> usize { self.slots.iter().filter(|s| s.is_available()).count() }

    /// Put a freshly initialized backend into its slot, keeping the slot's
    /// position. Unknown ids are appended at lowest priority.
    pub fn reinitialize(&mut self, backend: Arc<dyn RetrievalBackend>, timeout: Duration) {
        let slot = BackendSlot::ready(backend, timeout);
        tracing::info!(backend = %slot.id, "backend reinitialized");
        match self.slots.iter_mut().find(|s| s.id == slot.id) {
            Some(existing) => *existing = slot,
            None => self.slots.push(slot),
        }
    }

    pub fn run(&self, query: &str, limit: usize) -> CascadeOutcome {
        let limit = limit.max(1);
        let started = Instant::now();
        let mut attempts = Vec::with_capacity(self.slots.len());

        for slot in &self.slots {
            let backend = match &slot.state {
                SlotState::Ready(backend) => backend,
                SlotState::Unavailable(_) => {
                    attempts.push(BackendAttempt::skip(slot.id, UNAVAILABLE));
                    continue;
                }
            };
            let mut timeout = slot.timeout;
            if let Some(deadline) = self.request_deadline {
                let remaining = deadline.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    tracing::warn!(backend = %slot.id, "request deadline spent, skipping backend");
                    attempts.push(BackendAttempt::skip(slot.id, DEADLINE_EXCEEDED));
                    continue;
                }
                timeout = timeout.min(remaining);
            }

            let call_started = Instant::now();
            match call_bounded(backend, query, limit, timeout) {
                Ok(items) if items.is_empty() => {
                    tracing::info!(backend = %slot.id, "backend returned no results");
                    attempts.push(BackendAttempt::new(slot.id, AttemptOutcome::Empty, None, call_started.elapsed()));
                }
                Ok(items) => {
                    tracing::info!(backend = %slot.id, results = items.len(), "backend won the cascade");
                    attempts.push(BackendAttempt::new(slot.id, AttemptOutcome::Success, None, call_started.elapsed()));
                    return CascadeOutcome { items, winning_backend: Some(slot.id), backend_attempts: attempts };
                }
                Err(e) => {
                    tracing::warn!(backend = %slot.id, error = %e.cause, "backend failed, falling through");
                    attempts.push(BackendAttempt::new(slot.id, AttemptOutcome::Error, Some(e.cause.to_string()), call_started.elapsed()));
                }
            }
        }

        tracing::info!(attempted = attempts.len(), "cascade exhausted without results");
        CascadeOutcome { items: Vec::new(), winning_backend: None, backend_attempts: attempts }
    }
}

/// Run one backend search on a worker thread and wait at most `timeout`.
/// A worker that overruns is abandoned; its late result is discarded.
fn call_bounded(backend: &Arc<dyn RetrievalBackend>, query: &str, limit: usize, timeout: Duration) -> Result<Vec<ResultItem>, BackendError> {
    let id = backend.id();
    let (tx, rx) = mpsc::channel();
    let worker = Arc::clone(backend);
    let query = query.to_string();
    thread::Builder::new()
        .name(format!("kb-{id}"))
        .spawn(move || {
            // The receiver is gone once the caller has timed out.
            let _ = tx.send(worker.search(&query, limit));
        })
        .map_err(|e| BackendError::new(id, BackendFailure::Worker(e.to_string())))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(BackendError::timeout(id, timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(BackendError::new(id, BackendFailure::Worker("search panicked".to_string()))),
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use kb_core::error::{BackendError, BackendFailure};
use kb_core::traits::RetrievalBackend;
use kb_core::types::{BackendId, ResultItem};
use kb_pipeline::cascade::{DEADLINE_EXCEEDED, UNAVAILABLE};
use kb_pipeline::{AttemptOutcome, BackendSlot, Cascade};

enum Behavior {
    Hits(Vec<&'static str>),
    Empty,
    Fail,
    Sleep(Duration),
    Panic,
}

struct ScriptedBackend {
    id: BackendId,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(id: BackendId, behavior: Behavior) -> Arc<Self> { Arc::new(Self { id, behavior, calls: AtomicUsize::new(0) }) }

    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl RetrievalBackend for ScriptedBackend {
    fn id(&self) -> BackendId { self.id }

    fn search(&self, _query: &str, limit: usize) -> Result<Vec<ResultItem>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Hits(texts) => Ok(texts
                .iter()
                .take(limit)
                .enumerate()
                .map(|(i, t)| ResultItem::new(self.id, format!("{}:{i}", self.id), *t))
                .collect()),
            Behavior::Empty => Ok(Vec::new()),
            Behavior::Fail => Err(BackendError::new(self.id, BackendFailure::Transport("connection refused".into()))),
            Behavior::Sleep(d) => {
                thread::sleep(*d);
                Ok(vec![ResultItem::new(self.id, "late", "too late")])
            }
            Behavior::Panic => panic!("backend blew up"),
        }
    }
}

fn slot(backend: &Arc<ScriptedBackend>) -> BackendSlot {
    BackendSlot::ready(Arc::clone(backend) as Arc<dyn RetrievalBackend>, Duration::from_secs(2))
}

#[test]
fn first_non_empty_backend_wins_and_later_ones_are_not_called() {
    let multi = ScriptedBackend::new(BackendId::MultiCollection, Behavior::Empty);
    let a = ScriptedBackend::new(BackendId::VectorA, Behavior::Hits(vec!["alpha", "beta"]));
    let b = ScriptedBackend::new(BackendId::VectorB, Behavior::Hits(vec!["gamma"]));
    let lexical = ScriptedBackend::new(BackendId::Lexical, Behavior::Hits(vec!["delta"]));
    let cascade = Cascade::new(vec![slot(&multi), slot(&a), slot(&b), slot(&lexical)]);

    let outcome = cascade.run("q", 5);

    assert_eq!(outcome.winning_backend, Some(BackendId::VectorA));
    assert_eq!(outcome.items.len(), 2);
    assert!(outcome.items.iter().all(|i| i.backend_id == BackendId::VectorA));
    assert_eq!((multi.calls(), a.calls(), b.calls(), lexical.calls()), (1, 1, 0, 0));
    let outcomes: Vec<_> = outcome.backend_attempts.iter().map(|a| a.outcome).collect();
    assert_eq!(outcomes, vec![AttemptOutcome::Empty, AttemptOutcome::Success]);
}

#[test]
fn non_empty_list_of_blank_passages_still_wins() {
    let a = ScriptedBackend::new(BackendId::VectorA, Behavior::Hits(vec!["", ""]));
    let lexical = ScriptedBackend::new(BackendId::Lexical, Behavior::Hits(vec!["real text"]));
    let cascade = Cascade::new(vec![slot(&a), slot(&lexical)]);

    let outcome = cascade.run("q", 5);

    assert_eq!(outcome.winning_backend, Some(BackendId::VectorA));
    assert_eq!(outcome.items.len(), 2);
    assert_eq!(lexical.calls(), 0);
}

#[test]
fn errors_fall_through_to_the_next_backend() {
    let multi = ScriptedBackend::new(BackendId::MultiCollection, Behavior::Fail);
    let lexical = ScriptedBackend::new(BackendId::Lexical, Behavior::Hits(vec!["Dharma is duty."]));
    let cascade = Cascade::new(vec![slot(&multi), slot(&lexical)]);

    let outcome = cascade.run("what is dharma", 5);

    assert_eq!(outcome.winning_backend, Some(BackendId::Lexical));
    assert!(outcome.had_errors());
    let first = &outcome.backend_attempts[0];
    assert_eq!(first.outcome, AttemptOutcome::Error);
    assert!(first.error_detail.as_deref().unwrap_or_default().contains("connection refused"));
}

#[test]
fn third_backend_items_are_returned_in_its_order() {
    let a = ScriptedBackend::new(BackendId::VectorA, Behavior::Empty);
    let b = ScriptedBackend::new(BackendId::VectorB, Behavior::Fail);
    let lexical = ScriptedBackend::new(BackendId::Lexical, Behavior::Hits(vec!["third", "first", "second"]));
    let cascade = Cascade::new(vec![slot(&a), slot(&b), slot(&lexical)]);

    let outcome = cascade.run("q", 5);

    let contents: Vec<_> = outcome.items.iter().map(|i| i.content.as_str()).collect();
    assert_eq!(contents, vec!["third", "first", "second"]);
    assert_eq!(outcome.sources(), vec!["lexical:0", "lexical:1", "lexical:2"]);
}

#[test]
fn exhaustion_returns_empty_outcome_with_every_attempt() {
    let a = ScriptedBackend::new(BackendId::VectorA, Behavior::Empty);
    let b = ScriptedBackend::new(BackendId::VectorB, Behavior::Fail);
    let cascade = Cascade::new(vec![
        BackendSlot::unavailable(BackendId::MultiCollection, "connection refused"),
        slot(&a),
        slot(&b),
        BackendSlot::unavailable(BackendId::Lexical, "corpus missing"),
    ]);

    let outcome = cascade.run("nothing matches", 5);

    assert!(outcome.is_exhausted());
    assert!(outcome.items.is_empty());
    assert!(outcome.any_backend_ran());
    assert_eq!(outcome.backend_attempts.len(), 4);
    assert_eq!(outcome.backend_attempts[0].error_detail.as_deref(), Some(UNAVAILABLE));
    assert_eq!(outcome.backend_attempts[3].error_detail.as_deref(), Some(UNAVAILABLE));
    let ran: Vec<bool> = outcome.backend_attempts.iter().map(|a| a.ran()).collect();
    assert_eq!(ran, vec![false, true, true, false]);
    assert!(outcome.backend_attempts[0].skipped);
}

#[test]
fn all_unavailable_means_no_backend_ran() {
    let cascade = Cascade::new(vec![
        BackendSlot::unavailable(BackendId::VectorA, "down"),
        BackendSlot::unavailable(BackendId::Lexical, "down"),
    ]);
    assert_eq!(cascade.available_count(), 0);

    let outcome = cascade.run("q", 3);

    assert!(outcome.is_exhausted());
    assert!(!outcome.any_backend_ran());
}

#[test]
fn empty_cascade_is_exhausted() {
    let outcome = Cascade::new(Vec::new()).run("q", 3);
    assert!(outcome.is_exhausted());
    assert!(outcome.backend_attempts.is_empty());
}

#[test]
fn from_init_keeps_the_failure_reason() {
    let slot = BackendSlot::from_init(
        BackendId::VectorB,
        Err(BackendError::unavailable(BackendId::VectorB, "collection 'x' missing")),
        Duration::from_secs(1),
    );
    assert!(!slot.is_available());
    assert_eq!(slot.unavailable_reason(), Some("collection 'x' missing"));
}

#[test]
fn slow_backend_times_out_and_cascade_moves_on() {
    let slow = ScriptedBackend::new(BackendId::VectorA, Behavior::Sleep(Duration::from_secs(3)));
    let lexical = ScriptedBackend::new(BackendId::Lexical, Behavior::Hits(vec!["fast answer"]));
    let cascade = Cascade::new(vec![
        BackendSlot::ready(Arc::clone(&slow) as Arc<dyn RetrievalBackend>, Duration::from_millis(100)),
        slot(&lexical),
    ]);

    let started = Instant::now();
    let outcome = cascade.run("q", 5);

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(outcome.winning_backend, Some(BackendId::Lexical));
    let detail = outcome.backend_attempts[0].error_detail.clone().unwrap_or_default();
    assert!(detail.contains("timed out"), "got {detail}");
}

#[test]
fn request_deadline_skips_remaining_backends() {
    let slow = ScriptedBackend::new(BackendId::VectorA, Behavior::Sleep(Duration::from_secs(3)));
    let lexical = ScriptedBackend::new(BackendId::Lexical, Behavior::Hits(vec!["never reached"]));
    let cascade = Cascade::new(vec![
        BackendSlot::ready(Arc::clone(&slow) as Arc<dyn RetrievalBackend>, Duration::from_secs(10)),
        slot(&lexical),
    ])
    .with_request_deadline(Some(Duration::from_millis(150)));

    let outcome = cascade.run("q", 5);

    assert!(outcome.is_exhausted());
    assert_eq!(lexical.calls(), 0);
    assert_eq!(outcome.backend_attempts[1].error_detail.as_deref(), Some(DEADLINE_EXCEEDED));
    assert!(outcome.backend_attempts[0].ran());
    assert!(!outcome.backend_attempts[1].ran());
    assert!(outcome.any_backend_ran());
}

#[test]
fn backend_reporting_unavailable_text_still_counts_as_ran() {
    struct Misleading;
    impl RetrievalBackend for Misleading {
        fn id(&self) -> BackendId { BackendId::VectorB }
        fn search(&self, _query: &str, _limit: usize) -> Result<Vec<ResultItem>, BackendError> {
            Err(BackendError::new(BackendId::VectorB, BackendFailure::Transport(UNAVAILABLE.into())))
        }
    }
    let cascade = Cascade::new(vec![BackendSlot::ready(Arc::new(Misleading), Duration::from_secs(1))]);

    let outcome = cascade.run("q", 5);

    assert!(outcome.is_exhausted());
    assert!(outcome.any_backend_ran());
}

#[test]
fn panicking_backend_is_contained() {
    let bad = ScriptedBackend::new(BackendId::MultiCollection, Behavior::Panic);
    let lexical = ScriptedBackend::new(BackendId::Lexical, Behavior::Hits(vec!["still answered"]));
    let cascade = Cascade::new(vec![slot(&bad), slot(&lexical)]);

    let outcome = cascade.run("q", 5);

    assert_eq!(outcome.winning_backend, Some(BackendId::Lexical));
    assert_eq!(outcome.backend_attempts[0].outcome, AttemptOutcome::Error);
}

#[test]
fn limit_is_passed_through_and_clamped_to_one() {
    let a = ScriptedBackend::new(BackendId::VectorA, Behavior::Hits(vec!["1", "2", "3"]));
    let cascade = Cascade::new(vec![slot(&a)]);

    assert_eq!(cascade.run("q", 2).items.len(), 2);
    assert_eq!(cascade.run("q", 0).items.len(), 1);
}

#[test]
fn reinitialize_replaces_slot_in_place() {
    let lexical = ScriptedBackend::new(BackendId::Lexical, Behavior::Hits(vec!["lexical"]));
    let mut cascade = Cascade::new(vec![BackendSlot::unavailable(BackendId::VectorA, "down"), slot(&lexical)]);
    assert_eq!(cascade.run("q", 5).winning_backend, Some(BackendId::Lexical));

    let recovered = ScriptedBackend::new(BackendId::VectorA, Behavior::Hits(vec!["vector"]));
    cascade.reinitialize(Arc::clone(&recovered) as Arc<dyn RetrievalBackend>, Duration::from_secs(1));

    assert_eq!(cascade.slots().len(), 2);
    assert_eq!(cascade.slots()[0].id(), BackendId::VectorA);
    assert_eq!(cascade.run("q", 5).winning_backend, Some(BackendId::VectorA));
}

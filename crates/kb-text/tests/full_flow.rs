use std::fs;
use std::path::PathBuf;

use kb_core::traits::RetrievalBackend;
use kb_core::types::BackendId;
use kb_text::LexicalBackend;
use tempfile::TempDir;

fn corpus_dir() -> PathBuf {
    // crates/kb-text -> crates -> repo root
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2).unwrap().to_path_buf();
    root.join("test_data/txt")
}

fn txt() -> Vec<String> { vec!["txt".to_string()] }

#[test]
fn lexical_full_flow() {
    let backend = LexicalBackend::open(&corpus_dir(), &txt()).expect("open corpus");
    assert_eq!(backend.chunk_count(), 6, "three files, two paragraphs each");

    let results = backend.search("what is dharma", 5).expect("search");
    assert!(!results.is_empty());
    let top = &results[0];
    assert_eq!(top.backend_id, BackendId::Lexical);
    assert!(top.content.contains("Dharma is duty"));
    assert!(top.source.ends_with("dharma.txt"), "source is the originating file: {}", top.source);
    assert!(top.score.is_some());

    for q in ["karma", "sleep"] {
        let results = backend.search(q, 10).expect("search");
        eprintln!("q='{}' -> {} hits", q, results.len());
        assert!(results.len() >= 2);
        assert!(results[0].score >= results[1].score);
    }
}

#[test]
fn limit_is_respected() {
    let backend = LexicalBackend::open(&corpus_dir(), &txt()).expect("open corpus");
    assert_eq!(backend.search("action", 1).expect("search").len(), 1);
}

#[test]
fn unmatched_query_is_empty_not_an_error() {
    let backend = LexicalBackend::open(&corpus_dir(), &txt()).expect("open corpus");
    assert!(backend.search("zebra quantum", 5).expect("search").is_empty());
    assert!(backend.search("what is the", 5).expect("all stop words").is_empty());
    assert!(backend.search("\"unbalanced (", 5).is_ok(), "syntax errors are tolerated");
}

#[test]
fn substring_fallback_finds_word_fragments() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.txt"), "Svadharma differs from person to person.").unwrap();
    let backend = LexicalBackend::open(tmp.path(), &txt()).expect("open");

    let results = backend.search("adharm", 5).expect("search");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source, "a.txt");
    assert_eq!(results[0].score, None, "substring matches carry no score");
}

#[test]
fn missing_corpus_is_unavailable() {
    let tmp = TempDir::new().unwrap();
    let err = LexicalBackend::open(&tmp.path().join("nope"), &txt()).err().expect("unavailable");
    assert_eq!(err.backend, BackendId::Lexical);
    assert!(err.to_string().contains("unavailable"));
}

#[test]
fn empty_corpus_is_available_and_returns_nothing() {
    let tmp = TempDir::new().unwrap();
    let backend = LexicalBackend::open(tmp.path(), &txt()).expect("open");
    assert_eq!(backend.chunk_count(), 0);
    assert!(backend.search("dharma", 3).expect("search").is_empty());
}

#[test]
fn huge_limit_is_clamped_to_the_corpus() {
    let backend = LexicalBackend::open(&corpus_dir(), &txt()).expect("open corpus");
    let results = backend.search("dharma", 1usize << 40).expect("search");
    assert!(!results.is_empty());
    assert!(results.len() <= backend.chunk_count());
}

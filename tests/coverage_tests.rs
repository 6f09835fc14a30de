#![allow(clippy::needless_range_loop)]
//! Coverage and overlap tests for text chunking.
//!
//! These tests verify that chunks properly cover input text and
//! handle overlaps correctly.

use std::sync::Arc;

use tranche::{
    BatchOptions, Cancellation, CharacterTokenizer, Chunk, Chunker, Document, Error, FastChunker, RecursiveChunker,
    SentenceChunker, TokenChunker, Tokenizer, WordTokenizer,
};

const TEXTS: [&str; 7] = [
    "Hello, world!",
    "The quick brown fox jumps over the lazy dog.",
    "Short",
    " Leading and trailing spaces ",
    "Multiple\n\nParagraphs\n\nHere",
    "Ünïcödé têxt wïth 日本語 and emoji 👋🏽 inside.",
    "Sentence one. Sentence two! Sentence three? Sentence four; done.",
];

fn words() -> Arc<dyn Tokenizer> {
    Arc::new(WordTokenizer::new())
}

// =============================================================================
// Coverage: Chunks should cover the entire input
// =============================================================================

/// Check that every character of the input is inside some chunk.
fn covers_every_char(chunks: &[Chunk], text: &str) -> bool {
    let mut covered = vec![false; text.chars().count()];
    for chunk in chunks {
        for i in chunk.start_index..chunk.end_index {
            covered[i] = true;
        }
    }
    covered.iter().all(|&c| c)
}

fn reconstructs(chunks: &[Chunk], text: &str) -> bool {
    chunks.iter().map(|c| c.text.as_str()).collect::<String>() == text
}

#[test]
fn token_chunker_full_coverage() {
    let long = "A".repeat(1000);
    for text in TEXTS.iter().copied().chain([long.as_str()]) {
        let chunker = TokenChunker::new(Arc::new(CharacterTokenizer), 50, 10).unwrap();
        let chunks = chunker.chunk(text);
        assert!(
            covers_every_char(&chunks, text),
            "token chunker failed coverage for: {:?}",
            text
        );
    }
}

#[test]
fn zero_overlap_chunkers_reconstruct() {
    let chunkers: Vec<Box<dyn Chunker>> = vec![
        Box::new(TokenChunker::new(words(), 3, 0).unwrap()),
        Box::new(SentenceChunker::new(words(), 4, 0).unwrap()),
        Box::new(RecursiveChunker::new(words(), 3).unwrap()),
        Box::new(FastChunker::new(12, 0).unwrap()),
    ];
    for chunker in &chunkers {
        for text in TEXTS {
            let chunks = chunker.chunk(text);
            assert!(
                reconstructs(&chunks, text),
                "{} chunker lost text for {:?}: {:?}",
                chunker.name(),
                text,
                chunks
            );
        }
    }
}

#[test]
fn empty_text_gives_no_chunks() {
    let chunkers: Vec<Box<dyn Chunker>> = vec![
        Box::new(TokenChunker::new(words(), 3, 1).unwrap()),
        Box::new(SentenceChunker::new(words(), 4, 0).unwrap()),
        Box::new(RecursiveChunker::new(words(), 3).unwrap()),
        Box::new(FastChunker::default()),
    ];
    for chunker in &chunkers {
        assert!(chunker.chunk("").is_empty(), "{}", chunker.name());
    }
}

// =============================================================================
// Overlap
// =============================================================================

#[test]
fn token_overlap_is_shared_text() {
    let text: String = ('a'..='z').collect();
    let chunks = TokenChunker::new(Arc::new(CharacterTokenizer), 10, 3)
        .unwrap()
        .chunk(&text);
    for pair in chunks.windows(2) {
        let tail: String = pair[0].text.chars().skip(7).collect();
        assert!(pair[1].text.starts_with(&tail));
    }
}

#[test]
fn fast_overlap_is_shared_text() {
    let text = "abcdefghijklmnopqrstuvwxyz".repeat(3);
    let chunks = FastChunker::new(20, 5).unwrap().chunk(&text);
    for pair in chunks.windows(2) {
        assert_eq!(pair[1].start_index, pair[0].end_index - 5);
        assert!(pair[0].text.ends_with(&pair[1].text[..5]));
    }
}

#[test]
fn sentence_overlap_repeats_whole_sentences() {
    let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu. Nu xi omicron pi.";
    let chunks = SentenceChunker::new(words(), 8, 4).unwrap().chunk(text);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].text, "Alpha beta gamma delta. Epsilon zeta eta theta. ");
    assert_eq!(chunks[1].text, "Epsilon zeta eta theta. Iota kappa lambda mu. ");
    assert_eq!(chunks[2].text, "Iota kappa lambda mu. Nu xi omicron pi.");
}

// =============================================================================
// Batches and documents
// =============================================================================

#[test]
fn batch_keeps_input_order() {
    let chunker = RecursiveChunker::new(words(), 4).unwrap();
    let texts: Vec<String> = (0..32).map(|i| format!("Document {i}. ").repeat(i % 5 + 1)).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

    let results = chunker
        .chunk_batch_with(&refs, &BatchOptions::parallel().with_threads(3))
        .unwrap();
    assert_eq!(results.len(), refs.len());
    for (text, chunks) in refs.iter().zip(&results) {
        assert_eq!(chunks, &chunker.chunk(text));
    }
}

#[test]
fn cancelled_batch_stops() {
    let cancel = Cancellation::new();
    cancel.cancel();
    let chunker = FastChunker::new(10, 0).unwrap();
    let err = chunker
        .chunk_batch_with(&["one", "two"], &BatchOptions::sequential().with_cancellation(cancel))
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[test]
fn empty_batch() {
    let chunker = FastChunker::new(10, 0).unwrap();
    assert!(chunker.chunk_batch(&[], true).is_empty());
}

#[test]
fn document_content_is_untouched() {
    let chunker = SentenceChunker::new(words(), 4, 0).unwrap();
    let document = Document::new("One two three. Four five six.").with_id("doc-1");
    let chunked = chunker.chunk_document(document.clone());
    assert_eq!(chunked.content, document.content);
    assert_eq!(chunked.id.as_deref(), Some("doc-1"));
    assert_eq!(chunked.chunks.len(), 2);
}

//! Property-based tests for text chunking.
//!
//! These tests verify that chunking strategies maintain key invariants:
//! - Offsets: every chunk is exactly its character span of the input
//! - Coverage: without overlap, chunks concatenate back to the input
//! - Budget: token counts never exceed the chunk size
//! - Ordered: chunks are in source order

use std::sync::Arc;

use proptest::prelude::*;
use tranche::{
    CharacterTokenizer, Chunk, Chunker, FastChunker, IncludeDelim, RecursiveChunker, RecursiveLevel, RecursiveRules,
    SentenceChunker, TokenChunker, Tokenizer, WordTokenizer,
};
use unicode_segmentation::UnicodeSegmentation;

// =============================================================================
// Test Generators
// =============================================================================

/// Generate a non-empty string for chunking
fn arbitrary_text() -> impl Strategy<Value = String> {
    prop::string::string_regex("(.|\n){10,500}")
        .unwrap()
        .prop_filter("non-empty", |s| !s.is_empty())
}

/// Generate text with sentence-like structure
fn sentence_like_text() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::string::string_regex("[A-Za-zé日]{2,15}").unwrap(), 3..60).prop_map(|words| {
        let mut result = String::new();
        for (i, word) in words.iter().enumerate() {
            result.push_str(word);
            match i % 7 {
                4 => result.push_str(". "),
                6 => result.push_str("\n\n"),
                _ => result.push(' '),
            }
        }
        result
    })
}

/// One delimiter or whitespace level with random options
fn arbitrary_level() -> impl Strategy<Value = RecursiveLevel> {
    let delimiters = prop::collection::vec(
        prop::sample::select(vec!["\n\n", "\n", ". ", ", ", " ", "a", "é", "日本"]),
        1..4,
    );
    prop_oneof![
        (delimiters, any::<bool>(), any::<bool>()).prop_map(|(delimiters, next, separate)| {
            let mut level = RecursiveLevel::delimiters(&delimiters);
            if next {
                level = level.with_include_delim(IncludeDelim::Next);
            }
            if separate {
                level = level.separate();
            }
            level
        }),
        Just(RecursiveLevel::Whitespace),
    ]
}

/// Valid rules, with or without a trailing token level
fn arbitrary_rules() -> impl Strategy<Value = RecursiveRules> {
    (prop::collection::vec(arbitrary_level(), 1..5), any::<bool>()).prop_map(|(mut levels, tokens)| {
        if tokens {
            levels.push(RecursiveLevel::Tokens);
        }
        RecursiveRules::new(levels).unwrap()
    })
}

fn chars() -> Arc<dyn Tokenizer> {
    Arc::new(CharacterTokenizer)
}

// =============================================================================
// Invariant Helpers
// =============================================================================

/// The chunk text is exactly the source's character span.
fn offsets_match(chunks: &[Chunk], text: &str) -> bool {
    let source: Vec<char> = text.chars().collect();
    chunks.iter().all(|chunk| {
        chunk.start_index < chunk.end_index
            && chunk.end_index <= source.len()
            && source[chunk.span()].iter().collect::<String>() == chunk.text
    })
}

fn concatenated(chunks: &[Chunk]) -> String {
    chunks.iter().map(|c| c.text.as_str()).collect()
}

/// Check that chunks are in order
fn chunks_ordered(chunks: &[Chunk]) -> bool {
    chunks.windows(2).all(|w| w[0].start_index < w[1].start_index)
}

// =============================================================================
// TokenChunker Properties
// =============================================================================

proptest! {
    #[test]
    fn token_chunks_respect_budget(text in arbitrary_text(), size in 1usize..64, overlap_pct in 0usize..90) {
        let overlap = size * overlap_pct / 100;
        let chunker = TokenChunker::new(chars(), size, overlap).unwrap();
        let chunks = chunker.chunk(&text);

        prop_assert!(!chunks.is_empty());
        prop_assert!(chunks.iter().all(|c| c.token_count <= size && c.token_count > 0));
        prop_assert!(offsets_match(&chunks, &text));
        prop_assert!(chunks_ordered(&chunks));
        prop_assert_eq!(chunks.last().map(|c| c.end_index), Some(text.chars().count()));
    }

    #[test]
    fn token_chunks_step_by_size_minus_overlap(text in arbitrary_text(), size in 2usize..32) {
        let overlap = size / 2;
        let chunks = TokenChunker::new(chars(), size, overlap).unwrap().chunk(&text);
        for pair in chunks.windows(2) {
            prop_assert_eq!(pair[1].start_index - pair[0].start_index, size - overlap);
        }
    }

    #[test]
    fn token_chunks_reconstruct_without_overlap(text in arbitrary_text(), size in 1usize..32) {
        let words: Arc<dyn Tokenizer> = Arc::new(WordTokenizer::new());
        let chunks = TokenChunker::new(words.clone(), size, 0).unwrap().chunk(&text);
        prop_assert_eq!(concatenated(&chunks), text.clone());
        prop_assert!(offsets_match(&chunks, &text));
        for chunk in &chunks {
            let ids = words.encode(&chunk.text);
            prop_assert_eq!(ids.len(), chunk.token_count);
            prop_assert_eq!(words.decode(&ids).unwrap(), chunk.text.clone());
        }
    }
}

// =============================================================================
// SentenceChunker Properties
// =============================================================================

proptest! {
    #[test]
    fn sentence_chunks_reconstruct(text in sentence_like_text(), size in 5usize..200) {
        let chunks = SentenceChunker::new(chars(), size, 0).unwrap().chunk(&text);
        prop_assert_eq!(concatenated(&chunks), text.clone());
        prop_assert!(offsets_match(&chunks, &text));
    }

    #[test]
    fn sentence_token_counts_are_exact(text in sentence_like_text(), size in 5usize..200) {
        let tokenizer = chars();
        let chunks = SentenceChunker::new(tokenizer.clone(), size, 0).unwrap().chunk(&text);
        for chunk in &chunks {
            prop_assert_eq!(chunk.token_count, tokenizer.count_tokens(&chunk.text));
        }
    }

    #[test]
    fn sentence_overlap_keeps_order(text in sentence_like_text(), size in 20usize..200) {
        let chunks = SentenceChunker::new(chars(), size, size / 4).unwrap().chunk(&text);
        prop_assert!(offsets_match(&chunks, &text));
        prop_assert!(chunks_ordered(&chunks));
        prop_assert_eq!(chunks.first().map(|c| c.start_index), Some(0));
    }
}

// =============================================================================
// RecursiveChunker Properties
// =============================================================================

proptest! {
    #[test]
    fn recursive_chunks_fit_and_reconstruct(text in arbitrary_text(), size in 1usize..128) {
        let chunks = RecursiveChunker::new(chars(), size).unwrap().chunk(&text);
        prop_assert_eq!(concatenated(&chunks), text.clone());
        prop_assert!(offsets_match(&chunks, &text));
        for chunk in &chunks {
            prop_assert!(chunk.token_count <= size, "chunk over budget: {}", chunk);
            prop_assert_eq!(chunk.token_count, chunk.len_chars());
        }
    }

    #[test]
    fn recursive_any_rules_fit_and_reconstruct(
        text in arbitrary_text(),
        rules in arbitrary_rules(),
        size in 1usize..48,
        min_chars in 0usize..16,
        word_tokens in any::<bool>(),
    ) {
        let tokenizer: Arc<dyn Tokenizer> = if word_tokens { Arc::new(WordTokenizer::new()) } else { chars() };
        let chunks = RecursiveChunker::new(tokenizer.clone(), size)
            .unwrap()
            .with_rules(rules)
            .with_min_characters_per_chunk(min_chars)
            .chunk(&text);
        prop_assert_eq!(concatenated(&chunks), text.clone());
        prop_assert!(offsets_match(&chunks, &text));
        prop_assert!(chunks_ordered(&chunks));
        for chunk in &chunks {
            prop_assert!(chunk.token_count <= size, "chunk over budget: {}", chunk);
            prop_assert_eq!(chunk.token_count, tokenizer.count_tokens(&chunk.text));
        }
    }

    #[test]
    fn recursive_paragraph_breaks_are_chunk_breaks(text in sentence_like_text(), size in 64usize..512) {
        let chunks = RecursiveChunker::new(chars(), size)
            .unwrap()
            .with_min_characters_per_chunk(0)
            .chunk(&text);
        for chunk in &chunks {
            let body = chunk.text.trim_end_matches("\n\n");
            prop_assert!(!body.contains("\n\n"), "chunk spans a paragraph break: {:?}", chunk.text);
        }
    }
}

// =============================================================================
// FastChunker Properties
// =============================================================================

proptest! {
    #[test]
    fn fast_chunks_reconstruct(text in arbitrary_text(), size in 1usize..64) {
        let chunks = FastChunker::new(size, 0).unwrap().chunk(&text);
        prop_assert_eq!(concatenated(&chunks), text.clone());
        prop_assert!(offsets_match(&chunks, &text));
        for chunk in &chunks {
            prop_assert!(chunk.len_chars() <= size || chunk.text.graphemes(true).count() == 1);
        }
    }

    #[test]
    fn fast_chunks_always_progress(text in arbitrary_text(), size in 2usize..64, overlap_pct in 0usize..90) {
        let overlap = size * overlap_pct / 100;
        let chunks = FastChunker::new(size, overlap).unwrap().chunk(&text);
        prop_assert!(chunks_ordered(&chunks));
        prop_assert!(offsets_match(&chunks, &text));
        prop_assert_eq!(chunks.last().map(|c| c.end_index), Some(text.chars().count()));
    }

    #[test]
    fn fast_neighbours_share_overlap(
        text in prop::string::string_regex("[a-z ]{10,300}").unwrap(),
        size in 2usize..64,
        overlap_pct in 0usize..90,
    ) {
        let overlap = size * overlap_pct / 100;
        let chunks = FastChunker::new(size, overlap).unwrap().chunk(&text);
        for pair in chunks.windows(2) {
            prop_assert_eq!(pair[0].end_index - pair[1].start_index, overlap);
        }
    }
}

// =============================================================================
// Determinism
// =============================================================================

proptest! {
    #[test]
    fn chunking_is_idempotent(text in arbitrary_text()) {
        let chunkers: Vec<Box<dyn Chunker>> = vec![
            Box::new(TokenChunker::new(chars(), 16, 4).unwrap()),
            Box::new(SentenceChunker::new(chars(), 64, 16).unwrap()),
            Box::new(RecursiveChunker::new(chars(), 32).unwrap()),
            Box::new(FastChunker::new(24, 6).unwrap()),
        ];
        for chunker in &chunkers {
            prop_assert_eq!(chunker.chunk(&text), chunker.chunk(&text));
        }
    }
}

// =============================================================================
// Batch Properties
// =============================================================================

proptest! {
    #[test]
    fn parallel_batch_matches_sequential(texts in prop::collection::vec(arbitrary_text(), 0..12)) {
        let chunker = RecursiveChunker::new(chars(), 40).unwrap();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let parallel = chunker.chunk_batch(&refs, true);
        let sequential = chunker.chunk_batch(&refs, false);
        prop_assert_eq!(parallel.len(), texts.len());
        prop_assert_eq!(parallel, sequential);
    }
}

//! Token-window chunking with overlap.
//!
//! The simplest chunking strategy: encode once, then cut every N tokens with
//! M tokens of overlap.
//!
//! ## How It Works
//!
//! ```text
//! size = 10, overlap = 2  (25 tokens)
//!
//! Chunk 0: t0  .. t9     [0..10]
//! Chunk 1: t8  .. t17    [8..18]   <- starts at 10 - 2 = 8
//! Chunk 2: t16 .. t24    [16..25]
//! Chunk 3: t24           [24..25]  <- window start still inside the text
//! ```
//!
//! Windows keep advancing while their start is inside the token sequence,
//! so the tail is never dropped, even when the final window is shorter than
//! the overlap.
//!
//! ## Offsets
//!
//! Token byte ranges come from [`Tokenizer::token_spans`]. A window runs from
//! its first token's start to the next window token's start, so whitespace a
//! tokenizer skips between tokens stays with the preceding window and
//! zero-overlap chunks concatenate back to the input exactly.
//!
//! Text with no tokens at all (whitespace under a tokenizer that skips it)
//! becomes a single chunk with a token count of zero, so no input is lost.
//!
//! ## Trade-offs
//!
//! | Overlap | Storage | Retrieval | Risk |
//! |---------|---------|-----------|------|
//! | 0% | Minimal | Poor at boundaries | Info loss |
//! | 10-20% | Low | Good | Sweet spot |
//! | 50%+ | High | Redundant | Wasted compute |

use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use crate::offsets::CharOffsets;
use crate::{Chunk, ChunkBudget, Chunker, Result, Tokenizer};

/// A window of tokens: its byte range in the text and its token count.
pub(crate) struct TokenWindow {
    pub(crate) bytes: Range<usize>,
    pub(crate) tokens: usize,
}

/// Slide a window of `budget.size()` tokens over `text`.
pub(crate) fn token_windows(tokenizer: &dyn Tokenizer, text: &str, budget: ChunkBudget) -> Vec<TokenWindow> {
    let spans = tokenizer.token_spans(text);
    let n = spans.len();
    if n == 0 {
        if text.is_empty() {
            return vec![];
        }
        return vec![TokenWindow {
            bytes: 0..text.len(),
            tokens: 0,
        }];
    }

    let start_byte = |i: usize| if i == 0 { 0 } else { spans[i].start };
    let end_byte = |i: usize| if i == n { text.len() } else { spans[i].start };

    let mut windows = Vec::with_capacity(n.div_ceil(budget.step()));
    let mut start = 0;
    while start < n {
        let end = (start + budget.size()).min(n);
        windows.push(TokenWindow {
            bytes: start_byte(start)..end_byte(end),
            tokens: end - start,
        });
        start += budget.step();
    }

    windows
}

/// Fixed-size token chunker with configurable overlap.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use tranche::{CharacterTokenizer, Chunker, TokenChunker};
///
/// let chunker = TokenChunker::new(Arc::new(CharacterTokenizer), 100, 20).unwrap();
/// let text = "A".repeat(250);
/// let chunks = chunker.chunk(&text);
///
/// // step = 80: windows start at 0, 80, 160, 240
/// assert_eq!(chunks.len(), 4);
/// assert_eq!(chunks[0].token_count, 100);
/// assert_eq!(chunks[1].start_index, 80);
/// assert_eq!(chunks[3].token_count, 10);
/// ```
#[derive(Debug, Clone)]
pub struct TokenChunker {
    tokenizer: Arc<dyn Tokenizer>,
    budget: ChunkBudget,
}

impl TokenChunker {
    /// Create a new token chunker.
    ///
    /// # Arguments
    ///
    /// * `tokenizer` - Defines what a token is
    /// * `chunk_size` - Maximum tokens per chunk
    /// * `chunk_overlap` - Tokens shared by adjacent chunks
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size == 0` or `chunk_overlap >= chunk_size`.
    pub fn new(tokenizer: Arc<dyn Tokenizer>, chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Ok(Self {
            tokenizer,
            budget: ChunkBudget::new(chunk_size, chunk_overlap)?,
        })
    }

    /// Create a chunker with no overlap.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size == 0`.
    pub fn no_overlap(tokenizer: Arc<dyn Tokenizer>, chunk_size: usize) -> Result<Self> {
        Self::new(tokenizer, chunk_size, 0)
    }

    /// The configured budget.
    #[must_use]
    pub fn budget(&self) -> ChunkBudget {
        self.budget
    }
}

impl Chunker for TokenChunker {
    fn name(&self) -> &'static str {
        "token"
    }

    fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return vec![];
        }

        let windows = token_windows(self.tokenizer.as_ref(), text, self.budget);
        let mut offsets = CharOffsets::new(text);
        let chunks: Vec<Chunk> = windows
            .into_iter()
            .map(|window| {
                let span = offsets.char_span(window.bytes.clone());
                Chunk::new(&text[window.bytes], span.start, span.end, window.tokens)
            })
            .collect();

        debug!(
            tokenizer = self.tokenizer.name(),
            chunks = chunks.len(),
            "token chunking done"
        );
        chunks
    }

    fn estimate_chunks(&self, text_len: usize) -> usize {
        if text_len == 0 {
            return 0;
        }
        // Assume ~4 bytes per token.
        (text_len / 4).div_ceil(self.budget.step()).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CharacterTokenizer, VocabularyTokenizer, WordTokenizer};

    fn chars(size: usize, overlap: usize) -> TokenChunker {
        TokenChunker::new(Arc::new(CharacterTokenizer), size, overlap).unwrap()
    }

    #[test]
    fn test_basic_chunking() {
        let chunks = chars(10, 2).chunk("abcdefghijklmnopqrstuvwxyz");

        assert_eq!(chunks[0].text, "abcdefghij");
        assert_eq!(chunks[0].start_index, 0);
        assert_eq!(chunks[0].end_index, 10);

        assert_eq!(chunks[1].start_index, 8); // 10 - 2 overlap
        assert_eq!(chunks[1].text, "ijklmnopqr");
    }

    #[test]
    fn test_short_final_window_is_kept() {
        let text: String = ('a'..='y').collect(); // 25 tokens
        let chunks = chars(10, 2).chunk(&text);

        let counts: Vec<usize> = chunks.iter().map(|c| c.token_count).collect();
        assert_eq!(counts, vec![10, 10, 9, 1]);
        let starts: Vec<usize> = chunks.iter().map(|c| c.start_index).collect();
        assert_eq!(starts, vec![0, 8, 16, 24]);
    }

    #[test]
    fn test_empty_text() {
        assert!(chars(10, 2).chunk("").is_empty());
    }

    #[test]
    fn test_text_smaller_than_chunk() {
        let chunks = chars(100, 20).chunk("small");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "small");
        assert_eq!(chunks[0].token_count, 5);
    }

    #[test]
    fn test_unicode_offsets_are_characters() {
        let text = "a日本語b👋c";
        let chunks = chars(3, 0).chunk(text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "a日本");
        assert_eq!(chunks[1].text, "語b👋");
        assert_eq!(chunks[1].span(), 3..6);
        assert_eq!(chunks[2].text, "c");
        assert_eq!(chunks[2].span(), 6..7);
    }

    #[test]
    fn test_word_windows_reconstruct() {
        let chunker = TokenChunker::new(Arc::new(WordTokenizer::new()), 3, 0).unwrap();
        let text = "  one two three four five six seven  ";
        let chunks = chunker.chunk(text);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_vocabulary_gaps_stay_with_previous_window() {
        let tokenizer = VocabularyTokenizer::new(["a", "b"]).unwrap();
        let chunker = TokenChunker::new(Arc::new(tokenizer), 1, 0).unwrap();
        let chunks = chunker.chunk(" a  b ");
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec![" a  ", "b "]);
    }

    #[test]
    fn test_untokenized_text_is_one_empty_chunk() {
        let tokenizer = VocabularyTokenizer::new(["a"]).unwrap();
        let chunker = TokenChunker::new(Arc::new(tokenizer), 4, 1).unwrap();
        let chunks = chunker.chunk(" \n\t ");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, " \n\t ");
        assert_eq!(chunks[0].span(), 0..4);
        assert_eq!(chunks[0].token_count, 0);
    }

    #[test]
    fn test_chunking_leaves_vocabulary_alone() {
        let tokenizer = Arc::new(WordTokenizer::new());
        let chunker = TokenChunker::new(tokenizer.clone(), 16, 0).unwrap();
        for doc in 0..200 {
            let text: String = (0..500).map(|w| format!("d{doc}w{w} ")).collect();
            assert_eq!(chunker.chunk(&text).len(), 32);
        }
        assert_eq!(tokenizer.vocab_size(), 0);
    }

    #[test]
    fn test_rejects_invalid_budget() {
        assert!(TokenChunker::new(Arc::new(CharacterTokenizer), 0, 0).is_err());
        assert!(TokenChunker::new(Arc::new(CharacterTokenizer), 10, 10).is_err());
    }
}

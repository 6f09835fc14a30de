//! Character-budget chunking that prefers whitespace cuts.
//!
//! No tokenizer in the hot path: the budget is counted in characters and
//! every cut lands on a grapheme cluster boundary, so combining sequences
//! and emoji ZWJ sequences are never split.
//!
//! ```text
//! size = 8, overlap = 0
//!
//! "hello world foo"
//!  |-------|            window of 8 chars: "hello wo"
//!  |-----|              snap back to just after the last whitespace
//! Chunk 0: "hello "
//! Chunk 1: "world "
//! Chunk 2: "foo"
//! ```
//!
//! ## Overlap and Progress
//!
//! The next chunk starts `overlap` characters before the cut. Whitespace
//! snapping only considers cuts that leave the chunk longer than the
//! overlap, so the next start always lies past the current one and
//! neighbours share their overlap. A grapheme wider than the remaining
//! budget can still produce a chunk no longer than the overlap; the next
//! start then moves one grapheme forward.

use std::sync::Arc;

use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::{CharacterTokenizer, Chunk, ChunkBudget, Chunker, Result, Tokenizer};

/// Grapheme clusters with their byte and character positions.
struct Graphemes {
    /// Byte start of each grapheme, plus the text length.
    bytes: Vec<usize>,
    /// Character offset of each grapheme, plus the total character count.
    chars: Vec<usize>,
    whitespace: Vec<bool>,
}

impl Graphemes {
    fn new(text: &str) -> Self {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        let mut chars = Vec::with_capacity(text.len() + 1);
        let mut whitespace = Vec::with_capacity(text.len());
        let mut char_pos = 0;
        for (byte, grapheme) in text.grapheme_indices(true) {
            bytes.push(byte);
            chars.push(char_pos);
            whitespace.push(grapheme.chars().all(char::is_whitespace));
            char_pos += grapheme.chars().count();
        }
        bytes.push(text.len());
        chars.push(char_pos);
        Self {
            bytes,
            chars,
            whitespace,
        }
    }

    fn len(&self) -> usize {
        self.whitespace.len()
    }

    /// Largest grapheme index `end > start` whose span from `start` is at
    /// most `size` characters. A single grapheme wider than `size` is
    /// still taken whole.
    fn window_end(&self, start: usize, size: usize) -> usize {
        let limit = self.chars[start] + size;
        let end = self.chars.partition_point(|&c| c <= limit).saturating_sub(1);
        end.clamp(start + 1, self.len())
    }

    /// Cut just after the last whitespace grapheme in `start..end` that
    /// leaves more than `min_chars` characters in the chunk.
    fn snap_to_whitespace(&self, start: usize, end: usize, min_chars: usize) -> Option<usize> {
        (start..end)
            .rev()
            .take_while(|&i| self.chars[i + 1] - self.chars[start] > min_chars)
            .find(|&i| self.whitespace[i])
            .map(|i| i + 1)
    }

    /// First grapheme index starting at or after character offset `char_pos`.
    fn at_or_after_char(&self, char_pos: usize) -> usize {
        self.chars.partition_point(|&c| c < char_pos)
    }
}

/// Fast character-budget chunker.
///
/// ## Example
///
/// ```rust
/// use tranche::{Chunker, FastChunker};
///
/// let chunker = FastChunker::new(8, 0).unwrap();
/// let chunks = chunker.chunk("hello world foo");
///
/// let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
/// assert_eq!(texts, vec!["hello ", "world ", "foo"]);
/// ```
#[derive(Debug, Clone)]
pub struct FastChunker {
    budget: ChunkBudget,
    tokenizer: Arc<dyn Tokenizer>,
}

impl FastChunker {
    /// Default chunk size in characters.
    pub const DEFAULT_CHUNK_SIZE: usize = 4096;

    /// Create a chunker with `chunk_size` characters per chunk and
    /// `chunk_overlap` characters of overlap.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size == 0` or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Ok(Self {
            budget: ChunkBudget::new(chunk_size, chunk_overlap)?,
            tokenizer: Arc::new(CharacterTokenizer),
        })
    }

    /// Report `token_count` with this tokenizer instead of character counts.
    /// Cutting is unaffected.
    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// The configured budget, in characters.
    #[must_use]
    pub fn budget(&self) -> ChunkBudget {
        self.budget
    }
}

impl Default for FastChunker {
    fn default() -> Self {
        Self {
            budget: ChunkBudget::fixed(Self::DEFAULT_CHUNK_SIZE),
            tokenizer: Arc::new(CharacterTokenizer),
        }
    }
}

impl Chunker for FastChunker {
    fn name(&self) -> &'static str {
        "fast"
    }

    fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return vec![];
        }

        let graphemes = Graphemes::new(text);
        let n = graphemes.len();
        let mut chunks = Vec::with_capacity(self.estimate_chunks(text.len()));
        let mut start = 0;

        while start < n {
            let end = graphemes.window_end(start, self.budget.size());
            let cut = if end < n {
                graphemes
                    .snap_to_whitespace(start, end, self.budget.overlap())
                    .unwrap_or(end)
            } else {
                n
            };

            let slice = &text[graphemes.bytes[start]..graphemes.bytes[cut]];
            chunks.push(Chunk::new(
                slice,
                graphemes.chars[start],
                graphemes.chars[cut],
                self.tokenizer.count_tokens(slice),
            ));

            if cut >= n {
                break;
            }
            start = graphemes
                .at_or_after_char(graphemes.chars[cut].saturating_sub(self.budget.overlap()))
                .max(start + 1);
        }

        debug!(
            size = self.budget.size(),
            overlap = self.budget.overlap(),
            chunks = chunks.len(),
            "fast chunking done"
        );
        chunks
    }

    fn estimate_chunks(&self, text_len: usize) -> usize {
        if text_len == 0 {
            return 0;
        }
        text_len.div_ceil(self.budget.step())
    }
}

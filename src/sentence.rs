//! Sentence-based chunking.
//!
//! Splits text into sentences, then packs consecutive sentences into chunks
//! that stay within a token budget.
//!
//! ## The Hard Part: Finding Sentences
//!
//! Sentence detection seems simple until you encounter:
//!
//! ```text
//! "Dr. Smith went to Washington D.C. on Jan. 15th."
//!     ^                          ^       ^
//!     Not a sentence end (abbreviation)
//! ```
//!
//! [`SentenceSplitter`] uses two cheap heuristics instead of a model:
//!
//! - A delimiter only ends a sentence when whitespace (or the end of the
//!   text) follows it, so `3.14` and `example.com` stay intact.
//! - A boundary that would leave a sentence shorter than
//!   `min_characters_per_sentence` is ignored, which absorbs most short
//!   abbreviations like "Dr." into the following sentence.
//!
//! This is not grammatical sentence detection. "Dr. Smith went home." still
//! splits after "Dr." when the minimum is low enough. For prose where that
//! matters, [`SegmentationMode::Unicode`] uses UAX #29 sentence boundaries
//! before the same minimum-length merge.
//!
//! ## Packing
//!
//! ```text
//! budget = 12 tokens, overlap = 4
//!
//! Sentences: [S1: 5] [S2: 6] [S3: 3] [S4: 7]
//! Chunk 0:   S1 S2          (11; adding S3 would make 14)
//! Chunk 1:   S3 S4          (10; S2 alone is 6 > 4, so no seed)
//! ```
//!
//! A sentence larger than the budget becomes its own chunk, whole.

use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::offsets::CharOffsets;
use crate::{Chunk, ChunkBudget, Chunker, Error, Result, Tokenizer};

/// How sentence candidates are found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    /// Configured delimiter strings.
    #[default]
    Delimiters,
    /// Unicode Standard Annex #29 sentence boundaries.
    Unicode,
}

/// Splits text into sentences that concatenate back to the input.
///
/// ```rust
/// use tranche::SentenceSplitter;
///
/// let splitter = SentenceSplitter::default();
/// let sentences = splitter.split("Pi is 3.14 exactly. Is it? Yes, mostly!");
/// assert_eq!(sentences, vec!["Pi is 3.14 exactly. ", "Is it? Yes, mostly!"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceSplitter {
    delimiters: Vec<String>,
    min_characters_per_sentence: usize,
    mode: SegmentationMode,
}

impl SentenceSplitter {
    /// Default sentence delimiters.
    pub const DEFAULT_DELIMITERS: [&'static str; 4] = [".", "!", "?", ";"];

    /// Default minimum sentence length in characters.
    pub const DEFAULT_MIN_CHARACTERS: usize = 12;

    /// Create a splitter with custom delimiters.
    ///
    /// # Errors
    ///
    /// Returns an error if `delimiters` is empty or contains an empty string.
    pub fn new<I, S>(delimiters: I, min_characters_per_sentence: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let delimiters: Vec<String> = delimiters.into_iter().map(Into::into).collect();
        if delimiters.is_empty() {
            return Err(Error::parameter("delimiters", "must not be empty"));
        }
        if delimiters.iter().any(String::is_empty) {
            return Err(Error::parameter("delimiters", "must not contain empty strings"));
        }
        Ok(Self {
            delimiters,
            min_characters_per_sentence,
            mode: SegmentationMode::Delimiters,
        })
    }

    /// Use a different segmentation mode.
    #[must_use]
    pub fn with_mode(mut self, mode: SegmentationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the minimum sentence length in characters.
    #[must_use]
    pub fn with_min_characters(mut self, min: usize) -> Self {
        self.min_characters_per_sentence = min;
        self
    }

    /// The configured delimiters.
    #[must_use]
    pub fn delimiters(&self) -> &[String] {
        &self.delimiters
    }

    /// Split `text` into sentences.
    #[must_use]
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.sentence_spans(text)
            .into_iter()
            .map(|span| &text[span])
            .collect()
    }

    /// Byte ranges of the sentences; contiguous and covering `text`.
    pub(crate) fn sentence_spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.is_empty() {
            return vec![];
        }

        let candidates = match self.mode {
            SegmentationMode::Delimiters => self.delimiter_boundaries(text),
            SegmentationMode::Unicode => text
                .split_sentence_bound_indices()
                .map(|(i, s)| i + s.len())
                .collect(),
        };

        let mut spans = Vec::with_capacity(candidates.len() + 1);
        let mut start = 0;
        for boundary in candidates {
            if boundary <= start || boundary >= text.len() {
                continue;
            }
            let sentence = text[start..boundary].trim();
            if sentence.chars().count() >= self.min_characters_per_sentence {
                spans.push(start..boundary);
                start = boundary;
            }
        }
        if start < text.len() {
            spans.push(start..text.len());
        }

        spans
    }

    /// Length of the delimiter matching at the start of `rest`, if any.
    /// Earlier delimiters in the list win.
    fn delimiter_at(&self, rest: &str) -> Option<usize> {
        self.delimiters
            .iter()
            .find(|d| rest.starts_with(d.as_str()))
            .map(String::len)
    }

    /// Candidate boundaries: after a run of delimiters that is followed by
    /// whitespace or the end of the text, including that whitespace.
    fn delimiter_boundaries(&self, text: &str) -> Vec<usize> {
        let mut boundaries = Vec::new();
        let mut pos = 0;

        while pos < text.len() {
            let Some(len) = self.delimiter_at(&text[pos..]) else {
                pos += text[pos..].chars().next().map_or(1, char::len_utf8);
                continue;
            };

            let mut end = pos + len;
            while let Some(len) = self.delimiter_at(&text[end..]) {
                end += len;
            }

            let rest = &text[end..];
            let ws = rest.len() - rest.trim_start().len();
            let closes = rest.is_empty() || ws > 0 || text[pos..end].ends_with(char::is_whitespace);
            if closes {
                end += ws;
                boundaries.push(end);
            }
            pos = end;
        }

        boundaries
    }
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self {
            delimiters: Self::DEFAULT_DELIMITERS.iter().map(|d| (*d).to_string()).collect(),
            min_characters_per_sentence: Self::DEFAULT_MIN_CHARACTERS,
            mode: SegmentationMode::Delimiters,
        }
    }
}

/// Sentence-based chunker.
///
/// Packs whole sentences into chunks of at most `chunk_size` tokens.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use tranche::{Chunker, SentenceChunker, WordTokenizer};
///
/// let chunker = SentenceChunker::new(Arc::new(WordTokenizer::new()), 5, 0).unwrap();
/// let text = "First sentence here. Second sentence here. Third one.";
/// let chunks = chunker.chunk(text);
///
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[0].text, "First sentence here. ");
/// assert_eq!(chunks[1].text, "Second sentence here. Third one.");
/// ```
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    tokenizer: Arc<dyn Tokenizer>,
    budget: ChunkBudget,
    splitter: SentenceSplitter,
    min_sentences_per_chunk: usize,
}

impl SentenceChunker {
    /// Create a new sentence chunker with the default splitter.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size == 0` or `chunk_overlap >= chunk_size`.
    pub fn new(tokenizer: Arc<dyn Tokenizer>, chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Ok(Self {
            tokenizer,
            budget: ChunkBudget::new(chunk_size, chunk_overlap)?,
            splitter: SentenceSplitter::default(),
            min_sentences_per_chunk: 1,
        })
    }

    /// Use a custom sentence splitter.
    #[must_use]
    pub fn with_splitter(mut self, splitter: SentenceSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    /// Require at least `min` sentences per chunk (the budget may be exceeded
    /// to honor it).
    ///
    /// # Errors
    ///
    /// Returns an error if `min == 0`.
    pub fn with_min_sentences(mut self, min: usize) -> Result<Self> {
        if min == 0 {
            return Err(Error::parameter("min_sentences_per_chunk", "must be > 0"));
        }
        self.min_sentences_per_chunk = min;
        Ok(self)
    }

    /// The sentence splitter in use.
    #[must_use]
    pub fn splitter(&self) -> &SentenceSplitter {
        &self.splitter
    }

    /// Group sentence indices into chunks; `counts[i]` is sentence i's tokens.
    fn pack(&self, counts: &[usize]) -> Vec<Range<usize>> {
        let n = counts.len();
        let mut groups = Vec::new();
        let mut group_start = 0;
        let mut tokens = 0;
        let mut i = 0;

        while i < n {
            let full = i > group_start
                && self.budget.would_overflow(tokens, counts[i])
                && i - group_start >= self.min_sentences_per_chunk;
            if !full {
                tokens += counts[i];
                i += 1;
                continue;
            }

            groups.push(group_start..i);
            let (seed_start, seed_tokens) = self.overlap_seed(counts, group_start, i);
            group_start = seed_start;
            tokens = seed_tokens;
        }

        if group_start < n {
            groups.push(group_start..n);
        }
        groups
    }

    /// Trailing sentences of `group_start..end` to repeat in the next chunk.
    fn overlap_seed(&self, counts: &[usize], group_start: usize, end: usize) -> (usize, usize) {
        let mut seed_start = end;
        let mut seed_tokens = 0;
        if self.budget.overlap() == 0 {
            return (seed_start, seed_tokens);
        }

        while seed_start > group_start && seed_tokens + counts[seed_start - 1] <= self.budget.overlap() {
            seed_start -= 1;
            seed_tokens += counts[seed_start];
        }
        // Leave room for the sentence that did not fit.
        while seed_start < end && self.budget.would_overflow(seed_tokens, counts[end]) {
            seed_tokens -= counts[seed_start];
            seed_start += 1;
        }
        (seed_start, seed_tokens)
    }
}

impl Chunker for SentenceChunker {
    fn name(&self) -> &'static str {
        "sentence"
    }

    fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return vec![];
        }

        let spans = self.splitter.sentence_spans(text);
        let sentences: Vec<&str> = spans.iter().map(|span| &text[span.clone()]).collect();
        let counts = self.tokenizer.count_tokens_batch(&sentences);

        let mut offsets = CharOffsets::new(text);
        let chunks: Vec<Chunk> = self
            .pack(&counts)
            .into_iter()
            .map(|group| {
                let bytes = spans[group.start].start..spans[group.end - 1].end;
                let span = offsets.char_span(bytes.clone());
                let tokens = counts[group].iter().sum();
                Chunk::new(&text[bytes], span.start, span.end, tokens)
            })
            .collect();

        debug!(
            sentences = sentences.len(),
            chunks = chunks.len(),
            "sentence chunking done"
        );
        chunks
    }

    fn estimate_chunks(&self, text_len: usize) -> usize {
        // Rough estimate: ~4 bytes per token.
        (text_len / 4 / self.budget.size()).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CharacterTokenizer, WordTokenizer};

    fn words(size: usize, overlap: usize) -> SentenceChunker {
        SentenceChunker::new(Arc::new(WordTokenizer::new()), size, overlap).unwrap()
    }

    #[test]
    fn test_split_reconstructs() {
        let splitter = SentenceSplitter::default();
        let text = "Hello world again. How are you today? I am fine, thanks!  ";
        let sentences = splitter.split(text);
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences.concat(), text);
        assert_eq!(sentences[2], "I am fine, thanks!  ");
    }

    #[test]
    fn test_split_keeps_decimals_and_runs() {
        let splitter = SentenceSplitter::default().with_min_characters(1);
        let sentences = splitter.split("Is it 3.5?! Really... Yes.");
        assert_eq!(sentences, vec!["Is it 3.5?! ", "Really... ", "Yes."]);
    }

    #[test]
    fn test_short_sentences_merge_forward() {
        let splitter = SentenceSplitter::default();
        // "Dr. " is shorter than 12 characters, so it is not a boundary.
        let sentences = splitter.split("Dr. Smith went home. He was tired.");
        assert_eq!(sentences, vec!["Dr. Smith went home. ", "He was tired."]);
    }

    #[test]
    fn test_unicode_mode() {
        let splitter = SentenceSplitter::default()
            .with_mode(SegmentationMode::Unicode)
            .with_min_characters(1);
        let sentences = splitter.split("Hello there. General Kenobi!");
        assert_eq!(sentences, vec!["Hello there. ", "General Kenobi!"]);
    }

    #[test]
    fn test_splitter_validation() {
        assert!(SentenceSplitter::new(Vec::<String>::new(), 5).is_err());
        assert!(SentenceSplitter::new([""], 5).is_err());
        assert!(SentenceSplitter::new(["\n"], 0).is_ok());
    }

    #[test]
    fn test_sentences_never_split() {
        let chunker = SentenceChunker::new(Arc::new(CharacterTokenizer), 50, 0).unwrap();
        let text = "First sentence. Second sentence. Third sentence. Fourth sentence.";
        let chunks = chunker.chunk(text);

        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert!(chunk.text.trim_end().ends_with('.'));
            assert!(chunk.token_count <= 50);
        }
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_oversized_sentence_is_whole() {
        let chunker = words(3, 0);
        let text = "Tiny one here. This sentence is far longer than three words. End of story.";
        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].text, "This sentence is far longer than three words. ");
        assert_eq!(chunks[1].token_count, 8);
    }

    #[test]
    fn test_overlap_seeds_trailing_sentences() {
        let chunker = words(6, 3);
        // 3 words each.
        let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota. Kappa lambda mu.";
        let chunks = chunker.chunk(text);

        assert_eq!(chunks.len(), 3);
        assert!(chunks[1].text.starts_with("Delta"));
        assert!(chunks[1].text.ends_with("iota. "));
        assert!(chunks[2].text.starts_with("Eta"));
        assert!(chunks[1].start_index < chunks[0].end_index);
    }

    #[test]
    fn test_min_sentences_per_chunk() {
        let chunker = words(2, 0).with_min_sentences(2).unwrap();
        let text = "One two three. Four five six. Seven eight nine.";
        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].token_count, 6);
        assert!(words(2, 0).with_min_sentences(0).is_err());
    }

    #[test]
    fn test_offsets_are_characters() {
        let chunker = words(3, 0);
        let text = "Ünïcödé sëntence hère. Nëxt sentence thére.";
        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), 2);
        let second: String = text.chars().skip(chunks[1].start_index).collect();
        assert_eq!(second, chunks[1].text);
        assert_eq!(chunks[1].end_index, text.chars().count());
    }

    #[test]
    fn test_empty_and_whitespace() {
        let chunker = words(10, 0);
        assert!(chunker.chunk("").is_empty());
        let chunks = chunker.chunk("   \n\t  ");
        assert_eq!(chunks.len(), 1);
    }
}

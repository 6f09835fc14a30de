//! Post-processing of chunks.
//!
//! Refineries never mutate their input. They return new chunks.
//!
//! - [`OverlapRefinery`] adds context from neighbouring chunks.
//! - [`EmbeddingsRefinery`] attaches an embedding to every chunk.
//!
//! ## Overlap
//!
//! ```text
//! chunks:   [ A A A A ][ B B B B ][ C C C C ]
//!
//! Prefix:   [ A A A A ][ A A B B B B ][ B B C C C C ]
//! Suffix:   [ A A A A B B ][ B B B B C C ][ C C C C ]
//! ```
//!
//! Context only comes from text outside the chunk being refined. When the
//! input chunks already overlap, the part of a neighbour that the chunk
//! repeats is skipped, so every refined chunk is still exactly its span of
//! the source. A neighbour separated from the chunk by a gap, or lying
//! entirely inside it, contributes nothing and the chunk is returned
//! unchanged.
//!
//! The context size is either a token count or a fraction of the largest
//! chunk. In [`OverlapMode::Token`] exactly that many tokens are taken. In
//! [`OverlapMode::Recursive`] the context is made of whole pieces from the
//! coarsest [`RecursiveRules`] level whose pieces fit, so it starts on a
//! sentence or word boundary instead of mid-word.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embed::embed_checked;
use crate::recursive::split_level;
use crate::{cancel, Cancellation, Chunk, EmbeddingProvider, Error, RecursiveLevel, RecursiveRules, Result, Tokenizer};

/// Where context is added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapMethod {
    /// Prepend the tail of the previous chunk.
    #[default]
    Prefix,
    /// Append the head of the next chunk.
    Suffix,
}

/// How the context boundary is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapMode {
    /// Exactly `context_size` tokens.
    #[default]
    Token,
    /// Whole pieces of the coarsest rule level that fits.
    Recursive,
}

/// Amount of context to add.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSize {
    /// A fixed number of tokens.
    Tokens(usize),
    /// A fraction of the largest chunk's token count, in `(0, 1]`.
    Fraction(f32),
}

impl Default for ContextSize {
    fn default() -> Self {
        Self::Fraction(0.25)
    }
}

/// Adds context from neighbouring chunks.
///
/// ```rust
/// use std::sync::Arc;
/// use tranche::{Chunk, ContextSize, OverlapRefinery, WordTokenizer};
///
/// let refinery = OverlapRefinery::new(Arc::new(WordTokenizer::new()), ContextSize::Tokens(2)).unwrap();
/// let chunks = vec![
///     Chunk::new("one two three ", 0, 14, 3),
///     Chunk::new("four five", 14, 23, 2),
/// ];
/// let refined = refinery.refine(&chunks);
///
/// assert_eq!(refined[0], chunks[0]);
/// assert_eq!(refined[1].text, " two three four five");
/// assert_eq!(refined[1].start_index, 3);
/// assert_eq!(refined[1].token_count, 4);
/// ```
#[derive(Debug, Clone)]
pub struct OverlapRefinery {
    tokenizer: Arc<dyn Tokenizer>,
    context_size: ContextSize,
    method: OverlapMethod,
    mode: OverlapMode,
    rules: RecursiveRules,
}

impl OverlapRefinery {
    /// Create a prefix refinery in token mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the context size is zero or a fraction outside
    /// `(0, 1]`.
    pub fn new(tokenizer: Arc<dyn Tokenizer>, context_size: ContextSize) -> Result<Self> {
        match context_size {
            ContextSize::Tokens(0) => {
                return Err(Error::parameter("context_size", "must be > 0 tokens"));
            }
            ContextSize::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(Error::parameter("context_size", format!("fraction {f} outside (0, 1]")));
            }
            _ => {}
        }
        Ok(Self {
            tokenizer,
            context_size,
            method: OverlapMethod::Prefix,
            mode: OverlapMode::Token,
            rules: RecursiveRules::default(),
        })
    }

    /// Set the overlap method.
    #[must_use]
    pub fn with_method(mut self, method: OverlapMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the overlap mode.
    #[must_use]
    pub fn with_mode(mut self, mode: OverlapMode) -> Self {
        self.mode = mode;
        self
    }

    /// Rules used in [`OverlapMode::Recursive`].
    #[must_use]
    pub fn with_rules(mut self, rules: RecursiveRules) -> Self {
        self.rules = rules;
        self
    }

    /// Return new chunks with context added. The first chunk (prefix) or
    /// the last chunk (suffix) is returned unchanged; all others get merged
    /// text, adjusted offsets, a fresh token count and no embedding.
    #[must_use]
    pub fn refine(&self, chunks: &[Chunk]) -> Vec<Chunk> {
        let context_tokens = self.context_tokens(chunks);
        if context_tokens == 0 || chunks.len() < 2 {
            return chunks.to_vec();
        }

        let refined: Vec<Chunk> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| match self.method {
                OverlapMethod::Prefix if i > 0 => {
                    self.prefixed(&chunks[i - 1], chunk, context_tokens)
                }
                OverlapMethod::Suffix if i + 1 < chunks.len() => {
                    self.suffixed(chunk, &chunks[i + 1], context_tokens)
                }
                _ => chunk.clone(),
            })
            .collect();

        debug!(
            method = ?self.method,
            mode = ?self.mode,
            context_tokens,
            chunks = refined.len(),
            "overlap refinement done"
        );
        refined
    }

    fn context_tokens(&self, chunks: &[Chunk]) -> usize {
        match self.context_size {
            ContextSize::Tokens(n) => n,
            ContextSize::Fraction(f) => {
                let largest = chunks.iter().map(|c| c.token_count).max().unwrap_or(0);
                (largest as f32 * f) as usize
            }
        }
    }

    /// `chunk` with the tail of the part of `prev` that precedes it.
    fn prefixed(&self, prev: &Chunk, chunk: &Chunk, k: usize) -> Chunk {
        if prev.end_index < chunk.start_index || prev.start_index >= chunk.start_index {
            return chunk.clone();
        }
        let before = &prev.text[..byte_at_char(&prev.text, chunk.start_index - prev.start_index)];
        let context = self.tail(before, k);
        if context.is_empty() {
            return chunk.clone();
        }
        let start = chunk.start_index - context.chars().count();
        self.rebuild(format!("{context}{}", chunk.text), start, chunk.end_index)
    }

    /// `chunk` with the head of the part of `next` that follows it.
    fn suffixed(&self, chunk: &Chunk, next: &Chunk, k: usize) -> Chunk {
        if next.start_index > chunk.end_index || next.end_index <= chunk.end_index {
            return chunk.clone();
        }
        let after = &next.text[byte_at_char(&next.text, chunk.end_index - next.start_index)..];
        let context = self.head(after, k);
        if context.is_empty() {
            return chunk.clone();
        }
        let end = chunk.end_index + context.chars().count();
        self.rebuild(format!("{}{context}", chunk.text), chunk.start_index, end)
    }

    fn rebuild(&self, text: String, start: usize, end: usize) -> Chunk {
        let tokens = self.tokenizer.count_tokens(&text);
        Chunk::new(text, start, end, tokens)
    }

    /// The last `k` tokens' worth of `text`.
    fn tail<'a>(&self, text: &'a str, k: usize) -> &'a str {
        match self.mode {
            OverlapMode::Token => self.token_tail(text, k),
            OverlapMode::Recursive => self.recursive_context(text, k, true),
        }
    }

    /// The first `k` tokens' worth of `text`.
    fn head<'a>(&self, text: &'a str, k: usize) -> &'a str {
        match self.mode {
            OverlapMode::Token => self.token_head(text, k),
            OverlapMode::Recursive => self.recursive_context(text, k, false),
        }
    }

    fn token_tail<'a>(&self, text: &'a str, k: usize) -> &'a str {
        let spans = self.tokenizer.token_spans(text);
        if spans.len() <= k {
            return text;
        }
        &text[spans[spans.len() - k].start..]
    }

    fn token_head<'a>(&self, text: &'a str, k: usize) -> &'a str {
        let spans = self.tokenizer.token_spans(text);
        if spans.len() <= k {
            return text;
        }
        &text[..spans[k].start]
    }

    /// Whole pieces from the first level where at least one piece fits,
    /// falling back to exact tokens.
    fn recursive_context<'a>(&self, text: &'a str, k: usize, from_end: bool) -> &'a str {
        if self.tokenizer.count_tokens(text) <= k {
            return text;
        }

        for level in self.rules.levels() {
            if matches!(level, RecursiveLevel::Tokens) {
                break;
            }
            let pieces = split_level(text, level);
            if pieces.len() < 2 {
                continue;
            }
            let slices: Vec<&str> = pieces.iter().map(|p| &text[p.clone()]).collect();
            let counts = self.tokenizer.count_tokens_batch(&slices);

            let mut total = 0;
            let mut taken = 0;
            let order: Box<dyn Iterator<Item = usize>> = if from_end {
                Box::new((0..pieces.len()).rev())
            } else {
                Box::new(0..pieces.len())
            };
            for i in order {
                if total + counts[i] > k {
                    break;
                }
                total += counts[i];
                taken += 1;
            }

            if taken > 0 {
                return if from_end {
                    &text[pieces[pieces.len() - taken].start..]
                } else {
                    &text[..pieces[taken - 1].end]
                };
            }
        }

        if from_end {
            self.token_tail(text, k)
        } else {
            self.token_head(text, k)
        }
    }
}

/// Byte offset of character `n` in `text`, or its length.
fn byte_at_char(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map_or(text.len(), |(i, _)| i)
}

/// Attaches embeddings to chunks.
///
/// ```rust
/// use std::sync::Arc;
/// use tranche::{Chunk, EmbeddingsRefinery, HashingEmbedder};
///
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
/// let refinery = EmbeddingsRefinery::new(Arc::new(HashingEmbedder::new(16)));
/// let chunks = vec![Chunk::new("hello world", 0, 11, 2)];
/// let embedded = refinery.refine(&chunks).await.unwrap();
///
/// assert_eq!(embedded[0].embedding.as_ref().map(Vec::len), Some(16));
/// assert!(chunks[0].embedding.is_none());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddingsRefinery {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl EmbeddingsRefinery {
    /// Create a refinery embedding 64 chunks per provider call.
    #[must_use]
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            batch_size: 64,
        }
    }

    /// Chunks per provider call.
    ///
    /// # Errors
    ///
    /// Returns an error if `batch_size == 0`.
    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::parameter("batch_size", "must be > 0"));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    /// Return copies of `chunks` with embeddings set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if an embedding call fails.
    pub async fn refine(&self, chunks: &[Chunk]) -> Result<Vec<Chunk>> {
        self.refine_with_cancellation(chunks, None).await
    }

    /// Like [`EmbeddingsRefinery::refine`], checking `cancellation` around
    /// every provider call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if an embedding call fails and
    /// [`Error::Cancelled`] if cancellation was requested.
    pub async fn refine_with_cancellation(
        &self,
        chunks: &[Chunk],
        cancellation: Option<&Cancellation>,
    ) -> Result<Vec<Chunk>> {
        let mut refined = Vec::with_capacity(chunks.len());
        for (batch, group) in chunks.chunks(self.batch_size).enumerate() {
            cancel::check(cancellation)?;
            let texts: Vec<&str> = group.iter().map(|c| c.text.as_str()).collect();
            let vectors = embed_checked(self.provider.as_ref(), &texts)
                .await
                .map_err(|e| Error::provider("embeddings", batch, e))?;
            cancel::check(cancellation)?;
            refined.extend(
                group
                    .iter()
                    .zip(vectors)
                    .map(|(chunk, vector)| chunk.clone().with_embedding(vector)),
            );
        }

        debug!(
            provider = self.provider.name(),
            chunks = refined.len(),
            "embeddings attached"
        );
        Ok(refined)
    }
}

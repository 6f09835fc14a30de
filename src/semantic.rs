//! Semantic chunking using embedding similarity.
//!
//! Splits text where topic changes, detected by drops in embedding similarity.
//!
//! ## The Idea
//!
//! Adjacent sentences about the same topic have similar embeddings.
//! When the topic changes, similarity drops. We split there.
//!
//! ```text
//! Sentences about topic A:    [S1] [S2] [S3]
//! Embeddings:                  E1   E2   E3
//! Similarities:                    0.9  0.85
//!
//! Topic shift:                            |
//! Sentences about topic B:              [S4] [S5]
//! Embeddings:                            E4   E5
//! Similarity with S3:         0.3  ← below threshold!
//!
//! Result: Chunk 1 = [S1, S2, S3], Chunk 2 = [S4, S5]
//! ```
//!
//! ## Threshold Selection
//!
//! | Threshold | Effect |
//! |-----------|--------|
//! | 0.3 | Only major topic shifts |
//! | 0.5 | Balanced (default) |
//! | 0.7 | Very sensitive, many small chunks |
//!
//! ## Passes
//!
//! 1. **Boundaries**: split where similarity drops below the threshold,
//!    once the current group has `min_sentences` sentences.
//! 2. **Skip merge** (`skip_window > 0`): a group may absorb a group up to
//!    `skip_window` positions ahead, and everything between, when their
//!    centroids are similar and the result fits the budget. One pass, so
//!    the work is bounded.
//! 3. **Re-pack**: groups over the token budget are packed again sentence
//!    by sentence.
//!
//! ## Context Windows
//!
//! With `window_size > 1`, the left side of each boundary is the embedding
//! of the last `window_size` sentences instead of a single sentence. This
//! smooths out short sentences that carry little signal on their own.
//!
//! ## Failures
//!
//! Provider errors are returned as [`Error::Provider`] with the index of
//! the failing provider batch. There is no fallback: a partially embedded
//! document is never chunked.

use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use crate::embed::{centroid, cosine_similarity, embed_checked};
use crate::offsets::CharOffsets;
use crate::recursive::merge_pieces;
use crate::{
    cancel, Cancellation, Chunk, ChunkBudget, EmbeddingProvider, Error, Result, SentenceSplitter, Tokenizer,
};

/// Semantic chunker using embedding similarity.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use tranche::{HashingEmbedder, SemanticChunker, WordTokenizer};
///
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
/// let chunker = SemanticChunker::new(
///     Arc::new(HashingEmbedder::new(256)),
///     Arc::new(WordTokenizer::new()),
///     512,
///     0.3,
/// )
/// .unwrap();
///
/// let text = "Rust has ownership rules. Rust ownership rules prevent bugs. \
///             Bread needs flour and water. Bread dough needs time.";
/// let chunks = chunker.chunk(text).await.unwrap();
///
/// assert_eq!(chunks.len(), 2);
/// assert!(chunks[1].text.starts_with("Bread"));
/// assert!(chunks[0].embedding.is_some());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct SemanticChunker {
    provider: Arc<dyn EmbeddingProvider>,
    tokenizer: Arc<dyn Tokenizer>,
    budget: ChunkBudget,
    splitter: SentenceSplitter,
    threshold: f32,
    window_size: usize,
    min_sentences: usize,
    skip_window: usize,
    batch_size: usize,
}

impl SemanticChunker {
    /// Default similarity threshold.
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    /// Default number of texts per provider call.
    pub const DEFAULT_BATCH_SIZE: usize = 64;

    /// Create a new semantic chunker.
    ///
    /// # Arguments
    ///
    /// * `provider` - Embeds sentences
    /// * `tokenizer` - Counts tokens for the budget
    /// * `chunk_size` - Maximum tokens per chunk
    /// * `threshold` - Similarity below which a boundary is placed (0.0 to 1.0)
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size == 0` or `threshold` is outside `[0, 1]`.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        tokenizer: Arc<dyn Tokenizer>,
        chunk_size: usize,
        threshold: f32,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidThreshold(threshold));
        }
        Ok(Self {
            provider,
            tokenizer,
            budget: ChunkBudget::no_overlap(chunk_size)?,
            splitter: SentenceSplitter::default(),
            threshold,
            window_size: 1,
            min_sentences: 1,
            skip_window: 0,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        })
    }

    /// Use a custom sentence splitter.
    #[must_use]
    pub fn with_splitter(mut self, splitter: SentenceSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    /// Compare each sentence against the last `window_size` sentences.
    ///
    /// # Errors
    ///
    /// Returns an error if `window_size == 0`.
    pub fn with_window_size(mut self, window_size: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(Error::parameter("window_size", "must be > 0"));
        }
        self.window_size = window_size;
        Ok(self)
    }

    /// Set the minimum sentences per chunk.
    ///
    /// Prevents over-fragmentation by requiring at least N sentences before
    /// a boundary is honoured.
    ///
    /// # Errors
    ///
    /// Returns an error if `min == 0`.
    pub fn with_min_sentences(mut self, min: usize) -> Result<Self> {
        if min == 0 {
            return Err(Error::parameter("min_sentences", "must be > 0"));
        }
        self.min_sentences = min;
        Ok(self)
    }

    /// Allow merging groups up to `skip_window` positions apart. Zero
    /// disables the pass.
    #[must_use]
    pub fn with_skip_window(mut self, skip_window: usize) -> Self {
        self.skip_window = skip_window;
        self
    }

    /// Texts per provider call.
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

    /// Chunker name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        "semantic"
    }

    /// The similarity threshold.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Chunk `text`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if an embedding call fails.
    pub async fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        self.chunk_with_cancellation(text, None).await
    }

    /// Chunk `text`, checking `cancellation` before and after every provider
    /// call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] if an embedding call fails and
    /// [`Error::Cancelled`] if cancellation was requested.
    pub async fn chunk_with_cancellation(
        &self,
        text: &str,
        cancellation: Option<&Cancellation>,
    ) -> Result<Vec<Chunk>> {
        cancel::check(cancellation)?;
        if text.is_empty() {
            return Ok(vec![]);
        }

        let spans = self.splitter.sentence_spans(text);
        let sentences: Vec<&str> = spans.iter().map(|s| &text[s.clone()]).collect();
        let counts = self.tokenizer.count_tokens_batch(&sentences);

        let inputs = self.embedding_inputs(text, &spans);
        let embeddings = self.embed_all(&inputs, cancellation).await?;
        let (sentence_embeddings, window_embeddings) = embeddings.split_at(spans.len());

        let similarities: Vec<f32> = (1..spans.len())
            .map(|i| {
                let left = if self.window_size > 1 && i > 1 {
                    &window_embeddings[i - 2]
                } else {
                    &sentence_embeddings[i - 1]
                };
                cosine_similarity(left, &sentence_embeddings[i])
            })
            .collect();

        let groups = self.boundary_groups(&similarities, spans.len());
        let groups = self.skip_merge(groups, sentence_embeddings, &counts);
        let groups = self.repack(groups, &counts);

        let mut offsets = CharOffsets::new(text);
        let chunks: Vec<Chunk> = groups
            .into_iter()
            .map(|group| {
                let bytes = spans[group.start].start..spans[group.end - 1].end;
                let char_span = offsets.char_span(bytes.clone());
                let tokens = counts[group.clone()].iter().sum();
                Chunk::new(&text[bytes], char_span.start, char_span.end, tokens)
                    .with_embedding(centroid(&sentence_embeddings[group]))
            })
            .collect();

        debug!(
            provider = self.provider.name(),
            sentences = spans.len(),
            chunks = chunks.len(),
            "semantic chunking done"
        );
        Ok(chunks)
    }

    /// Chunk several texts in order.
    ///
    /// # Errors
    ///
    /// Fails on the first text that fails; see [`SemanticChunker::chunk_with_cancellation`].
    pub async fn chunk_batch(
        &self,
        texts: &[&str],
        cancellation: Option<&Cancellation>,
    ) -> Result<Vec<Vec<Chunk>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.chunk_with_cancellation(text, cancellation).await?);
        }
        Ok(results)
    }

    /// Sentences, followed by the left context windows for boundaries 2..n
    /// when `window_size > 1`.
    fn embedding_inputs<'a>(&self, text: &'a str, spans: &[Range<usize>]) -> Vec<&'a str> {
        let mut inputs: Vec<&str> = spans.iter().map(|s| &text[s.clone()]).collect();
        if self.window_size > 1 {
            for end in 1..spans.len().saturating_sub(1) {
                let first = (end + 1).saturating_sub(self.window_size);
                inputs.push(&text[spans[first].start..spans[end].end]);
            }
        }
        inputs
    }

    async fn embed_all(&self, inputs: &[&str], cancellation: Option<&Cancellation>) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(inputs.len());
        for (batch, texts) in inputs.chunks(self.batch_size).enumerate() {
            cancel::check(cancellation)?;
            let vectors = embed_checked(self.provider.as_ref(), texts)
                .await
                .map_err(|e| Error::provider("semantic", batch, e))?;
            cancel::check(cancellation)?;
            embeddings.extend(vectors);
        }
        Ok(embeddings)
    }

    /// Close a group wherever similarity drops below the threshold.
    fn boundary_groups(&self, similarities: &[f32], n: usize) -> Vec<Range<usize>> {
        let mut groups = Vec::new();
        let mut start = 0;
        for i in 1..n {
            if similarities[i - 1] < self.threshold && i - start >= self.min_sentences {
                groups.push(start..i);
                start = i;
            }
        }
        if start < n {
            groups.push(start..n);
        }
        groups
    }

    fn skip_merge(
        &self,
        groups: Vec<Range<usize>>,
        embeddings: &[Vec<f32>],
        counts: &[usize],
    ) -> Vec<Range<usize>> {
        if self.skip_window == 0 || groups.len() < 3 {
            return groups;
        }

        let tokens = |r: Range<usize>| counts[r].iter().sum::<usize>();
        let mut merged = Vec::with_capacity(groups.len());
        let mut i = 0;
        while i < groups.len() {
            let current = groups[i].clone();
            let here = centroid(&embeddings[current.clone()]);
            let last = (i + 1 + self.skip_window).min(groups.len() - 1);
            let target = (i + 2..=last).find(|&j| {
                let there = centroid(&embeddings[groups[j].clone()]);
                cosine_similarity(&here, &there) >= self.threshold
                    && self.budget.fits(tokens(current.start..groups[j].end))
            });
            match target {
                Some(j) => {
                    merged.push(current.start..groups[j].end);
                    i = j + 1;
                }
                None => {
                    merged.push(current);
                    i += 1;
                }
            }
        }
        merged
    }

    /// Split groups over budget by packing their sentences greedily.
    fn repack(&self, groups: Vec<Range<usize>>, counts: &[usize]) -> Vec<Range<usize>> {
        let mut packed = Vec::with_capacity(groups.len());
        for group in groups {
            let sentence_counts = &counts[group.clone()];
            if self.budget.fits(sentence_counts.iter().sum()) {
                packed.push(group);
                continue;
            }
            for sub in merge_pieces(sentence_counts, self.budget) {
                packed.push(group.start + sub.start..group.start + sub.end);
            }
        }
        packed
    }
}

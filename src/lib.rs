//! # tranche
//!
//! Token-budgeted text chunking for retrieval-augmented generation (RAG)
//! pipelines.
//!
//! ## The Problem
//!
//! Language models have context windows, and embedding models have input
//! limits measured in tokens. Documents don't fit. You need to split them
//! into pieces ("chunks") small enough to embed and retrieve, but large
//! enough to preserve meaning.
//!
//! Counting characters is not enough: the limit is in tokens, and what a
//! token is depends on the model. Every chunker here takes a [`Tokenizer`]
//! and guarantees `chunk.token_count <= chunk_size`, except for a single
//! unit it is not allowed to split (one sentence, one grapheme).
//!
//! ## Chunking Strategies
//!
//! ### Token Windows (Baseline)
//!
//! Encode once, cut every N tokens with M tokens of overlap.
//!
//! ```text
//! size = 4, overlap = 1
//!
//! Tokens:  t0 t1 t2 t3 t4 t5 t6 t7 t8
//! Chunk 0: [t0 t1 t2 t3]
//! Chunk 1:          [t3 t4 t5 t6]
//! Chunk 2:                   [t6 t7 t8]
//! ```
//!
//! **When to use**: Homogeneous content, baseline comparisons.
//! **Weakness**: Ignores linguistic boundaries.
//!
//! ### Sentence-Based
//!
//! Split into sentences, then pack whole sentences up to the budget.
//! Overlap is filled with whole trailing sentences.
//!
//! **When to use**: Prose, articles, documentation.
//! **Weakness**: Very long sentences become oversized chunks.
//!
//! ### Recursive
//!
//! Try paragraph breaks first. Pieces still over budget are split on lines,
//! then sentences, then pauses, then whitespace. Last resort: token windows.
//!
//! **When to use**: General-purpose, mixed content. Markdown has a preset.
//! **Weakness**: The delimiter hierarchy is heuristic, not semantic.
//!
//! ### Fast
//!
//! Character windows that snap back to whitespace. No tokenizer in the hot
//! path; grapheme clusters are never split.
//!
//! **When to use**: Huge inputs where throughput matters most.
//!
//! ### Semantic (Embedding-Based)
//!
//! Embed each sentence, split where similarity between neighbours drops
//! below a threshold.
//!
//! ```text
//! Similarities: [0.9, 0.8, 0.3, 0.85, 0.7]
//!                          ↑
//!                     Topic shift!
//! ```
//!
//! **When to use**: When topic coherence matters more than size uniformity.
//! **Weakness**: Requires an embedding provider; async; slower.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tranche::{Chunker, RecursiveChunker, SentenceChunker, TokenChunker, WordTokenizer};
//!
//! let tokenizer = Arc::new(WordTokenizer::new());
//! let text = "The quick brown fox jumps over the lazy dog. \
//!             Pack my box with five dozen liquor jugs.";
//!
//! // Token windows
//! let chunker = TokenChunker::new(tokenizer.clone(), 8, 2).unwrap();
//! let chunks = chunker.chunk(text);
//! assert!(chunks.iter().all(|c| c.token_count <= 8));
//!
//! // Whole sentences
//! let chunker = SentenceChunker::new(tokenizer.clone(), 10, 0).unwrap();
//! let chunks = chunker.chunk(text);
//! assert_eq!(chunks.len(), 2);
//!
//! // Hierarchical
//! let chunker = RecursiveChunker::new(tokenizer, 100).unwrap();
//! let chunks = chunker.chunk(text);
//! assert_eq!(chunks.len(), 1);
//! ```
//!
//! ## Offsets
//!
//! `start_index` and `end_index` are character (Unicode scalar) offsets
//! into the source, so `text.chars().skip(start).take(end - start)` gives
//! back the chunk text, multi-byte input included.
//!
//! ## Performance Considerations
//!
//! | Strategy | Speed | Quality | Memory |
//! |----------|-------|---------|--------|
//! | Fast | O(n) | Low | O(n) |
//! | Token | O(n) | Low | O(n) |
//! | Sentence | O(n) | Medium | O(n) |
//! | Recursive | O(n × levels) | Medium | O(n) |
//! | Semantic | O(n × d) | High | O(n × d) |
//!
//! Where n = document length, d = embedding dimension.
//!
//! Batches of documents run in parallel on rayon with the default
//! `parallel` feature; see [`Chunker::chunk_batch`].

mod batch;
mod budget;
mod cancel;
mod chunk;
mod config;
mod embed;
mod error;
mod fast;
mod generate;
mod offsets;
mod recursive;
mod refinery;
mod semantic;
mod sentence;
mod token;
mod tokenizer;

pub use batch::BatchOptions;
pub use budget::ChunkBudget;
pub use cancel::Cancellation;
pub use chunk::{Chunk, Document};
pub use config::{
    tokenizer_from_name, AnyChunker, ChunkerConfig, ChunkerKind, FastConfig, RecursiveConfig, SemanticConfig,
    SentenceConfig, TokenConfig, TokenizerConfig,
};
pub use embed::{centroid, cosine_similarity, EmbeddingProvider, HashingEmbedder};
#[cfg(feature = "fastembed")]
pub use embed::FastembedProvider;
pub use error::{Error, ErrorKind, ProviderError, Result};
pub use fast::FastChunker;
pub use generate::{extract_split_index, GenerationProvider, SplitOracle};
pub use recursive::{IncludeDelim, RecursiveChunker, RecursiveLevel, RecursiveRules};
pub use refinery::{ContextSize, EmbeddingsRefinery, OverlapMethod, OverlapMode, OverlapRefinery};
pub use semantic::SemanticChunker;
pub use sentence::{SegmentationMode, SentenceChunker, SentenceSplitter};
pub use token::TokenChunker;
pub use tokenizer::{CharacterTokenizer, TokenId, Tokenizer, VocabularyTokenizer, WordTokenizer};

/// A synchronous text chunking strategy.
///
/// All CPU-bound chunkers implement this trait, enabling polymorphic usage:
///
/// ```rust
/// use std::sync::Arc;
/// use tranche::{CharacterTokenizer, Chunk, Chunker, FastChunker, TokenChunker};
///
/// fn chunk_with(chunker: &dyn Chunker, text: &str) -> Vec<Chunk> {
///     chunker.chunk(text)
/// }
///
/// let token = TokenChunker::new(Arc::new(CharacterTokenizer), 100, 20).unwrap();
/// let fast = FastChunker::new(100, 0).unwrap();
///
/// let text = "Hello world. This is a test.";
/// assert_eq!(chunk_with(&token, text).len(), 1);
/// assert_eq!(chunk_with(&fast, text).len(), 1);
/// ```
///
/// The [`SemanticChunker`] needs an embedding provider and is async, so it
/// has its own inherent methods instead.
pub trait Chunker: Send + Sync {
    /// Short name of the strategy, for logs.
    fn name(&self) -> &'static str;

    /// Split text into chunks.
    ///
    /// Chunks come back in source order with character offsets into
    /// `text`. Empty text gives no chunks.
    fn chunk(&self, text: &str) -> Vec<Chunk>;

    /// Chunk several texts. Results are in input order whether or not
    /// `parallel` is set.
    fn chunk_batch(&self, texts: &[&str], parallel: bool) -> Vec<Vec<Chunk>> {
        batch::chunk_all(self, texts, parallel)
    }

    /// Chunk several texts with explicit [`BatchOptions`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the options' cancellation flag is set
    /// before a text is started, and [`Error::InvalidParameter`] if a
    /// dedicated thread pool cannot be built.
    fn chunk_batch_with(&self, texts: &[&str], options: &BatchOptions) -> Result<Vec<Vec<Chunk>>> {
        batch::chunk_batch(self, texts, options)
    }

    /// Chunk a document's content into its `chunks`. The content is
    /// returned unchanged.
    fn chunk_document(&self, document: Document) -> Document {
        let chunks = self.chunk(&document.content);
        Document { chunks, ..document }
    }

    /// Estimate the number of chunks for a given text length in bytes.
    ///
    /// Useful for pre-allocation. May be approximate.
    fn estimate_chunks(&self, text_len: usize) -> usize {
        // Conservative default
        (text_len / 500).max(1)
    }
}

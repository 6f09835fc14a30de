//! Declarative chunker configuration.
//!
//! [`ChunkerConfig`] is a closed, serde-friendly description of a chunker.
//! [`ChunkerConfig::build`] validates it and returns an [`AnyChunker`]:
//!
//! ```rust
//! use tranche::{ChunkerConfig, ChunkerKind};
//!
//! let config: ChunkerConfig = serde_json::from_str(
//!     r#"{"chunker": "token", "tokenizer": {"type": "word"}, "chunk_size": 64, "chunk_overlap": 8}"#,
//! )
//! .unwrap();
//! assert_eq!(config.kind(), ChunkerKind::Token);
//!
//! let chunker = config.build(None).unwrap();
//! assert_eq!(chunker.name(), "token");
//! ```
//!
//! Sizes are signed so that a negative value from a config file is reported
//! as a configuration error instead of failing deserialization.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    BatchOptions, CharacterTokenizer, Chunk, Chunker, EmbeddingProvider, Error, FastChunker, RecursiveChunker,
    RecursiveRules, Result, SegmentationMode, SemanticChunker, SentenceChunker, SentenceSplitter, TokenChunker,
    Tokenizer, VocabularyTokenizer, WordTokenizer,
};

const DEFAULT_CHUNK_SIZE: i64 = 2048;

fn default_chunk_size() -> i64 {
    DEFAULT_CHUNK_SIZE
}

fn default_fast_chunk_size() -> i64 {
    FastChunker::DEFAULT_CHUNK_SIZE as i64
}

fn default_min_characters_per_sentence() -> usize {
    SentenceSplitter::DEFAULT_MIN_CHARACTERS
}

fn default_min_characters_per_chunk() -> usize {
    RecursiveChunker::DEFAULT_MIN_CHARACTERS
}

fn default_threshold() -> f32 {
    SemanticChunker::DEFAULT_THRESHOLD
}

fn default_batch_size() -> usize {
    SemanticChunker::DEFAULT_BATCH_SIZE
}

fn one() -> usize {
    1
}

/// Convert a signed size from configuration.
fn non_negative(name: &'static str, value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::parameter(name, format!("{value} is negative")))
}

/// Which tokenizer a chunker counts with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenizerConfig {
    /// One token per character.
    #[default]
    Character,
    /// One token per whitespace-separated word.
    Word,
    /// Fixed vocabulary with an unknown token.
    Vocabulary {
        /// Known words.
        words: Vec<String>,
        /// Unknown-token string, `[UNK]` when absent.
        #[serde(default)]
        unknown_token: Option<String>,
    },
}

impl TokenizerConfig {
    /// Build the tokenizer.
    ///
    /// # Errors
    ///
    /// Returns an error if a vocabulary is invalid.
    pub fn build(&self) -> Result<Arc<dyn Tokenizer>> {
        Ok(match self {
            Self::Character => Arc::new(CharacterTokenizer),
            Self::Word => Arc::new(WordTokenizer::new()),
            Self::Vocabulary {
                words,
                unknown_token: None,
            } => Arc::new(VocabularyTokenizer::new(words)?),
            Self::Vocabulary {
                words,
                unknown_token: Some(unknown),
            } => Arc::new(VocabularyTokenizer::with_unknown_token(words, unknown)?),
        })
    }
}

impl FromStr for TokenizerConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "character" | "char" | "chars" => Ok(Self::Character),
            "word" | "words" => Ok(Self::Word),
            _ => Err(Error::UnknownTokenizer(s.to_string())),
        }
    }
}

/// Build a tokenizer from its name: `"character"` or `"word"`.
///
/// # Errors
///
/// Returns [`Error::UnknownTokenizer`] for any other name.
pub fn tokenizer_from_name(name: &str) -> Result<Arc<dyn Tokenizer>> {
    name.parse::<TokenizerConfig>()?.build()
}

/// The chunker variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkerKind {
    /// [`TokenChunker`].
    Token,
    /// [`SentenceChunker`].
    Sentence,
    /// [`RecursiveChunker`].
    Recursive,
    /// [`FastChunker`].
    Fast,
    /// [`SemanticChunker`].
    Semantic,
}

impl ChunkerKind {
    /// All variants.
    pub const ALL: [Self; 5] = [Self::Token, Self::Sentence, Self::Recursive, Self::Fast, Self::Semantic];

    /// The canonical name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Sentence => "sentence",
            Self::Recursive => "recursive",
            Self::Fast => "fast",
            Self::Semantic => "semantic",
        }
    }
}

impl fmt::Display for ChunkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| Error::UnknownChunker(s.to_string()))
    }
}

/// [`TokenChunker`] settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Tokenizer.
    pub tokenizer: TokenizerConfig,
    /// Maximum tokens per chunk.
    pub chunk_size: i64,
    /// Tokens shared by adjacent chunks.
    pub chunk_overlap: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            tokenizer: TokenizerConfig::default(),
            chunk_size: default_chunk_size(),
            chunk_overlap: 0,
        }
    }
}

/// [`SentenceChunker`] settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentenceConfig {
    /// Tokenizer.
    pub tokenizer: TokenizerConfig,
    /// Maximum tokens per chunk.
    pub chunk_size: i64,
    /// Overlap budget in tokens, filled with whole sentences.
    pub chunk_overlap: i64,
    /// Shorter sentences are merged into the next one.
    pub min_characters_per_sentence: usize,
    /// Minimum sentences per chunk.
    pub min_sentences_per_chunk: usize,
    /// Sentence delimiters; the defaults when absent.
    pub delimiters: Option<Vec<String>>,
    /// Segmentation mode.
    pub mode: SegmentationMode,
}

impl Default for SentenceConfig {
    fn default() -> Self {
        Self {
            tokenizer: TokenizerConfig::default(),
            chunk_size: default_chunk_size(),
            chunk_overlap: 0,
            min_characters_per_sentence: default_min_characters_per_sentence(),
            min_sentences_per_chunk: one(),
            delimiters: None,
            mode: SegmentationMode::default(),
        }
    }
}

impl SentenceConfig {
    fn splitter(&self) -> Result<SentenceSplitter> {
        let splitter = match &self.delimiters {
            Some(delimiters) => SentenceSplitter::new(delimiters.iter().cloned(), self.min_characters_per_sentence)?,
            None => SentenceSplitter::default().with_min_characters(self.min_characters_per_sentence),
        };
        Ok(splitter.with_mode(self.mode))
    }
}

/// [`RecursiveChunker`] settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecursiveConfig {
    /// Tokenizer.
    pub tokenizer: TokenizerConfig,
    /// Maximum tokens per chunk.
    pub chunk_size: i64,
    /// Split hierarchy; the default rules when absent.
    pub rules: Option<RecursiveRules>,
    /// Shorter delimiter-level pieces are folded into the next one.
    pub min_characters_per_chunk: usize,
}

impl Default for RecursiveConfig {
    fn default() -> Self {
        Self {
            tokenizer: TokenizerConfig::default(),
            chunk_size: default_chunk_size(),
            rules: None,
            min_characters_per_chunk: default_min_characters_per_chunk(),
        }
    }
}

/// [`FastChunker`] settings. Sizes are in characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastConfig {
    /// Maximum characters per chunk.
    pub chunk_size: i64,
    /// Characters shared by adjacent chunks.
    pub chunk_overlap: i64,
}

impl Default for FastConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_fast_chunk_size(),
            chunk_overlap: 0,
        }
    }
}

/// [`SemanticChunker`] settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// Tokenizer.
    pub tokenizer: TokenizerConfig,
    /// Maximum tokens per chunk.
    pub chunk_size: i64,
    /// Similarity below which a boundary is placed.
    pub threshold: f32,
    /// Sentences in the left context window.
    pub window_size: usize,
    /// Minimum sentences per chunk.
    pub min_sentences: usize,
    /// How far ahead the skip-merge pass looks; 0 disables it.
    pub skip_window: usize,
    /// Texts per provider call.
    pub batch_size: usize,
    /// Shorter sentences are merged into the next one.
    pub min_characters_per_sentence: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            tokenizer: TokenizerConfig::default(),
            chunk_size: default_chunk_size(),
            threshold: default_threshold(),
            window_size: one(),
            min_sentences: one(),
            skip_window: 0,
            batch_size: default_batch_size(),
            min_characters_per_sentence: default_min_characters_per_sentence(),
        }
    }
}

/// A chunker description, tagged by `"chunker"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "chunker", rename_all = "snake_case")]
pub enum ChunkerConfig {
    /// Token windows.
    Token(TokenConfig),
    /// Sentence packing.
    Sentence(SentenceConfig),
    /// Hierarchical splitting.
    Recursive(RecursiveConfig),
    /// Character windows.
    Fast(FastConfig),
    /// Embedding similarity.
    Semantic(SemanticConfig),
}

impl ChunkerConfig {
    /// The default configuration for `kind`.
    #[must_use]
    pub fn default_for(kind: ChunkerKind) -> Self {
        match kind {
            ChunkerKind::Token => Self::Token(TokenConfig::default()),
            ChunkerKind::Sentence => Self::Sentence(SentenceConfig::default()),
            ChunkerKind::Recursive => Self::Recursive(RecursiveConfig::default()),
            ChunkerKind::Fast => Self::Fast(FastConfig::default()),
            ChunkerKind::Semantic => Self::Semantic(SemanticConfig::default()),
        }
    }

    /// Which chunker this describes.
    #[must_use]
    pub fn kind(&self) -> ChunkerKind {
        match self {
            Self::Token(_) => ChunkerKind::Token,
            Self::Sentence(_) => ChunkerKind::Sentence,
            Self::Recursive(_) => ChunkerKind::Recursive,
            Self::Fast(_) => ChunkerKind::Fast,
            Self::Semantic(_) => ChunkerKind::Semantic,
        }
    }

    /// Validate and build the chunker. `provider` is required for
    /// [`ChunkerKind::Semantic`] and ignored otherwise.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid parameters and
    /// [`Error::MissingProvider`] when a semantic chunker has no provider.
    pub fn build(&self, provider: Option<Arc<dyn EmbeddingProvider>>) -> Result<AnyChunker> {
        Ok(match self {
            Self::Token(c) => AnyChunker::Token(TokenChunker::new(
                c.tokenizer.build()?,
                non_negative("chunk_size", c.chunk_size)?,
                non_negative("chunk_overlap", c.chunk_overlap)?,
            )?),
            Self::Sentence(c) => AnyChunker::Sentence(
                SentenceChunker::new(
                    c.tokenizer.build()?,
                    non_negative("chunk_size", c.chunk_size)?,
                    non_negative("chunk_overlap", c.chunk_overlap)?,
                )?
                .with_splitter(c.splitter()?)
                .with_min_sentences(c.min_sentences_per_chunk)?,
            ),
            Self::Recursive(c) => AnyChunker::Recursive(
                RecursiveChunker::new(c.tokenizer.build()?, non_negative("chunk_size", c.chunk_size)?)?
                    .with_rules(c.rules.clone().unwrap_or_default())
                    .with_min_characters_per_chunk(c.min_characters_per_chunk),
            ),
            Self::Fast(c) => AnyChunker::Fast(FastChunker::new(
                non_negative("chunk_size", c.chunk_size)?,
                non_negative("chunk_overlap", c.chunk_overlap)?,
            )?),
            Self::Semantic(c) => {
                let provider = provider.ok_or(Error::MissingProvider("semantic"))?;
                AnyChunker::Semantic(
                    SemanticChunker::new(
                        provider,
                        c.tokenizer.build()?,
                        non_negative("chunk_size", c.chunk_size)?,
                        c.threshold,
                    )?
                    .with_splitter(SentenceSplitter::default().with_min_characters(c.min_characters_per_sentence))
                    .with_window_size(c.window_size)?
                    .with_min_sentences(c.min_sentences)?
                    .with_skip_window(c.skip_window)
                    .with_batch_size(c.batch_size)?,
                )
            }
        })
    }
}

/// Any chunker, built from a [`ChunkerConfig`].
///
/// The synchronous chunkers are reachable through [`AnyChunker::as_sync`];
/// [`AnyChunker::chunk`] works for every variant.
#[derive(Debug, Clone)]
pub enum AnyChunker {
    /// Token windows.
    Token(TokenChunker),
    /// Sentence packing.
    Sentence(SentenceChunker),
    /// Hierarchical splitting.
    Recursive(RecursiveChunker),
    /// Character windows.
    Fast(FastChunker),
    /// Embedding similarity.
    Semantic(SemanticChunker),
}

impl AnyChunker {
    /// Which chunker this is.
    #[must_use]
    pub fn kind(&self) -> ChunkerKind {
        match self {
            Self::Token(_) => ChunkerKind::Token,
            Self::Sentence(_) => ChunkerKind::Sentence,
            Self::Recursive(_) => ChunkerKind::Recursive,
            Self::Fast(_) => ChunkerKind::Fast,
            Self::Semantic(_) => ChunkerKind::Semantic,
        }
    }

    /// Chunker name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.as_sync() {
            Some(chunker) => chunker.name(),
            None => "semantic",
        }
    }

    /// The chunker as a synchronous [`Chunker`]; `None` for semantic.
    #[must_use]
    pub fn as_sync(&self) -> Option<&dyn Chunker> {
        match self {
            Self::Token(c) => Some(c),
            Self::Sentence(c) => Some(c),
            Self::Recursive(c) => Some(c),
            Self::Fast(c) => Some(c),
            Self::Semantic(_) => None,
        }
    }

    /// Chunk `text`.
    ///
    /// # Errors
    ///
    /// Only the semantic chunker fails, on provider errors.
    pub async fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        match self {
            Self::Semantic(c) => c.chunk(text).await,
            _ => Ok(self.as_sync().map(|c| c.chunk(text)).unwrap_or_default()),
        }
    }

    /// Chunk several texts, results in input order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] on cancellation and, for the semantic
    /// chunker, [`Error::Provider`] on provider errors.
    pub async fn chunk_batch(&self, texts: &[&str], options: &BatchOptions) -> Result<Vec<Vec<Chunk>>> {
        match (self, self.as_sync()) {
            (_, Some(chunker)) => chunker.chunk_batch_with(texts, options),
            (Self::Semantic(c), None) => c.chunk_batch(texts, options.cancellation.as_ref()).await,
            (_, None) => Ok(vec![]),
        }
    }
}

impl From<TokenChunker> for AnyChunker {
    fn from(chunker: TokenChunker) -> Self {
        Self::Token(chunker)
    }
}

impl From<SentenceChunker> for AnyChunker {
    fn from(chunker: SentenceChunker) -> Self {
        Self::Sentence(chunker)
    }
}

impl From<RecursiveChunker> for AnyChunker {
    fn from(chunker: RecursiveChunker) -> Self {
        Self::Recursive(chunker)
    }
}

impl From<FastChunker> for AnyChunker {
    fn from(chunker: FastChunker) -> Self {
        Self::Fast(chunker)
    }
}

impl From<SemanticChunker> for AnyChunker {
    fn from(chunker: SemanticChunker) -> Self {
        Self::Semantic(chunker)
    }
}

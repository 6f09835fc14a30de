//! Tokenizers: the unit every chunk budget is measured in.
//!
//! ## The Contract
//!
//! A [`Tokenizer`] turns text into token ids and back, and reports where in
//! the text each token came from:
//!
//! ```text
//! "Hello big world"
//!
//! CharacterTokenizer: H e l l o ␠ b i g ␠ w o r l d      15 tokens
//! WordTokenizer:      "Hello" " big" " world"              3 tokens
//! ```
//!
//! Byte offsets matter more than ids for chunking: they let
//! [`TokenChunker`](crate::TokenChunker) map a window of tokens back to an
//! exact slice of the source, multi-byte characters included. Chunkers and
//! refineries only ask for [`Tokenizer::token_spans`] and
//! [`Tokenizer::count_tokens`], never for ids.
//!
//! ## Round-Trip Fidelity
//!
//! `decode(encode(text)) == text` holds for [`CharacterTokenizer`] and
//! [`WordTokenizer`]. [`VocabularyTokenizer`] maps unknown words to a
//! single unknown token and normalizes whitespace, so it does not
//! round-trip; [`Tokenizer::round_trips`] reports this.
//!
//! All tokenizers here are safe to share across threads.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{PoisonError, RwLock};

use crate::{Error, Result};

/// Identifier of a single token.
pub type TokenId = u32;

/// Converts text to tokens and back.
pub trait Tokenizer: Send + Sync {
    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;

    /// Split `text` into tokens with their byte ranges in `text`.
    ///
    /// Ranges are in increasing order and never overlap. They do not have to
    /// cover the whole text (a tokenizer may drop whitespace).
    fn tokenize(&self, text: &str) -> Vec<(TokenId, Range<usize>)>;

    /// Byte ranges of the tokens in `text`, without assigning ids.
    ///
    /// Same ranges as [`Tokenizer::tokenize`]. Tokenizers with a growing
    /// vocabulary override this so that offset-only callers leave it alone.
    fn token_spans(&self, text: &str) -> Vec<Range<usize>> {
        self.tokenize(text).into_iter().map(|(_, span)| span).collect()
    }

    /// Decode a sequence of token ids back to text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for ids the tokenizer never produced.
    fn decode(&self, tokens: &[TokenId]) -> Result<String>;

    /// Encode `text` to token ids.
    fn encode(&self, text: &str) -> Vec<TokenId> {
        self.tokenize(text).into_iter().map(|(id, _)| id).collect()
    }

    /// Number of tokens in `text`. Zero for the empty string.
    fn count_tokens(&self, text: &str) -> usize {
        self.tokenize(text).len()
    }

    /// Token counts for several texts, in input order.
    fn count_tokens_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|text| self.count_tokens(text)).collect()
    }

    /// Whether `decode(encode(text)) == text` for every input.
    fn round_trips(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for dyn Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("name", &self.name())
            .finish()
    }
}

// =============================================================================
// Character
// =============================================================================

/// One token per Unicode scalar value; the id is the scalar value itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharacterTokenizer;

impl Tokenizer for CharacterTokenizer {
    fn name(&self) -> &'static str {
        "character"
    }

    fn tokenize(&self, text: &str) -> Vec<(TokenId, Range<usize>)> {
        text.char_indices()
            .map(|(i, c)| (u32::from(c), i..i + c.len_utf8()))
            .collect()
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String> {
        tokens
            .iter()
            .map(|&id| {
                char::from_u32(id)
                    .ok_or_else(|| Error::InvalidInput(format!("not a character token: {id}")))
            })
            .collect()
    }

    fn token_spans(&self, text: &str) -> Vec<Range<usize>> {
        text.char_indices().map(|(i, c)| i..i + c.len_utf8()).collect()
    }

    fn encode(&self, text: &str) -> Vec<TokenId> {
        text.chars().map(u32::from).collect()
    }

    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count()
    }
}

// =============================================================================
// Word
// =============================================================================

/// Byte ranges of the maximal non-whitespace runs in `text`.
fn word_runs(text: &str) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                runs.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(s..text.len());
    }

    runs
}

/// Token spans of the word tokenizer: each word carries the whitespace in
/// front of it, the last word also the whitespace after it.
fn word_spans(text: &str) -> Vec<Range<usize>> {
    if text.is_empty() {
        return vec![];
    }

    let runs = word_runs(text);
    if runs.is_empty() {
        // Whitespace only: a single token.
        return vec![0..text.len()];
    }

    let last = runs.len() - 1;
    let mut spans = Vec::with_capacity(runs.len());
    let mut start = 0;
    for (i, run) in runs.iter().enumerate() {
        let end = if i == last { text.len() } else { run.end };
        spans.push(start..end);
        start = end;
    }
    spans
}

#[derive(Debug, Default)]
struct Vocabulary {
    ids: HashMap<String, TokenId>,
    tokens: Vec<String>,
}

impl Vocabulary {
    fn intern(&mut self, token: &str) -> TokenId {
        if let Some(&id) = self.ids.get(token) {
            return id;
        }
        let id = self.tokens.len() as TokenId;
        self.tokens.push(token.to_string());
        self.ids.insert(token.to_string(), id);
        id
    }
}

/// Whitespace-delimited words; each token keeps its leading whitespace.
///
/// Ids are interned on first sight by [`Tokenizer::tokenize`] and
/// [`Tokenizer::encode`], so the vocabulary holds at most one entry per
/// distinct token passed to those two calls. Chunking goes through
/// [`Tokenizer::token_spans`] and [`Tokenizer::count_tokens`], which never
/// intern: a tokenizer shared by long-lived chunkers does not grow with the
/// documents it measures, and counting takes no lock. Use
/// [`WordTokenizer::clear_vocabulary`] to drop ids that are no longer
/// needed.
///
/// ```rust
/// use tranche::{Tokenizer, WordTokenizer};
///
/// let tokenizer = WordTokenizer::new();
/// let text = "  Hello  big world ";
/// assert_eq!(tokenizer.count_tokens(text), 3);
///
/// let ids = tokenizer.encode(text);
/// assert_eq!(tokenizer.decode(&ids).unwrap(), text);
/// ```
#[derive(Debug, Default)]
pub struct WordTokenizer {
    vocab: RwLock<Vocabulary>,
}

impl WordTokenizer {
    /// Create a tokenizer with an empty vocabulary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct tokens seen so far.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.vocab
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tokens
            .len()
    }

    /// Forget every interned token. Ids handed out before are no longer
    /// decodable.
    pub fn clear_vocabulary(&self) {
        let mut vocab = self.vocab.write().unwrap_or_else(PoisonError::into_inner);
        vocab.ids.clear();
        vocab.tokens.clear();
    }

    fn lookup(&self, token: &str) -> TokenId {
        let known = self
            .vocab
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .get(token)
            .copied();
        known.unwrap_or_else(|| {
            self.vocab
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .intern(token)
        })
    }
}

impl Tokenizer for WordTokenizer {
    fn name(&self) -> &'static str {
        "word"
    }

    fn tokenize(&self, text: &str) -> Vec<(TokenId, Range<usize>)> {
        word_spans(text)
            .into_iter()
            .map(|span| (self.lookup(&text[span.clone()]), span))
            .collect()
    }

    fn token_spans(&self, text: &str) -> Vec<Range<usize>> {
        word_spans(text)
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String> {
        let vocab = self.vocab.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = String::new();
        for &id in tokens {
            let token = vocab
                .tokens
                .get(id as usize)
                .ok_or_else(|| Error::InvalidInput(format!("unknown word token: {id}")))?;
            out.push_str(token);
        }
        Ok(out)
    }

    fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        word_runs(text).len().max(1)
    }
}

// =============================================================================
// Vocabulary
// =============================================================================

/// Fixed-vocabulary tokenizer with an unknown token.
///
/// Tokens are whitespace-separated words looked up in the vocabulary; words
/// outside it become the unknown token. Decoding joins words with a single
/// space, so whitespace and unknown words are lost:
///
/// ```rust
/// use tranche::{Tokenizer, VocabularyTokenizer};
///
/// let tokenizer = VocabularyTokenizer::new(["the", "cat"]).unwrap();
/// let ids = tokenizer.encode("the  dog");
/// assert_eq!(tokenizer.decode(&ids).unwrap(), "the [UNK]");
/// assert!(!tokenizer.round_trips());
/// ```
#[derive(Debug, Clone)]
pub struct VocabularyTokenizer {
    ids: HashMap<String, TokenId>,
    tokens: Vec<String>,
    unknown: TokenId,
}

impl VocabularyTokenizer {
    /// Default unknown token.
    pub const UNKNOWN_TOKEN: &'static str = "[UNK]";

    /// Create a tokenizer from a word list; ids follow list order after the
    /// unknown token (id 0).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the vocabulary is empty or
    /// contains an empty or whitespace-containing word.
    pub fn new<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_unknown_token(words, Self::UNKNOWN_TOKEN)
    }

    /// Like [`VocabularyTokenizer::new`] with a custom unknown token.
    ///
    /// # Errors
    ///
    /// See [`VocabularyTokenizer::new`].
    pub fn with_unknown_token<I, S>(words: I, unknown: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tokens = vec![unknown.to_string()];
        let mut ids = HashMap::new();
        ids.insert(unknown.to_string(), 0);

        for word in words {
            let word: String = word.into();
            if word.is_empty() || word.chars().any(char::is_whitespace) {
                return Err(Error::parameter(
                    "vocabulary",
                    format!("invalid vocabulary entry {word:?}"),
                ));
            }
            if !ids.contains_key(&word) {
                ids.insert(word.clone(), tokens.len() as TokenId);
                tokens.push(word);
            }
        }

        if tokens.len() == 1 {
            return Err(Error::parameter("vocabulary", "must not be empty"));
        }

        Ok(Self {
            ids,
            tokens,
            unknown: 0,
        })
    }

    /// Id of the unknown token.
    #[must_use]
    pub fn unknown_id(&self) -> TokenId {
        self.unknown
    }

    /// Vocabulary size including the unknown token.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.tokens.len()
    }
}

impl Tokenizer for VocabularyTokenizer {
    fn name(&self) -> &'static str {
        "vocabulary"
    }

    fn tokenize(&self, text: &str) -> Vec<(TokenId, Range<usize>)> {
        word_runs(text)
            .into_iter()
            .map(|run| {
                let id = self.ids.get(&text[run.clone()]).copied().unwrap_or(self.unknown);
                (id, run)
            })
            .collect()
    }

    fn token_spans(&self, text: &str) -> Vec<Range<usize>> {
        word_runs(text)
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String> {
        let words = tokens
            .iter()
            .map(|&id| {
                self.tokens
                    .get(id as usize)
                    .map(String::as_str)
                    .ok_or_else(|| Error::InvalidInput(format!("id {id} outside vocabulary")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(words.join(" "))
    }

    fn count_tokens(&self, text: &str) -> usize {
        word_runs(text).len()
    }

    fn round_trips(&self) -> bool {
        false
    }
}

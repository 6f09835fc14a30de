//! Recursive hierarchical splitting.
//!
//! Tries progressively finer delimiters until every chunk fits the token
//! budget.
//!
//! ## The Algorithm
//!
//! Given the default [`RecursiveRules`] and a budget of `chunk_size` tokens:
//!
//! ```text
//! 1. Split on paragraph breaks ("\n\n"); each paragraph stays its own chunk
//! 2. Paragraph > chunk_size? Split it on line breaks, merge lines that fit
//! 3. Still too big? Split on sentence ends (". ", "! ", "? ", "; ")
//! 4. Still too big? Split on pauses (", ", ": ", " - ", ...)
//! 5. Still too big? Split on whitespace
//! 6. Last resort: fixed token windows
//! ```
//!
//! Delimiters stay attached to the piece before them (or, for levels
//! configured with [`IncludeDelim::Next`], to the piece after them), so the
//! chunks always concatenate back to the input.
//!
//! ## Merging
//!
//! Splitting alone produces many tiny pieces. At every level except the ones
//! marked `merge: false`, consecutive pieces are packed greedily while their
//! token sum fits. Levels with `merge: false` (paragraphs, by default) keep
//! every piece as a separate chunk, so a paragraph boundary is always a chunk
//! boundary. On any delimiter level, pieces shorter than
//! `min_characters_per_chunk` are folded into the piece after them.
//!
//! ## Termination
//!
//! Every split at a level produces strictly smaller pieces, recursion only
//! moves to finer levels, and after the last level the chunker always falls
//! back to token windows. Every chunk therefore fits the budget.
//!
//! ## Tie-Break
//!
//! The earliest delimiter occurrence in the text wins. When two delimiters
//! of the same level match at the same position, the one listed first wins.

use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::offsets::CharOffsets;
use crate::token::token_windows;
use crate::{Chunk, ChunkBudget, Chunker, Error, Result, Tokenizer};

/// Which side of a split a delimiter stays on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeDelim {
    /// With the piece before it (". " ends a sentence).
    #[default]
    Prev,
    /// With the piece after it ("\n# " starts a section).
    Next,
}

/// One level of a [`RecursiveRules`] hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecursiveLevel {
    /// Split on any of these delimiters.
    Delimiters {
        /// Delimiter strings in priority order.
        delimiters: Vec<String>,
        /// Where delimiters go.
        #[serde(default)]
        include_delim: IncludeDelim,
        /// Pack consecutive fitting pieces together.
        #[serde(default = "default_merge")]
        merge: bool,
    },
    /// Split after every run of whitespace.
    Whitespace,
    /// Fixed token windows. Only valid as the last level.
    Tokens,
}

fn default_merge() -> bool {
    true
}

impl RecursiveLevel {
    /// A delimiter level that keeps delimiters with the preceding piece.
    #[must_use]
    pub fn delimiters(delimiters: &[&str]) -> Self {
        Self::Delimiters {
            delimiters: delimiters.iter().map(|&d| d.to_string()).collect(),
            include_delim: IncludeDelim::Prev,
            merge: true,
        }
    }

    /// Set the delimiter side (no-op for non-delimiter levels).
    #[must_use]
    pub fn with_include_delim(mut self, side: IncludeDelim) -> Self {
        if let Self::Delimiters { include_delim, .. } = &mut self {
            *include_delim = side;
        }
        self
    }

    /// Keep every piece of this level as its own chunk (no-op for
    /// non-delimiter levels).
    #[must_use]
    pub fn separate(mut self) -> Self {
        if let Self::Delimiters { merge, .. } = &mut self {
            *merge = false;
        }
        self
    }

    fn merges(&self) -> bool {
        match self {
            Self::Delimiters { merge, .. } => *merge,
            Self::Whitespace | Self::Tokens => true,
        }
    }
}

/// An ordered hierarchy of split levels, coarsest first.
///
/// ```rust
/// use tranche::{RecursiveLevel, RecursiveRules};
///
/// let rules = RecursiveRules::new(vec![
///     RecursiveLevel::delimiters(&["\n\n"]).separate(),
///     RecursiveLevel::delimiters(&[". "]),
///     RecursiveLevel::Whitespace,
/// ])
/// .unwrap();
/// assert_eq!(rules.len(), 3);
///
/// // A token level must be last.
/// assert!(RecursiveRules::new(vec![RecursiveLevel::Tokens, RecursiveLevel::Whitespace]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RecursiveLevel>", into = "Vec<RecursiveLevel>")]
pub struct RecursiveRules {
    levels: Vec<RecursiveLevel>,
}

impl RecursiveRules {
    /// Validate and create rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRules`] if there are no levels, a delimiter
    /// level is empty or has an empty delimiter, or a token level is not last.
    pub fn new(levels: Vec<RecursiveLevel>) -> Result<Self> {
        if levels.is_empty() {
            return Err(Error::InvalidRules("at least one level is required".into()));
        }
        let last = levels.len() - 1;
        for (i, level) in levels.iter().enumerate() {
            match level {
                RecursiveLevel::Delimiters { delimiters, .. } => {
                    if delimiters.is_empty() {
                        return Err(Error::InvalidRules(format!("level {i} has no delimiters")));
                    }
                    if delimiters.iter().any(String::is_empty) {
                        return Err(Error::InvalidRules(format!("level {i} has an empty delimiter")));
                    }
                }
                RecursiveLevel::Tokens if i != last => {
                    return Err(Error::InvalidRules(format!(
                        "token level {i} must be the last level"
                    )));
                }
                RecursiveLevel::Whitespace | RecursiveLevel::Tokens => {}
            }
        }
        Ok(Self { levels })
    }

    /// Rules for Markdown: headings start new sections, then the defaults.
    #[must_use]
    pub fn markdown() -> Self {
        let mut levels = vec![RecursiveLevel::delimiters(&["\n# ", "\n## ", "\n### ", "\n#### "])
            .with_include_delim(IncludeDelim::Next)
            .separate()];
        levels.extend(Self::default().levels);
        Self { levels }
    }

    /// The levels, coarsest first.
    #[must_use]
    pub fn levels(&self) -> &[RecursiveLevel] {
        &self.levels
    }

    /// Number of levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Always false; rules have at least one level.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl Default for RecursiveRules {
    fn default() -> Self {
        Self {
            levels: vec![
                RecursiveLevel::delimiters(&["\n\n", "\r\n\r\n"]).separate(),
                RecursiveLevel::delimiters(&["\r\n", "\n", "\r"]),
                RecursiveLevel::delimiters(&[". ", "! ", "? ", "; "]),
                RecursiveLevel::delimiters(&[", ", ": ", " — ", " – ", " - ", "… "]),
                RecursiveLevel::Whitespace,
                RecursiveLevel::Tokens,
            ],
        }
    }
}

impl TryFrom<Vec<RecursiveLevel>> for RecursiveRules {
    type Error = Error;

    fn try_from(levels: Vec<RecursiveLevel>) -> Result<Self> {
        Self::new(levels)
    }
}

impl From<RecursiveRules> for Vec<RecursiveLevel> {
    fn from(rules: RecursiveRules) -> Self {
        rules.levels
    }
}

/// Split `text` at a delimiter or whitespace level. Returns contiguous byte
/// ranges covering `text`; token levels return the whole text.
pub(crate) fn split_level(text: &str, level: &RecursiveLevel) -> Vec<Range<usize>> {
    let boundaries = match level {
        RecursiveLevel::Delimiters {
            delimiters,
            include_delim,
            ..
        } => delimiter_boundaries(text, delimiters, *include_delim),
        RecursiveLevel::Whitespace => whitespace_boundaries(text),
        RecursiveLevel::Tokens => vec![],
    };

    let mut pieces = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0;
    for boundary in boundaries {
        if boundary > start && boundary < text.len() {
            pieces.push(start..boundary);
            start = boundary;
        }
    }
    if start < text.len() {
        pieces.push(start..text.len());
    }
    pieces
}

fn delimiter_boundaries(text: &str, delimiters: &[String], side: IncludeDelim) -> Vec<usize> {
    let mut boundaries = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];
        match delimiters.iter().find(|d| rest.starts_with(d.as_str())) {
            Some(delimiter) => {
                let end = pos + delimiter.len();
                boundaries.push(match side {
                    IncludeDelim::Prev => end,
                    IncludeDelim::Next => pos,
                });
                pos = end;
            }
            None => pos += rest.chars().next().map_or(1, char::len_utf8),
        }
    }

    boundaries
}

/// Boundaries where a word follows whitespace. Leading whitespace stays with
/// the first word.
fn whitespace_boundaries(text: &str) -> Vec<usize> {
    let mut boundaries = Vec::new();
    let mut prev_ws = false;
    let mut seen_word = false;
    for (i, c) in text.char_indices() {
        let ws = c.is_whitespace();
        if prev_ws && !ws && seen_word {
            boundaries.push(i);
        }
        seen_word |= !ws;
        prev_ws = ws;
    }
    boundaries
}

/// Fold pieces shorter than `min_chars` (ignoring surrounding whitespace)
/// into the piece that follows them.
fn fold_short_pieces(text: &str, pieces: Vec<Range<usize>>, min_chars: usize) -> Vec<Range<usize>> {
    if min_chars == 0 {
        return pieces;
    }
    let last = pieces.len().saturating_sub(1);
    let mut folded = Vec::with_capacity(pieces.len());
    let mut start = None;
    for (i, piece) in pieces.into_iter().enumerate() {
        let from = start.unwrap_or(piece.start);
        if i != last && text[from..piece.end].trim().chars().count() < min_chars {
            start = Some(from);
            continue;
        }
        folded.push(from..piece.end);
        start = None;
    }
    folded
}

/// Greedily pack consecutive pieces while their token sum fits the budget.
/// A piece larger than the budget forms a group of its own.
pub(crate) fn merge_pieces(counts: &[usize], budget: ChunkBudget) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut start = 0;
    let mut tokens = 0;
    for (i, &count) in counts.iter().enumerate() {
        if i > start && budget.would_overflow(tokens, count) {
            groups.push(start..i);
            start = i;
            tokens = 0;
        }
        tokens += count;
    }
    if start < counts.len() {
        groups.push(start..counts.len());
    }
    groups
}

/// Hierarchical splitter driven by [`RecursiveRules`].
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use tranche::{Chunker, RecursiveChunker, WordTokenizer};
///
/// let chunker = RecursiveChunker::new(Arc::new(WordTokenizer::new()), 256).unwrap();
/// let text = "Paragraph one.\n\nParagraph two.\n\nParagraph three.";
/// let chunks = chunker.chunk(text);
///
/// assert_eq!(chunks.len(), 3);
/// assert_eq!(chunks[1].text, "Paragraph two.\n\n");
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    tokenizer: Arc<dyn Tokenizer>,
    budget: ChunkBudget,
    rules: RecursiveRules,
    min_characters_per_chunk: usize,
}

impl RecursiveChunker {
    /// Default for [`RecursiveChunker::with_min_characters_per_chunk`].
    pub const DEFAULT_MIN_CHARACTERS: usize = 12;

    /// Create a chunker with the default rules.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size == 0`.
    pub fn new(tokenizer: Arc<dyn Tokenizer>, chunk_size: usize) -> Result<Self> {
        Ok(Self {
            tokenizer,
            budget: ChunkBudget::no_overlap(chunk_size)?,
            rules: RecursiveRules::default(),
            min_characters_per_chunk: Self::DEFAULT_MIN_CHARACTERS,
        })
    }

    /// Create a chunker with Markdown rules.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size == 0`.
    pub fn markdown(tokenizer: Arc<dyn Tokenizer>, chunk_size: usize) -> Result<Self> {
        Ok(Self::new(tokenizer, chunk_size)?.with_rules(RecursiveRules::markdown()))
    }

    /// Use custom rules.
    #[must_use]
    pub fn with_rules(mut self, rules: RecursiveRules) -> Self {
        self.rules = rules;
        self
    }

    /// Fold delimiter-level pieces shorter than `min` characters into their
    /// successor. Zero disables folding.
    #[must_use]
    pub fn with_min_characters_per_chunk(mut self, min: usize) -> Self {
        self.min_characters_per_chunk = min;
        self
    }

    /// The rules in use.
    #[must_use]
    pub fn rules(&self) -> &RecursiveRules {
        &self.rules
    }

    /// Recursively split `text` (which starts at byte `base` of the source),
    /// pushing `(byte range, token count)` pairs onto `out`.
    fn split_recursive(&self, text: &str, base: usize, level: usize, out: &mut Vec<(Range<usize>, usize)>) {
        if text.is_empty() {
            return;
        }

        let rule = self.rules.levels().get(level);
        let merges = rule.map_or(true, RecursiveLevel::merges);
        if merges {
            let tokens = self.tokenizer.count_tokens(text);
            if self.budget.fits(tokens) {
                out.push((base..base + text.len(), tokens));
                return;
            }
        }

        let rule = match rule {
            None | Some(RecursiveLevel::Tokens) => {
                trace!(level, bytes = text.len(), "falling back to token windows");
                for window in token_windows(self.tokenizer.as_ref(), text, self.budget) {
                    out.push((base + window.bytes.start..base + window.bytes.end, window.tokens));
                }
                return;
            }
            Some(rule) => rule,
        };

        let mut pieces = split_level(text, rule);
        if matches!(rule, RecursiveLevel::Delimiters { .. }) {
            pieces = fold_short_pieces(text, pieces, self.min_characters_per_chunk);
        }
        if pieces.len() <= 1 {
            self.split_recursive(text, base, level + 1, out);
            return;
        }
        debug_assert_eq!(pieces.last().map(|p| p.end), Some(text.len()));
        trace!(level, pieces = pieces.len(), "split level");

        let slices: Vec<&str> = pieces.iter().map(|p| &text[p.clone()]).collect();
        let counts = self.tokenizer.count_tokens_batch(&slices);
        let groups = if merges {
            merge_pieces(&counts, self.budget)
        } else {
            (0..pieces.len()).map(|i| i..i + 1).collect()
        };

        for group in groups {
            let bytes = pieces[group.start].start..pieces[group.end - 1].end;
            // Piece counts can overstate a merged group, so count it whole.
            let tokens = if group.len() == 1 {
                counts[group.start]
            } else {
                self.tokenizer.count_tokens(&text[bytes.clone()])
            };
            if self.budget.fits(tokens) {
                out.push((base + bytes.start..base + bytes.end, tokens));
            } else {
                self.split_recursive(&text[bytes.clone()], base + bytes.start, level + 1, out);
            }
        }
    }
}

impl Chunker for RecursiveChunker {
    fn name(&self) -> &'static str {
        "recursive"
    }

    fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return vec![];
        }

        let mut pieces = Vec::with_capacity(self.estimate_chunks(text.len()));
        self.split_recursive(text, 0, 0, &mut pieces);

        let mut offsets = CharOffsets::new(text);
        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .map(|(bytes, tokens)| {
                let span = offsets.char_span(bytes.clone());
                Chunk::new(&text[bytes], span.start, span.end, tokens)
            })
            .collect();

        debug!(
            levels = self.rules.len(),
            chunks = chunks.len(),
            "recursive chunking done"
        );
        chunks
    }

    fn estimate_chunks(&self, text_len: usize) -> usize {
        (text_len / 4 / self.budget.size()).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CharacterTokenizer, WordTokenizer};

    fn words(size: usize) -> RecursiveChunker {
        RecursiveChunker::new(Arc::new(WordTokenizer::new()), size).unwrap()
    }

    fn joined(chunks: &[Chunk]) -> String {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_paragraphs_stay_separate() {
        let text = "Paragraph one.\n\nParagraph two.\n\nParagraph three.";
        let chunks = words(256).chunk(text);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Paragraph one.\n\n", "Paragraph two.\n\n", "Paragraph three."]
        );
    }

    #[test]
    fn test_large_paragraph_recurses_to_sentences() {
        let text = "Short intro here.\n\nThe first sentence is here. The second sentence is here. The third sentence is here.";
        let chunks = words(6).chunk(text);
        assert_eq!(chunks[0].text, "Short intro here.\n\n");
        assert_eq!(chunks[1].text, "The first sentence is here. ");
        assert_eq!(chunks.len(), 4);
        assert_eq!(joined(&chunks), text);
    }

    #[test]
    fn test_respects_budget() {
        let chunker = RecursiveChunker::new(Arc::new(CharacterTokenizer), 20).unwrap();
        let text = "The quick brown fox jumps over the lazy dog. Pack my box with five dozen liquor jugs.";
        let chunks = chunker.chunk(text);
        for chunk in &chunks {
            assert!(chunk.token_count <= 20, "chunk too large: {chunk}");
            assert_eq!(chunk.token_count, chunk.text.chars().count());
        }
        assert_eq!(joined(&chunks), text);
    }

    #[test]
    fn test_merged_groups_report_their_own_count() {
        let tokenizer: Arc<dyn Tokenizer> = Arc::new(WordTokenizer::new());
        let rules = RecursiveRules::new(vec![RecursiveLevel::delimiters(&["\n"])]).unwrap();
        let chunker = RecursiveChunker::new(tokenizer.clone(), 2)
            .unwrap()
            .with_rules(rules)
            .with_min_characters_per_chunk(0);
        let text = "alpha\n\n\nbeta\n\n\ngamma";
        let chunks = chunker.chunk(text);
        assert_eq!(joined(&chunks), text);
        assert_eq!(chunks[0].text, "alpha\n\n");
        for chunk in &chunks {
            assert_eq!(chunk.token_count, tokenizer.count_tokens(&chunk.text), "{chunk:?}");
        }
    }

    #[test]
    fn test_falls_back_to_tokens() {
        let chunker = RecursiveChunker::new(Arc::new(CharacterTokenizer), 10).unwrap();
        let text = "NoSeparatorsAtAll".repeat(3);
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 6);
        assert!(chunks.iter().all(|c| c.token_count <= 10));
        assert_eq!(joined(&chunks), text);
    }

    #[test]
    fn test_smaller_budget_more_chunks() {
        let text = "This is a test sentence. ".repeat(200);
        let small = words(256).chunk(&text);
        let large = words(512).chunk(&text);
        assert!(small.len() > large.len());
        assert_eq!(joined(&small), text);
    }

    #[test]
    fn test_earliest_delimiter_wins() {
        let level = RecursiveLevel::delimiters(&["; ", ", "]);
        let text = "a, b; c";
        let pieces: Vec<&str> = split_level(text, &level)
            .into_iter()
            .map(|r| &text[r])
            .collect();
        assert_eq!(pieces, vec!["a, ", "b; ", "c"]);
    }

    #[test]
    fn test_same_position_priority() {
        let level = RecursiveLevel::delimiters(&["\n", "\n\n"]);
        let pieces = split_level("a\n\nb", &level);
        // "\n" is listed first, so it wins at position 1.
        assert_eq!(pieces, vec![0..2, 2..3, 3..4]);
    }

    #[test]
    fn test_include_delim_next() {
        let level = RecursiveLevel::delimiters(&["\n#"]).with_include_delim(IncludeDelim::Next);
        let text = "intro\n# One\n# Two";
        let pieces: Vec<&str> = split_level(text, &level)
            .into_iter()
            .map(|r| &text[r])
            .collect();
        assert_eq!(pieces, vec!["intro", "\n# One", "\n# Two"]);
    }

    #[test]
    fn test_whitespace_level() {
        let text = "  one  two\tthree ";
        let pieces: Vec<&str> = split_level(text, &RecursiveLevel::Whitespace)
            .into_iter()
            .map(|r| &text[r])
            .collect();
        assert_eq!(pieces, vec!["  one  ", "two\t", "three "]);
    }

    #[test]
    fn test_fold_short_pieces() {
        let text = "# T\n\nBody paragraph text.\n\nEnd";
        let level = RecursiveLevel::delimiters(&["\n\n"]);
        let folded = fold_short_pieces(text, split_level(text, &level), 12);
        let pieces: Vec<&str> = folded.into_iter().map(|r| &text[r]).collect();
        assert_eq!(pieces, vec!["# T\n\nBody paragraph text.\n\n", "End"]);
    }

    #[test]
    fn test_merge_pieces() {
        let budget = ChunkBudget::no_overlap(10).unwrap();
        assert_eq!(merge_pieces(&[3, 3, 3, 3], budget), vec![0..3, 3..4]);
        assert_eq!(merge_pieces(&[12, 2, 2], budget), vec![0..1, 1..3]);
        assert!(merge_pieces(&[], budget).is_empty());
    }

    #[test]
    fn test_rules_validation() {
        assert!(RecursiveRules::new(vec![]).is_err());
        assert!(RecursiveRules::new(vec![RecursiveLevel::delimiters(&[])]).is_err());
        assert!(RecursiveRules::new(vec![RecursiveLevel::delimiters(&[""])]).is_err());
        assert!(RecursiveRules::new(vec![RecursiveLevel::Whitespace]).is_ok());
    }

    #[test]
    fn test_rules_serde() {
        let json = r#"[{"kind":"delimiters","delimiters":["\n\n"],"merge":false},{"kind":"whitespace"}]"#;
        let rules: RecursiveRules = serde_json::from_str(json).unwrap();
        assert_eq!(rules.len(), 2);
        assert!(serde_json::from_str::<RecursiveRules>(r#"[{"kind":"tokens"},{"kind":"whitespace"}]"#).is_err());
    }

    #[test]
    fn test_markdown_sections() {
        let chunker = RecursiveChunker::markdown(Arc::new(WordTokenizer::new()), 100).unwrap();
        let text = "# Title\n\nIntro text here.\n## Section 1\n\nContent 1.\n## Section 2\n\nContent 2.";
        let chunks = chunker.chunk(text);
        assert!(chunks.iter().any(|c| c.text.starts_with("\n## Section 1")));
        assert_eq!(joined(&chunks), text);
    }

    #[test]
    fn test_empty_text() {
        assert!(words(100).chunk("").is_empty());
    }
}

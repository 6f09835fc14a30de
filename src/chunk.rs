//! The Chunk type: a span of text with its token count and provenance.

use serde::{Deserialize, Serialize};

/// A chunk of text with its position in the original document.
///
/// ## Character Offsets
///
/// `start_index` and `end_index` are offsets in Unicode scalar values
/// (`char`s), not bytes, so they stay meaningful for callers in other
/// languages and never point inside a multi-byte character:
///
/// ```rust
/// use tranche::Chunk;
///
/// let text = "Grüße, world!";
/// let chunk = Chunk::new("world", 7, 12, 1);
///
/// let recovered: String = text
///     .chars()
///     .skip(chunk.start_index)
///     .take(chunk.len_chars())
///     .collect();
/// assert_eq!(recovered, "world");
/// ```
///
/// ## Overlap Handling
///
/// When chunks overlap, adjacent chunks share some text:
///
/// ```text
/// Original: "The quick brown fox"
/// Chunk 0:  "The quick b"     [0..11]
/// Chunk 1:  "ck brown fox"    [8..19]  <- overlaps with chunk 0
///                ^
///            overlap region [8..11]
/// ```
///
/// Chunkers never touch a chunk after returning it. Refineries build new
/// chunks instead of editing old ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text.
    pub text: String,
    /// Character offset where this chunk starts in the original document.
    pub start_index: usize,
    /// Character offset where this chunk ends (exclusive).
    pub end_index: usize,
    /// Number of tokens according to the chunker's tokenizer.
    pub token_count: usize,
    /// Embedding vector, set only by embedding-aware chunkers and refineries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Create a new chunk without an embedding.
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        start_index: usize,
        end_index: usize,
        token_count: usize,
    ) -> Self {
        Self {
            text: text.into(),
            start_index,
            end_index,
            token_count,
            embedding: None,
        }
    }

    /// Return a copy of this chunk carrying `embedding`.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// The length of this chunk in characters.
    #[must_use]
    pub fn len_chars(&self) -> usize {
        self.end_index - self.start_index
    }

    /// Whether this chunk is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The character span of this chunk in the original document.
    #[must_use]
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start_index..self.end_index
    }
}

impl std::fmt::Display for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunk {{ span: {}..{}, tokens: {}, embedded: {} }}",
            self.start_index,
            self.end_index,
            self.token_count,
            self.embedding.is_some()
        )
    }
}

/// A document and the chunks produced from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Optional caller-assigned identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The source text.
    pub content: String,
    /// Chunks in left-to-right source order.
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

impl Document {
    /// Create a document with no chunks yet.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            chunks: Vec::new(),
        }
    }

    /// Attach an identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_and_span() {
        let chunk = Chunk::new("héllo", 3, 8, 5);
        assert_eq!(chunk.len_chars(), 5);
        assert_eq!(chunk.span(), 3..8);
        assert!(!chunk.is_empty());
        assert!(chunk.embedding.is_none());
    }

    #[test]
    fn test_display() {
        let chunk = Chunk::new("abc", 0, 3, 1).with_embedding(vec![0.5]);
        assert_eq!(
            chunk.to_string(),
            "Chunk { span: 0..3, tokens: 1, embedded: true }"
        );
    }

    #[test]
    fn test_serde_skips_missing_embedding() {
        let chunk = Chunk::new("abc", 0, 3, 1);
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(!json.contains("embedding"));

        let back: Chunk = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chunk);
    }

    #[test]
    fn test_document_builder() {
        let doc = Document::new("body").with_id("doc-1");
        assert_eq!(doc.id.as_deref(), Some("doc-1"));
        assert!(doc.chunks.is_empty());
    }
}

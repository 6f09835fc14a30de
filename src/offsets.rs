//! Byte to character offset mapping.
//!
//! Splitters work on byte ranges because that is how `str` slicing works,
//! but [`Chunk`](crate::Chunk) reports character offsets. Chunk starts are
//! queried in (mostly) increasing order, so the tracker keeps a cursor and
//! only counts the characters between the previous query and this one.

use std::ops::Range;

/// Keeps track of the corresponding byte to character offset in a text.
#[derive(Debug, Clone)]
pub(crate) struct CharOffsets<'text> {
    text: &'text str,
    byte_offset: usize,
    char_offset: usize,
}

impl<'text> CharOffsets<'text> {
    pub(crate) fn new(text: &'text str) -> Self {
        Self {
            text,
            byte_offset: 0,
            char_offset: 0,
        }
    }

    /// Character offset of byte offset `byte`, which must be a char boundary.
    pub(crate) fn char_offset(&mut self, byte: usize) -> usize {
        debug_assert!(self.text.is_char_boundary(byte), "not a char boundary: {byte}");
        if byte >= self.byte_offset {
            self.char_offset += self.text[self.byte_offset..byte].chars().count();
        } else {
            self.char_offset -= self.text[byte..self.byte_offset].chars().count();
        }
        self.byte_offset = byte;
        self.char_offset
    }

    /// Character span of a byte range.
    pub(crate) fn char_span(&mut self, bytes: Range<usize>) -> Range<usize> {
        let start = self.char_offset(bytes.start);
        let end = start + self.text[bytes].chars().count();
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_identity() {
        let mut offsets = CharOffsets::new("hello world");
        assert_eq!(offsets.char_offset(6), 6);
        assert_eq!(offsets.char_span(0..5), 0..5);
    }

    #[test]
    fn test_multibyte_forward_and_back() {
        let text = "a日本語b👋c";
        let mut offsets = CharOffsets::new(text);
        let b = text.find('b').unwrap();
        assert_eq!(offsets.char_offset(b), 4);
        let c = text.find('c').unwrap();
        assert_eq!(offsets.char_offset(c), 6);
        // Moving backwards must also work (overlapping chunks).
        assert_eq!(offsets.char_offset(1), 1);
        assert_eq!(offsets.char_span(b..text.len()), 4..7);
    }
}

//! Chunk budget configuration.
//!
//! Every chunker is bounded by two numbers: the maximum size of a chunk
//! and how much of that size is repeated from the previous chunk.
//!
//! ```text
//! size = 10, overlap = 2
//!
//! Tokens: t0 t1 t2 t3 t4 t5 t6 t7 t8 t9 t10 t11 ...
//! Chunk 0: [t0 .. t9]
//! Chunk 1:                         [t8 .. t17]   <- step = 10 - 2 = 8
//! ```
//!
//! The unit depends on the chunker: tokens for most of them, characters
//! for [`FastChunker`](crate::FastChunker). Validation happens once, at
//! construction, so hot paths never re-check.

use crate::{Error, Result};

/// Validated chunk size and overlap.
///
/// # Examples
///
/// ```rust
/// use tranche::ChunkBudget;
///
/// let budget = ChunkBudget::new(512, 64).unwrap();
/// assert_eq!(budget.step(), 448);
/// assert!(budget.fits(512));
/// assert!(budget.would_overflow(500, 13));
///
/// assert!(ChunkBudget::new(0, 0).is_err());
/// assert!(ChunkBudget::new(10, 10).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBudget {
    size: usize,
    overlap: usize,
}

impl ChunkBudget {
    /// Create a budget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChunkSize`] if `size == 0` and
    /// [`Error::OverlapExceedsSize`] if `overlap >= size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidChunkSize(size));
        }
        if overlap >= size {
            return Err(Error::OverlapExceedsSize { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    /// A budget without overlap.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChunkSize`] if `size == 0`.
    pub fn no_overlap(size: usize) -> Result<Self> {
        Self::new(size, 0)
    }

    /// A budget with no overlap for compile-time defaults.
    pub(crate) const fn fixed(size: usize) -> Self {
        assert!(size > 0, "chunk size must be > 0");
        Self { size, overlap: 0 }
    }

    /// Maximum chunk size.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Amount repeated between consecutive chunks.
    #[must_use]
    pub const fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between consecutive chunk starts. Always > 0.
    #[must_use]
    pub const fn step(&self) -> usize {
        self.size - self.overlap
    }

    /// Whether a chunk of `amount` fits.
    #[must_use]
    pub const fn fits(&self, amount: usize) -> bool {
        amount <= self.size
    }

    /// Check if adding `additional` to `current` would exceed the budget.
    ///
    /// Useful for incremental chunk building.
    #[must_use]
    pub fn would_overflow(&self, current: usize, additional: usize) -> bool {
        current.saturating_add(additional) > self.size
    }
}

impl Default for ChunkBudget {
    fn default() -> Self {
        Self {
            size: 2048,
            overlap: 0,
        }
    }
}

impl TryFrom<usize> for ChunkBudget {
    type Error = Error;

    fn try_from(size: usize) -> Result<Self> {
        Self::no_overlap(size)
    }
}

impl TryFrom<(usize, usize)> for ChunkBudget {
    type Error = Error;

    fn try_from((size, overlap): (usize, usize)) -> Result<Self> {
        Self::new(size, overlap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step() {
        let budget = ChunkBudget::new(10, 2).unwrap();
        assert_eq!(budget.step(), 8);
        assert_eq!(ChunkBudget::no_overlap(10).unwrap().step(), 10);
    }

    #[test]
    fn test_fits() {
        let budget = ChunkBudget::new(100, 0).unwrap();
        assert!(budget.fits(50));
        assert!(budget.fits(100));
        assert!(!budget.fits(101));
    }

    #[test]
    fn test_would_overflow() {
        let budget = ChunkBudget::new(100, 0).unwrap();
        assert!(!budget.would_overflow(50, 49));
        assert!(!budget.would_overflow(50, 50));
        assert!(budget.would_overflow(50, 51));
        assert!(budget.would_overflow(usize::MAX, 1));
    }

    #[test]
    fn test_rejects_zero_size() {
        assert!(matches!(
            ChunkBudget::new(0, 0),
            Err(Error::InvalidChunkSize(0))
        ));
    }

    #[test]
    fn test_rejects_overlap_equal_to_size() {
        assert!(matches!(
            ChunkBudget::try_from((10, 10)),
            Err(Error::OverlapExceedsSize { size: 10, overlap: 10 })
        ));
    }
}

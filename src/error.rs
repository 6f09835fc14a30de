//! Error types for tranche.
//!
//! Errors fall into four kinds, see [`ErrorKind`]:
//!
//! - **Configuration**: raised by constructors, fix before running.
//! - **Input**: the call site passed something the library cannot use.
//! - **Provider**: an external embedding or generation service failed.
//!   Usually transient; [`Error::is_retryable`] tells you which ones.
//! - **Cancelled**: a [`Cancellation`](crate::Cancellation) was triggered.

use std::time::Duration;

/// Errors that can occur while configuring or running a chunker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid chunk size (must be > 0).
    #[error("invalid chunk size: {0} (must be > 0)")]
    InvalidChunkSize(usize),

    /// Overlap is not smaller than the chunk size.
    #[error("overlap {overlap} must be smaller than chunk size {size}")]
    OverlapExceedsSize {
        /// The chunk size.
        size: usize,
        /// The overlap that was too large.
        overlap: usize,
    },

    /// Similarity threshold outside `[0, 1]`.
    #[error("invalid similarity threshold: {0} (must be within [0, 1])")]
    InvalidThreshold(f32),

    /// Recursive rules that cannot be used.
    #[error("invalid recursive rules: {0}")]
    InvalidRules(String),

    /// Any other parameter outside its valid range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A chunker needs an embedding provider but none was supplied.
    #[error("{0} chunker requires an embedding provider")]
    MissingProvider(&'static str),

    /// Unknown chunker name.
    #[error("unknown chunker: {0}")]
    UnknownChunker(String),

    /// Unknown tokenizer name.
    #[error("unknown tokenizer: {0}")]
    UnknownTokenizer(String),

    /// Input the library cannot process.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An external provider call failed.
    #[error("{chunker}: provider call for batch {batch} failed: {source}")]
    Provider {
        /// The component that issued the call.
        chunker: &'static str,
        /// Index of the provider batch that failed.
        batch: usize,
        /// The underlying provider failure.
        #[source]
        source: ProviderError,
    },

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// The kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidChunkSize(_)
            | Self::OverlapExceedsSize { .. }
            | Self::InvalidThreshold(_)
            | Self::InvalidRules(_)
            | Self::InvalidParameter { .. }
            | Self::MissingProvider(_)
            | Self::UnknownChunker(_)
            | Self::UnknownTokenizer(_) => ErrorKind::Configuration,
            Self::InvalidInput(_) => ErrorKind::Input,
            Self::Provider { .. } => ErrorKind::Provider,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    pub(crate) fn provider(chunker: &'static str, batch: usize, source: ProviderError) -> Self {
        Self::Provider {
            chunker,
            batch,
            source,
        }
    }

    pub(crate) fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad construction parameters.
    Configuration,
    /// Bad call-site input.
    Input,
    /// External provider failure.
    Provider,
    /// Cancelled by the caller.
    Cancelled,
}

/// Failure reported by an embedding or generation provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider did not answer in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The provider rejected the call due to rate limiting.
    #[error("rate limited")]
    RateLimited,

    /// Authentication or authorization failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The provider could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The provider answered with something unusable.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Anything else, with the original cause preserved.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Whether the failure is likely transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::RateLimited | Self::Unavailable(_)
        )
    }

    /// Whether the failure is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Result type for tranche operations.
pub type Result<T> = std::result::Result<T, Error>;

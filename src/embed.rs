//! Embedding providers and vector helpers.
//!
//! Embedding is the only await point in the crate. Everything else is
//! synchronous and CPU-bound, so the provider trait is async and the
//! splitters are not.
//!
//! Two providers ship with the crate:
//!
//! - [`HashingEmbedder`]: deterministic bag-of-words vectors. No model, no
//!   network. Good for tests and for wiring a pipeline before a real model
//!   is available.
//! - `FastembedProvider` (feature `fastembed`): local ONNX models through
//!   fastembed, BGE-small-en by default.

use std::fmt;

use async_trait::async_trait;

use crate::ProviderError;

/// Anything that turns text into vectors.
///
/// Implementations must return one vector per input, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider or model name, for logs.
    fn name(&self) -> &str;

    /// Embed a batch of texts.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("empty embedding result".to_string()))
    }
}

impl fmt::Debug for dyn EmbeddingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingProvider")
            .field("name", &self.name())
            .finish()
    }
}

/// Call `embed_batch` and check that one vector came back per input.
pub(crate) async fn embed_checked(
    provider: &dyn EmbeddingProvider,
    texts: &[&str],
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let vectors = provider.embed_batch(texts).await?;
    if vectors.len() != texts.len() {
        return Err(ProviderError::MalformedResponse(format!(
            "expected {} embeddings, got {}",
            texts.len(),
            vectors.len()
        )));
    }
    Ok(vectors)
}

/// Compute cosine similarity between two embeddings.
///
/// Zero vectors have similarity 0 with everything.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(feature = "innr")]
    {
        innr::cosine(a, b)
    }

    #[cfg(not(feature = "innr"))]
    {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a > 0.0 && norm_b > 0.0 {
            dot / (norm_a * norm_b)
        } else {
            0.0
        }
    }
}

/// Element-wise mean of `vectors`. Empty input gives an empty vector.
#[must_use]
pub fn centroid<V: AsRef<[f32]>>(vectors: &[V]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return vec![];
    };
    let mut sum = vec![0.0f32; first.as_ref().len()];
    for vector in vectors {
        for (acc, x) in sum.iter_mut().zip(vector.as_ref()) {
            *acc += x;
        }
    }
    let n = vectors.len() as f32;
    sum.iter_mut().for_each(|x| *x /= n);
    sum
}

/// Deterministic bag-of-words embedder.
///
/// Each lowercased alphanumeric word is hashed (FNV-1a) into one of
/// `dimension` buckets; the counts are L2-normalized. Texts that share
/// words point the same way, texts that share none are orthogonal.
///
/// ```rust
/// use tranche::{cosine_similarity, EmbeddingProvider, HashingEmbedder};
///
/// # tokio_test_block(async {
/// let embedder = HashingEmbedder::new(64);
/// let a = embedder.embed("Cats purr").await.unwrap();
/// let b = embedder.embed("cats, PURR!").await.unwrap();
/// assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing `dimension`-sized vectors (at least 1).
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Vector dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed synchronously.
    #[must_use]
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) % self.dimension as u64;
            vector[bucket as usize] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}

#[cfg(feature = "fastembed")]
mod fastembed_provider {
    use async_trait::async_trait;

    use super::EmbeddingProvider;
    use crate::{Error, ProviderError, Result};

    /// Local embeddings through fastembed.
    ///
    /// Inference runs on the calling task; wrap the provider if you need it
    /// off the async executor.
    pub struct FastembedProvider {
        model: fastembed::TextEmbedding,
        batch_size: Option<usize>,
    }

    impl FastembedProvider {
        /// Load fastembed's default model (BGE-small-en, 384 dimensions).
        ///
        /// # Errors
        ///
        /// Returns an error if the embedding model fails to load.
        pub fn new() -> Result<Self> {
            let model = fastembed::TextEmbedding::try_new(Default::default())
                .map_err(|e| Error::provider("fastembed", 0, ProviderError::Unavailable(e.to_string())))?;
            Ok(Self::from_model(model))
        }

        /// Wrap an already loaded model.
        #[must_use]
        pub fn from_model(model: fastembed::TextEmbedding) -> Self {
            Self {
                model,
                batch_size: None,
            }
        }

        /// Batch size fastembed uses internally.
        #[must_use]
        pub fn with_batch_size(mut self, batch_size: usize) -> Self {
            self.batch_size = Some(batch_size);
            self
        }
    }

    impl std::fmt::Debug for FastembedProvider {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("FastembedProvider")
                .field("batch_size", &self.batch_size)
                .finish_non_exhaustive()
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FastembedProvider {
        fn name(&self) -> &str {
            "fastembed"
        }

        async fn embed_batch(&self, texts: &[&str]) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
            self.model
                .embed(texts.to_vec(), self.batch_size)
                .map_err(|e| ProviderError::Other(e.into()))
        }
    }
}

#[cfg(feature = "fastembed")]
pub use fastembed_provider::FastembedProvider;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_centroid() {
        let c = centroid(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(c, vec![0.5, 0.5]);
        assert!(centroid::<Vec<f32>>(&[]).is_empty());
    }

    #[test]
    fn test_hashing_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(32);
        let a = embedder.embed_sync("The cat sat on the mat.");
        let b = embedder.embed_sync("The cat sat on the mat.");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_empty_text_is_zero() {
        let v = HashingEmbedder::new(8).embed_sync("  ...  ");
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_dimension_at_least_one() {
        assert_eq!(HashingEmbedder::new(0).dimension(), 1);
    }
}

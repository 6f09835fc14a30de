//! Batch execution shared by all synchronous chunkers.
//!
//! Texts are independent, so a batch is a map over inputs followed by a
//! gather in input order. With the `parallel` feature the map runs on a
//! rayon pool (the global one, sized to the available cores, unless
//! [`BatchOptions::with_threads`] asks for a dedicated pool). Rayon's
//! indexed collect puts results back in input order no matter which
//! worker finished first.

use tracing::debug;

use crate::{cancel, Cancellation, Chunk, Chunker, Result};

/// How a batch is executed.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Process texts concurrently.
    pub parallel: bool,
    /// Checked before each text is chunked.
    pub cancellation: Option<Cancellation>,
    /// Worker count for a dedicated pool; `None` uses the global pool.
    pub num_threads: Option<usize>,
}

impl BatchOptions {
    /// Sequential execution.
    #[must_use]
    pub fn sequential() -> Self {
        Self::default()
    }

    /// Parallel execution on the global pool.
    #[must_use]
    pub fn parallel() -> Self {
        Self {
            parallel: true,
            ..Self::default()
        }
    }

    /// Attach a cancellation flag.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// Run on a dedicated pool with `num_threads` workers.
    #[must_use]
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }
}

/// Chunk every text on the global pool (or sequentially), in input order.
pub(crate) fn chunk_all<C>(chunker: &C, texts: &[&str], parallel: bool) -> Vec<Vec<Chunk>>
where
    C: Chunker + ?Sized,
{
    debug!(
        chunker = chunker.name(),
        texts = texts.len(),
        parallel,
        "chunking batch"
    );

    if parallel && texts.len() > 1 {
        return parallel::map(texts, |text| chunker.chunk(text));
    }
    texts.iter().map(|text| chunker.chunk(text)).collect()
}

/// Chunk every text, returning results in input order.
pub(crate) fn chunk_batch<C>(chunker: &C, texts: &[&str], options: &BatchOptions) -> Result<Vec<Vec<Chunk>>>
where
    C: Chunker + ?Sized,
{
    let cancellation = options.cancellation.as_ref();
    let run_one = |text: &&str| -> Result<Vec<Chunk>> {
        cancel::check(cancellation)?;
        Ok(chunker.chunk(text))
    };

    debug!(
        chunker = chunker.name(),
        texts = texts.len(),
        parallel = options.parallel,
        "chunking batch"
    );

    if options.parallel && texts.len() > 1 {
        return parallel::run(texts, options.num_threads, run_one);
    }

    texts.iter().map(run_one).collect()
}

#[cfg(feature = "parallel")]
mod parallel {
    use rayon::prelude::*;

    use crate::{Chunk, Error, Result};

    pub(super) fn map<F>(texts: &[&str], chunk: F) -> Vec<Vec<Chunk>>
    where
        F: Fn(&str) -> Vec<Chunk> + Sync + Send,
    {
        texts.par_iter().map(|text| chunk(text)).collect()
    }

    pub(super) fn run<F>(texts: &[&str], num_threads: Option<usize>, run_one: F) -> Result<Vec<Vec<Chunk>>>
    where
        F: Fn(&&str) -> Result<Vec<Chunk>> + Sync + Send,
    {
        let Some(num_threads) = num_threads else {
            return texts.par_iter().map(run_one).collect();
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("tranche-batch-{i}"))
            .build()
            .map_err(|e| Error::parameter("num_threads", e.to_string()))?;

        pool.install(|| texts.par_iter().map(run_one).collect())
    }
}

#[cfg(not(feature = "parallel"))]
mod parallel {
    use tracing::debug;

    use crate::{Chunk, Result};

    pub(super) fn map<F>(texts: &[&str], chunk: F) -> Vec<Vec<Chunk>>
    where
        F: Fn(&str) -> Vec<Chunk>,
    {
        debug!("`parallel` feature disabled, chunking batch sequentially");
        texts.iter().map(|text| chunk(text)).collect()
    }

    pub(super) fn run<F>(texts: &[&str], _num_threads: Option<usize>, run_one: F) -> Result<Vec<Vec<Chunk>>>
    where
        F: Fn(&&str) -> Result<Vec<Chunk>>,
    {
        debug!("`parallel` feature disabled, chunking batch sequentially");
        texts.iter().map(run_one).collect()
    }
}

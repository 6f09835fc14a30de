//! Basic Text Chunking
//!
//! The minimal example: chunk text for embedding.
//!
//! ```bash
//! cargo run --example 01_basic_chunking
//! ```

use std::sync::Arc;

use tranche::{Chunker, SentenceChunker, WordTokenizer};

fn main() -> tranche::Result<()> {
    let document = "Machine learning models learn patterns from data. \
        They generalize these patterns to make predictions. \
        This is fundamentally different from traditional programming. \
        Deep learning extends this with multiple hidden layers. \
        Each layer learns increasingly abstract representations.";

    // Whole sentences, at most 16 words per chunk
    let chunker = SentenceChunker::new(Arc::new(WordTokenizer::new()), 16, 0)?;
    let chunks = chunker.chunk(document);

    println!("Document: {} chars", document.chars().count());
    println!("Chunks: {}\n", chunks.len());

    for (i, chunk) in chunks.iter().enumerate() {
        println!(
            "[{}] chars {}..{}, {} tokens: \"{}\"",
            i, chunk.start_index, chunk.end_index, chunk.token_count, chunk.text
        );
    }

    // Each chunk is now small enough to embed
    // and large enough to preserve sentence context.
    Ok(())
}

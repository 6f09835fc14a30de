//! Chunking Strategies Comparison
//!
//! Runs every strategy on the same document and shows the trade-offs.
//!
//! ```bash
//! cargo run --example chunking_strategies
//! ```

use std::sync::Arc;

use tranche::{
    Chunk, Chunker, ContextSize, FastChunker, HashingEmbedder, OverlapRefinery, RecursiveChunker, SemanticChunker,
    SentenceChunker, TokenChunker, Tokenizer, WordTokenizer,
};

fn print_chunks(chunks: &[Chunk]) {
    println!("   Chunks: {}", chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let preview = chunk.text.chars().take(60).collect::<String>();
        println!(
            "   [{}] chars {}-{}, {} tokens: {:?}...",
            i, chunk.start_index, chunk.end_index, chunk.token_count, preview
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> tranche::Result<()> {
    println!("Text Chunking Strategies");
    println!("========================\n");

    // Sample document with varied structure
    let document = r"Machine learning models learn patterns from data. They generalize these patterns to make predictions on new, unseen examples. This is fundamentally different from traditional programming, where humans write explicit rules.

The training process involves three key steps:

1. Forward pass: Input flows through the network, producing predictions.
2. Loss computation: Predictions are compared against ground truth.
3. Backpropagation: Gradients flow backward, updating weights.

Deep learning extends this with multiple hidden layers. Each layer learns increasingly abstract representations. Early layers detect edges; later layers recognize objects.

Dr. Geoffrey Hinton pioneered backpropagation in the 1980s. His work at the University of Toronto, along with collaborators like Yann LeCun and Yoshua Bengio, laid the foundation for modern AI. In 2024, they were recognized with the Nobel Prize.";

    let tokenizer: Arc<dyn Tokenizer> = Arc::new(WordTokenizer::new());
    println!(
        "Document length: {} characters, {} words\n",
        document.chars().count(),
        tokenizer.count_tokens(document)
    );

    // Strategy 1: Token windows
    println!("1. Token Windows");
    println!("   -------------");
    println!("   Every 40 words with 8 words of overlap. Ignores boundaries.\n");
    let token = TokenChunker::new(tokenizer.clone(), 40, 8)?;
    print_chunks(&token.chunk(document));

    // Strategy 2: Sentence packing
    println!("\n2. Sentence-Based Chunking");
    println!("   -----------------------");
    println!("   Whole sentences up to 40 words. Respects linguistic boundaries.\n");
    let sentence = SentenceChunker::new(tokenizer.clone(), 40, 0)?;
    print_chunks(&sentence.chunk(document));

    // Strategy 3: Recursive
    println!("\n3. Recursive Chunking");
    println!("   ------------------");
    println!("   Paragraphs, then lines, sentences, pauses, words, tokens.\n");
    let recursive = RecursiveChunker::new(tokenizer.clone(), 40)?;
    let recursive_chunks = recursive.chunk(document);
    print_chunks(&recursive_chunks);

    // Strategy 4: Fast
    println!("\n4. Fast Chunking");
    println!("   -------------");
    println!("   250-character windows snapped back to whitespace.\n");
    let fast = FastChunker::new(250, 0)?;
    print_chunks(&fast.chunk(document));

    // Strategy 5: Semantic
    println!("\n5. Semantic Chunking");
    println!("   -----------------");
    println!("   Split where neighbouring sentences stop sharing vocabulary.\n");
    let semantic = SemanticChunker::new(Arc::new(HashingEmbedder::default()), tokenizer.clone(), 80, 0.1)?;
    print_chunks(&semantic.chunk(document).await?);

    // Refinement: add context from the previous chunk
    println!("\n6. Overlap Refinery");
    println!("   ----------------");
    println!("   Recursive chunks, each prefixed with 5 words of the previous one.\n");
    let refinery = OverlapRefinery::new(tokenizer, ContextSize::Tokens(5))?;
    print_chunks(&refinery.refine(&recursive_chunks));

    // Summary
    println!("\n--- Summary ---\n");
    println!("| Strategy    | Preserves Boundaries | Best For            |");
    println!("|-------------|----------------------|---------------------|");
    println!("| Token       | No                   | Baseline            |");
    println!("| Sentence    | Yes (linguistic)     | Prose, articles     |");
    println!("| Recursive   | Yes (structural)     | Mixed content       |");
    println!("| Fast        | Whitespace only      | Huge inputs         |");
    println!("| Semantic    | Yes (topical)        | Topic coherence     |");

    Ok(())
}

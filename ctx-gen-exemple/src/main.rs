use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ctx_gen_core::config::GenerationConfig;
use ctx_gen_core::corpus::{Corpus, DEFAULT_CHUNK_SIZE};
use ctx_gen_core::event::Event;
use ctx_gen_core::model::generator::Generator;
use ctx_gen_core::model::sampler::SamplingStrategy;
use tokio::sync::mpsc;

/// Streams text generated from a corpus file around a seed phrase.
#[derive(Parser, Debug)]
struct Args {
    /// Corpus text file; its token cache is written next to it as `.bin`
    #[arg(long, default_value = "./data/corpus.txt")]
    corpus: PathBuf,

    /// Seed phrase steering the generation
    seed: String,

    /// Markov order
    #[arg(long, default_value_t = 2)]
    ngram: usize,

    /// Target number of tokens
    #[arg(long, default_value_t = 200)]
    length: usize,

    /// Pause between tokens, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Sample uniformly instead of boosting seed-related tokens
    #[arg(long)]
    uniform: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    // Start from the defaults and override what the command line sets
    let config = GenerationConfig {
        ngram: args.ngram,
        gen_length: args.length,
        delay_ms: args.delay_ms,
        sampling: if args.uniform { SamplingStrategy::Uniform } else { SamplingStrategy::Weighted },
        ..GenerationConfig::default()
    };

    // Loading tokenizes the corpus once and caches it; later runs reuse the cache
    let corpus = Corpus::load(&args.corpus, DEFAULT_CHUNK_SIZE, config.corpus_max_run)?;
    if let Event::Log { msg } = corpus.acknowledgement() {
        eprintln!("{msg}");
    }

    // Invalid options are rejected here, before any model work
    let generator = Generator::new(Arc::new(corpus), config)?;

    // Tokens arrive one by one while the model is still sampling
    let (tx, mut rx) = mpsc::channel(32);
    let seed = args.seed.clone();
    let task = tokio::spawn(async move { generator.run(&seed, tx).await });

    let mut stdout = std::io::stdout();
    while let Some(event) = rx.recv().await {
        match event {
            Event::StreamToken { token } => {
                print!("{token}");
                stdout.flush()?;
            }
            Event::StreamEnd { empty_model: true, .. } => eprintln!("\n(corpus too short for this n-gram order)"),
            Event::StreamEnd { tokens, .. } => eprintln!("\n({tokens} tokens)"),
            Event::Error { kind, msg } => eprintln!("\nerror ({kind:?}): {msg}"),
            Event::Log { msg } => eprintln!("{msg}"),
        }
    }

    // The error, if any, was already reported as an event
    let _ = task.await?;
    Ok(())
}

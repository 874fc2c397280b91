//! Top-level module for the context-weighted generation pipeline.
//!
//! Leaves first:
//! - Tokenization (`tokenizer`) and token types (`token`)
//! - Context statistics around seed tokens (`context`)
//! - Feature scoring and selection (`features`)
//! - Feature-tagged corpus embedding (`embedder`)
//! - The n-gram transition table (`ngram_model`, `state`)
//! - Weighted sampling (`sampler`) and sentence-boundary correction (`boundary`)
//! - The cooperative streaming driver (`generator`, `cancel`)

/// Script-aware, lossless tokenizer.
pub mod tokenizer;

/// Plain and target tokens, features and Markov key elements.
pub mod token;

/// Co-occurrence counts around target tokens.
pub mod context;

/// Score computation and deterministic feature selection.
pub mod features;

/// Rewrites a tokenized corpus with target tags.
pub mod embedder;

/// Fixed-order n-gram transition table over embedded tokens.
///
/// Handles construction, start-state selection and successor prediction.
pub mod ngram_model;

/// Internal representation of a single n-gram context.
///
/// Tracks successors with repetition and delegates sampling.
pub mod state;

/// Uniform and boosted successor sampling.
pub mod sampler;

/// Start trimming and bounded end extension.
pub mod boundary;

/// Request driver: model preparation, generation state machine and event
/// streaming.
pub mod generator;

/// Cancellation flag and cooperative yield points.
pub mod cancel;

//! Context-weighted n-gram text generation library.
//!
//! This crate provides a seed-driven streaming text generator including:
//! - A script-aware tokenizer (CJK, kana, word, whitespace, punctuation runs)
//! - Context statistics and scored features around seed tokens
//! - A feature-tagged n-gram Markov model
//! - Weighted sampling and sentence-boundary correction
//! - A cooperative, cancellable streaming driver emitting token events
//!
//! The high-level entry points are [`corpus::Corpus`] and
//! [`model::generator::Generator`].

/// Core tokenization, statistics, Markov model and generation logic.
pub mod model;

/// Corpus handle: chunked storage and cached tokenization.
pub mod corpus;

/// Generation options and validation.
pub mod config;

/// Error taxonomy shared by the library and its hosts.
pub mod error;

/// Events emitted by a generation stream.
pub mod event;

/// I/O utilities (file loading, path helpers).
pub mod io;

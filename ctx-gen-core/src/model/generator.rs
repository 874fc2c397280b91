use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;

use super::boundary::{EndCorrection, fix_end_tokens, start_index};
use super::cancel::CancelFlag;
use super::context::{ContextCounts, extract_near_target};
use super::embedder::embed;
use super::features::{compute_scores, select_features};
use super::ngram_model::NGramModel;
use super::token::{Feature, Token};
use super::tokenizer::target_set;
use crate::config::GenerationConfig;
use crate::corpus::Corpus;
use crate::error::GenError;
use crate::event::Event;

/// Everything derived from the corpus for one seed phrase.
///
/// Rebuilt for every request: targets, features and the transition table
/// all depend on the seed. Read-only once built.
#[derive(Debug)]
pub struct PreparedModel {
	pub targets: HashSet<String>,
	pub features: Vec<Feature>,
	pub model: NGramModel,
}

impl PreparedModel {
	/// Runs statistics, feature selection, embedding and model construction.
	///
	/// # Errors
	/// - `EmptySeed` if the seed yields no target token
	/// - `InvalidParameter` if the Markov order is 0
	pub fn build<S: AsRef<str>>(tokens: &[S], seed: &str, config: &GenerationConfig) -> Result<Self, GenError> {
		let targets = target_set(seed, config.seed_max_run);
		if targets.is_empty() {
			return Err(GenError::EmptySeed);
		}

		let tokens = extract_near_target(tokens, &targets, config.near_window);
		let counts = ContextCounts::build(tokens, &targets, config.window);
		if counts.occurrences() == 0 {
			warn!("no seed token occurs in the corpus, generating without features");
		}

		let scores = compute_scores(&counts, config.power);
		let features = select_features(&scores, config.threshold);
		let embedded = embed(tokens, &targets, &features, config.feature_scope);
		let model = NGramModel::build(&embedded, config.ngram)?;

		info!(
			"model: {} targets, {} occurrences, {} features, {} keys over {} tokens",
			targets.len(),
			counts.occurrences(),
			features.len(),
			model.len(),
			embedded.len()
		);

		Ok(Self { targets, features, model })
	}
}

/// Steps of a generation run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
	SelectStart,
	EmitInitial,
	ExtendBody,
	CorrectStart,
	CorrectEnd,
	StreamOut,
	Done,
}

/// Successful end of a generation run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
	/// `tokens` tokens were streamed.
	Finished { tokens: usize },
	/// The transition table was empty; nothing was streamed.
	EmptyModel,
}

/// Generated buffer before streaming.
#[derive(Clone, Debug)]
pub struct Composition {
	/// Every generated token, including the discarded head.
	pub tokens: Vec<Token>,
	/// First token of the corrected output.
	pub start: usize,
	pub end: EndCorrection,
}

impl Composition {
	/// Tokens to stream.
	pub fn corrected(&self) -> &[Token] {
		&self.tokens[self.start..]
	}
}

/// Streaming generation driver.
///
/// # Responsibilities
/// - Validate the request at the boundary (configuration, corpus, seed)
/// - Build the per-request model from a shared [`Corpus`]
/// - Generate and boundary-correct a token buffer
/// - Stream one [`Event::StreamToken`] per token, yielding between tokens,
///   then exactly one terminal event
///
/// A `Generator` owns its random state and serves a single request.
#[derive(Debug)]
pub struct Generator {
	corpus: Arc<Corpus>,
	config: GenerationConfig,
	rng: StdRng,
	cancel: CancelFlag,
}

impl Generator {
	/// Creates a generator for one request.
	///
	/// # Errors
	/// Returns `InvalidParameter` if `config` is out of domain.
	pub fn new(corpus: Arc<Corpus>, config: GenerationConfig) -> Result<Self, GenError> {
		config.validate()?;
		Ok(Self { corpus, config, rng: StdRng::from_os_rng(), cancel: CancelFlag::new() })
	}

	/// Replaces the random source with a seeded one.
	pub fn with_rng_seed(mut self, seed: u64) -> Self {
		self.rng = StdRng::seed_from_u64(seed);
		self
	}

	/// Flag that stops this run at its next yield point.
	pub fn cancel_flag(&self) -> CancelFlag {
		self.cancel.clone()
	}

	pub fn config(&self) -> &GenerationConfig {
		&self.config
	}

	/// Runs the request to completion, sending events to `tx`.
	///
	/// On failure, a single [`Event::Error`] is sent in place of the
	/// terminal event, provided the receiver is still listening. A dropped
	/// receiver ends the run as `Cancelled`.
	pub async fn run(mut self, seed: &str, tx: mpsc::Sender<Event>) -> Result<Completion, GenError> {
		match self.drive(seed, &tx).await {
			Ok(completion) => Ok(completion),
			Err(err) => {
				debug!("generation failed: {err}");
				let _ = tx.send(Event::error(&err)).await;
				Err(err)
			}
		}
	}

	async fn drive(&mut self, seed: &str, tx: &mpsc::Sender<Event>) -> Result<Completion, GenError> {
		if self.corpus.is_empty() {
			return Err(GenError::EmptyCorpus);
		}
		if seed.trim().is_empty() {
			return Err(GenError::EmptySeed);
		}

		let corpus = Arc::clone(&self.corpus);
		let tokens = corpus.tokens(self.config.corpus_max_run, self.config.yield_every, &self.cancel).await?;
		if tokens.is_empty() {
			return Err(GenError::EmptyCorpus);
		}
		let prepared = PreparedModel::build(&tokens[..], seed, &self.config)?;
		drop(tokens);

		let Some(composition) = self.compose(&prepared) else {
			warn!("empty transition table (corpus shorter than ngram order {})", self.config.ngram);
			send(tx, Event::StreamEnd { empty_model: true, tokens: 0 }).await?;
			return Ok(Completion::EmptyModel);
		};

		enter(Phase::StreamOut);
		let delay = self.config.delay();
		let output = composition.corrected();
		for token in output {
			send(tx, Event::token(token.text())).await?;
			self.cancel.checkpoint(delay).await?;
		}

		enter(Phase::Done);
		send(tx, Event::StreamEnd { empty_model: false, tokens: output.len() }).await?;
		Ok(Completion::Finished { tokens: output.len() })
	}

	/// Generates and corrects a buffer without streaming it.
	///
	/// Returns `None` when the model has no key.
	pub fn compose(&mut self, prepared: &PreparedModel) -> Option<Composition> {
		let model = &prepared.model;
		let sampler = self.config.sampler();

		enter(Phase::SelectStart);
		let state = model.sentence_start_state(&mut self.rng)?;

		enter(Phase::EmitInitial);
		let mut tokens = state.prefix().to_vec();

		enter(Phase::ExtendBody);
		while tokens.len() < self.config.gen_length {
			match model.predict(&tokens, &sampler, &prepared.targets, &mut self.rng) {
				Some(next) => tokens.push(next),
				None => {
					debug!("dead end after {} tokens", tokens.len());
					break;
				}
			}
		}

		enter(Phase::CorrectStart);
		let start = start_index(&tokens);

		enter(Phase::CorrectEnd);
		let end = fix_end_tokens(
			&mut tokens,
			start,
			model,
			&sampler,
			&prepared.targets,
			self.config.max_extend,
			&mut self.rng,
		);
		debug!("end correction: {end:?}");

		Some(Composition { tokens, start, end })
	}
}

fn enter(phase: Phase) {
	debug!("phase {phase:?}");
}

async fn send(tx: &mpsc::Sender<Event>, event: Event) -> Result<(), GenError> {
	tx.send(event).await.map_err(|_| GenError::Cancelled)
}

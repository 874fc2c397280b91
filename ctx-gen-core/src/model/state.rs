use std::collections::HashSet;

use rand::Rng;

use super::sampler::Sampler;
use super::token::Token;

/// Represents a state in the n-gram model.
///
/// A `State` corresponds to one n-token context and stores every token
/// observed right after it, with repetition.
///
/// Conceptually, this is a node in a Markov chain where outgoing edges are
/// weighted by their number of observations.
///
/// ## Responsibilities:
/// - Accumulate successor occurrences during model construction
/// - Keep the first observed occurrence of the context, so a generation
///   started from this state can emit the context tokens themselves
/// - Draw the next token through a [`Sampler`]
///
/// ## Invariants
/// - `prefix.len()` equals the model order
/// - A state is only created together with its first successor
#[derive(Clone, Debug)]
pub struct State {
	/// First observed occurrence of the context, with its feature payload.
	prefix: Vec<Token>,
	/// Successors in corpus order; multiplicity is corpus frequency.
	successors: Vec<Token>,
	/// Whether some occurrence of the context opens a sentence.
	opens_sentence: bool,
}

impl State {
	pub(crate) fn new(prefix: &[Token], first_successor: Token) -> Self {
		Self {
			prefix: prefix.to_vec(),
			successors: vec![first_successor],
			opens_sentence: false,
		}
	}

	/// Records one more occurrence of a successor.
	pub(crate) fn add_successor(&mut self, next: Token) {
		self.successors.push(next);
	}

	pub(crate) fn mark_sentence_start(&mut self) {
		self.opens_sentence = true;
	}

	pub fn prefix(&self) -> &[Token] {
		&self.prefix
	}

	pub fn successors(&self) -> &[Token] {
		&self.successors
	}

	pub fn opens_sentence(&self) -> bool {
		self.opens_sentence
	}

	/// Predicts the next token.
	///
	/// Returns `None` if the state has no successors.
	pub fn predict<R: Rng + ?Sized>(
		&self,
		sampler: &Sampler,
		targets: &HashSet<String>,
		rng: &mut R,
	) -> Option<&Token> {
		sampler.sample(&self.successors, targets, rng)
	}
}

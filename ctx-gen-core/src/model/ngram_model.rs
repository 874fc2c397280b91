use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand::seq::IndexedRandom;

use super::boundary::is_sentence_end;
use super::sampler::Sampler;
use super::state::State;
use super::token::{KeyToken, Token};
use crate::error::GenError;

/// Structured Markov key: `n` consecutive tokens, tag and text only.
///
/// Features are left out of the key, so every target occurrence of the same
/// text shares its contexts while staying distinct from plain occurrences.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MarkovKey(Vec<KeyToken>);

impl MarkovKey {
	pub fn from_tokens(tokens: &[Token]) -> Self {
		Self(tokens.iter().map(Token::key).collect())
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn tokens(&self) -> &[KeyToken] {
		&self.0
	}
}

/// Represents an n-gram transition table over an embedded token sequence.
///
/// # Responsibilities
/// - Build the table from a sequence of [`Token`]s
/// - Pick a starting state, preferring contexts that open a sentence
/// - Predict the successor of a context through a [`Sampler`]
///
/// # Invariants
/// - `n` is always >= 1
/// - Every key has length `n` and at least one successor
/// - `order` lists every key exactly once, in first-seen order
#[derive(Clone, Debug)]
pub struct NGramModel {
	/// The order of the model (number of tokens in a key)
	n: usize,

	/// Mapping from a context to its state
	states: HashMap<MarkovKey, State>,

	/// Keys in first-seen order, for reproducible random selection
	order: Vec<MarkovKey>,
}

impl NGramModel {
	/// Creates an empty model of order `n`.
	///
	/// # Errors
	/// Returns an error if `n < 1`.
	pub fn new(n: usize) -> Result<Self, GenError> {
		if n < 1 {
			return Err(GenError::invalid("ngram", "must be >= 1"));
		}
		Ok(Self { n, states: HashMap::new(), order: Vec::new() })
	}

	/// Builds a model of order `n` from `tokens`.
	///
	/// For each index `i` with `i + n < tokens.len()`, the token at `i + n`
	/// is appended, payload intact, to the bucket of `tokens[i..i + n]`.
	/// A sequence of `n` tokens or fewer produces an empty model.
	pub fn build(tokens: &[Token], n: usize) -> Result<Self, GenError> {
		let mut model = Self::new(n)?;
		for (index, window) in tokens.windows(n + 1).enumerate() {
			model.add_transition(&window[..n], window[n].clone(), opens_sentence(tokens, index));
		}
		Ok(model)
	}

	fn add_transition(&mut self, prefix: &[Token], next: Token, sentence_start: bool) {
		let state = match self.states.entry(MarkovKey::from_tokens(prefix)) {
			Entry::Occupied(entry) => {
				let state = entry.into_mut();
				state.add_successor(next);
				state
			}
			Entry::Vacant(entry) => {
				self.order.push(entry.key().clone());
				entry.insert(State::new(prefix, next))
			}
		};
		if sentence_start {
			state.mark_sentence_start();
		}
	}

	pub fn n(&self) -> usize {
		self.n
	}

	pub fn len(&self) -> usize {
		self.states.len()
	}

	pub fn is_empty(&self) -> bool {
		self.states.is_empty()
	}

	pub fn get(&self, key: &MarkovKey) -> Option<&State> {
		self.states.get(key)
	}

	/// Iterates over every state, in first-seen order.
	pub fn states(&self) -> impl Iterator<Item = (&MarkovKey, &State)> {
		self.order.iter().filter_map(|key| self.states.get(key).map(|state| (key, state)))
	}

	/// Returns a uniformly random state, or `None` on an empty model.
	pub fn random_state<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&State> {
		self.order.choose(rng).and_then(|key| self.states.get(key))
	}

	/// Returns a random state whose context opens a sentence, falling back to
	/// a uniformly random state when no such context exists.
	pub fn sentence_start_state<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&State> {
		let candidates: Vec<&State> = self.states().map(|(_, state)| state).filter(|state| state.opens_sentence()).collect();
		match candidates.choose(rng) {
			Some(state) => Some(*state),
			None => self.random_state(rng),
		}
	}

	/// Predicts the token following the last `n` tokens of `context`.
	///
	/// Returns `None` on a dead end: the context is shorter than `n`, was
	/// never seen, or has no successor.
	pub fn predict<R: Rng + ?Sized>(
		&self,
		context: &[Token],
		sampler: &Sampler,
		targets: &HashSet<String>,
		rng: &mut R,
	) -> Option<Token> {
		let start = context.len().checked_sub(self.n)?;
		let key = MarkovKey::from_tokens(&context[start..]);
		self.states.get(&key)?.predict(sampler, targets, rng).cloned()
	}
}

/// Whether the token at `index` begins a sentence: it is not whitespace and
/// the closest preceding non-whitespace token is a sentence-ending mark.
fn opens_sentence(tokens: &[Token], index: usize) -> bool {
	if tokens[index].text().chars().all(char::is_whitespace) {
		return false;
	}
	tokens[..index]
		.iter()
		.rev()
		.find(|token| !token.text().chars().all(char::is_whitespace))
		.is_some_and(|token| is_sentence_end(token.text()))
}

use std::collections::HashSet;

use rand::Rng;

use super::ngram_model::NGramModel;
use super::sampler::Sampler;
use super::token::Token;

/// Marks that close a sentence.
pub const SENTENCE_MARKS: [char; 6] = ['。', '！', '？', '!', '?', '…'];

/// Whether a token's text ends with a sentence-ending mark.
pub fn is_sentence_end(text: &str) -> bool {
	text.chars().next_back().is_some_and(|c| SENTENCE_MARKS.contains(&c))
}

fn is_blank(text: &str) -> bool {
	text.chars().all(char::is_whitespace)
}

fn is_filler(text: &str) -> bool {
	text.chars().all(|c| !c.is_alphanumeric())
}

/// Index at which corrected output starts.
///
/// Right after the first sentence-ending mark and the whitespace following
/// it; without any mark, after the leading run of punctuation and
/// whitespace tokens.
pub fn start_index(tokens: &[Token]) -> usize {
	match tokens.iter().position(|token| is_sentence_end(token.text())) {
		Some(mark) => {
			let rest = &tokens[mark + 1..];
			mark + 1 + rest.iter().take_while(|token| is_blank(token.text())).count()
		}
		None => tokens.iter().take_while(|token| is_filler(token.text())).count(),
	}
}

/// Drops everything up to and including the first sentence-ending mark.
pub fn fix_start_tokens(tokens: &[Token]) -> &[Token] {
	&tokens[start_index(tokens)..]
}

/// Whether the last non-whitespace token closes a sentence.
pub fn ends_sentence(tokens: &[Token]) -> bool {
	tokens
		.iter()
		.rev()
		.find(|token| !is_blank(token.text()))
		.is_some_and(|token| is_sentence_end(token.text()))
}

/// Outcome of an end correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndCorrection {
	/// Tokens appended by the correction.
	pub extended: usize,
	/// Whether the output now closes a sentence.
	pub reached_boundary: bool,
}

/// Extends `tokens` until `tokens[start..]` closes a sentence.
///
/// Each step samples one token keyed on the trailing n-gram of the whole
/// buffer. Stops after `max_extend` appended tokens or on a dead end; the
/// input is only ever appended to.
pub fn fix_end_tokens<R: Rng + ?Sized>(
	tokens: &mut Vec<Token>,
	start: usize,
	model: &NGramModel,
	sampler: &Sampler,
	targets: &HashSet<String>,
	max_extend: usize,
	rng: &mut R,
) -> EndCorrection {
	let mut extended = 0;
	loop {
		let corrected = tokens.get(start..).unwrap_or_default();
		if ends_sentence(corrected) {
			return EndCorrection { extended, reached_boundary: true };
		}
		if extended >= max_extend {
			break;
		}
		match model.predict(tokens, sampler, targets, rng) {
			Some(next) => {
				tokens.push(next);
				extended += 1;
			}
			None => break,
		}
	}
	EndCorrection { extended, reached_boundary: false }
}

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A scored association between a context token and a target position.
///
/// "`token` tends to appear `offset` positions away from a target token,
/// with normalized strength `score`."
///
/// # Invariants
/// - `offset != 0`
/// - `score >= 0.0`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Feature {
	pub offset: isize,
	pub token: String,
	pub score: f64,
}

/// A unit of the embedded corpus.
///
/// Identity for statistics is the text; the target tag and its features are
/// metadata attached by the embedder.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
	Plain(String),
	Target { text: String, features: Arc<[Feature]> },
}

impl Token {
	pub fn plain(text: impl Into<String>) -> Self {
		Token::Plain(text.into())
	}

	pub fn target(text: impl Into<String>, features: Arc<[Feature]>) -> Self {
		Token::Target { text: text.into(), features }
	}

	/// Displayable text of the token.
	pub fn text(&self) -> &str {
		match self {
			Token::Plain(text) => text,
			Token::Target { text, .. } => text,
		}
	}

	pub fn is_target(&self) -> bool {
		matches!(self, Token::Target { .. })
	}

	/// Features attached to a target token; empty for plain tokens.
	pub fn features(&self) -> &[Feature] {
		match self {
			Token::Plain(_) => &[],
			Token::Target { features, .. } => features,
		}
	}

	/// Keying form of the token: tag and text, without the feature payload.
	pub fn key(&self) -> KeyToken {
		match self {
			Token::Plain(text) => KeyToken::Plain(text.clone()),
			Token::Target { text, .. } => KeyToken::Target(text.clone()),
		}
	}
}

/// Element of a Markov key.
///
/// A plain `"X"` and a target `"X"` are distinct contexts. Feature lists do
/// not take part in equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyToken {
	Plain(String),
	Target(String),
}

impl KeyToken {
	pub fn text(&self) -> &str {
		match self {
			KeyToken::Plain(text) | KeyToken::Target(text) => text,
		}
	}
}

/// Concatenates the displayable text of a token sequence.
pub fn render(tokens: &[Token]) -> String {
	tokens.iter().map(Token::text).collect()
}

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::token::{Feature, Token};

/// Which features a target occurrence carries.
///
/// - `Global`: every occurrence carries the whole selected feature list.
/// - `Local`: an occurrence only carries the selected features actually
///   observed around it.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeatureScope {
	#[default]
	Global,
	Local,
}

/// Rewrites the tokenized corpus, tagging every target occurrence.
///
/// Non-target tokens pass through as [`Token::Plain`].
pub fn embed<S: AsRef<str>>(
	tokens: &[S],
	targets: &HashSet<String>,
	features: &[Feature],
	scope: FeatureScope,
) -> Vec<Token> {
	let shared: Arc<[Feature]> = Arc::from(features);

	tokens
		.iter()
		.enumerate()
		.map(|(index, token)| {
			let text = token.as_ref();
			if !targets.contains(text) {
				return Token::plain(text);
			}
			match scope {
				FeatureScope::Global => Token::target(text, Arc::clone(&shared)),
				FeatureScope::Local => Token::target(text, local_features(tokens, index, features)),
			}
		})
		.collect()
}

fn local_features<S: AsRef<str>>(tokens: &[S], index: usize, features: &[Feature]) -> Arc<[Feature]> {
	features
		.iter()
		.filter(|feature| {
			index
				.checked_add_signed(feature.offset)
				.and_then(|i| tokens.get(i))
				.is_some_and(|neighbour| neighbour.as_ref() == feature.token)
		})
		.cloned()
		.collect()
}

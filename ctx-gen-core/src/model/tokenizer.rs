use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Runs in priority order: CJK ideographs, hiragana, katakana, word
/// characters outside those scripts, one whitespace, one other character.
static RUN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(concat!(
		r"[\x{4E00}-\x{9FFF}]+",
		r"|[\x{3040}-\x{309F}]+",
		r"|[\x{30A0}-\x{30FF}]+",
		r"|[\w&&[^\x{3040}-\x{30FF}\x{4E00}-\x{9FFF}]]+",
		r"|\s",
		r"|[^\w\s]",
	))
	.expect("token pattern must compile")
});

/// Splits `text` into script runs, slicing runs longer than `max_run`
/// characters into pieces of exactly `max_run` characters (the last piece
/// may be shorter).
///
/// # Guarantees
/// - Concatenating the result reproduces `text` exactly.
/// - Every token has at most `max_run` characters.
///
/// `max_run` values below 1 are treated as 1.
pub fn tokenize(text: &str, max_run: usize) -> Vec<String> {
	let max_run = max_run.max(1);
	let mut tokens = Vec::new();

	for run in RUN_PATTERN.find_iter(text).map(|m| m.as_str()) {
		if run.chars().count() <= max_run {
			tokens.push(run.to_owned());
			continue;
		}

		let mut start = 0;
		let mut count = 0;
		for (index, _) in run.char_indices() {
			if count == max_run {
				tokens.push(run[start..index].to_owned());
				start = index;
				count = 0;
			}
			count += 1;
		}
		tokens.push(run[start..].to_owned());
	}

	tokens
}

/// Derives the target set from a seed phrase.
///
/// Whitespace tokens are dropped: they occur everywhere and carry no topic.
pub fn target_set(seed: &str, max_run: usize) -> HashSet<String> {
	tokenize(seed, max_run)
		.into_iter()
		.filter(|token| !token.chars().all(char::is_whitespace))
		.collect()
}

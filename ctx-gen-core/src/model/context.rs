use std::collections::{HashMap, HashSet};

/// Co-occurrence counts around target tokens.
///
/// For every occurrence of a target token, each token found at a relative
/// offset in `[-window, window] \ {0}` is counted under `(offset, token)`,
/// and the offset's total is incremented.
///
/// # Invariants
/// - `totals[offset]` equals the sum of `counts[(offset, _)]`
/// - Offsets are never 0 and never exceed `window` in absolute value
///
/// Empty statistics (no target in the corpus) are valid: scoring and
/// selection then yield no features.
#[derive(Clone, Debug, Default)]
pub struct ContextCounts {
	counts: HashMap<(isize, String), usize>,
	totals: HashMap<isize, usize>,
	occurrences: usize,
}

impl ContextCounts {
	/// Gathers counts over `tokens` for every member of `targets`.
	pub fn build<S: AsRef<str>>(tokens: &[S], targets: &HashSet<String>, window: usize) -> Self {
		let mut stats = Self::default();
		let window = window as isize;

		for (index, token) in tokens.iter().enumerate() {
			if !targets.contains(token.as_ref()) {
				continue;
			}
			stats.occurrences += 1;

			for offset in (-window..=window).filter(|offset| *offset != 0) {
				let Some(neighbour) = index.checked_add_signed(offset).and_then(|i| tokens.get(i)) else {
					continue;
				};
				*stats.counts.entry((offset, neighbour.as_ref().to_owned())).or_insert(0) += 1;
				*stats.totals.entry(offset).or_insert(0) += 1;
			}
		}

		stats
	}

	/// Number of times `token` was seen `offset` positions from a target.
	pub fn count(&self, offset: isize, token: &str) -> usize {
		self.counts.get(&(offset, token.to_owned())).copied().unwrap_or(0)
	}

	/// Number of in-bounds observations at `offset`.
	pub fn total(&self, offset: isize) -> usize {
		self.totals.get(&offset).copied().unwrap_or(0)
	}

	/// Number of target occurrences seen while building.
	pub fn occurrences(&self) -> usize {
		self.occurrences
	}

	pub fn is_empty(&self) -> bool {
		self.counts.is_empty()
	}

	/// Iterates over `((offset, token), count)` entries, in no particular order.
	pub fn iter(&self) -> impl Iterator<Item = (isize, &str, usize)> {
		self.counts.iter().map(|((offset, token), count)| (*offset, token.as_str(), *count))
	}
}

/// Restricts `tokens` to `radius` tokens on each side of the first target
/// occurrence.
///
/// Without any occurrence, the first `radius` tokens are kept. A `radius`
/// of 0 keeps everything.
pub fn extract_near_target<'a, S: AsRef<str>>(tokens: &'a [S], targets: &HashSet<String>, radius: usize) -> &'a [S] {
	if radius == 0 {
		return tokens;
	}
	match tokens.iter().position(|token| targets.contains(token.as_ref())) {
		Some(first) => &tokens[first.saturating_sub(radius)..(first + radius).min(tokens.len())],
		None => &tokens[..radius.min(tokens.len())],
	}
}

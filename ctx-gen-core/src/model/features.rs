use std::cmp::Ordering;
use std::collections::HashMap;

use super::context::ContextCounts;
use super::token::Feature;

/// Score of each `(offset, token)` pair.
pub type Scores = HashMap<(isize, String), f64>;

/// Turns raw counts into sharpened conditional frequencies.
///
/// `score = (count(offset, token) / total(offset)) ^ power`
///
/// A `power` above 1 suppresses weakly associated context tokens relative
/// to strongly associated ones.
pub fn compute_scores(counts: &ContextCounts, power: f64) -> Scores {
	counts
		.iter()
		.filter_map(|(offset, token, count)| {
			let total = counts.total(offset);
			if total == 0 {
				return None;
			}
			let frequency = count as f64 / total as f64;
			Some(((offset, token.to_owned()), frequency.powf(power)))
		})
		.collect()
}

/// Keeps pairs scoring at least `threshold`, in a total order:
/// ascending offset, then descending score, then token text.
pub fn select_features(scores: &Scores, threshold: f64) -> Vec<Feature> {
	let mut features: Vec<Feature> = scores
		.iter()
		.filter(|(_, score)| **score >= threshold)
		.map(|((offset, token), score)| Feature { offset: *offset, token: token.clone(), score: *score })
		.collect();

	features.sort_by(feature_order);
	features
}

fn feature_order(a: &Feature, b: &Feature) -> Ordering {
	a.offset
		.cmp(&b.offset)
		.then_with(|| b.score.total_cmp(&a.score))
		.then_with(|| a.token.cmp(&b.token))
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;

	fn stats(tokens: &[&str], target: &str, window: usize) -> ContextCounts {
		let targets: HashSet<String> = [target.to_owned()].into_iter().collect();
		ContextCounts::build(tokens, &targets, window)
	}

	#[test]
	fn scores_are_powered_frequencies() {
		let counts = stats(&["x", "a", "x", "a", "x", "b"], "x", 1);
		let scores = compute_scores(&counts, 2.0);

		// +1: a, a, b → a = (2/3)^2
		let a = scores[&(1, "a".to_owned())];
		assert!((a - 4.0 / 9.0).abs() < 1e-12);
		let b = scores[&(1, "b".to_owned())];
		assert!((b - 1.0 / 9.0).abs() < 1e-12);
	}

	#[test]
	fn threshold_filters_and_zero_keeps_all() {
		let counts = stats(&["x", "a", "x", "a", "x", "b"], "x", 1);
		let scores = compute_scores(&counts, 4.0);

		assert_eq!(select_features(&scores, 0.0).len(), scores.len());
		let strong = select_features(&scores, 0.1);
		assert!(strong.iter().all(|f| f.score >= 0.1));
		assert!(strong.iter().any(|f| f.offset == 1 && f.token == "a"));
		assert!(!strong.iter().any(|f| f.offset == 1 && f.token == "b"));
	}

	#[test]
	fn ordering_is_total_and_stable() {
		let mut scores = Scores::new();
		scores.insert((1, "b".into()), 0.5);
		scores.insert((1, "a".into()), 0.5);
		scores.insert((1, "c".into()), 0.9);
		scores.insert((-2, "z".into()), 0.1);

		let first = select_features(&scores, 0.0);
		let order: Vec<(isize, &str)> = first.iter().map(|f| (f.offset, f.token.as_str())).collect();
		assert_eq!(order, vec![(-2, "z"), (1, "c"), (1, "a"), (1, "b")]);

		for _ in 0..10 {
			assert_eq!(select_features(&scores.clone(), 0.0), first);
		}
	}

	#[test]
	fn empty_counts_select_nothing() {
		let scores = compute_scores(&ContextCounts::default(), 4.0);
		assert!(select_features(&scores, 0.0).is_empty());
	}
}

use std::collections::HashSet;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::token::Token;

/// How the next token is drawn from a transition bucket.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
	/// One vote per historical occurrence.
	Uniform,
	/// Occurrence votes scaled by target and feature boosts.
	#[default]
	Weighted,
}

/// Draws successors from transition buckets.
///
/// With [`SamplingStrategy::Weighted`], each candidate starts at weight 1.0,
/// is multiplied by `target_boost` when it is a target token, and by
/// `1 + score * feature_boost` for every attached feature whose token is in
/// the current target set.
#[derive(Clone, Debug, PartialEq)]
pub struct Sampler {
	strategy: SamplingStrategy,
	target_boost: f64,
	feature_boost: f64,
}

impl Sampler {
	pub fn new(strategy: SamplingStrategy, target_boost: f64, feature_boost: f64) -> Self {
		Self { strategy, target_boost, feature_boost }
	}

	pub fn uniform() -> Self {
		Self::new(SamplingStrategy::Uniform, 1.0, 0.0)
	}

	/// Weight of a single candidate under this sampler.
	pub fn weight(&self, candidate: &Token, targets: &HashSet<String>) -> f64 {
		if self.strategy == SamplingStrategy::Uniform {
			return 1.0;
		}

		let mut weight = 1.0;
		if candidate.is_target() {
			weight *= self.target_boost;
		}
		for feature in candidate.features() {
			if targets.contains(&feature.token) {
				weight *= 1.0 + feature.score * self.feature_boost;
			}
		}
		weight
	}

	/// Natural log of [`Sampler::weight`], summed factor by factor so that
	/// heavily featured candidates do not overflow.
	fn log_weight(&self, candidate: &Token, targets: &HashSet<String>) -> f64 {
		let mut log_weight = 0.0;
		if candidate.is_target() {
			log_weight += self.target_boost.ln();
		}
		for feature in candidate.features() {
			if targets.contains(&feature.token) {
				log_weight += (feature.score * self.feature_boost).ln_1p();
			}
		}
		log_weight
	}

	/// Picks the next token from `bucket`.
	///
	/// Returns `None` on an empty bucket (dead end).
	pub fn sample<'a, R: Rng + ?Sized>(
		&self,
		bucket: &'a [Token],
		targets: &HashSet<String>,
		rng: &mut R,
	) -> Option<&'a Token> {
		if self.strategy == SamplingStrategy::Uniform {
			return bucket.choose(rng);
		}

		// Weights relative to the heaviest candidate, so the largest is 1.0.
		let logs: Vec<f64> = bucket.iter().map(|candidate| self.log_weight(candidate, targets)).collect();
		let max = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
		if !max.is_finite() {
			return bucket.choose(rng);
		}
		let weights: Vec<f64> = logs.iter().map(|log| (log - max).exp()).collect();
		let total: f64 = weights.iter().sum();
		if !(total > 0.0 && total.is_finite()) {
			return bucket.choose(rng);
		}

		let mut r = rng.random::<f64>() * total;
		for (candidate, weight) in bucket.iter().zip(&weights) {
			r -= weight;
			if r <= 0.0 {
				return Some(candidate);
			}
		}

		// Rounding left a sliver of weight unspent.
		bucket.last()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use rand::SeedableRng;
	use rand::rngs::StdRng;

	use super::*;
	use crate::model::token::Feature;

	fn targets() -> HashSet<String> {
		["猫".to_owned()].into_iter().collect()
	}

	fn bucket() -> Vec<Token> {
		let features: Arc<[Feature]> = Arc::from(vec![Feature { offset: -1, token: "猫".into(), score: 0.6 }]);
		vec![Token::plain("犬"), Token::plain("鳥"), Token::target("猫", features), Token::plain("魚")]
	}

	#[test]
	fn empty_bucket_is_a_dead_end() {
		let mut rng = StdRng::seed_from_u64(1);
		let sampler = Sampler::new(SamplingStrategy::Weighted, 4.0, 5.0);
		assert!(sampler.sample(&[], &targets(), &mut rng).is_none());
		assert!(Sampler::uniform().sample(&[], &targets(), &mut rng).is_none());
	}

	#[test]
	fn weight_combines_target_and_feature_boosts() {
		let sampler = Sampler::new(SamplingStrategy::Weighted, 4.0, 5.0);
		let bucket = bucket();
		assert_eq!(sampler.weight(&bucket[0], &targets()), 1.0);
		assert!((sampler.weight(&bucket[2], &targets()) - 4.0 * 4.0).abs() < 1e-12);
		// Features on tokens outside the target set do not count.
		assert_eq!(sampler.weight(&bucket[2], &HashSet::new()), 4.0);
	}

	#[test]
	fn weighted_sampling_favours_featured_targets() {
		let trials = 20_000;
		let bucket = bucket();
		let weighted = Sampler::new(SamplingStrategy::Weighted, 4.0, 5.0);
		let uniform = Sampler::uniform();

		let mut rng = StdRng::seed_from_u64(7);
		let hits = |sampler: &Sampler, rng: &mut StdRng| {
			(0..trials)
				.filter(|_| sampler.sample(&bucket, &targets(), rng).is_some_and(Token::is_target))
				.count()
		};
		let weighted_hits = hits(&weighted, &mut rng);
		let uniform_hits = hits(&uniform, &mut rng);

		// Expected: 16/19 ≈ 0.84 weighted vs 1/4 uniform; allow a wide margin.
		let weighted_rate = weighted_hits as f64 / trials as f64;
		let uniform_rate = uniform_hits as f64 / trials as f64;
		assert!(weighted_rate > 0.78, "weighted rate {weighted_rate}");
		assert!(uniform_rate < 0.30, "uniform rate {uniform_rate}");
		assert!(weighted_hits > uniform_hits);
	}

	#[test]
	fn huge_feature_boosts_keep_their_weight() {
		let features: Arc<[Feature]> =
			Arc::from((0..400).map(|i| Feature { offset: i + 1, token: "猫".into(), score: 1.0 }).collect::<Vec<_>>());
		let bucket = vec![Token::plain("犬"), Token::plain("鳥"), Token::target("猫", features), Token::plain("魚")];
		let sampler = Sampler::new(SamplingStrategy::Weighted, 4.0, 5.0);
		assert!(sampler.weight(&bucket[2], &targets()).is_infinite());

		let mut rng = StdRng::seed_from_u64(11);
		let hits = (0..2_000)
			.filter(|_| sampler.sample(&bucket, &targets(), &mut rng).is_some_and(Token::is_target))
			.count();
		assert_eq!(hits, 2_000);
	}

	#[test]
	fn zero_weights_fall_back_to_uniform() {
		let mut rng = StdRng::seed_from_u64(3);
		let sampler = Sampler::new(SamplingStrategy::Weighted, 0.0, 0.0);
		let only_targets = vec![Token::target("猫", Arc::from(Vec::new()))];
		assert_eq!(sampler.sample(&only_targets, &targets(), &mut rng).map(Token::text), Some("猫"));
	}
}

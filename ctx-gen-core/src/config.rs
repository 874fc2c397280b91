use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GenError;
use crate::model::embedder::FeatureScope;
use crate::model::sampler::{Sampler, SamplingStrategy};

/// Upper bound on `gen_length`; a request runs on a shared worker.
pub const MAX_GEN_LENGTH: usize = 10_000;
/// Upper bound on `max_extend`.
pub const MAX_EXTEND: usize = 1_000;

/// Options of a single generation request.
///
/// Every field has a default, so a partial TOML table or JSON object is a
/// valid configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GenerationConfig {
	/// Context window radius (N) around target tokens.
	#[serde(default = "default_window")]
	pub window: usize,
	/// Exponent applied to conditional frequencies.
	#[serde(default = "default_power")]
	pub power: f64,
	/// Minimum score of a selected feature, in `[0, 1]`.
	#[serde(default = "default_threshold")]
	pub threshold: f64,
	/// Markov order.
	#[serde(default = "default_ngram")]
	pub ngram: usize,
	/// Target number of body tokens.
	#[serde(default = "default_gen_length")]
	pub gen_length: usize,
	/// Cap on tokens appended while looking for a sentence end.
	#[serde(default = "default_max_extend")]
	pub max_extend: usize,
	/// Pause after each emitted token, in milliseconds.
	#[serde(default)]
	pub delay_ms: u64,
	/// Run length used when tokenizing the corpus.
	#[serde(default = "default_corpus_max_run")]
	pub corpus_max_run: usize,
	/// Run length used when deriving targets from the seed phrase.
	#[serde(default = "default_seed_max_run")]
	pub seed_max_run: usize,
	#[serde(default)]
	pub sampling: SamplingStrategy,
	#[serde(default = "default_target_boost")]
	pub target_boost: f64,
	#[serde(default = "default_feature_boost")]
	pub feature_boost: f64,
	#[serde(default)]
	pub feature_scope: FeatureScope,
	/// Tokens kept on each side of the first target occurrence; 0 keeps the
	/// whole corpus.
	#[serde(default)]
	pub near_window: usize,
	/// Chunks tokenized between two yields.
	#[serde(default = "default_yield_every")]
	pub yield_every: usize,
}

fn default_window() -> usize {
	50
}

fn default_power() -> f64 {
	4.0
}

fn default_threshold() -> f64 {
	1e-7
}

fn default_ngram() -> usize {
	2
}

fn default_gen_length() -> usize {
	200
}

fn default_max_extend() -> usize {
	150
}

fn default_corpus_max_run() -> usize {
	10
}

fn default_seed_max_run() -> usize {
	3
}

fn default_target_boost() -> f64 {
	4.0
}

fn default_feature_boost() -> f64 {
	5.0
}

fn default_yield_every() -> usize {
	1
}

impl Default for GenerationConfig {
	fn default() -> Self {
		Self {
			window: default_window(),
			power: default_power(),
			threshold: default_threshold(),
			ngram: default_ngram(),
			gen_length: default_gen_length(),
			max_extend: default_max_extend(),
			delay_ms: 0,
			corpus_max_run: default_corpus_max_run(),
			seed_max_run: default_seed_max_run(),
			sampling: SamplingStrategy::default(),
			target_boost: default_target_boost(),
			feature_boost: default_feature_boost(),
			feature_scope: FeatureScope::default(),
			near_window: 0,
			yield_every: default_yield_every(),
		}
	}
}

impl GenerationConfig {
	/// Checks every option against its domain.
	///
	/// # Errors
	/// Returns `InvalidParameter` naming the first offending field.
	pub fn validate(&self) -> Result<(), GenError> {
		if self.window == 0 {
			return Err(GenError::invalid("window", "must be >= 1"));
		}
		if !self.power.is_finite() || self.power <= 0.0 {
			return Err(GenError::invalid("power", format!("must be a positive number, got {}", self.power)));
		}
		if !(0.0..=1.0).contains(&self.threshold) {
			return Err(GenError::invalid("threshold", format!("must be within [0, 1], got {}", self.threshold)));
		}
		if self.ngram == 0 {
			return Err(GenError::invalid("ngram", "must be >= 1"));
		}
		if self.gen_length > MAX_GEN_LENGTH {
			return Err(GenError::invalid("gen_length", format!("must be <= {MAX_GEN_LENGTH}, got {}", self.gen_length)));
		}
		if self.max_extend > MAX_EXTEND {
			return Err(GenError::invalid("max_extend", format!("must be <= {MAX_EXTEND}, got {}", self.max_extend)));
		}
		if self.corpus_max_run == 0 {
			return Err(GenError::invalid("corpus_max_run", "must be >= 1"));
		}
		if self.seed_max_run == 0 {
			return Err(GenError::invalid("seed_max_run", "must be >= 1"));
		}
		if !self.target_boost.is_finite() || self.target_boost < 0.0 {
			return Err(GenError::invalid("target_boost", format!("must be >= 0, got {}", self.target_boost)));
		}
		if !self.feature_boost.is_finite() || self.feature_boost < 0.0 {
			return Err(GenError::invalid("feature_boost", format!("must be >= 0, got {}", self.feature_boost)));
		}
		if self.yield_every == 0 {
			return Err(GenError::invalid("yield_every", "must be >= 1"));
		}
		Ok(())
	}

	pub fn delay(&self) -> Duration {
		Duration::from_millis(self.delay_ms)
	}

	pub fn sampler(&self) -> Sampler {
		Sampler::new(self.sampling, self.target_boost, self.feature_boost)
	}
}

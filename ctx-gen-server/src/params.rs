use ctx_gen_core::config::GenerationConfig;
use ctx_gen_core::error::GenError;
use ctx_gen_core::model::embedder::FeatureScope;
use ctx_gen_core::model::sampler::SamplingStrategy;
use serde::Deserialize;

/// Query parameters of the `/v1/generate` endpoint.
///
/// Integers are read signed so that a negative value reaches validation
/// and comes back as an `invalid_parameter` event instead of a bare 400.
#[derive(Deserialize, Default, Debug)]
pub struct GenerateParams {
	pub seed: Option<String>,
	pub window: Option<i64>,
	pub power: Option<f64>,
	pub threshold: Option<f64>,
	pub ngram: Option<i64>,
	pub gen_length: Option<i64>,
	pub max_extend: Option<i64>,
	pub delay_ms: Option<i64>,
	pub near_window: Option<i64>,
	pub sampling: Option<SamplingStrategy>,
	pub feature_scope: Option<FeatureScope>,
	pub target_boost: Option<f64>,
	pub feature_boost: Option<f64>,
}

impl GenerateParams {
	/// Overlays the request's options on the server defaults.
	pub fn config(&self, defaults: &GenerationConfig) -> Result<GenerationConfig, GenError> {
		let mut config = defaults.clone();

		if let Some(value) = self.window {
			config.window = non_negative("window", value)?;
		}
		if let Some(value) = self.ngram {
			config.ngram = non_negative("ngram", value)?;
		}
		if let Some(value) = self.gen_length {
			config.gen_length = non_negative("gen_length", value)?;
		}
		if let Some(value) = self.max_extend {
			config.max_extend = non_negative("max_extend", value)?;
		}
		if let Some(value) = self.delay_ms {
			config.delay_ms = non_negative("delay_ms", value)?;
		}
		if let Some(value) = self.near_window {
			config.near_window = non_negative("near_window", value)?;
		}
		config.power = self.power.unwrap_or(config.power);
		config.threshold = self.threshold.unwrap_or(config.threshold);
		config.sampling = self.sampling.unwrap_or(config.sampling);
		config.feature_scope = self.feature_scope.unwrap_or(config.feature_scope);
		config.target_boost = self.target_boost.unwrap_or(config.target_boost);
		config.feature_boost = self.feature_boost.unwrap_or(config.feature_boost);

		config.validate()?;
		Ok(config)
	}

	pub fn seed(&self) -> &str {
		self.seed.as_deref().unwrap_or_default()
	}
}

fn non_negative<T: TryFrom<i64>>(field: &'static str, value: i64) -> Result<T, GenError> {
	T::try_from(value).map_err(|_| GenError::invalid(field, format!("must be a non-negative integer, got {value}")))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unset_options_take_defaults() {
		let config = GenerateParams::default().config(&GenerationConfig::default()).unwrap();
		assert_eq!(config, GenerationConfig::default());
	}

	#[test]
	fn set_options_override_defaults() {
		let params = GenerateParams {
			ngram: Some(3),
			power: Some(2.0),
			sampling: Some(SamplingStrategy::Uniform),
			..Default::default()
		};
		let config = params.config(&GenerationConfig::default()).unwrap();
		assert_eq!(config.ngram, 3);
		assert_eq!(config.power, 2.0);
		assert_eq!(config.sampling, SamplingStrategy::Uniform);
		assert_eq!(config.window, 50);
	}

	#[test]
	fn negative_window_is_an_invalid_parameter() {
		let params = GenerateParams { window: Some(-1), ..Default::default() };
		match params.config(&GenerationConfig::default()) {
			Err(GenError::InvalidParameter { field, .. }) => assert_eq!(field, "window"),
			other => panic!("unexpected {other:?}"),
		}
	}

	#[test]
	fn zero_ngram_fails_validation() {
		let params = GenerateParams { ngram: Some(0), ..Default::default() };
		assert!(params.config(&GenerationConfig::default()).is_err());
	}

	#[test]
	fn oversized_gen_length_is_rejected() {
		let params = GenerateParams { gen_length: Some(5_000_000), ..Default::default() };
		match params.config(&GenerationConfig::default()) {
			Err(GenError::InvalidParameter { field, .. }) => assert_eq!(field, "gen_length"),
			other => panic!("unexpected {other:?}"),
		}
	}
}

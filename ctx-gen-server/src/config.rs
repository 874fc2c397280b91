use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ctx_gen_core::config::GenerationConfig;
use ctx_gen_core::corpus::DEFAULT_CHUNK_SIZE;
use ctx_gen_core::io::normalize_folder;
use serde::Deserialize;

/// Server settings, read from TOML.
///
/// The file is located by `CTX_GEN_CONFIG`, falling back to
/// `./ctx-gen.toml`; a missing file means defaults everywhere.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
	#[serde(default = "default_host")]
	pub host: String,
	#[serde(default = "default_port")]
	pub port: u16,
	#[serde(default = "default_data_dir")]
	pub data_dir: String,
	/// Characters per corpus chunk.
	#[serde(default = "default_chunk_size")]
	pub chunk_size: usize,
	/// Largest accepted corpus upload, in bytes.
	#[serde(default = "default_max_payload")]
	pub max_payload: usize,
	/// Generation options used when a request leaves them unset.
	#[serde(default)]
	pub generation: GenerationConfig,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			host: default_host(),
			port: default_port(),
			data_dir: default_data_dir(),
			chunk_size: default_chunk_size(),
			max_payload: default_max_payload(),
			generation: GenerationConfig::default(),
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	Read { path: PathBuf, source: std::io::Error },
	#[error("failed to parse TOML from {path}: {source}")]
	Parse { path: PathBuf, source: toml::de::Error },
	#[error("invalid default generation options: {0}")]
	Generation(#[from] ctx_gen_core::error::GenError),
}

impl ServerConfig {
	pub fn load() -> Result<Self, ConfigError> {
		let path = resolve_config_path();
		if !path.exists() {
			return Ok(ServerConfig::default());
		}

		let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read { path: path.clone(), source })?;
		Self::parse(&raw, &path)
	}

	fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
		let parsed: ServerConfig =
			toml::from_str(raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
		parsed.generation.validate()?;
		Ok(parsed)
	}

	pub fn data_path(&self) -> PathBuf {
		normalize_folder(&self.data_dir)
	}
}

fn resolve_config_path() -> PathBuf {
	match env::var("CTX_GEN_CONFIG") {
		Ok(path) => PathBuf::from(path),
		Err(_) => PathBuf::from("./ctx-gen.toml"),
	}
}

fn default_host() -> String {
	"127.0.0.1".to_owned()
}

fn default_port() -> u16 {
	5000
}

fn default_data_dir() -> String {
	"./data".to_owned()
}

fn default_chunk_size() -> usize {
	DEFAULT_CHUNK_SIZE
}

fn default_max_payload() -> usize {
	64 * 1024 * 1024
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partial_file_keeps_defaults() {
		let config = ServerConfig::parse(
			"port = 8080\n[generation]\nngram = 3\ndelay_ms = 20\n",
			Path::new("test.toml"),
		)
		.unwrap();

		assert_eq!(config.port, 8080);
		assert_eq!(config.host, "127.0.0.1");
		assert_eq!(config.chunk_size, 80_000);
		assert_eq!(config.generation.ngram, 3);
		assert_eq!(config.generation.delay_ms, 20);
		assert_eq!(config.generation.window, 50);
	}

	#[test]
	fn invalid_generation_defaults_are_rejected() {
		let err = ServerConfig::parse("[generation]\nthreshold = 3.0\n", Path::new("test.toml")).unwrap_err();
		assert!(matches!(err, ConfigError::Generation(_)));
	}

	#[test]
	fn malformed_toml_names_the_file() {
		let err = ServerConfig::parse("port = \"x\"", Path::new("bad.toml")).unwrap_err();
		assert!(err.to_string().contains("bad.toml"));
	}
}

use std::io;

use serde::{Deserialize, Serialize};

/// Errors surfaced to the caller of a generation request.
///
/// Statistical degeneracies (no target found, no feature selected, no
/// sentence mark) are not errors and never appear here.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
	#[error("no corpus loaded or corpus has no tokens")]
	EmptyCorpus,

	#[error("seed phrase is empty")]
	EmptySeed,

	#[error("invalid value for {field}: {reason}")]
	InvalidParameter { field: &'static str, reason: String },

	#[error("generation cancelled")]
	Cancelled,

	#[error("IO error: {0}")]
	Io(#[from] io::Error),

	#[error("corpus cache error: {0}")]
	Cache(#[from] postcard::Error),
}

/// Machine-readable error kind carried by error events.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	EmptyCorpus,
	EmptySeed,
	InvalidParameter,
	Cancelled,
	Io,
	Cache,
}

impl GenError {
	pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
		GenError::InvalidParameter { field, reason: reason.into() }
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			GenError::EmptyCorpus => ErrorKind::EmptyCorpus,
			GenError::EmptySeed => ErrorKind::EmptySeed,
			GenError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
			GenError::Cancelled => ErrorKind::Cancelled,
			GenError::Io(_) => ErrorKind::Io,
			GenError::Cache(_) => ErrorKind::Cache,
		}
	}

	/// Whether the error comes from the caller's input rather than the host.
	pub fn is_client_error(&self) -> bool {
		matches!(
			self,
			GenError::EmptyCorpus | GenError::EmptySeed | GenError::InvalidParameter { .. }
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kinds_serialize_as_snake_case() {
		let kind = GenError::invalid("ngram", "must be >= 1").kind();
		assert_eq!(serde_json::to_string(&kind).unwrap(), "\"invalid_parameter\"");
		assert_eq!(serde_json::to_string(&GenError::EmptyCorpus.kind()).unwrap(), "\"empty_corpus\"");
	}

	#[test]
	fn client_errors_are_flagged() {
		assert!(GenError::EmptySeed.is_client_error());
		assert!(!GenError::Cancelled.is_client_error());
		let io_err = GenError::from(io::Error::new(io::ErrorKind::NotFound, "missing"));
		assert!(!io_err.is_client_error());
		assert_eq!(io_err.kind(), ErrorKind::Io);
	}

	#[test]
	fn invalid_parameter_message_names_the_field() {
		let err = GenError::invalid("threshold", "must be within [0, 1], got 2");
		assert_eq!(err.to_string(), "invalid value for threshold: must be within [0, 1], got 2");
	}
}

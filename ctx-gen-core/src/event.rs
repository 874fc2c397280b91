use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, GenError};

/// Event emitted to the host.
///
/// A generation stream is zero or more `StreamToken` events followed by
/// exactly one terminal event: `StreamEnd` or `Error`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
	/// Informational acknowledgement (corpus initialization).
	Log { msg: String },
	/// One rendered token.
	StreamToken { token: String },
	/// Successful completion. `empty_model` distinguishes "the corpus was
	/// too short to model" from a normal short result.
	StreamEnd { empty_model: bool, tokens: usize },
	/// Failure; no token follows.
	Error { kind: ErrorKind, msg: String },
}

impl Event {
	pub fn token(text: impl Into<String>) -> Self {
		Event::StreamToken { token: text.into() }
	}

	pub fn error(err: &GenError) -> Self {
		Event::Error { kind: err.kind(), msg: err.to_string() }
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, Event::StreamEnd { .. } | Event::Error { .. })
	}
}

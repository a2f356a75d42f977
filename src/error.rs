//! Error types for model construction, persistence and inference.

use std::path::PathBuf;
use thiserror::Error;

use crate::persist::EXTENSION;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
	#[error("invalid path {path:?}: save/load path must be a stem or a `.{ext}` file", ext = EXTENSION)]
	InvalidPath { path: PathBuf },

	#[error("invalid argument `{name}`: {reason}")]
	InvalidArgument { name: String, reason: String },

	#[error("model not fitted")]
	NotFitted,

	#[error("shape mismatch: expected {expected} features, got {actual}")]
	ShapeMismatch { expected: usize, actual: usize },

	#[error("dataset error: {0}")]
	Dataset(String),

	#[error("state file error: {0}")]
	Format(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("config parse error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	pub fn invalid_argument(name: &str, reason: impl Into<String>) -> Self {
		Error::InvalidArgument {
			name: name.to_string(),
			reason: reason.into(),
		}
	}
}

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
	#[error(transparent)]
	Core(#[from] hqe::Error),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Test runner '{0}' not found on PATH (set HQE_RUNNER or pass --runner)")]
	RunnerNotFound(String),

	#[error("Cannot import {path}: {reason}")]
	Import { path: PathBuf, reason: String },
}

//! Error types for the session cache, setup gate and poller.

use std::path::PathBuf;

use thiserror::Error;

use crate::poll::PollTimeoutError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Invalid configuration for {key}: {message}")]
	Config { key: &'static str, message: String },

	#[error("Invalid environment name '{0}': use letters, digits, '-' or '_'")]
	InvalidEnvironment(String),

	#[error("Failed to write session snapshot to {path}: {source}")]
	Persist {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Login failed for environment '{environment}': {reason}")]
	LoginFailed { environment: String, reason: String },

	#[error("Setup phase failed, dependent work is blocked: {reason}")]
	SetupBlocked { reason: String },

	#[error(transparent)]
	PollTimeout(#[from] PollTimeoutError),

	#[error("Trigger action failed: {0}")]
	Trigger(String),
}

impl Error {
	pub(crate) fn config(key: &'static str, message: impl Into<String>) -> Self {
		Self::Config {
			key,
			message: message.into(),
		}
	}

	pub(crate) fn login(environment: &str, reason: impl Into<String>) -> Self {
		Self::LoginFailed {
			environment: environment.to_string(),
			reason: reason.into(),
		}
	}
}

//! Setup phase: reuse the cached session or run the configured login.

use std::sync::Arc;

use async_trait::async_trait;
use hqe::config::ENV_LOGIN_CMD;
use hqe::{AuthenticatedSession, Authenticator, CommandAuthenticator, Config, LoginRequest, SessionGate, SessionSnapshot, SetupOutcome};
use serde::Serialize;

use crate::error::Result;
use crate::output::{OutputFormat, print_json};

/// Stands in when no login command is configured; only fails if a login is actually needed.
struct Unconfigured(String);

#[async_trait]
impl Authenticator for Unconfigured {
	async fn login(&self, _request: &LoginRequest) -> hqe::Result<SessionSnapshot> {
		Err(hqe::Error::Config {
			key: ENV_LOGIN_CMD,
			message: self.0.clone(),
		})
	}
}

pub(crate) fn authenticator(config: &Config) -> Arc<dyn Authenticator> {
	match CommandAuthenticator::from_config(config) {
		Ok(driver) => Arc::new(driver),
		Err(err) => Arc::new(Unconfigured(format!("a login is required but {err}"))),
	}
}

/// Builds the gate for `config`; fails up front when credentials are missing.
pub(crate) fn gate(config: &Config) -> Result<SessionGate> {
	Ok(SessionGate::from_config(config, authenticator(config))?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SetupSummary {
	pub environment: String,
	pub outcome: SetupOutcome,
	pub path: String,
}

impl SetupSummary {
	pub(crate) fn new(config: &Config, session: &AuthenticatedSession) -> Self {
		Self {
			environment: config.environment.to_string(),
			outcome: session.outcome,
			path: session.cached.path.display().to_string(),
		}
	}

	pub(crate) fn print(&self, format: OutputFormat) -> Result<()> {
		if format == OutputFormat::Json {
			return print_json(self);
		}
		match self.outcome {
			SetupOutcome::Reused => println!("Reusing cached session for '{}' ({})", self.environment, self.path),
			SetupOutcome::Refreshed => println!("Logged in to '{}', session saved to {}", self.environment, self.path),
		}
		Ok(())
	}
}

pub async fn execute(config: &Config, format: OutputFormat) -> Result<i32> {
	let gate = gate(config)?;
	let session = gate.ensure().await?;
	SetupSummary::new(config, &session).print(format)?;
	Ok(0)
}

//! Login drivers: the interactive login flow behind a trait.
//!
//! The browser is an external collaborator. A driver performs the login
//! against the running application and hands back the captured snapshot.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use hq_e2e_protocol::SessionSnapshot;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{Config, ENV_FEATURE_FLAGS, Credentials, Environment, LoginCommand};
use crate::error::{Error, Result};

/// Variable naming the file an external login program writes the snapshot to.
pub const LOGIN_ENV_OUTPUT: &str = "HQE_STORAGE_STATE_OUT";

const STDERR_TAIL_LINES: usize = 20;

/// Everything a driver needs to log in to one environment.
#[derive(Debug, Clone)]
pub struct LoginRequest {
	pub environment: Environment,
	pub base_url: String,
	pub credentials: Credentials,
}

impl LoginRequest {
	/// Builds a request from config, failing early when credentials are missing.
	pub fn from_config(config: &Config) -> Result<Self> {
		Ok(Self {
			environment: config.environment.clone(),
			base_url: config.base_url.to_string(),
			credentials: config.require_credentials()?.clone(),
		})
	}
}

/// Performs the interactive login and captures the resulting session.
#[async_trait]
pub trait Authenticator: Send + Sync {
	async fn login(&self, request: &LoginRequest) -> Result<SessionSnapshot>;
}

/// Application feature flags written into client-side storage after login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFlags(Vec<(String, String)>);

impl FeatureFlags {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.0.push((name.into(), value.into()));
		self
	}

	/// Parses `name=value` pairs separated by commas.
	pub fn parse(raw: &str) -> Result<Self> {
		let mut flags = Self::new();
		for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
			let (name, value) = pair
				.split_once('=')
				.ok_or_else(|| Error::config(ENV_FEATURE_FLAGS, format!("'{pair}' is not a name=value pair")))?;
			let name = name.trim();
			if name.is_empty() {
				return Err(Error::config(ENV_FEATURE_FLAGS, format!("'{pair}' has an empty name")));
			}
			flags.0.push((name.to_string(), value.trim().to_string()));
		}
		Ok(flags)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Writes every flag into `origin`'s storage, later flags overriding earlier ones.
	pub fn apply(&self, snapshot: &mut SessionSnapshot, origin: &str) {
		for (name, value) in self.iter() {
			snapshot.set_entry(origin, name, value);
		}
	}
}

/// Runs an external login program that writes a storage-state file.
///
/// The program receives `HQE_ENV`, `HQE_BASE_URL`, `HQE_USERNAME`,
/// `HQE_PASSWORD` and `HQE_STORAGE_STATE_OUT` in its environment and must
/// write the captured snapshot to the latter before exiting successfully.
#[derive(Debug, Clone)]
pub struct CommandAuthenticator {
	command: LoginCommand,
	timeout: Duration,
	output: PathBuf,
}

impl CommandAuthenticator {
	pub fn new(command: LoginCommand, output: PathBuf) -> Self {
		Self {
			command,
			timeout: Duration::from_secs(120),
			output,
		}
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	/// Driver configured from `HQE_LOGIN_CMD`; the capture file lives next to the cache.
	pub fn from_config(config: &Config) -> Result<Self> {
		let output = config
			.auth_dir
			.join(format!(".{}.login.json", config.environment));
		Ok(Self::new(config.require_login_command()?.clone(), output).with_timeout(config.login_timeout))
	}
}

#[async_trait]
impl Authenticator for CommandAuthenticator {
	async fn login(&self, request: &LoginRequest) -> Result<SessionSnapshot> {
		let env = request.environment.as_str();
		if let Some(parent) = self.output.parent() {
			if !parent.as_os_str().is_empty() {
				tokio::fs::create_dir_all(parent).await?;
			}
		}
		match tokio::fs::remove_file(&self.output).await {
			Ok(()) => {}
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
			Err(err) => return Err(err.into()),
		}

		info!(target = "hqe", %env, program = %self.command.program, url = %request.base_url, "running login command");

		// The capture holds live tokens; only the cache keeps a copy.
		let captured = self.run(request).await;
		if let Err(err) = tokio::fs::remove_file(&self.output).await {
			if err.kind() != std::io::ErrorKind::NotFound {
				warn!(target = "hqe", path = %self.output.display(), error = %err, "could not remove login capture");
			}
		}
		captured
	}
}

impl CommandAuthenticator {
	async fn run(&self, request: &LoginRequest) -> Result<SessionSnapshot> {
		let env = request.environment.as_str();
		let child = Command::new(&self.command.program)
			.args(&self.command.args)
			.env("HQE_ENV", env)
			.env("HQE_BASE_URL", &request.base_url)
			.env("HQE_USERNAME", &request.credentials.username)
			.env("HQE_PASSWORD", &request.credentials.password)
			.env(LOGIN_ENV_OUTPUT, &self.output)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| Error::login(env, format!("could not start '{}': {e}", self.command.program)))?;

		let output = tokio::time::timeout(self.timeout, child.wait_with_output())
			.await
			.map_err(|_| Error::login(env, format!("login command timed out after {:?}", self.timeout)))??;

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			return Err(Error::login(env, format!("login command exited with {}: {}", output.status, tail(&stderr))));
		}
		debug!(target = "hqe", %env, stdout = %tail(&String::from_utf8_lossy(&output.stdout)), "login command finished");

		let content = tokio::fs::read_to_string(&self.output)
			.await
			.map_err(|e| Error::login(env, format!("login command did not write {}: {e}", self.output.display())))?;
		let snapshot = SessionSnapshot::from_json(&content)
			.map_err(|e| Error::login(env, format!("captured session in {} is malformed: {e}", self.output.display())))?;

		Ok(snapshot)
	}
}

fn tail(text: &str) -> String {
	let lines: Vec<&str> = text.trim_end().lines().collect();
	let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
	lines[start..].join("\n")
}

//! Environment-driven configuration, validated eagerly.
//!
//! Every value comes from `HQE_*` variables. [`Config::from_lookup`] takes the
//! lookup as a closure so callers (and tests) can layer overrides on top of
//! the process environment.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::session::{FeatureFlags, SessionCache};

pub const ENV_ENVIRONMENT: &str = "HQE_ENV";
pub const ENV_BASE_URL: &str = "HQE_BASE_URL";
pub const ENV_USERNAME: &str = "HQE_USERNAME";
pub const ENV_PASSWORD: &str = "HQE_PASSWORD";
pub const ENV_AUTH_DIR: &str = "HQE_AUTH_DIR";
pub const ENV_SESSION_EXPIRY: &str = "HQE_SESSION_EXPIRY";
pub const ENV_SESSION_MAX_AGE: &str = "HQE_SESSION_MAX_AGE_SECS";
pub const ENV_LOGIN_CMD: &str = "HQE_LOGIN_CMD";
pub const ENV_LOGIN_TIMEOUT: &str = "HQE_LOGIN_TIMEOUT_SECS";
pub const ENV_FEATURE_FLAGS: &str = "HQE_FEATURE_FLAGS";

const DEFAULT_ENVIRONMENT: &str = "local";
const DEFAULT_AUTH_DIR: &str = ".auth";
const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(120);

/// Default snapshot age threshold (23 hours).
pub const DEFAULT_SESSION_MAX_AGE: Duration = Duration::from_secs(23 * 60 * 60);

/// Name of a target environment; doubles as the session cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Environment(String);

impl Environment {
	pub fn parse(name: &str) -> Result<Self> {
		let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
		if !valid {
			return Err(Error::InvalidEnvironment(name.to_string()));
		}
		Ok(Self(name.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Environment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for Environment {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Self::parse(s)
	}
}

/// How snapshot expiry is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryMode {
	/// Token `exp` claim when one is found, snapshot age otherwise.
	#[default]
	TokenOrAge,
	/// Snapshot age only.
	Age,
	/// Any non-empty snapshot stays valid.
	Never,
}

impl FromStr for ExpiryMode {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"token-or-age" | "token" => Ok(Self::TokenOrAge),
			"age" => Ok(Self::Age),
			"never" | "none" => Ok(Self::Never),
			other => Err(Error::config(
				ENV_SESSION_EXPIRY,
				format!("unknown mode '{other}' (expected token-or-age, age or never)"),
			)),
		}
	}
}

impl fmt::Display for ExpiryMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::TokenOrAge => "token-or-age",
			Self::Age => "age",
			Self::Never => "never",
		})
	}
}

/// Expiry mode plus the age threshold used by the age check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
	pub mode: ExpiryMode,
	pub max_age: Duration,
}

impl Default for ExpiryPolicy {
	fn default() -> Self {
		Self {
			mode: ExpiryMode::default(),
			max_age: DEFAULT_SESSION_MAX_AGE,
		}
	}
}

impl ExpiryPolicy {
	pub fn never() -> Self {
		Self {
			mode: ExpiryMode::Never,
			..Self::default()
		}
	}

	pub fn age(max_age: Duration) -> Self {
		Self {
			mode: ExpiryMode::Age,
			max_age,
		}
	}

	pub fn with_max_age(mut self, max_age: Duration) -> Self {
		self.max_age = max_age;
		self
	}
}

/// Login credential pair. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
	pub username: String,
	pub password: String,
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// External login program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCommand {
	pub program: String,
	pub args: Vec<String>,
}

impl LoginCommand {
	/// Splits on whitespace; the first word is the program.
	pub fn parse(line: &str) -> Result<Self> {
		let mut words = line.split_whitespace().map(str::to_string);
		let program = words
			.next()
			.ok_or_else(|| Error::config(ENV_LOGIN_CMD, "command is empty"))?;
		Ok(Self {
			program,
			args: words.collect(),
		})
	}
}

/// The subset of configuration needed to locate and judge the session cache.
#[derive(Debug, Clone)]
pub struct CacheSettings {
	pub environment: Environment,
	pub auth_dir: PathBuf,
	pub expiry: ExpiryPolicy,
}

impl CacheSettings {
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let environment = match read(&lookup, ENV_ENVIRONMENT) {
			Some(name) => Environment::parse(&name)?,
			None => Environment::parse(DEFAULT_ENVIRONMENT)?,
		};

		let mut expiry = ExpiryPolicy::default();
		if let Some(mode) = read(&lookup, ENV_SESSION_EXPIRY) {
			expiry.mode = mode.parse()?;
		}
		if let Some(secs) = read(&lookup, ENV_SESSION_MAX_AGE) {
			expiry.max_age = Duration::from_secs(parse_secs(ENV_SESSION_MAX_AGE, &secs)?);
		}

		Ok(Self {
			environment,
			auth_dir: read(&lookup, ENV_AUTH_DIR)
				.map(PathBuf::from)
				.unwrap_or_else(|| PathBuf::from(DEFAULT_AUTH_DIR)),
			expiry,
		})
	}

	/// Session cache keyed by this environment, judged under this policy.
	pub fn session_cache(&self) -> SessionCache {
		SessionCache::new(&self.auth_dir, self.environment.clone()).with_policy(self.expiry)
	}
}

#[derive(Debug, Clone)]
pub struct Config {
	pub environment: Environment,
	pub base_url: Url,
	pub auth_dir: PathBuf,
	pub credentials: Option<Credentials>,
	pub expiry: ExpiryPolicy,
	pub login_command: Option<LoginCommand>,
	pub login_timeout: Duration,
	pub feature_flags: FeatureFlags,
}

impl Config {
	/// Loads configuration from the process environment.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Loads configuration through `lookup`. Blank values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let CacheSettings {
			environment,
			auth_dir,
			expiry,
		} = CacheSettings::from_lookup(&lookup)?;

		let raw_url = read(&lookup, ENV_BASE_URL).ok_or_else(|| {
			Error::config(ENV_BASE_URL, "not set; point it at the HQ Admin application, e.g. https://hq.example.com")
		})?;
		let base_url = parse_base_url(&raw_url)?;

		let credentials = match (read(&lookup, ENV_USERNAME), read(&lookup, ENV_PASSWORD)) {
			(Some(username), Some(password)) => Some(Credentials { username, password }),
			(None, None) => None,
			(Some(_), None) => return Err(Error::config(ENV_PASSWORD, format!("not set but {ENV_USERNAME} is"))),
			(None, Some(_)) => return Err(Error::config(ENV_USERNAME, format!("not set but {ENV_PASSWORD} is"))),
		};

		let login_command = read(&lookup, ENV_LOGIN_CMD)
			.map(|line| LoginCommand::parse(&line))
			.transpose()?;

		let login_timeout = match read(&lookup, ENV_LOGIN_TIMEOUT) {
			Some(secs) => Duration::from_secs(parse_secs(ENV_LOGIN_TIMEOUT, &secs)?),
			None => DEFAULT_LOGIN_TIMEOUT,
		};

		let feature_flags = match read(&lookup, ENV_FEATURE_FLAGS) {
			Some(raw) => FeatureFlags::parse(&raw)?,
			None => FeatureFlags::default(),
		};

		Ok(Self {
			environment,
			base_url,
			auth_dir,
			credentials,
			expiry,
			login_command,
			login_timeout,
			feature_flags,
		})
	}

	/// Credentials, or a descriptive error naming the missing variables.
	pub fn require_credentials(&self) -> Result<&Credentials> {
		self.credentials.as_ref().ok_or_else(|| {
			Error::config(
				ENV_USERNAME,
				format!("{ENV_USERNAME} and {ENV_PASSWORD} must be set to log in to '{}'", self.environment),
			)
		})
	}

	pub fn require_login_command(&self) -> Result<&LoginCommand> {
		self.login_command.as_ref().ok_or_else(|| {
			Error::config(ENV_LOGIN_CMD, "not set; it names the program that performs the interactive login")
		})
	}

	/// Origin (scheme + host + port) of the application under test.
	pub fn application_origin(&self) -> String {
		self.base_url.origin().ascii_serialization()
	}

	pub fn session_cache(&self) -> SessionCache {
		SessionCache::new(&self.auth_dir, self.environment.clone()).with_policy(self.expiry)
	}
}

fn read<F>(lookup: &F, key: &str) -> Option<String>
where
	F: Fn(&str) -> Option<String>,
{
	lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_base_url(raw: &str) -> Result<Url> {
	let url = Url::parse(raw).map_err(|e| Error::config(ENV_BASE_URL, format!("'{raw}' is not a valid URL: {e}")))?;
	match url.scheme() {
		"http" | "https" => Ok(url),
		other => Err(Error::config(ENV_BASE_URL, format!("unsupported scheme '{other}' (expected http or https)"))),
	}
}

fn parse_secs(key: &'static str, raw: &str) -> Result<u64> {
	raw.parse::<u64>()
		.map_err(|_| Error::config(key, format!("'{raw}' is not a whole number of seconds")))
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	fn load(vars: &[(&str, &str)]) -> Result<Config> {
		let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
		Config::from_lookup(|key| map.get(key).cloned())
	}

	#[test]
	fn minimal_config_uses_defaults() {
		let config = load(&[(ENV_BASE_URL, "https://hq.example.com/admin")]).unwrap();

		assert_eq!(config.environment.as_str(), "local");
		assert_eq!(config.auth_dir, PathBuf::from(".auth"));
		assert_eq!(config.expiry, ExpiryPolicy::default());
		assert_eq!(config.expiry.max_age, Duration::from_secs(82_800));
		assert_eq!(config.login_timeout, Duration::from_secs(120));
		assert!(config.credentials.is_none());
		assert!(config.feature_flags.is_empty());
		assert_eq!(config.application_origin(), "https://hq.example.com");
	}

	#[test]
	fn missing_base_url_is_descriptive() {
		let err = load(&[]).unwrap_err();
		let msg = err.to_string();
		assert!(msg.contains(ENV_BASE_URL), "{msg}");
		assert!(msg.contains("not set"), "{msg}");
	}

	#[test]
	fn rejects_invalid_base_url_and_scheme() {
		let err = load(&[(ENV_BASE_URL, "not a url")]).unwrap_err();
		assert!(err.to_string().contains("not a valid URL"));

		let err = load(&[(ENV_BASE_URL, "ftp://hq.example.com")]).unwrap_err();
		assert!(err.to_string().contains("unsupported scheme 'ftp'"));
	}

	#[test]
	fn rejects_bad_environment_name() {
		let err = load(&[(ENV_BASE_URL, "https://hq.example.com"), (ENV_ENVIRONMENT, "../prod")]).unwrap_err();
		assert!(matches!(err, Error::InvalidEnvironment(ref name) if name == "../prod"));
	}

	#[test]
	fn half_a_credential_pair_is_an_error() {
		let err = load(&[(ENV_BASE_URL, "https://hq.example.com"), (ENV_USERNAME, "qa@hq.example.com")]).unwrap_err();
		assert!(err.to_string().contains(ENV_PASSWORD));
	}

	#[test]
	fn parses_expiry_overrides() {
		let config = load(&[
			(ENV_BASE_URL, "https://hq.example.com"),
			(ENV_SESSION_EXPIRY, "never"),
			(ENV_SESSION_MAX_AGE, "600"),
		])
		.unwrap();
		assert_eq!(config.expiry.mode, ExpiryMode::Never);
		assert_eq!(config.expiry.max_age, Duration::from_secs(600));

		let err = load(&[(ENV_BASE_URL, "https://hq.example.com"), (ENV_SESSION_EXPIRY, "sometimes")]).unwrap_err();
		assert!(err.to_string().contains("unknown mode 'sometimes'"));

		let err = load(&[(ENV_BASE_URL, "https://hq.example.com"), (ENV_SESSION_MAX_AGE, "1h")]).unwrap_err();
		assert!(err.to_string().contains("whole number of seconds"));
	}

	#[test]
	fn blank_values_count_as_unset() {
		let config = load(&[(ENV_BASE_URL, "https://hq.example.com"), (ENV_ENVIRONMENT, "  ")]).unwrap();
		assert_eq!(config.environment.as_str(), "local");
	}

	#[test]
	fn credentials_debug_redacts_password() {
		let config = load(&[
			(ENV_BASE_URL, "https://hq.example.com"),
			(ENV_USERNAME, "qa"),
			(ENV_PASSWORD, "hunter2"),
		])
		.unwrap();
		let debug = format!("{:?}", config.require_credentials().unwrap());
		assert!(debug.contains("qa"));
		assert!(!debug.contains("hunter2"));
	}

	#[test]
	fn login_command_splits_program_and_args() {
		let config = load(&[
			(ENV_BASE_URL, "https://hq.example.com"),
			(ENV_LOGIN_CMD, "node scripts/login.mjs --headless"),
		])
		.unwrap();
		let cmd = config.require_login_command().unwrap();
		assert_eq!(cmd.program, "node");
		assert_eq!(cmd.args, vec!["scripts/login.mjs", "--headless"]);
	}

	#[test]
	fn cache_settings_do_not_need_the_application_url() {
		let map: HashMap<String, String> = [(ENV_ENVIRONMENT.to_string(), "qa".to_string())].into();
		let settings = CacheSettings::from_lookup(|key| map.get(key).cloned()).unwrap();
		assert_eq!(settings.session_cache().path(), PathBuf::from(".auth/qa.json"));
	}

	#[test]
	fn session_cache_is_keyed_by_environment() {
		let config = load(&[
			(ENV_BASE_URL, "https://hq.example.com"),
			(ENV_ENVIRONMENT, "staging"),
			(ENV_AUTH_DIR, "/tmp/hqe-auth"),
		])
		.unwrap();
		assert_eq!(config.session_cache().path(), PathBuf::from("/tmp/hqe-auth/staging.json"));
	}
}

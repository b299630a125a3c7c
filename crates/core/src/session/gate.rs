//! One-time setup phase shared by all workers of a run.
//!
//! The gate acquires the cached session or runs the login driver, exactly
//! once. Every worker awaits the same initialization, so nothing proceeds
//! before setup completes and the snapshot file has a single writer.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::info;

use super::cache::{CachedSession, SessionCache};
use super::login::{Authenticator, FeatureFlags, LoginRequest};
use super::validity::{SessionValidity, now_millis};
use crate::config::Config;
use crate::error::{Error, Result};

/// How the setup phase obtained its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupOutcome {
	/// A usable cached snapshot was replayed; no login ran.
	Reused,
	/// The login driver ran and a fresh snapshot was persisted.
	Refreshed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
	Unauthenticated,
	Authenticated,
	/// Setup failed; dependents are blocked for the rest of the run.
	Blocked,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
	pub cached: CachedSession,
	pub outcome: SetupOutcome,
}

pub struct SessionGate {
	cache: SessionCache,
	authenticator: Arc<dyn Authenticator>,
	request: LoginRequest,
	origin: String,
	flags: FeatureFlags,
	cell: OnceCell<std::result::Result<Arc<AuthenticatedSession>, String>>,
}

impl SessionGate {
	pub fn new(cache: SessionCache, authenticator: Arc<dyn Authenticator>, request: LoginRequest) -> Self {
		Self {
			cache,
			authenticator,
			request,
			origin: String::new(),
			flags: FeatureFlags::default(),
			cell: OnceCell::new(),
		}
	}

	/// Builds a gate for the configured environment. Fails early without credentials.
	pub fn from_config(config: &Config, authenticator: Arc<dyn Authenticator>) -> Result<Self> {
		let request = LoginRequest::from_config(config)?;
		Ok(Self::new(config.session_cache(), authenticator, request)
			.with_feature_flags(config.application_origin(), config.feature_flags.clone()))
	}

	/// Flags written into `origin`'s storage after each fresh login.
	pub fn with_feature_flags(mut self, origin: impl Into<String>, flags: FeatureFlags) -> Self {
		self.origin = origin.into();
		self.flags = flags;
		self
	}

	pub fn cache(&self) -> &SessionCache {
		&self.cache
	}

	pub fn state(&self) -> GateState {
		match self.cell.get() {
			None => GateState::Unauthenticated,
			Some(Ok(_)) => GateState::Authenticated,
			Some(Err(_)) => GateState::Blocked,
		}
	}

	/// Runs setup on first call; later and concurrent callers share its result.
	///
	/// The caller that ran a failed setup gets the original error; everyone
	/// else gets [`Error::SetupBlocked`].
	pub async fn ensure(&self) -> Result<Arc<AuthenticatedSession>> {
		let mut first_error = None;
		let slot = &mut first_error;

		let stored = self
			.cell
			.get_or_init(|| async move {
				match self.setup().await {
					Ok(session) => Ok(Arc::new(session)),
					Err(err) => {
						let reason = err.to_string();
						*slot = Some(err);
						Err(reason)
					}
				}
			})
			.await;

		match stored {
			Ok(session) => Ok(Arc::clone(session)),
			Err(reason) => Err(first_error.unwrap_or_else(|| Error::SetupBlocked { reason: reason.clone() })),
		}
	}

	async fn setup(&self) -> Result<AuthenticatedSession> {
		let env = self.cache.environment().clone();

		let cached = self.cache.acquire();
		if self.cache.is_usable(cached.as_ref()) {
			if let Some(cached) = cached {
				info!(target = "hqe", %env, path = %cached.path.display(), "reusing cached session, login skipped");
				return Ok(AuthenticatedSession {
					cached,
					outcome: SetupOutcome::Reused,
				});
			}
		}

		info!(target = "hqe", %env, "no usable cached session, logging in");
		let mut snapshot = self.authenticator.login(&self.request).await?;
		if snapshot.cookies.is_empty() && !snapshot.has_entries() {
			return Err(Error::login(env.as_str(), "login captured an empty session"));
		}

		if !self.flags.is_empty() {
			self.flags.apply(&mut snapshot, &self.origin);
		}

		// A capture the cache would reject on the next run must not count as a login.
		let validity = SessionValidity::judge(&snapshot, Some(Duration::ZERO), self.cache.policy(), now_millis());
		if validity.expired {
			return Err(Error::login(
				env.as_str(),
				format!("login captured an unusable session: {}", validity.reason),
			));
		}
		let path = self.cache.persist(&snapshot)?;

		Ok(AuthenticatedSession {
			cached: CachedSession {
				snapshot,
				path,
				modified: Some(SystemTime::now()),
			},
			outcome: SetupOutcome::Refreshed,
		})
	}
}

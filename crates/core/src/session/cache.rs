//! Environment-keyed snapshot file: acquire, judge, persist, clear.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use hq_e2e_protocol::SessionSnapshot;
use tracing::{debug, info, warn};

use super::validity::{SessionValidity, now_millis};
use crate::config::{Environment, ExpiryPolicy};
use crate::error::{Error, Result};

/// A snapshot read from disk together with its file metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSession {
	pub snapshot: SessionSnapshot,
	pub path: PathBuf,
	pub modified: Option<SystemTime>,
}

impl CachedSession {
	/// Age of the backing file relative to `now`. A timestamp in the future counts as zero.
	pub fn age_at(&self, now: SystemTime) -> Option<Duration> {
		self.modified.map(|m| now.duration_since(m).unwrap_or_default())
	}

	pub fn age(&self) -> Option<Duration> {
		self.age_at(SystemTime::now())
	}
}

/// Snapshot cache for a single environment, stored at `<dir>/<environment>.json`.
#[derive(Debug, Clone)]
pub struct SessionCache {
	dir: PathBuf,
	environment: Environment,
	policy: ExpiryPolicy,
}

impl SessionCache {
	pub fn new(dir: impl AsRef<Path>, environment: Environment) -> Self {
		Self {
			dir: dir.as_ref().to_path_buf(),
			environment,
			policy: ExpiryPolicy::default(),
		}
	}

	pub fn with_policy(mut self, policy: ExpiryPolicy) -> Self {
		self.policy = policy;
		self
	}

	pub fn environment(&self) -> &Environment {
		&self.environment
	}

	pub fn policy(&self) -> &ExpiryPolicy {
		&self.policy
	}

	pub fn path(&self) -> PathBuf {
		self.dir.join(format!("{}.json", self.environment))
	}

	/// Reads the cached snapshot.
	///
	/// Missing, unreadable or malformed files all yield `None`; the caller
	/// re-authenticates instead of failing.
	pub fn acquire(&self) -> Option<CachedSession> {
		let path = self.path();
		let content = match fs::read_to_string(&path) {
			Ok(content) => content,
			Err(err) if err.kind() == ErrorKind::NotFound => {
				debug!(target = "hqe", path = %path.display(), "no cached session");
				return None;
			}
			Err(err) => {
				warn!(target = "hqe", path = %path.display(), error = %err, "cached session unreadable, ignoring");
				return None;
			}
		};

		let snapshot = match SessionSnapshot::from_json(&content) {
			Ok(snapshot) => snapshot,
			Err(err) => {
				warn!(target = "hqe", path = %path.display(), error = %err, "cached session malformed, ignoring");
				return None;
			}
		};

		let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
		Some(CachedSession {
			snapshot,
			path,
			modified,
		})
	}

	/// Judges a cached session under this cache's policy.
	pub fn validity(&self, cached: &CachedSession) -> SessionValidity {
		SessionValidity::judge(&cached.snapshot, cached.age(), &self.policy, now_millis())
	}

	/// True when `cached` exists, has entries and has not expired.
	pub fn is_usable(&self, cached: Option<&CachedSession>) -> bool {
		let Some(cached) = cached else {
			return false;
		};
		if cached.snapshot.origins.is_empty() {
			return false;
		}
		let validity = self.validity(cached);
		debug!(target = "hqe", env = %self.environment, expired = validity.expired, reason = %validity.reason, "session validity");
		!validity.expired
	}

	/// Writes `snapshot`, replacing any existing file. Last writer wins.
	pub fn persist(&self, snapshot: &SessionSnapshot) -> Result<PathBuf> {
		let path = self.path();
		let json = snapshot.to_json_pretty()?;

		let persist_err = |source| Error::Persist {
			path: path.clone(),
			source,
		};

		if !self.dir.as_os_str().is_empty() {
			fs::create_dir_all(&self.dir).map_err(persist_err)?;
		}

		let tmp = self.dir.join(format!(".{}.json.{}.tmp", self.environment, std::process::id()));
		fs::write(&tmp, json).map_err(persist_err)?;
		fs::rename(&tmp, &path).map_err(|err| {
			let _ = fs::remove_file(&tmp);
			persist_err(err)
		})?;

		info!(
			target = "hqe",
			env = %self.environment,
			path = %path.display(),
			cookies = snapshot.cookies.len(),
			origins = snapshot.origins.len(),
			"session snapshot persisted"
		);
		Ok(path)
	}

	/// Removes the snapshot file. Returns `false` when there was nothing to remove.
	pub fn clear(&self) -> Result<bool> {
		match fs::remove_file(self.path()) {
			Ok(()) => Ok(true),
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
			Err(err) => Err(err.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	fn cache(dir: &Path, env: &str) -> SessionCache {
		SessionCache::new(dir, Environment::parse(env).unwrap())
	}

	fn populated() -> SessionSnapshot {
		let mut snapshot = SessionSnapshot::default();
		snapshot.set_entry("https://hq.example.com", "authState", "opaque");
		snapshot
	}

	#[test]
	fn missing_file_acquires_none() {
		let temp = TempDir::new().unwrap();
		let cache = cache(temp.path(), "staging");
		assert!(cache.acquire().is_none());
		assert!(!cache.is_usable(None));
	}

	#[test]
	fn malformed_file_acquires_none() {
		let temp = TempDir::new().unwrap();
		let cache = cache(temp.path(), "staging");
		fs::write(cache.path(), "{ not json").unwrap();
		assert!(cache.acquire().is_none());
	}

	#[test]
	fn persist_then_acquire_is_usable_and_idempotent() {
		let temp = TempDir::new().unwrap();
		let cache = cache(&temp.path().join("nested"), "staging");

		let path = cache.persist(&populated()).unwrap();
		assert_eq!(path, cache.path());

		let first = cache.acquire().unwrap();
		let second = cache.acquire().unwrap();
		assert_eq!(first, second);
		assert_eq!(first.snapshot, populated());
		assert!(first.modified.is_some());
		assert!(cache.is_usable(Some(&first)));
	}

	#[test]
	fn persist_overwrites_previous_snapshot() {
		let temp = TempDir::new().unwrap();
		let cache = cache(temp.path(), "staging");
		cache.persist(&populated()).unwrap();

		let mut replacement = SessionSnapshot::default();
		replacement.set_entry("https://hq.example.com", "other", "1");
		cache.persist(&replacement).unwrap();

		assert_eq!(cache.acquire().unwrap().snapshot, replacement);
		let leftovers: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
		assert_eq!(leftovers.len(), 1, "temp file must not linger");
	}

	#[test]
	fn zero_origins_is_not_usable() {
		let temp = TempDir::new().unwrap();
		let cache = cache(temp.path(), "staging").with_policy(ExpiryPolicy::never());
		fs::write(cache.path(), r#"{"cookies":[{"name":"sid","value":"x"}],"origins":[]}"#).unwrap();

		let cached = cache.acquire().unwrap();
		assert!(!cache.is_usable(Some(&cached)));
	}

	#[test]
	fn environments_do_not_collide() {
		let temp = TempDir::new().unwrap();
		let staging = cache(temp.path(), "staging");
		let prod = cache(temp.path(), "prod");
		staging.persist(&populated()).unwrap();

		assert_ne!(staging.path(), prod.path());
		assert!(prod.acquire().is_none());
	}

	#[test]
	fn clear_reports_whether_a_file_existed() {
		let temp = TempDir::new().unwrap();
		let cache = cache(temp.path(), "staging");
		assert!(!cache.clear().unwrap());
		cache.persist(&populated()).unwrap();
		assert!(cache.clear().unwrap());
		assert!(cache.acquire().is_none());
	}

	#[test]
	fn age_in_the_future_counts_as_zero() {
		let cached = CachedSession {
			snapshot: populated(),
			path: PathBuf::from("x.json"),
			modified: Some(SystemTime::now() + Duration::from_secs(60)),
		};
		assert_eq!(cached.age(), Some(Duration::ZERO));
	}
}

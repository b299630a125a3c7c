//! Usability judgment for a cached snapshot.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hq_e2e_protocol::SessionSnapshot;

use super::token::find_token_claim;
use crate::config::{ExpiryMode, ExpiryPolicy};

/// Why a snapshot was judged the way it was.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidityReason {
	/// No origin carries any storage entry.
	Empty,
	TokenValid { entry: String, exp: f64 },
	TokenExpired { entry: String, exp: f64 },
	AgeWithin { age: Duration },
	AgeExceeded { age: Duration },
	/// No token and no modification time to fall back on.
	AgeUnknown,
	/// Expiry checking disabled by policy.
	NotChecked,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionValidity {
	pub expired: bool,
	pub reason: ValidityReason,
}

impl SessionValidity {
	/// Judges `snapshot` under `policy`.
	///
	/// `age` is the age of the backing file, `now_ms` the current unix time in
	/// milliseconds. Both are parameters so the judgment stays deterministic.
	pub fn judge(snapshot: &SessionSnapshot, age: Option<Duration>, policy: &ExpiryPolicy, now_ms: u128) -> Self {
		if !snapshot.has_entries() {
			return Self::expired(ValidityReason::Empty);
		}

		if policy.mode == ExpiryMode::Never {
			return Self::valid(ValidityReason::NotChecked);
		}

		if policy.mode == ExpiryMode::TokenOrAge {
			if let Some(claim) = find_token_claim(snapshot) {
				return if claim.is_expired_at(now_ms) {
					Self::expired(ValidityReason::TokenExpired {
						entry: claim.entry,
						exp: claim.exp,
					})
				} else {
					Self::valid(ValidityReason::TokenValid {
						entry: claim.entry,
						exp: claim.exp,
					})
				};
			}
		}

		match age {
			Some(age) if age > policy.max_age => Self::expired(ValidityReason::AgeExceeded { age }),
			Some(age) => Self::valid(ValidityReason::AgeWithin { age }),
			None => Self::expired(ValidityReason::AgeUnknown),
		}
	}

	fn valid(reason: ValidityReason) -> Self {
		Self { expired: false, reason }
	}

	fn expired(reason: ValidityReason) -> Self {
		Self { expired: true, reason }
	}
}

impl fmt::Display for ValidityReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Empty => write!(f, "snapshot has no storage entries"),
			Self::TokenValid { entry, exp } => write!(f, "token '{entry}' valid until {}", *exp as i64),
			Self::TokenExpired { entry, exp } => write!(f, "token '{entry}' expired at {}", *exp as i64),
			Self::AgeWithin { age } => write!(f, "no token; age {} within threshold", format_age(*age)),
			Self::AgeExceeded { age } => write!(f, "no token; age {} exceeds threshold", format_age(*age)),
			Self::AgeUnknown => write!(f, "no token and snapshot age unknown"),
			Self::NotChecked => write!(f, "expiry not checked"),
		}
	}
}

/// Current unix time in milliseconds.
pub fn now_millis() -> u128 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis())
		.unwrap_or(0)
}

pub fn format_age(age: Duration) -> String {
	match age.as_secs() {
		s if s < 60 => format!("{s}s"),
		s if s < 3600 => format!("{}m", s / 60),
		s if s < 86400 => format!("{}h{}m", s / 3600, (s % 3600) / 60),
		s => format!("{}d", s / 86400),
	}
}

//! Extraction of an `exp` claim from token-like storage entries.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde_json::Value;

use hq_e2e_protocol::{OriginState, SessionSnapshot};

/// Entry names containing one of these substrings are token candidates.
const TOKEN_MARKERS: [&str; 2] = ["token", "auth"];

/// A token found in a snapshot, with its expiry in unix seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaim {
	pub origin: String,
	pub entry: String,
	pub exp: f64,
}

impl TokenClaim {
	pub fn is_expired_at(&self, now_ms: u128) -> bool {
		self.exp * 1000.0 < now_ms as f64
	}
}

/// Scans origins in order and returns the first candidate that decodes.
///
/// Only the first token-like entry of each origin is considered; when it does
/// not decode the scan moves on to the next origin.
pub fn find_token_claim(snapshot: &SessionSnapshot) -> Option<TokenClaim> {
	snapshot.origins.iter().find_map(origin_claim)
}

fn origin_claim(origin: &OriginState) -> Option<TokenClaim> {
	let entry = origin
		.local_storage
		.iter()
		.find(|e| TOKEN_MARKERS.iter().any(|m| e.name.contains(m)))?;

	let exp = decode_exp(&entry.value)?;
	Some(TokenClaim {
		origin: origin.origin.clone(),
		entry: entry.name.clone(),
		exp,
	})
}

/// Decodes `header.payload.signature` and reads a numeric `exp` from the payload.
pub fn decode_exp(value: &str) -> Option<f64> {
	let value = unquote(value.trim());

	let mut parts = value.split('.');
	let (_, payload, _) = (parts.next()?, parts.next()?, parts.next()?);
	if parts.next().is_some() {
		return None;
	}

	let payload = payload.trim_end_matches('=');
	let bytes = URL_SAFE_NO_PAD
		.decode(payload)
		.or_else(|_| STANDARD_NO_PAD.decode(payload))
		.ok()?;

	let claims: Value = serde_json::from_slice(&bytes).ok()?;
	claims.get("exp")?.as_f64()
}

fn unquote(value: &str) -> &str {
	value
		.strip_prefix('"')
		.and_then(|v| v.strip_suffix('"'))
		.unwrap_or(value)
}

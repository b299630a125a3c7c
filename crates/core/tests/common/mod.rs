#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hqe::session::validity::now_millis;
use hq_e2e_protocol::Cookie;
use hqe::{Authenticator, Credentials, Environment, LoginRequest, Result, SessionSnapshot};

pub const ORIGIN: &str = "https://hq.example.com";

pub fn jwt_with_exp(exp: i64) -> String {
	let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"qa@hq.example.com","exp":{exp}}}"#));
	format!("eyJhbGciOiJIUzI1NiJ9.{payload}.c2lnbmF0dXJl")
}

pub fn now_secs() -> i64 {
	(now_millis() / 1000) as i64
}

pub fn snapshot_with_token(exp: i64) -> SessionSnapshot {
	let mut snapshot = SessionSnapshot::default();
	snapshot.set_entry(ORIGIN, "accessToken", jwt_with_exp(exp));
	snapshot
}

pub fn request(env: &str) -> LoginRequest {
	LoginRequest {
		environment: Environment::parse(env).unwrap(),
		base_url: format!("{ORIGIN}/"),
		credentials: Credentials {
			username: "qa@hq.example.com".into(),
			password: "secret".into(),
		},
	}
}

/// Login driver that counts invocations and returns a fresh token snapshot.
#[derive(Default)]
pub struct FakeLogin {
	pub calls: AtomicUsize,
	pub delay: Duration,
	pub reject: bool,
	pub empty: bool,
	/// Returns a cookie jar without any storage entries.
	pub cookies_only: bool,
}

impl FakeLogin {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn slow(delay: Duration) -> Arc<Self> {
		Arc::new(Self {
			delay,
			..Self::default()
		})
	}

	pub fn rejecting() -> Arc<Self> {
		Arc::new(Self {
			reject: true,
			..Self::default()
		})
	}

	pub fn empty() -> Arc<Self> {
		Arc::new(Self {
			empty: true,
			..Self::default()
		})
	}

	pub fn cookies_only() -> Arc<Self> {
		Arc::new(Self {
			cookies_only: true,
			..Self::default()
		})
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Authenticator for FakeLogin {
	async fn login(&self, request: &LoginRequest) -> Result<SessionSnapshot> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if !self.delay.is_zero() {
			tokio::time::sleep(self.delay).await;
		}
		if self.reject {
			return Err(hqe::Error::LoginFailed {
				environment: request.environment.to_string(),
				reason: "credentials rejected".into(),
			});
		}
		if self.empty {
			return Ok(SessionSnapshot::default());
		}
		if self.cookies_only {
			let mut snapshot = SessionSnapshot::default();
			snapshot.cookies.push(Cookie {
				name: "sid".into(),
				value: "abc".into(),
				domain: Some(".hq.example.com".into()),
				path: Some("/".into()),
				expires: None,
				http_only: true,
				secure: true,
				same_site: None,
			});
			return Ok(snapshot);
		}
		Ok(snapshot_with_token(now_secs() + 3600))
	}
}

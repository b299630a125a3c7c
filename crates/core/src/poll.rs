// Poll - retry a check until it passes or times out
//
// Bridges an action that starts backend work (a generation job, a queue
// consumer) and the UI state that eventually reflects it, without fixed sleeps.

use std::fmt::{Debug, Display};
use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace};

use crate::error::Error;

/// Default timeout for a poll (5 seconds).
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default interval between attempts (100ms).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Raised when a check never passed within the timeout.
#[derive(Debug, Clone, Error)]
#[error("{message} not met after {elapsed:?} (timeout {timeout:?}, {attempts} attempts); last failure: {last_failure}")]
pub struct PollTimeoutError {
	pub message: String,
	pub timeout: Duration,
	pub elapsed: Duration,
	pub attempts: u32,
	pub last_failure: String,
}

/// Result of one check attempt.
///
/// Implemented for `bool`, `Result<(), E>` and `Result<bool, E>`; `false` and
/// `Err` are failed attempts whose text becomes the last observed failure.
pub trait CheckOutcome {
	fn into_check(self) -> Result<(), String>;
}

impl CheckOutcome for bool {
	fn into_check(self) -> Result<(), String> {
		if self { Ok(()) } else { Err("condition returned false".into()) }
	}
}

impl<E: Display> CheckOutcome for Result<(), E> {
	fn into_check(self) -> Result<(), String> {
		self.map_err(|e| e.to_string())
	}
}

impl<E: Display> CheckOutcome for Result<bool, E> {
	fn into_check(self) -> Result<(), String> {
		match self {
			Ok(passed) => passed.into_check(),
			Err(e) => Err(e.to_string()),
		}
	}
}

/// Polls `check` until it passes or `timeout` elapses, using the default interval.
///
/// # Example
///
/// ```no_run
/// # use std::time::Duration;
/// # async fn demo(button: &impl Fn() -> bool) -> Result<(), hqe::poll::PollTimeoutError> {
/// hqe::poll::poll_until(|| async { !button() }, Duration::from_secs(30)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn poll_until<F, Fut, O>(check: F, timeout: Duration) -> Result<(), PollTimeoutError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = O>,
	O: CheckOutcome,
{
	Poller::new().with_timeout(timeout).until(check).await
}

/// Configurable poll: timeout, interval and a label for failure messages.
#[derive(Debug, Clone)]
pub struct Poller {
	timeout: Duration,
	interval: Duration,
	label: String,
}

impl Default for Poller {
	fn default() -> Self {
		Self::new()
	}
}

impl Poller {
	pub fn new() -> Self {
		Self {
			timeout: DEFAULT_POLL_TIMEOUT,
			interval: DEFAULT_POLL_INTERVAL,
			label: "condition".into(),
		}
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	/// Sets the pause between attempts. Default is 100ms.
	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.interval = interval;
		self
	}

	/// Names the condition in the timeout error.
	pub fn with_message(mut self, label: impl Into<String>) -> Self {
		self.label = label.into();
		self
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Repeats `check` until it passes.
	///
	/// The first attempt runs immediately. Every attempt is bounded by the time
	/// left, so a check that hangs cannot stretch the wait past the timeout.
	pub async fn until<F, Fut, O>(&self, mut check: F) -> Result<(), PollTimeoutError>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = O>,
		O: CheckOutcome,
	{
		let start = Instant::now();
		let mut attempts = 0u32;
		let mut observed: Option<String> = None;

		loop {
			attempts += 1;
			let remaining = self.timeout.saturating_sub(start.elapsed());

			// An attempt cut off by the deadline keeps the last failure a check reported.
			let failure = match tokio::time::timeout(remaining, check()).await {
				Ok(outcome) => match outcome.into_check() {
					Ok(()) => {
						trace!(target = "hqe", label = %self.label, attempts, elapsed = ?start.elapsed(), "poll satisfied");
						return Ok(());
					}
					Err(failure) => failure,
				},
				Err(_) => observed
					.take()
					.unwrap_or_else(|| "check did not complete before the timeout".to_string()),
			};

			let elapsed = start.elapsed();
			if elapsed >= self.timeout {
				debug!(target = "hqe", label = %self.label, attempts, ?elapsed, %failure, "poll timed out");
				return Err(PollTimeoutError {
					message: self.label.clone(),
					timeout: self.timeout,
					elapsed,
					attempts,
					last_failure: failure,
				});
			}

			trace!(target = "hqe", label = %self.label, attempts, %failure, "poll attempt failed");
			observed = Some(failure);
			tokio::time::sleep(self.interval.min(self.timeout - elapsed)).await;
		}
	}

	/// Repeats `read` until it yields `expected`.
	pub async fn until_eq<F, Fut, T, E>(&self, mut read: F, expected: T) -> Result<(), PollTimeoutError>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, E>>,
		T: PartialEq + Debug,
		E: Display,
	{
		let expected = &expected;
		self.until(|| {
			let observed = read();
			async move {
				match observed.await {
					Ok(value) if value == *expected => Ok(()),
					Ok(value) => Err(format!("expected {expected:?}, observed {value:?}")),
					Err(e) => Err(e.to_string()),
				}
			}
		})
		.await
	}

	/// Runs `trigger` exactly once, then polls the idempotent `check`.
	///
	/// The trigger is never retried; a failing trigger surfaces as
	/// [`Error::Trigger`] without polling.
	pub async fn trigger_then_poll<T, TFut, R, TE, F, Fut, O>(&self, trigger: T, check: F) -> crate::Result<R>
	where
		T: FnOnce() -> TFut,
		TFut: Future<Output = Result<R, TE>>,
		TE: Display,
		F: FnMut() -> Fut,
		Fut: Future<Output = O>,
		O: CheckOutcome,
	{
		let value = trigger().await.map_err(|e| Error::Trigger(e.to_string()))?;
		self.until(check).await?;
		Ok(value)
	}
}

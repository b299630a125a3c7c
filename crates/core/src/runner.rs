//! Scenario runner: setup barrier, bounded parallelism, whole-scenario retries.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::session::{AuthenticatedSession, SessionGate, SessionSnapshot, SetupOutcome};

type ScenarioBody = Arc<dyn Fn(ScenarioContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// What a scenario body receives on each attempt.
#[derive(Debug, Clone)]
pub struct ScenarioContext {
	pub name: String,
	/// 1-based attempt number.
	pub attempt: u32,
	pub session: Arc<AuthenticatedSession>,
}

impl ScenarioContext {
	/// Snapshot file to load into the scenario's browser context.
	pub fn storage_state(&self) -> &Path {
		&self.session.cached.path
	}

	pub fn snapshot(&self) -> &SessionSnapshot {
		&self.session.cached.snapshot
	}
}

/// A named, independently retryable script.
#[derive(Clone)]
pub struct Scenario {
	name: String,
	body: ScenarioBody,
}

impl Scenario {
	pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
	where
		F: Fn(ScenarioContext) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
	{
		Self {
			name: name.into(),
			body: Arc::new(move |ctx| body(ctx).boxed()),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}
}

impl std::fmt::Debug for Scenario {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Scenario").field("name", &self.name).finish()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
	Passed,
	/// Passed only after at least one retry.
	Flaky,
	Failed,
	/// Never ran because setup failed.
	Blocked,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioOutcome {
	pub name: String,
	pub verdict: Verdict,
	pub attempts: u32,
	pub duration_ms: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub setup: Option<SetupOutcome>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub setup_error: Option<String>,
	pub outcomes: Vec<ScenarioOutcome>,
}

impl RunReport {
	pub fn count(&self, verdict: Verdict) -> usize {
		self.outcomes.iter().filter(|o| o.verdict == verdict).count()
	}

	/// True when every scenario passed, flaky ones included.
	pub fn is_success(&self) -> bool {
		self.setup_error.is_none()
			&& self
				.outcomes
				.iter()
				.all(|o| matches!(o.verdict, Verdict::Passed | Verdict::Flaky))
	}

	pub fn outcome(&self, name: &str) -> Option<&ScenarioOutcome> {
		self.outcomes.iter().find(|o| o.name == name)
	}

	fn blocked(names: Vec<String>, reason: String) -> Self {
		Self {
			setup: None,
			outcomes: names
				.into_iter()
				.map(|name| ScenarioOutcome {
					name,
					verdict: Verdict::Blocked,
					attempts: 0,
					duration_ms: 0,
					error: Some(reason.clone()),
				})
				.collect(),
			setup_error: Some(reason),
		}
	}
}

#[derive(Debug, Clone)]
pub struct ScenarioRunner {
	retries: u32,
	workers: usize,
}

impl Default for ScenarioRunner {
	fn default() -> Self {
		Self { retries: 0, workers: 4 }
	}
}

impl ScenarioRunner {
	pub fn new() -> Self {
		Self::default()
	}

	/// Extra attempts after a failure; each re-runs the scenario from scratch.
	pub fn with_retries(mut self, retries: u32) -> Self {
		self.retries = retries;
		self
	}

	/// Maximum scenarios running at once (at least one).
	pub fn with_workers(mut self, workers: usize) -> Self {
		self.workers = workers.max(1);
		self
	}

	/// Waits on the setup gate, then runs every scenario.
	///
	/// When setup fails no body runs and every scenario is reported blocked.
	/// Outcomes come back in input order.
	pub async fn run(&self, gate: &SessionGate, scenarios: Vec<Scenario>) -> RunReport {
		let session = match gate.ensure().await {
			Ok(session) => session,
			Err(err) => {
				error!(target = "hqe", error = %err, scenarios = scenarios.len(), "setup failed, all scenarios blocked");
				let names = scenarios.into_iter().map(|s| s.name).collect();
				return RunReport::blocked(names, err.to_string());
			}
		};

		let names: Vec<String> = scenarios.iter().map(|s| s.name.clone()).collect();
		let permits = Arc::new(Semaphore::new(self.workers.max(1)));
		let mut tasks = JoinSet::new();

		for (index, scenario) in scenarios.into_iter().enumerate() {
			let permits = Arc::clone(&permits);
			let session = Arc::clone(&session);
			let retries = self.retries;
			tasks.spawn(async move {
				let _permit = permits.acquire_owned().await.ok();
				(index, run_scenario(scenario, session, retries).await)
			});
		}

		let mut outcomes: Vec<Option<ScenarioOutcome>> = vec![None; names.len()];
		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok((index, outcome)) => outcomes[index] = Some(outcome),
				Err(err) => error!(target = "hqe", error = %err, "scenario worker aborted"),
			}
		}

		let outcomes = outcomes
			.into_iter()
			.zip(names)
			.map(|(outcome, name)| {
				outcome.unwrap_or_else(|| ScenarioOutcome {
					name,
					verdict: Verdict::Failed,
					attempts: 0,
					duration_ms: 0,
					error: Some("scenario worker aborted".into()),
				})
			})
			.collect();

		RunReport {
			setup: Some(session.outcome),
			setup_error: None,
			outcomes,
		}
	}
}

async fn run_scenario(scenario: Scenario, session: Arc<AuthenticatedSession>, retries: u32) -> ScenarioOutcome {
	let started = Instant::now();
	let max_attempts = retries.saturating_add(1);
	let mut last_error = String::new();

	for attempt in 1..=max_attempts {
		let ctx = ScenarioContext {
			name: scenario.name.clone(),
			attempt,
			session: Arc::clone(&session),
		};

		// Each attempt runs in its own task so a panic fails only that attempt.
		let result = match tokio::spawn((scenario.body)(ctx)).await {
			Ok(result) => result.map_err(|e| format!("{e:#}")),
			Err(join) if join.is_panic() => Err("scenario panicked".to_string()),
			Err(join) => Err(join.to_string()),
		};

		match result {
			Ok(()) => {
				let verdict = if attempt == 1 { Verdict::Passed } else { Verdict::Flaky };
				info!(target = "hqe", scenario = %scenario.name, attempt, ?verdict, "scenario passed");
				return ScenarioOutcome {
					name: scenario.name,
					verdict,
					attempts: attempt,
					duration_ms: elapsed_ms(started.elapsed()),
					error: None,
				};
			}
			Err(err) => {
				warn!(target = "hqe", scenario = %scenario.name, attempt, max_attempts, error = %err, "scenario attempt failed");
				last_error = err;
			}
		}
	}

	ScenarioOutcome {
		name: scenario.name,
		verdict: Verdict::Failed,
		attempts: max_attempts,
		duration_ms: elapsed_ms(started.elapsed()),
		error: Some(last_error),
	}
}

fn elapsed_ms(d: Duration) -> u64 {
	u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// `prefix-<8 hex chars>`, for entities created against a shared backend.
pub fn unique_name(prefix: &str) -> String {
	let id = Uuid::new_v4().simple().to_string();
	format!("{prefix}-{}", &id[..8])
}

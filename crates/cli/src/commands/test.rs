//! `hqe test`: setup phase as a barrier, then the external test runner.
//!
//! The runner only starts once the session is in place. When setup fails no
//! test runs at all and the whole suite is reported as blocked.

use std::process::Stdio;

use hqe::Config;
use tokio::process::Command;
use tracing::{error, info};

use super::setup::{SetupSummary, gate};
use crate::cli::TestArgs;
use crate::error::{CliError, Result};
use crate::output::OutputFormat;

pub const DEFAULT_RUNNER: &str = "npx playwright test";

/// Variable through which the runner finds the snapshot to load.
pub const ENV_STORAGE_STATE: &str = "HQE_STORAGE_STATE";

/// Exit code used when setup failed and nothing ran.
pub const EXIT_BLOCKED: i32 = 2;

/// External test runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerCommand {
	pub program: String,
	pub args: Vec<String>,
}

/// Runner program plus the arguments derived from `args`.
///
/// The runner line is split on whitespace; `--runner` wins over `HQE_RUNNER`.
pub fn runner_command_line(args: &TestArgs) -> Result<RunnerCommand> {
	let line = args
		.runner
		.clone()
		.or_else(|| std::env::var("HQE_RUNNER").ok().filter(|v| !v.trim().is_empty()))
		.unwrap_or_else(|| DEFAULT_RUNNER.to_string());

	let mut words = line.split_whitespace().map(str::to_string);
	let program = words.next().ok_or_else(|| CliError::RunnerNotFound(line.clone()))?;
	let mut command = RunnerCommand {
		program,
		args: words.collect(),
	};
	command.args.extend(pass_through_args(args));
	Ok(command)
}

/// Runner flags in the order the runner CLI documents them.
pub fn pass_through_args(args: &TestArgs) -> Vec<String> {
	let mut out: Vec<String> = args.files.clone();
	if let Some(pattern) = &args.grep {
		out.push("--grep".into());
		out.push(pattern.clone());
	}
	if args.headed {
		out.push("--headed".into());
	}
	if args.debug {
		out.push("--debug".into());
	}
	if args.ui {
		out.push("--ui".into());
	}
	if let Some(retries) = args.retries {
		out.push(format!("--retries={retries}"));
	}
	if let Some(workers) = args.workers {
		out.push(format!("--workers={workers}"));
	}
	out.extend(args.extra.iter().cloned());
	out
}

pub async fn execute(args: TestArgs, config: &Config, format: OutputFormat) -> Result<i32> {
	let command = runner_command_line(&args)?;
	let program = which::which(&command.program).map_err(|_| CliError::RunnerNotFound(command.program.clone()))?;
	let gate = gate(config)?;

	let session = match gate.ensure().await {
		Ok(session) => session,
		Err(err) => {
			error!(target = "hqe", env = %config.environment, error = %err, "setup phase failed");
			eprintln!("Setup failed for '{}': {err}", config.environment);
			eprintln!("All tests are blocked; nothing was run.");
			return Ok(EXIT_BLOCKED);
		}
	};
	SetupSummary::new(config, &session).print(format)?;

	info!(target = "hqe", program = %program.display(), args = ?command.args, "starting test runner");
	let status = Command::new(&program)
		.args(&command.args)
		.env(ENV_STORAGE_STATE, &session.cached.path)
		.env("HQE_ENV", config.environment.as_str())
		.env("HQE_BASE_URL", config.base_url.as_str())
		.stdin(Stdio::inherit())
		.stdout(Stdio::inherit())
		.stderr(Stdio::inherit())
		.status()
		.await?;

	Ok(status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn no_flags_means_no_extra_args() {
		assert!(pass_through_args(&TestArgs::default()).is_empty());
	}

	#[test]
	fn flags_are_translated_for_the_runner() {
		let args = TestArgs {
			files: vec!["tests/campaigns.spec.ts".into()],
			grep: Some("delete campaign".into()),
			headed: true,
			debug: true,
			ui: false,
			retries: Some(2),
			workers: Some(4),
			runner: None,
			extra: vec!["--reporter=list".into()],
		};
		assert_eq!(
			pass_through_args(&args),
			vec![
				"tests/campaigns.spec.ts",
				"--grep",
				"delete campaign",
				"--headed",
				"--debug",
				"--retries=2",
				"--workers=4",
				"--reporter=list",
			]
		);
	}

	#[test]
	fn explicit_runner_replaces_default() {
		let args = TestArgs {
			runner: Some("pnpm exec playwright test".into()),
			ui: true,
			..TestArgs::default()
		};
		let command = runner_command_line(&args).unwrap();
		assert_eq!(command.program, "pnpm");
		assert_eq!(command.args, vec!["exec", "playwright", "test", "--ui"]);
	}
}

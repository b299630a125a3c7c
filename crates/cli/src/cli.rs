use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

#[derive(Parser, Debug)]
#[command(name = "hqe")]
#[command(about = "HQ Admin end-to-end suite - session cache and test runner front-end")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short, long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// Target environment (overrides HQE_ENV)
	#[arg(short, long, global = true, value_name = "NAME")]
	pub env: Option<String>,

	/// Snapshot directory (overrides HQE_AUTH_DIR)
	#[arg(long, global = true, value_name = "DIR")]
	pub auth_dir: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Inspect and manage the cached session snapshot
	Session {
		#[command(subcommand)]
		action: SessionAction,
	},

	/// Run the setup phase: reuse the cached session or log in
	Setup,

	/// Run the setup phase, then hand over to the test runner
	Test(TestArgs),
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
	/// Report whether the cached session is usable, and why
	Status,

	/// Show cookies and storage entries of the cached session
	Show,

	/// Delete the cached session
	Clear,

	/// Validate a storage-state file and store it as the cached session
	Import {
		/// Storage-state JSON captured by a browser
		file: PathBuf,
	},
}

#[derive(Args, Debug, Clone, Default)]
pub struct TestArgs {
	/// Test files to run (all when omitted)
	pub files: Vec<String>,

	/// Only run tests whose title matches this pattern
	#[arg(short = 'g', long = "grep", value_name = "PATTERN")]
	pub grep: Option<String>,

	/// Run with a visible browser
	#[arg(long)]
	pub headed: bool,

	/// Run with the runner's debugger attached
	#[arg(long)]
	pub debug: bool,

	/// Open the runner's interactive UI mode
	#[arg(long)]
	pub ui: bool,

	/// Re-run failing tests up to N times
	#[arg(long, value_name = "N")]
	pub retries: Option<u32>,

	/// Number of parallel workers
	#[arg(long, value_name = "N")]
	pub workers: Option<u32>,

	/// Runner command line (overrides HQE_RUNNER, default "npx playwright test")
	#[arg(long, value_name = "CMD")]
	pub runner: Option<String>,

	/// Extra arguments passed to the runner verbatim
	#[arg(last = true)]
	pub extra: Vec<String>,
}

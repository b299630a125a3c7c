use clap::Parser;
use hq_e2e_cli::cli::Cli;
use hq_e2e_cli::{commands, logging};
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	match commands::dispatch(cli).await {
		Ok(code) => std::process::exit(code),
		Err(err) => {
			error!(target = "hqe", error = %err, "command failed");
			std::process::exit(1);
		}
	}
}

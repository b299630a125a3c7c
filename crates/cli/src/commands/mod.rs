mod session;
mod setup;
pub mod test;

use std::collections::HashMap;

use hqe::config::{CacheSettings, Config, ENV_AUTH_DIR, ENV_ENVIRONMENT};

use crate::cli::{Cli, Commands};
use crate::error::Result;

/// Runs the parsed command and returns the process exit code.
pub async fn dispatch(cli: Cli) -> Result<i32> {
	let overrides = Overrides::from_cli(&cli);

	match cli.command {
		Commands::Session { action } => {
			let settings = CacheSettings::from_lookup(|key| overrides.lookup(key))?;
			session::execute(action, &settings, cli.format)
		}
		Commands::Setup => {
			let config = Config::from_lookup(|key| overrides.lookup(key))?;
			setup::execute(&config, cli.format).await
		}
		Commands::Test(args) => {
			let config = Config::from_lookup(|key| overrides.lookup(key))?;
			test::execute(args, &config, cli.format).await
		}
	}
}

/// Command-line flags layered over the process environment.
#[derive(Debug, Default)]
struct Overrides(HashMap<&'static str, String>);

impl Overrides {
	fn from_cli(cli: &Cli) -> Self {
		let mut map = HashMap::new();
		if let Some(env) = &cli.env {
			map.insert(ENV_ENVIRONMENT, env.clone());
		}
		if let Some(dir) = &cli.auth_dir {
			map.insert(ENV_AUTH_DIR, dir.to_string_lossy().into_owned());
		}
		Self(map)
	}

	fn lookup(&self, key: &str) -> Option<String> {
		self.0.get(key).cloned().or_else(|| std::env::var(key).ok())
	}
}

//! Session cache inspection: status, show, clear, import.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use colored::Colorize;
use hq_e2e_protocol::SessionSnapshot;
use hqe::config::CacheSettings;
use hqe::session::validity::format_age;
use hqe::{SessionCache, SessionValidity};
use serde::Serialize;
use tracing::info;

use crate::cli::SessionAction;
use crate::error::{CliError, Result};
use crate::output::{OutputFormat, print_json};

pub fn execute(action: SessionAction, settings: &CacheSettings, format: OutputFormat) -> Result<i32> {
	let cache = settings.session_cache();
	match action {
		SessionAction::Status => status(&cache, format),
		SessionAction::Show => show(&cache, format),
		SessionAction::Clear => clear(&cache, format),
		SessionAction::Import { file } => import(&cache, &file, format),
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CacheState {
	Missing,
	Unreadable,
	Usable,
	Expired,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
	environment: String,
	path: String,
	state: CacheState,
	#[serde(skip_serializing_if = "Option::is_none")]
	reason: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	age_secs: Option<u64>,
	cookies: usize,
	entries: usize,
}

fn status(cache: &SessionCache, format: OutputFormat) -> Result<i32> {
	let path = cache.path();
	let mut report = StatusReport {
		environment: cache.environment().to_string(),
		path: path.display().to_string(),
		state: if path.exists() { CacheState::Unreadable } else { CacheState::Missing },
		reason: None,
		age_secs: None,
		cookies: 0,
		entries: 0,
	};

	if let Some(cached) = cache.acquire() {
		let validity = cache.validity(&cached);
		let usable = cache.is_usable(Some(&cached));
		report.state = if usable { CacheState::Usable } else { CacheState::Expired };
		report.reason = Some(validity.reason.to_string());
		report.age_secs = cached.age().map(|a| a.as_secs());
		report.cookies = cached.snapshot.cookies.len();
		report.entries = cached.snapshot.entry_count();
	}

	if format == OutputFormat::Json {
		print_json(&report)?;
		return Ok(0);
	}

	let state = match report.state {
		CacheState::Usable => "usable".green().bold(),
		CacheState::Expired => "expired".yellow().bold(),
		CacheState::Unreadable => "unreadable".red().bold(),
		CacheState::Missing => "missing".red().bold(),
	};
	println!("Environment: {}", report.environment);
	println!("Snapshot:    {}", report.path);
	println!("State:       {state}");
	if let Some(reason) = &report.reason {
		println!("Reason:      {reason}");
	}
	if let Some(age) = report.age_secs {
		println!("Age:         {}", format_age(std::time::Duration::from_secs(age)));
	}
	if report.state != CacheState::Missing {
		println!("Contents:    {} cookies, {} storage entries", report.cookies, report.entries);
	}
	Ok(0)
}

fn show(cache: &SessionCache, format: OutputFormat) -> Result<i32> {
	let Some(cached) = cache.acquire() else {
		println!("No readable session snapshot at {}", cache.path().display());
		return Ok(1);
	};
	let state = &cached.snapshot;

	if format == OutputFormat::Json {
		print_json(state)?;
		return Ok(0);
	}

	println!("Session snapshot from: {}", cached.path.display());
	println!();

	println!("COOKIES ({}):", state.cookies.len());
	if state.cookies.is_empty() {
		println!("  (none)");
	} else {
		println!("  {:<20} {:<30} {:<20}", "NAME", "DOMAIN", "EXPIRES");
		println!("  {}", "-".repeat(70));
		for cookie in &state.cookies {
			let domain = cookie.domain.as_deref().unwrap_or("-");
			println!("  {:<20} {:<30} {:<20}", cookie.name, domain, format_expiry(cookie.expires));
		}
	}

	println!();

	println!("STORAGE ({} origins):", state.origins.len());
	if state.origins.is_empty() {
		println!("  (none)");
	} else {
		for origin in &state.origins {
			println!("  {}:", origin.origin);
			for entry in &origin.local_storage {
				println!("    {}: {}", entry.name, truncate(&entry.value, 50));
			}
		}
	}

	Ok(0)
}

fn clear(cache: &SessionCache, format: OutputFormat) -> Result<i32> {
	let removed = cache.clear()?;
	info!(target = "hqe", env = %cache.environment(), removed, "session cache cleared");

	if format == OutputFormat::Json {
		print_json(&serde_json::json!({ "path": cache.path(), "removed": removed }))?;
	} else if removed {
		println!("Removed {}", cache.path().display());
	} else {
		println!("Nothing to remove at {}", cache.path().display());
	}
	Ok(0)
}

fn import(cache: &SessionCache, file: &Path, format: OutputFormat) -> Result<i32> {
	let import_err = |reason: String| CliError::Import {
		path: file.to_path_buf(),
		reason,
	};

	let content = std::fs::read_to_string(file).map_err(|e| import_err(e.to_string()))?;
	let snapshot = SessionSnapshot::from_json(&content).map_err(|e| import_err(format!("not a storage-state file: {e}")))?;

	// Judged as a brand new file: token claims still apply, age starts at zero.
	let validity = SessionValidity::judge(
		&snapshot,
		Some(std::time::Duration::ZERO),
		cache.policy(),
		hqe::session::validity::now_millis(),
	);
	if validity.expired {
		return Err(import_err(validity.reason.to_string()));
	}

	let path = cache.persist(&snapshot)?;

	if format == OutputFormat::Json {
		print_json(&serde_json::json!({
			"path": path,
			"cookies": snapshot.cookies.len(),
			"entries": snapshot.entry_count(),
		}))?;
	} else {
		println!("Imported {} as session for '{}'", file.display(), cache.environment());
		println!("  Cookies: {}", snapshot.cookies.len());
		println!("  Storage entries: {}", snapshot.entry_count());
		println!("  Saved to: {}", path.display());
	}
	Ok(0)
}

fn format_expiry(expires: Option<f64>) -> String {
	let ts = match expires {
		None => return "session".into(),
		Some(ts) if ts < 0.0 => return "session".into(),
		Some(ts) => ts as i64,
	};

	let now = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs() as i64)
		.unwrap_or(0);

	if ts < now {
		return "expired".into();
	}

	let diff = ts - now;
	match diff {
		d if d < 3600 => format!("{}m", d / 60),
		d if d < 86400 => format!("{}h", d / 3600),
		d => format!("{}d", d / 86400),
	}
}

fn truncate(value: &str, max: usize) -> String {
	match value.char_indices().nth(max) {
		Some((idx, _)) => format!("{}...", &value[..idx]),
		None => value.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn expiry_formatting() {
		assert_eq!(format_expiry(None), "session");
		assert_eq!(format_expiry(Some(-1.0)), "session");
		assert_eq!(format_expiry(Some(1.0)), "expired");

		let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as f64;
		assert_eq!(format_expiry(Some(now + 2.0 * 86400.0 + 60.0)), "2d");
	}

	#[test]
	fn truncation_respects_char_boundaries() {
		assert_eq!(truncate("short", 50), "short");
		assert_eq!(truncate("ééééé", 3), "ééé...");
	}
}

//! hqe: session reuse and eventual-state polling for the HQ Admin end-to-end suite.
//!
//! Two pieces carry the weight:
//!
//! - [`session`]: persists an authenticated browser snapshot per environment
//!   and decides on each run whether to replay it or log in again. The
//!   [`SessionGate`] makes that decision once per run, ahead of every worker.
//! - [`poll`]: retries a check until it passes or a timeout elapses, for UI
//!   state driven by asynchronous backend work.
//!
//! [`runner`] ties them together for scenarios written in Rust: setup barrier,
//! bounded parallelism and whole-scenario retries.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hqe::{Config, CommandAuthenticator, SessionGate};
//!
//! let config = Config::from_env()?;
//! let authenticator = Arc::new(CommandAuthenticator::from_config(&config)?);
//! let gate = SessionGate::from_config(&config, authenticator)?;
//! let session = gate.ensure().await?;
//! println!("storage state: {}", session.cached.path.display());
//! ```

pub mod config;
pub mod error;
pub mod poll;
pub mod runner;
pub mod session;

pub use config::{CacheSettings, Config, Credentials, Environment, ExpiryMode, ExpiryPolicy, LoginCommand};
pub use error::{Error, Result};
pub use poll::{CheckOutcome, PollTimeoutError, Poller, poll_until};
pub use runner::{RunReport, Scenario, ScenarioContext, ScenarioOutcome, ScenarioRunner, Verdict, unique_name};
pub use session::{
	AuthenticatedSession, Authenticator, CachedSession, CommandAuthenticator, FeatureFlags, GateState, LoginRequest,
	SessionCache, SessionGate, SessionSnapshot, SessionValidity, SetupOutcome, ValidityReason,
};

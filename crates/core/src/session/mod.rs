//! Session reuse across runs.
//!
//! A successful login is captured as a [`SessionSnapshot`] and persisted per
//! environment. Each run replays it when still usable and logs in otherwise.

/// Environment-keyed snapshot file.
pub mod cache;
/// Setup barrier shared by workers.
pub mod gate;
/// Login driver trait, command driver and feature flags.
pub mod login;
/// Token `exp` extraction.
pub mod token;
/// Expiry judgment.
pub mod validity;

pub use cache::{CachedSession, SessionCache};
pub use gate::{AuthenticatedSession, GateState, SessionGate, SetupOutcome};
pub use hq_e2e_protocol::SessionSnapshot;
pub use login::{Authenticator, CommandAuthenticator, FeatureFlags, LoginRequest};
pub use token::TokenClaim;
pub use validity::{SessionValidity, ValidityReason};

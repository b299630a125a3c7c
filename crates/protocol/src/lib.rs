//! Wire types for browser storage-state snapshots.
//!
//! This crate contains the serde-serializable types that make up a persisted
//! browser session: the cookie jar and the per-origin storage entries. They
//! match the `storageState` JSON shape written by the browser automation
//! driver, so a snapshot captured by any driver can be read back here.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: Only small lookup/insert helpers beyond serde
//! * 1:1 with the file format: camelCase field names, lenient on unknown fields
//! * Stable: Changes only when the on-disk format changes
//!
//! Cache policy, expiry checks and file handling live in `hq-e2e`.

pub mod cookie;
pub mod snapshot;

pub use cookie::*;
pub use snapshot::*;

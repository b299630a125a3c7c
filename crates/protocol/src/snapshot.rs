//! Session snapshot: cookie jar plus per-origin storage.

use serde::{Deserialize, Serialize};

use crate::cookie::Cookie;

/// A captured browser authentication state.
///
/// Serialized as `{ "cookies": [...], "origins": [{ "origin", "localStorage": [...] }] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
	#[serde(default)]
	pub cookies: Vec<Cookie>,
	#[serde(default)]
	pub origins: Vec<OriginState>,
}

/// Storage entries scoped to one origin (scheme + host + port).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
	pub origin: String,
	#[serde(default)]
	pub local_storage: Vec<StorageEntry>,
}

/// A single persisted client-side storage entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
	pub name: String,
	pub value: String,
}

impl StorageEntry {
	pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
		}
	}
}

impl SessionSnapshot {
	/// Parses a snapshot from its JSON text.
	pub fn from_json(json: &str) -> serde_json::Result<Self> {
		serde_json::from_str(json)
	}

	/// Renders the snapshot as pretty-printed JSON.
	pub fn to_json_pretty(&self) -> serde_json::Result<String> {
		serde_json::to_string_pretty(self)
	}

	/// True when at least one origin holds at least one entry.
	pub fn has_entries(&self) -> bool {
		self.origins.iter().any(|o| !o.local_storage.is_empty())
	}

	/// Total number of storage entries across all origins.
	pub fn entry_count(&self) -> usize {
		self.origins.iter().map(|o| o.local_storage.len()).sum()
	}

	pub fn origin(&self, origin: &str) -> Option<&OriginState> {
		self.origins.iter().find(|o| o.origin == origin)
	}

	/// Inserts or replaces `name` under `origin`, creating the origin if needed.
	pub fn set_entry(&mut self, origin: &str, name: impl Into<String>, value: impl Into<String>) {
		let name = name.into();
		let value = value.into();

		let idx = match self.origins.iter().position(|o| o.origin == origin) {
			Some(idx) => idx,
			None => {
				self.origins.push(OriginState {
					origin: origin.to_string(),
					local_storage: Vec::new(),
				});
				self.origins.len() - 1
			}
		};

		let entries = &mut self.origins[idx].local_storage;
		match entries.iter_mut().find(|e| e.name == name) {
			Some(entry) => entry.value = value,
			None => entries.push(StorageEntry { name, value }),
		}
	}
}

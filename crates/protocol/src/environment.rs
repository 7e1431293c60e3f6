//! The suite-wide environment handed to scenarios.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Base URL and request defaults selected once at suite bootstrap.
///
/// Shared read-only between scenarios. A scenario that needs a different
/// base URL derives a local copy with [`ActiveEnvironment::with_base_uri`]
/// instead of mutating the shared value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveEnvironment {
	#[serde(rename = "baseURI")]
	pub base_uri: String,
	#[serde(default)]
	pub base_path: String,
	#[serde(default)]
	pub default_headers: BTreeMap<String, String>,
}

impl ActiveEnvironment {
	pub fn new(base_uri: impl Into<String>) -> Self {
		Self {
			base_uri: base_uri.into(),
			base_path: String::new(),
			default_headers: BTreeMap::new(),
		}
	}

	pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
		self.base_path = base_path.into();
		self
	}

	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.default_headers.insert(name.into(), value.into());
		self
	}

	/// Returns a local copy pointing at another base URI, keeping path and headers.
	pub fn with_base_uri(&self, base_uri: impl Into<String>) -> Self {
		Self {
			base_uri: base_uri.into(),
			..self.clone()
		}
	}

	/// `baseURI` joined with `basePath`, without a trailing slash.
	pub fn root_url(&self) -> String {
		join_segments(&self.base_uri, &self.base_path)
	}

	/// Resolves `path` against the environment.
	///
	/// Absolute `http(s)://` URLs pass through unchanged.
	pub fn url_for(&self, path: &str) -> String {
		if is_absolute_url(path) {
			return path.to_string();
		}
		join_segments(&self.root_url(), path)
	}
}

/// Returns true for `http://` and `https://` URLs.
pub fn is_absolute_url(s: &str) -> bool {
	let lower = s.trim_start().to_ascii_lowercase();
	lower.starts_with("http://") || lower.starts_with("https://")
}

fn join_segments(base: &str, tail: &str) -> String {
	let base = base.trim_end_matches('/');
	let tail = tail.trim_matches('/');
	if tail.is_empty() {
		base.to_string()
	} else {
		format!("{base}/{tail}")
	}
}

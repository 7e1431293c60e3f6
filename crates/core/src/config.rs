//! Harness configuration.
//!
//! Layered as: built-in defaults, then an optional JSON file, then
//! `TESTBED_*` environment variables. Callers (the CLI) apply their own flags
//! last and call [`HarnessConfig::validate`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use testbed_protocol::BrowserKind;
use tracing::debug;

use crate::environment::EnvironmentTemplate;
use crate::error::{Error, Result};
use crate::probe::ProbeTimeouts;
use crate::retry::{Backoff, RetryPolicy};
use crate::session::webdriver::LaunchOptions;

/// Used when no candidate answers.
pub const DEFAULT_FALLBACK_URL: &str = "https://testweb.paytr.com";

pub const ENV_CANDIDATES: &str = "TESTBED_CANDIDATES";
pub const ENV_FALLBACK_URL: &str = "TESTBED_FALLBACK_URL";
pub const ENV_BROWSER: &str = "TESTBED_BROWSER";
pub const ENV_HEADLESS: &str = "TESTBED_HEADLESS";
pub const ENV_WEBDRIVER_URL: &str = "TESTBED_WEBDRIVER_URL";
pub const ENV_MAX_ATTEMPTS: &str = "TESTBED_MAX_ATTEMPTS";
pub const ENV_BACKOFF_MS: &str = "TESTBED_BACKOFF_MS";
pub const ENV_SCENARIO_ATTEMPTS: &str = "TESTBED_SCENARIO_ATTEMPTS";
pub const ENV_ARTIFACTS_DIR: &str = "TESTBED_ARTIFACTS_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HarnessConfig {
	/// Candidate base URLs, highest priority first.
	pub candidates: Vec<String>,
	pub fallback_url: String,
	pub probe: ProbeTimeouts,
	pub base_path: String,
	pub default_headers: BTreeMap<String, String>,
	pub navigation: RetryPolicy,
	/// Runs per failed scenario, including the first; pauses 1s, then 2s.
	pub scenario_retry: RetryPolicy,
	pub browser: BrowserKind,
	pub launch: LaunchOptions,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub artifacts_dir: Option<PathBuf>,
	/// Parallel scenario workers, each with its own browser session.
	pub workers: usize,
}

impl Default for HarnessConfig {
	fn default() -> Self {
		Self {
			candidates: Vec::new(),
			fallback_url: DEFAULT_FALLBACK_URL.to_string(),
			probe: ProbeTimeouts::default(),
			base_path: String::new(),
			default_headers: BTreeMap::from([
				("Accept".to_string(), "application/json".to_string()),
				("Content-Type".to_string(), "application/json".to_string()),
			]),
			navigation: RetryPolicy::default(),
			scenario_retry: RetryPolicy::new(
				3,
				Backoff::Exponential {
					base: Duration::from_secs(1),
					max: Duration::from_secs(3),
				},
			),
			browser: BrowserKind::default(),
			launch: LaunchOptions::default(),
			artifacts_dir: None,
			workers: 1,
		}
	}
}

impl HarnessConfig {
	/// Reads a JSON config file. Missing keys keep their defaults.
	pub fn load(path: &Path) -> Result<Self> {
		let raw = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
			path: path.to_path_buf(),
			source,
		})?;
		let config = serde_json::from_str(&raw).map_err(|source| Error::ConfigParse {
			path: path.to_path_buf(),
			source,
		})?;
		debug!(target = "testbed.config", path = %path.display(), "loaded config file");
		Ok(config)
	}

	/// Defaults, then `path` when given, then the process environment.
	pub fn resolve(path: Option<&Path>) -> Result<Self> {
		let mut config = match path {
			Some(path) => Self::load(path)?,
			None => Self::default(),
		};
		config.apply_env()?;
		Ok(config)
	}

	pub fn apply_env(&mut self) -> Result<()> {
		self.apply_env_from(|key| std::env::var(key).ok())
	}

	/// Applies `TESTBED_*` overrides read through `lookup`.
	pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
		if let Some(list) = lookup(ENV_CANDIDATES) {
			self.candidates = list
				.split(',')
				.map(str::trim)
				.filter(|s| !s.is_empty())
				.map(String::from)
				.collect();
		}
		if let Some(url) = lookup(ENV_FALLBACK_URL) {
			self.fallback_url = url.trim().to_string();
		}
		if let Some(browser) = lookup(ENV_BROWSER) {
			self.browser = browser
				.parse()
				.map_err(|e| Error::InvalidConfig(format!("{ENV_BROWSER}: {e}")))?;
		}
		if let Some(headless) = lookup(ENV_HEADLESS) {
			self.launch.headless = parse_bool(&headless)
				.ok_or_else(|| Error::InvalidConfig(format!("{ENV_HEADLESS}: expected true/false, got {headless:?}")))?;
		}
		if let Some(url) = lookup(ENV_WEBDRIVER_URL) {
			let url = url.trim();
			self.launch.webdriver_url = (!url.is_empty()).then(|| url.to_string());
		}
		if let Some(attempts) = lookup(ENV_MAX_ATTEMPTS) {
			self.navigation.max_attempts = parse_number(ENV_MAX_ATTEMPTS, &attempts)?;
		}
		if let Some(attempts) = lookup(ENV_SCENARIO_ATTEMPTS) {
			self.scenario_retry.max_attempts = parse_number(ENV_SCENARIO_ATTEMPTS, &attempts)?;
		}
		if let Some(ms) = lookup(ENV_BACKOFF_MS) {
			let delay = Duration::from_millis(parse_number(ENV_BACKOFF_MS, &ms)?);
			self.navigation.backoff = Backoff::fixed(delay);
		}
		if let Some(dir) = lookup(ENV_ARTIFACTS_DIR) {
			self.artifacts_dir = (!dir.trim().is_empty()).then(|| PathBuf::from(dir.trim()));
		}
		Ok(())
	}

	/// Rejects settings the harness cannot run with.
	pub fn validate(&self) -> Result<()> {
		for candidate in &self.candidates {
			check_http_url("candidate", candidate)?;
		}
		check_http_url("fallbackUrl", &self.fallback_url)?;
		if let Some(url) = &self.launch.webdriver_url {
			check_http_url("launch.webdriverUrl", url)?;
		}
		if self.probe.connect_ms == 0 || self.probe.read_ms == 0 {
			return Err(Error::InvalidConfig("probe timeouts must be greater than zero".into()));
		}
		if self.navigation.max_attempts == 0 {
			return Err(Error::InvalidConfig("navigation.maxAttempts must be at least 1".into()));
		}
		if self.scenario_retry.max_attempts == 0 {
			return Err(Error::InvalidConfig("scenarioRetry.maxAttempts must be at least 1".into()));
		}
		if self.workers == 0 {
			return Err(Error::InvalidConfig("workers must be at least 1".into()));
		}
		if self.launch.window_width == 0 || self.launch.window_height == 0 {
			return Err(Error::InvalidConfig("window size must be non-zero".into()));
		}
		Ok(())
	}

	/// Base path and headers applied to the selected base URI.
	pub fn template(&self) -> EnvironmentTemplate {
		EnvironmentTemplate {
			base_path: self.base_path.clone(),
			default_headers: self.default_headers.clone(),
		}
	}
}

fn check_http_url(field: &str, value: &str) -> Result<()> {
	if value.trim().is_empty() {
		return Err(Error::InvalidConfig(format!("{field} must not be empty")));
	}
	let parsed = url::Url::parse(value).map_err(|e| Error::InvalidConfig(format!("{field} {value:?}: {e}")))?;
	if !matches!(parsed.scheme(), "http" | "https") {
		return Err(Error::InvalidConfig(format!("{field} {value:?}: expected http or https")));
	}
	Ok(())
}

fn parse_bool(s: &str) -> Option<bool> {
	match s.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => None,
	}
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
	value
		.trim()
		.parse()
		.map_err(|_| Error::InvalidConfig(format!("{key}: expected a number, got {value:?}")))
}

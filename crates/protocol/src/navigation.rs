//! Navigation attempt records.

use serde::{Deserialize, Serialize};

/// Classification of a single navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptOutcome {
	Success,
	RetryableFailure,
	FatalFailure,
}

/// One step of a retried navigation, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationAttempt {
	pub target_url: String,
	/// 1-based.
	pub attempt_number: u32,
	pub outcome: AttemptOutcome,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Result of a successful navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationReport {
	pub target_url: String,
	/// Location reported by the browser after the load; may differ after redirects.
	pub location: String,
	pub attempts: Vec<NavigationAttempt>,
}

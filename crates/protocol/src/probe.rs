//! Reachability probe outcomes.

use serde::{Deserialize, Serialize};

/// Outcome of probing one candidate endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
	pub endpoint: String,
	pub reachable: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub observed_status: Option<u16>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl ProbeResult {
	/// The server answered with `status`; `reachable` records whether it counts.
	pub fn answered(endpoint: impl Into<String>, status: u16, reachable: bool) -> Self {
		Self {
			endpoint: endpoint.into(),
			reachable,
			observed_status: Some(status),
			error: if reachable {
				None
			} else {
				Some(format!("unexpected status {status}"))
			},
		}
	}

	/// No HTTP answer at all (refused, timed out, malformed URL, ...).
	pub fn failed(endpoint: impl Into<String>, error: impl Into<String>) -> Self {
		Self {
			endpoint: endpoint.into(),
			reachable: false,
			observed_status: None,
			error: Some(error.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn failed_probe_skips_status_field() {
		let result = ProbeResult::failed("https://dead.example", "connection refused");
		let json = serde_json::to_string(&result).unwrap();
		assert!(!json.contains("observedStatus"));
		assert!(json.contains("\"reachable\":false"));
		assert!(json.contains("connection refused"));
	}

	#[test]
	fn unreachable_status_records_reason() {
		let result = ProbeResult::answered("https://flaky.example", 503, false);
		assert_eq!(result.observed_status, Some(503));
		assert_eq!(result.error.as_deref(), Some("unexpected status 503"));
	}
}

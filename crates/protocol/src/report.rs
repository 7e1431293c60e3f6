//! Scenario and suite outcome reports.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::environment::ActiveEnvironment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
	Passed,
	Failed,
	Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
	Screenshot,
	Html,
}

/// A debug file captured from a browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
	#[serde(rename = "type")]
	pub artifact_type: ArtifactType,
	pub path: PathBuf,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
	pub id: String,
	pub name: String,
	pub status: ScenarioStatus,
	pub duration_ms: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub artifacts: Vec<Artifact>,
	/// Runs made, including retries. Artifacts belong to the last one.
	#[serde(default = "one")]
	pub attempts: u32,
	/// Index of the worker that ran the scenario.
	pub worker: usize,
}

fn one() -> u32 {
	1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteReport {
	pub environment: ActiveEnvironment,
	pub total: usize,
	pub passed: usize,
	pub failed: usize,
	pub skipped: usize,
	pub duration_ms: u64,
	pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
	/// Aggregates scenario reports, ordering them by scenario id.
	pub fn new(environment: ActiveEnvironment, mut scenarios: Vec<ScenarioReport>, duration_ms: u64) -> Self {
		scenarios.sort_by(|a, b| a.id.cmp(&b.id));
		let count = |status| scenarios.iter().filter(|s| s.status == status).count();
		Self {
			environment,
			total: scenarios.len(),
			passed: count(ScenarioStatus::Passed),
			failed: count(ScenarioStatus::Failed),
			skipped: count(ScenarioStatus::Skipped),
			duration_ms,
			scenarios,
		}
	}

	pub fn is_success(&self) -> bool {
		self.failed == 0
	}

	pub fn failures(&self) -> impl Iterator<Item = &ScenarioReport> {
		self.scenarios.iter().filter(|s| s.status == ScenarioStatus::Failed)
	}
}

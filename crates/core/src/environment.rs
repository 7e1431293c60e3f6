//! Environment selection.
//!
//! Candidates are probed strictly in order and the first reachable one wins;
//! later candidates are never probed. When nothing answers, the fallback is
//! used without being probed. [`EnvironmentSelector`] runs the selection at
//! most once and hands the cached result to every scenario of the run.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use testbed_protocol::{ActiveEnvironment, ProbeResult};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::probe::Prober;

/// Base path and headers applied to whichever base URI is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentTemplate {
	pub base_path: String,
	pub default_headers: BTreeMap<String, String>,
}

impl EnvironmentTemplate {
	pub fn build(&self, base_uri: &str) -> ActiveEnvironment {
		ActiveEnvironment {
			base_uri: base_uri.to_string(),
			base_path: self.base_path.clone(),
			default_headers: self.default_headers.clone(),
		}
	}
}

/// Outcome of a selection, with the probes that led to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
	pub environment: ActiveEnvironment,
	pub probes: Vec<ProbeResult>,
	/// True when no candidate was reachable.
	pub fell_back: bool,
}

/// Probes `candidates` in order and returns the first reachable one,
/// or `fallback` (unprobed) when none is.
pub async fn select_environment(
	prober: &dyn Prober,
	candidates: &[String],
	fallback: &str,
	template: &EnvironmentTemplate,
) -> Selection {
	let mut probes = Vec::with_capacity(candidates.len());

	for candidate in candidates {
		let result = prober.probe(candidate).await;
		let reachable = result.reachable;
		probes.push(result);
		if reachable {
			info!(target = "testbed.environment", url = %candidate, "selected environment");
			return Selection {
				environment: template.build(candidate),
				probes,
				fell_back: false,
			};
		}
	}

	warn!(
		target = "testbed.environment",
		candidates = candidates.len(),
		fallback,
		"no reachable candidate, using fallback"
	);
	Selection {
		environment: template.build(fallback),
		probes,
		fell_back: true,
	}
}

/// Suite-scoped, run-once environment selection.
pub struct EnvironmentSelector {
	prober: Arc<dyn Prober>,
	candidates: Vec<String>,
	fallback: String,
	template: EnvironmentTemplate,
	selected: OnceCell<Selection>,
}

impl EnvironmentSelector {
	pub fn new(
		prober: Arc<dyn Prober>,
		candidates: Vec<String>,
		fallback: impl Into<String>,
		template: EnvironmentTemplate,
	) -> Self {
		Self {
			prober,
			candidates,
			fallback: fallback.into(),
			template,
			selected: OnceCell::new(),
		}
	}

	/// Selects on first call; later calls return the cached selection.
	pub async fn selection(&self) -> &Selection {
		self.selected
			.get_or_init(|| select_environment(self.prober.as_ref(), &self.candidates, &self.fallback, &self.template))
			.await
	}

	pub async fn environment(&self) -> &ActiveEnvironment {
		&self.selection().await.environment
	}

	/// The cached selection, if selection already ran.
	pub fn cached(&self) -> Option<&Selection> {
		self.selected.get()
	}
}

impl std::fmt::Debug for EnvironmentSelector {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EnvironmentSelector")
			.field("candidates", &self.candidates)
			.field("fallback", &self.fallback)
			.field("selected", &self.selected.get().map(|s| &s.environment.base_uri))
			.finish()
	}
}

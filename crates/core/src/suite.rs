//! Suite bootstrap and scenario execution.
//!
//! A [`Suite`] selects the environment once, then runs its scenarios on one
//! or more workers. Each worker owns a [`SessionManager`] and releases its
//! session when it runs out of scenarios, whatever their outcomes were.
//! Failed scenarios are rerun under [`HarnessConfig::scenario_retry`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::anyhow;
use futures::FutureExt;
use parking_lot::Mutex;
use testbed_protocol::{ActiveEnvironment, Artifact, BrowserKind, ScenarioReport, ScenarioStatus, SuiteReport};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::artifacts::collect_failure_artifacts;
use crate::config::HarnessConfig;
use crate::environment::{EnvironmentSelector, Selection};
use crate::error::{Error, Result};
use crate::http::ApiClient;
use crate::navigate::Navigator;
use crate::probe::{HttpProber, Prober};
use crate::retry::{RetryError, RetryPolicy, Sleeper, TokioSleeper, run_with_retry};
use crate::scenario::{Scenario, ScenarioContext, Skip};
use crate::session::webdriver::WebDriverLauncher;
use crate::session::{SessionLauncher, SessionManager};

const CANCELLED: &str = "suite cancelled";

pub struct Suite {
	config: HarnessConfig,
	selector: EnvironmentSelector,
	launcher: Arc<dyn SessionLauncher>,
	sleeper: Arc<dyn Sleeper>,
	cancel: CancellationToken,
	scenarios: Vec<Arc<dyn Scenario>>,
}

impl Suite {
	/// Suite with the HTTP prober and WebDriver launcher described by `config`.
	pub fn from_config(config: HarnessConfig) -> Result<Self> {
		config.validate()?;
		let prober = Arc::new(HttpProber::new(config.probe)?);
		let launcher = Arc::new(WebDriverLauncher::new(config.launch.clone()));
		Ok(Self::new(config, prober, launcher))
	}

	pub fn new(config: HarnessConfig, prober: Arc<dyn Prober>, launcher: Arc<dyn SessionLauncher>) -> Self {
		let selector = EnvironmentSelector::new(
			prober,
			config.candidates.clone(),
			config.fallback_url.clone(),
			config.template(),
		);
		Self {
			config,
			selector,
			launcher,
			sleeper: Arc::new(TokioSleeper),
			cancel: CancellationToken::new(),
			scenarios: Vec::new(),
		}
	}

	pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
		self.sleeper = sleeper;
		self
	}

	/// Token that stops navigation and scenario backoffs and skips scenarios
	/// not yet started.
	pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
		self.cancel = cancel;
		self
	}

	pub fn add(&mut self, scenario: impl Scenario + 'static) -> &mut Self {
		self.scenarios.push(Arc::new(scenario));
		self
	}

	pub fn config(&self) -> &HarnessConfig {
		&self.config
	}

	pub fn launcher(&self) -> Arc<dyn SessionLauncher> {
		self.launcher.clone()
	}

	/// Navigator configured with the suite's policy, sleeper and token.
	pub fn navigator(&self) -> Navigator {
		Navigator::new(self.config.navigation)
			.with_sleeper(self.sleeper.clone())
			.with_cancellation(self.cancel.clone())
	}

	/// Environment selection; runs on first call only.
	pub async fn selection(&self) -> &Selection {
		self.selector.selection().await
	}

	pub async fn environment(&self) -> &ActiveEnvironment {
		self.selector.environment().await
	}

	/// Runs every scenario with the configured number of workers.
	pub async fn run(&self) -> Result<SuiteReport> {
		self.run_parallel(self.config.workers).await
	}

	/// Runs every scenario on up to `workers` parallel workers.
	pub async fn run_parallel(&self, workers: usize) -> Result<SuiteReport> {
		let started = Instant::now();
		let environment = Arc::new(self.environment().await.clone());
		let http = ApiClient::new(environment.as_ref().clone(), self.config.probe)?;

		let shared = Arc::new(WorkerShared {
			scenarios: self.scenarios.clone(),
			next: AtomicUsize::new(0),
			environment: environment.clone(),
			http,
			navigator: self.navigator(),
			scenario_retry: self.config.scenario_retry,
			sleeper: self.sleeper.clone(),
			launcher: self.launcher.clone(),
			browser: self.config.browser,
			artifacts_dir: self.config.artifacts_dir.clone(),
			cancel: self.cancel.clone(),
		});

		let workers = workers.clamp(1, self.scenarios.len().max(1));
		info!(
			target = "testbed.suite",
			scenarios = self.scenarios.len(),
			workers,
			environment = %environment.base_uri,
			"running suite"
		);

		let mut tasks = JoinSet::new();
		for worker in 0..workers {
			tasks.spawn(run_worker(worker, shared.clone()));
		}

		let mut reports = Vec::with_capacity(self.scenarios.len());
		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok(worker_reports) => reports.extend(worker_reports),
				Err(e) => error!(target = "testbed.suite", error = %e, "worker task failed"),
			}
		}

		let report = SuiteReport::new(environment.as_ref().clone(), reports, started.elapsed().as_millis() as u64);
		info!(
			target = "testbed.suite",
			passed = report.passed,
			failed = report.failed,
			skipped = report.skipped,
			duration_ms = report.duration_ms,
			"suite finished"
		);
		Ok(report)
	}
}

impl std::fmt::Debug for Suite {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Suite")
			.field("selector", &self.selector)
			.field("scenarios", &self.scenarios.len())
			.finish_non_exhaustive()
	}
}

/// Writes `report` as pretty JSON, creating parent directories.
pub fn write_report(report: &SuiteReport, path: &Path) -> Result<()> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(path, serde_json::to_vec_pretty(report)?)?;
	Ok(())
}

struct WorkerShared {
	scenarios: Vec<Arc<dyn Scenario>>,
	next: AtomicUsize,
	environment: Arc<ActiveEnvironment>,
	http: ApiClient,
	navigator: Navigator,
	scenario_retry: RetryPolicy,
	sleeper: Arc<dyn Sleeper>,
	launcher: Arc<dyn SessionLauncher>,
	browser: BrowserKind,
	artifacts_dir: Option<PathBuf>,
	cancel: CancellationToken,
}

async fn run_worker(worker: usize, shared: Arc<WorkerShared>) -> Vec<ScenarioReport> {
	let mut sessions = SessionManager::new(shared.launcher.clone());
	let mut reports = Vec::new();

	loop {
		let index = shared.next.fetch_add(1, Ordering::SeqCst);
		let Some(scenario) = shared.scenarios.get(index) else {
			break;
		};
		let report = if shared.cancel.is_cancelled() {
			ScenarioReport {
				id: scenario.id().to_string(),
				name: scenario.name().to_string(),
				status: ScenarioStatus::Skipped,
				duration_ms: 0,
				error: Some(CANCELLED.to_string()),
				artifacts: Vec::new(),
				attempts: 0,
				worker,
			}
		} else {
			run_scenario(worker, scenario.as_ref(), &mut sessions, &shared).await
		};
		reports.push(report);
	}

	sessions.release().await;
	reports
}

/// Runs `scenario` under the suite's retry policy.
///
/// Failure artifacts come from the last run: the ones the scenario captured
/// itself, otherwise a screenshot and page source of the worker's session.
async fn run_scenario(
	worker: usize,
	scenario: &dyn Scenario,
	sessions: &mut SessionManager,
	shared: &WorkerShared,
) -> ScenarioReport {
	let started = Instant::now();
	let sessions = tokio::sync::Mutex::new(sessions);
	let artifacts = Mutex::new(Vec::new());
	let attempts = AtomicU32::new(0);

	let outcome = {
		let (sessions, artifacts, attempts) = (&sessions, &artifacts, &attempts);
		run_with_retry(
			scenario.id(),
			&shared.scenario_retry,
			shared.sleeper.as_ref(),
			&shared.cancel,
			move |attempt| async move {
				attempts.store(attempt, Ordering::SeqCst);
				let mut sessions = sessions.lock().await;
				let (result, captured) = run_attempt(scenario, &mut **sessions, shared).await;
				*artifacts.lock() = captured;
				result
			},
		)
		.await
	};

	let (status, error) = match outcome {
		Ok(()) => (ScenarioStatus::Passed, None),
		Err(RetryError::Cancelled { .. }) => (ScenarioStatus::Skipped, Some(CANCELLED.to_string())),
		Err(RetryError::Fatal { error, .. } | RetryError::Exhausted { last: error, .. }) => classify_failure(&error),
	};

	let mut artifacts = artifacts.into_inner();
	if status == ScenarioStatus::Failed && artifacts.is_empty() {
		let sessions = sessions.into_inner();
		if let (Some(dir), Some(session)) = (&shared.artifacts_dir, sessions.current()) {
			artifacts = collect_failure_artifacts(session, dir, scenario.id()).await;
		}
	}

	let attempts = attempts.into_inner();
	let duration_ms = started.elapsed().as_millis() as u64;
	match status {
		ScenarioStatus::Failed => warn!(
			target = "testbed.suite",
			scenario = scenario.id(),
			worker,
			attempts,
			error = error.as_deref(),
			"scenario failed"
		),
		_ => info!(
			target = "testbed.suite",
			scenario = scenario.id(),
			worker,
			?status,
			attempts,
			duration_ms,
			"scenario finished"
		),
	}

	ScenarioReport {
		id: scenario.id().to_string(),
		name: scenario.name().to_string(),
		status,
		duration_ms,
		error,
		artifacts,
		attempts,
		worker,
	}
}

/// One run of `scenario`. A panic becomes an error.
async fn run_attempt(
	scenario: &dyn Scenario,
	sessions: &mut SessionManager,
	shared: &WorkerShared,
) -> (anyhow::Result<()>, Vec<Artifact>) {
	let mut ctx = ScenarioContext::new(
		scenario.id(),
		shared.environment.clone(),
		shared.http.clone(),
		shared.browser,
		sessions,
		&shared.navigator,
	)
	.with_artifacts_dir(shared.artifacts_dir.clone());

	let result = match AssertUnwindSafe(scenario.run(&mut ctx)).catch_unwind().await {
		Ok(result) => result,
		Err(payload) => Err(anyhow!("panicked: {}", panic_message(payload.as_ref()))),
	};
	(result, ctx.take_artifacts())
}

/// Skips and cancellation are reported as skipped, anything else as failed.
fn classify_failure(err: &anyhow::Error) -> (ScenarioStatus, Option<String>) {
	if let Some(Skip(reason)) = err.downcast_ref::<Skip>() {
		return (ScenarioStatus::Skipped, Some(reason.clone()));
	}
	if err.downcast_ref::<Error>().is_some_and(Error::is_cancelled) {
		return (ScenarioStatus::Skipped, Some(CANCELLED.to_string()));
	}
	(ScenarioStatus::Failed, Some(format!("{err:#}")))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	}
}

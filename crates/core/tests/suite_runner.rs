//! Suite bootstrap, scenario outcomes and per-worker teardown.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{bail, ensure};
use async_trait::async_trait;
use testbed::protocol::{ArtifactType, ScenarioStatus};
use testbed::smoke::add_smoke_scenarios;
use testbed::testing::{MockLauncher, RecordingSleeper, ScriptedProber};
use testbed::{CancellationToken, HarnessConfig, Scenario, ScenarioContext, Suite, check, skip, write_report};

fn config(candidates: &[&str]) -> HarnessConfig {
	HarnessConfig {
		candidates: candidates.iter().map(|s| s.to_string()).collect(),
		..HarnessConfig::default()
	}
}

fn suite(prober: Arc<ScriptedProber>, launcher: Arc<MockLauncher>) -> Suite {
	Suite::new(config(&["https://dead.example", "https://good.example"]), prober, launcher)
		.with_sleeper(Arc::new(RecordingSleeper::new()))
}

fn good_prober() -> Arc<ScriptedProber> {
	Arc::new(ScriptedProber::new().reachable("https://good.example"))
}

struct Navigates {
	id: &'static str,
	path: &'static str,
}

#[async_trait]
impl Scenario for Navigates {
	fn id(&self) -> &str {
		self.id
	}

	fn name(&self) -> &str {
		"navigates"
	}

	async fn run(&self, ctx: &mut ScenarioContext<'_>) -> anyhow::Result<()> {
		let report = ctx.navigate(self.path).await?;
		ensure!(report.location.starts_with("https://good.example"), "landed on {}", report.location);
		Ok(())
	}
}

struct Asserts {
	id: &'static str,
	pass: bool,
}

#[async_trait]
impl Scenario for Asserts {
	fn id(&self) -> &str {
		self.id
	}

	fn name(&self) -> &str {
		"asserts"
	}

	async fn run(&self, ctx: &mut ScenarioContext<'_>) -> anyhow::Result<()> {
		check!(ctx.environment().base_uri == "https://good.example", "wrong environment");
		check!(self.pass, "expected status 200, got 500");
		Ok(())
	}
}

struct Skips;

#[async_trait]
impl Scenario for Skips {
	fn id(&self) -> &str {
		"ST-900"
	}

	fn name(&self) -> &str {
		"skips"
	}

	async fn run(&self, _ctx: &mut ScenarioContext<'_>) -> anyhow::Result<()> {
		Err(skip("3D secure not available in this environment"))
	}
}

struct Panics;

#[async_trait]
impl Scenario for Panics {
	fn id(&self) -> &str {
		"ST-999"
	}

	fn name(&self) -> &str {
		"panics"
	}

	async fn run(&self, ctx: &mut ScenarioContext<'_>) -> anyhow::Result<()> {
		ctx.session().await?;
		panic!("assertion exploded");
	}
}

struct CountsEnvironment(Arc<AtomicUsize>);

#[async_trait]
impl Scenario for CountsEnvironment {
	fn id(&self) -> &str {
		"ST-500"
	}

	fn name(&self) -> &str {
		"local override"
	}

	async fn run(&self, ctx: &mut ScenarioContext<'_>) -> anyhow::Result<()> {
		let local = ctx.http().with_base_uri("https://local.example");
		ensure!(local.url("/x") == "https://local.example/x");
		ensure!(ctx.environment().base_uri == "https://good.example");
		self.0.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

/// Fails with a connection error on its first `failures` runs.
struct Flaky {
	failures: usize,
	runs: Arc<AtomicUsize>,
}

#[async_trait]
impl Scenario for Flaky {
	fn id(&self) -> &str {
		"ST-300"
	}

	fn name(&self) -> &str {
		"flaky"
	}

	async fn run(&self, _ctx: &mut ScenarioContext<'_>) -> anyhow::Result<()> {
		if self.runs.fetch_add(1, Ordering::SeqCst) < self.failures {
			bail!("connection reset by peer");
		}
		Ok(())
	}
}

/// Loads the payment page, then finds no pay button.
struct MissingPayButton;

#[async_trait]
impl Scenario for MissingPayButton {
	fn id(&self) -> &str {
		"ST-400"
	}

	fn name(&self) -> &str {
		"pay button"
	}

	async fn run(&self, ctx: &mut ScenarioContext<'_>) -> anyhow::Result<()> {
		ctx.navigate("/odeme").await?;
		check!(false, "expected pay button");
		Ok(())
	}
}

/// Cancels the suite, then hits a failure that would normally be retried.
struct CancelsThenFails {
	cancel: CancellationToken,
	navigate: bool,
}

#[async_trait]
impl Scenario for CancelsThenFails {
	fn id(&self) -> &str {
		"ST-600"
	}

	fn name(&self) -> &str {
		"cancelled mid-run"
	}

	async fn run(&self, ctx: &mut ScenarioContext<'_>) -> anyhow::Result<()> {
		self.cancel.cancel();
		if self.navigate {
			ctx.navigate("/odeme").await?;
		}
		bail!("connection reset by peer")
	}
}

#[tokio::test]
async fn outcomes_are_reported_per_scenario() {
	let launcher = Arc::new(MockLauncher::new());
	let mut suite = suite(good_prober(), launcher.clone());
	suite
		.add(Asserts { id: "ST-002", pass: false })
		.add(Asserts { id: "ST-001", pass: true })
		.add(Skips)
		.add(Panics);

	let report = suite.run().await.unwrap();

	assert_eq!(report.total, 4);
	assert_eq!((report.passed, report.failed, report.skipped), (1, 2, 1));
	let ids: Vec<_> = report.scenarios.iter().map(|s| s.id.as_str()).collect();
	assert_eq!(ids, ["ST-001", "ST-002", "ST-900", "ST-999"]);
	assert_eq!(report.scenarios[1].error.as_deref(), Some("expected status 200, got 500"));
	assert_eq!(report.scenarios[2].status, ScenarioStatus::Skipped);
	assert!(report.scenarios[3].error.as_deref().unwrap().contains("assertion exploded"));
	let attempts: Vec<_> = report.scenarios.iter().map(|s| s.attempts).collect();
	assert_eq!(attempts, [1, 1, 1, 3]);

	// The panicking scenario opened a session; the worker still released it.
	assert_eq!(launcher.launches(), 1);
	assert_eq!(launcher.quits(), 1);
}

#[tokio::test]
async fn environment_is_selected_once_for_all_scenarios() {
	let prober = good_prober();
	let counter = Arc::new(AtomicUsize::new(0));
	let mut suite = suite(prober.clone(), Arc::new(MockLauncher::new()));
	for _ in 0..6 {
		suite.add(CountsEnvironment(counter.clone()));
	}

	let report = suite.run_parallel(3).await.unwrap();

	assert!(report.is_success());
	assert_eq!(counter.load(Ordering::SeqCst), 6);
	assert_eq!(prober.probed(), ["https://dead.example", "https://good.example"]);
}

#[tokio::test]
async fn every_worker_owns_and_releases_its_session() {
	let launcher = Arc::new(MockLauncher::new());
	let mut suite = suite(good_prober(), launcher.clone());
	for (id, path) in [("ST-101", "/"), ("ST-102", "/magaza"), ("ST-103", "/odeme"), ("ST-104", "/iade")] {
		suite.add(Navigates { id, path });
	}

	let report = suite.run_parallel(2).await.unwrap();

	assert!(report.is_success(), "{:?}", report.failures().collect::<Vec<_>>());
	let workers: std::collections::BTreeSet<_> = report.scenarios.iter().map(|s| s.worker).collect();
	assert!(workers.len() <= 2);
	assert_eq!(launcher.launches(), workers.len());
	assert_eq!(launcher.quits(), launcher.launches());
	for index in 0..launcher.launches() {
		assert!(!launcher.driver(index).is_alive());
	}
}

#[tokio::test]
async fn unreachable_candidates_fall_back_and_smoke_runs() {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let fallback = format!("http://{}", listener.local_addr().unwrap());
	tokio::spawn(async move {
		let router = axum::Router::new().route("/", axum::routing::get(|| async { "ok" }));
		axum::serve(listener, router).await.unwrap();
	});

	let launcher = Arc::new(MockLauncher::new());
	let mut suite = Suite::new(
		HarnessConfig {
			fallback_url: fallback.clone(),
			..config(&["https://dead.example"])
		},
		Arc::new(ScriptedProber::new()),
		launcher.clone(),
	)
	.with_sleeper(Arc::new(RecordingSleeper::new()));
	add_smoke_scenarios(&mut suite, true);

	assert!(suite.selection().await.fell_back);
	let report = suite.run().await.unwrap();

	assert!(report.is_success(), "{:?}", report.failures().collect::<Vec<_>>());
	assert_eq!(report.environment.base_uri, fallback);
	assert_eq!(report.total, 2);
	assert_eq!(launcher.driver(0).gotos(), [fallback]);
	assert_eq!(launcher.quits(), 1);
}

#[tokio::test]
async fn cancelled_suite_skips_remaining_scenarios() {
	let cancel = testbed::CancellationToken::new();
	cancel.cancel();
	let mut suite = suite(good_prober(), Arc::new(MockLauncher::new())).with_cancellation(cancel);
	suite.add(Asserts { id: "ST-001", pass: true });

	let report = suite.run().await.unwrap();

	assert_eq!(report.skipped, 1);
	assert_eq!(report.scenarios[0].error.as_deref(), Some("suite cancelled"));
}

#[tokio::test]
async fn failed_scenarios_are_rerun_until_they_pass() {
	let runs = Arc::new(AtomicUsize::new(0));
	let sleeper = Arc::new(RecordingSleeper::new());
	let mut suite = suite(good_prober(), Arc::new(MockLauncher::new())).with_sleeper(sleeper.clone());
	suite.add(Flaky {
		failures: 1,
		runs: runs.clone(),
	});

	let report = suite.run().await.unwrap();

	assert!(report.is_success(), "{:?}", report.failures().collect::<Vec<_>>());
	assert_eq!(report.scenarios[0].attempts, 2);
	assert_eq!(runs.load(Ordering::SeqCst), 2);
	assert_eq!(sleeper.sleeps(), [Duration::from_secs(1)]);
}

#[tokio::test]
async fn reruns_stop_at_the_configured_limit() {
	let runs = Arc::new(AtomicUsize::new(0));
	let sleeper = Arc::new(RecordingSleeper::new());
	let mut suite = suite(good_prober(), Arc::new(MockLauncher::new())).with_sleeper(sleeper.clone());
	suite.add(Flaky {
		failures: usize::MAX,
		runs: runs.clone(),
	});

	let report = suite.run().await.unwrap();

	let scenario = &report.scenarios[0];
	assert_eq!(scenario.status, ScenarioStatus::Failed);
	assert_eq!(scenario.attempts, 3);
	assert_eq!(scenario.error.as_deref(), Some("connection reset by peer"));
	assert_eq!(runs.load(Ordering::SeqCst), 3);
	assert_eq!(sleeper.sleeps(), [Duration::from_secs(1), Duration::from_secs(2)]);
}

#[tokio::test]
async fn failed_checks_are_not_rerun() {
	let sleeper = Arc::new(RecordingSleeper::new());
	let mut suite = suite(good_prober(), Arc::new(MockLauncher::new())).with_sleeper(sleeper.clone());
	suite.add(Asserts { id: "ST-002", pass: false });

	let report = suite.run().await.unwrap();

	assert_eq!(report.scenarios[0].status, ScenarioStatus::Failed);
	assert_eq!(report.scenarios[0].attempts, 1);
	assert!(sleeper.sleeps().is_empty());
}

#[tokio::test]
async fn any_failure_with_a_session_saves_artifacts() {
	let dir = tempfile::tempdir().unwrap();
	let launcher = Arc::new(MockLauncher::new());
	let mut suite = Suite::new(
		HarnessConfig {
			artifacts_dir: Some(dir.path().to_path_buf()),
			..config(&["https://good.example"])
		},
		good_prober(),
		launcher.clone(),
	)
	.with_sleeper(Arc::new(RecordingSleeper::new()));
	suite.add(MissingPayButton).add(Asserts { id: "ST-001", pass: true });

	let report = suite.run().await.unwrap();

	let failed = &report.scenarios[1];
	assert_eq!(failed.id, "ST-400");
	assert_eq!(failed.status, ScenarioStatus::Failed);
	assert_eq!(failed.error.as_deref(), Some("expected pay button"));
	let types: Vec<_> = failed.artifacts.iter().map(|a| a.artifact_type).collect();
	assert_eq!(types, [ArtifactType::Screenshot, ArtifactType::Html]);
	assert!(failed.artifacts.iter().all(|a| a.path.starts_with(dir.path()) && a.path.exists()));
	assert!(report.scenarios[0].artifacts.is_empty());
	assert_eq!(launcher.driver(0).gotos(), ["https://good.example/odeme"]);
}

#[tokio::test]
async fn failures_without_a_session_save_nothing() {
	let dir = tempfile::tempdir().unwrap();
	let mut suite = Suite::new(
		HarnessConfig {
			artifacts_dir: Some(dir.path().to_path_buf()),
			..config(&["https://good.example"])
		},
		good_prober(),
		Arc::new(MockLauncher::new()),
	)
	.with_sleeper(Arc::new(RecordingSleeper::new()));
	suite.add(Asserts { id: "ST-002", pass: false });

	let report = suite.run().await.unwrap();

	assert!(report.scenarios[0].artifacts.is_empty());
	assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn cancelled_navigation_backoff_is_a_skip() {
	let cancel = CancellationToken::new();
	let launcher = Arc::new(MockLauncher::new());
	launcher.script_next(|driver| driver.fail_goto_times(10, "net::ERR_CONNECTION_RESET"));
	let mut suite = suite(good_prober(), launcher.clone())
		.with_sleeper(Arc::new(RecordingSleeper::pending()))
		.with_cancellation(cancel.clone());
	suite.add(CancelsThenFails { cancel, navigate: true });

	let report = suite.run().await.unwrap();

	let scenario = &report.scenarios[0];
	assert_eq!(scenario.status, ScenarioStatus::Skipped);
	assert_eq!(scenario.error.as_deref(), Some("suite cancelled"));
	assert_eq!(scenario.attempts, 1);
	assert_eq!(launcher.driver(0).gotos().len(), 1);
	assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn cancelled_scenario_backoff_is_a_skip() {
	let cancel = CancellationToken::new();
	let mut suite = suite(good_prober(), Arc::new(MockLauncher::new()))
		.with_sleeper(Arc::new(RecordingSleeper::pending()))
		.with_cancellation(cancel.clone());
	suite.add(CancelsThenFails { cancel, navigate: false });

	let report = suite.run().await.unwrap();

	assert_eq!(report.scenarios[0].status, ScenarioStatus::Skipped);
	assert_eq!(report.scenarios[0].error.as_deref(), Some("suite cancelled"));
	assert_eq!(report.scenarios[0].attempts, 1);
}

#[tokio::test]
async fn report_is_written_as_json() {
	let mut suite = suite(good_prober(), Arc::new(MockLauncher::new()));
	suite.add(Asserts { id: "ST-001", pass: true });
	let report = suite.run().await.unwrap();
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("reports/suite.json");

	write_report(&report, &path).unwrap();

	let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
	assert_eq!(json["environment"]["baseURI"], "https://good.example");
	assert_eq!(json["passed"], 1);
	assert_eq!(json["scenarios"][0]["status"], "passed");
}

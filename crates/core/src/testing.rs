//! Test doubles for the harness.
//!
//! Enabled under `cfg(test)` and with the `testing` feature, so downstream
//! suites can exercise scenarios without a network or a browser:
//!
//! - [`ScriptedProber`]: answers probes from a table and records the order
//! - [`MockDriver`]: an in-memory browser with scriptable failures
//! - [`MockLauncher`]: hands out [`MockDriver`]s and logs launches and quits
//! - [`RecordingSleeper`]: records backoff pauses instead of sleeping

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use testbed_protocol::{BrowserKind, ProbeResult};

use crate::probe::{Prober, is_reachable_status};
use crate::retry::Sleeper;
use crate::session::{BrowserDriver, DriverError, DriverResult, SessionLauncher};

/// Scripted outcome for one endpoint.
#[derive(Debug, Clone)]
enum ProbeScript {
	Status(u16),
	Error(String),
}

/// [`Prober`] answering from a table.
///
/// Endpoints without an entry behave like a refused connection.
#[derive(Debug, Default)]
pub struct ScriptedProber {
	scripts: HashMap<String, ProbeScript>,
	probed: Mutex<Vec<String>>,
}

impl ScriptedProber {
	pub fn new() -> Self {
		Self::default()
	}

	/// `url` answers 200.
	pub fn reachable(self, url: &str) -> Self {
		self.status(url, 200)
	}

	/// `url` answers with `status`; whether that counts as reachable follows
	/// the real prober's rule.
	pub fn status(mut self, url: &str, status: u16) -> Self {
		self.scripts.insert(url.to_string(), ProbeScript::Status(status));
		self
	}

	/// `url` fails without an HTTP answer.
	pub fn failing(mut self, url: &str, error: &str) -> Self {
		self.scripts.insert(url.to_string(), ProbeScript::Error(error.to_string()));
		self
	}

	/// Endpoints probed so far, in order.
	pub fn probed(&self) -> Vec<String> {
		self.probed.lock().clone()
	}
}

#[async_trait]
impl Prober for ScriptedProber {
	async fn probe(&self, url: &str) -> ProbeResult {
		self.probed.lock().push(url.to_string());
		match self.scripts.get(url) {
			Some(ProbeScript::Status(status)) => ProbeResult::answered(url, *status, is_reachable_status(*status)),
			Some(ProbeScript::Error(error)) => ProbeResult::failed(url, error.clone()),
			None => ProbeResult::failed(url, "connection refused"),
		}
	}
}

#[derive(Debug)]
struct DriverState {
	alive: bool,
	location: String,
	redirect: Option<String>,
	queued_locations: VecDeque<String>,
	goto_failures: VecDeque<String>,
	page_source: String,
	screenshot: Vec<u8>,
	gotos: Vec<String>,
	quits: usize,
}

/// In-memory browser.
///
/// Clones share state, so a test can keep a handle to a driver it gave away.
#[derive(Debug, Clone)]
pub struct MockDriver {
	state: Arc<Mutex<DriverState>>,
}

impl Default for MockDriver {
	fn default() -> Self {
		Self::new()
	}
}

impl MockDriver {
	/// A live browser at `about:blank`.
	pub fn new() -> Self {
		Self {
			state: Arc::new(Mutex::new(DriverState {
				alive: true,
				location: "about:blank".to_string(),
				redirect: None,
				queued_locations: VecDeque::new(),
				goto_failures: VecDeque::new(),
				page_source: "<html><body></body></html>".to_string(),
				screenshot: vec![0x89, 0x50, 0x4E, 0x47],
				gotos: Vec::new(),
				quits: 0,
			})),
		}
	}

	/// Every successful load lands on `url` instead of the requested target.
	pub fn redirect_to(&self, url: &str) {
		self.state.lock().redirect = Some(url.to_string());
	}

	/// Next `current_url` answer, ahead of the real location.
	pub fn push_location(&self, location: &str) {
		self.state.lock().queued_locations.push_back(location.to_string());
	}

	/// The next `times` loads fail with `error`.
	pub fn fail_goto_times(&self, times: usize, error: &str) {
		let mut state = self.state.lock();
		for _ in 0..times {
			state.goto_failures.push_back(error.to_string());
		}
	}

	pub fn set_page_source(&self, html: &str) {
		self.state.lock().page_source = html.to_string();
	}

	/// Simulates a crashed browser: every later call fails.
	pub fn kill(&self) {
		self.state.lock().alive = false;
	}

	pub fn is_alive(&self) -> bool {
		self.state.lock().alive
	}

	/// Every load requested, including failed ones.
	pub fn gotos(&self) -> Vec<String> {
		self.state.lock().gotos.clone()
	}

	pub fn quits(&self) -> usize {
		self.state.lock().quits
	}

	fn check_alive(state: &DriverState) -> DriverResult<()> {
		if state.alive {
			Ok(())
		} else {
			Err(DriverError::new("invalid session id: session deleted"))
		}
	}
}

#[async_trait]
impl BrowserDriver for MockDriver {
	async fn goto(&self, url: &str) -> DriverResult<()> {
		let mut state = self.state.lock();
		state.gotos.push(url.to_string());
		Self::check_alive(&state)?;
		if let Some(error) = state.goto_failures.pop_front() {
			return Err(DriverError::new(error));
		}
		state.location = state.redirect.clone().unwrap_or_else(|| url.to_string());
		Ok(())
	}

	async fn current_url(&self) -> DriverResult<String> {
		let mut state = self.state.lock();
		Self::check_alive(&state)?;
		Ok(state
			.queued_locations
			.pop_front()
			.unwrap_or_else(|| state.location.clone()))
	}

	async fn screenshot_png(&self) -> DriverResult<Vec<u8>> {
		let state = self.state.lock();
		Self::check_alive(&state)?;
		Ok(state.screenshot.clone())
	}

	async fn page_source(&self) -> DriverResult<String> {
		let state = self.state.lock();
		Self::check_alive(&state)?;
		Ok(state.page_source.clone())
	}

	async fn quit(&self) -> DriverResult<()> {
		let mut state = self.state.lock();
		state.quits += 1;
		state.alive = false;
		Ok(())
	}
}

/// Launch history entry recorded by [`MockLauncher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LauncherEvent {
	Launched { index: usize, browser: BrowserKind },
	LaunchFailed { browser: BrowserKind },
	Quit { index: usize },
}

type Configure = Box<dyn FnOnce(&MockDriver) + Send>;

#[derive(Default)]
struct LauncherState {
	drivers: Vec<MockDriver>,
	events: Vec<LauncherEvent>,
	configure: VecDeque<Configure>,
	failures: VecDeque<String>,
}

/// [`SessionLauncher`] producing [`MockDriver`]s.
#[derive(Clone, Default)]
pub struct MockLauncher {
	state: Arc<Mutex<LauncherState>>,
}

impl MockLauncher {
	pub fn new() -> Self {
		Self::default()
	}

	/// Applies `configure` to the next driver before it is handed out.
	pub fn script_next(&self, configure: impl FnOnce(&MockDriver) + Send + 'static) {
		self.state.lock().configure.push_back(Box::new(configure));
	}

	/// The next launch fails with `error`.
	pub fn fail_next_launch(&self, error: &str) {
		self.state.lock().failures.push_back(error.to_string());
	}

	/// Driver created by the `index`-th successful launch.
	///
	/// # Panics
	///
	/// When fewer drivers were launched.
	pub fn driver(&self, index: usize) -> MockDriver {
		self.state.lock().drivers[index].clone()
	}

	pub fn launches(&self) -> usize {
		self.state.lock().drivers.len()
	}

	pub fn quits(&self) -> usize {
		self.events()
			.iter()
			.filter(|e| matches!(e, LauncherEvent::Quit { .. }))
			.count()
	}

	pub fn events(&self) -> Vec<LauncherEvent> {
		self.state.lock().events.clone()
	}
}

impl std::fmt::Debug for MockLauncher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MockLauncher")
			.field("events", &self.state.lock().events)
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl SessionLauncher for MockLauncher {
	async fn launch(&self, browser: BrowserKind) -> DriverResult<Box<dyn BrowserDriver>> {
		let mut state = self.state.lock();
		if let Some(error) = state.failures.pop_front() {
			state.events.push(LauncherEvent::LaunchFailed { browser });
			return Err(DriverError::new(error));
		}

		let driver = MockDriver::new();
		if let Some(configure) = state.configure.pop_front() {
			configure(&driver);
		}
		let index = state.drivers.len();
		state.drivers.push(driver.clone());
		state.events.push(LauncherEvent::Launched { index, browser });

		Ok(Box::new(TrackedDriver {
			index,
			driver,
			launcher: self.state.clone(),
		}))
	}
}

/// Forwards to a [`MockDriver`] and reports quits to its launcher.
struct TrackedDriver {
	index: usize,
	driver: MockDriver,
	launcher: Arc<Mutex<LauncherState>>,
}

#[async_trait]
impl BrowserDriver for TrackedDriver {
	async fn goto(&self, url: &str) -> DriverResult<()> {
		self.driver.goto(url).await
	}

	async fn current_url(&self) -> DriverResult<String> {
		self.driver.current_url().await
	}

	async fn screenshot_png(&self) -> DriverResult<Vec<u8>> {
		self.driver.screenshot_png().await
	}

	async fn page_source(&self) -> DriverResult<String> {
		self.driver.page_source().await
	}

	async fn quit(&self) -> DriverResult<()> {
		self.launcher.lock().events.push(LauncherEvent::Quit { index: self.index });
		self.driver.quit().await
	}
}

/// [`Sleeper`] that records each pause.
///
/// [`RecordingSleeper::new`] returns immediately; [`RecordingSleeper::pending`]
/// never wakes up, for exercising cancellation.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
	sleeps: Arc<Mutex<Vec<Duration>>>,
	never_wake: bool,
}

impl RecordingSleeper {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn pending() -> Self {
		Self {
			never_wake: true,
			..Self::default()
		}
	}

	pub fn sleeps(&self) -> Vec<Duration> {
		self.sleeps.lock().clone()
	}
}

#[async_trait]
impl Sleeper for RecordingSleeper {
	async fn sleep(&self, duration: Duration) {
		self.sleeps.lock().push(duration);
		if self.never_wake {
			std::future::pending::<()>().await;
		}
	}
}

//! Browser session management.
//!
//! A [`SessionManager`] belongs to exactly one worker and holds at most one
//! live [`BrowserSession`]. [`SessionManager::acquire`] hands out the current
//! session after a liveness check, replacing it when the check fails; the
//! old session is always torn down before the new one is created.

mod driver;
pub mod webdriver;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use testbed_protocol::BrowserKind;
use tracing::{debug, info, warn};

pub use self::driver::{BrowserDriver, DriverError, DriverResult, SessionLauncher};
use crate::error::{Error, Result};

/// Bound on the liveness probe; a browser that does not answer in time is dead.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to a live browser session.
///
/// Cheap to clone; clones share the same underlying browser.
#[derive(Clone)]
pub struct BrowserSession {
	id: u64,
	browser: BrowserKind,
	driver: Arc<dyn BrowserDriver>,
}

impl BrowserSession {
	pub fn new(id: u64, browser: BrowserKind, driver: Arc<dyn BrowserDriver>) -> Self {
		Self { id, browser, driver }
	}

	/// Sequence number assigned by the owning manager, starting at 1.
	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn browser(&self) -> BrowserKind {
		self.browser
	}

	pub fn driver(&self) -> &dyn BrowserDriver {
		self.driver.as_ref()
	}

	/// True when reading the current location succeeds in time.
	pub async fn is_live(&self) -> bool {
		match tokio::time::timeout(LIVENESS_TIMEOUT, self.driver.current_url()).await {
			Ok(Ok(_)) => true,
			Ok(Err(e)) => {
				debug!(target = "testbed.session", session = self.id, error = %e, "liveness check failed");
				false
			}
			Err(_) => {
				debug!(target = "testbed.session", session = self.id, "liveness check timed out");
				false
			}
		}
	}
}

impl std::fmt::Debug for BrowserSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BrowserSession")
			.field("id", &self.id)
			.field("browser", &self.browser)
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl BrowserDriver for BrowserSession {
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
		self.driver.quit().await
	}
}

/// Owns the current browser session of one worker.
pub struct SessionManager {
	launcher: Arc<dyn SessionLauncher>,
	current: Option<BrowserSession>,
	created: u64,
}

impl SessionManager {
	pub fn new(launcher: Arc<dyn SessionLauncher>) -> Self {
		Self {
			launcher,
			current: None,
			created: 0,
		}
	}

	/// Returns a live session for `browser`, creating or replacing it as needed.
	///
	/// # Errors
	///
	/// [`Error::UnsupportedBrowser`] for an unknown browser name (no session is
	/// touched), [`Error::SessionCreation`] when the launcher fails.
	pub async fn acquire(&mut self, browser: &str) -> Result<BrowserSession> {
		let kind: BrowserKind = browser.parse()?;
		self.acquire_kind(kind).await
	}

	pub async fn acquire_kind(&mut self, browser: BrowserKind) -> Result<BrowserSession> {
		if let Some(session) = &self.current {
			if session.browser() == browser && session.is_live().await {
				return Ok(session.clone());
			}
			if session.browser() == browser {
				warn!(target = "testbed.session", session = session.id(), %browser, "session unresponsive, recreating");
			} else {
				info!(
					target = "testbed.session",
					session = session.id(),
					from = %session.browser(),
					to = %browser,
					"switching browser"
				);
			}
		}

		self.release().await;

		let driver = self.launcher.launch(browser).await.map_err(|e| Error::SessionCreation {
			browser,
			message: e.to_string(),
		})?;
		self.created += 1;
		let session = BrowserSession::new(self.created, browser, Arc::from(driver));
		info!(target = "testbed.session", session = session.id(), %browser, "created browser session");
		self.current = Some(session.clone());
		Ok(session)
	}

	/// Tears down the current session, if any. Calling it again is a no-op.
	pub async fn release(&mut self) {
		let Some(session) = self.current.take() else {
			return;
		};
		match session.quit().await {
			Ok(()) => debug!(target = "testbed.session", session = session.id(), "released browser session"),
			Err(e) => warn!(
				target = "testbed.session",
				session = session.id(),
				error = %e,
				"browser session did not quit cleanly"
			),
		}
	}

	/// The current session without a liveness check.
	pub fn current(&self) -> Option<&BrowserSession> {
		self.current.as_ref()
	}

	/// Number of sessions created so far.
	pub fn sessions_created(&self) -> u64 {
		self.created
	}
}

impl std::fmt::Debug for SessionManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionManager")
			.field("current", &self.current)
			.field("created", &self.created)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{LauncherEvent, MockLauncher};

	#[tokio::test]
	async fn acquire_twice_reuses_session() {
		let launcher = Arc::new(MockLauncher::new());
		let mut sessions = SessionManager::new(launcher.clone());

		let first = sessions.acquire("chrome").await.unwrap();
		let second = sessions.acquire("chrome").await.unwrap();

		assert_eq!(first.id(), second.id());
		assert_eq!(launcher.launches(), 1);
	}

	#[tokio::test]
	async fn unsupported_browser_creates_nothing() {
		let launcher = Arc::new(MockLauncher::new());
		let mut sessions = SessionManager::new(launcher.clone());

		let err = sessions.acquire("unsupported-browser").await.unwrap_err();

		assert!(matches!(err, Error::UnsupportedBrowser(_)));
		assert_eq!(launcher.launches(), 0);
		assert!(sessions.current().is_none());
	}

	#[tokio::test]
	async fn dead_session_is_torn_down_before_replacement() {
		let launcher = Arc::new(MockLauncher::new());
		let mut sessions = SessionManager::new(launcher.clone());

		let first = sessions.acquire("firefox").await.unwrap();
		launcher.driver(0).kill();
		let second = sessions.acquire("firefox").await.unwrap();

		assert_ne!(first.id(), second.id());
		assert_eq!(
			launcher.events(),
			[
				LauncherEvent::Launched { index: 0, browser: BrowserKind::Firefox },
				LauncherEvent::Quit { index: 0 },
				LauncherEvent::Launched { index: 1, browser: BrowserKind::Firefox },
			]
		);
	}

	#[tokio::test]
	async fn failed_relaunch_surfaces_and_leaves_no_session() {
		let launcher = Arc::new(MockLauncher::new());
		let mut sessions = SessionManager::new(launcher.clone());

		sessions.acquire("edge").await.unwrap();
		launcher.driver(0).kill();
		launcher.fail_next_launch("driver binary missing");

		let err = sessions.acquire("edge").await.unwrap_err();
		assert!(matches!(err, Error::SessionCreation { browser: BrowserKind::Edge, .. }));
		assert!(sessions.current().is_none());
		assert_eq!(launcher.quits(), 1);
	}

	#[tokio::test]
	async fn release_is_idempotent() {
		let launcher = Arc::new(MockLauncher::new());
		let mut sessions = SessionManager::new(launcher.clone());

		sessions.release().await;
		sessions.acquire("chrome").await.unwrap();
		sessions.release().await;
		sessions.release().await;

		assert_eq!(launcher.quits(), 1);
		assert!(sessions.current().is_none());
	}

	#[tokio::test]
	async fn switching_browser_replaces_session() {
		let launcher = Arc::new(MockLauncher::new());
		let mut sessions = SessionManager::new(launcher.clone());

		sessions.acquire("chrome").await.unwrap();
		let firefox = sessions.acquire("firefox").await.unwrap();

		assert_eq!(firefox.browser(), BrowserKind::Firefox);
		assert_eq!(launcher.launches(), 2);
		assert_eq!(launcher.quits(), 1);
	}
}

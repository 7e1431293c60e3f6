//! The scenario abstraction and the context handed to it.
//!
//! A scenario performs its own requests and assertions; the harness only
//! supplies the environment, an HTTP client and lazy access to the worker's
//! browser session.
//!
//! Failed scenarios are run again under the suite's retry policy. Checks
//! written with [`check!`](crate::check) fail with [`AssertionFailed`] and,
//! like [`Skip`] and configuration errors, end the scenario at once; any
//! other error is retried.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use testbed_protocol::{ActiveEnvironment, Artifact, BrowserKind, NavigationReport};
use thiserror::Error;
use tracing::debug;

use crate::artifacts::collect_failure_artifacts;
use crate::error::{Error as HarnessError, Result};
use crate::http::ApiClient;
use crate::navigate::Navigator;
use crate::retry::RetryableError;
use crate::session::{BrowserSession, SessionManager};

/// One assertion-bearing check.
#[async_trait]
pub trait Scenario: Send + Sync {
	/// Stable identifier used to order reports, e.g. `ST-001`.
	fn id(&self) -> &str;

	fn name(&self) -> &str;

	async fn run(&self, ctx: &mut ScenarioContext<'_>) -> anyhow::Result<()>;
}

/// Returned (through `anyhow`) by a scenario that decides not to run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("skipped: {0}")]
pub struct Skip(pub String);

/// Shorthand for `Err(Skip(reason).into())`.
pub fn skip(reason: impl Into<String>) -> anyhow::Error {
	Skip(reason.into()).into()
}

/// A check that did not hold. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AssertionFailed(pub String);

pub fn assertion_failed(message: impl Into<String>) -> anyhow::Error {
	AssertionFailed(message.into()).into()
}

/// Returns an [`AssertionFailed`] error from the enclosing scenario unless
/// `cond` holds.
///
/// ```ignore
/// testbed::check!(status == 200, "expected status 200, got {status}");
/// ```
#[macro_export]
macro_rules! check {
	($cond:expr, $($arg:tt)+) => {
		if !$cond {
			return ::core::result::Result::Err($crate::scenario::assertion_failed(::std::format!($($arg)+)));
		}
	};
	($cond:expr $(,)?) => {
		$crate::check!($cond, "check failed: {}", ::core::stringify!($cond))
	};
}

impl RetryableError for anyhow::Error {
	fn is_retryable(&self) -> bool {
		if self.is::<Skip>() || self.is::<AssertionFailed>() {
			return false;
		}
		self.downcast_ref::<HarnessError>().is_none_or(HarnessError::is_retryable)
	}
}

/// Handles available to a running scenario.
pub struct ScenarioContext<'a> {
	scenario_id: String,
	environment: Arc<ActiveEnvironment>,
	http: ApiClient,
	browser: BrowserKind,
	sessions: &'a mut SessionManager,
	navigator: &'a Navigator,
	artifacts_dir: Option<PathBuf>,
	artifacts: Vec<Artifact>,
}

impl<'a> ScenarioContext<'a> {
	pub fn new(
		scenario_id: impl Into<String>,
		environment: Arc<ActiveEnvironment>,
		http: ApiClient,
		browser: BrowserKind,
		sessions: &'a mut SessionManager,
		navigator: &'a Navigator,
	) -> Self {
		Self {
			scenario_id: scenario_id.into(),
			environment,
			http,
			browser,
			sessions,
			navigator,
			artifacts_dir: None,
			artifacts: Vec::new(),
		}
	}

	pub fn with_artifacts_dir(mut self, dir: Option<PathBuf>) -> Self {
		self.artifacts_dir = dir;
		self
	}

	pub fn scenario_id(&self) -> &str {
		&self.scenario_id
	}

	/// The suite-wide environment. Read-only.
	pub fn environment(&self) -> &ActiveEnvironment {
		&self.environment
	}

	pub fn http(&self) -> &ApiClient {
		&self.http
	}

	/// Browser used by [`session`](Self::session) and [`navigate`](Self::navigate).
	pub fn browser(&self) -> BrowserKind {
		self.browser
	}

	pub fn navigator(&self) -> &Navigator {
		self.navigator
	}

	pub fn sessions(&mut self) -> &mut SessionManager {
		&mut *self.sessions
	}

	/// The worker's live session, created on first use.
	pub async fn session(&mut self) -> Result<BrowserSession> {
		self.sessions.acquire_kind(self.browser).await
	}

	/// Navigates the worker's session to `target`, resolved against the environment.
	///
	/// When every attempt fails and an artifacts directory is configured, a
	/// screenshot and the page source are saved before the error is returned.
	pub async fn navigate(&mut self, target: &str) -> Result<NavigationReport> {
		let session = self.session().await?;
		let url = self.environment.url_for(target);
		match self.navigator.navigate(&session, &url).await {
			Ok(report) => Ok(report),
			Err(err @ HarnessError::FatalNavigation { .. }) => {
				if let Some(dir) = &self.artifacts_dir {
					let collected = collect_failure_artifacts(&session, dir, &self.scenario_id).await;
					debug!(target = "testbed.scenario", scenario = %self.scenario_id, count = collected.len(), "attached failure artifacts");
					self.artifacts.extend(collected);
				}
				Err(err)
			}
			Err(err) => Err(err),
		}
	}

	/// Artifacts captured so far.
	pub fn artifacts(&self) -> &[Artifact] {
		&self.artifacts
	}

	pub(crate) fn take_artifacts(&mut self) -> Vec<Artifact> {
		std::mem::take(&mut self.artifacts)
	}
}

impl std::fmt::Debug for ScenarioContext<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ScenarioContext")
			.field("scenario_id", &self.scenario_id)
			.field("environment", &self.environment)
			.field("browser", &self.browser)
			.finish_non_exhaustive()
	}
}

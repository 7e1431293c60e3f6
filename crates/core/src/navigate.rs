//! Retrying navigation.
//!
//! Each attempt loads the target and reads back the browser location. An
//! attempt succeeds when the location is non-empty; the target is not
//! compared against it since redirects are expected. Failed attempts are
//! retried under the navigator's [`RetryPolicy`].

use std::sync::Arc;

use parking_lot::Mutex;
use testbed_protocol::{AttemptOutcome, NavigationAttempt, NavigationReport};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::retry::{RetryError, RetryPolicy, RetryableError, Sleeper, TokioSleeper, run_with_retry};
use crate::session::{BrowserDriver, DriverError};

/// Why a single navigation attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
	#[error(transparent)]
	Driver(#[from] DriverError),

	#[error("browser reported an empty location")]
	EmptyLocation,
}

impl RetryableError for AttemptError {}

/// Navigates with bounded retries.
#[derive(Clone)]
pub struct Navigator {
	policy: RetryPolicy,
	sleeper: Arc<dyn Sleeper>,
	cancel: CancellationToken,
}

impl Navigator {
	pub fn new(policy: RetryPolicy) -> Self {
		Self {
			policy,
			sleeper: Arc::new(TokioSleeper),
			cancel: CancellationToken::new(),
		}
	}

	pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
		self.sleeper = sleeper;
		self
	}

	pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
		self.cancel = cancel;
		self
	}

	pub fn policy(&self) -> &RetryPolicy {
		&self.policy
	}

	/// Loads `url` through `driver`, retrying until the browser reports a location.
	///
	/// # Errors
	///
	/// [`Error::FatalNavigation`] once every attempt failed, carrying the last
	/// cause; [`Error::Cancelled`] when cancelled during a backoff pause.
	pub async fn navigate(&self, driver: &dyn BrowserDriver, url: &str) -> Result<NavigationReport> {
		let max_attempts = self.policy.max_attempts.max(1);
		let log = Mutex::new(Vec::new());

		let outcome = run_with_retry("navigate", &self.policy, self.sleeper.as_ref(), &self.cancel, |attempt| {
			let log = &log;
			async move {
				let result = attempt_once(driver, url).await;
				let (outcome, error) = match &result {
					Ok(_) => (AttemptOutcome::Success, None),
					Err(e) if attempt < max_attempts => (AttemptOutcome::RetryableFailure, Some(e.to_string())),
					Err(e) => (AttemptOutcome::FatalFailure, Some(e.to_string())),
				};
				debug!(target = "testbed.navigate", url, attempt, ?outcome, "navigation attempt");
				log.lock().push(NavigationAttempt {
					target_url: url.to_string(),
					attempt_number: attempt,
					outcome,
					error,
				});
				result
			}
		})
		.await;

		let attempts = log.into_inner();
		match outcome {
			Ok(location) => {
				info!(target = "testbed.navigate", url, %location, attempts = attempts.len(), "navigated");
				Ok(NavigationReport {
					target_url: url.to_string(),
					location,
					attempts,
				})
			}
			Err(RetryError::Exhausted { last, .. } | RetryError::Fatal { error: last, .. }) => Err(Error::FatalNavigation {
				url: url.to_string(),
				attempts,
				cause: last,
			}),
			Err(RetryError::Cancelled { .. }) => Err(Error::Cancelled),
		}
	}
}

impl Default for Navigator {
	fn default() -> Self {
		Self::new(RetryPolicy::default())
	}
}

impl std::fmt::Debug for Navigator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Navigator")
			.field("policy", &self.policy)
			.field("cancelled", &self.cancel.is_cancelled())
			.finish_non_exhaustive()
	}
}

async fn attempt_once(driver: &dyn BrowserDriver, url: &str) -> std::result::Result<String, AttemptError> {
	driver.goto(url).await?;
	let location = driver.current_url().await?;
	if location.trim().is_empty() {
		return Err(AttemptError::EmptyLocation);
	}
	Ok(location)
}

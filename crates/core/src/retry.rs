//! Retry policy shared by the navigator and scenarios.
//!
//! A [`RetryPolicy`] bounds the number of attempts and picks the pause
//! between them. [`run_with_retry`] drives an async operation under a policy,
//! sleeping through a [`Sleeper`] so tests can observe the pauses, and stops
//! as soon as the [`CancellationToken`] fires during a pause.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Pause between two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Backoff {
	Fixed {
		#[serde(with = "millis")]
		delay: Duration,
	},
	/// `base * 2^(attempt-1)`, capped at `max`.
	Exponential {
		#[serde(with = "millis")]
		base: Duration,
		#[serde(with = "millis")]
		max: Duration,
	},
}

impl Backoff {
	pub fn fixed(delay: Duration) -> Self {
		Backoff::Fixed { delay }
	}

	/// Delay after the failed attempt `attempt` (1-based).
	pub fn delay(&self, attempt: u32) -> Duration {
		match *self {
			Backoff::Fixed { delay } => delay,
			Backoff::Exponential { base, max } => {
				let exp = attempt.max(1).saturating_sub(1).min(31);
				base.saturating_mul(1u32 << exp).min(max)
			}
		}
	}
}

impl Default for Backoff {
	fn default() -> Self {
		Backoff::fixed(Duration::from_secs(2))
	}
}

/// Maximum attempts (including the first) and the pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub backoff: Backoff,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			backoff: Backoff::default(),
		}
	}
}

impl RetryPolicy {
	pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
		Self { max_attempts, backoff }
	}

	/// A single attempt, no pauses.
	pub fn once() -> Self {
		Self::new(1, Backoff::fixed(Duration::ZERO))
	}

	fn attempts(&self) -> u32 {
		self.max_attempts.max(1)
	}
}

/// Errors that know whether another attempt may help.
pub trait RetryableError {
	fn is_retryable(&self) -> bool {
		true
	}
}

/// Source of the pauses between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
	async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
	async fn sleep(&self, duration: Duration) {
		tokio::time::sleep(duration).await;
	}
}

/// Why [`run_with_retry`] gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
	/// Every attempt failed; carries the last error.
	#[error("gave up after {attempts} attempt(s): {last}")]
	Exhausted { attempts: u32, last: E },

	/// The operation reported an error that must not be retried.
	#[error("attempt {attempt} failed: {error}")]
	Fatal { attempt: u32, error: E },

	/// The token fired during a pause.
	#[error("cancelled after {attempts} attempt(s)")]
	Cancelled { attempts: u32 },
}

/// Runs `op` under `policy`.
///
/// `op` receives the 1-based attempt number. Attempts never overlap; after
/// a retryable failure the next attempt starts only once the backoff pause
/// is over.
pub async fn run_with_retry<F, Fut, T, E>(
	phase: &str,
	policy: &RetryPolicy,
	sleeper: &dyn Sleeper,
	cancel: &CancellationToken,
	mut op: F,
) -> Result<T, RetryError<E>>
where
	F: FnMut(u32) -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: RetryableError + std::fmt::Display,
{
	let max_attempts = policy.attempts();
	let mut attempt = 1;

	loop {
		debug!(target = "testbed.retry", phase, attempt, max_attempts, "starting attempt");

		match op(attempt).await {
			Ok(value) => return Ok(value),
			Err(error) if !error.is_retryable() => {
				warn!(target = "testbed.retry", phase, attempt, %error, "attempt failed (non-retryable)");
				return Err(RetryError::Fatal { attempt, error });
			}
			Err(last) if attempt >= max_attempts => {
				warn!(target = "testbed.retry", phase, attempt, error = %last, "attempts exhausted");
				return Err(RetryError::Exhausted { attempts: attempt, last });
			}
			Err(error) => {
				let delay = policy.backoff.delay(attempt);
				warn!(
					target = "testbed.retry",
					phase,
					attempt,
					delay_ms = delay.as_millis() as u64,
					%error,
					"attempt failed, retrying after backoff"
				);
				tokio::select! {
					biased;
					_ = cancel.cancelled() => {
						debug!(target = "testbed.retry", phase, attempt, "cancelled during backoff");
						return Err(RetryError::Cancelled { attempts: attempt });
					}
					_ = sleeper.sleep(delay) => {}
				}
				attempt += 1;
			}
		}
	}
}

mod millis {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_u64(d.as_millis() as u64)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
		u64::deserialize(d).map(Duration::from_millis)
	}
}

//! Error types for the harness.

use std::path::PathBuf;

use testbed_protocol::{BrowserKind, NavigationAttempt, UnsupportedBrowserKind};
use thiserror::Error;

use crate::navigate::AttemptError;

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the harness.
///
/// Probe failures and unreachable candidates never show up here: the prober
/// folds them into [`ProbeResult`](testbed_protocol::ProbeResult) and the
/// selector recovers through the fallback.
#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	UnsupportedBrowser(#[from] UnsupportedBrowserKind),

	/// A replacement session could not be created.
	#[error("failed to create {browser} session: {message}")]
	SessionCreation { browser: BrowserKind, message: String },

	/// Navigation failed on every attempt.
	#[error("navigation to {url} failed after {} attempt(s): {cause}", .attempts.len())]
	FatalNavigation {
		url: String,
		attempts: Vec<NavigationAttempt>,
		#[source]
		cause: AttemptError,
	},

	/// Cancelled while waiting between attempts.
	#[error("operation cancelled")]
	Cancelled,

	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	#[error("failed to read config {path}: {source}")]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config {path}: {source}")]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error(transparent)]
	Runtime(#[from] testbed_runtime::Error),

	#[error("HTTP client error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true when the error is [`Error::Cancelled`].
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Error::Cancelled)
	}

	/// Whether running the failed operation again could succeed.
	///
	/// Configuration problems and cancellation are final.
	pub fn is_retryable(&self) -> bool {
		!matches!(
			self,
			Error::Cancelled
				| Error::UnsupportedBrowser(_)
				| Error::InvalidConfig(_)
				| Error::ConfigRead { .. }
				| Error::ConfigParse { .. }
		)
	}
}

//! Error types for the WebDriver runtime.

use testbed_protocol::BrowserKind;
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while locating or running a WebDriver server.
#[derive(Debug, Error)]
pub enum Error {
	/// No driver executable was found for the browser.
	#[error("{browser} driver not found (looked for {searched}). Install it or set {env_var}")]
	DriverNotFound {
		browser: BrowserKind,
		searched: String,
		env_var: &'static str,
	},

	/// The driver process could not be started or died during startup.
	#[error("failed to launch WebDriver server: {0}")]
	LaunchFailed(String),

	/// The server never reported `ready` on its status endpoint.
	#[error("WebDriver server at {url} not ready after {attempts} checks: {last_error}")]
	NotReady {
		url: String,
		attempts: u32,
		last_error: String,
	},

	#[error("HTTP client error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

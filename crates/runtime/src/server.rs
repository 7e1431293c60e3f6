//! WebDriver server process management
//!
//! Spawns the vendor driver for a browser kind on a local port and waits
//! until its `/status` endpoint reports `ready`.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use testbed_protocol::BrowserKind;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::driver::{locate_driver, port_arg};
use crate::error::{Error, Result};

/// Number of `/status` checks before giving up on a freshly spawned driver.
pub const READY_ATTEMPTS: u32 = 25;

/// Delay between `/status` checks.
pub const READY_INTERVAL: Duration = Duration::from_millis(200);

const STATUS_TIMEOUT: Duration = Duration::from_millis(400);

/// How the driver port is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortChoice {
	/// Any free local port.
	#[default]
	Free,
	/// The conventional port of the browser kind (9515, 4444 or 9516).
	Default,
	Fixed(u16),
}

impl PortChoice {
	fn resolve(self, kind: BrowserKind) -> Result<u16> {
		match self {
			PortChoice::Free => free_port(),
			PortChoice::Default => Ok(kind.default_driver_port()),
			PortChoice::Fixed(port) => Ok(port),
		}
	}
}

/// A running WebDriver server owned by this process.
///
/// The child is killed when the server is dropped, so a panicking worker
/// cannot leak driver processes.
#[derive(Debug)]
pub struct DriverServer {
	browser: BrowserKind,
	url: String,
	executable: PathBuf,
	process: Child,
}

impl DriverServer {
	/// Locates and launches the driver for `kind`.
	///
	/// # Errors
	///
	/// Returns [`Error::DriverNotFound`] when no executable is available,
	/// [`Error::LaunchFailed`] when the process dies during startup and
	/// [`Error::NotReady`] when it never reports ready.
	pub async fn launch(kind: BrowserKind, port: PortChoice) -> Result<Self> {
		let executable = locate_driver(kind)?;
		Self::launch_executable(kind, &executable, port).await
	}

	/// Launches a specific driver executable.
	pub async fn launch_executable(kind: BrowserKind, executable: &Path, port: PortChoice) -> Result<Self> {
		let port = port.resolve(kind)?;
		let url = format!("http://127.0.0.1:{port}");

		let mut cmd = Command::new(executable);
		cmd.args(port_arg(kind, port))
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.kill_on_drop(true);

		let mut process = cmd
			.spawn()
			.map_err(|e| Error::LaunchFailed(format!("failed to spawn {}: {e}", executable.display())))?;

		info!(
			target = "testbed.runtime",
			browser = %kind,
			port,
			pid = process.id(),
			"spawned WebDriver server"
		);

		if let Err(err) = wait_until_ready(&url, READY_ATTEMPTS, READY_INTERVAL, Some(&mut process)).await {
			kill_unready(&mut process, &url);
			return Err(err);
		}

		Ok(Self {
			browser: kind,
			url,
			executable: executable.to_path_buf(),
			process,
		})
	}

	pub fn browser(&self) -> BrowserKind {
		self.browser
	}

	/// Base URL to hand to a WebDriver client.
	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn executable(&self) -> &Path {
		&self.executable
	}

	/// Kills the driver and waits for it to exit.
	pub async fn shutdown(mut self) -> Result<()> {
		debug!(target = "testbed.runtime", browser = %self.browser, url = %self.url, "stopping WebDriver server");
		match self.process.try_wait() {
			Ok(Some(_)) => return Ok(()),
			Ok(None) => {}
			Err(e) => return Err(Error::Io(e)),
		}
		self.process
			.kill()
			.await
			.map_err(|e| Error::LaunchFailed(format!("failed to kill WebDriver server: {e}")))?;
		match tokio::time::timeout(Duration::from_secs(5), self.process.wait()).await {
			Ok(_) => Ok(()),
			Err(_) => {
				warn!(target = "testbed.runtime", url = %self.url, "WebDriver server did not exit within 5s");
				Ok(())
			}
		}
	}
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
	value: StatusValue,
}

#[derive(Debug, Deserialize)]
struct StatusValue {
	#[serde(default)]
	ready: bool,
	#[serde(default)]
	message: Option<String>,
}

/// Polls `{url}/status` until the server reports `ready: true`.
///
/// When `process` is given, an early exit of that process aborts the wait
/// with [`Error::LaunchFailed`].
pub async fn wait_until_ready(
	url: &str,
	attempts: u32,
	interval: Duration,
	mut process: Option<&mut Child>,
) -> Result<()> {
	let client = reqwest::Client::builder().timeout(STATUS_TIMEOUT).build()?;
	let status_url = format!("{}/status", url.trim_end_matches('/'));
	let mut last_error = "status endpoint not reachable".to_string();

	for attempt in 1..=attempts {
		if let Some(child) = process.as_deref_mut() {
			if let Ok(Some(status)) = child.try_wait() {
				return Err(Error::LaunchFailed(format!(
					"WebDriver server exited before becoming ready (status: {status})"
				)));
			}
		}

		match client.get(&status_url).send().await {
			Ok(resp) => match resp.json::<StatusResponse>().await {
				Ok(body) if body.value.ready => {
					debug!(target = "testbed.runtime", url, attempt, "WebDriver server ready");
					return Ok(());
				}
				Ok(body) => {
					last_error = body.value.message.unwrap_or_else(|| "server reports not ready".to_string());
				}
				Err(e) => last_error = format!("invalid status response: {e}"),
			},
			Err(e) => last_error = e.to_string(),
		}

		if attempt < attempts {
			tokio::time::sleep(interval).await;
		}
	}

	Err(Error::NotReady {
		url: url.to_string(),
		attempts,
		last_error,
	})
}

/// Requests a kill of a driver that never became ready. Returns false when
/// the kill could not be sent.
fn kill_unready(process: &mut Child, url: &str) -> bool {
	match process.start_kill() {
		Ok(()) => true,
		Err(e) => {
			warn!(target = "testbed.runtime", url, error = %e, "failed to kill unready WebDriver server");
			false
		}
	}
}

/// Asks the OS for an unused local port.
pub fn free_port() -> Result<u16> {
	let listener = TcpListener::bind("127.0.0.1:0")?;
	Ok(listener.local_addr()?.port())
}

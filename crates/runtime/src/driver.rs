//! WebDriver executable discovery.
//!
//! Each browser kind is driven by its vendor driver: `chromedriver`,
//! `geckodriver` or `msedgedriver`. The executable is located in this order:
//!
//! 1. The per-browser override variable (`TESTBED_CHROMEDRIVER`,
//!    `TESTBED_GECKODRIVER`, `TESTBED_MSEDGEDRIVER`)
//! 2. `TESTBED_DRIVER_DIR` joined with the executable name
//! 3. The executable name on `PATH`

use std::path::{Path, PathBuf};

use testbed_protocol::BrowserKind;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Directory searched before `PATH` when set.
pub const DRIVER_DIR_ENV: &str = "TESTBED_DRIVER_DIR";

/// Executable name of the vendor driver for `kind`, without extension.
pub fn driver_binary_name(kind: BrowserKind) -> &'static str {
	match kind {
		BrowserKind::Chrome => "chromedriver",
		BrowserKind::Firefox => "geckodriver",
		BrowserKind::Edge => "msedgedriver",
	}
}

/// Environment variable holding an explicit driver path for `kind`.
pub fn driver_env_var(kind: BrowserKind) -> &'static str {
	match kind {
		BrowserKind::Chrome => "TESTBED_CHROMEDRIVER",
		BrowserKind::Firefox => "TESTBED_GECKODRIVER",
		BrowserKind::Edge => "TESTBED_MSEDGEDRIVER",
	}
}

/// Locates the driver executable for `kind`.
///
/// # Errors
///
/// Returns [`Error::DriverNotFound`] when no candidate exists.
pub fn locate_driver(kind: BrowserKind) -> Result<PathBuf> {
	let env_var = driver_env_var(kind);
	let name = driver_binary_name(kind);

	if let Some(path) = std::env::var_os(env_var).map(PathBuf::from) {
		if is_file(&path) {
			debug!(target = "testbed.runtime", browser = %kind, path = %path.display(), "driver from {env_var}");
			return Ok(path);
		}
		warn!(
			target = "testbed.runtime",
			browser = %kind,
			path = %path.display(),
			"{env_var} is set but does not point at a file; falling back"
		);
	}

	if let Some(dir) = std::env::var_os(DRIVER_DIR_ENV).map(PathBuf::from) {
		if let Some(path) = find_in_dir(&dir, name) {
			debug!(target = "testbed.runtime", browser = %kind, path = %path.display(), "driver from {DRIVER_DIR_ENV}");
			return Ok(path);
		}
	}

	match which::which(name) {
		Ok(path) => {
			debug!(target = "testbed.runtime", browser = %kind, path = %path.display(), "driver from PATH");
			Ok(path)
		}
		Err(_) => Err(Error::DriverNotFound {
			browser: kind,
			searched: format!("${env_var}, ${DRIVER_DIR_ENV}, {name} on PATH"),
			env_var,
		}),
	}
}

/// Looks for `name` (or `name.exe` on Windows) inside `dir`.
pub fn find_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
	let candidates = if cfg!(windows) {
		vec![dir.join(format!("{name}.exe")), dir.join(name)]
	} else {
		vec![dir.join(name)]
	};
	candidates.into_iter().find(|p| is_file(p))
}

/// Command-line argument selecting the listen port.
pub fn port_arg(kind: BrowserKind, port: u16) -> Vec<String> {
	match kind {
		// geckodriver takes the value as a separate argument
		BrowserKind::Firefox => vec!["--port".to_string(), port.to_string()],
		BrowserKind::Chrome | BrowserKind::Edge => vec![format!("--port={port}")],
	}
}

fn is_file(path: &Path) -> bool {
	path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

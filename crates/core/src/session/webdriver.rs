//! WebDriver-backed sessions.
//!
//! Sessions talk W3C WebDriver through `thirtyfour`. When no server URL is
//! configured, each session spawns its own vendor driver through
//! [`testbed_runtime::DriverServer`] and stops it on quit.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use testbed_protocol::BrowserKind;
use testbed_runtime::{DriverServer, PortChoice};
use thirtyfour::prelude::*;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::driver::{BrowserDriver, DriverError, DriverResult, SessionLauncher};

/// How browsers are started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchOptions {
	pub headless: bool,
	pub window_width: u32,
	pub window_height: u32,
	/// Page load timeout handed to the browser.
	pub page_load_timeout_ms: u64,
	/// Remote WebDriver server; a local driver is spawned when unset.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub webdriver_url: Option<String>,
	/// Use the conventional driver port instead of a free one.
	pub default_driver_port: bool,
	/// Additional arguments appended per browser kind.
	#[serde(skip_serializing_if = "HashMap::is_empty")]
	pub extra_args: HashMap<BrowserKind, Vec<String>>,
}

impl Default for LaunchOptions {
	fn default() -> Self {
		Self {
			headless: true,
			window_width: 1920,
			window_height: 1080,
			page_load_timeout_ms: 30_000,
			webdriver_url: None,
			default_driver_port: false,
			extra_args: HashMap::new(),
		}
	}
}

impl LaunchOptions {
	fn port_choice(&self) -> PortChoice {
		if self.default_driver_port {
			PortChoice::Default
		} else {
			PortChoice::Free
		}
	}
}

/// Command-line arguments passed to the browser binary.
pub fn browser_args(browser: BrowserKind, options: &LaunchOptions) -> Vec<String> {
	let mut args = Vec::new();
	if browser.is_chromium() {
		args.extend(
			[
				"--no-sandbox",
				"--disable-dev-shm-usage",
				"--disable-gpu",
				"--disable-extensions",
				"--disable-web-security",
				"--allow-running-insecure-content",
			]
			.into_iter()
			.map(String::from),
		);
		args.push(format!("--window-size={},{}", options.window_width, options.window_height));
		if options.headless {
			args.push("--headless".to_string());
		}
	} else {
		args.push(format!("--width={}", options.window_width));
		args.push(format!("--height={}", options.window_height));
		if options.headless {
			args.push("-headless".to_string());
		}
	}
	if let Some(extra) = options.extra_args.get(&browser) {
		args.extend(extra.iter().cloned());
	}
	args
}

/// W3C capabilities for a new session.
pub fn capabilities(browser: BrowserKind, options: &LaunchOptions) -> Map<String, Value> {
	let args = browser_args(browser, options);
	let (name, vendor_key) = match browser {
		BrowserKind::Chrome => ("chrome", "goog:chromeOptions"),
		BrowserKind::Firefox => ("firefox", "moz:firefoxOptions"),
		BrowserKind::Edge => ("MicrosoftEdge", "ms:edgeOptions"),
	};

	let mut caps = Map::new();
	caps.insert("browserName".into(), json!(name));
	caps.insert("timeouts".into(), json!({ "pageLoad": options.page_load_timeout_ms }));
	caps.insert(vendor_key.into(), json!({ "args": args }));
	caps
}

/// [`SessionLauncher`] that creates WebDriver sessions.
#[derive(Debug, Clone, Default)]
pub struct WebDriverLauncher {
	options: LaunchOptions,
}

impl WebDriverLauncher {
	pub fn new(options: LaunchOptions) -> Self {
		Self { options }
	}

	pub fn options(&self) -> &LaunchOptions {
		&self.options
	}
}

#[async_trait]
impl SessionLauncher for WebDriverLauncher {
	async fn launch(&self, browser: BrowserKind) -> DriverResult<Box<dyn BrowserDriver>> {
		let (server_url, server) = match &self.options.webdriver_url {
			Some(url) => (url.clone(), None),
			None => {
				let server = DriverServer::launch(browser, self.options.port_choice())
					.await
					.map_err(|e| DriverError::new(e.to_string()))?;
				(server.url().to_string(), Some(server))
			}
		};

		let caps: Capabilities = capabilities(browser, &self.options);
		debug!(target = "testbed.session", %browser, server = %server_url, "creating WebDriver session");

		match WebDriver::new(&server_url, caps).await {
			Ok(driver) => {
				info!(target = "testbed.session", %browser, server = %server_url, "WebDriver session started");
				Ok(Box::new(WebDriverSession {
					driver,
					server: Mutex::new(server),
				}))
			}
			Err(e) => {
				if let Some(server) = server {
					if let Err(stop) = server.shutdown().await {
						warn!(target = "testbed.session", error = %stop, "failed to stop WebDriver server");
					}
				}
				Err(DriverError::new(format!("new session on {server_url}: {e}")))
			}
		}
	}
}

/// A thirtyfour session, plus the driver process when this session owns one.
pub struct WebDriverSession {
	driver: WebDriver,
	server: Mutex<Option<DriverServer>>,
}

#[async_trait]
impl BrowserDriver for WebDriverSession {
	async fn goto(&self, url: &str) -> DriverResult<()> {
		self.driver.goto(url).await.map_err(into_driver_error)
	}

	async fn current_url(&self) -> DriverResult<String> {
		self.driver
			.current_url()
			.await
			.map(|url| url.to_string())
			.map_err(into_driver_error)
	}

	async fn screenshot_png(&self) -> DriverResult<Vec<u8>> {
		self.driver.screenshot_as_png().await.map_err(into_driver_error)
	}

	async fn page_source(&self) -> DriverResult<String> {
		self.driver.source().await.map_err(into_driver_error)
	}

	async fn quit(&self) -> DriverResult<()> {
		let quit = tokio::time::timeout(Duration::from_secs(10), self.driver.clone().quit()).await;
		if let Some(server) = self.server.lock().await.take() {
			if let Err(e) = server.shutdown().await {
				warn!(target = "testbed.session", error = %e, "failed to stop WebDriver server");
			}
		}
		match quit {
			Ok(result) => result.map_err(into_driver_error),
			Err(_) => Err(DriverError::new("quit timed out after 10s")),
		}
	}
}

fn into_driver_error(err: WebDriverError) -> DriverError {
	DriverError::new(err.to_string())
}

//! Browser automation seams.
//!
//! [`BrowserDriver`] is the subset of a WebDriver session the harness uses;
//! [`SessionLauncher`] creates drivers for a browser kind. The production
//! implementations live in [`super::webdriver`], test doubles in
//! [`crate::testing`].

use async_trait::async_trait;
use testbed_protocol::BrowserKind;
use thiserror::Error;

/// Opaque failure reported by a browser driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DriverError(pub String);

impl DriverError {
	pub fn new(message: impl Into<String>) -> Self {
		Self(message.into())
	}
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// One browser automation instance.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
	/// Loads `url` in the current window.
	async fn goto(&self, url: &str) -> DriverResult<()>;

	/// Location currently reported by the browser.
	async fn current_url(&self) -> DriverResult<String>;

	/// PNG screenshot of the viewport.
	async fn screenshot_png(&self) -> DriverResult<Vec<u8>>;

	/// Serialized DOM of the current page.
	async fn page_source(&self) -> DriverResult<String>;

	/// Ends the browser session and releases whatever backs it.
	async fn quit(&self) -> DriverResult<()>;
}

/// Creates browser drivers.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
	async fn launch(&self, browser: BrowserKind) -> DriverResult<Box<dyn BrowserDriver>>;
}

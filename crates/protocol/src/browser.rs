//! Browser engine identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Browser engine a session is launched for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
	/// Google Chrome via chromedriver
	#[default]
	Chrome,
	/// Mozilla Firefox via geckodriver
	Firefox,
	/// Microsoft Edge via msedgedriver
	Edge,
}

/// Returned when a browser identifier names an engine the harness cannot drive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported browser kind: {0:?} (expected one of: chrome, firefox, edge)")]
pub struct UnsupportedBrowserKind(pub String);

impl BrowserKind {
	pub const ALL: [BrowserKind; 3] = [BrowserKind::Chrome, BrowserKind::Firefox, BrowserKind::Edge];

	pub fn as_str(self) -> &'static str {
		match self {
			BrowserKind::Chrome => "chrome",
			BrowserKind::Firefox => "firefox",
			BrowserKind::Edge => "edge",
		}
	}

	/// Port the vendor driver listens on when started without `--port`.
	pub fn default_driver_port(self) -> u16 {
		match self {
			BrowserKind::Chrome => 9515,
			BrowserKind::Firefox => 4444,
			BrowserKind::Edge => 9516,
		}
	}

	/// Whether the engine accepts Chromium-style command-line switches.
	pub fn is_chromium(self) -> bool {
		matches!(self, BrowserKind::Chrome | BrowserKind::Edge)
	}
}

impl fmt::Display for BrowserKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for BrowserKind {
	type Err = UnsupportedBrowserKind;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"chrome" => Ok(BrowserKind::Chrome),
			"firefox" => Ok(BrowserKind::Firefox),
			"edge" => Ok(BrowserKind::Edge),
			_ => Err(UnsupportedBrowserKind(s.to_string())),
		}
	}
}

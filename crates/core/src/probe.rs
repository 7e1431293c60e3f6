//! Endpoint reachability probing.
//!
//! A probe is a single `HEAD` request with bounded connect and read
//! timeouts. Redirects are not followed so a `302` is observed as such.
//! Nothing escapes the prober: refused connections, timeouts and malformed
//! URLs all become an unreachable [`ProbeResult`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect;
use serde::{Deserialize, Serialize};
use testbed_protocol::ProbeResult;
use tracing::{debug, info};

use crate::error::Result;

/// Statuses that count as "the environment is up".
///
/// `404` is included: the probe targets the bare base URL, which many API
/// hosts do not serve.
pub const REACHABLE_STATUSES: [u16; 3] = [200, 302, 404];

pub fn is_reachable_status(status: u16) -> bool {
	REACHABLE_STATUSES.contains(&status)
}

/// Connect and read timeouts for one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbeTimeouts {
	pub connect_ms: u64,
	pub read_ms: u64,
}

impl Default for ProbeTimeouts {
	fn default() -> Self {
		Self {
			connect_ms: 10_000,
			read_ms: 10_000,
		}
	}
}

impl ProbeTimeouts {
	pub fn connect(&self) -> Duration {
		Duration::from_millis(self.connect_ms)
	}

	/// Upper bound for the whole exchange.
	pub fn total(&self) -> Duration {
		Duration::from_millis(self.connect_ms.saturating_add(self.read_ms))
	}
}

/// Determines whether a candidate endpoint is reachable.
#[async_trait]
pub trait Prober: Send + Sync {
	async fn probe(&self, url: &str) -> ProbeResult;
}

/// [`Prober`] backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpProber {
	client: reqwest::Client,
}

impl HttpProber {
	pub fn new(timeouts: ProbeTimeouts) -> Result<Self> {
		let client = reqwest::Client::builder()
			.redirect(redirect::Policy::none())
			.connect_timeout(timeouts.connect())
			.timeout(timeouts.total())
			.build()?;
		Ok(Self { client })
	}
}

#[async_trait]
impl Prober for HttpProber {
	async fn probe(&self, url: &str) -> ProbeResult {
		if let Err(reason) = check_url(url) {
			debug!(target = "testbed.probe", url, %reason, "rejected candidate");
			return ProbeResult::failed(url, reason);
		}

		let result = match self.client.head(url).send().await {
			Ok(resp) => {
				let status = resp.status().as_u16();
				ProbeResult::answered(url, status, is_reachable_status(status))
			}
			Err(e) => ProbeResult::failed(url, describe(&e)),
		};

		info!(
			target = "testbed.probe",
			url,
			reachable = result.reachable,
			status = result.observed_status,
			error = result.error.as_deref(),
			"probed endpoint"
		);
		result
	}
}

fn check_url(url: &str) -> std::result::Result<(), String> {
	if url.trim().is_empty() {
		return Err("empty URL".to_string());
	}
	let parsed = url::Url::parse(url).map_err(|e| format!("malformed URL: {e}"))?;
	match parsed.scheme() {
		"http" | "https" => Ok(()),
		other => Err(format!("unsupported scheme {other:?}")),
	}
}

fn describe(err: &reqwest::Error) -> String {
	if err.is_timeout() {
		format!("timed out: {err}")
	} else if err.is_connect() {
		format!("connection failed: {err}")
	} else {
		err.to_string()
	}
}

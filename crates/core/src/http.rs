//! HTTP client bound to an environment.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder};
use testbed_protocol::ActiveEnvironment;

use crate::error::{Error, Result};
use crate::probe::ProbeTimeouts;

/// Issues requests against `baseURI + basePath` with the environment's
/// default headers.
///
/// Overriding the base URI with [`ApiClient::with_base_uri`] yields a new
/// client; the shared environment is never changed.
#[derive(Debug, Clone)]
pub struct ApiClient {
	client: reqwest::Client,
	environment: ActiveEnvironment,
}

impl ApiClient {
	/// Builds a client with the probe's connect/read bounds.
	pub fn new(environment: ActiveEnvironment, timeouts: ProbeTimeouts) -> Result<Self> {
		let client = reqwest::Client::builder()
			.connect_timeout(timeouts.connect())
			.timeout(timeouts.total())
			.default_headers(header_map(&environment)?)
			.build()?;
		Ok(Self { client, environment })
	}

	pub fn environment(&self) -> &ActiveEnvironment {
		&self.environment
	}

	/// A client for another base URI; path and headers are kept.
	pub fn with_base_uri(&self, base_uri: impl Into<String>) -> Self {
		Self {
			client: self.client.clone(),
			environment: self.environment.with_base_uri(base_uri),
		}
	}

	pub fn url(&self, path: &str) -> String {
		self.environment.url_for(path)
	}

	pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
		self.client.request(method, self.url(path))
	}

	pub fn get(&self, path: &str) -> RequestBuilder {
		self.request(Method::GET, path)
	}

	pub fn post(&self, path: &str) -> RequestBuilder {
		self.request(Method::POST, path)
	}

	pub fn head(&self, path: &str) -> RequestBuilder {
		self.request(Method::HEAD, path)
	}
}

fn header_map(environment: &ActiveEnvironment) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();
	for (name, value) in &environment.default_headers {
		let name = HeaderName::from_bytes(name.as_bytes())
			.map_err(|e| Error::InvalidConfig(format!("header name {name:?}: {e}")))?;
		let value = HeaderValue::from_str(value)
			.map_err(|e| Error::InvalidConfig(format!("header {name}: {e}")))?;
		headers.insert(name, value);
	}
	Ok(headers)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn urls_resolve_against_base_path() {
		let env = ActiveEnvironment::new("https://good.example").with_base_path("/api");
		let client = ApiClient::new(env, ProbeTimeouts::default()).unwrap();
		assert_eq!(client.url("/payment/process"), "https://good.example/api/payment/process");

		let local = client.with_base_uri("https://local.example");
		assert_eq!(local.url("health"), "https://local.example/api/health");
		assert_eq!(client.environment().base_uri, "https://good.example");
	}

	#[test]
	fn invalid_header_is_a_config_error() {
		let env = ActiveEnvironment::new("https://good.example").with_header("bad header", "x");
		assert!(matches!(
			ApiClient::new(env, ProbeTimeouts::default()),
			Err(Error::InvalidConfig(_))
		));
	}
}

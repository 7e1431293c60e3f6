//! Built-in smoke scenarios.

use anyhow::Context as _;
use async_trait::async_trait;

use crate::probe::is_reachable_status;
use crate::scenario::{Scenario, ScenarioContext};
use crate::suite::Suite;

/// The selected environment answers over HTTP.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentReachable;

#[async_trait]
impl Scenario for EnvironmentReachable {
	fn id(&self) -> &str {
		"SMOKE-001"
	}

	fn name(&self) -> &str {
		"environment answers over HTTP"
	}

	async fn run(&self, ctx: &mut ScenarioContext<'_>) -> anyhow::Result<()> {
		let url = ctx.http().url("");
		let response = ctx
			.http()
			.head("")
			.send()
			.await
			.with_context(|| format!("HEAD {url}"))?;
		let status = response.status();
		crate::check!(is_reachable_status(status.as_u16()), "HEAD {url} returned {status}");
		Ok(())
	}
}

/// The landing page loads in the browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct LandingPageNavigable;

#[async_trait]
impl Scenario for LandingPageNavigable {
	fn id(&self) -> &str {
		"SMOKE-002"
	}

	fn name(&self) -> &str {
		"landing page is navigable"
	}

	async fn run(&self, ctx: &mut ScenarioContext<'_>) -> anyhow::Result<()> {
		let report = ctx.navigate("").await?;
		crate::check!(!report.location.is_empty(), "browser reported no location");
		Ok(())
	}
}

/// Adds the smoke scenarios; the browser check only when `browser` is set.
pub fn add_smoke_scenarios(suite: &mut Suite, browser: bool) {
	suite.add(EnvironmentReachable);
	if browser {
		suite.add(LandingPageNavigable);
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use axum::Router;
	use axum::http::StatusCode;
	use axum::routing::head;
	use testbed_protocol::{ActiveEnvironment, BrowserKind};

	use super::*;
	use crate::http::ApiClient;
	use crate::navigate::Navigator;
	use crate::probe::ProbeTimeouts;
	use crate::session::SessionManager;
	use crate::testing::MockLauncher;

	async fn serve(status: StatusCode) -> String {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let url = format!("http://{}", listener.local_addr().unwrap());
		let router = Router::new().route("/", head(move || async move { status }));
		tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
		url
	}

	async fn environment_check(status: StatusCode) -> anyhow::Result<()> {
		let environment = Arc::new(ActiveEnvironment::new(serve(status).await));
		let http = ApiClient::new(environment.as_ref().clone(), ProbeTimeouts::default()).unwrap();
		let mut sessions = SessionManager::new(Arc::new(MockLauncher::new()));
		let navigator = Navigator::default();
		let mut ctx = ScenarioContext::new("SMOKE-001", environment, http, BrowserKind::Chrome, &mut sessions, &navigator);
		EnvironmentReachable.run(&mut ctx).await
	}

	#[tokio::test]
	async fn environment_check_uses_the_probe_status_set() {
		environment_check(StatusCode::OK).await.unwrap();
		environment_check(StatusCode::NOT_FOUND).await.unwrap();

		let err = environment_check(StatusCode::NO_CONTENT).await.unwrap_err();
		assert!(err.is::<crate::scenario::AssertionFailed>());
		assert!(err.to_string().contains("204"), "{err}");
		assert!(environment_check(StatusCode::SERVICE_UNAVAILABLE).await.is_err());
	}
}

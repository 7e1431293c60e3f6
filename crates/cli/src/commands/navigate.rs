use std::sync::Arc;

use testbed::artifacts::collect_failure_artifacts;
use testbed::{
	CancellationToken, Error as HarnessError, HarnessConfig, HttpProber, Navigator, SessionManager, WebDriverLauncher,
	select_environment,
};
use testbed_protocol::NavigationReport;
use tracing::info;

use crate::error::{CliError, Result};
use crate::output::{self, NavigateData, OutputFormat, ResultBuilder};

/// Selects the environment, opens a session, navigates and tears the session down.
pub async fn execute(config: &HarnessConfig, target: &str, cancel: CancellationToken, format: OutputFormat) -> Result<()> {
	let prober = HttpProber::new(config.probe)?;
	let selection = select_environment(&prober, &config.candidates, &config.fallback_url, &config.template()).await;
	let environment = selection.environment;
	let url = environment.url_for(target);
	info!(target = "testbed.cli", %url, browser = %config.browser, "navigating");

	let mut sessions = SessionManager::new(Arc::new(WebDriverLauncher::new(config.launch.clone())));
	let navigator = Navigator::new(config.navigation).with_cancellation(cancel);

	let outcome: Result<NavigationReport> = async {
		let session = sessions.acquire_kind(config.browser).await?;
		match navigator.navigate(&session, &url).await {
			Ok(report) => Ok(report),
			Err(source @ HarnessError::FatalNavigation { .. }) => match &config.artifacts_dir {
				Some(dir) => {
					let artifacts = collect_failure_artifacts(&session, dir, "navigate").await;
					Err(CliError::NavigationWithArtifacts { source, artifacts })
				}
				None => Err(source.into()),
			},
			Err(err) => Err(err.into()),
		}
	}
	.await;

	sessions.release().await;

	let report = outcome?;
	let result = ResultBuilder::new("navigate")
		.data(NavigateData { environment, report })
		.build();
	output::print_result(&result, format);
	Ok(())
}

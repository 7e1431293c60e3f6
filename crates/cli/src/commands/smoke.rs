use testbed::smoke::add_smoke_scenarios;
use testbed::{CancellationToken, HarnessConfig, Suite, write_report};
use tracing::info;

use crate::cli::SmokeArgs;
use crate::error::{CliError, Result};
use crate::output::{self, ErrorCode, OutputFormat, ResultBuilder};

/// Runs the smoke suite. Prints the report even when scenarios fail, then
/// signals failure through the exit code.
pub async fn execute(
	mut config: HarnessConfig,
	args: &SmokeArgs,
	cancel: CancellationToken,
	format: OutputFormat,
) -> Result<()> {
	if let Some(workers) = args.workers {
		config.workers = workers.max(1);
	}

	let mut suite = Suite::from_config(config)?.with_cancellation(cancel);
	add_smoke_scenarios(&mut suite, !args.no_browser);

	let report = suite.run().await?;

	if let Some(path) = &args.report {
		write_report(&report, path)?;
		info!(target = "testbed.cli", path = %path.display(), "wrote suite report");
	}

	let success = report.is_success();
	let summary = format!("{} of {} scenarios failed", report.failed, report.total);
	let mut builder = ResultBuilder::new("smoke").data(report);
	if !success {
		builder = builder.error(ErrorCode::ScenarioFailed, summary);
	}
	output::print_result(&builder.build(), format);

	if success { Ok(()) } else { Err(CliError::OutputAlreadyPrinted) }
}

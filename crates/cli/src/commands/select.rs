use testbed::{HarnessConfig, HttpProber, select_environment};

use crate::error::Result;
use crate::output::{self, OutputFormat, ResultBuilder, SelectData};

pub async fn execute(config: &HarnessConfig, format: OutputFormat) -> Result<()> {
	let prober = HttpProber::new(config.probe)?;
	let selection = select_environment(&prober, &config.candidates, &config.fallback_url, &config.template()).await;

	let result = ResultBuilder::new("select")
		.data(SelectData {
			environment: selection.environment,
			fell_back: selection.fell_back,
			probes: selection.probes,
		})
		.build();
	output::print_result(&result, format);
	Ok(())
}

use testbed::{HarnessConfig, HttpProber, Prober};

use crate::error::Result;
use crate::output::{self, OutputFormat, ProbeData, ResultBuilder};

/// Probes every URL in order. Unreachable URLs are results, not errors.
pub async fn execute(config: &HarnessConfig, urls: &[String], format: OutputFormat) -> Result<()> {
	let prober = HttpProber::new(config.probe)?;

	let mut results = Vec::with_capacity(urls.len());
	for url in urls {
		results.push(prober.probe(url).await);
	}
	let reachable = results.iter().filter(|r| r.reachable).count();

	let result = ResultBuilder::new("probe").data(ProbeData { results, reachable }).build();
	output::print_result(&result, format);
	Ok(())
}

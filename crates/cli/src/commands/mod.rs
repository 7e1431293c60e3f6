mod navigate;
mod probe;
mod select;
mod smoke;

use std::path::Path;

use testbed::{CancellationToken, HarnessConfig};
use tracing::{debug, warn};

use crate::cli::{Cli, Commands, Overrides};
use crate::error::Result;
use crate::output::OutputFormat;

pub async fn dispatch(cli: Cli, format: OutputFormat) -> Result<()> {
	let config = resolve_config(cli.config.as_deref(), &cli.overrides)?;
	debug!(
		target = "testbed.cli",
		command = cli.command.name(),
		candidates = config.candidates.len(),
		browser = %config.browser,
		"resolved configuration"
	);

	let cancel = cancel_on_ctrl_c();

	match cli.command {
		Commands::Probe { urls } => probe::execute(&config, &urls, format).await,
		Commands::Select => select::execute(&config, format).await,
		Commands::Navigate { target } => navigate::execute(&config, &target, cancel, format).await,
		Commands::Smoke(args) => smoke::execute(config, &args, cancel, format).await,
	}
}

/// Defaults, then the config file, then `TESTBED_*` variables, then flags.
pub fn resolve_config(path: Option<&Path>, overrides: &Overrides) -> Result<HarnessConfig> {
	let mut config = HarnessConfig::resolve(path)?;
	overrides.apply(&mut config)?;
	config.validate()?;
	Ok(config)
}

fn cancel_on_ctrl_c() -> CancellationToken {
	let cancel = CancellationToken::new();
	let token = cancel.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			warn!(target = "testbed.cli", "interrupted, cancelling");
			token.cancel();
		}
	});
	cancel
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;
	use crate::error::CliError;

	#[test]
	fn file_then_flags() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"{{"candidates": ["https://file.example"], "fallbackUrl": "https://file-fallback.example"}}"#
		)
		.unwrap();
		let overrides = Overrides {
			fallback: Some("https://flag-fallback.example".into()),
			..Overrides::default()
		};

		let config = resolve_config(Some(file.path()), &overrides).unwrap();

		assert_eq!(config.candidates, ["https://file.example"]);
		assert_eq!(config.fallback_url, "https://flag-fallback.example");
	}

	#[test]
	fn invalid_flag_values_fail_validation() {
		let overrides = Overrides {
			candidates: vec!["ftp://files.example".into()],
			..Overrides::default()
		};

		let err = resolve_config(None, &overrides).unwrap_err();

		assert!(matches!(err, CliError::Harness(testbed::Error::InvalidConfig(_))));
	}

	#[test]
	fn missing_config_file_is_reported() {
		let err = resolve_config(Some(Path::new("/nonexistent/testbed.json")), &Overrides::default()).unwrap_err();

		assert!(matches!(err, CliError::Harness(testbed::Error::ConfigRead { .. })));
	}
}

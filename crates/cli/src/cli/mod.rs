
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use testbed::{BrowserKind, HarnessConfig, Result};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

#[derive(Parser, Debug)]
#[command(name = "testbed")]
#[command(about = "QA harness bootstrap: environment selection, browser sessions, resilient navigation")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short = 'f', long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	/// JSON config file; TESTBED_* variables and flags override it
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(flatten)]
	pub overrides: Overrides,

	#[command(subcommand)]
	pub command: Commands,
}

/// Flags applied on top of the file and environment configuration.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
	/// Candidate base URL, highest priority first (repeatable; replaces configured candidates)
	#[arg(long = "candidate", global = true, value_name = "URL")]
	pub candidates: Vec<String>,

	/// Base URL used when no candidate is reachable
	#[arg(long, global = true, value_name = "URL")]
	pub fallback: Option<String>,

	/// Browser to drive: chrome, firefox or edge
	#[arg(short, long, global = true, value_name = "KIND")]
	pub browser: Option<String>,

	/// Run the browser headless
	#[arg(long, global = true, overrides_with = "headed")]
	pub headless: bool,

	/// Run the browser with a visible window
	#[arg(long, global = true, overrides_with = "headless")]
	pub headed: bool,

	/// Use a running WebDriver server instead of spawning a driver
	#[arg(long, global = true, value_name = "URL")]
	pub webdriver_url: Option<String>,

	/// Navigation attempts before giving up
	#[arg(long, global = true, value_name = "N")]
	pub max_attempts: Option<u32>,

	/// Runs per failed scenario, including the first
	#[arg(long, global = true, value_name = "N")]
	pub scenario_attempts: Option<u32>,

	/// Save a screenshot and page source here when navigation or a scenario fails
	#[arg(long, global = true, value_name = "DIR")]
	pub artifacts_dir: Option<PathBuf>,
}

impl Overrides {
	pub fn apply(&self, config: &mut HarnessConfig) -> Result<()> {
		if !self.candidates.is_empty() {
			config.candidates = self.candidates.clone();
		}
		if let Some(url) = &self.fallback {
			config.fallback_url = url.clone();
		}
		if let Some(browser) = &self.browser {
			config.browser = browser.parse::<BrowserKind>()?;
		}
		if self.headless {
			config.launch.headless = true;
		} else if self.headed {
			config.launch.headless = false;
		}
		if let Some(url) = &self.webdriver_url {
			config.launch.webdriver_url = Some(url.clone());
		}
		if let Some(attempts) = self.max_attempts {
			config.navigation.max_attempts = attempts;
		}
		if let Some(attempts) = self.scenario_attempts {
			config.scenario_retry.max_attempts = attempts;
		}
		if let Some(dir) = &self.artifacts_dir {
			config.artifacts_dir = Some(dir.clone());
		}
		Ok(())
	}
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Probe each URL and report whether it is reachable
	Probe {
		#[arg(required = true, value_name = "URL")]
		urls: Vec<String>,
	},

	/// Pick the active environment from the configured candidates
	Select,

	/// Open a browser session and navigate to a path or URL in the active environment
	Navigate {
		/// Path joined to the environment root, or an absolute URL
		#[arg(value_name = "PATH|URL")]
		target: String,
	},

	/// Run the built-in smoke scenarios
	Smoke(SmokeArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct SmokeArgs {
	/// Only check the environment over HTTP; skip the browser scenario
	#[arg(long)]
	pub no_browser: bool,

	/// Parallel workers, each with its own browser session
	#[arg(short = 'j', long, value_name = "N")]
	pub workers: Option<usize>,

	/// Also write the suite report to this file
	#[arg(long, value_name = "FILE")]
	pub report: Option<PathBuf>,
}

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Probe { .. } => "probe",
			Commands::Select => "select",
			Commands::Navigate { .. } => "navigate",
			Commands::Smoke(_) => "smoke",
		}
	}
}

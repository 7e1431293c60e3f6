//! Structured command output.
//!
//! Every command prints one [`CommandResult`] envelope. JSON output is meant
//! for CI and agents; text output is for people at a terminal.


use std::io::{self, Write};
use std::time::Instant;

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use testbed_protocol::{
	ActiveEnvironment, Artifact, AttemptOutcome, NavigationReport, ProbeResult, ScenarioStatus, SuiteReport,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// JSON envelope (default)
	#[default]
	Json,
	/// Human-readable text
	Text,
}

/// Envelope printed by every command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	InvalidConfig,
	UnsupportedBrowser,
	SessionError,
	DriverNotFound,
	NavigationFailed,
	ScenarioFailed,
	Cancelled,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let code = match self {
			ErrorCode::InvalidConfig => "INVALID_CONFIG",
			ErrorCode::UnsupportedBrowser => "UNSUPPORTED_BROWSER",
			ErrorCode::SessionError => "SESSION_ERROR",
			ErrorCode::DriverNotFound => "DRIVER_NOT_FOUND",
			ErrorCode::NavigationFailed => "NAVIGATION_FAILED",
			ErrorCode::ScenarioFailed => "SCENARIO_FAILED",
			ErrorCode::Cancelled => "CANCELLED",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(code)
	}
}

pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
			details: None,
		});
		self
	}

	pub fn error_with(mut self, error: CommandError) -> Self {
		self.error = Some(error);
		self
	}

	/// Measures elapsed time from `start` instead of from builder creation.
	pub fn started_at(mut self, start: Instant) -> Self {
		self.start_time = start;
		self
	}

	/// `ok` is true only with data and without an error.
	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			ok: self.error.is_none() && self.data.is_some(),
			command: self.command,
			data: self.data,
			error: self.error,
			duration_ms: Some(self.start_time.elapsed().as_millis() as u64),
		}
	}
}

/// Human-readable rendering of command data.
pub trait TextOutput {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()>;
}

impl TextOutput for () {
	fn write_text(&self, _out: &mut dyn Write) -> io::Result<()> {
		Ok(())
	}
}

pub fn print_result<T: Serialize + TextOutput>(result: &CommandResult<T>, format: OutputFormat) {
	let mut stdout = io::stdout().lock();
	let _ = write_result(&mut stdout, result, format);
}

pub fn write_result<T: Serialize + TextOutput>(
	out: &mut dyn Write,
	result: &CommandResult<T>,
	format: OutputFormat,
) -> io::Result<()> {
	match format {
		OutputFormat::Json => {
			let json = serde_json::to_string_pretty(result).map_err(io::Error::other)?;
			writeln!(out, "{json}")
		}
		OutputFormat::Text => write_result_text(out, result),
	}
}

fn write_result_text<T: Serialize + TextOutput>(out: &mut dyn Write, result: &CommandResult<T>) -> io::Result<()> {
	if let Some(data) = &result.data {
		data.write_text(out)?;
	}
	if let Some(error) = &result.error {
		writeln!(out, "Error [{}]: {}", error.code, error.message)?;
	}
	if let Some(ms) = result.duration_ms {
		writeln!(out, "Completed in {ms}ms")?;
	}
	Ok(())
}

pub fn print_error_stderr(error: &CommandError) {
	eprintln!("{} [{}]: {}", "Error".red().bold(), error.code, error.message);
}

/// `probe` output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeData {
	pub results: Vec<ProbeResult>,
	pub reachable: usize,
}

impl TextOutput for ProbeData {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
		for result in &self.results {
			write_probe_line(out, result)?;
		}
		writeln!(out, "{} of {} reachable", self.reachable, self.results.len())
	}
}

fn write_probe_line(out: &mut dyn Write, result: &ProbeResult) -> io::Result<()> {
	let mark = if result.reachable { "up".green() } else { "down".red() };
	let detail = match (result.observed_status, &result.error) {
		(Some(status), _) => status.to_string(),
		(None, Some(error)) => error.clone(),
		(None, None) => String::new(),
	};
	writeln!(out, "{mark}  {}  {detail}", result.endpoint)
}

/// `select` output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectData {
	pub environment: ActiveEnvironment,
	pub fell_back: bool,
	pub probes: Vec<ProbeResult>,
}

impl TextOutput for SelectData {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
		for probe in &self.probes {
			write_probe_line(out, probe)?;
		}
		let how = if self.fell_back { " (fallback)".yellow().to_string() } else { String::new() };
		writeln!(out, "Selected {}{how}", self.environment.root_url().as_str().bold())
	}
}

/// `navigate` output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateData {
	pub environment: ActiveEnvironment,
	#[serde(flatten)]
	pub report: NavigationReport,
}

impl TextOutput for NavigateData {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
		for attempt in &self.report.attempts {
			let outcome = match attempt.outcome {
				AttemptOutcome::Success => "ok".green(),
				AttemptOutcome::RetryableFailure => "retry".yellow(),
				AttemptOutcome::FatalFailure => "fatal".red(),
			};
			let error = attempt.error.as_deref().unwrap_or_default();
			writeln!(out, "#{} {outcome} {error}", attempt.attempt_number)?;
		}
		writeln!(out, "Location: {}", self.report.location)
	}
}

impl TextOutput for SuiteReport {
	fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
		writeln!(out, "Environment: {}", self.environment.root_url())?;
		for scenario in &self.scenarios {
			let status = match scenario.status {
				ScenarioStatus::Passed => "PASS".green().bold(),
				ScenarioStatus::Failed => "FAIL".red().bold(),
				ScenarioStatus::Skipped => "SKIP".yellow().bold(),
			};
			let retried = if scenario.attempts > 1 {
				format!(", {} attempts", scenario.attempts)
			} else {
				String::new()
			};
			writeln!(
				out,
				"{status} {} {} ({}ms{retried})",
				scenario.id, scenario.name, scenario.duration_ms
			)?;
			if let Some(error) = &scenario.error {
				writeln!(out, "     {error}")?;
			}
			write_artifacts(out, &scenario.artifacts)?;
		}
		writeln!(
			out,
			"{} passed, {} failed, {} skipped",
			self.passed, self.failed, self.skipped
		)
	}
}

fn write_artifacts(out: &mut dyn Write, artifacts: &[Artifact]) -> io::Result<()> {
	for artifact in artifacts {
		writeln!(out, "     saved {:?}: {}", artifact.artifact_type, artifact.path.display())?;
	}
	Ok(())
}

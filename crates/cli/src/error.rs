use testbed::Error as HarnessError;
use testbed_protocol::Artifact;
use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	/// The command already printed its envelope; only the exit code is left.
	#[error("")]
	OutputAlreadyPrinted,

	#[error(transparent)]
	Harness(#[from] HarnessError),

	/// Navigation failed and debug artifacts were saved from the session.
	#[error("{source}")]
	NavigationWithArtifacts {
		#[source]
		source: HarnessError,
		artifacts: Vec<Artifact>,
	},

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// Launch failures arrive as driver messages; pick out the missing-driver case.
fn classify_session_message(message: &str) -> ErrorCode {
	if message.contains("driver not found") {
		ErrorCode::DriverNotFound
	} else {
		ErrorCode::SessionError
	}
}

fn harness_error(err: &HarnessError) -> (ErrorCode, String, Option<serde_json::Value>) {
	let message = err.to_string();
	match err {
		HarnessError::UnsupportedBrowser(kind) => (
			ErrorCode::UnsupportedBrowser,
			message,
			Some(serde_json::json!({ "browser": kind.0 })),
		),
		HarnessError::SessionCreation { browser, message: cause } => (
			classify_session_message(cause),
			message,
			Some(serde_json::json!({ "browser": browser })),
		),
		HarnessError::FatalNavigation { url, attempts, .. } => (
			ErrorCode::NavigationFailed,
			message,
			Some(serde_json::json!({ "url": url, "attempts": attempts })),
		),
		HarnessError::Cancelled => (ErrorCode::Cancelled, message, None),
		HarnessError::InvalidConfig(_) | HarnessError::ConfigRead { .. } | HarnessError::ConfigParse { .. } => {
			(ErrorCode::InvalidConfig, message, None)
		}
		HarnessError::Runtime(_) => (ErrorCode::SessionError, message, None),
		HarnessError::Io(_) => (ErrorCode::IoError, message, None),
		HarnessError::Http(_) | HarnessError::Json(_) => (ErrorCode::InternalError, message, None),
	}
}

impl CliError {
	pub fn is_output_already_printed(&self) -> bool {
		matches!(self, CliError::OutputAlreadyPrinted)
	}

	pub fn to_command_error(&self) -> CommandError {
		let (code, message, details) = match self {
			CliError::OutputAlreadyPrinted => (ErrorCode::InternalError, String::new(), None),
			CliError::Harness(err) => harness_error(err),
			CliError::NavigationWithArtifacts { source, artifacts } => {
				let (code, message, details) = harness_error(source);
				let mut details = details.unwrap_or_else(|| serde_json::json!({}));
				details["artifacts"] = serde_json::json!(artifacts);
				(code, message, Some(details))
			}
			CliError::Io(err) => (ErrorCode::IoError, err.to_string(), None),
		};

		CommandError { code, message, details }
	}
}

//! Failure artifact capture.
//!
//! When a navigation or a scenario fails, the browser state is saved next to
//! the report: a screenshot and the page source, named
//! `<name>-<timestamp>-failure.{png,html}`.
//! Capture problems are logged and skipped so the original failure stays the
//! one reported.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use testbed_protocol::{Artifact, ArtifactType};
use tracing::{debug, warn};

use crate::session::BrowserDriver;

/// Saves a screenshot and the page source of `driver` into `dir`.
pub async fn collect_failure_artifacts(driver: &dyn BrowserDriver, dir: &Path, name: &str) -> Vec<Artifact> {
	let mut artifacts = Vec::new();

	if let Err(e) = tokio::fs::create_dir_all(dir).await {
		warn!(target = "testbed.artifacts", dir = %dir.display(), error = %e, "failed to create artifacts directory");
		return artifacts;
	}

	let stem = format!("{}-{}-failure", sanitize(name), timestamp_millis());

	match driver.screenshot_png().await {
		Ok(bytes) => artifacts.extend(write(dir, &stem, ArtifactType::Screenshot, &bytes).await),
		Err(e) => warn!(target = "testbed.artifacts", error = %e, "failed to capture screenshot"),
	}

	match driver.page_source().await {
		Ok(html) => artifacts.extend(write(dir, &stem, ArtifactType::Html, html.as_bytes()).await),
		Err(e) => warn!(target = "testbed.artifacts", error = %e, "failed to capture page source"),
	}

	debug!(target = "testbed.artifacts", count = artifacts.len(), dir = %dir.display(), "collected failure artifacts");
	artifacts
}

async fn write(dir: &Path, stem: &str, artifact_type: ArtifactType, bytes: &[u8]) -> Option<Artifact> {
	let ext = match artifact_type {
		ArtifactType::Screenshot => "png",
		ArtifactType::Html => "html",
	};
	let path = dir.join(format!("{stem}.{ext}"));
	match tokio::fs::write(&path, bytes).await {
		Ok(()) => Some(Artifact {
			artifact_type,
			path,
			size_bytes: Some(bytes.len() as u64),
		}),
		Err(e) => {
			warn!(target = "testbed.artifacts", path = %path.display(), error = %e, "failed to write artifact");
			None
		}
	}
}

/// Keeps file names portable: anything outside `[A-Za-z0-9._-]` becomes `_`.
fn sanitize(name: &str) -> String {
	let cleaned: String = name
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
		.collect();
	if cleaned.is_empty() { "navigation".to_string() } else { cleaned }
}

fn timestamp_millis() -> u128 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis())
		.unwrap_or(0)
}

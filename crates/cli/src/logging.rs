use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Filter used when `RUST_LOG` is unset.
///
/// 0 keeps WebDriver and HTTP client chatter out of the way, 1 (`-v`) shows
/// harness progress, 2+ (`-vv`) shows everything.
pub fn default_filter(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "error",
		1 => "info,thirtyfour=warn,hyper=warn,reqwest=warn",
		_ => "debug",
	}
}

pub fn init_logging(verbosity: u8) {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verbosity_maps_to_levels() {
		assert_eq!(default_filter(0), "error");
		assert!(default_filter(1).starts_with("info"));
		assert_eq!(default_filter(2), "debug");
		assert_eq!(default_filter(7), "debug");
	}

	#[test]
	fn default_filters_parse() {
		for verbosity in 0..3 {
			EnvFilter::try_new(default_filter(verbosity)).unwrap();
		}
	}
}

//! Environment selection against scripted and real HTTP endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{StatusCode, header};
use axum::routing::get;
use testbed::testing::ScriptedProber;
use testbed::{EnvironmentSelector, EnvironmentTemplate, HttpProber, ProbeTimeouts, Prober, select_environment};

const FALLBACK: &str = "https://fallback.example";

fn urls(list: &[&str]) -> Vec<String> {
	list.iter().map(|s| s.to_string()).collect()
}

async fn serve(router: Router) -> String {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, router).await.unwrap();
	});
	format!("http://{addr}")
}

async fn status_server(status: StatusCode) -> String {
	serve(Router::new().route("/", get(move || async move { status }))).await
}

/// A port nothing listens on.
fn refused_url() -> String {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	let port = listener.local_addr().unwrap().port();
	drop(listener);
	format!("http://127.0.0.1:{port}")
}

fn short_timeouts() -> ProbeTimeouts {
	ProbeTimeouts {
		connect_ms: 2_000,
		read_ms: 2_000,
	}
}

#[tokio::test]
async fn dead_good_also_good_selects_good_and_never_probes_also_good() {
	let prober = ScriptedProber::new()
		.failing("https://dead.example", "connection refused")
		.reachable("https://good.example")
		.reachable("https://also-good.example");

	let selection = select_environment(
		&prober,
		&urls(&["https://dead.example", "https://good.example", "https://also-good.example"]),
		FALLBACK,
		&EnvironmentTemplate::default(),
	)
	.await;

	assert_eq!(selection.environment.base_uri, "https://good.example");
	assert!(!selection.fell_back);
	assert_eq!(prober.probed(), ["https://dead.example", "https://good.example"]);
	assert_eq!(selection.probes.len(), 2);
}

#[tokio::test]
async fn single_reachable_candidate_wins_at_any_position() {
	let candidates = ["https://a.example", "https://b.example", "https://c.example"];
	for (position, winner) in candidates.iter().enumerate() {
		let prober = ScriptedProber::new().status(winner, 404);

		let selection = select_environment(&prober, &urls(&candidates), FALLBACK, &EnvironmentTemplate::default()).await;

		assert_eq!(selection.environment.base_uri, *winner);
		assert_eq!(prober.probed(), urls(&candidates[..=position]));
	}
}

#[tokio::test]
async fn no_reachable_candidate_falls_back_without_probing_fallback() {
	let prober = ScriptedProber::new()
		.status("https://a.example", 500)
		.failing("https://b.example", "timed out");

	let selection = select_environment(
		&prober,
		&urls(&["https://a.example", "https://b.example"]),
		FALLBACK,
		&EnvironmentTemplate::default(),
	)
	.await;

	assert!(selection.fell_back);
	assert_eq!(selection.environment.base_uri, FALLBACK);
	assert!(!prober.probed().iter().any(|u| u == FALLBACK));
	assert_eq!(selection.probes.len(), 2);
}

#[tokio::test]
async fn selection_is_deterministic() {
	let candidates = urls(&["https://a.example", "https://b.example", "https://c.example"]);
	let script = || {
		ScriptedProber::new()
			.status("https://a.example", 503)
			.status("https://b.example", 302)
			.reachable("https://c.example")
	};

	let first = select_environment(&script(), &candidates, FALLBACK, &EnvironmentTemplate::default()).await;
	let second = select_environment(&script(), &candidates, FALLBACK, &EnvironmentTemplate::default()).await;

	assert_eq!(first, second);
}

#[tokio::test]
async fn selector_caches_for_the_whole_run() {
	let prober = Arc::new(ScriptedProber::new().reachable("https://good.example"));
	let selector = EnvironmentSelector::new(
		prober.clone(),
		urls(&["https://dead.example", "https://good.example"]),
		FALLBACK,
		EnvironmentTemplate::default(),
	);

	for _ in 0..5 {
		assert_eq!(selector.environment().await.base_uri, "https://good.example");
	}
	assert_eq!(prober.probed().len(), 2);
}

#[tokio::test]
async fn http_prober_classifies_statuses() {
	let prober = HttpProber::new(short_timeouts()).unwrap();

	for (status, reachable) in [
		(StatusCode::OK, true),
		(StatusCode::NOT_FOUND, true),
		(StatusCode::INTERNAL_SERVER_ERROR, false),
		(StatusCode::SERVICE_UNAVAILABLE, false),
		(StatusCode::UNAUTHORIZED, false),
	] {
		let url = status_server(status).await;
		let result = prober.probe(&url).await;
		assert_eq!(result.reachable, reachable, "{status}");
		assert_eq!(result.observed_status, Some(status.as_u16()));
	}
}

#[tokio::test]
async fn http_prober_observes_302_without_following() {
	let url = serve(Router::new().route(
		"/",
		get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/does-not-exist-500")]) }),
	))
	.await;
	let prober = HttpProber::new(short_timeouts()).unwrap();

	let result = prober.probe(&url).await;

	assert!(result.reachable);
	assert_eq!(result.observed_status, Some(302));
}

#[tokio::test]
async fn http_prober_reports_refused_connections() {
	let prober = HttpProber::new(short_timeouts()).unwrap();
	let result = prober.probe(&refused_url()).await;

	assert!(!result.reachable);
	assert!(result.observed_status.is_none());
	assert!(result.error.is_some());
}

#[tokio::test]
async fn http_prober_times_out_on_slow_servers() {
	let url = serve(Router::new().route(
		"/",
		get(|| async {
			tokio::time::sleep(Duration::from_secs(5)).await;
			StatusCode::OK
		}),
	))
	.await;
	let prober = HttpProber::new(ProbeTimeouts {
		connect_ms: 200,
		read_ms: 200,
	})
	.unwrap();

	let result = prober.probe(&url).await;

	assert!(!result.reachable);
	assert!(result.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn real_selection_skips_refused_and_500() {
	let dead = refused_url();
	let broken = status_server(StatusCode::INTERNAL_SERVER_ERROR).await;
	let good = status_server(StatusCode::OK).await;
	let prober = HttpProber::new(short_timeouts()).unwrap();

	let selection = select_environment(
		&prober,
		&[dead, broken, good.clone()],
		FALLBACK,
		&EnvironmentTemplate::default(),
	)
	.await;

	assert_eq!(selection.environment.base_uri, good);
	assert_eq!(selection.probes.len(), 3);
}

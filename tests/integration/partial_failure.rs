//! A provider that fails permanently must not sink the whole scan: the
//! other providers' data still merges and the scan itself still returns Ok.

// std
use std::sync::Arc;
// crates.io
use osint_enrich::{
	EnrichOptions, EngineConfig, InMemoryCache, Orchestrator, Registry, TargetType,
	providers::{DnsProvider, ThreatIntelProvider},
};
use reqwest::Client;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};

#[tokio::test]
async fn failing_provider_does_not_abort_the_scan() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/resolve"))
		.respond_with(move |request: &wiremock::Request| {
			let query: std::collections::HashMap<_, _> = request.url.query_pairs().collect();
			let record_type = query.get("type").map(|v| v.as_ref()).unwrap_or_default();
			let body = match record_type {
				"A" => json!({ "Answer": [{ "data": "93.184.216.34" }] }),
				_ => json!({ "Answer": [] }),
			};
			ResponseTemplate::new(200).set_body_json(body)
		})
		.mount(&server)
		.await;

	// threatintel returns a 403: permanent, not retried, classified as an error.
	Mock::given(method("GET"))
		.and(path("/search"))
		.respond_with(ResponseTemplate::new(403))
		.mount(&server)
		.await;

	unsafe {
		std::env::set_var("THREATINTEL_API_KEY", "test-key");
	}

	let mut registry = Registry::new();
	registry.register(Arc::new(DnsProvider::with_base_url(format!("{}/resolve", server.uri()))));
	registry.register(Arc::new(ThreatIntelProvider::with_base_url(format!("{}/search", server.uri()))));

	let orchestrator =
		Orchestrator::with_client(registry, Arc::new(InMemoryCache::new()), Client::builder().build().unwrap(), EngineConfig::default());

	let results = orchestrator
		.enrich(&["example.com".to_string()], TargetType::Domain, &[], EnrichOptions::default(), CancellationToken::new())
		.await
		.unwrap();

	assert_eq!(results.len(), 1);
	let result = &results[0];

	// dns data still made it into the merged record.
	assert!(result.record.resolved.ip.contains("93.184.216.34"));
	assert!(result.record.raw.contains_key("dns"));
	assert!(!result.record.raw.contains_key("threatintel"));

	let dns_status = result.per_provider_status.iter().find(|s| s.provider == "dns").unwrap();
	assert!(dns_status.error.is_none());

	let threatintel_status = result.per_provider_status.iter().find(|s| s.provider == "threatintel").unwrap();
	assert!(threatintel_status.error.is_some());
}

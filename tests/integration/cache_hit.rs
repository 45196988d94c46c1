//! Scanning the same target twice within the cache TTL must not re-fetch:
//! the second scan is served entirely from the cache.

// std
use std::sync::Arc;
// crates.io
use osint_enrich::{
	EnrichOptions, EngineConfig, InMemoryCache, Orchestrator, Registry, TargetType, providers::GeoIpProvider,
};
use reqwest::Client;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::method,
};

#[tokio::test]
async fn second_scan_within_ttl_is_served_from_cache() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"isp": "Example Hosting",
			"city": "Ashburn",
			"regionName": "Virginia",
			"country": "United States",
			"as": "AS14061 Example Hosting LLC",
		})))
		.expect(1)
		.mount(&server)
		.await;

	let mut registry = Registry::new();
	registry.register(Arc::new(GeoIpProvider::with_base_url(server.uri())));

	let cache = Arc::new(InMemoryCache::new());
	let orchestrator = Orchestrator::with_client(registry, cache, Client::builder().build().unwrap(), EngineConfig::default());

	let first = orchestrator
		.enrich(&["203.0.113.5".to_string()], TargetType::Ip, &[], EnrichOptions::default(), CancellationToken::new())
		.await
		.unwrap();

	let second = orchestrator
		.enrich(&["203.0.113.5".to_string()], TargetType::Ip, &[], EnrichOptions::default(), CancellationToken::new())
		.await
		.unwrap();

	assert_eq!(first[0].cache_hits.len(), 0);
	assert_eq!(second[0].cache_hits, vec!["geoip".to_string()]);
	assert_eq!(first[0].record.network.isp, second[0].record.network.isp);

	// wiremock's Mock::expect(1) asserts exactly one call was made across both
	// scans when the server is dropped.
	server.verify().await;
}

//! End-to-end coverage of a multi-provider scan against mocked upstreams:
//! fan-out, normalization, and merge all exercised together.

// std
use std::sync::Arc;
// crates.io
use osint_enrich::{
	EnrichOptions, EngineConfig, InMemoryCache, Orchestrator, Registry, TargetType,
	providers::{CertDbProvider, DnsProvider, WhoisProvider},
};
use reqwest::Client;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};

#[tokio::test]
async fn merges_dns_whois_and_certdb_into_one_record() {
	let server = MockServer::start().await;

	// DnsProvider issues one request per record type, each answered with the
	// raw DoH-style `{"Answer": [...]}` shape for just that type.
	Mock::given(method("GET"))
		.and(path("/resolve"))
		.respond_with(move |request: &wiremock::Request| {
			let query: std::collections::HashMap<_, _> = request.url.query_pairs().collect();
			let record_type = query.get("type").map(|v| v.as_ref()).unwrap_or_default();
			let body = match record_type {
				"A" => json!({ "Answer": [{ "data": "93.184.216.34" }] }),
				"MX" => json!({ "Answer": [{ "data": "10 mail.example.com." }] }),
				_ => json!({ "Answer": [] }),
			};
			ResponseTemplate::new(200).set_body_json(body)
		})
		.mount(&server)
		.await;

	Mock::given(method("GET"))
		.and(path("/whois"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"registrar": "IANA",
			"created_date": "1995-08-14T04:00:00Z",
		})))
		.mount(&server)
		.await;

	Mock::given(method("GET"))
		.and(path("/certs"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!([
			{ "name_value": "example.com\napi.example.com", "issuer_name": "Let's Encrypt" },
		])))
		.mount(&server)
		.await;

	let mut registry = Registry::new();
	registry.register(Arc::new(DnsProvider::with_base_url(format!("{}/resolve", server.uri()))));
	registry.register(Arc::new(WhoisProvider::with_base_url(format!("{}/whois", server.uri()))));
	registry.register(Arc::new(CertDbProvider::with_base_url(format!("{}/certs", server.uri()))));

	let orchestrator =
		Orchestrator::with_client(registry, Arc::new(InMemoryCache::new()), Client::builder().build().unwrap(), EngineConfig::default());

	let results = orchestrator
		.enrich(&["example.com".to_string()], TargetType::Domain, &[], EnrichOptions::default(), CancellationToken::new())
		.await
		.unwrap();

	assert_eq!(results.len(), 1);
	let record = &results[0].record;

	assert_eq!(record.source, "merged");
	assert!(record.resolved.ip.contains("93.184.216.34"));
	assert!(record.resolved.mx.contains("10 mail.example.com"));
	assert!(record.resolved.ns.contains("api.example.com"));
	assert_eq!(record.whois.registrar.as_deref(), Some("IANA"));
	assert!(record.whois.created.is_some());
	assert!(!record.risk.malicious);
	assert!(record.raw.contains_key("dns"));
	assert!(record.raw.contains_key("whois"));
	assert!(record.raw.contains_key("certdb"));
	assert!(results[0].per_provider_status.iter().all(|s| s.error.is_none()));
}

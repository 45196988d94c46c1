//! Port/service banner lookups against a third-party scan database.
//!
//! This adapter queries a provider's *existing* scan results (e.g. a
//! continuously-crawled internet-wide scan dataset); it never opens a
//! socket to the target itself, keeping the engine free of active,
//! intrusive scanning per the framework's non-goals.

// std
use std::time::Duration;
// crates.io
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
// self
use crate::{
	error::Result,
	http::ensure_success,
	provider::{Provider, ProviderDescriptor},
	ratelimit::RateLimitSpec,
	record::{Record, TargetType},
};

static DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
	name: "portscan",
	supports: &[TargetType::Ip],
	required_credentials: &["PORTSCAN_API_KEY"],
	rate_limit: RateLimitSpec::new(1.0, 1.0),
};

/// Fetches open-port/service banner data previously collected by a
/// third-party internet-scanning service.
#[derive(Debug)]
pub struct PortScanProvider {
	base_url: String,
}
impl PortScanProvider {
	/// Construct a provider pointed at the default hosted endpoint.
	pub fn new() -> Self {
		Self { base_url: "https://portscan.example/api/host".to_string() }
	}

	/// Construct a provider pointed at a custom endpoint, for tests.
	pub fn with_base_url(base_url: impl Into<String>) -> Self {
		Self { base_url: base_url.into() }
	}
}
impl Default for PortScanProvider {
	fn default() -> Self {
		Self::new()
	}
}
#[async_trait]
impl Provider for PortScanProvider {
	fn descriptor(&self) -> &ProviderDescriptor {
		&DESCRIPTOR
	}

	async fn fetch(
		&self,
		client: &Client,
		target: &str,
		_target_type: TargetType,
		deadline: Duration,
	) -> Result<Value> {
		let api_key = std::env::var("PORTSCAN_API_KEY").unwrap_or_default();

		let response =
			client.get(format!("{}/{target}", self.base_url)).query(&[("key", api_key.as_str())]).timeout(deadline).send().await?;
		let response = ensure_success(response).await?;

		Ok(response.json().await?)
	}

	fn normalize(&self, target: &str, target_type: TargetType, raw: Value) -> Result<Record> {
		let mut record = Record::empty(self.name(), target, target_type);

		record.network.isp = str_field(&raw, "isp");
		record.network.city = str_field(&raw, "city");
		record.network.country = str_field(&raw, "country");

		if let Some(asn) = raw.get("asn").and_then(Value::as_str) {
			record.network.asn = Some(asn.to_string());
		}
		if let Some(org) = str_field(&raw, "org") {
			record.network.asn_name = Some(org);
		}

		record.raw.insert(self.name().to_string(), raw);

		Ok(record)
	}
}

fn str_field(raw: &Value, field: &str) -> Option<String> {
	raw.get(field).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string)
}

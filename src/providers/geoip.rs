//! IP geolocation and network-locality lookups, no credentials required.

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
	name: "geoip",
	supports: &[TargetType::Ip],
	required_credentials: &[],
	rate_limit: RateLimitSpec::new(20.0, 10.0),
};

/// Resolves ASN, ISP, and city/region/country locality for an IP address.
#[derive(Debug)]
pub struct GeoIpProvider {
	base_url: String,
}
impl GeoIpProvider {
	/// Construct a provider pointed at the default hosted endpoint.
	pub fn new() -> Self {
		Self { base_url: "https://ip-api.example/json".to_string() }
	}

	/// Construct a provider pointed at a custom endpoint, for tests.
	pub fn with_base_url(base_url: impl Into<String>) -> Self {
		Self { base_url: base_url.into() }
	}
}
impl Default for GeoIpProvider {
	fn default() -> Self {
		Self::new()
	}
}
#[async_trait]
impl Provider for GeoIpProvider {
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
		let response = client.get(format!("{}/{target}", self.base_url)).timeout(deadline).send().await?;
		let response = ensure_success(response).await?;

		Ok(response.json().await?)
	}

	fn normalize(&self, target: &str, target_type: TargetType, raw: Value) -> Result<Record> {
		let mut record = Record::empty(self.name(), target, target_type);

		record.network.isp = str_field(&raw, "isp");
		record.network.city = str_field(&raw, "city");
		record.network.region = str_field(&raw, "regionName");
		record.network.country = str_field(&raw, "country");

		if let Some(as_field) = str_field(&raw, "as") {
			let mut parts = as_field.splitn(2, ' ');
			record.network.asn = parts.next().map(str::to_string);
			record.network.asn_name = parts.next().map(str::trim).map(str::to_string);
		}

		record.resolved.ip.insert(target.to_string());
		record.raw.insert(self.name().to_string(), raw);

		Ok(record)
	}
}

fn str_field(raw: &Value, field: &str) -> Option<String> {
	raw.get(field).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalize_splits_asn_from_as_field() {
		let provider = GeoIpProvider::new();
		let raw = serde_json::json!({
			"isp": "Cloudflare, Inc.",
			"city": "San Francisco",
			"regionName": "California",
			"country": "United States",
			"as": "AS13335 Cloudflare, Inc.",
		});

		let record = provider.normalize("1.1.1.1", TargetType::Ip, raw).unwrap();
		assert_eq!(record.network.asn.as_deref(), Some("AS13335"));
		assert_eq!(record.network.asn_name.as_deref(), Some("Cloudflare, Inc."));
		assert!(record.resolved.ip.contains("1.1.1.1"));
	}

	#[test]
	fn normalize_tolerates_missing_fields() {
		let provider = GeoIpProvider::new();
		let record = provider.normalize("1.1.1.1", TargetType::Ip, serde_json::json!({})).unwrap();
		assert!(record.network.isp.is_none());
		assert!(record.network.asn.is_none());
	}
}

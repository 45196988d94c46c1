//! Certificate-transparency log lookups: subdomain discovery and issuing-CA
//! organization facts, no credentials required.

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
	name: "certdb",
	supports: &[TargetType::Domain],
	required_credentials: &[],
	rate_limit: RateLimitSpec::new(10.0, 2.0),
};

/// Queries a certificate-transparency log for every certificate issued for a
/// domain, surfacing discovered hostnames and the issuing CA's organization.
///
/// Certificate transparency is read-only lookup against logs third parties
/// already maintain — it never opens a connection to the target itself.
#[derive(Debug)]
pub struct CertDbProvider {
	base_url: String,
}
impl CertDbProvider {
	/// Construct a provider pointed at the default hosted endpoint.
	pub fn new() -> Self {
		Self { base_url: "https://certdb.example/api/v1/certs".to_string() }
	}

	/// Construct a provider pointed at a custom endpoint, for tests.
	pub fn with_base_url(base_url: impl Into<String>) -> Self {
		Self { base_url: base_url.into() }
	}
}
impl Default for CertDbProvider {
	fn default() -> Self {
		Self::new()
	}
}
#[async_trait]
impl Provider for CertDbProvider {
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
		let response = client.get(&self.base_url).query(&[("domain", target)]).timeout(deadline).send().await?;
		let response = ensure_success(response).await?;

		Ok(response.json().await?)
	}

	fn normalize(&self, target: &str, target_type: TargetType, raw: Value) -> Result<Record> {
		let mut record = Record::empty(self.name(), target, target_type);

		if let Some(entries) = raw.as_array() {
			for entry in entries {
				// The unified schema has no dedicated subdomain collection, so
				// discovered certificate SANs — which are DNS hostnames — are
				// folded into `resolved.ns` alongside actual nameserver records.
				if let Some(names) = entry.get("name_value").and_then(Value::as_str) {
					for name in names.lines().map(str::trim).filter(|n| !n.is_empty()) {
						record.resolved.ns.insert(name.trim_start_matches("*.").to_string());
					}
				}

				if record.whois.org.is_none()
					&& let Some(issuer) = entry.get("issuer_name").and_then(Value::as_str)
				{
					record.whois.org = Some(issuer.to_string());
				}
			}
		}

		record.raw.insert(self.name().to_string(), raw);

		Ok(record)
	}
}

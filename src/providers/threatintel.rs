//! Threat-intelligence detection lookups against a VirusTotal-shaped API.

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
	name: "threatintel",
	supports: &[TargetType::Domain, TargetType::Ip, TargetType::Url],
	required_credentials: &["THREATINTEL_API_KEY"],
	rate_limit: RateLimitSpec::new(20.0, 10.0),
};

/// Fetches multi-engine detection stats and maps them to a `0..=100` risk
/// score per the fixed formula in the risk-mapping contract.
#[derive(Debug)]
pub struct ThreatIntelProvider {
	base_url: String,
}
impl ThreatIntelProvider {
	/// Construct a provider pointed at the default hosted endpoint.
	pub fn new() -> Self {
		Self { base_url: "https://threatintel.example/api/v3/search".to_string() }
	}

	/// Construct a provider pointed at a custom endpoint, for tests.
	pub fn with_base_url(base_url: impl Into<String>) -> Self {
		Self { base_url: base_url.into() }
	}
}
impl Default for ThreatIntelProvider {
	fn default() -> Self {
		Self::new()
	}
}
#[async_trait]
impl Provider for ThreatIntelProvider {
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
		let api_key = std::env::var("THREATINTEL_API_KEY").unwrap_or_default();

		let response =
			client.get(&self.base_url).query(&[("query", target)]).header("x-apikey", api_key).timeout(deadline).send().await?;
		let response = ensure_success(response).await?;

		Ok(response.json().await?)
	}

	fn normalize(&self, target: &str, target_type: TargetType, raw: Value) -> Result<Record> {
		let mut record = Record::empty(self.name(), target, target_type);

		let stats = raw
			.pointer("/data/attributes/last_analysis_stats")
			.cloned()
			.unwrap_or_else(|| Value::Object(Default::default()));

		let malicious = count_field(&stats, "malicious");
		let suspicious = count_field(&stats, "suspicious");
		let harmless = count_field(&stats, "harmless");
		let clean = count_field(&stats, "clean");
		let undetected = count_field(&stats, "undetected");
		let total = malicious + suspicious + harmless + clean + undetected;
		let denominator = if total == 0 { 1.0 } else { total as f64 };
		let score = (100.0 * (malicious as f64 + 0.5 * suspicious as f64) / denominator).round();
		let score = score.clamp(0.0, 100.0) as u8;

		let explicit_flag = raw
			.pointer("/data/attributes/malicious")
			.and_then(Value::as_bool)
			.unwrap_or(false);

		record.risk.score = Some(score);
		record.risk.malicious = score >= 30 || explicit_flag;

		if let Some(categories) =
			raw.pointer("/data/attributes/categories").and_then(Value::as_object)
		{
			for category in categories.values().filter_map(Value::as_str) {
				record.risk.categories.insert(category.to_string());
			}
		}

		record.raw.insert(self.name().to_string(), raw);

		Ok(record)
	}
}

fn count_field(stats: &Value, field: &str) -> u64 {
	stats.get(field).and_then(Value::as_u64).unwrap_or(0)
}

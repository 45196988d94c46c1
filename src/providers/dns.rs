//! Passive DNS lookups via DNS-over-HTTPS, no credentials required.

// std
use std::time::Duration;
// crates.io
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
// self
use crate::{
	error::Result,
	http::ensure_success,
	provider::{Provider, ProviderDescriptor},
	ratelimit::RateLimitSpec,
	record::{Record, TargetType},
};

const RECORD_TYPES: &[&str] = &["A", "AAAA", "MX", "NS", "TXT"];

static DESCRIPTOR: ProviderDescriptor = ProviderDescriptor {
	name: "dns",
	supports: &[TargetType::Domain],
	required_credentials: &[],
	rate_limit: RateLimitSpec::new(10.0, 5.0),
};

/// Resolves A/AAAA/MX/NS/TXT records for a domain through a DNS-over-HTTPS
/// resolver.
#[derive(Debug, Default)]
pub struct DnsProvider {
	base_url: String,
}
impl DnsProvider {
	/// Construct a provider pointed at the default public resolver.
	pub fn new() -> Self {
		Self { base_url: "https://dns.google/resolve".to_string() }
	}

	/// Construct a provider pointed at a custom resolver endpoint, primarily
	/// for tests against a mock server.
	pub fn with_base_url(base_url: impl Into<String>) -> Self {
		Self { base_url: base_url.into() }
	}
}
#[async_trait]
impl Provider for DnsProvider {
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
		let mut answers = serde_json::Map::new();

		for record_type in RECORD_TYPES {
			let response = client
				.get(&self.base_url)
				.query(&[("name", target), ("type", record_type)])
				.timeout(deadline)
				.send()
				.await?;
			let response = ensure_success(response).await?;

			answers.insert((*record_type).to_string(), response.json::<Value>().await?);
		}

		Ok(json!({ "answers": answers }))
	}

	fn normalize(&self, target: &str, target_type: TargetType, raw: Value) -> Result<Record> {
		let mut record = Record::empty(self.name(), target, target_type);
		let answers = raw.get("answers").cloned().unwrap_or_default();

		for name in extract_data(&answers, "A") {
			record.resolved.ip.insert(name);
		}
		for name in extract_data(&answers, "AAAA") {
			record.resolved.ip.insert(name);
		}
		for name in extract_data(&answers, "NS") {
			record.resolved.ns.insert(trim_trailing_dot(&name));
		}
		for name in extract_data(&answers, "TXT") {
			record.resolved.txt.insert(strip_quotes(&name));
		}
		for name in extract_mx(&answers) {
			record.resolved.mx.insert(name);
		}

		record.raw.insert(self.name().to_string(), raw);

		Ok(record)
	}
}

fn extract_data(answers: &Value, record_type: &str) -> Vec<String> {
	answers
		.get(record_type)
		.and_then(|v| v.get("Answer"))
		.and_then(Value::as_array)
		.into_iter()
		.flatten()
		.filter_map(|entry| entry.get("data").and_then(Value::as_str))
		.map(str::to_string)
		.collect()
}

fn extract_mx(answers: &Value) -> Vec<String> {
	answers
		.get("MX")
		.and_then(|v| v.get("Answer"))
		.and_then(Value::as_array)
		.into_iter()
		.flatten()
		.filter_map(|entry| entry.get("data").and_then(Value::as_str))
		.map(|data| {
			let mut parts = data.splitn(2, ' ');
			match (parts.next(), parts.next()) {
				(Some(priority), Some(host)) => format!("{priority} {}", trim_trailing_dot(host)),
				_ => data.to_string(),
			}
		})
		.collect()
}

fn trim_trailing_dot(s: &str) -> String {
	s.strip_suffix('.').unwrap_or(s).to_string()
}

fn strip_quotes(s: &str) -> String {
	s.trim_matches('"').to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalize_collects_a_and_aaaa_into_ip_set() {
		let provider = DnsProvider::new();
		let raw = json!({
			"answers": {
				"A": {"Answer": [{"data": "93.184.216.34"}]},
				"AAAA": {"Answer": [{"data": "2606:2800:220:1::1"}]},
				"MX": {"Answer": []},
				"NS": {"Answer": []},
				"TXT": {"Answer": []},
			}
		});

		let record = provider.normalize("example.com", TargetType::Domain, raw).unwrap();
		assert!(record.resolved.ip.contains("93.184.216.34"));
		assert!(record.resolved.ip.contains("2606:2800:220:1::1"));
	}

	#[test]
	fn normalize_formats_mx_as_priority_and_host() {
		let provider = DnsProvider::new();
		let raw = json!({
			"answers": {
				"A": {"Answer": []},
				"AAAA": {"Answer": []},
				"MX": {"Answer": [{"data": "10 mail.example.com."}]},
				"NS": {"Answer": []},
				"TXT": {"Answer": []},
			}
		});

		let record = provider.normalize("example.com", TargetType::Domain, raw).unwrap();
		assert!(record.resolved.mx.contains("10 mail.example.com"));
	}
}

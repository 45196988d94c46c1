//! Domain registration lookups via a hosted WHOIS JSON API.

// std
use std::time::Duration;
// crates.io
use async_trait::async_trait;
use chrono::{DateTime, Utc};
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
	name: "whois",
	supports: &[TargetType::Domain],
	required_credentials: &["WHOISJSON_API_KEY"],
	rate_limit: RateLimitSpec::new(10.0, 5.0),
};

/// Fetches registration facts (registrar, org, registration dates) for a
/// domain.
#[derive(Debug)]
pub struct WhoisProvider {
	base_url: String,
}
impl WhoisProvider {
	/// Construct a provider pointed at the default hosted endpoint.
	pub fn new() -> Self {
		Self { base_url: "https://api.whoisjson.example/v1/whois".to_string() }
	}

	/// Construct a provider pointed at a custom endpoint, for tests.
	pub fn with_base_url(base_url: impl Into<String>) -> Self {
		Self { base_url: base_url.into() }
	}
}
impl Default for WhoisProvider {
	fn default() -> Self {
		Self::new()
	}
}
#[async_trait]
impl Provider for WhoisProvider {
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
		let api_key = std::env::var("WHOISJSON_API_KEY").unwrap_or_default();

		let response = client.get(&self.base_url).query(&[("domain", target)]).bearer_auth(api_key).timeout(deadline).send().await?;
		let response = ensure_success(response).await?;

		Ok(response.json().await?)
	}

	fn normalize(&self, target: &str, target_type: TargetType, raw: Value) -> Result<Record> {
		let mut record = Record::empty(self.name(), target, target_type);

		record.whois.registrar = str_field(&raw, "registrar");
		record.whois.org = str_field(&raw, "org");
		record.whois.country = str_field(&raw, "country");
		record.whois.created = date_field(&raw, "created_date");
		record.whois.updated = date_field(&raw, "updated_date");
		record.whois.expires = date_field(&raw, "expires_date");

		if let Some(emails) = raw.get("emails").and_then(Value::as_array) {
			for email in emails.iter().filter_map(Value::as_str) {
				record.whois.emails.insert(email.to_string());
			}
		}

		record.raw.insert(self.name().to_string(), raw);

		Ok(record)
	}
}

fn str_field(raw: &Value, field: &str) -> Option<String> {
	raw.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Parse an ISO-8601 timestamp, treating a missing offset as UTC.
fn date_field(raw: &Value, field: &str) -> Option<DateTime<Utc>> {
	let text = raw.get(field).and_then(Value::as_str)?;

	DateTime::parse_from_rfc3339(text)
		.map(|dt| dt.with_timezone(&Utc))
		.or_else(|_| text.parse::<chrono::NaiveDateTime>().map(|naive| naive.and_utc()))
		.ok()
}

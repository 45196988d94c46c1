//! The provider contract: one HTTP attempt in, raw JSON out. Providers never
//! retry, cache, rate-limit, or schedule themselves — the engine owns all of
//! that, so a provider can be trusted with exactly one job.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
// self
use crate::{
	error::Result,
	ratelimit::RateLimitSpec,
	record::{Record, TargetType},
};

/// Static facts about a provider needed by the registry and rate limiter,
/// independent of any single fetch.
#[derive(Clone, Debug)]
pub struct ProviderDescriptor {
	/// Stable, lowercase provider name (e.g. `"dns"`, `"virustotal"`).
	pub name: &'static str,
	/// Target kinds this provider can answer queries for.
	pub supports: &'static [TargetType],
	/// Environment variable names that must be set for this provider to run.
	pub required_credentials: &'static [&'static str],
	/// Token-bucket rate limit applied to this provider's fetches.
	pub rate_limit: RateLimitSpec,
}

/// A single OSINT data source. Implementors perform exactly one fetch
/// attempt and hand back the provider's native JSON payload; normalization
/// into a [`Record`] is a separate, synchronous step so it can be unit
/// tested without network access.
#[async_trait]
pub trait Provider: Send + Sync {
	/// Static metadata used by the registry and rate limiter.
	fn descriptor(&self) -> &ProviderDescriptor;

	/// Stable provider name; defaults to the descriptor's name.
	fn name(&self) -> &'static str {
		self.descriptor().name
	}

	/// Whether this provider can answer queries for `target_type`.
	fn supports(&self, target_type: TargetType) -> bool {
		self.descriptor().supports.contains(&target_type)
	}

	/// Perform exactly one fetch attempt against the upstream API for
	/// `target`. Callers are responsible for retry, rate limiting, and
	/// caching; this method issues a single request bounded by `deadline`
	/// and returns its decoded body, or an error classified by
	/// [`crate::retry::classify_status`]/[`crate::retry::classify_transport_error`].
	async fn fetch(
		&self,
		client: &Client,
		target: &str,
		target_type: TargetType,
		deadline: Duration,
	) -> Result<Value>;

	/// Convert this provider's raw payload into the unified record shape.
	/// Never performs I/O; pure data transformation so it can be tested in
	/// isolation from the network.
	fn normalize(&self, target: &str, target_type: TargetType, raw: Value) -> Result<Record>;
}

/// Type-erased handle to a provider, as stored in the registry.
pub type DynProvider = Arc<dyn Provider>;

#[cfg(test)]
mod tests {
	use super::*;

	struct Stub;
	#[async_trait]
	impl Provider for Stub {
		fn descriptor(&self) -> &ProviderDescriptor {
			static DESC: ProviderDescriptor = ProviderDescriptor {
				name: "stub",
				supports: &[TargetType::Domain],
				required_credentials: &[],
				rate_limit: RateLimitSpec::new(10.0, 5.0),
			};
			&DESC
		}

		async fn fetch(
			&self,
			_client: &Client,
			_target: &str,
			_target_type: TargetType,
			_deadline: Duration,
		) -> Result<Value> {
			Ok(serde_json::json!({}))
		}

		fn normalize(&self, target: &str, target_type: TargetType, _raw: Value) -> Result<Record> {
			Ok(Record::empty(self.name(), target, target_type))
		}
	}

	#[test]
	fn supports_checks_descriptor_target_types() {
		let stub = Stub;
		assert!(stub.supports(TargetType::Domain));
		assert!(!stub.supports(TargetType::Ip));
	}
}

//! Provider registry: holds every known provider by stable name in
//! registration order, which doubles as the merge engine's tie-break order.

// std
use std::sync::Arc;
// crates.io
use indexmap::IndexMap;
// self
use crate::{
	error::{Error, Result},
	provider::DynProvider,
	record::TargetType,
};

/// Ordered collection of providers, keyed by name.
///
/// Providers are held by name rather than by back-reference so that the
/// engine, cache, and rate limiter can all address a provider without
/// sharing mutable state with it. Insertion order is preserved and is the
/// canonical tie-break the merge engine uses for single-value fields.
#[derive(Clone, Default)]
pub struct Registry {
	providers: IndexMap<&'static str, DynProvider>,
}
impl Registry {
	/// An empty registry.
	pub fn new() -> Self {
		Self { providers: IndexMap::new() }
	}

	/// Register `provider` under its own name, overwriting any previous
	/// registration of the same name in place (preserving its original
	/// position in the order).
	pub fn register(&mut self, provider: DynProvider) {
		let name = provider.name();

		self.providers.insert(name, provider);
	}

	/// Look up a provider by name.
	pub fn get(&self, name: &str) -> Option<&DynProvider> {
		self.providers.get(name)
	}

	/// Resolve a provider by name, returning [`Error::UnknownProvider`] if it
	/// was never registered. Unlike a missing-credentials skip, an unknown
	/// name is a caller mistake and is always a hard failure.
	pub fn resolve(&self, name: &str) -> Result<&DynProvider> {
		self.get(name).ok_or_else(|| Error::UnknownProvider(name.to_string()))
	}

	/// All registered providers, in registration order.
	pub fn all(&self) -> impl Iterator<Item = &DynProvider> {
		self.providers.values()
	}

	/// Providers that support `target_type`, in registration order.
	pub fn supporting(&self, target_type: TargetType) -> impl Iterator<Item = &DynProvider> {
		self.providers.values().filter(move |p| p.supports(target_type))
	}

	/// Resolve an explicit list of provider names requested by a caller. Any
	/// name not found in the registry is a permanent error rather than being
	/// silently dropped, since it signals a typo or misconfiguration rather
	/// than a transient provider failure.
	pub fn resolve_all<'a>(&'a self, names: &[impl AsRef<str>]) -> Result<Vec<&'a DynProvider>> {
		names.iter().map(|name| self.resolve(name.as_ref())).collect()
	}

	/// Registration-order index of `name`, used as the merge engine's
	/// canonical tie-break key.
	pub fn index_of(&self, name: &str) -> Option<usize> {
		self.providers.get_index_of(name)
	}

	/// Number of registered providers.
	pub fn len(&self) -> usize {
		self.providers.len()
	}

	/// Whether the registry has no providers registered.
	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}
}

/// Check that a provider has every credential its descriptor requires,
/// reading each as an environment variable. Returns the missing variable
/// names, if any, so the caller can skip the provider with a structured
/// warning rather than failing the whole scan.
pub fn missing_credentials(provider: &DynProvider) -> Vec<String> {
	provider
		.descriptor()
		.required_credentials
		.iter()
		.filter(|var| std::env::var(var).is_err())
		.map(|var| (*var).to_string())
		.collect()
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::Arc;
	// crates.io
	use async_trait::async_trait;
	use reqwest::Client;
	use serde_json::Value;
	// self
	use super::*;
	use crate::{
		provider::{Provider, ProviderDescriptor},
		ratelimit::RateLimitSpec,
		record::Record,
	};

	struct Named(&'static str, &'static [TargetType]);
	#[async_trait]
	impl Provider for Named {
		fn descriptor(&self) -> &ProviderDescriptor {
			// Leaked once per test provider instance; acceptable in tests.
			Box::leak(Box::new(ProviderDescriptor {
				name: self.0,
				supports: self.1,
				required_credentials: &[],
				rate_limit: RateLimitSpec::new(1.0, 1.0),
			}))
		}

		async fn fetch(
			&self,
			_client: &Client,
			_target: &str,
			_target_type: TargetType,
			_deadline: std::time::Duration,
		) -> Result<Value> {
			Ok(Value::Null)
		}

		fn normalize(&self, target: &str, target_type: TargetType, _raw: Value) -> Result<Record> {
			Ok(Record::empty(self.0, target, target_type))
		}
	}

	#[test]
	fn registration_order_is_preserved() {
		let mut registry = Registry::new();
		registry.register(Arc::new(Named("whois", &[TargetType::Domain])));
		registry.register(Arc::new(Named("dns", &[TargetType::Domain])));

		let names: Vec<&str> = registry.all().map(|p| p.name()).collect();
		assert_eq!(names, vec!["whois", "dns"]);
	}

	#[test]
	fn resolve_unknown_provider_is_an_error() {
		let registry = Registry::new();
		assert!(matches!(registry.resolve("ghost"), Err(Error::UnknownProvider(_))));
	}

	#[test]
	fn index_of_reflects_registration_order() {
		let mut registry = Registry::new();
		registry.register(Arc::new(Named("whois", &[TargetType::Domain])));
		registry.register(Arc::new(Named("dns", &[TargetType::Domain])));

		assert_eq!(registry.index_of("whois"), Some(0));
		assert_eq!(registry.index_of("dns"), Some(1));
		assert_eq!(registry.index_of("ghost"), None);
	}

	#[test]
	fn supporting_filters_by_target_type() {
		let mut registry = Registry::new();
		registry.register(Arc::new(Named("dns", &[TargetType::Domain])));
		registry.register(Arc::new(Named("geoip", &[TargetType::Ip])));

		let names: Vec<&str> = registry.supporting(TargetType::Ip).map(|p| p.name()).collect();
		assert_eq!(names, vec!["geoip"]);
	}
}

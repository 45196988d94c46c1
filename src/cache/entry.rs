//! Cache entries: one normalized record, stamped with when it was fetched
//! and how long it stays fresh.

// crates.io
use chrono::{DateTime, Utc};
// self
use crate::record::Record;

/// Key identifying one cached provider response for one target.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct CacheKey {
	/// Provider name.
	pub provider: String,
	/// Target query string.
	pub target: String,
}
impl CacheKey {
	/// Construct a key from a provider name and target string.
	pub fn new(provider: impl Into<String>, target: impl Into<String>) -> Self {
		Self { provider: provider.into(), target: target.into() }
	}

	/// A filesystem-safe stable identifier for this key, used by the disk
	/// backend to name its cache files.
	pub fn stable_id(&self) -> String {
		use std::hash::{Hash, Hasher};

		let mut hasher = std::collections::hash_map::DefaultHasher::new();
		self.hash(&mut hasher);

		format!("{}-{:016x}", sanitize(&self.provider), hasher.finish())
	}
}

fn sanitize(s: &str) -> String {
	s.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

/// One cached record plus its freshness bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
	/// The cached, normalized record.
	pub record: Record,
	/// When this entry was written.
	pub fetched_at: DateTime<Utc>,
	/// How long after `fetched_at` the entry is considered fresh.
	pub ttl: chrono::Duration,
}
impl CacheEntry {
	/// Wrap `record` as a cache entry fetched now, with the given TTL.
	pub fn new(record: Record, ttl: chrono::Duration) -> Self {
		Self { record, fetched_at: Utc::now(), ttl }
	}

	/// Whether this entry is still within its TTL as of `now`.
	pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
		now < self.fetched_at + self.ttl
	}

	/// Whether this entry is still within `max_age` of `now`, independent of
	/// the TTL it was written with. Lets a caller request a stricter
	/// freshness bound than the entry's own TTL for a single lookup.
	pub fn is_fresh_within(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
		now - self.fetched_at <= max_age
	}

	/// Approximate size of this entry on the wire, used for cache `stats()`.
	pub fn approx_bytes(&self) -> usize {
		serde_json::to_vec(&self.record).map(|bytes| bytes.len()).unwrap_or(0)
	}
}

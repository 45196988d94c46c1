//! Cache backend abstraction and the default in-memory implementation.

// std
use std::{collections::HashMap, sync::Arc};
// crates.io
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
// self
use crate::{
	cache::entry::{CacheEntry, CacheKey},
	error::Result,
};

/// Aggregate counts returned by [`CacheBackend::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
	/// Number of entries currently held (including any already expired).
	pub entries: usize,
	/// Approximate total size of all cached records, in bytes.
	pub bytes: usize,
}

/// Storage for cached provider records, keyed by `(provider, target)`.
///
/// A miss (key absent, or present but expired) is never an error; only a
/// genuine backend fault (disk I/O failure, corrupt store) is. Implementors
/// are responsible for their own internal locking.
#[async_trait]
pub trait CacheBackend: Send + Sync {
	/// Look up a cache entry, fresh as of `now` within `max_age`. `max_age`
	/// lets a single call request a stricter bound than the entry's own
	/// stored TTL; pass the entry's full TTL to honor it unmodified. Returns
	/// `None` on a miss or on staleness; expiry-driven eviction of the
	/// physical slot is optional and implementation-defined.
	async fn get(&self, key: &CacheKey, max_age: chrono::Duration) -> Result<Option<CacheEntry>>;

	/// Store (overwrite) an entry.
	async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<()>;

	/// Remove an entry, if present. A no-op if the key isn't cached.
	async fn invalidate(&self, key: &CacheKey) -> Result<()>;

	/// Remove every entry whose provider name matches `pattern` exactly, or
	/// every entry when `pattern` is `None`.
	async fn clear(&self, pattern: Option<&str>) -> Result<()>;

	/// Aggregate entry count and approximate byte size.
	async fn stats(&self) -> Result<CacheStats>;
}

/// Default backend: a process-lifetime map guarded by a single
/// `tokio::sync::RwLock`. Adequate for a single scan invocation; nothing
/// here survives past the process, which is the point — durable caching is
/// opt-in via [`crate::cache::persist::DiskCache`].
#[derive(Debug, Default)]
pub struct InMemoryCache {
	entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}
impl InMemoryCache {
	/// An empty cache.
	pub fn new() -> Self {
		Self::default()
	}
}
#[async_trait]
impl CacheBackend for InMemoryCache {
	async fn get(&self, key: &CacheKey, max_age: chrono::Duration) -> Result<Option<CacheEntry>> {
		let entries = self.entries.read().await;

		match entries.get(key) {
			Some(entry) if entry.is_fresh_within(Utc::now(), max_age) => Ok(Some(entry.clone())),
			Some(_) => {
				debug!(provider = %key.provider, target = %key.target, "cache entry expired");

				Ok(None)
			},
			None => Ok(None),
		}
	}

	async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<()> {
		self.entries.write().await.insert(key, entry);

		Ok(())
	}

	async fn invalidate(&self, key: &CacheKey) -> Result<()> {
		self.entries.write().await.remove(key);

		Ok(())
	}

	async fn clear(&self, pattern: Option<&str>) -> Result<()> {
		let mut entries = self.entries.write().await;

		match pattern {
			Some(provider) => entries.retain(|key, _| key.provider != provider),
			None => entries.clear(),
		}

		Ok(())
	}

	async fn stats(&self) -> Result<CacheStats> {
		let entries = self.entries.read().await;
		let bytes = entries.values().map(CacheEntry::approx_bytes).sum();

		Ok(CacheStats { entries: entries.len(), bytes })
	}
}

/// A cache backend shared across an engine instance.
pub type SharedCache = Arc<dyn CacheBackend>;

//! Optional disk-backed cache, gated behind the `persistent-cache` feature.
//!
//! One JSON file per `(provider, target)` pair, named by the key's stable
//! hash. Writes go to a sibling temp file and are renamed into place so a
//! reader never observes a partially written file. A missing or corrupt file
//! is treated as a cache miss, not an error — durability here is a
//! quality-of-life optimization, not a correctness requirement the rest of
//! the engine depends on.

// std
use std::path::PathBuf;
// crates.io
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;
// self
use crate::{
	cache::{
		entry::{CacheEntry, CacheKey},
		store::{CacheBackend, CacheStats},
	},
	error::Result,
	record::Record,
};

#[derive(Serialize, Deserialize)]
struct DiskEntry {
	record: Record,
	fetched_at: DateTime<Utc>,
	ttl_seconds: i64,
}
impl From<&CacheEntry> for DiskEntry {
	fn from(entry: &CacheEntry) -> Self {
		Self { record: entry.record.clone(), fetched_at: entry.fetched_at, ttl_seconds: entry.ttl.num_seconds() }
	}
}
impl From<DiskEntry> for CacheEntry {
	fn from(disk: DiskEntry) -> Self {
		Self { record: disk.record, fetched_at: disk.fetched_at, ttl: chrono::Duration::seconds(disk.ttl_seconds) }
	}
}

/// Disk-backed cache: one file per key under a configured directory.
#[derive(Debug)]
pub struct DiskCache {
	dir: PathBuf,
}
impl DiskCache {
	/// Use `dir` as the cache directory, creating it lazily on first write.
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	fn path_for(&self, key: &CacheKey) -> PathBuf {
		self.dir.join(format!("{}.json", key.stable_id()))
	}

	fn temp_path_for(&self, key: &CacheKey) -> PathBuf {
		self.dir.join(format!("{}.json.tmp", key.stable_id()))
	}
}
#[async_trait]
impl CacheBackend for DiskCache {
	async fn get(&self, key: &CacheKey, max_age: chrono::Duration) -> Result<Option<CacheEntry>> {
		let path = self.path_for(key);

		let bytes = match fs::read(&path).await {
			Ok(bytes) => bytes,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(err) => {
				warn!(path = %path.display(), error = %err, "disk cache read failed, treating as miss");

				return Ok(None);
			},
		};

		let disk: DiskEntry = match serde_json::from_slice(&bytes) {
			Ok(disk) => disk,
			Err(err) => {
				warn!(path = %path.display(), error = %err, "disk cache entry corrupt, treating as miss");

				return Ok(None);
			},
		};

		let entry = CacheEntry::from(disk);

		if entry.is_fresh_within(Utc::now(), max_age) { Ok(Some(entry)) } else { Ok(None) }
	}

	async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<()> {
		fs::create_dir_all(&self.dir).await?;

		let disk = DiskEntry::from(&entry);
		let bytes = serde_json::to_vec(&disk)?;

		let temp_path = self.temp_path_for(&key);
		fs::write(&temp_path, &bytes).await?;
		fs::rename(&temp_path, self.path_for(&key)).await?;

		Ok(())
	}

	async fn invalidate(&self, key: &CacheKey) -> Result<()> {
		match fs::remove_file(self.path_for(key)).await {
			Ok(()) => Ok(()),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(err) => Err(err.into()),
		}
	}

	async fn clear(&self, pattern: Option<&str>) -> Result<()> {
		let mut read_dir = match fs::read_dir(&self.dir).await {
			Ok(read_dir) => read_dir,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
			Err(err) => return Err(err.into()),
		};

		while let Some(entry) = read_dir.next_entry().await? {
			let path = entry.path();
			let matches = match pattern {
				None => true,
				Some(provider) => path
					.file_name()
					.and_then(|name| name.to_str())
					.is_some_and(|name| name.starts_with(&format!("{}-", sanitize_provider(provider)))),
			};

			if matches {
				fs::remove_file(&path).await?;
			}
		}

		Ok(())
	}

	async fn stats(&self) -> Result<CacheStats> {
		let mut read_dir = match fs::read_dir(&self.dir).await {
			Ok(read_dir) => read_dir,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
				return Ok(CacheStats::default());
			},
			Err(err) => return Err(err.into()),
		};

		let mut stats = CacheStats::default();

		while let Some(entry) = read_dir.next_entry().await? {
			if let Ok(metadata) = entry.metadata().await {
				stats.entries += 1;
				stats.bytes += metadata.len() as usize;
			}
		}

		Ok(stats)
	}
}

fn sanitize_provider(provider: &str) -> String {
	provider.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::record::TargetType;

	const DAY: chrono::Duration = chrono::Duration::seconds(86_400);

	#[tokio::test]
	async fn round_trips_through_a_temp_directory() {
		let dir = std::env::temp_dir().join(format!("osint-enrich-test-{:x}", rand::random::<u64>()));
		let cache = DiskCache::new(&dir);
		let key = CacheKey::new("whois", "example.com");
		let record = Record::empty("whois", "example.com", TargetType::Domain);

		cache.put(key.clone(), CacheEntry::new(record.clone(), chrono::Duration::seconds(60))).await.unwrap();
		let hit = cache.get(&key, DAY).await.unwrap().expect("cache hit");
		assert_eq!(hit.record, record);

		cache.invalidate(&key).await.unwrap();
		assert!(cache.get(&key, DAY).await.unwrap().is_none());

		let _ = fs::remove_dir_all(&dir).await;
	}

	#[tokio::test]
	async fn missing_file_is_a_miss_not_an_error() {
		let dir = std::env::temp_dir().join(format!("osint-enrich-test-{:x}", rand::random::<u64>()));
		let cache = DiskCache::new(&dir);
		let key = CacheKey::new("whois", "never-written.com");

		assert!(cache.get(&key, DAY).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn clear_removes_only_matching_provider_files() {
		let dir = std::env::temp_dir().join(format!("osint-enrich-test-{:x}", rand::random::<u64>()));
		let cache = DiskCache::new(&dir);
		let dns_key = CacheKey::new("dns", "example.com");
		let whois_key = CacheKey::new("whois", "example.com");
		let record = Record::empty("dns", "example.com", TargetType::Domain);

		cache.put(dns_key.clone(), CacheEntry::new(record.clone(), DAY)).await.unwrap();
		cache.put(whois_key.clone(), CacheEntry::new(record, DAY)).await.unwrap();

		cache.clear(Some("dns")).await.unwrap();

		assert!(cache.get(&dns_key, DAY).await.unwrap().is_none());
		assert!(cache.get(&whois_key, DAY).await.unwrap().is_some());

		let _ = fs::remove_dir_all(&dir).await;
	}

	#[tokio::test]
	async fn stats_counts_files_and_bytes_on_disk() {
		let dir = std::env::temp_dir().join(format!("osint-enrich-test-{:x}", rand::random::<u64>()));
		let cache = DiskCache::new(&dir);
		let key = CacheKey::new("whois", "example.com");
		let record = Record::empty("whois", "example.com", TargetType::Domain);

		cache.put(key, CacheEntry::new(record, DAY)).await.unwrap();

		let stats = cache.stats().await.unwrap();
		assert_eq!(stats.entries, 1);
		assert!(stats.bytes > 0);

		let _ = fs::remove_dir_all(&dir).await;
	}
}

//! Typed engine configuration, resolved from a config file, the environment,
//! and call-site overrides, in that increasing order of precedence.

// std
use std::time::Duration;
// crates.io
use serde::Deserialize;
// self
use crate::error::Result;

/// Default TTL applied to cache writes when not overridden: 24 hours.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(86_400);
/// Default global concurrency bound `W`.
pub const DEFAULT_MAX_WORKERS: usize = 50;
/// Default per-provider deadline `D_p`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default overall per-target deadline `D_target`.
pub const DEFAULT_TARGET_DEADLINE: Duration = Duration::from_secs(60);
/// Default retry attempt budget, including the first attempt.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Partial configuration as read from a file or the environment: every field
/// is optional so a source that's silent on a key doesn't clobber a lower
/// layer's value during merge.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
	/// Default cache TTL, in seconds.
	pub cache_ttl: Option<u64>,
	/// Disable the cache entirely.
	pub no_cache: Option<bool>,
	/// Bypass cache reads, still writing fresh results back.
	pub refresh_cache: Option<bool>,
	/// Global concurrency bound `W`.
	pub max_workers: Option<usize>,
	/// Per-provider deadline, in seconds.
	pub timeout: Option<u64>,
	/// Retry attempt budget, including the first attempt.
	pub retry_attempts: Option<u32>,
}
impl RawConfig {
	fn merge(self, over: RawConfig) -> RawConfig {
		RawConfig {
			cache_ttl: over.cache_ttl.or(self.cache_ttl),
			no_cache: over.no_cache.or(self.no_cache),
			refresh_cache: over.refresh_cache.or(self.refresh_cache),
			max_workers: over.max_workers.or(self.max_workers),
			timeout: over.timeout.or(self.timeout),
			retry_attempts: over.retry_attempts.or(self.retry_attempts),
		}
	}
}

/// Fully resolved engine configuration; every field has a concrete value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
	/// Default cache TTL applied to fresh writes.
	pub cache_ttl: Duration,
	/// Disable the cache entirely (neither read nor write).
	pub no_cache: bool,
	/// Bypass cache reads for this scan; writes still happen.
	pub refresh_cache: bool,
	/// Global concurrency bound `W`.
	pub max_workers: usize,
	/// Per-provider deadline `D_p`.
	pub timeout: Duration,
	/// Retry attempt budget, including the first attempt.
	pub retry_attempts: u32,
}
impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			cache_ttl: DEFAULT_CACHE_TTL,
			no_cache: false,
			refresh_cache: false,
			max_workers: DEFAULT_MAX_WORKERS,
			timeout: DEFAULT_TIMEOUT,
			retry_attempts: DEFAULT_RETRY_ATTEMPTS,
		}
	}
}
impl EngineConfig {
	/// Load a partial configuration from a TOML file.
	pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<RawConfig> {
		let text = std::fs::read_to_string(path)?;

		Ok(toml::from_str(&text)?)
	}

	/// Read a partial configuration from the process environment, using the
	/// exact keys the engine recognizes (`CACHE_TTL`, `NO_CACHE`,
	/// `REFRESH_CACHE`, `MAX_WORKERS`, `TIMEOUT`, `RETRY_ATTEMPTS`).
	/// `<PROVIDER>_API_KEY`-style credential variables are read directly by
	/// [`crate::registry::missing_credentials`], not through this struct.
	pub fn from_env() -> RawConfig {
		RawConfig {
			cache_ttl: env_u64("CACHE_TTL"),
			no_cache: env_bool("NO_CACHE"),
			refresh_cache: env_bool("REFRESH_CACHE"),
			max_workers: env_u64("MAX_WORKERS").map(|v| v as usize),
			timeout: env_u64("TIMEOUT"),
			retry_attempts: env_u64("RETRY_ATTEMPTS").map(|v| v as u32),
		}
	}

	/// Merge `file < env < options` (left to right, later wins) on top of
	/// built-in defaults, and apply the default `EngineConfig` for anything
	/// left unset at every layer.
	pub fn resolve(file: RawConfig, env: RawConfig, options: RawConfig) -> Self {
		let merged = file.merge(env).merge(options);
		let defaults = Self::default();

		Self {
			cache_ttl: merged.cache_ttl.map(Duration::from_secs).unwrap_or(defaults.cache_ttl),
			no_cache: merged.no_cache.unwrap_or(defaults.no_cache),
			refresh_cache: merged.refresh_cache.unwrap_or(defaults.refresh_cache),
			max_workers: merged.max_workers.unwrap_or(defaults.max_workers),
			timeout: merged.timeout.map(Duration::from_secs).unwrap_or(defaults.timeout),
			retry_attempts: merged.retry_attempts.unwrap_or(defaults.retry_attempts),
		}
	}
}

fn env_bool(key: &str) -> Option<bool> {
	std::env::var(key).ok().map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_u64(key: &str) -> Option<u64> {
	std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_the_documented_values() {
		let config = EngineConfig::default();
		assert_eq!(config.cache_ttl, Duration::from_secs(86_400));
		assert_eq!(config.max_workers, 50);
		assert_eq!(config.timeout, Duration::from_secs(30));
		assert_eq!(config.retry_attempts, 3);
		assert!(!config.no_cache);
		assert!(!config.refresh_cache);
	}

	#[test]
	fn call_site_options_win_over_env_which_wins_over_file() {
		let file = RawConfig { max_workers: Some(10), timeout: Some(20), ..Default::default() };
		let env = RawConfig { max_workers: Some(25), ..Default::default() };
		let options = RawConfig { timeout: Some(5), ..Default::default() };

		let resolved = EngineConfig::resolve(file, env, options);
		assert_eq!(resolved.max_workers, 25);
		assert_eq!(resolved.timeout, Duration::from_secs(5));
	}

	#[test]
	fn unset_layers_fall_through_to_defaults() {
		let resolved = EngineConfig::resolve(RawConfig::default(), RawConfig::default(), RawConfig::default());
		assert_eq!(resolved, EngineConfig::default());
	}

	#[test]
	fn parses_a_toml_file() {
		let dir = std::env::temp_dir().join(format!("osint-enrich-config-test-{:x}", rand::random::<u64>()));
		std::fs::create_dir_all(&dir).unwrap();
		let path = dir.join("config.toml");
		std::fs::write(&path, "max_workers = 12\nno_cache = true\n").unwrap();

		let raw = EngineConfig::from_file(&path).unwrap();
		assert_eq!(raw.max_workers, Some(12));
		assert_eq!(raw.no_cache, Some(true));

		let _ = std::fs::remove_dir_all(&dir);
	}
}

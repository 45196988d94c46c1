//! Concurrent multi-provider OSINT enrichment engine — rate-limited, retried,
//! cached, and normalized into one unified record per target.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod config;
mod http;
pub mod merge;
#[cfg(feature = "metrics")] pub mod metrics;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod ratelimit;
pub mod record;
pub mod registry;
pub mod retry;

mod error;
mod _prelude {
	pub use std::{
		sync::Arc,
		time::{Duration, SystemTime},
	};

	pub use chrono::{DateTime, TimeDelta, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

#[cfg(feature = "prometheus")] pub use crate::metrics::install_default_exporter;
pub use crate::{
	cache::{CacheBackend, CacheEntry, CacheKey, CacheStats, InMemoryCache, SharedCache},
	config::EngineConfig,
	error::{Error, Result},
	orchestrator::{EnrichOptions, EnrichResult, Orchestrator, ProviderStatus},
	provider::{Provider, ProviderDescriptor},
	ratelimit::{RateLimitSpec, RateLimiter},
	record::{Network, OrderedSet, Record, Resolved, Risk, TargetType, ValidationError, Whois},
	registry::Registry,
	retry::RetryPolicy,
};
#[cfg(feature = "persistent-cache")] pub use crate::cache::DiskCache;

//! Metrics helpers and per-provider telemetry bookkeeping.
//!
//! Gated behind the `metrics` feature (and `prometheus` for exporting); the
//! engine runs identically with metrics compiled out, it just stops counting.

// std
use std::sync::{
	OnceLock,
	atomic::{AtomicU64, Ordering},
};
// crates.io
use metrics::Label;
#[cfg(feature = "prometheus")] use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use smallvec::SmallVec;
// self
use crate::_prelude::*;

type LabelSet = SmallVec<[Label; 4]>;

const METRIC_FETCH_TOTAL: &str = "osint_enrich_provider_fetch_total";
const METRIC_FETCH_DURATION: &str = "osint_enrich_provider_fetch_duration_seconds";
const METRIC_FETCH_ERRORS: &str = "osint_enrich_provider_fetch_errors_total";
const METRIC_CACHE_REQUESTS_TOTAL: &str = "osint_enrich_cache_requests_total";
const METRIC_CACHE_HITS_TOTAL: &str = "osint_enrich_cache_hits_total";
const METRIC_CACHE_MISSES_TOTAL: &str = "osint_enrich_cache_misses_total";
const METRIC_RATE_LIMIT_WAIT: &str = "osint_enrich_rate_limit_wait_seconds";
const METRIC_RETRIES_TOTAL: &str = "osint_enrich_provider_retries_total";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Thread-safe telemetry accumulator for a single provider.
#[derive(Debug, Default)]
pub struct ProviderMetrics {
	cache_requests: AtomicU64,
	cache_hits: AtomicU64,
	fetch_successes: AtomicU64,
	fetch_errors: AtomicU64,
	retries: AtomicU64,
	last_fetch_micros: AtomicU64,
}
impl ProviderMetrics {
	/// Create a new, zeroed accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record a cache probe outcome.
	pub fn record_cache(&self, hit: bool) {
		self.cache_requests.fetch_add(1, Ordering::Relaxed);
		if hit {
			self.cache_hits.fetch_add(1, Ordering::Relaxed);
		}
	}

	/// Record a completed fetch attempt and its latency.
	pub fn record_fetch_success(&self, duration: Duration) {
		self.fetch_successes.fetch_add(1, Ordering::Relaxed);
		self.last_fetch_micros.store(duration.as_micros() as u64, Ordering::Relaxed);
	}

	/// Record a fetch that ultimately failed after retries were exhausted.
	pub fn record_fetch_error(&self) {
		self.fetch_errors.fetch_add(1, Ordering::Relaxed);
	}

	/// Record one retry attempt (not the initial attempt).
	pub fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for status reporting.
	pub fn snapshot(&self) -> ProviderMetricsSnapshot {
		ProviderMetricsSnapshot {
			cache_requests: self.cache_requests.load(Ordering::Relaxed),
			cache_hits: self.cache_hits.load(Ordering::Relaxed),
			fetch_successes: self.fetch_successes.load(Ordering::Relaxed),
			fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
			retries: self.retries.load(Ordering::Relaxed),
			last_fetch_micros: match self.last_fetch_micros.load(Ordering::Relaxed) {
				0 => None,
				value => Some(value),
			},
		}
	}
}

/// Read-only snapshot of per-provider telemetry counters.
#[derive(Clone, Debug)]
pub struct ProviderMetricsSnapshot {
	/// Total cache lookups observed for this provider.
	pub cache_requests: u64,
	/// Count of lookups served from the cache.
	pub cache_hits: u64,
	/// Count of fetches that ultimately succeeded.
	pub fetch_successes: u64,
	/// Count of fetches that ultimately failed after retries exhausted.
	pub fetch_errors: u64,
	/// Count of retry attempts issued (excludes the initial attempt).
	pub retries: u64,
	/// Microsecond latency of the most recent successful fetch.
	pub last_fetch_micros: Option<u64>,
}
impl ProviderMetricsSnapshot {
	/// Cache hit rate in `[0.0, 1.0]`.
	pub fn hit_rate(&self) -> f64 {
		if self.cache_requests == 0 { 0.0 } else { self.cache_hits as f64 / self.cache_requests as f64 }
	}
}

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new().install_recorder().map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Record a cache lookup outcome for `provider`.
pub fn record_cache_lookup(provider: &str, hit: bool) {
	let labels = base_labels(provider);

	metrics::counter!(METRIC_CACHE_REQUESTS_TOTAL, labels.iter()).increment(1);

	if hit {
		metrics::counter!(METRIC_CACHE_HITS_TOTAL, labels.iter()).increment(1);
	} else {
		metrics::counter!(METRIC_CACHE_MISSES_TOTAL, labels.iter()).increment(1);
	}
}

/// Record a successful provider fetch and its latency.
pub fn record_fetch_success(provider: &str, duration: Duration) {
	metrics::counter!(METRIC_FETCH_TOTAL, status_labels(provider, "success").iter()).increment(1);
	metrics::histogram!(METRIC_FETCH_DURATION, base_labels(provider).iter()).record(duration.as_secs_f64());
}

/// Record a provider fetch that failed after exhausting retries.
pub fn record_fetch_error(provider: &str) {
	metrics::counter!(METRIC_FETCH_TOTAL, status_labels(provider, "error").iter()).increment(1);
	metrics::counter!(METRIC_FETCH_ERRORS, base_labels(provider).iter()).increment(1);
}

/// Record a retry attempt for `provider`.
pub fn record_retry(provider: &str) {
	metrics::counter!(METRIC_RETRIES_TOTAL, base_labels(provider).iter()).increment(1);
}

/// Record time spent blocked on the rate limiter before a token was granted.
pub fn record_rate_limit_wait(provider: &str, waited: Duration) {
	metrics::histogram!(METRIC_RATE_LIMIT_WAIT, base_labels(provider).iter()).record(waited.as_secs_f64());
}

fn base_labels(provider: &str) -> LabelSet {
	let mut labels = LabelSet::with_capacity(1);

	labels.push(Label::new("provider", provider.to_owned()));

	labels
}

fn status_labels(provider: &str, status: &'static str) -> LabelSet {
	let mut labels = base_labels(provider);

	labels.push(Label::new("status", status));

	labels
}

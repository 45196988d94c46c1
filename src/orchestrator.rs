//! The engine's entry point: fans queries out across providers, enforces
//! rate limits/retries/deadlines/cancellation, and merges the results.

// std
#[cfg(feature = "metrics")] use std::collections::HashMap;
use std::{sync::Arc, time::Duration};
// crates.io
use reqwest::{Client, redirect::Policy};
use tokio::{sync::Semaphore, task::JoinSet, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
// self
use crate::{
	cache::{CacheBackend, CacheEntry, CacheKey, SharedCache},
	config::{DEFAULT_TARGET_DEADLINE, EngineConfig},
	error::{Error, Result},
	merge,
	provider::DynProvider,
	ratelimit::RateLimiter,
	record::{Record, TargetType},
	registry::{self, Registry},
	retry::{self, ErrorClass, RetryExecutor, RetryPolicy},
};
#[cfg(feature = "metrics")] use crate::metrics::{self, ProviderMetrics, ProviderMetricsSnapshot};

/// Call-site overrides for a single [`Orchestrator::enrich`] invocation.
/// Anything left `None` falls back to the orchestrator's resolved
/// [`EngineConfig`].
#[derive(Clone, Copy, Debug, Default)]
pub struct EnrichOptions {
	/// Disable the cache entirely for this scan.
	pub no_cache: Option<bool>,
	/// Bypass cache reads (still writes fresh results) for this scan.
	pub refresh_cache: Option<bool>,
	/// Override the global concurrency bound `W`.
	pub max_workers: Option<usize>,
	/// Override the overall per-target deadline `D_target`.
	pub deadline: Option<Duration>,
	/// Override the per-provider deadline `D_p`.
	pub timeout: Option<Duration>,
}

/// Outcome of one provider unit within a target's scan.
#[derive(Clone, Debug)]
pub struct ProviderStatus {
	/// Provider name.
	pub provider: String,
	/// Whether this result was served from the cache.
	pub from_cache: bool,
	/// `Some(message)` if the unit failed or was skipped; `None` on success.
	pub error: Option<String>,
}

/// The per-target result of an enrichment scan.
#[derive(Clone, Debug)]
pub struct EnrichResult {
	/// The target that was scanned.
	pub target: String,
	/// The target's declared kind.
	pub target_type: TargetType,
	/// The merged, unified record.
	pub record: Record,
	/// One status entry per provider unit that ran for this target.
	pub per_provider_status: Vec<ProviderStatus>,
	/// Names of providers whose result for this target came from the cache.
	pub cache_hits: Vec<String>,
	/// Wall-clock time spent scanning this target, in milliseconds.
	pub elapsed_ms: u64,
	/// `Some(message)` when the target itself failed validation; the other
	/// fields are then empty rather than the result of any provider run.
	pub invalid: Option<String>,
}

/// Coordinates provider fan-out, rate limiting, retries, caching, and merge
/// for one or more targets.
pub struct Orchestrator {
	registry: Arc<Registry>,
	cache: SharedCache,
	rate_limiter: Arc<RateLimiter>,
	client: Client,
	retry_policy: RetryPolicy,
	config: EngineConfig,
	#[cfg(feature = "metrics")]
	provider_metrics: HashMap<String, Arc<ProviderMetrics>>,
}
impl Orchestrator {
	/// Build an orchestrator with the default reqwest client.
	pub fn new(registry: Registry, cache: SharedCache, config: EngineConfig) -> Result<Self> {
		let client = Client::builder()
			.redirect(Policy::limited(10))
			.user_agent(concat!("osint-enrich/", env!("CARGO_PKG_VERSION")))
			.connect_timeout(Duration::from_secs(5))
			.build()?;

		Ok(Self::with_client(registry, cache, client, config))
	}

	/// Build an orchestrator using the supplied HTTP client (primarily for tests).
	pub fn with_client(registry: Registry, cache: SharedCache, client: Client, config: EngineConfig) -> Self {
		let retry_policy = RetryPolicy { max_attempts: config.retry_attempts, ..RetryPolicy::default() };
		#[cfg(feature = "metrics")]
		let provider_metrics = registry.all().map(|p| (p.name().to_string(), ProviderMetrics::new())).collect();

		Self {
			registry: Arc::new(registry),
			cache,
			rate_limiter: Arc::new(RateLimiter::new()),
			client,
			retry_policy,
			config,
			#[cfg(feature = "metrics")]
			provider_metrics,
		}
	}

	/// The registry this orchestrator was built with.
	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	/// Point-in-time telemetry for one provider, if it was registered and the
	/// `metrics` feature is enabled.
	#[cfg(feature = "metrics")]
	pub fn provider_metrics(&self, name: &str) -> Option<ProviderMetricsSnapshot> {
		self.provider_metrics.get(name).map(|m| m.snapshot())
	}

	/// Run a scan across `targets` of the given `target_type`, using
	/// `providers` (empty = every provider that supports `target_type`).
	///
	/// Provider units for every target share one global worker pool sized
	/// `W`: a unit blocked on its rate limiter does not hold a worker slot,
	/// and units for different targets interleave freely — there is no
	/// per-target barrier.
	#[instrument(skip(self, cancel), fields(targets = targets.len(), type = %target_type))]
	pub async fn enrich(
		&self,
		targets: &[String],
		target_type: TargetType,
		providers: &[String],
		options: EnrichOptions,
		cancel: CancellationToken,
	) -> Result<Vec<EnrichResult>> {
		// Validate every target up front, but keep scanning the valid ones even
		// when some targets in the batch are malformed: one bad target should
		// not zero out results for the rest.
		let invalid: Vec<Option<String>> = targets
			.iter()
			.map(|target| {
				Record::empty("_validate", target, target_type)
					.validate()
					.err()
					.map(|_| Error::InvalidTarget { target: target.clone(), type_name: target_type.as_str() }.to_string())
			})
			.collect();

		let selected = self.resolve_providers(providers, target_type)?;

		for provider in &selected {
			self.rate_limiter.register(provider.name(), provider.descriptor().rate_limit).await;
		}

		let no_cache = options.no_cache.unwrap_or(self.config.no_cache);
		let refresh_cache = options.refresh_cache.unwrap_or(self.config.refresh_cache);
		let max_workers = options.max_workers.unwrap_or(self.config.max_workers).max(1);
		let provider_deadline = options.timeout.unwrap_or(self.config.timeout);
		let target_deadline = options.deadline.unwrap_or(DEFAULT_TARGET_DEADLINE);
		let cache_ttl = chrono::Duration::from_std(self.config.cache_ttl).unwrap_or(chrono::Duration::seconds(86_400));

		let semaphore = Arc::new(Semaphore::new(max_workers));
		let mut units = JoinSet::new();
		let mut started_at = Vec::with_capacity(targets.len());

		for (index, target) in targets.iter().enumerate() {
			let target_started = Instant::now();
			started_at.push(target_started);

			if invalid[index].is_some() || cancel.is_cancelled() {
				continue;
			}

			for provider in &selected {
				let provider_index = self.registry.index_of(provider.name()).unwrap_or(usize::MAX);

				#[cfg(feature = "metrics")]
				let provider_metrics = self.provider_metrics.get(provider.name()).cloned();
				#[cfg(not(feature = "metrics"))]
				let provider_metrics = ();

				units.spawn(run_unit(
					index,
					provider_index,
					provider.clone(),
					target.clone(),
					target_type,
					self.cache.clone(),
					self.rate_limiter.clone(),
					self.client.clone(),
					self.retry_policy,
					semaphore.clone(),
					cancel.clone(),
					no_cache,
					refresh_cache,
					cache_ttl,
					provider_deadline,
					target_started,
					target_deadline,
					provider_metrics,
				));
			}
		}

		// Keep each provider's (index, record) pair so records can be restored
		// to registry order before merge, regardless of which unit's task
		// happened to finish first.
		let mut records: Vec<Vec<(usize, Record)>> = (0..targets.len()).map(|_| Vec::new()).collect();
		let mut statuses: Vec<Vec<ProviderStatus>> = (0..targets.len()).map(|_| Vec::new()).collect();
		let mut cache_hits: Vec<Vec<String>> = (0..targets.len()).map(|_| Vec::new()).collect();

		while let Some(joined) = units.join_next().await {
			let outcome = match joined {
				Ok(outcome) => outcome,
				Err(join_err) => {
					warn!(error = %join_err, "provider unit task panicked");

					continue;
				},
			};

			if outcome.status.from_cache {
				cache_hits[outcome.target_index].push(outcome.status.provider.clone());
			}
			if let Some(record) = outcome.record {
				records[outcome.target_index].push((outcome.provider_index, record));
			}

			statuses[outcome.target_index].push(outcome.status);
		}

		let mut results = Vec::with_capacity(targets.len());

		for (index, target) in targets.iter().enumerate() {
			if let Some(reason) = invalid[index].clone() {
				results.push(EnrichResult {
					target: target.clone(),
					target_type,
					record: Record::empty("merged", target, target_type),
					per_provider_status: Vec::new(),
					cache_hits: Vec::new(),
					elapsed_ms: started_at[index].elapsed().as_millis() as u64,
					invalid: Some(reason),
				});

				continue;
			}

			let mut per_provider_status = std::mem::take(&mut statuses[index]);

			if cancel.is_cancelled() && per_provider_status.is_empty() {
				per_provider_status = selected
					.iter()
					.map(|p| ProviderStatus {
						provider: p.name().to_string(),
						from_cache: false,
						error: Some(Error::Cancelled { reason: "scan cancelled before unit started".into() }.to_string()),
					})
					.collect();
			}

			let mut ordered = std::mem::take(&mut records[index]);
			ordered.sort_by_key(|(provider_index, _)| *provider_index);
			let ordered_records: Vec<Record> = ordered.into_iter().map(|(_, record)| record).collect();

			let merged = merge::merge(&ordered_records, target, target_type);

			results.push(EnrichResult {
				target: target.clone(),
				target_type,
				record: merged,
				per_provider_status,
				cache_hits: std::mem::take(&mut cache_hits[index]),
				elapsed_ms: started_at[index].elapsed().as_millis() as u64,
				invalid: None,
			});
		}

		Ok(results)
	}

	fn resolve_providers(&self, providers: &[String], target_type: TargetType) -> Result<Vec<DynProvider>> {
		if providers.is_empty() {
			return Ok(self.registry.supporting(target_type).cloned().collect());
		}

		Ok(self
			.registry
			.resolve_all(providers)?
			.into_iter()
			.filter(|p| p.supports(target_type))
			.cloned()
			.collect())
	}
}

#[cfg(feature = "metrics")]
type MaybeProviderMetrics = Option<Arc<ProviderMetrics>>;
#[cfg(not(feature = "metrics"))]
type MaybeProviderMetrics = ();

struct UnitOutcome {
	target_index: usize,
	provider_index: usize,
	status: ProviderStatus,
	record: Option<Record>,
}

#[allow(clippy::too_many_arguments)]
#[instrument(skip(provider, cache, rate_limiter, client, retry_policy, semaphore, cancel), fields(provider = provider.name(), target = %target))]
async fn run_unit(
	target_index: usize,
	provider_index: usize,
	provider: DynProvider,
	target: String,
	target_type: TargetType,
	cache: SharedCache,
	rate_limiter: Arc<RateLimiter>,
	client: Client,
	retry_policy: RetryPolicy,
	semaphore: Arc<Semaphore>,
	cancel: CancellationToken,
	no_cache: bool,
	refresh_cache: bool,
	cache_ttl: chrono::Duration,
	provider_deadline: Duration,
	target_started: Instant,
	target_deadline: Duration,
	provider_metrics: MaybeProviderMetrics,
) -> UnitOutcome {
	let name = provider.name();
	let key = CacheKey::new(name, &target);

	if !no_cache && !refresh_cache {
		match cache.get(&key, cache_ttl).await {
			Ok(Some(entry)) => {
				#[cfg(feature = "metrics")]
				{
					metrics::record_cache_lookup(name, true);
					if let Some(provider_metrics) = &provider_metrics {
						provider_metrics.record_cache(true);
					}
				}

				return UnitOutcome {
					target_index,
					provider_index,
					status: ProviderStatus { provider: name.to_string(), from_cache: true, error: None },
					record: Some(entry.record),
				};
			},
			Ok(None) => {
				#[cfg(feature = "metrics")]
				{
					metrics::record_cache_lookup(name, false);
					if let Some(provider_metrics) = &provider_metrics {
						provider_metrics.record_cache(false);
					}
				}
			},
			Err(err) => warn!(provider = name, error = %err, "cache read failed, treating as miss"),
		}
	}

	let missing = registry::missing_credentials(&provider);
	if !missing.is_empty() {
		let err = Error::CredentialsMissing { provider: name.to_string(), missing };

		return UnitOutcome {
			target_index,
			provider_index,
			status: ProviderStatus { provider: name.to_string(), from_cache: false, error: Some(err.to_string()) },
			record: None,
		};
	}

	let wait_started = Instant::now();
	if let Err(err) = rate_limiter.acquire_cancellable(name, 1.0, Some(&cancel)).await {
		return UnitOutcome {
			target_index,
			provider_index,
			status: ProviderStatus { provider: name.to_string(), from_cache: false, error: Some(err.to_string()) },
			record: None,
		};
	}
	#[cfg(feature = "metrics")]
	metrics::record_rate_limit_wait(name, wait_started.elapsed());

	let _permit = match semaphore.acquire_owned().await {
		Ok(permit) => permit,
		Err(_) => {
			let err = Error::Internal("worker pool closed".into());

			return UnitOutcome {
				target_index,
				provider_index,
				status: ProviderStatus { provider: name.to_string(), from_cache: false, error: Some(err.to_string()) },
				record: None,
			};
		},
	};

	let attempt_budget = provider_deadline.min(retry::remaining(target_started, target_deadline));
	let mut executor = RetryExecutor::new(&retry_policy);
	let fetch_started = Instant::now();

	let raw = loop {
		let remaining = retry::remaining(fetch_started, attempt_budget);
		if remaining.is_zero() {
			let err = Error::ProviderTimeout { provider: name.to_string(), target: target.clone(), after: attempt_budget };

			return UnitOutcome {
				target_index,
				provider_index,
				status: ProviderStatus { provider: name.to_string(), from_cache: false, error: Some(err.to_string()) },
				record: None,
			};
		}

		executor.record_attempt();

		let attempt = tokio::select! {
			biased;
			_ = cancel.cancelled() => {
				let err = Error::Cancelled { reason: format!("scan cancelled during '{name}' fetch") };
				return UnitOutcome {
					target_index,
					provider_index,
					status: ProviderStatus { provider: name.to_string(), from_cache: false, error: Some(err.to_string()) },
					record: None,
				};
			}
			result = provider.fetch(&client, &target, target_type, remaining) => result,
		};

		match attempt {
			Ok(value) => break value,
			Err(err) => {
				let class = classify(&err);

				if class == ErrorClass::Transient && executor.can_retry() {
					#[cfg(feature = "metrics")]
					{
						metrics::record_retry(name);
						if let Some(provider_metrics) = &provider_metrics {
							provider_metrics.record_retry();
						}
					}

					debug!(provider = name, target = %target, attempt = executor.attempts_used(), "retrying after transient error");

					executor.sleep_backoff(retry_after_from(&err)).await;

					continue;
				}

				#[cfg(feature = "metrics")]
				{
					metrics::record_fetch_error(name);
					if let Some(provider_metrics) = &provider_metrics {
						provider_metrics.record_fetch_error();
					}
				}

				let reported = match class {
					ErrorClass::Transient => Error::Transient {
						provider: name.to_string(),
						target: target.clone(),
						cause: err.to_string(),
						attempts: executor.attempts_used(),
					},
					_ => Error::Permanent { provider: name.to_string(), target: target.clone(), cause: err.to_string() },
				};

				return UnitOutcome {
					target_index,
					provider_index,
					status: ProviderStatus { provider: name.to_string(), from_cache: false, error: Some(reported.to_string()) },
					record: None,
				};
			},
		}
	};

	#[cfg(feature = "metrics")]
	{
		metrics::record_fetch_success(name, fetch_started.elapsed());
		if let Some(provider_metrics) = &provider_metrics {
			provider_metrics.record_fetch_success(fetch_started.elapsed());
		}
	}

	let record = match provider.normalize(&target, target_type, raw) {
		Ok(record) => record,
		Err(err) => {
			return UnitOutcome {
				target_index,
				provider_index,
				status: ProviderStatus { provider: name.to_string(), from_cache: false, error: Some(err.to_string()) },
				record: None,
			};
		},
	};

	if !no_cache {
		if let Err(err) = cache.put(key, CacheEntry::new(record.clone(), cache_ttl)).await {
			warn!(provider = name, error = %err, "cache write failed");
		}
	}

	UnitOutcome {
		target_index,
		provider_index,
		status: ProviderStatus { provider: name.to_string(), from_cache: false, error: None },
		record: Some(record),
	}
}

fn classify(err: &Error) -> ErrorClass {
	match err {
		Error::Http { status, .. } => retry::classify_status(*status),
		Error::Reqwest(inner) => {
			inner.status().map(|status| retry::classify_status(status.as_u16())).unwrap_or_else(|| retry::classify_transport_error(inner))
		},
		Error::Transient { .. } | Error::ProviderTimeout { .. } | Error::Cancelled { .. } => ErrorClass::Transient,
		_ => ErrorClass::Permanent,
	}
}

/// Honor a provider's `Retry-After` hint over the computed exponential
/// backoff, per the retry policy's 429 handling.
fn retry_after_from(err: &Error) -> Option<Duration> {
	match err {
		Error::Http { retry_after, .. } => *retry_after,
		_ => None,
	}
}

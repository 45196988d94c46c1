//! Retry policy and backoff scheduling for provider fetches.

// std
use std::{cell::RefCell, time::Duration};
// crates.io
use rand::{Rng, SeedableRng, rngs::SmallRng};
use tokio::time::{self, Instant};

thread_local! {
	/// Per-thread jitter source for backoff randomization; thread-local so
	/// concurrently retrying provider units never contend on a shared RNG.
	static SMALL_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_rng(&mut rand::rng()));
}

/// How a failure should be treated by the retry loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
	/// Worth retrying: network blip, timeout, 429, or 5xx.
	Transient,
	/// Not worth retrying: 4xx other than 429, malformed response, etc.
	Permanent,
	/// Provider requires credentials that were not configured; skip, don't retry.
	CredentialsMissing,
}

/// Classify an HTTP status code per the provider error-handling table.
///
/// Credentials-missing is decided before any request is sent (see
/// [`crate::registry::missing_credentials`]), so a 401/403 that actually
/// reaches this classifier is a bad or revoked key, not an absent one — the
/// table calls that permanent, same as 400/404/422.
pub fn classify_status(status: u16) -> ErrorClass {
	match status {
		400 | 401 | 403 | 404 | 422 => ErrorClass::Permanent,
		408 | 429 => ErrorClass::Transient,
		500..=599 => ErrorClass::Transient,
		_ => ErrorClass::Permanent,
	}
}

/// Classify a transport-level failure (connect/timeout/DNS) as transient.
pub fn classify_transport_error(err: &reqwest::Error) -> ErrorClass {
	if err.is_timeout() || err.is_connect() || err.is_request() {
		ErrorClass::Transient
	} else {
		ErrorClass::Permanent
	}
}

/// Exponential backoff with a retry-attempt ceiling, per provider fetch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
	/// Total attempts allowed, including the first.
	pub max_attempts: u32,
	/// Delay before the first retry.
	pub initial_backoff: Duration,
	/// Backoff growth factor applied per additional retry.
	pub multiplier: f64,
	/// Backoff delay never exceeds this, regardless of attempt count.
	pub max_backoff: Duration,
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			initial_backoff: Duration::from_secs(1),
			multiplier: 2.0,
			max_backoff: Duration::from_secs(4),
		}
	}
}
impl RetryPolicy {
	/// Backoff delay for the given zero-indexed retry attempt (0 = first retry).
	pub fn backoff_for(&self, attempt: u32) -> Duration {
		let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(attempt as i32);

		Duration::from_secs_f64(scaled).min(self.max_backoff)
	}
}

/// Drives one provider fetch's retry loop: tracks attempts used and computes
/// the next backoff, honoring a server-supplied `Retry-After` override when
/// present.
#[derive(Debug)]
pub struct RetryExecutor<'a> {
	policy: &'a RetryPolicy,
	attempts_used: u32,
}
impl<'a> RetryExecutor<'a> {
	/// Create a new executor against `policy`.
	pub fn new(policy: &'a RetryPolicy) -> Self {
		Self { policy, attempts_used: 0 }
	}

	/// Number of attempts already made (the first attempt counts as one).
	pub fn attempts_used(&self) -> u32 {
		self.attempts_used
	}

	/// Whether another attempt is permitted under the policy.
	pub fn can_retry(&self) -> bool {
		self.attempts_used + 1 < self.policy.max_attempts
	}

	/// Record that an attempt was made.
	pub fn record_attempt(&mut self) {
		self.attempts_used = self.attempts_used.saturating_add(1);
	}

	/// Sleep for the backoff window before the next retry. When the provider
	/// sent a `Retry-After` hint, wait the greater of that hint and the
	/// computed exponential delay, per the 429 handling rule; otherwise wait
	/// the computed delay alone. The computed delay is full-jittered before
	/// the comparison so concurrent provider units don't wake in lockstep.
	pub async fn sleep_backoff(&self, retry_after: Option<Duration>) {
		let computed = jittered(self.policy.backoff_for(self.attempts_used.saturating_sub(1)));
		let delay = retry_after.map_or(computed, |hint| hint.max(computed));

		if !delay.is_zero() {
			time::sleep(delay).await;
		}
	}
}

/// Randomize `computed` within the top 20% of its range (the "Full" jitter
/// shape): never waits longer than the computed backoff, only ever less,
/// so the cumulative-wait upper bound in the retry contract still holds.
fn jittered(computed: Duration) -> Duration {
	random_within(computed.mul_f64(0.8), computed)
}

/// Pick a random duration in `[min, max]`.
fn random_within(min: Duration, max: Duration) -> Duration {
	if max <= min {
		return max;
	}

	SMALL_RNG.with(|cell| {
		let mut rng = cell.borrow_mut();
		let nanos = max.as_nanos() - min.as_nanos();
		let jitter = rng.random_range(0..=nanos.min(u64::MAX as u128));

		min + Duration::from_nanos(jitter as u64)
	})
}

/// Parse a `Retry-After` header value, which is either a delta-seconds
/// integer or an HTTP-date. Only the delta-seconds form is honored; an
/// HTTP-date is treated as absent rather than guessed at, since clock skew
/// between caller and provider makes it unreliable without a date parser.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
	value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Deadline helper: how much of `budget` remains from `started`.
pub fn remaining(started: Instant, budget: Duration) -> Duration {
	budget.saturating_sub(started.elapsed())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classifies_retryable_status_codes() {
		assert_eq!(classify_status(429), ErrorClass::Transient);
		assert_eq!(classify_status(503), ErrorClass::Transient);
		assert_eq!(classify_status(408), ErrorClass::Transient);
		assert_eq!(classify_status(401), ErrorClass::Permanent);
		assert_eq!(classify_status(403), ErrorClass::Permanent);
		assert_eq!(classify_status(404), ErrorClass::Permanent);
	}

	#[test]
	fn backoff_grows_and_caps() {
		let policy = RetryPolicy::default();
		assert_eq!(policy.backoff_for(0), Duration::from_secs(1));
		assert_eq!(policy.backoff_for(1), Duration::from_secs(2));
		assert_eq!(policy.backoff_for(2), Duration::from_secs(4));
		assert_eq!(policy.backoff_for(10), Duration::from_secs(4));
	}

	#[test]
	fn retry_budget_matches_max_attempts() {
		let policy = RetryPolicy::default();
		let mut executor = RetryExecutor::new(&policy);
		assert!(executor.can_retry());
		executor.record_attempt();
		assert!(executor.can_retry());
		executor.record_attempt();
		assert!(!executor.can_retry());
	}

	#[test]
	fn parses_delta_seconds_retry_after() {
		assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
		assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
	}

	#[tokio::test]
	async fn sleep_backoff_waits_the_greater_of_hint_and_computed_delay() {
		let policy = RetryPolicy { initial_backoff: Duration::from_millis(10), ..RetryPolicy::default() };
		let mut executor = RetryExecutor::new(&policy);
		executor.record_attempt();

		let start = Instant::now();
		executor.sleep_backoff(Some(Duration::from_millis(80))).await;
		assert!(start.elapsed() >= Duration::from_millis(75));
	}

	#[tokio::test]
	async fn sleep_backoff_falls_back_to_computed_delay_without_a_hint() {
		let policy = RetryPolicy { initial_backoff: Duration::from_millis(20), ..RetryPolicy::default() };
		let mut executor = RetryExecutor::new(&policy);
		executor.record_attempt();

		let start = Instant::now();
		executor.sleep_backoff(None).await;
		// Full jitter only ever shortens the 20ms computed delay down to 80% of it.
		assert!(start.elapsed() >= Duration::from_millis(12));
	}

	#[test]
	fn jitter_never_exceeds_the_computed_backoff_and_never_drops_below_80_percent() {
		let policy = RetryPolicy { initial_backoff: Duration::from_millis(100), ..RetryPolicy::default() };

		for attempt in 0..5 {
			let computed = policy.backoff_for(attempt);
			for _ in 0..20 {
				let sample = jittered(computed);
				assert!(sample <= computed);
				assert!(sample >= computed.mul_f64(0.8));
			}
		}
	}
}

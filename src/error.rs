//! Crate-wide error types and `Result` alias.

// std
use std::time::Duration;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the enrichment engine.
///
/// Variants map directly onto the error kinds a caller needs to distinguish:
/// missing credentials are a skip, not a failure; transient/permanent split
/// drives retry behaviour; the rest are ambient wrappers for `?`-propagation.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Toml(#[from] toml::de::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	/// Provider required credentials that were not supplied; the provider is
	/// skipped, not treated as a scan failure.
	#[error("Provider '{provider}' is missing required credentials: {missing:?}")]
	CredentialsMissing { provider: String, missing: Vec<String> },
	/// Target string rejected before any provider ran.
	#[error("Target '{target}' is not a valid {type_name}")]
	InvalidTarget { target: String, type_name: &'static str },
	/// Retries were exhausted on a retryable error class.
	#[error(
		"Provider '{provider}' failed for target '{target}' after {attempts} attempt(s): {cause}"
	)]
	Transient { provider: String, target: String, cause: String, attempts: u32 },
	/// Non-retryable provider response.
	#[error("Provider '{provider}' returned a permanent error for target '{target}': {cause}")]
	Permanent { provider: String, target: String, cause: String },
	/// Per-provider deadline was hit.
	#[error("Provider '{provider}' timed out for target '{target}' after {after:?}")]
	ProviderTimeout { provider: String, target: String, after: Duration },
	/// A provider adapter's request returned a non-2xx response; classified
	/// by [`crate::retry::classify_status`], with any `Retry-After` header
	/// preserved for the retry executor to honor over its own backoff.
	#[error("HTTP {status} from provider")]
	Http { status: u16, retry_after: Option<Duration> },
	/// Cooperative cancellation.
	#[error("Scan cancelled: {reason}")]
	Cancelled { reason: String },
	/// Bug-class failure: normalizer crash or validation of core invariants failed.
	#[error("Internal error: {0}")]
	Internal(String),
	/// Cache backend error (never surfaces a miss as an error, only true I/O faults).
	#[error("Cache error: {0}")]
	Cache(String),
	/// An unknown provider name was requested explicitly by the caller.
	#[error("Unknown provider '{0}' requested")]
	UnknownProvider(String),
	/// A field failed structural validation.
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
	/// Metrics recorder installation failed.
	#[cfg(feature = "metrics")]
	#[error("Metrics error: {0}")]
	Metrics(String),
}
#[cfg(feature = "metrics")]
impl<T> From<metrics::SetRecorderError<T>> for Error
where
	T: std::fmt::Display,
{
	fn from(value: metrics::SetRecorderError<T>) -> Self {
		Self::Metrics(value.to_string())
	}
}

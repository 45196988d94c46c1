//! Shared response handling for provider adapters: every adapter decodes a
//! non-2xx response into the same error shape instead of reinventing status
//! classification, so [`crate::retry`] only has to understand one variant.

// crates.io
use reqwest::{Response, header::RETRY_AFTER};
// self
use crate::{
	error::{Error, Result},
	retry::parse_retry_after,
};

/// Pass a successful response through unchanged; turn anything else into a
/// classified [`Error::Http`], preserving a `Retry-After` hint if the
/// provider sent one so the retry executor can honor it over its own
/// computed backoff.
pub async fn ensure_success(response: Response) -> Result<Response> {
	if response.status().is_success() {
		return Ok(response);
	}

	let status = response.status().as_u16();
	let retry_after =
		response.headers().get(RETRY_AFTER).and_then(|value| value.to_str().ok()).and_then(parse_retry_after);

	Err(Error::Http { status, retry_after })
}

#[cfg(test)]
mod tests {
	// crates.io
	use wiremock::{
		Mock, MockServer, ResponseTemplate,
		matchers::{method, path},
	};
	// self
	use super::*;

	#[tokio::test]
	async fn success_response_passes_through() {
		let server = MockServer::start().await;
		Mock::given(method("GET")).and(path("/ok")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

		let response = reqwest::get(format!("{}/ok", server.uri())).await.unwrap();
		assert!(ensure_success(response).await.is_ok());
	}

	#[tokio::test]
	async fn error_status_is_classified_with_no_retry_after() {
		let server = MockServer::start().await;
		Mock::given(method("GET")).and(path("/missing")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

		let response = reqwest::get(format!("{}/missing", server.uri())).await.unwrap();
		let err = ensure_success(response).await.unwrap_err();
		assert!(matches!(err, Error::Http { status: 404, retry_after: None }));
	}

	#[tokio::test]
	async fn retry_after_header_is_extracted() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/throttled"))
			.respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
			.mount(&server)
			.await;

		let response = reqwest::get(format!("{}/throttled", server.uri())).await.unwrap();
		let err = ensure_success(response).await.unwrap_err();
		assert!(matches!(err, Error::Http { status: 429, retry_after: Some(d) } if d == std::time::Duration::from_secs(30)));
	}
}

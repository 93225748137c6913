//! Provider retry logic with exponential backoff.
//!
//! Handles transient failures of idempotent requests: 5xx errors, rate limits
//! (429) and connection issues. Never wrap a deletion in this helper.

use std::future::Future;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::config::RetryConfig;

/// Determines if a reqwest error is retryable.
///
/// Connection errors, timeouts, and other transient issues are retryable.
pub fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect()
        || error.is_timeout()
        || error.is_request()
        // Status errors where we got a response but it was a server error
        || error
            .status()
            .map(|s| s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS)
            .unwrap_or(false)
}

/// Execute an async request with retry logic.
///
/// `make_request` is called for each attempt. A response whose status is in
/// `retryable_status_codes` is retried; any other response is returned as-is,
/// so callers still check the status themselves.
///
/// Returns the last response or error once retries are exhausted.
pub async fn with_retry<F, Fut>(
    config: &RetryConfig,
    operation: &str,
    make_request: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    if !config.enabled {
        return make_request().await;
    }

    let max_attempts = config.max_retries + 1; // +1 for initial attempt
    let mut attempt = 0;

    loop {
        let last_attempt = attempt + 1 >= max_attempts;

        match make_request().await {
            Ok(response) => {
                let status = response.status();

                if config.should_retry_status(status.as_u16()) && !last_attempt {
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        status = %status,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis(),
                        "Retryable status code, will retry after delay"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                if attempt > 0 {
                    debug!(
                        operation,
                        status = %status,
                        attempt = attempt + 1,
                        "Request completed after retry"
                    );
                }

                return Ok(response);
            }
            Err(error) => {
                if is_retryable_error(&error) && !last_attempt {
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        error = %error,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis(),
                        "Retryable error, will retry after delay"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                if attempt > 0 {
                    warn!(
                        operation,
                        error = %error,
                        attempts = attempt + 1,
                        "Request failed after all retry attempts"
                    );
                }

                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            jitter: 0.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_retries_retryable_status_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/list", server.uri());
        let response = with_retry(&fast_retry(3), "list", || client.get(&url).send())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = server.uri();
        let response = with_retry(&fast_retry(2), "list", || client.get(&url).send())
            .await
            .unwrap();
        assert_eq!(response.status(), 500);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = server.uri();
        let response = with_retry(&fast_retry(3), "list", || client.get(&url).send())
            .await
            .unwrap();
        assert_eq!(response.status(), 403);
    }

    #[tokio::test]
    async fn test_disabled_makes_single_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = server.uri();
        let response = with_retry(&RetryConfig::disabled(), "list", || client.get(&url).send())
            .await
            .unwrap();
        assert_eq!(response.status(), 503);
    }
}

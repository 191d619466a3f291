//! HTTP transport collaborator.
//!
//! Adapters never talk to `reqwest` directly: they hold a [`Transport`]
//! trait object, which doubles as the session handle used to follow
//! pagination URLs. Production code uses [`ReqwestTransport`]; tests script
//! responses with an in-memory implementation.

use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde_json::Value;

use crate::errors::{MarketDataError, RetryClass};

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default retry budget for transient errors (attempts = retries + 1).
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Base delay for the exponential retry backoff.
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(250);

/// A GET-and-decode session capable of issuing follow-up requests.
///
/// Implementations own connection pooling, timeout enforcement, and
/// retry-on-transient-failure; callers see only decoded JSON or a
/// classified error.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a GET request and decode the JSON body.
    async fn get_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<Value, MarketDataError>;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    provider: &'static str,
    max_retries: u32,
    backoff_base: Duration,
}

impl ReqwestTransport {
    /// Create a transport whose errors are labeled with the given provider.
    pub fn new(provider: &'static str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            provider,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }

    /// Override the retry budget and backoff base.
    pub fn with_retries(mut self, max_retries: u32, backoff_base: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff_base = backoff_base;
        self
    }

    async fn get_once(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<Value, MarketDataError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: self.provider.to_string(),
                }
            } else {
                MarketDataError::Network(e)
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: self.provider.to_string(),
            });
        }

        if !status.is_success() {
            return Err(MarketDataError::ProviderError {
                provider: self.provider.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| MarketDataError::ProviderError {
                provider: self.provider.to_string(),
                message: format!("Failed to parse response: {}", e),
            })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<Value, MarketDataError> {
        let mut attempt = 0;
        loop {
            match self.get_once(url, headers).await {
                Ok(value) => return Ok(value),
                Err(error) if should_retry(&error, attempt, self.max_retries) => {
                    let delay = backoff_delay(self.backoff_base, attempt);
                    warn!(
                        "{}: transient error ({}), retrying in {:?}",
                        self.provider, error, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Whether the transport should retry after this error.
fn should_retry(error: &MarketDataError, attempt: u32, max_retries: u32) -> bool {
    error.retry_class() == RetryClass::WithBackoff && attempt < max_retries
}

/// Exponential backoff: `base * 2^attempt`.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_transient_errors_within_budget() {
        let rate_limited = MarketDataError::RateLimited {
            provider: "POLYGON".to_string(),
        };
        assert!(should_retry(&rate_limited, 0, 2));
        assert!(should_retry(&rate_limited, 1, 2));
        assert!(!should_retry(&rate_limited, 2, 2));

        let timeout = MarketDataError::Timeout {
            provider: "POLYGON".to_string(),
        };
        assert!(should_retry(&timeout, 0, 2));
    }

    #[test]
    fn test_never_retries_terminal_or_symbol_local_errors() {
        let provider_error = MarketDataError::ProviderError {
            provider: "POLYGON".to_string(),
            message: "HTTP 500".to_string(),
        };
        assert!(!should_retry(&provider_error, 0, 2));

        let missing = MarketDataError::MissingCredential {
            key: "polygon_api_key".to_string(),
        };
        assert!(!should_retry(&missing, 0, 2));
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let base = Duration::from_millis(250);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(250));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(1000));
    }
}

//! Error types and retry classification for the market data pipeline.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all pipeline operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur during market data pipeline operations.
///
/// Each variant is classified into a [`RetryClass`] via the
/// [`retry_class`](Self::retry_class) method, which determines how the
/// transport and the request executor should handle the error.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The interval token could not be parsed.
    /// Raised before any network call is made.
    #[error("Invalid interval '{token}': {reason}")]
    InvalidInterval {
        /// The offending interval token
        token: String,
        /// Why the token was rejected
        reason: String,
    },

    /// The query fields failed validation (empty symbol, zero limit,
    /// inverted date range). Raised before any network call is made.
    #[error("Invalid query: {message}")]
    InvalidQuery {
        /// Description of the validation failure
        message: String,
    },

    /// A required API credential is absent from the credential store.
    /// Raised at extraction start.
    #[error("Missing credential: {key}")]
    MissingCredential {
        /// The name of the missing key
        key: String,
    },

    /// The transformed result sequence is empty.
    ///
    /// This is the pipeline's single terminal failure signal: it is raised
    /// after the full pipeline completes, whether the vendor returned
    /// nothing or every row was rejected during transformation.
    #[error("No data returned for the request")]
    EmptyData,

    /// The pagination loop for a symbol exceeded the configured page cap.
    /// A vendor returning continuation tokens past the cap is misbehaving.
    #[error("Pagination limit exceeded for '{symbol}' after {max_pages} pages")]
    PaginationLimitExceeded {
        /// The symbol whose pagination never terminated
        symbol: String,
        /// The configured per-symbol page cap
        max_pages: usize,
    },

    /// No adapter is registered for the requested provider and asset kind.
    #[error("Provider not registered: {provider}")]
    ProviderNotRegistered {
        /// The requested provider identifier
        provider: String,
    },

    /// A row failed required-field validation under a fail-fast row policy.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// The provider rate limited the request (HTTP 429).
    /// Retried with backoff by the transport.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    /// Retried with backoff by the transport.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// A provider-specific error occurred (vendor error body, unexpected
    /// payload shape, non-success HTTP status).
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// - [`RetryClass::Never`]: terminal, aborts the whole fetch
    /// - [`RetryClass::WithBackoff`]: transient, the transport retries it
    /// - [`RetryClass::SkipSymbol`]: the affected symbol contributes zero
    ///   rows, sibling symbol tasks continue
    ///
    /// # Examples
    ///
    /// ```
    /// use tickbridge_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "POLYGON".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::EmptyData;
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Terminal errors - abort the batch
            Self::InvalidInterval { .. }
            | Self::InvalidQuery { .. }
            | Self::MissingCredential { .. }
            | Self::EmptyData
            | Self::PaginationLimitExceeded { .. }
            | Self::ProviderNotRegistered { .. }
            | Self::ValidationFailed { .. } => RetryClass::Never,

            // Transient errors - retry with backoff
            Self::RateLimited { .. } | Self::Timeout { .. } => RetryClass::WithBackoff,

            // Symbol-local failures - warn and continue with other symbols
            Self::ProviderError { .. } | Self::Network(_) => RetryClass::SkipSymbol,
        }
    }
}

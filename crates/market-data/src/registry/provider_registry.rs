//! Vendor adapter registration and dispatch.
//!
//! The registry maps provider identifiers onto registered adapters,
//! filters by declared capabilities, and applies per-provider rate
//! limiting before dispatching a fetch.

use std::sync::Arc;

use log::{debug, info};

use crate::credentials::CredentialStore;
use crate::errors::MarketDataError;
use crate::models::{Bar, HistoricalQuery};
use crate::provider::{AssetKind, HistoricalPriceProvider};

use super::RateLimiter;

/// Registry of vendor adapters, looked up by identifier and asset kind.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn HistoricalPriceProvider>>,
    rate_limiter: RateLimiter,
}

impl ProviderRegistry {
    /// Create a registry over a set of adapters.
    ///
    /// Each adapter's rate limiter bucket is seeded from its declared
    /// [`rate_limit`](HistoricalPriceProvider::rate_limit).
    pub fn new(providers: Vec<Arc<dyn HistoricalPriceProvider>>) -> Self {
        let rate_limiter = RateLimiter::new();
        for provider in &providers {
            rate_limiter.configure(provider.id(), &provider.rate_limit());
        }
        Self {
            providers,
            rate_limiter,
        }
    }

    /// Register an additional adapter.
    pub fn register(&mut self, provider: Arc<dyn HistoricalPriceProvider>) {
        self.rate_limiter
            .configure(provider.id(), &provider.rate_limit());
        self.providers.push(provider);
    }

    /// Look up the adapter registered for a provider identifier and asset
    /// kind.
    ///
    /// # Errors
    ///
    /// Returns [`MarketDataError::ProviderNotRegistered`] when no adapter
    /// matches.
    pub fn get(
        &self,
        provider: &str,
        kind: AssetKind,
    ) -> Result<&Arc<dyn HistoricalPriceProvider>, MarketDataError> {
        self.providers
            .iter()
            .find(|candidate| {
                let capabilities = candidate.capabilities();
                candidate.id() == provider
                    && capabilities.supports(kind)
                    && capabilities.supports_historical
            })
            .ok_or_else(|| MarketDataError::ProviderNotRegistered {
                provider: provider.to_string(),
            })
    }

    /// The registered adapters.
    pub fn providers(&self) -> &[Arc<dyn HistoricalPriceProvider>] {
        &self.providers
    }

    /// Fetch historical bars through the registered adapter.
    ///
    /// Acquires one rate limiter token per logical request, then runs the
    /// adapter's three-stage pipeline.
    pub async fn fetch_historical(
        &self,
        provider: &str,
        kind: AssetKind,
        query: HistoricalQuery,
        credentials: &CredentialStore,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let adapter = self.get(provider, kind)?;

        self.rate_limiter.acquire(adapter.id()).await;
        debug!(
            "Dispatching '{}' fetch for '{}'",
            adapter.id(),
            query.symbol
        );

        let bars = adapter.fetch(query, credentials).await?;
        info!("Fetched {} bars from '{}'", bars.len(), adapter.id());
        Ok(bars)
    }
}

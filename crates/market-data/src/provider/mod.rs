//! Vendor adapter contract.
//!
//! Every vendor implements [`HistoricalPriceProvider`]: three capability
//! points (query normalization, paginated extraction, record
//! transformation) composed by the provided `fetch` method into the fixed
//! three-stage pipeline. Adapters hold their vendor specifics - an alias
//! map, a query profile, a page parser - rather than overriding pipeline
//! behavior.

pub mod capabilities;
pub mod marketdata_app;
pub mod polygon;

pub use capabilities::{AssetKind, ProviderCapabilities, RateLimit};

use async_trait::async_trait;
use serde_json::Value;

use crate::credentials::CredentialStore;
use crate::errors::MarketDataError;
use crate::models::{Bar, HistoricalQuery, NormalizedQuery, QueryProfile};

/// Trait for historical price vendor adapters.
///
/// Implement this trait to add support for a new market data vendor.
/// The registry uses the adapter's identifier and capabilities to route
/// requests to it.
#[async_trait]
pub trait HistoricalPriceProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "POLYGON", "MARKETDATA_APP", etc.
    /// Used for logging, credential naming, and registry lookup.
    fn id(&self) -> &'static str;

    /// Describes what this adapter can serve.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Rate limiting configuration applied by the registry.
    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    /// Vendor-specific query normalization defaults.
    fn query_profile(&self) -> QueryProfile {
        QueryProfile::default()
    }

    /// Stage 1: turn raw user input into a fully-derived, vendor-ready
    /// query.
    ///
    /// The default applies the adapter's [`query_profile`]; adapters
    /// override this only to layer vendor checks on top (e.g. rejecting
    /// granularities the vendor cannot serve).
    ///
    /// [`query_profile`]: HistoricalPriceProvider::query_profile
    fn normalize_query(&self, raw: HistoricalQuery) -> Result<NormalizedQuery, MarketDataError> {
        raw.normalize(&self.query_profile())
    }

    /// Stage 2: retrieve all raw result rows for the query.
    ///
    /// Implementations fan out one task per requested symbol, follow the
    /// vendor's pagination, normalize timestamps, and stamp rows with their
    /// originating symbol on multi-symbol queries.
    ///
    /// # Errors
    ///
    /// Returns [`MarketDataError::MissingCredential`] when the vendor's
    /// required API key is absent. Per-symbol vendor failures degrade to
    /// zero rows for that symbol.
    async fn extract(
        &self,
        query: &NormalizedQuery,
        credentials: &CredentialStore,
    ) -> Result<Vec<Value>, MarketDataError>;

    /// Stage 3: map aggregated raw rows onto the canonical bar schema.
    ///
    /// # Errors
    ///
    /// Returns [`MarketDataError::EmptyData`] when the transformed sequence
    /// is empty.
    fn transform(
        &self,
        query: &NormalizedQuery,
        rows: Vec<Value>,
    ) -> Result<Vec<Bar>, MarketDataError>;

    /// Run the fixed three-stage pipeline for one logical request.
    async fn fetch(
        &self,
        raw: HistoricalQuery,
        credentials: &CredentialStore,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let query = self.normalize_query(raw)?;
        let rows = self.extract(&query, credentials).await?;
        self.transform(&query, rows)
    }
}

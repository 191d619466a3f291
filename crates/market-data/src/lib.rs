//! Tickbridge Market Data Crate
//!
//! This crate provides a vendor-agnostic pipeline for fetching historical
//! market data (equity and crypto OHLCV bars) and normalizing it into a
//! single canonical schema.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Multiple asset kinds: equities and crypto pairs
//! - Multiple vendors: Polygon, MarketData.app, and custom adapters
//! - Cursor-based pagination with a configurable page cap
//! - Concurrent multi-symbol fetching with bounded fan-out
//! - Per-provider rate limiting
//!
//! # Architecture
//!
//! Every fetch runs the same fixed three-stage pipeline; vendors differ
//! only in the adaptation data their adapter holds (alias map, query
//! profile, page parser):
//!
//! ```text
//! +------------------+
//! | HistoricalQuery  |  (raw user input)
//! +------------------+
//!          |
//!          v  normalize_query
//! +------------------+
//! | NormalizedQuery  |  (derived multiplier/unit, dates, limit)
//! +------------------+
//!          |
//!          v  extract (per-symbol tasks, pagination, timestamps)
//! +------------------+
//! |    raw rows      |  (vendor-keyed JSON objects)
//! +------------------+
//!          |
//!          v  transform (alias map, coercion, validation)
//! +------------------+
//! |    Vec<Bar>      |  (canonical OHLCV records)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`HistoricalQuery`] / [`NormalizedQuery`] - Two-phase query model
//! - [`Bar`] / [`BarDate`] - Canonical OHLCV record
//! - [`HistoricalPriceProvider`] - Vendor adapter contract
//! - [`Transport`] - HTTP collaborator and pagination session handle
//! - [`CredentialStore`] - Named API keys supplied by the host
//! - [`ProviderRegistry`] - Adapter registration and rate-limited dispatch

pub mod credentials;
pub mod errors;
pub mod executor;
pub mod models;
pub mod normalize;
pub mod provider;
pub mod registry;
pub mod transport;

// Re-export all public types from models
pub use models::{
    Bar, BarDate, EpochUnit, HistoricalQuery, Interval, IntervalUnit, NormalizedQuery,
    QueryProfile, SortOrder,
};

// Re-export pipeline types
pub use credentials::CredentialStore;
pub use errors::{MarketDataError, RetryClass};
pub use executor::{FetchPolicy, PageParser, PageRequest, ParsedPage, SymbolRows};
pub use normalize::{AliasMap, RowPolicy};
pub use transport::{ReqwestTransport, Transport};

// Re-export provider types
pub use provider::marketdata_app::MarketDataAppProvider;
pub use provider::polygon::PolygonProvider;
pub use provider::{AssetKind, HistoricalPriceProvider, ProviderCapabilities, RateLimit};

// Re-export registry types
pub use registry::{ProviderRegistry, RateLimiter};

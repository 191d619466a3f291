//! Provider capabilities and rate limiting configuration.
//!
//! This module defines structures for describing what a vendor adapter
//! can serve and how aggressively it may be called.

use std::time::Duration;

/// Asset classes a vendor adapter can serve.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AssetKind {
    Equity,
    Crypto,
}

/// Describes the capabilities of a vendor adapter.
///
/// Used by the registry to pick the adapter registered for a provider
/// identifier and asset kind.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Asset kinds this adapter serves.
    pub asset_kinds: &'static [AssetKind],

    /// Whether the adapter supports historical bar fetching.
    pub supports_historical: bool,
}

impl ProviderCapabilities {
    pub fn supports(&self, kind: AssetKind) -> bool {
        self.asset_kinds.contains(&kind)
    }
}

/// Rate limiting configuration declared by a vendor adapter.
///
/// The registry seeds each provider's token bucket from this at
/// registration time.
#[derive(Clone, Debug)]
pub struct RateLimit {
    /// Sustained request budget per minute.
    pub requests_per_minute: u32,

    /// Concurrent requests allowed against this provider; doubles as the
    /// token bucket's burst capacity.
    pub max_concurrency: usize,

    /// Minimum spacing between consecutive requests.
    pub min_delay: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            max_concurrency: 5,
            min_delay: Duration::from_millis(100),
        }
    }
}

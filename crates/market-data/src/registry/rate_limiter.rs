//! Token bucket rate limiter for vendor adapters.
//!
//! Each provider gets its own bucket, seeded from the adapter's declared
//! [`RateLimit`] when it is registered: the refill rate comes from
//! `requests_per_minute` and the burst capacity from `max_concurrency`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::provider::RateLimit;

/// Token bucket for a single provider.
#[derive(Debug)]
struct Bucket {
    /// Current number of available tokens.
    tokens: f64,
    /// Token refill rate (tokens per second).
    rate: f64,
    /// Maximum bucket capacity.
    capacity: f64,
    /// Last time the bucket was refilled.
    last_refill: Instant,
}

impl Bucket {
    fn from_limit(limit: &RateLimit) -> Self {
        let capacity = limit.max_concurrency.max(1) as f64;
        Self {
            tokens: capacity,
            rate: f64::from(limit.requests_per_minute) / 60.0,
            capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
    }

    fn take(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until the next token becomes available.
    fn eta(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

/// Per-provider token bucket rate limiter.
///
/// Thread-safe; buckets for providers that were never configured are
/// created on demand from [`RateLimit::default`].
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the buckets mutex, recovering from poison if necessary.
    ///
    /// The worst case of recovering is slightly incorrect rate limiting,
    /// which beats panicking.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Seed (or reset) a provider's bucket from its declared limits.
    pub fn configure(&self, provider: &str, limit: &RateLimit) {
        self.lock()
            .insert(provider.to_string(), Bucket::from_limit(limit));
    }

    /// Acquire a token for the given provider, waiting if none is
    /// available.
    pub async fn acquire(&self, provider: &str) {
        loop {
            let wait = {
                let mut buckets = self.lock();
                let bucket = buckets
                    .entry(provider.to_string())
                    .or_insert_with(|| Bucket::from_limit(&RateLimit::default()));

                if bucket.take() {
                    debug!("Rate limiter: acquired token for '{}'", provider);
                    return;
                }
                bucket.eta()
            };

            if wait > Duration::ZERO {
                debug!("Rate limiter: waiting {:?} for '{}'", wait, provider);
                tokio::time::sleep(wait).await;
            }
        }
    }

    /// Try to acquire a token without waiting.
    pub fn try_acquire(&self, provider: &str) -> bool {
        let mut buckets = self.lock();
        buckets
            .entry(provider.to_string())
            .or_insert_with(|| Bucket::from_limit(&RateLimit::default()))
            .take()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

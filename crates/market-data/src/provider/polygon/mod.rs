//! Polygon.io provider implementation.
//!
//! This provider fetches historical OHLCV bars from the Polygon aggregates
//! API. It supports equities and crypto pairs with API-key authentication.
//!
//! # API Endpoint
//!
//! `https://api.polygon.io/v2/aggs/ticker/{ticker}/range/{multiplier}/{timespan}/{from}/{to}`
//! with `sort`, `limit`, and `apiKey` query parameters.
//!
//! # Response Format
//!
//! Result rows live under `results` with single-letter keys
//! (t/o/h/l/c/v/vw/n); timestamps are epoch milliseconds. Large responses
//! are cursor-paginated via `next_url`, which comes back without the API
//! key. Crypto tickers are prefixed `X:` and must not contain the `-`
//! separator ("BTC-USD" becomes "X:BTCUSD").

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};

use crate::credentials::CredentialStore;
use crate::errors::MarketDataError;
use crate::executor::{collect_rows, FetchPolicy, PageParser, PageRequest, ParsedPage};
use crate::models::{Bar, EpochUnit, NormalizedQuery, QueryProfile};
use crate::normalize::{bars_from_rows, stamp_timestamp, AliasMap, RowPolicy};
use crate::provider::{AssetKind, HistoricalPriceProvider, ProviderCapabilities, RateLimit};
use crate::transport::{ReqwestTransport, Transport};

const BASE_URL: &str = "https://api.polygon.io";
const PROVIDER_ID: &str = "POLYGON";
const API_KEY_NAME: &str = "polygon_api_key";

/// Ticker prefix for crypto pairs, stripped again when tagging rows.
const CRYPTO_PREFIX: &str = "X:";

/// Canonical field names to Polygon aggregate keys.
const ALIASES: AliasMap = AliasMap::new(&[
    ("date", "t"),
    ("open", "o"),
    ("high", "h"),
    ("low", "l"),
    ("close", "c"),
    ("volume", "v"),
    ("vwap", "vw"),
    ("transactions", "n"),
]);

const EQUITY_KINDS: &[AssetKind] = &[AssetKind::Equity];
const CRYPTO_KINDS: &[AssetKind] = &[AssetKind::Crypto];

/// Polygon provider for fetching historical equity or crypto bars.
///
/// # Example
///
/// ```ignore
/// let provider = PolygonProvider::crypto();
/// let credentials = CredentialStore::from([("polygon_api_key", "...")]);
/// let bars = provider
///     .fetch(HistoricalQuery::new("BTC-USD,ETH-USD"), &credentials)
///     .await?;
/// ```
pub struct PolygonProvider {
    transport: Arc<dyn Transport>,
    asset_kind: AssetKind,
    policy: FetchPolicy,
}

impl PolygonProvider {
    /// Create an equity adapter with the production transport.
    pub fn equity() -> Self {
        Self::with_transport(AssetKind::Equity, Arc::new(ReqwestTransport::new(PROVIDER_ID)))
    }

    /// Create a crypto adapter with the production transport.
    pub fn crypto() -> Self {
        Self::with_transport(AssetKind::Crypto, Arc::new(ReqwestTransport::new(PROVIDER_ID)))
    }

    /// Create an adapter over a custom transport.
    pub fn with_transport(asset_kind: AssetKind, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            asset_kind,
            policy: FetchPolicy::default(),
        }
    }

    /// Override the fan-out and pagination bounds.
    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The ticker form Polygon expects in the URL path.
    fn vendor_symbol(&self, symbol: &str) -> String {
        match self.asset_kind {
            AssetKind::Equity => symbol.to_string(),
            AssetKind::Crypto => format!("{}{}", CRYPTO_PREFIX, symbol),
        }
    }

    fn range_url(&self, query: &NormalizedQuery, symbol: &str, api_key: &str) -> String {
        format!(
            "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}?sort={}&limit={}&apiKey={}",
            BASE_URL,
            urlencoding::encode(&self.vendor_symbol(symbol)),
            query.interval.multiplier,
            query.interval.unit.as_str(),
            query.start_date,
            query.end_date,
            query.sort.as_str(),
            query.limit,
            api_key,
        )
    }
}

/// Paging behavior for the aggregates endpoint.
struct PolygonPageParser {
    api_key: String,
}

impl PageParser for PolygonPageParser {
    fn parse_page(&self, payload: &Value) -> Result<ParsedPage, MarketDataError> {
        if let Some(status) = payload.get("status").and_then(Value::as_str) {
            if status.eq_ignore_ascii_case("error") || status.eq_ignore_ascii_case("not_authorized")
            {
                let message = payload
                    .get("error")
                    .or_else(|| payload.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("unspecified error");
                return Err(MarketDataError::ProviderError {
                    provider: PROVIDER_ID.to_string(),
                    message: message.to_string(),
                });
            }
        }

        Ok(ParsedPage {
            rows: payload
                .get("results")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            next_url: payload
                .get("next_url")
                .and_then(Value::as_str)
                .map(String::from),
        })
    }

    // Polygon drops the API key from its continuation URLs.
    fn follow_url(&self, next_url: &str) -> String {
        format!("{}&apiKey={}", next_url, self.api_key)
    }
}

#[async_trait]
impl HistoricalPriceProvider for PolygonProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            asset_kinds: match self.asset_kind {
                AssetKind::Equity => EQUITY_KINDS,
                AssetKind::Crypto => CRYPTO_KINDS,
            },
            supports_historical: true,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 5, // Free tier is very limited
            max_concurrency: 5,
            min_delay: std::time::Duration::from_secs(12),
        }
    }

    fn query_profile(&self) -> QueryProfile {
        QueryProfile {
            // Crypto pairs arrive as "BTC-USD"; Polygon wants "BTCUSD".
            strip_characters: match self.asset_kind {
                AssetKind::Equity => &[],
                AssetKind::Crypto => &['-'],
            },
            ..QueryProfile::default()
        }
    }

    async fn extract(
        &self,
        query: &NormalizedQuery,
        credentials: &CredentialStore,
    ) -> Result<Vec<Value>, MarketDataError> {
        let api_key = credentials.get_required(API_KEY_NAME)?;

        let requests: Vec<PageRequest> = query
            .symbols()
            .into_iter()
            .map(|symbol| {
                let url = self.range_url(query, symbol, api_key);
                debug!("Polygon request: {}", url.replace(api_key, "***"));
                PageRequest {
                    symbol: symbol.to_string(),
                    url,
                }
            })
            .collect();

        let parser = PolygonPageParser {
            api_key: api_key.to_string(),
        };
        let collected = collect_rows(
            self.transport.as_ref(),
            &parser,
            requests,
            &[],
            &self.policy,
        )
        .await?;

        let multi_symbol = query.is_multi_symbol();
        let mut rows = Vec::new();
        for symbol_rows in collected {
            for mut row in symbol_rows.rows {
                stamp_timestamp(&mut row, "t", EpochUnit::Millis, query.interval.unit);
                if multi_symbol {
                    if let Some(fields) = row.as_object_mut() {
                        fields.insert("symbol".to_string(), json!(symbol_rows.symbol));
                    }
                }
                rows.push(row);
            }
        }

        Ok(rows)
    }

    fn transform(
        &self,
        _query: &NormalizedQuery,
        rows: Vec<Value>,
    ) -> Result<Vec<Bar>, MarketDataError> {
        bars_from_rows(&ALIASES, &rows, RowPolicy::DropInvalid)
    }
}

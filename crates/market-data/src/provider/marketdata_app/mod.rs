//! MarketData.app provider implementation.
//!
//! This provider fetches historical candles from the MarketData.app API.
//! It supports equities only with Bearer token authentication.
//!
//! # API Endpoint
//!
//! `https://api.marketdata.app/v1/stocks/candles/{resolution}/{symbol}?from={start_date}&to={end_date}`
//!
//! # Response Format
//!
//! The API returns parallel arrays for OHLCV data with a status field `s`
//! indicating success ("ok"), absence of data ("no_data"), or an error.
//! Timestamps are epoch seconds and responses are not paginated. The
//! resolution path segment uses the vendor's own vocabulary ("D", "W",
//! "5", "1H", ...) rather than the canonical unit names.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};

use crate::credentials::CredentialStore;
use crate::errors::MarketDataError;
use crate::executor::{collect_rows, FetchPolicy, PageParser, PageRequest, ParsedPage};
use crate::models::{
    Bar, EpochUnit, HistoricalQuery, Interval, IntervalUnit, NormalizedQuery, SortOrder,
};
use crate::normalize::{bars_from_rows, stamp_timestamp, AliasMap, RowPolicy};
use crate::provider::{AssetKind, HistoricalPriceProvider, ProviderCapabilities, RateLimit};
use crate::transport::{ReqwestTransport, Transport};

const BASE_URL: &str = "https://api.marketdata.app/v1";
const PROVIDER_ID: &str = "MARKETDATA_APP";
const API_KEY_NAME: &str = "marketdata_app_api_key";

/// Canonical field names to candle array keys.
const ALIASES: AliasMap = AliasMap::new(&[
    ("date", "t"),
    ("open", "o"),
    ("high", "h"),
    ("low", "l"),
    ("close", "c"),
    ("volume", "v"),
]);

/// Resolution tokens by canonical unit. Minutely resolutions are bare
/// numbers ("1", "5", "15"); the rest prefix the multiplier to a letter.
/// Second and quarter granularities have no vendor equivalent.
const RESOLUTION_VOCABULARY: &[(IntervalUnit, &str)] = &[
    (IntervalUnit::Minute, ""),
    (IntervalUnit::Hour, "H"),
    (IntervalUnit::Day, "D"),
    (IntervalUnit::Week, "W"),
    (IntervalUnit::Month, "M"),
    (IntervalUnit::Year, "Y"),
];

const EQUITY_KINDS: &[AssetKind] = &[AssetKind::Equity];

/// Map a canonical interval onto the vendor's resolution vocabulary.
fn resolution(interval: Interval) -> Option<String> {
    let (_, token) = RESOLUTION_VOCABULARY
        .iter()
        .find(|(unit, _)| *unit == interval.unit)?;

    if token.is_empty() {
        Some(interval.multiplier.to_string())
    } else if interval.multiplier == 1 {
        Some((*token).to_string())
    } else {
        Some(format!("{}{}", interval.multiplier, token))
    }
}

/// MarketData.app provider for fetching historical equity candles.
pub struct MarketDataAppProvider {
    transport: Arc<dyn Transport>,
    policy: FetchPolicy,
}

impl Default for MarketDataAppProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketDataAppProvider {
    /// Create an adapter with the production transport.
    pub fn new() -> Self {
        Self::with_transport(Arc::new(ReqwestTransport::new(PROVIDER_ID)))
    }

    /// Create an adapter over a custom transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            policy: FetchPolicy::default(),
        }
    }

    /// Override the fan-out and pagination bounds.
    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn candles_url(&self, query: &NormalizedQuery, resolution: &str, symbol: &str) -> String {
        format!(
            "{}/stocks/candles/{}/{}?from={}&to={}",
            BASE_URL,
            resolution,
            urlencoding::encode(symbol),
            query.start_date,
            query.end_date,
        )
    }
}

/// Paging behavior for the candles endpoint: single page, parallel arrays
/// re-rowed into per-bucket objects.
struct CandlesPageParser;

impl PageParser for CandlesPageParser {
    fn parse_page(&self, payload: &Value) -> Result<ParsedPage, MarketDataError> {
        let status = payload
            .get("s")
            .and_then(Value::as_str)
            .unwrap_or("missing status");

        if status == "no_data" {
            return Ok(ParsedPage::default());
        }
        if status != "ok" {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("API returned status: {}", status),
            });
        }

        let series = |key: &str| payload.get(key).and_then(Value::as_array).cloned();
        let closes = series("c").unwrap_or_default();
        let opens = series("o").unwrap_or_default();
        let highs = series("h").unwrap_or_default();
        let lows = series("l").unwrap_or_default();
        let volumes = series("v").unwrap_or_default();
        let timestamps = series("t").unwrap_or_default();

        let rows = closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                json!({
                    "t": timestamps.get(i).cloned().unwrap_or(Value::Null),
                    "o": opens.get(i).cloned().unwrap_or(Value::Null),
                    "h": highs.get(i).cloned().unwrap_or(Value::Null),
                    "l": lows.get(i).cloned().unwrap_or(Value::Null),
                    "c": close.clone(),
                    "v": volumes.get(i).cloned().unwrap_or(Value::Null),
                })
            })
            .collect();

        Ok(ParsedPage {
            rows,
            next_url: None,
        })
    }
}

#[async_trait]
impl HistoricalPriceProvider for MarketDataAppProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            asset_kinds: EQUITY_KINDS,
            supports_historical: true,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 100,
            max_concurrency: 10,
            min_delay: std::time::Duration::from_millis(100),
        }
    }

    fn normalize_query(&self, raw: HistoricalQuery) -> Result<NormalizedQuery, MarketDataError> {
        let query = raw.normalize(&self.query_profile())?;
        if resolution(query.interval).is_none() {
            return Err(MarketDataError::InvalidQuery {
                message: format!(
                    "{} has no resolution for '{}' intervals",
                    PROVIDER_ID,
                    query.interval.unit.as_str()
                ),
            });
        }
        Ok(query)
    }

    async fn extract(
        &self,
        query: &NormalizedQuery,
        credentials: &CredentialStore,
    ) -> Result<Vec<Value>, MarketDataError> {
        let token = credentials.get_required(API_KEY_NAME)?;
        let authorization = format!("Bearer {}", token);
        let headers = [("Authorization", authorization.as_str())];

        let resolution = resolution(query.interval).ok_or_else(|| {
            MarketDataError::InvalidQuery {
                message: format!(
                    "{} has no resolution for '{}' intervals",
                    PROVIDER_ID,
                    query.interval.unit.as_str()
                ),
            }
        })?;

        let requests: Vec<PageRequest> = query
            .symbols()
            .into_iter()
            .map(|symbol| {
                let url = self.candles_url(query, &resolution, symbol);
                debug!("MarketData.app request: {}", url);
                PageRequest {
                    symbol: symbol.to_string(),
                    url,
                }
            })
            .collect();

        let collected = collect_rows(
            self.transport.as_ref(),
            &CandlesPageParser,
            requests,
            &headers,
            &self.policy,
        )
        .await?;

        let multi_symbol = query.is_multi_symbol();
        let mut rows = Vec::new();
        for symbol_rows in collected {
            for mut row in symbol_rows.rows {
                stamp_timestamp(&mut row, "t", EpochUnit::Seconds, query.interval.unit);
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
        query: &NormalizedQuery,
        rows: Vec<Value>,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let mut bars = bars_from_rows(&ALIASES, &rows, RowPolicy::DropInvalid)?;

        // The candles endpoint has no sort parameter; honor the requested
        // order here instead.
        match query.sort {
            SortOrder::Asc => bars.sort_by(|a, b| a.date.cmp(&b.date)),
            SortOrder::Desc => bars.sort_by(|a, b| b.date.cmp(&a.date)),
        }

        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Mutex;

    type HeaderPairs = Vec<(String, String)>;

    /// Transport serving canned payloads by URL, recording requests and
    /// the headers they carried.
    struct RecordingTransport {
        pages: HashMap<String, Value>,
        requests: Mutex<Vec<(String, HeaderPairs)>>,
    }

    impl RecordingTransport {
        fn new(pages: Vec<(String, Value)>) -> Self {
            Self {
                pages: pages.into_iter().collect(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn recorded(&self) -> Vec<(String, HeaderPairs)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn get_json(
            &self,
            url: &str,
            headers: &[(&str, &str)],
        ) -> Result<Value, MarketDataError> {
            let pairs = headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.requests.lock().unwrap().push((url.to_string(), pairs));
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| MarketDataError::ProviderError {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("no scripted response for {}", url),
                })
        }
    }

    fn dated_query(symbol: &str) -> HistoricalQuery {
        HistoricalQuery::new(symbol).with_dates(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    // 2024-01-02T00:00:00Z and the following day, in epoch seconds
    const JAN_2: i64 = 1_704_153_600;
    const JAN_3: i64 = 1_704_240_000;

    fn candles() -> Value {
        json!({
            "s": "ok",
            "o": [145.0, 146.0],
            "h": [150.0, 151.0],
            "l": [144.0, 145.0],
            "c": [148.0, 149.0],
            "v": [1_000_000.0, 1_100_000.0],
            "t": [JAN_2, JAN_3]
        })
    }

    #[test]
    fn test_resolution_vocabulary() {
        let parse = |token: &str| token.parse::<Interval>().unwrap();
        assert_eq!(resolution(parse("1d")).as_deref(), Some("D"));
        assert_eq!(resolution(parse("1W")).as_deref(), Some("W"));
        assert_eq!(resolution(parse("2W")).as_deref(), Some("2W"));
        assert_eq!(resolution(parse("1h")).as_deref(), Some("H"));
        assert_eq!(resolution(parse("5m")).as_deref(), Some("5"));
        assert_eq!(resolution(parse("1Y")).as_deref(), Some("Y"));
        assert_eq!(resolution(parse("1s")), None);
        assert_eq!(resolution(parse("1Q")), None);
    }

    #[test]
    fn test_normalize_query_rejects_unsupported_granularity() {
        let provider = MarketDataAppProvider::new();
        let err = provider
            .normalize_query(dated_query("AAPL").with_interval("30s"))
            .unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidQuery { .. }));
    }

    #[test]
    fn test_candles_url() {
        let provider = MarketDataAppProvider::new();
        let query = provider.normalize_query(dated_query("aapl")).unwrap();
        assert_eq!(
            provider.candles_url(&query, "D", "AAPL"),
            "https://api.marketdata.app/v1/stocks/candles/D/AAPL?from=2024-01-01&to=2024-01-31"
        );
    }

    #[test]
    fn test_parse_page_re_rows_parallel_arrays() {
        let page = CandlesPageParser.parse_page(&candles()).unwrap();
        assert_eq!(page.rows.len(), 2);
        assert!(page.next_url.is_none());
        assert_eq!(page.rows[0]["c"], 148.0);
        assert_eq!(page.rows[0]["t"], JAN_2);
        assert_eq!(page.rows[1]["v"], 1_100_000.0);
    }

    #[test]
    fn test_parse_page_no_data_is_empty() {
        let page = CandlesPageParser
            .parse_page(&json!({"s": "no_data"}))
            .unwrap();
        assert!(page.rows.is_empty());
    }

    #[test]
    fn test_parse_page_error_status() {
        let err = CandlesPageParser
            .parse_page(&json!({"s": "error: invalid token"}))
            .unwrap_err();
        assert!(matches!(err, MarketDataError::ProviderError { .. }));
    }

    #[tokio::test]
    async fn test_fetch_applies_bearer_token() {
        let provider_for_url = MarketDataAppProvider::new();
        let query = provider_for_url.normalize_query(dated_query("AAPL")).unwrap();
        let transport = Arc::new(RecordingTransport::new(vec![(
            provider_for_url.candles_url(&query, "D", "AAPL"),
            candles(),
        )]));
        let provider = MarketDataAppProvider::with_transport(transport.clone());

        let credentials = CredentialStore::from([("marketdata_app_api_key", "token-123")]);
        let bars = provider.fetch(dated_query("AAPL"), &credentials).await.unwrap();

        assert_eq!(bars.len(), 2);
        let recorded = transport.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(
            recorded[0].1,
            vec![("Authorization".to_string(), "Bearer token-123".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fetch_honors_requested_sort_order() {
        let provider_for_url = MarketDataAppProvider::new();
        let query = provider_for_url.normalize_query(dated_query("AAPL")).unwrap();
        let transport = Arc::new(RecordingTransport::new(vec![(
            provider_for_url.candles_url(&query, "D", "AAPL"),
            candles(),
        )]));
        let provider = MarketDataAppProvider::with_transport(transport);

        let credentials = CredentialStore::from([("marketdata_app_api_key", "token-123")]);

        // Default sort is descending: latest bucket first.
        let bars = provider.fetch(dated_query("AAPL"), &credentials).await.unwrap();
        assert_eq!(bars[0].date.to_string(), "2024-01-03");
        assert_eq!(bars[1].date.to_string(), "2024-01-02");

        let ascending = provider
            .fetch(dated_query("AAPL").with_sort(SortOrder::Asc), &credentials)
            .await
            .unwrap();
        assert_eq!(ascending[0].date.to_string(), "2024-01-02");
    }

    #[tokio::test]
    async fn test_multi_symbol_rows_are_tagged() {
        let provider_for_url = MarketDataAppProvider::new();
        let query = provider_for_url
            .normalize_query(dated_query("AAPL,MSFT"))
            .unwrap();
        let transport = Arc::new(RecordingTransport::new(vec![
            (provider_for_url.candles_url(&query, "D", "AAPL"), candles()),
            (provider_for_url.candles_url(&query, "D", "MSFT"), candles()),
        ]));
        let provider = MarketDataAppProvider::with_transport(transport);

        let credentials = CredentialStore::from([("marketdata_app_api_key", "token-123")]);
        let bars = provider
            .fetch(dated_query("AAPL,MSFT"), &credentials)
            .await
            .unwrap();

        assert_eq!(bars.len(), 4);
        assert!(bars.iter().any(|b| b.symbol.as_deref() == Some("AAPL")));
        assert!(bars.iter().any(|b| b.symbol.as_deref() == Some("MSFT")));
    }

    #[tokio::test]
    async fn test_no_data_for_all_symbols_is_empty_data() {
        let provider_for_url = MarketDataAppProvider::new();
        let query = provider_for_url.normalize_query(dated_query("XYZ")).unwrap();
        let transport = Arc::new(RecordingTransport::new(vec![(
            provider_for_url.candles_url(&query, "D", "XYZ"),
            json!({"s": "no_data"}),
        )]));
        let provider = MarketDataAppProvider::with_transport(transport);

        let credentials = CredentialStore::from([("marketdata_app_api_key", "token-123")]);
        let err = provider
            .fetch(dated_query("XYZ"), &credentials)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketDataError::EmptyData));
    }
}

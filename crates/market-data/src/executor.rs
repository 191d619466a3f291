//! Paginated, concurrent request execution.
//!
//! [`collect_rows`] turns one initial request per symbol into the full raw
//! row set for a query: symbols fan out concurrently in bounded chunks,
//! while each symbol follows its vendor's continuation URLs sequentially
//! (every page depends on the previous page's token).
//!
//! Failure handling mirrors the pipeline contract: a symbol whose requests
//! fail with a [`RetryClass::SkipSymbol`] error contributes zero rows and a
//! warning; `Never`-class errors abort the whole batch.

use futures::future::join_all;
use log::{debug, warn};
use serde_json::Value;

use crate::errors::{MarketDataError, RetryClass};
use crate::transport::Transport;

/// Bounds applied to one fetch: fan-out width and pagination depth.
///
/// The concurrency limit is supplied by the caller, not hardcoded in the
/// pipeline; the page cap exists so a vendor returning a self-referential
/// continuation token fails loudly instead of looping forever.
#[derive(Clone, Copy, Debug)]
pub struct FetchPolicy {
    /// Maximum symbols fetched concurrently.
    pub max_concurrency: usize,

    /// Maximum pages followed per symbol before the fetch fails with
    /// [`MarketDataError::PaginationLimitExceeded`].
    pub max_pages: usize,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            max_pages: 50,
        }
    }
}

/// Initial request for one symbol.
///
/// `symbol` is the tagging/reporting form (vendor prefixes already
/// stripped); the vendor-facing form is baked into `url`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub symbol: String,
    pub url: String,
}

/// One decoded page of vendor results.
#[derive(Clone, Debug, Default)]
pub struct ParsedPage {
    /// Raw result rows, in vendor order.
    pub rows: Vec<Value>,

    /// Continuation URL, absent on the last page.
    pub next_url: Option<String>,
}

/// Vendor-specific paging behavior.
///
/// Adapters hold an implementation of this alongside their alias map;
/// the executor stays vendor-agnostic.
pub trait PageParser: Send + Sync {
    /// Split a decoded payload into result rows and an optional
    /// continuation URL.
    fn parse_page(&self, payload: &Value) -> Result<ParsedPage, MarketDataError>;

    /// Rewrite a continuation URL before following it (e.g. re-append the
    /// API key, which vendors omit from their `next_url`).
    fn follow_url(&self, next_url: &str) -> String {
        next_url.to_string()
    }
}

/// Rows collected for one symbol, in pagination order.
#[derive(Clone, Debug)]
pub struct SymbolRows {
    pub symbol: String,
    pub rows: Vec<Value>,
}

/// Fetch every page for every requested symbol.
///
/// Requests run concurrently in chunks of `policy.max_concurrency`. The
/// returned per-symbol groups are in task-completion order; callers must
/// not assume cross-symbol interleaving is chronological.
///
/// # Errors
///
/// `Never`-class errors (including [`MarketDataError::PaginationLimitExceeded`])
/// abort the batch. Other per-symbol errors degrade to an empty row set for
/// that symbol, with a warning.
pub async fn collect_rows(
    transport: &dyn Transport,
    parser: &dyn PageParser,
    requests: Vec<PageRequest>,
    headers: &[(&str, &str)],
    policy: &FetchPolicy,
) -> Result<Vec<SymbolRows>, MarketDataError> {
    let mut collected = Vec::with_capacity(requests.len());

    for chunk in requests.chunks(policy.max_concurrency.max(1)) {
        let futures: Vec<_> = chunk
            .iter()
            .map(|request| fetch_symbol(transport, parser, request, headers, policy))
            .collect();

        for (request, result) in chunk.iter().zip(join_all(futures).await) {
            match result {
                Ok(symbol_rows) => {
                    if symbol_rows.rows.is_empty() {
                        warn!("Symbol error: no data found for {}", symbol_rows.symbol);
                    }
                    collected.push(symbol_rows);
                }
                Err(error) if error.retry_class() == RetryClass::Never => return Err(error),
                Err(error) => {
                    warn!("Skipping symbol '{}': {}", request.symbol, error);
                    collected.push(SymbolRows {
                        symbol: request.symbol.clone(),
                        rows: Vec::new(),
                    });
                }
            }
        }
    }

    Ok(collected)
}

/// Follow one symbol's pagination chain to exhaustion.
async fn fetch_symbol(
    transport: &dyn Transport,
    parser: &dyn PageParser,
    request: &PageRequest,
    headers: &[(&str, &str)],
    policy: &FetchPolicy,
) -> Result<SymbolRows, MarketDataError> {
    let payload = transport.get_json(&request.url, headers).await?;
    let mut page = parser.parse_page(&payload)?;

    let mut rows = Vec::new();
    rows.append(&mut page.rows);
    let mut pages = 1;

    while let Some(next_url) = page.next_url.take() {
        if pages >= policy.max_pages {
            return Err(MarketDataError::PaginationLimitExceeded {
                symbol: request.symbol.clone(),
                max_pages: policy.max_pages,
            });
        }

        let url = parser.follow_url(&next_url);
        let payload = transport.get_json(&url, headers).await?;
        page = parser.parse_page(&payload)?;
        rows.append(&mut page.rows);
        pages += 1;
    }

    debug!(
        "Collected {} rows across {} pages for '{}'",
        rows.len(),
        pages,
        request.symbol
    );

    Ok(SymbolRows {
        symbol: request.symbol.clone(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Transport that serves canned payloads by URL and records requests.
    struct ScriptedTransport {
        pages: HashMap<String, Value>,
        failing: Vec<String>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(pages: Vec<(&str, Value)>) -> Self {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(url, payload)| (url.to_string(), payload))
                    .collect(),
                failing: Vec::new(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn with_failing(mut self, urls: &[&str]) -> Self {
            self.failing = urls.iter().map(|u| u.to_string()).collect();
            self
        }

        fn recorded(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get_json(
            &self,
            url: &str,
            _headers: &[(&str, &str)],
        ) -> Result<Value, MarketDataError> {
            self.requests.lock().unwrap().push(url.to_string());

            if self.failing.iter().any(|u| u == url) {
                return Err(MarketDataError::ProviderError {
                    provider: "TEST".to_string(),
                    message: "HTTP 500".to_string(),
                });
            }

            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| MarketDataError::ProviderError {
                    provider: "TEST".to_string(),
                    message: format!("no scripted response for {}", url),
                })
        }
    }

    /// Parser over `{"rows": [...], "next": "..."}` payloads.
    struct TestParser;

    impl PageParser for TestParser {
        fn parse_page(&self, payload: &Value) -> Result<ParsedPage, MarketDataError> {
            Ok(ParsedPage {
                rows: payload
                    .get("rows")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                next_url: payload
                    .get("next")
                    .and_then(Value::as_str)
                    .map(String::from),
            })
        }
    }

    fn request(symbol: &str, url: &str) -> PageRequest {
        PageRequest {
            symbol: symbol.to_string(),
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_pagination_concatenates_all_pages_in_order() {
        let transport = ScriptedTransport::new(vec![
            ("http://t/p1", json!({"rows": [1, 2], "next": "http://t/p2"})),
            ("http://t/p2", json!({"rows": [3], "next": "http://t/p3"})),
            ("http://t/p3", json!({"rows": [4]})),
        ]);

        let collected = collect_rows(
            &transport,
            &TestParser,
            vec![request("AAPL", "http://t/p1")],
            &[],
            &FetchPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(transport.recorded().len(), 3);
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].symbol, "AAPL");
        assert_eq!(collected[0].rows, vec![json!(1), json!(2), json!(3), json!(4)]);
    }

    #[tokio::test]
    async fn test_self_referential_token_hits_page_cap() {
        let transport = ScriptedTransport::new(vec![(
            "http://t/loop",
            json!({"rows": [], "next": "http://t/loop"}),
        )]);
        let policy = FetchPolicy {
            max_pages: 3,
            ..FetchPolicy::default()
        };

        let err = collect_rows(
            &transport,
            &TestParser,
            vec![request("AAPL", "http://t/loop")],
            &[],
            &policy,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            MarketDataError::PaginationLimitExceeded { ref symbol, max_pages: 3 } if symbol == "AAPL"
        ));
        assert_eq!(transport.recorded().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_symbol_degrades_to_zero_rows() {
        let transport = ScriptedTransport::new(vec![
            ("http://t/msft", json!({"rows": [7, 8]})),
        ])
        .with_failing(&["http://t/aapl"]);

        let collected = collect_rows(
            &transport,
            &TestParser,
            vec![
                request("AAPL", "http://t/aapl"),
                request("MSFT", "http://t/msft"),
            ],
            &[],
            &FetchPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].symbol, "AAPL");
        assert!(collected[0].rows.is_empty());
        assert_eq!(collected[1].symbol, "MSFT");
        assert_eq!(collected[1].rows, vec![json!(7), json!(8)]);
    }

    #[tokio::test]
    async fn test_empty_symbol_is_kept_with_zero_rows() {
        let transport = ScriptedTransport::new(vec![("http://t/none", json!({"rows": []}))]);

        let collected = collect_rows(
            &transport,
            &TestParser,
            vec![request("XYZ", "http://t/none")],
            &[],
            &FetchPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(collected.len(), 1);
        assert!(collected[0].rows.is_empty());
    }

    #[tokio::test]
    async fn test_chunked_fan_out_preserves_per_symbol_grouping() {
        let transport = ScriptedTransport::new(vec![
            ("http://t/a", json!({"rows": ["a1"]})),
            ("http://t/b", json!({"rows": ["b1"], "next": "http://t/b2"})),
            ("http://t/b2", json!({"rows": ["b2"]})),
            ("http://t/c", json!({"rows": ["c1"]})),
        ]);
        let policy = FetchPolicy {
            max_concurrency: 2,
            ..FetchPolicy::default()
        };

        let collected = collect_rows(
            &transport,
            &TestParser,
            vec![
                request("A", "http://t/a"),
                request("B", "http://t/b"),
                request("C", "http://t/c"),
            ],
            &[],
            &policy,
        )
        .await
        .unwrap();

        assert_eq!(collected.len(), 3);
        let by_symbol: Vec<(&str, usize)> = collected
            .iter()
            .map(|s| (s.symbol.as_str(), s.rows.len()))
            .collect();
        assert!(by_symbol.contains(&("A", 1)));
        assert!(by_symbol.contains(&("B", 2)));
        assert!(by_symbol.contains(&("C", 1)));
    }
}

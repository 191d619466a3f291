//! Historical price query: raw user input and its normalized form.
//!
//! Queries are two-phase. [`HistoricalQuery`] is what the caller supplies;
//! it may have gaps (no dates, no limit) and an unparsed interval token.
//! [`NormalizedQuery`] is what the rest of the pipeline consumes; every
//! derived field is present because it can only be produced by
//! [`HistoricalQuery::normalize`]. A half-derived query is unrepresentable.

use chrono::{Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

use super::interval::Interval;

/// Sort order of the returned bars.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Lowercase form used in vendor query strings.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Vendor-specific normalization defaults.
///
/// Each adapter holds one of these instead of overriding normalization
/// behavior: the characters its symbol format forbids, the trailing window
/// applied when the caller gives no dates, and the page-size cap applied
/// when the caller gives none.
#[derive(Clone, Copy, Debug)]
pub struct QueryProfile {
    /// Characters stripped from symbols before use (e.g. `-` in "BTC-USD"
    /// for vendors whose tickers are plain "BTCUSD").
    pub strip_characters: &'static [char],

    /// Trailing window, in months, used when no start date is given.
    pub lookback_months: u32,

    /// Page-size cap used when the caller does not supply one.
    pub default_limit: u32,
}

impl Default for QueryProfile {
    fn default() -> Self {
        Self {
            strip_characters: &[],
            lookback_months: 12,
            default_limit: 49_999,
        }
    }
}

/// Raw historical price query as supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalQuery {
    /// Ticker symbol; may encode multiple comma-separated tickers.
    pub symbol: String,

    /// Compact interval token, e.g. "1d" or "15m".
    pub interval: String,

    /// Start of the date range (inclusive). Defaults to a vendor-defined
    /// trailing window when absent.
    pub start_date: Option<NaiveDate>,

    /// End of the date range (inclusive). Defaults to today when absent.
    pub end_date: Option<NaiveDate>,

    /// Sort order of the data.
    pub sort: SortOrder,

    /// Page-size cap. Defaults to the vendor's maximum when absent.
    pub limit: Option<u32>,
}

impl HistoricalQuery {
    /// Create a query for a symbol with daily bars and vendor defaults.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: "1d".to_string(),
            start_date: None,
            end_date: None,
            sort: SortOrder::default(),
            limit: None,
        }
    }

    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }

    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Normalize this query against a vendor profile.
    ///
    /// Uppercases the symbol, strips vendor-forbidden characters, fills in
    /// the default date window and limit, and parses the interval token.
    ///
    /// # Errors
    ///
    /// Returns [`MarketDataError::InvalidQuery`] when the symbol is empty,
    /// the limit is zero, or the start date is after the end date, and
    /// [`MarketDataError::InvalidInterval`] when the interval token does
    /// not parse.
    pub fn normalize(self, profile: &QueryProfile) -> Result<NormalizedQuery, MarketDataError> {
        let symbol: String = self
            .symbol
            .trim()
            .to_uppercase()
            .chars()
            .filter(|c| !profile.strip_characters.contains(c))
            .collect();

        if symbol.split(',').any(|part| part.is_empty()) {
            return Err(MarketDataError::InvalidQuery {
                message: "symbol must not be empty".to_string(),
            });
        }

        let limit = self.limit.unwrap_or(profile.default_limit);
        if limit == 0 {
            return Err(MarketDataError::InvalidQuery {
                message: "limit must be greater than zero".to_string(),
            });
        }

        let interval: Interval = self.interval.parse()?;

        let end_date = self.end_date.unwrap_or_else(today);
        let start_date = self.start_date.unwrap_or_else(|| {
            end_date
                .checked_sub_months(Months::new(profile.lookback_months))
                .unwrap_or(end_date)
        });

        if start_date > end_date {
            return Err(MarketDataError::InvalidQuery {
                message: format!(
                    "start_date {} is after end_date {}",
                    start_date, end_date
                ),
            });
        }

        Ok(NormalizedQuery {
            symbol,
            interval,
            start_date,
            end_date,
            sort: self.sort,
            limit,
        })
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Fully-derived query, ready for URL assembly.
///
/// Only produced by [`HistoricalQuery::normalize`]; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedQuery {
    /// Uppercased symbol list, vendor-forbidden characters removed.
    pub symbol: String,

    /// Parsed interval (multiplier and calendar unit).
    pub interval: Interval,

    /// Start of the date range (inclusive).
    pub start_date: NaiveDate,

    /// End of the date range (inclusive).
    pub end_date: NaiveDate,

    /// Sort order of the data.
    pub sort: SortOrder,

    /// Page-size cap per request.
    pub limit: u32,
}

impl NormalizedQuery {
    /// The individual tickers covered by this query.
    pub fn symbols(&self) -> Vec<&str> {
        self.symbol.split(',').collect()
    }

    /// Whether the query covers more than one ticker.
    ///
    /// Rows from multi-symbol queries are stamped with their originating
    /// symbol; single-symbol rows rely on the query context.
    pub fn is_multi_symbol(&self) -> bool {
        self.symbol.contains(',')
    }
}

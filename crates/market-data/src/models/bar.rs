//! Canonical OHLCV bar and its timestamp representation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::interval::IntervalUnit;

/// Textual format for intraday bar timestamps: RFC3339-like with an
/// explicit numeric UTC offset.
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Unit of a vendor's raw epoch timestamps.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EpochUnit {
    Seconds,
    Millis,
}

/// Timestamp of a bar.
///
/// Daily and coarser bars carry a calendar date only; intraday bars keep
/// the full UTC timestamp. Which form a bar takes is decided once, from the
/// query's interval unit, when the vendor's raw epoch is converted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum BarDate {
    /// Date-only bucket (daily, weekly, monthly, quarterly, yearly bars).
    Day(NaiveDate),
    /// Full timestamp with UTC offset (second, minute, hour bars).
    DateTime(DateTime<Utc>),
}

impl BarDate {
    /// Convert a vendor epoch timestamp into the canonical representation.
    ///
    /// The instant is interpreted as UTC. When `unit` is daily or coarser
    /// the instant is truncated to its calendar date; otherwise the full
    /// timestamp is kept.
    ///
    /// Returns `None` for epochs outside the representable range.
    pub fn from_epoch(raw: i64, epoch: EpochUnit, unit: IntervalUnit) -> Option<Self> {
        let instant = match epoch {
            EpochUnit::Seconds => Utc.timestamp_opt(raw, 0).single()?,
            EpochUnit::Millis => Utc.timestamp_millis_opt(raw).single()?,
        };

        if unit.is_intraday() {
            Some(Self::DateTime(instant))
        } else {
            Some(Self::Day(instant.date_naive()))
        }
    }

    /// The calendar date of the bucket, regardless of representation.
    pub fn date_naive(&self) -> NaiveDate {
        match self {
            Self::Day(date) => *date,
            Self::DateTime(dt) => dt.date_naive(),
        }
    }
}

impl fmt::Display for BarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl FromStr for BarDate {
    type Err = chrono::ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Ok(Self::Day(date));
        }
        DateTime::parse_from_str(value, DATETIME_FORMAT)
            .map(|dt| Self::DateTime(dt.with_timezone(&Utc)))
    }
}

impl Serialize for BarDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BarDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(D::Error::custom)
    }
}

/// Canonical OHLCV bar.
///
/// Immutable value object produced by the record normalizer; one per
/// vendor-reported time bucket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Timestamp of the bucket (date-only or full timestamp).
    pub date: BarDate,

    /// Opening price.
    pub open: f64,

    /// High price.
    pub high: f64,

    /// Low price.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Trading volume (absent for some vendors and assets).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,

    /// Volume-weighted average price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vwap: Option<f64>,

    /// Number of trades in the bucket (vendor extension).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<u64>,

    /// Originating symbol; present only when the query covered more than
    /// one ticker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl Bar {
    /// Create a bar with the required price fields only.
    pub fn new(date: BarDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume: None,
            vwap: None,
            transactions: None,
            symbol: None,
        }
    }
}

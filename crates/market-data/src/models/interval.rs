//! Interval token parsing.
//!
//! Vendor APIs express bar granularity as a multiplier and a calendar unit
//! (e.g. Polygon's `/range/{multiplier}/{timespan}/`). Users express it as a
//! compact token like `"1d"` or `"15m"`. This module decomposes the token
//! once, at query normalization time, so adapters never re-parse it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Calendar unit of a bar interval.
///
/// The unit letter in the compact token is case-sensitive: `m` is minute,
/// `M` is month.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl IntervalUnit {
    /// Canonical lowercase unit name, as used in vendor range URLs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }

    /// Whether bars at this granularity carry an intraday time component.
    ///
    /// Intraday bars keep their full timestamp; daily and coarser bars are
    /// truncated to a calendar date.
    pub const fn is_intraday(self) -> bool {
        matches!(self, Self::Second | Self::Minute | Self::Hour)
    }

    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            's' => Some(Self::Second),
            'm' => Some(Self::Minute),
            'h' => Some(Self::Hour),
            'd' => Some(Self::Day),
            'W' => Some(Self::Week),
            'M' => Some(Self::Month),
            'Q' => Some(Self::Quarter),
            'Y' => Some(Self::Year),
            _ => None,
        }
    }

    const fn letter(self) -> char {
        match self {
            Self::Second => 's',
            Self::Minute => 'm',
            Self::Hour => 'h',
            Self::Day => 'd',
            Self::Week => 'W',
            Self::Month => 'M',
            Self::Quarter => 'Q',
            Self::Year => 'Y',
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed bar interval: positive multiplier and calendar unit.
///
/// Parsed from the compact token `<digits><unit-letter>` where the unit
/// letter is one of `s m h d W M Q Y`.
///
/// # Examples
///
/// ```
/// use tickbridge_market_data::models::{Interval, IntervalUnit};
///
/// let interval: Interval = "15m".parse().unwrap();
/// assert_eq!(interval.multiplier, 15);
/// assert_eq!(interval.unit, IntervalUnit::Minute);
/// assert!("0d".parse::<Interval>().is_err());
/// assert!("7x".parse::<Interval>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Number of units per bar (e.g. 5 in "5m").
    pub multiplier: u32,
    /// Calendar unit (e.g. minute in "5m").
    pub unit: IntervalUnit,
}

impl Interval {
    pub const fn new(multiplier: u32, unit: IntervalUnit) -> Self {
        Self { multiplier, unit }
    }

    /// One daily bar - the default granularity across vendors.
    pub const fn daily() -> Self {
        Self::new(1, IntervalUnit::Day)
    }

    fn invalid(token: &str, reason: impl Into<String>) -> MarketDataError {
        MarketDataError::InvalidInterval {
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}

impl FromStr for Interval {
    type Err = MarketDataError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let mut chars = token.chars();
        let letter = chars
            .next_back()
            .ok_or_else(|| Self::invalid(token, "token is empty"))?;

        let unit = IntervalUnit::from_letter(letter)
            .ok_or_else(|| Self::invalid(token, format!("unknown unit '{}'", letter)))?;

        let digits = chars.as_str();
        if digits.is_empty() {
            return Err(Self::invalid(token, "missing multiplier"));
        }

        let multiplier: u32 = digits
            .parse()
            .map_err(|_| Self::invalid(token, format!("non-numeric multiplier '{}'", digits)))?;

        if multiplier == 0 {
            return Err(Self::invalid(token, "multiplier must be positive"));
        }

        Ok(Self { multiplier, unit })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.multiplier, self.unit.letter())
    }
}

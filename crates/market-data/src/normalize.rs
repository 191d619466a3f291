//! Record normalization: raw vendor rows onto the canonical bar schema.
//!
//! Each vendor declares a field-alias map (canonical field → raw key) and a
//! row policy; [`bars_from_rows`] does the per-field coercion and enforces
//! the pipeline's minimum-viability rule: an empty transformed batch is
//! fatal, whatever already went wrong upstream.

use log::warn;
use serde_json::Value;

use crate::errors::MarketDataError;
use crate::models::{Bar, BarDate, EpochUnit, IntervalUnit};

/// Declarative canonical-field → raw-key table for one vendor.
///
/// Fields without an entry are looked up under their canonical name.
#[derive(Clone, Copy, Debug)]
pub struct AliasMap {
    pairs: &'static [(&'static str, &'static str)],
}

impl AliasMap {
    pub const fn new(pairs: &'static [(&'static str, &'static str)]) -> Self {
        Self { pairs }
    }

    /// The raw key a canonical field is read from.
    pub fn raw_key<'a>(&self, canonical: &'a str) -> &'a str {
        self.pairs
            .iter()
            .find(|(field, _)| *field == canonical)
            .map(|(_, raw)| *raw)
            .unwrap_or(canonical)
    }
}

/// What to do with a row that fails required-field validation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RowPolicy {
    /// Skip the row with a warning and keep going.
    DropInvalid,
    /// Fail the whole batch on the first invalid row.
    FailBatch,
}

/// Rewrite a raw epoch timestamp in place as its canonical textual form.
///
/// Vendors report epochs in their own unit; the canonical form is a
/// date-only string for daily-and-coarser intervals and a full UTC
/// timestamp for intraday ones. Rows whose timestamp is absent or out of
/// range are left untouched and rejected later by [`bars_from_rows`].
pub fn stamp_timestamp(row: &mut Value, raw_key: &str, epoch: EpochUnit, unit: IntervalUnit) {
    let Some(raw) = row.get(raw_key).and_then(Value::as_i64) else {
        return;
    };
    if let Some(date) = BarDate::from_epoch(raw, epoch, unit) {
        row[raw_key] = Value::String(date.to_string());
    }
}

/// Transform aggregated raw rows into canonical bars.
///
/// # Errors
///
/// Returns [`MarketDataError::ValidationFailed`] under
/// [`RowPolicy::FailBatch`] when a row is invalid, and
/// [`MarketDataError::EmptyData`] when the transformed sequence is empty -
/// whether the vendor returned nothing or every row was rejected.
pub fn bars_from_rows(
    aliases: &AliasMap,
    rows: &[Value],
    policy: RowPolicy,
) -> Result<Vec<Bar>, MarketDataError> {
    let mut bars = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        match bar_from_row(aliases, row) {
            Ok(bar) => bars.push(bar),
            Err(reason) => match policy {
                RowPolicy::DropInvalid => {
                    warn!("Skipping row {}: {}", index, reason);
                }
                RowPolicy::FailBatch => {
                    return Err(MarketDataError::ValidationFailed {
                        message: format!("row {}: {}", index, reason),
                    });
                }
            },
        }
    }

    if bars.is_empty() {
        return Err(MarketDataError::EmptyData);
    }

    Ok(bars)
}

fn bar_from_row(aliases: &AliasMap, row: &Value) -> Result<Bar, String> {
    let date_raw = row
        .get(aliases.raw_key("date"))
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing timestamp field '{}'", aliases.raw_key("date")))?;
    let date: BarDate = date_raw
        .parse()
        .map_err(|_| format!("unparseable timestamp '{}'", date_raw))?;

    let mut bar = Bar::new(
        date,
        required_number(aliases, row, "open")?,
        required_number(aliases, row, "high")?,
        required_number(aliases, row, "low")?,
        required_number(aliases, row, "close")?,
    );

    if let Some(volume) = optional_number(aliases, row, "volume")? {
        if volume < 0.0 {
            return Err(format!("negative volume {}", volume));
        }
        bar.volume = Some(volume);
    }

    bar.vwap = optional_number(aliases, row, "vwap")?;

    if let Some(value) = row.get(aliases.raw_key("transactions")) {
        if !value.is_null() {
            let count = value
                .as_u64()
                .ok_or_else(|| format!("invalid transaction count {}", value))?;
            bar.transactions = Some(count);
        }
    }

    bar.symbol = row
        .get(aliases.raw_key("symbol"))
        .and_then(Value::as_str)
        .map(String::from);

    Ok(bar)
}

fn required_number(aliases: &AliasMap, row: &Value, field: &str) -> Result<f64, String> {
    let raw_key = aliases.raw_key(field);
    match optional_number_at(row, raw_key)? {
        Some(value) => Ok(value),
        None => Err(format!("missing required field '{}'", raw_key)),
    }
}

fn optional_number(aliases: &AliasMap, row: &Value, field: &str) -> Result<Option<f64>, String> {
    optional_number_at(row, aliases.raw_key(field))
}

/// Numeric coercion: JSON numbers pass through, numeric strings are parsed
/// (several vendors quote their prices).
fn optional_number_at(row: &Value, raw_key: &str) -> Result<Option<f64>, String> {
    match row.get(raw_key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("non-numeric value '{}' in '{}'", s, raw_key)),
        Some(other) => Err(format!("non-numeric value {} in '{}'", other, raw_key)),
    }
}

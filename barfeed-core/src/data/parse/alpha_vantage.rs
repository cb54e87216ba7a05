//! Alpha Vantage CSV payloads (`datatype=csv`).
//!
//! Daily-adjusted bodies carry `timestamp, open, high, low, close,
//! adjusted_close, volume, dividend_amount, split_coefficient`; intraday
//! bodies carry only `timestamp, open, high, low, close, volume`. Both arrive
//! newest first.

use super::{json_error_message, parse_csv};
use crate::data::error::DataError;
use crate::data::provider::FetchContext;
use crate::data::raw::RawTable;

/// Fields every Alpha Vantage time-series body must carry.
pub const REQUIRED_FIELDS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

pub fn parse(text: &str, ctx: &FetchContext<'_>) -> Result<RawTable, DataError> {
    // Alpha Vantage answers errors and throttling notes with JSON even when CSV was requested.
    if let Some(message) = json_error_message(text) {
        return Err(ctx.malformed(message));
    }
    parse_csv(text, &REQUIRED_FIELDS, ctx)
}

//! Binance kline payloads: a JSON array of fixed-position 12-element arrays.

use super::json_error_message;
use crate::data::error::DataError;
use crate::data::provider::FetchContext;
use crate::data::raw::{RawRow, RawTable, RawValue};

/// Positional field names of one kline, in wire order.
pub const KLINE_FIELDS: [&str; 12] = [
    "Open time",
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "Close time",
    "Quote asset volume",
    "Number of trades",
    "Taker buy base asset volume",
    "Taker buy quote asset volume",
    "Ignore",
];

pub fn parse(text: &str, ctx: &FetchContext<'_>) -> Result<RawTable, DataError> {
    if let Some(message) = json_error_message(text) {
        return Err(ctx.malformed(message));
    }

    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| ctx.malformed(format!("invalid JSON: {e}")))?;
    let klines = value
        .as_array()
        .ok_or_else(|| ctx.malformed("expected a JSON array of klines"))?;

    let mut table = RawTable::new(KLINE_FIELDS.iter().map(|f| f.to_string()).collect());
    for (i, kline) in klines.iter().enumerate() {
        let fields = kline
            .as_array()
            .ok_or_else(|| ctx.malformed(format!("kline {i} is not an array")))?;
        if fields.len() != KLINE_FIELDS.len() {
            return Err(ctx.malformed(format!(
                "kline {i} has {} fields, expected {}",
                fields.len(),
                KLINE_FIELDS.len()
            )));
        }

        let mut row = RawRow::with_capacity(KLINE_FIELDS.len());
        for (name, field) in KLINE_FIELDS.iter().zip(fields) {
            let raw = RawValue::from_json(field)
                .ok_or_else(|| ctx.malformed(format!("kline {i} field '{name}' is not a scalar")))?;
            row.push(*name, raw);
        }
        table.rows.push(row);
    }
    Ok(table)
}

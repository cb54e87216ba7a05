//! RawRecord parsers: provider payload text → `RawTable`.
//!
//! Parsers keep provider-native field names and delivery order; they never
//! rename, coerce, or sort. That is the normalizer's job.

pub mod alpha_vantage;
pub mod kline;
pub mod yahoo;

use super::error::DataError;
use super::provider::{FetchContext, ProviderKind};
use super::raw::{RawRow, RawTable, RawValue};
use super::transport::RawPayload;

/// Parse a payload with the parser matching the context's provider.
///
/// Fails with `MalformedPayload` when required fields are missing, when the
/// provider answered with an error document, or when a full-history provider
/// delivered no rows.
pub fn parse_payload(payload: &RawPayload, ctx: &FetchContext<'_>) -> Result<RawTable, DataError> {
    let table = match ctx.provider {
        ProviderKind::AlphaVantage => alpha_vantage::parse(payload.text(), ctx)?,
        ProviderKind::Yahoo => yahoo::parse(payload.text(), ctx)?,
        ProviderKind::Binance => kline::parse(payload.text(), ctx)?,
    };

    if table.is_empty() && !ctx.provider.allows_empty_payload() {
        return Err(ctx.malformed("payload contains no rows"));
    }
    Ok(table)
}

// ── Shared helpers ───────────────────────────────────────────────────

/// Parse headed CSV text into a table of text values.
///
/// Empty cells and the literal `null` become `RawValue::Null`.
pub(crate) fn parse_csv(
    text: &str,
    required: &[&str],
    ctx: &FetchContext<'_>,
) -> Result<RawTable, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ctx.malformed(format!("unreadable header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|r| !headers.iter().any(|h| h == r))
        .collect();
    if !missing.is_empty() {
        return Err(ctx.malformed(format!("missing fields {missing:?} (header: {headers:?})")));
    }

    let mut table = RawTable::new(headers);
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ctx.malformed(format!("row {i}: {e}")))?;
        let mut row = RawRow::with_capacity(record.len());
        for (name, cell) in table.columns.iter().zip(record.iter()) {
            let value = if cell.is_empty() || cell.eq_ignore_ascii_case("null") {
                RawValue::Null
            } else {
                RawValue::Text(cell.to_string())
            };
            row.push(name.as_str(), value);
        }
        table.rows.push(row);
    }
    Ok(table)
}

/// If `text` is a JSON object, extract the provider's error message from it.
pub(crate) fn json_error_message(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(_) => return Some(trimmed.chars().take(200).collect()),
    };
    let obj = value.as_object()?;
    for key in ["Error Message", "Note", "Information", "msg", "message"] {
        if let Some(msg) = obj.get(key).and_then(|v| v.as_str()) {
            return Some(msg.to_string());
        }
    }
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> FetchContext<'static> {
        FetchContext::new(ProviderKind::AlphaVantage, "IBM")
    }

    #[test]
    fn csv_nulls_and_blanks_become_null() {
        let table = parse_csv("a,b,c\n1,,null\n", &["a"], &ctx()).unwrap();
        let row = &table.rows[0];
        assert_eq!(row.get("a"), Some(&RawValue::Text("1".into())));
        assert_eq!(row.get("b"), Some(&RawValue::Null));
        assert_eq!(row.get("c"), Some(&RawValue::Null));
    }

    #[test]
    fn csv_missing_required_field_is_malformed() {
        let err = parse_csv("a,b\n1,2\n", &["a", "volume"], &ctx()).unwrap_err();
        match err {
            DataError::MalformedPayload { reason, .. } => assert!(reason.contains("volume")),
            other => panic!("expected MalformedPayload, got {other:?}"),
        }
    }

    #[test]
    fn ragged_csv_row_is_malformed() {
        let err = parse_csv("a,b\n1,2\n3\n", &["a"], &ctx()).unwrap_err();
        assert!(matches!(err, DataError::MalformedPayload { .. }));
    }

    #[test]
    fn json_error_message_extraction() {
        assert_eq!(
            json_error_message(r#"{"Error Message": "Invalid API call."}"#).as_deref(),
            Some("Invalid API call.")
        );
        assert_eq!(
            json_error_message(r#"{"code": -1121, "msg": "Invalid symbol."}"#).as_deref(),
            Some("Invalid symbol.")
        );
        assert!(json_error_message("timestamp,open\n").is_none());
    }

    #[test]
    fn empty_payload_policy_depends_on_provider() {
        let header_only = RawPayload::from("timestamp,open,high,low,close,volume\n");
        let err = parse_payload(&header_only, &ctx()).unwrap_err();
        assert!(matches!(err, DataError::MalformedPayload { .. }));

        let binance = FetchContext::new(ProviderKind::Binance, "BTCUSDT");
        let table = parse_payload(&RawPayload::from("[]"), &binance).unwrap();
        assert!(table.is_empty());
    }
}

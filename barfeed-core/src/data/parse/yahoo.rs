//! Yahoo Finance payloads.
//!
//! Two shapes are accepted: the CSV download format
//! (`Date, Open, High, Low, Close, Adj Close, Volume`) and the v8 chart API
//! JSON document. Both are parsed into rows under the CSV field names, in
//! chronological order as delivered.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::parse_csv;
use crate::data::error::DataError;
use crate::data::provider::FetchContext;
use crate::data::raw::{RawRow, RawTable, RawValue};
use serde::Deserialize;

/// Native field names, in delivery order.
pub const FIELDS: [&str; 7] = ["Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"];

const REQUIRED_FIELDS: [&str; 6] = ["Date", "Open", "High", "Low", "Close", "Volume"];
const VALUE_FIELDS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

/// Only the exchange's UTC offset is needed to place bars on local dates.
#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub fn parse(text: &str, ctx: &FetchContext<'_>) -> Result<RawTable, DataError> {
    let table = if text.trim_start().starts_with('{') {
        let chart: ChartResponse = serde_json::from_str(text)
            .map_err(|e| ctx.malformed(format!("unrecognized chart document: {e}")))?;
        parse_chart(chart, ctx)?
    } else {
        parse_csv(text, &REQUIRED_FIELDS, ctx)?
    };
    Ok(drop_non_trading_rows(table))
}

/// Flatten the chart document's parallel arrays into rows.
fn parse_chart(resp: ChartResponse, ctx: &FetchContext<'_>) -> Result<RawTable, DataError> {
    let result = match resp.chart.result {
        Some(result) => result,
        None => {
            let reason = match resp.chart.error {
                Some(err) => format!("{}: {}", err.code, err.description),
                None => "empty result with no error".to_string(),
            };
            return Err(ctx.malformed(reason));
        }
    };

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| ctx.malformed("result array is empty"))?;

    let gmtoffset = data.meta.gmtoffset;
    let timestamps = data.timestamp.unwrap_or_default();

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ctx.malformed("no quote data"))?;

    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let columns: Vec<String> = if adj_closes.is_some() {
        FIELDS.iter().map(|f| f.to_string()).collect()
    } else {
        FIELDS
            .iter()
            .filter(|f| **f != "Adj Close")
            .map(|f| f.to_string())
            .collect()
    };

    let number = |v: Option<f64>| v.map_or(RawValue::Null, RawValue::Number);

    let mut table = RawTable::new(columns);
    for (i, &ts) in timestamps.iter().enumerate() {
        // Daily bars are stamped at the exchange open; the trading date is the
        // exchange-local date, which differs from UTC east of Greenwich.
        let date = ts
            .checked_add(gmtoffset)
            .and_then(|local| chrono::DateTime::from_timestamp(local, 0))
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| ctx.malformed(format!("invalid timestamp: {ts}")))?;
        let midnight = date.and_time(chrono::NaiveTime::MIN);

        let mut row = RawRow::with_capacity(7);
        row.push("Date", RawValue::Timestamp(midnight));
        row.push("Open", number(quote.open.get(i).copied().flatten()));
        row.push("High", number(quote.high.get(i).copied().flatten()));
        row.push("Low", number(quote.low.get(i).copied().flatten()));
        row.push("Close", number(quote.close.get(i).copied().flatten()));
        if let Some(adj) = &adj_closes {
            row.push("Adj Close", number(adj.get(i).copied().flatten()));
        }
        row.push("Volume", number(quote.volume.get(i).copied().flatten()));
        table.rows.push(row);
    }
    Ok(table)
}

/// Skip rows where every OHLCV value is null (holidays, non-trading days).
fn drop_non_trading_rows(mut table: RawTable) -> RawTable {
    table.rows.retain(|row| {
        VALUE_FIELDS
            .iter()
            .any(|f| !matches!(row.get(f), None | Some(RawValue::Null)))
    });
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::ProviderKind;

    fn ctx() -> FetchContext<'static> {
        FetchContext::new(ProviderKind::Yahoo, "SPY")
    }

    #[test]
    fn csv_download_format() {
        let body = "\
Date,Open,High,Low,Close,Adj Close,Volume
2024-01-02,472.16,473.67,470.49,472.65,466.12,123623700
2024-01-03,470.43,471.19,468.17,468.79,462.31,103585900
2024-01-04,null,null,null,null,null,null
";
        let table = parse(body, &ctx()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.has_column("Adj Close"));
        assert_eq!(
            table.rows[1].get("Adj Close"),
            Some(&RawValue::Text("462.31".into()))
        );
    }

    #[test]
    fn chart_document_is_flattened() {
        let body = r#"{"chart":{"result":[{"timestamp":[1704205800,1704292200,1704378600],
            "indicators":{"quote":[{"open":[472.16,470.43,null],"high":[473.67,471.19,null],
            "low":[470.49,468.17,null],"close":[472.65,468.79,null],"volume":[123623700,103585900,null]}],
            "adjclose":[{"adjclose":[466.12,462.31,null]}]}}],"error":null}}"#;
        let table = parse(body, &ctx()).unwrap();

        assert_eq!(table.len(), 2);
        let first = &table.rows[0];
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(
            first.get("Date"),
            Some(&RawValue::Timestamp(date.and_hms_opt(0, 0, 0).unwrap()))
        );
        assert_eq!(first.get("Adj Close"), Some(&RawValue::Number(466.12)));
        assert_eq!(first.get("Volume"), Some(&RawValue::Number(123_623_700.0)));
    }

    #[test]
    fn chart_dates_follow_the_exchange_offset() {
        // ASX opens at 10:00 AEDT, the previous evening in UTC.
        let body = r#"{"chart":{"result":[{"meta":{"symbol":"BHP.AX","gmtoffset":39600},
            "timestamp":[1704150000,1704236400],
            "indicators":{"quote":[{"open":[45.1,45.6],"high":[45.9,46.0],
            "low":[44.8,45.2],"close":[45.5,45.7],"volume":[5200000,4800000]}]}}],"error":null}}"#;
        let table = parse(body, &ctx()).unwrap();

        let day = |d| {
            chrono::NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        assert_eq!(table.rows[0].get("Date"), Some(&RawValue::Timestamp(day(2))));
        assert_eq!(table.rows[1].get("Date"), Some(&RawValue::Timestamp(day(3))));
        assert!(!table.has_column("Adj Close"));
    }

    #[test]
    fn chart_error_is_malformed() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        match parse(body, &ctx()).unwrap_err() {
            DataError::MalformedPayload { reason, .. } => assert!(reason.starts_with("Not Found")),
            other => panic!("expected MalformedPayload, got {other:?}"),
        }
    }

    #[test]
    fn csv_missing_volume_is_malformed() {
        let body = "Date,Open,High,Low,Close\n2024-01-02,1,2,0.5,1.5\n";
        assert!(matches!(
            parse(body, &ctx()),
            Err(DataError::MalformedPayload { .. })
        ));
    }
}

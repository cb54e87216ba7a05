//! Schema normalizer: provider-native rows → `CanonicalSeries`.
//!
//! All provider differences live in a `FieldMap`; the algorithm is shared:
//! pick the close (adjusted first), keep only OHLCV, coerce to f64, convert
//! the time key, then build the series (unconditional sort, first-wins dedupe,
//! canonical column order).

use super::error::DataError;
use super::provider::{FetchContext, ProviderKind};
use super::raw::{RawRow, RawTable, RawValue};
use crate::domain::{Bar, CanonicalSeries};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Unit of an integer time key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochUnit {
    Seconds,
    Milliseconds,
}

/// Where each canonical field comes from in a provider's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
    pub time: &'static str,
    pub epoch_unit: EpochUnit,
    pub open: &'static str,
    pub high: &'static str,
    pub low: &'static str,
    /// Close candidates in order of preference; the adjusted close comes first.
    pub close: &'static [&'static str],
    pub volume: &'static str,
}

impl FieldMap {
    pub const ALPHA_VANTAGE: FieldMap = FieldMap {
        time: "timestamp",
        epoch_unit: EpochUnit::Seconds,
        open: "open",
        high: "high",
        low: "low",
        close: &["adjusted_close", "close"],
        volume: "volume",
    };

    pub const YAHOO: FieldMap = FieldMap {
        time: "Date",
        epoch_unit: EpochUnit::Seconds,
        open: "Open",
        high: "High",
        low: "Low",
        close: &["Adj Close", "Close"],
        volume: "Volume",
    };

    pub const BINANCE: FieldMap = FieldMap {
        time: "Open time",
        epoch_unit: EpochUnit::Milliseconds,
        open: "Open",
        high: "High",
        low: "Low",
        close: &["Close"],
        volume: "Volume",
    };

    pub fn for_provider(kind: ProviderKind) -> FieldMap {
        match kind {
            ProviderKind::AlphaVantage => Self::ALPHA_VANTAGE,
            ProviderKind::Yahoo => Self::YAHOO,
            ProviderKind::Binance => Self::BINANCE,
        }
    }

    /// First close candidate the table actually carries.
    fn close_field(&self, table: &RawTable) -> Option<&'static str> {
        self.close.iter().copied().find(|c| table.has_column(c))
    }
}

/// Normalize a parsed table into the canonical schema.
pub fn normalize(table: &RawTable, ctx: &FetchContext<'_>) -> Result<CanonicalSeries, DataError> {
    let map = FieldMap::for_provider(ctx.provider);
    normalize_with(table, &map, ctx)
}

/// Normalize with an explicit field map.
pub fn normalize_with(
    table: &RawTable,
    map: &FieldMap,
    ctx: &FetchContext<'_>,
) -> Result<CanonicalSeries, DataError> {
    let close = map
        .close_field(table)
        .ok_or_else(|| ctx.malformed(format!("no close field among {:?}", map.close)))?;

    for field in [map.time, map.open, map.high, map.low, map.volume] {
        if !table.has_column(field) {
            return Err(ctx.malformed(format!("missing field '{field}'")));
        }
    }

    let bars = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            Ok(Bar {
                timestamp: time_key(row, map, i, ctx)?,
                open: number(row, map.open, i, ctx)?,
                high: number(row, map.high, i, ctx)?,
                low: number(row, map.low, i, ctx)?,
                close: number(row, close, i, ctx)?,
                volume: number(row, map.volume, i, ctx)?,
            })
        })
        .collect::<Result<Vec<_>, DataError>>()?;

    Ok(CanonicalSeries::from_bars(bars))
}

/// Coerce one field to a finite f64. `NaN` and infinities are invalid values.
fn number(row: &RawRow, field: &str, i: usize, ctx: &FetchContext<'_>) -> Result<f64, DataError> {
    match row.get(field) {
        Some(RawValue::Number(n)) if n.is_finite() => Ok(*n),
        Some(RawValue::Integer(n)) => Ok(*n as f64),
        Some(RawValue::Text(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ctx.invalid_value(field, i, s)),
        Some(other) => Err(ctx.invalid_value(field, i, other)),
        None => Err(ctx.malformed(format!("row {i} has no field '{field}'"))),
    }
}

/// Convert the provider's time key to the canonical timestamp.
fn time_key(
    row: &RawRow,
    map: &FieldMap,
    i: usize,
    ctx: &FetchContext<'_>,
) -> Result<NaiveDateTime, DataError> {
    let field = map.time;
    match row.get(field) {
        Some(RawValue::Timestamp(t)) => Ok(*t),
        Some(RawValue::Integer(n)) => {
            from_epoch(*n, map.epoch_unit).ok_or_else(|| ctx.invalid_value(field, i, n))
        }
        Some(RawValue::Text(s)) => parse_time_text(s).ok_or_else(|| ctx.invalid_value(field, i, s)),
        Some(other) => Err(ctx.invalid_value(field, i, other)),
        None => Err(ctx.malformed(format!("row {i} has no field '{field}'"))),
    }
}

/// Epoch integer → UTC-naive timestamp, truncated to whole seconds.
pub fn from_epoch(value: i64, unit: EpochUnit) -> Option<NaiveDateTime> {
    let secs = match unit {
        EpochUnit::Seconds => value,
        EpochUnit::Milliseconds => value.div_euclid(1000),
    };
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

/// Parse a date or date-time string; bare dates become midnight.
pub fn parse_time_text(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(t);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse::parse_payload;
    use crate::data::transport::RawPayload;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn run(kind: ProviderKind, symbol: &str, body: &str) -> Result<CanonicalSeries, DataError> {
        let ctx = FetchContext::new(kind, symbol);
        let table = parse_payload(&RawPayload::from(body), &ctx)?;
        normalize(&table, &ctx)
    }

    #[test]
    fn alpha_vantage_adjusted_close_and_reversal() {
        let body = "\
timestamp,open,high,low,close,adjusted_close,volume,dividend_amount,split_coefficient
2024-01-05,103.0,104.0,102.0,103.5,103.25,1300,0.0000,1.0
2024-01-04,101.0,103.0,100.0,102.0,101.75,1200,0.5000,1.0
2024-01-03,100.0,102.0,99.0,101.0,100.75,1100,0.0000,1.0
";
        let series = run(ProviderKind::AlphaVantage, "IBM", body).unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(
            series.timestamps(),
            vec![dt(2024, 1, 3, 0, 0, 0), dt(2024, 1, 4, 0, 0, 0), dt(2024, 1, 5, 0, 0, 0)]
        );
        assert_eq!(series.column("Close").unwrap(), vec![100.75, 101.75, 103.25]);
        assert_eq!(series.column("Volume").unwrap(), vec![1100.0, 1200.0, 1300.0]);
    }

    #[test]
    fn alpha_vantage_intraday_uses_native_close() {
        let body = "\
timestamp,open,high,low,close,volume
2024-01-04 19:55:00,10.0,11.0,9.5,10.5,100
2024-01-04 19:50:00,9.0,10.0,8.5,9.5,90
";
        let series = run(ProviderKind::AlphaVantage, "IBM", body).unwrap();
        assert_eq!(series.first().unwrap().timestamp, dt(2024, 1, 4, 19, 50, 0));
        assert_eq!(series.column("Close").unwrap(), vec![9.5, 10.5]);
    }

    #[test]
    fn yahoo_prefers_adj_close() {
        let body = "\
Date,Open,High,Low,Close,Adj Close,Volume
2024-01-02,472.16,473.67,470.49,472.65,466.12,123623700
";
        let series = run(ProviderKind::Yahoo, "SPY", body).unwrap();
        assert_eq!(series.bars()[0].close, 466.12);
        assert_eq!(series.bars()[0].volume, 123_623_700.0);
    }

    #[test]
    fn kline_open_time_becomes_utc_seconds() {
        // 2017-07-03T00:00:00.789Z; the sub-second part is truncated.
        let body = r#"[[1499040000789,"0.0163","0.8","0.0157","0.0157","148976.11",1499644799999,"2434.19",308,"1756.87","28.46","0"]]"#;
        let series = run(ProviderKind::Binance, "BTCUSDT", body).unwrap();
        assert_eq!(series.bars()[0].timestamp, dt(2017, 7, 3, 0, 0, 0));
        assert_eq!(series.bars()[0].volume, 148_976.11);
    }

    #[test]
    fn non_numeric_price_is_invalid_value() {
        let body = "timestamp,open,high,low,close,volume\n2024-01-04,abc,11,9,10,100\n";
        match run(ProviderKind::AlphaVantage, "IBM", body).unwrap_err() {
            DataError::InvalidValue {
                field, row, value, ..
            } => {
                assert_eq!(field, "open");
                assert_eq!(row, 0);
                assert_eq!(value, "abc");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn non_finite_text_is_invalid_value() {
        for (close, volume, field, value) in [
            ("NaN", "100", "close", "NaN"),
            ("10", "inf", "volume", "inf"),
            ("-Infinity", "100", "close", "-Infinity"),
        ] {
            let body = format!(
                "timestamp,open,high,low,close,volume\n2024-01-04,10,11,9,{close},{volume}\n"
            );
            match run(ProviderKind::AlphaVantage, "IBM", &body).unwrap_err() {
                DataError::InvalidValue {
                    field: f, value: v, ..
                } => {
                    assert_eq!(f, field);
                    assert_eq!(v, value);
                }
                other => panic!("expected InvalidValue, got {other:?}"),
            }
        }
    }

    #[test]
    fn non_finite_number_is_invalid_value() {
        let mut row = RawRow::new();
        row.push("timestamp", RawValue::Text("2024-01-04".into()));
        for field in ["open", "high", "low", "close"] {
            row.push(field, RawValue::Number(1.0));
        }
        row.push("volume", RawValue::Number(f64::NAN));
        let mut table = RawTable::new(
            ["timestamp", "open", "high", "low", "close", "volume"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        );
        table.rows.push(row);

        let ctx = FetchContext::new(ProviderKind::AlphaVantage, "IBM");
        assert!(matches!(
            normalize_with(&table, &FieldMap::ALPHA_VANTAGE, &ctx),
            Err(DataError::InvalidValue { ref field, .. }) if field == "volume"
        ));
    }

    #[test]
    fn null_volume_is_invalid_value() {
        let body = "Date,Open,High,Low,Close,Volume\n2024-01-02,1,2,0.5,1.5,\n";
        assert!(matches!(
            run(ProviderKind::Yahoo, "SPY", body),
            Err(DataError::InvalidValue { .. })
        ));
    }

    #[test]
    fn unparsable_time_key_is_invalid_value() {
        let body = "timestamp,open,high,low,close,volume\nyesterday,1,2,0.5,1.5,10\n";
        match run(ProviderKind::AlphaVantage, "IBM", body).unwrap_err() {
            DataError::InvalidValue { field, .. } => assert_eq!(field, "timestamp"),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn from_epoch_truncates_milliseconds() {
        assert_eq!(
            from_epoch(1_499_040_000_999, EpochUnit::Milliseconds),
            Some(dt(2017, 7, 3, 0, 0, 0))
        );
        assert_eq!(
            from_epoch(1_704_205_800, EpochUnit::Seconds),
            Some(dt(2024, 1, 2, 14, 30, 0))
        );
    }

    #[test]
    fn time_text_formats() {
        assert_eq!(parse_time_text("2024-01-02"), Some(dt(2024, 1, 2, 0, 0, 0)));
        assert_eq!(parse_time_text("2024-01-02 09:30:00"), Some(dt(2024, 1, 2, 9, 30, 0)));
        assert_eq!(parse_time_text("2024-01-02T09:30:00"), Some(dt(2024, 1, 2, 9, 30, 0)));
        assert_eq!(parse_time_text("01/02/2024"), None);
    }
}

//! Polars schema of a `CanonicalSeries` and conversion to/from `DataFrame`.
//!
//! Columns, in order: `Timestamp` (microsecond datetime, no timezone), then
//! `Open`, `High`, `Low`, `Close`, `Volume` as Float64.

use crate::domain::{Bar, CanonicalSeries};
use chrono::{DateTime, NaiveDateTime, Timelike};
use polars::prelude::*;

/// Expected schema for a canonical series.
pub struct SeriesSchema;

impl SeriesSchema {
    /// The timestamp column's data type.
    pub fn timestamp_dtype() -> DataType {
        DataType::Datetime(TimeUnit::Microseconds, None)
    }

    /// Get the canonical series schema.
    pub fn schema() -> Schema {
        let mut fields = vec![Field::new(
            CanonicalSeries::INDEX.into(),
            Self::timestamp_dtype(),
        )];
        fields.extend(
            CanonicalSeries::COLUMNS
                .iter()
                .map(|name| Field::new((*name).into(), DataType::Float64)),
        );
        Schema::from_iter(fields)
    }

    /// Validate a DataFrame against the schema: columns, types, and order.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let expected = Self::schema();
        let actual = df.schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        let expected_names: Vec<String> =
            expected.iter_names().map(|n| n.to_string()).collect();
        let actual_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        if expected_names != actual_names {
            return Err(SchemaError::ColumnOrder {
                expected: expected_names,
                actual: actual_names,
            });
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("Column order {actual:?} does not match {expected:?}")]
    ColumnOrder {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Null {column} at row {row}")]
    NullValue { column: String, row: usize },

    #[error("Timestamp at row {row} does not advance past the previous row")]
    Unordered { row: usize },

    #[error("Timestamp {0} has sub-microsecond precision")]
    Precision(NaiveDateTime),

    #[error("Timestamp out of range at row {0}")]
    TimestampRange(usize),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Convert a series to a DataFrame matching [`SeriesSchema::schema`].
pub fn to_dataframe(series: &CanonicalSeries) -> Result<DataFrame, SchemaError> {
    let mut micros = Vec::with_capacity(series.len());
    for bar in series {
        if bar.timestamp.nanosecond() % 1_000 != 0 {
            return Err(SchemaError::Precision(bar.timestamp));
        }
        micros.push(bar.timestamp.and_utc().timestamp_micros());
    }

    let mut columns = vec![Column::new(CanonicalSeries::INDEX.into(), micros)
        .cast(&SeriesSchema::timestamp_dtype())?];
    for name in CanonicalSeries::COLUMNS {
        let values: Vec<f64> = series
            .iter()
            .map(|b| b.value(name).unwrap_or(f64::NAN))
            .collect();
        columns.push(Column::new(name.into(), values));
    }

    Ok(DataFrame::new(columns)?)
}

/// Convert a validated DataFrame back into a series.
///
/// Rows must already be strictly increasing by timestamp; nothing is re-sorted.
pub fn from_dataframe(df: &DataFrame) -> Result<CanonicalSeries, SchemaError> {
    SeriesSchema::validate(df)?;

    let timestamps = df.column(CanonicalSeries::INDEX)?.cast(&DataType::Int64)?;
    let timestamps = timestamps.i64()?;
    let values = CanonicalSeries::COLUMNS
        .iter()
        .map(|name| Ok(df.column(name)?.f64()?.clone()))
        .collect::<Result<Vec<Float64Chunked>, PolarsError>>()?;

    let value_at = |col: usize, row: usize| -> Result<f64, SchemaError> {
        values[col].get(row).ok_or_else(|| SchemaError::NullValue {
            column: CanonicalSeries::COLUMNS[col].to_string(),
            row,
        })
    };

    let mut bars: Vec<Bar> = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let micros = timestamps.get(row).ok_or_else(|| SchemaError::NullValue {
            column: CanonicalSeries::INDEX.to_string(),
            row,
        })?;
        let timestamp = DateTime::from_timestamp_micros(micros)
            .ok_or(SchemaError::TimestampRange(row))?
            .naive_utc();
        if bars.last().is_some_and(|prev| prev.timestamp >= timestamp) {
            return Err(SchemaError::Unordered { row });
        }

        bars.push(Bar {
            timestamp,
            open: value_at(0, row)?,
            high: value_at(1, row)?,
            low: value_at(2, row)?,
            close: value_at(3, row)?,
            volume: value_at(4, row)?,
        });
    }

    Ok(CanonicalSeries::from_sorted_unchecked(bars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> CanonicalSeries {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        CanonicalSeries::from_bars(vec![
            Bar {
                timestamp: day.and_hms_opt(9, 30, 0).unwrap(),
                open: 100.0,
                high: 101.5,
                low: 99.25,
                close: 101.0,
                volume: 12_000.0,
            },
            Bar {
                timestamp: day.and_hms_opt(9, 35, 0).unwrap(),
                open: 101.0,
                high: 102.0,
                low: 100.5,
                close: 100.75,
                volume: 8_000.0,
            },
        ])
    }

    #[test]
    fn test_schema_has_all_required_columns() {
        let schema = SeriesSchema::schema();
        assert!(schema.contains("Timestamp"));
        for name in CanonicalSeries::COLUMNS {
            assert!(schema.contains(name));
        }
        assert_eq!(schema.len(), 6);
    }

    #[test]
    fn test_dataframe_roundtrip() {
        let series = sample();
        let df = to_dataframe(&series).unwrap();
        assert_eq!(df.height(), 2);
        assert!(SeriesSchema::validate(&df).is_ok());
        assert_eq!(from_dataframe(&df).unwrap(), series);
    }

    #[test]
    fn test_empty_series_roundtrip() {
        let df = to_dataframe(&CanonicalSeries::empty()).unwrap();
        assert_eq!(df.height(), 0);
        assert!(from_dataframe(&df).unwrap().is_empty());
    }

    #[test]
    fn test_validate_rejects_missing_column() {
        let df = to_dataframe(&sample()).unwrap().drop("Volume").unwrap();
        assert!(matches!(
            SeriesSchema::validate(&df).unwrap_err(),
            SchemaError::MissingColumn(c) if c == "Volume"
        ));
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let mut df = to_dataframe(&sample()).unwrap();
        df.with_column(Column::new("Open".into(), &["a", "b"])).unwrap();
        assert!(matches!(
            SeriesSchema::validate(&df).unwrap_err(),
            SchemaError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_validate_rejects_reordered_columns() {
        let df = to_dataframe(&sample()).unwrap();
        let reordered = df
            .select(["Timestamp", "Close", "Open", "High", "Low", "Volume"])
            .unwrap();
        assert!(matches!(
            SeriesSchema::validate(&reordered).unwrap_err(),
            SchemaError::ColumnOrder { .. }
        ));
    }

    #[test]
    fn test_sub_microsecond_timestamps_are_rejected() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_nano_opt(0, 0, 0, 1)
            .unwrap();
        let series = CanonicalSeries::from_bars(vec![Bar {
            timestamp: ts,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
        }]);
        assert!(matches!(
            to_dataframe(&series).unwrap_err(),
            SchemaError::Precision(_)
        ));
    }
}

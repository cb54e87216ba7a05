//! Delimited-text store: `Timestamp,Open,High,Low,Close,Volume`.
//!
//! Timestamps are written as `%Y-%m-%d` when every row sits at midnight,
//! otherwise with full time and fractional seconds. Floats use Rust's
//! shortest round-trip formatting, so reading back yields identical bits.

use super::{
    check_identifier, commit_with_meta, ensure_dir, persistence, tmp_path, verify_against_meta,
    SeriesStore, StoreFormat, StoreMeta,
};
use crate::data::normalize::parse_time_text;
use crate::data::DataError;
use crate::domain::{Bar, CanonicalSeries};
use chrono::NaiveTime;
use std::path::{Path, PathBuf};
use tracing::info;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// CSV files under one directory.
#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{dir}/{identifier}.csv`
    pub fn path(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{identifier}.csv"))
    }

    fn header() -> Vec<&'static str> {
        let mut header = vec![CanonicalSeries::INDEX];
        header.extend(CanonicalSeries::COLUMNS);
        header
    }
}

impl SeriesStore for CsvStore {
    fn write(&self, identifier: &str, series: &CanonicalSeries) -> Result<(), DataError> {
        check_identifier(identifier)?;
        ensure_dir(identifier, &self.dir)?;

        let path = self.path(identifier);
        let tmp = tmp_path(&path);
        let io_err = |e: ::csv::Error| persistence(identifier, format!("csv write: {e}"));

        let time_format = if series.iter().all(|b| b.timestamp.time() == NaiveTime::MIN) {
            DATE_FORMAT
        } else {
            DATETIME_FORMAT
        };

        {
            let mut writer = ::csv::Writer::from_path(&tmp).map_err(io_err)?;
            writer.write_record(Self::header()).map_err(io_err)?;
            for bar in series {
                let mut record = Vec::with_capacity(6);
                record.push(bar.timestamp.format(time_format).to_string());
                record.extend(bar.values().iter().map(f64::to_string));
                writer.write_record(&record).map_err(io_err)?;
            }
            writer
                .flush()
                .map_err(|e| persistence(identifier, format!("csv flush: {e}")))?;
        }

        let meta = StoreMeta::describe(identifier, StoreFormat::Csv, series);
        commit_with_meta(&self.dir, &tmp, &path, &meta)?;
        info!(identifier, rows = series.len(), path = %path.display(), "wrote csv");
        Ok(())
    }

    fn read(&self, identifier: &str) -> Result<CanonicalSeries, DataError> {
        check_identifier(identifier)?;
        let path = self.path(identifier);
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&path)
            .map_err(|e| persistence(identifier, format!("open {}: {e}", path.display())))?;

        let headers = reader
            .headers()
            .map_err(|e| persistence(identifier, format!("csv header: {e}")))?;
        let expected = Self::header();
        if headers.iter().ne(expected.iter().copied()) {
            return Err(persistence(
                identifier,
                format!("header {:?} does not match {:?}", headers, expected),
            ));
        }

        let mut bars: Vec<Bar> = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record =
                record.map_err(|e| persistence(identifier, format!("row {row}: {e}")))?;
            let field = |i: usize| record.get(i).unwrap_or("");

            let timestamp = parse_time_text(field(0)).ok_or_else(|| {
                persistence(identifier, format!("row {row}: bad timestamp '{}'", field(0)))
            })?;
            if bars.last().is_some_and(|prev| prev.timestamp >= timestamp) {
                return Err(persistence(
                    identifier,
                    format!("row {row}: timestamps not strictly increasing"),
                ));
            }

            let mut values = [0.0f64; 5];
            for (i, slot) in values.iter_mut().enumerate() {
                let text = field(i + 1);
                *slot = text.parse().map_err(|_| {
                    persistence(
                        identifier,
                        format!("row {row}: bad {} '{text}'", CanonicalSeries::COLUMNS[i]),
                    )
                })?;
            }
            let [open, high, low, close, volume] = values;
            bars.push(Bar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        let series = CanonicalSeries::from_sorted_unchecked(bars);
        verify_against_meta(&self.dir, identifier, &series)?;
        Ok(series)
    }
}

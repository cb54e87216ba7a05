//! Parquet store via polars.
//!
//! Files follow [`SeriesSchema`](crate::schema::SeriesSchema); anything else
//! is rejected on read rather than coerced.

use super::{
    check_identifier, commit_with_meta, ensure_dir, persistence, tmp_path, verify_against_meta,
    SeriesStore, StoreFormat, StoreMeta,
};
use crate::data::DataError;
use crate::domain::CanonicalSeries;
use crate::schema::{from_dataframe, to_dataframe};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Parquet files under one directory.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    dir: PathBuf,
}

impl ParquetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{dir}/{identifier}.parquet`
    pub fn path(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{identifier}.parquet"))
    }
}

impl SeriesStore for ParquetStore {
    fn write(&self, identifier: &str, series: &CanonicalSeries) -> Result<(), DataError> {
        check_identifier(identifier)?;
        ensure_dir(identifier, &self.dir)?;

        let mut df = to_dataframe(series).map_err(|e| persistence(identifier, e.to_string()))?;
        let path = self.path(identifier);
        let tmp = tmp_path(&path);

        let file = fs::File::create(&tmp)
            .map_err(|e| persistence(identifier, format!("create file: {e}")))?;
        ParquetWriter::new(file).finish(&mut df).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            persistence(identifier, format!("write parquet: {e}"))
        })?;

        let meta = StoreMeta::describe(identifier, StoreFormat::Parquet, series);
        commit_with_meta(&self.dir, &tmp, &path, &meta)?;
        info!(identifier, rows = series.len(), path = %path.display(), "wrote parquet");
        Ok(())
    }

    fn read(&self, identifier: &str) -> Result<CanonicalSeries, DataError> {
        check_identifier(identifier)?;
        let path = self.path(identifier);
        let file = fs::File::open(&path)
            .map_err(|e| persistence(identifier, format!("open {}: {e}", path.display())))?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| persistence(identifier, format!("read: {e}")))?;

        let series = from_dataframe(&df).map_err(|e| persistence(identifier, e.to_string()))?;
        verify_against_meta(&self.dir, identifier, &series)?;
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::NaiveDate;

    fn sample() -> CanonicalSeries {
        let day = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let bars = (0..24)
            .map(|h| Bar {
                timestamp: day.and_hms_opt(h, 0, 0).unwrap(),
                open: 27_000.0 + h as f64 * 0.1,
                high: 27_100.25,
                low: 26_900.0,
                close: 27_050.0 + 1.0 / (h as f64 + 3.0),
                volume: 1.0e-8 * h as f64,
            })
            .collect();
        CanonicalSeries::from_bars(bars)
    }

    #[test]
    fn write_and_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        store.write("BTCUSDT_60m", &sample()).unwrap();

        assert!(store.path("BTCUSDT_60m").exists());
        assert_eq!(store.read("BTCUSDT_60m").unwrap(), sample());
    }

    #[test]
    fn empty_series_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        store.write("EMPTY", &CanonicalSeries::empty()).unwrap();
        assert!(store.read("EMPTY").unwrap().is_empty());
    }

    #[test]
    fn foreign_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut df = df!(
            "date" => &[1i32, 2],
            "close" => &[1.0f64, 2.0],
        )
        .unwrap();
        let file = fs::File::create(dir.path().join("OTHER.parquet")).unwrap();
        ParquetWriter::new(file).finish(&mut df).unwrap();

        let err = ParquetStore::new(dir.path()).read("OTHER").unwrap_err();
        match err {
            DataError::Persistence { reason, .. } => assert!(reason.contains("Timestamp")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rewrite_replaces_sidecar_with_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        store.write("X", &sample()).unwrap();

        let shorter = CanonicalSeries::from_bars(sample().bars()[..5].to_vec());
        fs::create_dir(dir.path().join("X.meta.json.tmp")).unwrap();
        assert!(store.write("X", &shorter).is_err());
        assert_eq!(store.read("X").unwrap(), shorter);

        fs::remove_dir(dir.path().join("X.meta.json.tmp")).unwrap();
        store.write("X", &shorter).unwrap();
        let meta = crate::store::read_meta(dir.path(), "X").unwrap().unwrap();
        assert_eq!(meta.rows, 5);
        assert_eq!(store.read("X").unwrap(), shorter);
    }

    #[test]
    fn stale_sidecar_fails_integrity_check() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        store.write("X", &sample()).unwrap();

        // Overwrite the data without updating the sidecar.
        let truncated = CanonicalSeries::from_bars(sample().bars()[..3].to_vec());
        let mut df = to_dataframe(&truncated).unwrap();
        let file = fs::File::create(store.path("X")).unwrap();
        ParquetWriter::new(file).finish(&mut df).unwrap();

        assert!(matches!(
            store.read("X").unwrap_err(),
            DataError::Persistence { .. }
        ));
    }
}

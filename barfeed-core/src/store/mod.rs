//! Persistence collaborators: write a canonical series under an identifier and
//! read it back unchanged.
//!
//! Layout: `{dir}/{identifier}.{csv|parquet}` plus `{dir}/{identifier}.meta.json`.
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Metadata sidecar per identifier (row count, first/last timestamp, content hash)
//! - Integrity check on read when a sidecar is present

pub mod csv;
pub mod parquet;

pub use self::csv::CsvStore;
pub use self::parquet::ParquetStore;

use crate::data::DataError;
use crate::domain::CanonicalSeries;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Write/read of canonical series by identifier.
///
/// `read(write(id, s))` returns a series equal to `s`: same rows, same order,
/// same timestamps, same values.
pub trait SeriesStore: Send + Sync {
    fn write(&self, identifier: &str, series: &CanonicalSeries) -> Result<(), DataError>;

    fn read(&self, identifier: &str) -> Result<CanonicalSeries, DataError>;
}

/// On-disk encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFormat {
    Csv,
    Parquet,
}

impl StoreFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            StoreFormat::Csv => "csv",
            StoreFormat::Parquet => "parquet",
        }
    }

    /// A store of this format rooted at `dir`.
    pub fn open(self, dir: impl Into<PathBuf>) -> Box<dyn SeriesStore> {
        match self {
            StoreFormat::Csv => Box::new(CsvStore::new(dir)),
            StoreFormat::Parquet => Box::new(ParquetStore::new(dir)),
        }
    }
}

impl fmt::Display for StoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for StoreFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(StoreFormat::Csv),
            "parquet" | "pq" => Ok(StoreFormat::Parquet),
            other => Err(format!("unknown format '{other}'. Valid: csv, parquet")),
        }
    }
}

/// Metadata sidecar for a stored series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub identifier: String,
    pub format: StoreFormat,
    pub rows: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    pub content_hash: String,
    pub written_at: NaiveDateTime,
}

impl StoreMeta {
    pub fn describe(identifier: &str, format: StoreFormat, series: &CanonicalSeries) -> Self {
        Self {
            identifier: identifier.to_string(),
            format,
            rows: series.len(),
            first: series.first().map(|b| b.timestamp),
            last: series.last().map(|b| b.timestamp),
            content_hash: content_hash(series),
            written_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Check that `series` is what was written.
    pub fn verify(&self, series: &CanonicalSeries) -> Result<(), DataError> {
        if self.rows != series.len() {
            return Err(persistence(
                &self.identifier,
                format!("sidecar records {} rows, file has {}", self.rows, series.len()),
            ));
        }
        if self.content_hash != content_hash(series) {
            return Err(persistence(&self.identifier, "content hash mismatch"));
        }
        Ok(())
    }
}

/// blake3 over every timestamp and value, in row order.
pub fn content_hash(series: &CanonicalSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in series {
        let ts = bar.timestamp.and_utc();
        hasher.update(&ts.timestamp().to_le_bytes());
        hasher.update(&ts.timestamp_subsec_nanos().to_le_bytes());
        for v in bar.values() {
            hasher.update(&v.to_bits().to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

pub(crate) fn persistence(identifier: &str, reason: impl Into<String>) -> DataError {
    DataError::Persistence {
        identifier: identifier.to_string(),
        reason: reason.into(),
    }
}

/// Identifiers name a single file inside the store directory.
pub(crate) fn check_identifier(identifier: &str) -> Result<(), DataError> {
    if identifier.is_empty()
        || identifier == "."
        || identifier == ".."
        || identifier.contains(['/', '\\'])
    {
        return Err(persistence(identifier, "identifier must be a plain file name"));
    }
    Ok(())
}

fn meta_path(dir: &Path, identifier: &str) -> PathBuf {
    dir.join(format!("{identifier}.meta.json"))
}

/// Temporary sibling of `path` used for atomic writes.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Move a finished temp file into place; the temp file is removed on failure.
pub(crate) fn commit(identifier: &str, tmp: &Path, path: &Path) -> Result<(), DataError> {
    fs::rename(tmp, path).map_err(|e| {
        let _ = fs::remove_file(tmp);
        persistence(identifier, format!("atomic rename failed: {e}"))
    })
}

/// Move a finished data file into place together with its sidecar.
///
/// The previous sidecar is removed before the data file is replaced, so a
/// failure part-way leaves data without a sidecar, never data next to a
/// sidecar describing something else.
pub(crate) fn commit_with_meta(
    dir: &Path,
    tmp: &Path,
    path: &Path,
    meta: &StoreMeta,
) -> Result<(), DataError> {
    let identifier = meta.identifier.as_str();
    match fs::remove_file(meta_path(dir, identifier)) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            let _ = fs::remove_file(tmp);
            return Err(persistence(identifier, format!("remove stale sidecar: {e}")));
        }
    }
    commit(identifier, tmp, path)?;
    write_meta(dir, meta)
}

pub(crate) fn ensure_dir(identifier: &str, dir: &Path) -> Result<(), DataError> {
    fs::create_dir_all(dir)
        .map_err(|e| persistence(identifier, format!("failed to create dir: {e}")))
}

pub(crate) fn write_meta(dir: &Path, meta: &StoreMeta) -> Result<(), DataError> {
    let json = serde_json::to_string_pretty(meta)
        .map_err(|e| persistence(&meta.identifier, format!("meta serialization: {e}")))?;
    let path = meta_path(dir, &meta.identifier);
    let tmp = tmp_path(&path);
    fs::write(&tmp, json)
        .map_err(|e| persistence(&meta.identifier, format!("meta write: {e}")))?;
    commit(&meta.identifier, &tmp, &path)
}

/// The sidecar for `identifier`, if one was written.
pub fn read_meta(dir: &Path, identifier: &str) -> Result<Option<StoreMeta>, DataError> {
    let path = meta_path(dir, identifier);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)
        .map_err(|e| persistence(identifier, format!("meta read: {e}")))?;
    let meta = serde_json::from_str(&content)
        .map_err(|e| persistence(identifier, format!("meta parse: {e}")))?;
    Ok(Some(meta))
}

/// Verify `series` against its sidecar, when there is one.
pub(crate) fn verify_against_meta(
    dir: &Path,
    identifier: &str,
    series: &CanonicalSeries,
) -> Result<(), DataError> {
    match read_meta(dir, identifier)? {
        Some(meta) => {
            meta.verify(series)?;
            debug!(identifier, rows = series.len(), "sidecar verified");
            Ok(())
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::NaiveDate;

    fn series(close: f64) -> CanonicalSeries {
        CanonicalSeries::from_bars(vec![Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close,
            volume: 10.0,
        }])
    }

    #[test]
    fn hash_depends_on_values() {
        assert_eq!(content_hash(&series(1.5)), content_hash(&series(1.5)));
        assert_ne!(content_hash(&series(1.5)), content_hash(&series(1.6)));
    }

    #[test]
    fn meta_verify_detects_changes() {
        let meta = StoreMeta::describe("SPY", StoreFormat::Csv, &series(1.5));
        assert_eq!(meta.rows, 1);
        assert!(meta.verify(&series(1.5)).is_ok());
        assert!(matches!(
            meta.verify(&series(1.6)).unwrap_err(),
            DataError::Persistence { .. }
        ));
        assert!(meta.verify(&CanonicalSeries::empty()).is_err());
    }

    #[test]
    fn identifiers_must_be_file_names() {
        assert!(check_identifier("SPY_daily").is_ok());
        assert!(check_identifier("").is_err());
        assert!(check_identifier("..").is_err());
        assert!(check_identifier("a/b").is_err());
    }

    #[test]
    fn tmp_path_is_a_sibling() {
        let tmp = tmp_path(Path::new("/data/SPY.csv"));
        assert_eq!(tmp, Path::new("/data/SPY.csv.tmp"));
    }

    #[test]
    fn format_names() {
        assert_eq!("CSV".parse::<StoreFormat>().unwrap(), StoreFormat::Csv);
        assert_eq!("parquet".parse::<StoreFormat>().unwrap(), StoreFormat::Parquet);
        assert!("xlsx".parse::<StoreFormat>().is_err());
    }
}

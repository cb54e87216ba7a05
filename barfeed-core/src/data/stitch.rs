//! Windowed fetching: partition a range into fixed-length day windows, run
//! the fetch → parse → normalize pipeline per window, and concatenate.
//!
//! Windows run concurrently on a pool bounded by the caller's limit. Results
//! are merged by window start date, never by completion order, and every
//! window is attempted even after a sibling fails.

use super::error::{DataError, WindowFailure};
use crate::domain::{CanonicalSeries, DateRange};
use chrono::{Duration, NaiveDate, Utc};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A closed run of calendar days `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    /// Number of calendar days covered.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Split `[start, end]` into consecutive windows of `days_per_window` days.
///
/// The last window is clipped at `end`. A reversed interval yields no windows.
pub fn partition(start: NaiveDate, end: NaiveDate, days_per_window: u32) -> Vec<Window> {
    let step = i64::from(days_per_window.max(1));
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let window_end = (cursor + Duration::days(step - 1)).min(end);
        windows.push(Window {
            start: cursor,
            end: window_end,
        });
        cursor = window_end + Duration::days(1);
    }
    windows
}

/// Runs a per-window pipeline over a date range with bounded concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stitcher {
    concurrency: usize,
    days_per_window: u32,
}

impl Stitcher {
    /// One-day windows, the shape used for intraday requests.
    pub fn daily_windows(concurrency: usize) -> Self {
        Self::new(concurrency, 1)
    }

    pub fn new(concurrency: usize, days_per_window: u32) -> Self {
        Self {
            concurrency: concurrency.max(1),
            days_per_window: days_per_window.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn days_per_window(&self) -> u32 {
        self.days_per_window
    }

    /// Resolve `range` into windows. An open end means "through today (UTC)".
    pub fn windows(&self, symbol: &str, range: &DateRange) -> Result<Vec<Window>, DataError> {
        let start = range.start.ok_or_else(|| DataError::InvalidRange {
            symbol: symbol.to_string(),
            reason: "a windowed request needs a start date".into(),
        })?;
        let end = range.end.unwrap_or_else(|| Utc::now().date_naive());
        Ok(partition(start, end, self.days_per_window))
    }

    /// Run `fetch_window` for every window of `range` and concatenate in date order.
    ///
    /// If any window fails the whole result is discarded and
    /// `PartialFetchFailure` names every failed window.
    pub fn stitch<F>(
        &self,
        symbol: &str,
        range: &DateRange,
        fetch_window: F,
    ) -> Result<CanonicalSeries, DataError>
    where
        F: Fn(Window) -> Result<CanonicalSeries, DataError> + Sync,
    {
        let windows = self.windows(symbol, range)?;
        debug!(
            symbol,
            windows = windows.len(),
            concurrency = self.concurrency,
            "stitching windows"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .build()
            .map_err(|e| DataError::WorkerPool(e.to_string()))?;

        let results: BTreeMap<NaiveDate, (Window, Result<CanonicalSeries, DataError>)> = pool
            .install(|| {
                windows
                    .par_iter()
                    .map(|&w| (w.start, (w, fetch_window(w))))
                    .collect()
            });

        let mut parts = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (_, (window, result)) in results {
            match result {
                Ok(series) => parts.push(series),
                Err(error) => failed.push(WindowFailure {
                    window_start: window.start,
                    window_end: window.end,
                    error: Box::new(error),
                }),
            }
        }

        if !failed.is_empty() {
            return Err(DataError::PartialFetchFailure {
                symbol: symbol.to_string(),
                failed,
            });
        }

        let series = CanonicalSeries::concat(parts);
        info!(symbol, windows = windows.len(), rows = series.len(), "stitched series");
        Ok(series)
    }
}

//! Bar and CanonicalSeries, the single output type of every provider.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One OHLCV observation at a canonical timestamp.
///
/// `close` is always the adjustment-applied close when the provider reports one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Returns true if any OHLCV field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
            || self.volume.is_nan()
    }

    /// Value of a canonical column by name.
    pub fn value(&self, column: &str) -> Option<f64> {
        match column {
            "Open" => Some(self.open),
            "High" => Some(self.high),
            "Low" => Some(self.low),
            "Close" => Some(self.close),
            "Volume" => Some(self.volume),
            _ => None,
        }
    }

    /// The five values in canonical column order.
    pub fn values(&self) -> [f64; 5] {
        [self.open, self.high, self.low, self.close, self.volume]
    }
}

/// A normalized OHLCV time series.
///
/// Invariants held by every constructor:
/// - timestamps are strictly increasing (no duplicates)
/// - the column set is exactly [`CanonicalSeries::COLUMNS`], in that order
///
/// A series is immutable once built; selection and stitching produce new series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalSeries {
    bars: Vec<Bar>,
}

impl CanonicalSeries {
    /// Label of the temporal key.
    pub const INDEX: &'static str = "Timestamp";

    /// Canonical value columns, in order.
    pub const COLUMNS: [&'static str; 5] = ["Open", "High", "Low", "Close", "Volume"];

    /// A zero-row series.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a series from bars in any order.
    ///
    /// Rows are stably sorted by timestamp; when several rows share a timestamp
    /// the first one delivered wins and the rest are dropped.
    pub fn from_bars(mut bars: Vec<Bar>) -> Self {
        bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        let before = bars.len();
        bars.dedup_by(|later, earlier| later.timestamp == earlier.timestamp);
        let dropped = before - bars.len();
        if dropped > 0 {
            warn!(dropped, "dropped rows with duplicate timestamps");
        }
        Self { bars }
    }

    /// Concatenate series that are already in chronological order.
    ///
    /// Never re-sorts. Leading rows of a later part that do not advance past
    /// the previous part's last timestamp are dropped.
    pub fn concat<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = CanonicalSeries>,
    {
        let mut bars: Vec<Bar> = Vec::new();
        for part in parts {
            let last = bars.last().map(|b| b.timestamp);
            let skip = match last {
                Some(last) => part.bars.iter().take_while(|b| b.timestamp <= last).count(),
                None => 0,
            };
            if skip > 0 {
                warn!(dropped = skip, "dropped overlapping rows at window boundary");
            }
            bars.extend(part.bars.into_iter().skip(skip));
        }
        Self { bars }
    }

    /// Wrap bars already known to satisfy the ordering invariant.
    pub(crate) fn from_sorted_unchecked(bars: Vec<Bar>) -> Self {
        debug_assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        Self { bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// The temporal index.
    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    /// All values of one canonical column, or `None` for an unknown name.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        if !Self::COLUMNS.contains(&name) {
            return None;
        }
        self.bars.iter().map(|b| b.value(name)).collect()
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

impl<'a> IntoIterator for &'a CanonicalSeries {
    type Item = &'a Bar;
    type IntoIter = std::slice::Iter<'a, Bar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}

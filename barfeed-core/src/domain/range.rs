//! DateRange and the range selector.

use super::series::CanonicalSeries;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar-date interval; `None` on a side means unbounded on that side.
///
/// Both bounds are inclusive and compare against the calendar date of each
/// timestamp, so an end date keeps every intraday bar of that day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// No filtering on either side.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn from(start: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn until(end: NaiveDate) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        let date = timestamp.date();
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    /// Select the rows of `series` that fall inside this range.
    ///
    /// Returns the maximal contiguous run of in-range rows as a new series.
    /// An unbounded range returns an identical copy; an empty result is valid.
    pub fn select(&self, series: &CanonicalSeries) -> CanonicalSeries {
        if self.is_unbounded() {
            return series.clone();
        }
        let bars = series.bars();
        let lo = match self.start {
            Some(start) => bars.partition_point(|b| b.timestamp.date() < start),
            None => 0,
        };
        let hi = match self.end {
            Some(end) => bars.partition_point(|b| b.timestamp.date() <= end),
            None => bars.len(),
        };
        if lo >= hi {
            return CanonicalSeries::empty();
        }
        CanonicalSeries::from_sorted_unchecked(bars[lo..hi].to_vec())
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (Some(s), Some(e)) => write!(f, "{s}..={e}"),
            (Some(s), None) => write!(f, "{s}.."),
            (None, Some(e)) => write!(f, "..={e}"),
            (None, None) => write!(f, ".."),
        }
    }
}

impl CanonicalSeries {
    /// Shorthand for [`DateRange::select`].
    pub fn select(&self, range: &DateRange) -> CanonicalSeries {
        range.select(self)
    }
}

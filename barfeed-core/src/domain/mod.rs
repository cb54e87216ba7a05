//! Domain types: canonical bars, series, and date ranges.

pub mod range;
pub mod series;

pub use range::DateRange;
pub use series::{Bar, CanonicalSeries};

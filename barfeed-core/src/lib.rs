//! Barfeed Core: OHLCV retrieval and normalization across market data providers.
//!
//! This crate turns each provider's raw response into one canonical series:
//! - Domain types (bars, canonical series, date ranges)
//! - RawRecord parsers for Alpha Vantage CSV, Yahoo CSV/chart JSON, Binance klines
//! - Schema normalizer driven by per-provider field maps
//! - Range selection and windowed intraday stitching
//! - Provider adapters behind one `MarketDataProvider` trait
//! - CSV and Parquet stores with an integrity sidecar

pub mod config;
pub mod data;
pub mod domain;
pub mod schema;
pub mod store;

pub use config::FeedConfig;
pub use data::{build_provider, DataError, MarketDataProvider, ProviderKind};
pub use domain::{Bar, CanonicalSeries, DateRange};

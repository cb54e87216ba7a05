//! Provider kinds, the shared adapter trait, and the provider factory.
//!
//! Each data source implements `MarketDataProvider` with the same two
//! operations; which implementation runs is decided once, at construction.

use super::alpha_vantage::AlphaVantageProvider;
use super::binance::BinanceProvider;
use super::error::DataError;
use super::normalize::normalize;
use super::parse::parse_payload;
use super::transport::{FetchRequest, Transport};
use super::yahoo::YahooProvider;
use crate::config::FeedConfig;
use crate::domain::{CanonicalSeries, DateRange};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// The supported data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    AlphaVantage,
    Yahoo,
    Binance,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::AlphaVantage,
        ProviderKind::Yahoo,
        ProviderKind::Binance,
    ];

    /// Stable machine name.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::AlphaVantage => "alpha_vantage",
            ProviderKind::Yahoo => "yahoo",
            ProviderKind::Binance => "binance",
        }
    }

    /// Whether a zero-row payload is a valid answer.
    ///
    /// Alpha Vantage and Yahoo return full histories, so no rows means the
    /// request went wrong. Binance requests are bounded by the window itself.
    pub fn allows_empty_payload(&self) -> bool {
        matches!(self, ProviderKind::Binance)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "alpha_vantage" | "alphavantage" | "av" => Ok(ProviderKind::AlphaVantage),
            "yahoo" | "yahoo_finance" => Ok(ProviderKind::Yahoo),
            "binance" => Ok(ProviderKind::Binance),
            other => Err(format!(
                "unknown provider '{other}'. Valid: alpha-vantage, yahoo, binance"
            )),
        }
    }
}

/// Provider and symbol a payload belongs to; used to label errors.
#[derive(Debug, Clone, Copy)]
pub struct FetchContext<'a> {
    pub provider: ProviderKind,
    pub symbol: &'a str,
}

impl<'a> FetchContext<'a> {
    pub fn new(provider: ProviderKind, symbol: &'a str) -> Self {
        Self { provider, symbol }
    }

    pub fn malformed(&self, reason: impl Into<String>) -> DataError {
        DataError::MalformedPayload {
            provider: self.provider,
            symbol: self.symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_value(&self, field: &str, row: usize, value: impl ToString) -> DataError {
        DataError::InvalidValue {
            provider: self.provider,
            symbol: self.symbol.to_string(),
            field: field.to_string(),
            row,
            value: value.to_string(),
        }
    }

    pub fn transport(&self, source: super::error::TransportError) -> DataError {
        DataError::Transport {
            provider: self.provider,
            symbol: self.symbol.to_string(),
            source,
        }
    }
}

/// Uniform interface over every data source.
///
/// Implementations own all transport details (endpoints, auth parameters,
/// response encoding). Results are always canonical and already restricted to
/// the requested range.
pub trait MarketDataProvider: Send + Sync {
    /// Which source this is.
    fn kind(&self) -> ProviderKind;

    /// Daily bars for `symbol` within `range`.
    fn daily_data(&self, symbol: &str, range: &DateRange) -> Result<CanonicalSeries, DataError>;

    /// Intraday bars sampled every `period_minutes` within `range`.
    fn intraday_data(
        &self,
        symbol: &str,
        range: &DateRange,
        period_minutes: u32,
    ) -> Result<CanonicalSeries, DataError> {
        let _ = (symbol, range, period_minutes);
        Err(DataError::UnsupportedOperation {
            provider: self.kind(),
            operation: "intraday data",
        })
    }

    /// The period `intraday_data` serves for a requested `period_minutes`,
    /// after the provider's snapping rules.
    fn intraday_period(&self, period_minutes: u32) -> Result<u32, DataError> {
        let _ = period_minutes;
        Err(DataError::UnsupportedOperation {
            provider: self.kind(),
            operation: "intraday data",
        })
    }

    /// Whether `intraday_data` is implemented.
    fn supports_intraday(&self) -> bool {
        false
    }
}

/// Run one request through fetch → parse → normalize.
///
/// No range selection happens here; callers select after stitching.
pub fn fetch_normalized(
    transport: &dyn Transport,
    request: &FetchRequest,
    ctx: &FetchContext<'_>,
) -> Result<CanonicalSeries, DataError> {
    let payload = transport.fetch(request).map_err(|e| ctx.transport(e))?;
    let table = parse_payload(&payload, ctx)?;
    let series = normalize(&table, ctx)?;
    info!(
        provider = %ctx.provider,
        symbol = ctx.symbol,
        raw_rows = table.len(),
        rows = series.len(),
        "normalized payload"
    );
    Ok(series)
}

/// Construct the adapter for `kind`.
pub fn build_provider(
    kind: ProviderKind,
    config: &FeedConfig,
    transport: Arc<dyn Transport>,
) -> Box<dyn MarketDataProvider> {
    match kind {
        ProviderKind::AlphaVantage => Box::new(AlphaVantageProvider::new(
            config.alpha_vantage.clone(),
            transport,
        )),
        ProviderKind::Yahoo => Box::new(YahooProvider::new(config.yahoo.clone(), transport)),
        ProviderKind::Binance => Box::new(BinanceProvider::new(
            config.binance.clone(),
            config.stitch.concurrency,
            transport,
        )),
    }
}

//! Alpha Vantage data provider.
//!
//! Daily bars come from `TIME_SERIES_DAILY_ADJUSTED`, intraday bars from
//! `TIME_SERIES_INTRADAY`; both requested as CSV and fetched in one call.

use super::error::DataError;
use super::period::PeriodPolicy;
use super::provider::{fetch_normalized, FetchContext, MarketDataProvider, ProviderKind};
use super::transport::{FetchRequest, Transport};
use crate::config::AlphaVantageConfig;
use crate::domain::{CanonicalSeries, DateRange};
use std::sync::Arc;

/// Intraday intervals Alpha Vantage serves; other requests snap to the nearest.
pub const INTRADAY_PERIODS: PeriodPolicy = PeriodPolicy {
    allowed: &[1, 5, 15, 30, 60],
    tolerance: None,
};

/// Alpha Vantage data provider.
pub struct AlphaVantageProvider {
    config: AlphaVantageConfig,
    api_key: String,
    transport: Arc<dyn Transport>,
}

impl AlphaVantageProvider {
    pub fn new(config: AlphaVantageConfig, transport: Arc<dyn Transport>) -> Self {
        let api_key = config.resolve_api_key();
        Self {
            config,
            api_key,
            transport,
        }
    }

    fn base_request(&self, function: &str, symbol: &str) -> FetchRequest {
        FetchRequest::new(self.config.base_url.as_str())
            .param("function", function)
            .param("symbol", symbol)
            .param("outputsize", &self.config.output_size)
            .param("datatype", "csv")
            .param("apikey", &self.api_key)
    }

    pub fn daily_request(&self, symbol: &str) -> FetchRequest {
        self.base_request("TIME_SERIES_DAILY_ADJUSTED", symbol)
    }

    pub fn intraday_request(&self, symbol: &str, minutes: u32) -> FetchRequest {
        self.base_request("TIME_SERIES_INTRADAY", symbol)
            .param("interval", format!("{minutes}min"))
    }
}

impl MarketDataProvider for AlphaVantageProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::AlphaVantage
    }

    fn daily_data(&self, symbol: &str, range: &DateRange) -> Result<CanonicalSeries, DataError> {
        let ctx = FetchContext::new(self.kind(), symbol);
        let series = fetch_normalized(self.transport.as_ref(), &self.daily_request(symbol), &ctx)?;
        Ok(range.select(&series))
    }

    fn intraday_data(
        &self,
        symbol: &str,
        range: &DateRange,
        period_minutes: u32,
    ) -> Result<CanonicalSeries, DataError> {
        let minutes = self.intraday_period(period_minutes)?;
        let ctx = FetchContext::new(self.kind(), symbol);
        let request = self.intraday_request(symbol, minutes);
        let series = fetch_normalized(self.transport.as_ref(), &request, &ctx)?;
        Ok(range.select(&series))
    }

    fn intraday_period(&self, period_minutes: u32) -> Result<u32, DataError> {
        INTRADAY_PERIODS.resolve(self.kind(), period_minutes)
    }

    fn supports_intraday(&self) -> bool {
        true
    }
}

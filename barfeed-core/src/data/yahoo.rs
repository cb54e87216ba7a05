//! Yahoo Finance data provider (daily bars only).
//!
//! Uses the v8 chart endpoint. The period bounds are derived from the
//! requested range; the returned series is still passed through range
//! selection so the bounds are exact.

use super::error::DataError;
use super::provider::{fetch_normalized, FetchContext, MarketDataProvider, ProviderKind};
use super::transport::{FetchRequest, Transport};
use crate::config::YahooConfig;
use crate::domain::{CanonicalSeries, DateRange};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;

/// Yahoo Finance data provider.
pub struct YahooProvider {
    config: YahooConfig,
    transport: Arc<dyn Transport>,
}

impl YahooProvider {
    pub fn new(config: YahooConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Build the chart request for a symbol and date range.
    ///
    /// An open start asks for the full history; an open end asks up to now.
    pub fn chart_request(&self, symbol: &str, range: &DateRange) -> FetchRequest {
        let period1 = range.start.map(day_start_ts).unwrap_or(0);
        let period2 = range
            .end
            .map(|end| day_start_ts(end + Duration::days(1)) - 1)
            .unwrap_or_else(|| Utc::now().timestamp());

        FetchRequest::new(format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            symbol
        ))
        .param("period1", period1)
        .param("period2", period2)
        .param("interval", "1d")
        .param("includeAdjustedClose", "true")
    }
}

fn day_start_ts(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

impl MarketDataProvider for YahooProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Yahoo
    }

    fn daily_data(&self, symbol: &str, range: &DateRange) -> Result<CanonicalSeries, DataError> {
        let ctx = FetchContext::new(self.kind(), symbol);
        let request = self.chart_request(symbol, range);
        let series = fetch_normalized(self.transport.as_ref(), &request, &ctx)?;
        Ok(range.select(&series))
    }
}

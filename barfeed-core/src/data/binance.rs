//! Binance kline provider.
//!
//! Binance caps every klines response at `page_limit` rows, so both daily and
//! intraday requests are split into windows and stitched. Intraday requests
//! use one-day windows; daily requests use `page_limit`-day windows. A page
//! limit too small to hold a whole window is rejected before any request,
//! since Binance would otherwise truncate the window without saying so.

use super::error::DataError;
use super::period::PeriodPolicy;
use super::provider::{fetch_normalized, FetchContext, MarketDataProvider, ProviderKind};
use super::stitch::{Stitcher, Window};
use super::transport::{FetchRequest, Transport};
use crate::config::BinanceConfig;
use crate::domain::{CanonicalSeries, DateRange};
use chrono::{Duration, NaiveDate, NaiveTime};
use std::sync::Arc;

/// Intraday intervals accepted as-is. Anything else is rejected.
pub const INTRADAY_PERIODS: PeriodPolicy = PeriodPolicy {
    allowed: &[3, 5, 15, 30, 60, 120, 240],
    tolerance: Some(0),
};

/// Largest `limit` the klines endpoint accepts.
pub const MAX_PAGE_LIMIT: u32 = 1000;

const MINUTES_PER_DAY: u32 = 1440;

/// Binance interval code for a period in minutes (`5m`, `1h`, `4h`).
pub fn interval_code(minutes: u32) -> String {
    if minutes >= 60 && minutes % 60 == 0 {
        format!("{}h", minutes / 60)
    } else {
        format!("{minutes}m")
    }
}

fn day_start_ms(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// Inclusive millisecond bounds of a window.
fn window_millis(window: Window) -> (i64, i64) {
    (
        day_start_ms(window.start),
        day_start_ms(window.end + Duration::days(1)) - 1,
    )
}

/// Binance kline provider.
pub struct BinanceProvider {
    config: BinanceConfig,
    concurrency: usize,
    transport: Arc<dyn Transport>,
}

impl BinanceProvider {
    pub fn new(config: BinanceConfig, concurrency: usize, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            concurrency,
            transport,
        }
    }

    /// Ensure one page holds every bar of a window of `bars_per_window` bars.
    fn check_page_limit(&self, period_minutes: u32, bars_per_window: u32) -> Result<(), DataError> {
        let page_limit = self.config.page_limit;
        if page_limit < bars_per_window.max(1) || page_limit > MAX_PAGE_LIMIT {
            return Err(DataError::PageLimit {
                provider: self.kind(),
                period_minutes,
                page_limit,
                required: bars_per_window.max(1),
                max: MAX_PAGE_LIMIT,
            });
        }
        Ok(())
    }

    fn base_request(&self, symbol: &str, interval: &str) -> FetchRequest {
        FetchRequest::new(self.config.base_url.as_str())
            .param("symbol", symbol)
            .param("interval", interval)
    }

    /// Klines request covering exactly one window.
    pub fn window_request(&self, symbol: &str, interval: &str, window: Window) -> FetchRequest {
        let (start_ms, end_ms) = window_millis(window);
        self.base_request(symbol, interval)
            .param("startTime", start_ms)
            .param("endTime", end_ms)
            .param("limit", self.config.page_limit)
    }

    fn fetch_window(
        &self,
        symbol: &str,
        interval: &str,
        window: Window,
    ) -> Result<CanonicalSeries, DataError> {
        let ctx = FetchContext::new(self.kind(), symbol);
        let request = self.window_request(symbol, interval, window);
        fetch_normalized(self.transport.as_ref(), &request, &ctx)
    }

    /// A single request for the most recent page up to `end`.
    fn fetch_latest(
        &self,
        symbol: &str,
        interval: &str,
        end: Option<NaiveDate>,
    ) -> Result<CanonicalSeries, DataError> {
        let ctx = FetchContext::new(self.kind(), symbol);
        let mut request = self.base_request(symbol, interval);
        if let Some(end) = end {
            request = request.param("endTime", day_start_ms(end + Duration::days(1)) - 1);
        }
        let request = request.param("limit", self.config.page_limit);
        fetch_normalized(self.transport.as_ref(), &request, &ctx)
    }
}

impl MarketDataProvider for BinanceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Binance
    }

    fn daily_data(&self, symbol: &str, range: &DateRange) -> Result<CanonicalSeries, DataError> {
        // Windows are `page_limit` days long, one bar per day.
        self.check_page_limit(MINUTES_PER_DAY, 1)?;
        let series = if range.start.is_some() {
            Stitcher::new(self.concurrency, self.config.page_limit)
                .stitch(symbol, range, |w| self.fetch_window(symbol, "1d", w))?
        } else {
            self.fetch_latest(symbol, "1d", range.end)?
        };
        Ok(range.select(&series))
    }

    fn intraday_data(
        &self,
        symbol: &str,
        range: &DateRange,
        period_minutes: u32,
    ) -> Result<CanonicalSeries, DataError> {
        let minutes = self.intraday_period(period_minutes)?;
        self.check_page_limit(minutes, MINUTES_PER_DAY.div_ceil(minutes))?;
        let interval = interval_code(minutes);
        let series = Stitcher::daily_windows(self.concurrency).stitch(symbol, range, |w| {
            self.fetch_window(symbol, &interval, w)
        })?;
        Ok(range.select(&series))
    }

    fn intraday_period(&self, period_minutes: u32) -> Result<u32, DataError> {
        INTRADAY_PERIODS.resolve(self.kind(), period_minutes)
    }

    fn supports_intraday(&self) -> bool {
        true
    }
}

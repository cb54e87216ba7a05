//! Structured error types for fetch, parse, normalize, stitch, and store.
//!
//! Every variant names the stage that failed and the symbol (or stored
//! identifier) it failed for, so CLI output is actionable on its own.

use super::provider::ProviderKind;
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

/// Failure reported by the transport collaborator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("HTTP {status} from {endpoint}")]
    Status { status: u16, endpoint: String },

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// One stitched window that could not be fetched or normalized.
#[derive(Debug)]
pub struct WindowFailure {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub error: Box<DataError>,
}

impl fmt::Display for WindowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.window_start == self.window_end {
            write!(f, "{}: {}", self.window_start, self.error)
        } else {
            write!(f, "{}..={}: {}", self.window_start, self.window_end, self.error)
        }
    }
}

/// Error taxonomy of the retrieval and normalization layer.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("transport error fetching {symbol} from {provider}: {source}")]
    Transport {
        provider: ProviderKind,
        symbol: String,
        #[source]
        source: TransportError,
    },

    #[error("malformed {provider} payload for {symbol}: {reason}")]
    MalformedPayload {
        provider: ProviderKind,
        symbol: String,
        reason: String,
    },

    #[error("invalid value in {provider} payload for {symbol}: field '{field}' row {row}: {value:?}")]
    InvalidValue {
        provider: ProviderKind,
        symbol: String,
        field: String,
        row: usize,
        value: String,
    },

    #[error("unsupported period {requested}min for {provider} (allowed: {allowed:?})")]
    UnsupportedPeriod {
        provider: ProviderKind,
        requested: u32,
        allowed: Vec<u32>,
    },

    #[error(
        "{provider} page limit {page_limit} cannot serve {period_minutes}min bars: \
         one request returns up to {required} bars and the limit must lie in {required}..={max}"
    )]
    PageLimit {
        provider: ProviderKind,
        period_minutes: u32,
        page_limit: u32,
        required: u32,
        max: u32,
    },

    #[error("{provider} does not support {operation}")]
    UnsupportedOperation {
        provider: ProviderKind,
        operation: &'static str,
    },

    #[error("invalid range for {symbol}: {reason}")]
    InvalidRange { symbol: String, reason: String },

    #[error("{} of the windows for {symbol} failed: {}", .failed.len(), format_failures(.failed))]
    PartialFetchFailure {
        symbol: String,
        failed: Vec<WindowFailure>,
    },

    #[error("worker pool error: {0}")]
    WorkerPool(String),

    #[error("persistence error for '{identifier}': {reason}")]
    Persistence { identifier: String, reason: String },
}

impl DataError {
    /// Start dates of the windows a `PartialFetchFailure` reports, empty otherwise.
    pub fn failed_windows(&self) -> Vec<NaiveDate> {
        match self {
            DataError::PartialFetchFailure { failed, .. } => {
                failed.iter().map(|f| f.window_start).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn format_failures(failed: &[WindowFailure]) -> String {
    failed
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

//! Transport collaborator: endpoint + parameters → raw payload text.
//!
//! The normalization layer only depends on the `Transport` trait; tests swap
//! in scripted transports, production uses `HttpTransport`.

use super::error::TransportError;
use crate::config::HttpConfig;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff stops doubling after this many retries.
const MAX_BACKOFF_EXPONENT: u32 = 10;

/// Query parameters whose values never reach the logs.
const REDACTED_PARAMS: [&str; 2] = ["apikey", "api_key"];

/// Response body exactly as the provider delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload(String);

impl RawPayload {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }

    pub fn into_text(self) -> String {
        self.0
    }
}

impl From<&str> for RawPayload {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl From<String> for RawPayload {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// One outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub endpoint: String,
    pub params: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parameters with secret values masked, for logging.
    pub fn redacted_params(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(n, v)| {
                if REDACTED_PARAMS.contains(&n.as_str()) {
                    (n.as_str(), "***")
                } else {
                    (n.as_str(), v.as_str())
                }
            })
            .collect()
    }
}

/// Fetches raw payloads. Any non-success response is an error, never an empty payload.
pub trait Transport: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> Result<RawPayload, TransportError>;
}

/// Blocking HTTP transport with retry and exponential backoff.
///
/// Retries connection failures, timeouts, HTTP 429 and 5xx. Any other
/// non-success status fails immediately.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
        })
    }

    /// Delay before retry number `attempt` (1-based). Exponential in the attempt,
    /// but never shorter than a rate limit's `Retry-After`.
    fn backoff(&self, attempt: u32, last_error: Option<&TransportError>) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let delay = self.base_delay.saturating_mul(1 << exponent);
        match last_error {
            Some(TransportError::RateLimited { retry_after_secs }) => {
                delay.max(Duration::from_secs(*retry_after_secs))
            }
            _ => delay,
        }
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, request: &FetchRequest) -> Result<RawPayload, TransportError> {
        debug!(
            endpoint = %request.endpoint,
            params = ?request.redacted_params(),
            "sending request"
        );

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff(attempt, last_error.as_ref());
                warn!(
                    endpoint = %request.endpoint,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = ?last_error,
                    "retrying request"
                );
                std::thread::sleep(delay);
            }

            match self
                .client
                .get(&request.endpoint)
                .query(&request.params)
                .send()
            {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(TransportError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status.is_server_error() {
                        last_error = Some(TransportError::Status {
                            status: status.as_u16(),
                            endpoint: request.endpoint.clone(),
                        });
                        continue;
                    }

                    if !status.is_success() {
                        return Err(TransportError::Status {
                            status: status.as_u16(),
                            endpoint: request.endpoint.clone(),
                        });
                    }

                    let text = resp.text().map_err(|e| TransportError::Body(e.to_string()))?;
                    return Ok(RawPayload(text));
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(TransportError::Network(e.to_string()));
                        continue;
                    }
                    return Err(TransportError::Network(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| TransportError::Network("max retries exceeded".into())))
    }
}

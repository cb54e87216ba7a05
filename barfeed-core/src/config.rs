//! Provider, HTTP, and stitching configuration, loaded from TOML.
//!
//! Every section and field is optional; omitted values take the defaults below.
//!
//! ```toml
//! [alpha_vantage]
//! api_key = "..."          # or ALPHAVANTAGE_API_KEY
//! output_size = "full"
//!
//! [binance]
//! page_limit = 1000
//!
//! [http]
//! timeout_secs = 30
//! max_retries = 3
//!
//! [stitch]
//! concurrency = 4
//! ```

use crate::data::binance::MAX_PAGE_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable consulted when no Alpha Vantage key is configured.
pub const ALPHA_VANTAGE_KEY_ENV: &str = "ALPHAVANTAGE_API_KEY";

/// Upper bound on `http.max_retries`.
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value {field} = {value}: {reason}")]
    Invalid {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub alpha_vantage: AlphaVantageConfig,
    pub yahoo: YahooConfig,
    pub binance: BinanceConfig,
    pub http: HttpConfig,
    pub stitch: StitchConfig,
}

impl FeedConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the providers or the transport cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let page_limit = self.binance.page_limit;
        if !(1..=MAX_PAGE_LIMIT).contains(&page_limit) {
            return Err(ConfigError::Invalid {
                field: "binance.page_limit",
                value: page_limit.to_string(),
                reason: format!("must lie in 1..={MAX_PAGE_LIMIT}"),
            });
        }
        if self.http.max_retries > MAX_RETRIES {
            return Err(ConfigError::Invalid {
                field: "http.max_retries",
                value: self.http.max_retries.to_string(),
                reason: format!("must be at most {MAX_RETRIES}"),
            });
        }
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphaVantageConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// `full` (entire history) or `compact` (latest 100 points).
    pub output_size: String,
}

impl Default for AlphaVantageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.alphavantage.co/query".into(),
            api_key: None,
            output_size: "full".into(),
        }
    }
}

impl AlphaVantageConfig {
    /// Configured key, else the environment, else Alpha Vantage's public demo key.
    pub fn resolve_api_key(&self) -> String {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(ALPHA_VANTAGE_KEY_ENV).ok().filter(|k| !k.is_empty()))
            .unwrap_or_else(|| "demo".into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YahooConfig {
    /// Chart endpoint; the symbol is appended as a path segment.
    pub base_url: String,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query2.finance.yahoo.com/v8/finance/chart".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinanceConfig {
    pub base_url: String,
    /// Maximum klines per request.
    pub page_limit: u32,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com/api/v3/klines".into(),
            page_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 500,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    /// Upper bound on concurrent window fetches.
    pub concurrency: usize,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = FeedConfig::from_toml("").unwrap();
        assert_eq!(config, FeedConfig::default());
        assert_eq!(config.binance.page_limit, 1000);
        assert_eq!(config.stitch.concurrency, 4);
    }

    #[test]
    fn partial_sections_override_only_named_fields() {
        let config = FeedConfig::from_toml(
            r#"
[alpha_vantage]
api_key = "KEY123"

[http]
max_retries = 0

[stitch]
concurrency = 8
"#,
        )
        .unwrap();
        assert_eq!(config.alpha_vantage.resolve_api_key(), "KEY123");
        assert_eq!(config.alpha_vantage.output_size, "full");
        assert_eq!(config.http.max_retries, 0);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.stitch.concurrency, 8);
    }

    #[test]
    fn unknown_types_are_rejected() {
        let err = FeedConfig::from_toml("[stitch]\nconcurrency = \"many\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn out_of_range_page_limit_is_rejected() {
        for limit in [0, 1001] {
            let err = FeedConfig::from_toml(&format!("[binance]\npage_limit = {limit}\n"))
                .unwrap_err();
            match err {
                ConfigError::Invalid { field, value, .. } => {
                    assert_eq!(field, "binance.page_limit");
                    assert_eq!(value, limit.to_string());
                }
                other => panic!("expected Invalid, got {other}"),
            }
        }
        assert!(FeedConfig::from_toml("[binance]\npage_limit = 1\n").is_ok());
    }

    #[test]
    fn excessive_retries_are_rejected() {
        let err = FeedConfig::from_toml("[http]\nmax_retries = 40\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "http.max_retries", .. }));
        assert!(FeedConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = FeedConfig::from_file(Path::new("/nonexistent/barfeed.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

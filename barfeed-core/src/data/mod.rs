//! Retrieval and normalization: parsers, normalizer, stitcher, providers, transport.

pub mod alpha_vantage;
pub mod binance;
pub mod error;
pub mod normalize;
pub mod parse;
pub mod period;
pub mod provider;
pub mod raw;
pub mod stitch;
pub mod transport;
pub mod yahoo;

pub use alpha_vantage::AlphaVantageProvider;
pub use binance::BinanceProvider;
pub use error::{DataError, TransportError, WindowFailure};
pub use normalize::{normalize, FieldMap};
pub use parse::parse_payload;
pub use period::PeriodPolicy;
pub use provider::{build_provider, FetchContext, MarketDataProvider, ProviderKind};
pub use raw::{RawRow, RawTable, RawValue};
pub use stitch::{Stitcher, Window};
pub use transport::{FetchRequest, HttpTransport, RawPayload, Transport};
pub use yahoo::YahooProvider;

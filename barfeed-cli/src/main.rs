//! Barfeed CLI: fetch and inspect canonical OHLCV series.
//!
//! Commands:
//! - `fetch`: retrieve bars from a provider, normalize, and store as CSV or Parquet
//! - `show`: read a stored series, optionally restrict it to a date range, and print it

use anyhow::{bail, Context, Result};
use barfeed_core::data::HttpTransport;
use barfeed_core::store::StoreFormat;
use barfeed_core::{build_provider, CanonicalSeries, DateRange, FeedConfig, ProviderKind};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "barfeed",
    about = "Barfeed CLI: normalized OHLCV bars from Alpha Vantage, Yahoo and Binance"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch bars from a provider and store them.
    Fetch {
        /// Data source: alpha-vantage, yahoo, or binance.
        #[arg(long)]
        provider: ProviderKind,

        /// Symbol (e.g., IBM, SPY, BTCUSDT).
        #[arg(long)]
        symbol: String,

        /// Start date (YYYY-MM-DD). Required for intraday requests.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end: Option<String>,

        /// Intraday period in minutes. Omit for daily bars.
        #[arg(long)]
        interval: Option<u32>,

        /// Storage format: csv or parquet.
        #[arg(long, default_value = "csv")]
        format: StoreFormat,

        /// Output directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        dir: PathBuf,

        /// Stored name. Defaults to SYMBOL_daily or SYMBOL_{N}m.
        #[arg(long)]
        output: Option<String>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print a stored series.
    Show {
        /// Stored name.
        name: String,

        /// Storage format: csv or parquet.
        #[arg(long, default_value = "csv")]
        format: StoreFormat,

        /// Directory holding the stored series. Defaults to ./data.
        #[arg(long, default_value = "data")]
        dir: PathBuf,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end: Option<String>,

        /// Rows to print from each end.
        #[arg(long, default_value_t = 5)]
        rows: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            provider,
            symbol,
            start,
            end,
            interval,
            format,
            dir,
            output,
            config,
        } => run_fetch(
            provider, symbol, start, end, interval, format, dir, output, config,
        ),
        Commands::Show {
            name,
            format,
            dir,
            start,
            end,
            rows,
        } => run_show(name, format, dir, start, end, rows),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_fetch(
    kind: ProviderKind,
    symbol: String,
    start: Option<String>,
    end: Option<String>,
    interval: Option<u32>,
    format: StoreFormat,
    dir: PathBuf,
    output: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let range = parse_range(start.as_deref(), end.as_deref())?;

    let config = match config_path {
        Some(path) => FeedConfig::from_file(&path)?,
        None => FeedConfig::default(),
    };

    let transport = Arc::new(HttpTransport::new(&config.http)?);
    let provider = build_provider(kind, &config, transport);

    // Name the output after the period actually served, not the one asked for.
    let (series, period) = match interval {
        Some(requested) => {
            if !provider.supports_intraday() {
                bail!("{kind} does not provide intraday data");
            }
            let minutes = provider.intraday_period(requested)?;
            if minutes != requested {
                info!(requested, served = minutes, "interval snapped to provider period");
            }
            (provider.intraday_data(&symbol, &range, minutes)?, Some(minutes))
        }
        None => (provider.daily_data(&symbol, &range)?, None),
    };

    print_summary(&symbol, &series);

    let name = output.unwrap_or_else(|| default_name(&symbol, period));
    format
        .open(&dir)
        .write(&name, &series)
        .with_context(|| format!("failed to store {name}"))?;
    info!(provider = %kind, symbol = %symbol, range = %range, name = %name, "fetch complete");
    println!("Saved to: {}", dir.join(format!("{name}.{}", format.extension())).display());

    Ok(())
}

fn run_show(
    name: String,
    format: StoreFormat,
    dir: PathBuf,
    start: Option<String>,
    end: Option<String>,
    rows: usize,
) -> Result<()> {
    let range = parse_range(start.as_deref(), end.as_deref())?;
    let series = format
        .open(&dir)
        .read(&name)
        .with_context(|| format!("failed to read {name}"))?;
    let series = series.select(&range);

    print_summary(&name, &series);
    print_rows(&series, rows);
    Ok(())
}

fn parse_range(start: Option<&str>, end: Option<&str>) -> Result<DateRange> {
    let parse = |s: &str| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
    };
    Ok(DateRange {
        start: start.map(parse).transpose()?,
        end: end.map(parse).transpose()?,
    })
}

fn default_name(symbol: &str, interval: Option<u32>) -> String {
    let symbol: String = symbol
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    match interval {
        Some(minutes) => format!("{symbol}_{minutes}m"),
        None => format!("{symbol}_daily"),
    }
}

fn print_summary(label: &str, series: &CanonicalSeries) {
    println!("=== {label} ===");
    println!("Rows:   {}", series.len());
    match (series.first(), series.last()) {
        (Some(first), Some(last)) => {
            println!("First:  {}", first.timestamp);
            println!("Last:   {}", last.timestamp);
        }
        _ => println!("(empty)"),
    }
}

fn print_rows(series: &CanonicalSeries, rows: usize) {
    if series.is_empty() {
        return;
    }
    println!();
    println!(
        "{:<20} {:>12} {:>12} {:>12} {:>12} {:>16}",
        CanonicalSeries::INDEX, "Open", "High", "Low", "Close", "Volume"
    );

    let bars = series.bars();
    let print_bar = |bar: &barfeed_core::Bar| {
        println!(
            "{:<20} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>16.2}",
            bar.timestamp.to_string(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        );
    };

    if bars.len() <= rows * 2 {
        bars.iter().for_each(print_bar);
    } else {
        bars[..rows].iter().for_each(print_bar);
        println!("{:<20}", "...");
        bars[bars.len() - rows..].iter().for_each(print_bar);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names() {
        assert_eq!(default_name("IBM", None), "IBM_daily");
        assert_eq!(default_name("BTCUSDT", Some(5)), "BTCUSDT_5m");
        assert_eq!(default_name("BRK/B", None), "BRK_B_daily");
    }

    #[test]
    fn default_name_uses_served_period() {
        let config = FeedConfig::default();
        let transport = Arc::new(HttpTransport::new(&config.http).unwrap());
        let provider = build_provider(ProviderKind::AlphaVantage, &config, transport);
        let served = provider.intraday_period(7).unwrap();
        assert_eq!(default_name("IBM", Some(served)), "IBM_5m");
    }

    #[test]
    fn range_parsing() {
        let range = parse_range(Some("2024-01-01"), None).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert!(range.end.is_none());
        assert!(parse_range(Some("01/02/2024"), None).is_err());
    }

    #[test]
    fn cli_parses_fetch() {
        let cli = Cli::try_parse_from([
            "barfeed",
            "fetch",
            "--provider",
            "binance",
            "--symbol",
            "BTCUSDT",
            "--start",
            "2024-01-01",
            "--interval",
            "15",
            "--format",
            "parquet",
        ])
        .unwrap();
        match cli.command {
            Commands::Fetch {
                provider,
                interval,
                format,
                ..
            } => {
                assert_eq!(provider, ProviderKind::Binance);
                assert_eq!(interval, Some(15));
                assert_eq!(format, StoreFormat::Parquet);
            }
            Commands::Show { .. } => panic!("expected fetch"),
        }
    }
}

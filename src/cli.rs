//! Command-line arguments.
//! ## Example
//!
//! ```text
//! $ stockwatch --symbol ethusdt --period 3mo --interval 1d --chart candlestick --ma
//! ```

use crate::config::{DashboardConfig, DEFAULT_CACHE_TTL_SECS, DEFAULT_LOG_FILE, DEFAULT_SYMBOL};
use crate::model::{ChartType, Interval, Period};
use crate::monitor::trend::RoundingMode;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, long_about = None)]
#[clap(about = "Stock dashboard with price-move email alerts and a CSV trend log.")]
struct CliArgs {
    /// Ticker symbol, e.g. BTCUSDT.
    #[clap(short, long, default_value = DEFAULT_SYMBOL, value_parser = symbol_valid)]
    symbol: String,

    /// History to load: 1d, 5d, 1mo, 3mo, 6mo or 1y.
    #[clap(short, long, default_value = "1mo")]
    period: Period,

    /// Candle interval: 1h, 1d or 1wk.
    #[clap(short, long, default_value = "1d")]
    interval: Interval,

    /// Chart type: line, bar, area or candlestick.
    #[clap(short, long, default_value = "line")]
    chart: ChartType,

    /// Overlay the 20-period moving average.
    #[clap(long)]
    ma: bool,

    /// Show instrument details.
    #[clap(long)]
    info: bool,

    /// CSV file every evaluation is appended to.
    #[clap(long, default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Rounding of the price delta: half-even or half-up.
    #[clap(long, default_value = "half-even")]
    rounding: RoundingMode,

    /// Seconds fetched prices stay cached.
    #[clap(long, default_value_t = DEFAULT_CACHE_TTL_SECS)]
    cache_ttl: u64,

    /// Refresh automatically every N seconds (0 disables).
    #[clap(long, default_value_t = 0)]
    refresh: u64,
}

/// Validator for `--symbol`.
fn symbol_valid(s: &str) -> Result<String, String> {
    let symbol = s.trim();
    if symbol.is_empty() {
        return Err("symbol must not be empty".to_string());
    }
    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(format!("invalid symbol: {}", s));
    }
    Ok(symbol.to_uppercase())
}

/// Settings resolved from the command line.
#[derive(Debug)]
pub struct AppSettings {
    pub dashboard: DashboardConfig,
    pub log_file: PathBuf,
    pub rounding: RoundingMode,
    pub cache_ttl: Duration,
    pub refresh_every: Option<Duration>,
}

impl AppSettings {
    fn new(args: CliArgs) -> Self {
        Self {
            dashboard: DashboardConfig {
                symbol: args.symbol,
                period: args.period,
                interval: args.interval,
                chart_type: args.chart,
                show_moving_average: args.ma,
                show_company_info: args.info,
            },
            log_file: args.log_file,
            rounding: args.rounding,
            cache_ttl: Duration::from_secs(args.cache_ttl),
            refresh_every: (args.refresh > 0).then(|| Duration::from_secs(args.refresh)),
        }
    }
}

pub fn parse_cli_args() -> AppSettings {
    AppSettings::new(CliArgs::parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_config() {
        let settings = AppSettings::new(CliArgs::parse_from(["stockwatch"]));

        assert_eq!(settings.dashboard, DashboardConfig::default());
        assert_eq!(settings.log_file, PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(settings.rounding, RoundingMode::HalfEven);
        assert_eq!(settings.cache_ttl, Duration::from_secs(DEFAULT_CACHE_TTL_SECS));
        assert_eq!(settings.refresh_every, None);
    }

    #[test]
    fn parses_full_selection() {
        let args = CliArgs::parse_from([
            "stockwatch", "--symbol", "ethusdt", "--period", "3mo", "--interval", "1wk",
            "--chart", "candlestick", "--ma", "--info", "--rounding", "half-up", "--refresh", "30",
        ]);
        let settings = AppSettings::new(args);

        assert_eq!(settings.dashboard.symbol, "ETHUSDT");
        assert_eq!(settings.dashboard.period, Period::Mo3);
        assert_eq!(settings.dashboard.interval, Interval::W1);
        assert_eq!(settings.dashboard.chart_type, ChartType::Candlestick);
        assert!(settings.dashboard.show_moving_average);
        assert!(settings.dashboard.show_company_info);
        assert_eq!(settings.rounding, RoundingMode::HalfUp);
        assert_eq!(settings.refresh_every, Some(Duration::from_secs(30)));
    }

    #[test]
    fn symbol_validator_rejects_garbage() {
        assert!(symbol_valid("").is_err());
        assert!(symbol_valid("BTC/USDT").is_err());
        assert_eq!(symbol_valid(" msft "), Ok("MSFT".to_string()));
    }

    #[test]
    fn rejects_unknown_period() {
        assert!(CliArgs::try_parse_from(["stockwatch", "--period", "2y"]).is_err());
    }
}

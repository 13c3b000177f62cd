use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// One timestamped closing price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceObservation {
    pub timestamp: DateTime<Utc>,
    pub close: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    pub fn observation(&self) -> PriceObservation {
        PriceObservation {
            timestamp: self.open_time,
            close: self.close,
        }
    }

    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(0.0)
    }

    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// 24h statistics for the instrument details panel.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    pub symbol: String,
    pub last_price: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub price_change_percent: Decimal,
    pub volume: Decimal,
    pub quote_volume: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    D1,
    D5,
    Mo1,
    Mo3,
    Mo6,
    Y1,
}

impl Period {
    pub const ALL: [Period; 6] = [
        Period::D1,
        Period::D5,
        Period::Mo1,
        Period::Mo3,
        Period::Mo6,
        Period::Y1,
    ];

    pub fn as_secs(&self) -> i64 {
        const DAY: i64 = 86400;
        match self {
            Period::D1 => DAY,
            Period::D5 => 5 * DAY,
            Period::Mo1 => 30 * DAY,
            Period::Mo3 => 90 * DAY,
            Period::Mo6 => 180 * DAY,
            Period::Y1 => 365 * DAY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::D1 => "1d",
            Period::D5 => "5d",
            Period::Mo1 => "1mo",
            Period::Mo3 => "3mo",
            Period::Mo6 => "6mo",
            Period::Y1 => "1y",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    H1,
    D1,
    W1,
}

impl Interval {
    pub const ALL: [Interval; 3] = [Interval::H1, Interval::D1, Interval::W1];

    pub fn as_secs(&self) -> i64 {
        match self {
            Interval::H1 => 3600,
            Interval::D1 => 86400,
            Interval::W1 => 604800,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::H1 => "1h",
            Interval::D1 => "1d",
            Interval::W1 => "1wk",
        }
    }

    /// Interval name understood by the Binance kline endpoints.
    pub fn binance_code(&self) -> &'static str {
        match self {
            Interval::H1 => "1h",
            Interval::D1 => "1d",
            Interval::W1 => "1w",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartType {
    Line,
    Bar,
    Area,
    Candlestick,
}

impl ChartType {
    pub const ALL: [ChartType; 4] = [
        ChartType::Line,
        ChartType::Bar,
        ChartType::Area,
        ChartType::Candlestick,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Line => "Line",
            ChartType::Bar => "Bar",
            ChartType::Area => "Area",
            ChartType::Candlestick => "Candlestick",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            ChartType::Line => ChartType::Bar,
            ChartType::Bar => ChartType::Area,
            ChartType::Area => ChartType::Candlestick,
            ChartType::Candlestick => ChartType::Line,
        }
    }
}

macro_rules! impl_choice {
    ($ty:ty, $what:literal) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty>::ALL
                    .iter()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .copied()
                    .ok_or_else(|| {
                        let allowed: Vec<&str> = <$ty>::ALL.iter().map(|v| v.as_str()).collect();
                        format!("invalid {}: {} (expected one of {})", $what, s, allowed.join(", "))
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_choice!(Period, "period");
impl_choice!(Interval, "interval");
impl_choice!(ChartType, "chart type");

/// Price text at its own precision, never fewer than two decimals:
/// `101.5` -> `101.50`, `0.00001234` stays `0.00001234`.
pub fn format_price(price: Decimal) -> String {
    let price = price.normalize();
    if price.scale() < 2 {
        format!("{:.2}", price)
    } else {
        price.to_string()
    }
}

/// Number of klines needed to cover `period` at `interval`, within Binance's 1..=1000 window.
pub fn kline_limit(period: Period, interval: Interval) -> u16 {
    let secs = period.as_secs();
    let step = interval.as_secs();
    let needed = (secs + step - 1) / step;
    needed.clamp(1, 1000) as u16
}

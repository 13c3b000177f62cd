pub mod binance;
pub mod cache;
pub mod mail;

use crate::error::StockWatchError;
use crate::model::{Candle, Interval, Period, SymbolInfo};

/// Historical prices and instrument details for one symbol.
pub trait MarketDataSource {
    /// Candles in time order, oldest first. May be empty.
    async fn fetch(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<Vec<Candle>, StockWatchError>;

    async fn info(&self, symbol: &str) -> Result<SymbolInfo, StockWatchError>;
}

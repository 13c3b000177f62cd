use crate::api::MarketDataSource;
use crate::error::StockWatchError;
use crate::model::{Candle, Interval, Period, SymbolInfo};
use log::debug;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub period: Period,
    pub interval: Interval,
}

impl CacheKey {
    pub fn new(symbol: &str, period: Period, interval: Interval) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            period,
            interval,
        }
    }
}

struct CacheEntry {
    fetched_at: Instant,
    candles: Vec<Candle>,
}

/// Keeps fetched candles per symbol, period and interval for `ttl`.
/// Failed fetches are not cached. Instrument info is always fetched fresh.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl<S: MarketDataSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Drops one key; returns whether it was cached.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    fn fresh(&self, key: &CacheKey) -> Option<Vec<Candle>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = match entries.get(key) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => {
                return Some(entry.candles.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }
}

impl<S: MarketDataSource> MarketDataSource for CachedSource<S> {
    async fn fetch(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<Vec<Candle>, StockWatchError> {
        let key = CacheKey::new(symbol, period, interval);
        if let Some(candles) = self.fresh(&key) {
            debug!("Cache hit for {} {} @ {}", key.symbol, period, interval);
            return Ok(candles);
        }

        let candles = self.inner.fetch(symbol, period, interval).await?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key,
                CacheEntry {
                    fetched_at: Instant::now(),
                    candles: candles.clone(),
                },
            );
        Ok(candles)
    }

    async fn info(&self, symbol: &str) -> Result<SymbolInfo, StockWatchError> {
        self.inner.info(symbol).await
    }
}

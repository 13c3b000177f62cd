use crate::api::MarketDataSource;
use crate::error::StockWatchError;
use crate::model::{kline_limit, Candle, Interval, Period, SymbolInfo};
use chrono::{TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite;

const BINANCE_WS_API_URL: &str = "wss://ws-api.binance.com:443/ws-api/v3";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct ApiResponse {
    id: Option<u64>,
    status: u16,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

impl ApiResponse {
    fn into_result(self) -> Result<Value, StockWatchError> {
        if let Some(error) = self.error {
            return Err(StockWatchError::ApiError {
                status: self.status,
                message: format!("{} (code {})", error.msg, error.code),
            });
        }
        if self.status != 200 {
            return Err(StockWatchError::ApiError {
                status: self.status,
                message: "request rejected".to_string(),
            });
        }
        self.result
            .ok_or_else(|| StockWatchError::MalformedData("response without result".to_string()))
    }
}

// open time, open, high, low, close, volume, then six fields we do not use
#[derive(Deserialize)]
struct KlineRow(
    i64,
    String,
    String,
    String,
    String,
    String,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    price_change_percent: String,
    last_price: String,
    high_price: String,
    low_price: String,
    volume: String,
    quote_volume: String,
}

fn decimal(field: &str, raw: &str) -> Result<Decimal, StockWatchError> {
    Decimal::from_str(raw)
        .map_err(|e| StockWatchError::MalformedData(format!("{} '{}': {}", field, raw, e)))
}

fn parse_klines(result: Value) -> Result<Vec<Candle>, StockWatchError> {
    let rows: Vec<KlineRow> = serde_json::from_value(result)?;
    rows.into_iter()
        .map(|row| {
            let open_time = Utc
                .timestamp_millis_opt(row.0)
                .single()
                .ok_or_else(|| StockWatchError::MalformedData(format!("open time {}", row.0)))?;
            Ok(Candle {
                open_time,
                open: decimal("open", &row.1)?,
                high: decimal("high", &row.2)?,
                low: decimal("low", &row.3)?,
                close: decimal("close", &row.4)?,
                volume: decimal("volume", &row.5)?,
            })
        })
        .collect()
}

fn parse_ticker(result: Value) -> Result<SymbolInfo, StockWatchError> {
    let ticker: Ticker24h = serde_json::from_value(result)?;
    Ok(SymbolInfo {
        last_price: decimal("lastPrice", &ticker.last_price)?,
        high: decimal("highPrice", &ticker.high_price)?,
        low: decimal("lowPrice", &ticker.low_price)?,
        price_change_percent: decimal("priceChangePercent", &ticker.price_change_percent)?,
        volume: decimal("volume", &ticker.volume)?,
        quote_volume: decimal("quoteVolume", &ticker.quote_volume)?,
        symbol: ticker.symbol,
    })
}

/// Market data over Binance's WebSocket API. Each call opens a connection,
/// sends one request and waits for the matching response.
pub struct BinanceSource {
    url: String,
    next_id: AtomicU64,
}

impl Default for BinanceSource {
    fn default() -> Self {
        Self::new(BINANCE_WS_API_URL)
    }
}

impl BinanceSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, StockWatchError> {
        match tokio::time::timeout(REQUEST_TIMEOUT, self.exchange(method, params)).await {
            Ok(result) => result,
            Err(_) => Err(StockWatchError::Timeout(REQUEST_TIMEOUT)),
        }
    }

    async fn exchange(&self, method: &str, params: Value) -> Result<Value, StockWatchError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({ "id": id, "method": method, "params": params }).to_string();

        debug!("Connecting to Binance WebSocket API: {}", self.url);
        let (mut ws_stream, _) = connect_async(&self.url).await?;
        ws_stream
            .send(tungstenite::protocol::Message::Text(payload))
            .await?;

        while let Some(message) = ws_stream.next().await {
            match message? {
                tungstenite::protocol::Message::Text(text) => {
                    let response: ApiResponse = serde_json::from_str(&text)?;
                    if response.id.is_some() && response.id != Some(id) {
                        warn!("Ignoring response for request {:?}", response.id);
                        continue;
                    }
                    if let Err(e) = ws_stream.close(None).await {
                        debug!("Error closing WebSocket: {}", e);
                    }
                    return response.into_result();
                }
                tungstenite::protocol::Message::Close(_) => {
                    info!("WebSocket connection closed");
                    break;
                }
                _ => {} // Ignore other message types
            }
        }

        Err(StockWatchError::ConnectionClosed)
    }
}

impl MarketDataSource for BinanceSource {
    async fn fetch(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<Vec<Candle>, StockWatchError> {
        let limit = kline_limit(period, interval);
        let params = json!({
            "symbol": symbol.to_uppercase(),
            "interval": interval.binance_code(),
            "limit": limit,
        });

        let candles = parse_klines(self.request("klines", params).await?)?;
        info!(
            "{}: fetched {} candles ({} @ {})",
            symbol.to_uppercase(),
            candles.len(),
            period,
            interval
        );
        Ok(candles)
    }

    async fn info(&self, symbol: &str) -> Result<SymbolInfo, StockWatchError> {
        let params = json!({ "symbol": symbol.to_uppercase() });
        parse_ticker(self.request("ticker.24hr", params).await?)
    }
}

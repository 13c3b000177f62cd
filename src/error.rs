use thiserror::Error;

#[derive(Error, Debug)]
pub enum StockWatchError {
    #[error("WebSocket error: {0}")]
    WebsocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Malformed market data: {0}")]
    MalformedData(String),

    #[error("Connection closed before a response arrived")]
    ConnectionClosed,

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Reasons a trend cannot be evaluated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("insufficient data: need at least 2 observations, found {found}")]
    InsufficientData { found: usize },
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("notification transport error: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed trend log row {row}: {reason}")]
    Malformed { row: u64, reason: String },
}

/// Failures recorded by the alert sink instead of being propagated.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("alert dispatch failed: {0}")]
    DispatchFailed(NotifyError),

    #[error("trend log write failed: {0}")]
    LogWriteFailed(LogError),
}

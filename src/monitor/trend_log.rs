//! Append-only CSV log of evaluated trends.
//!
//! The file holds one header row (`Symbol,Time,Price,Change`) followed by one
//! row per evaluation. There is no locking: a single writer is assumed.

use crate::error::LogError;
use crate::model::format_price;
use crate::monitor::trend::TrendResult;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const LOG_HEADER: [&str; 4] = ["Symbol", "Time", "Price", "Change"];

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub price: Decimal,
    pub change: Decimal,
}

impl LogRecord {
    pub fn from_trend(result: &TrendResult, at: NaiveDateTime) -> Self {
        Self {
            symbol: result.symbol.to_uppercase(),
            timestamp: at,
            price: result.current,
            change: result.delta,
        }
    }

    fn to_row(&self) -> [String; 4] {
        [
            self.symbol.clone(),
            self.timestamp.format(TIME_FORMAT).to_string(),
            format_price(self.price),
            format!("{:.2}", self.change),
        ]
    }

    fn from_row(row: &csv::StringRecord, index: u64) -> Result<Self, LogError> {
        let malformed = |reason: String| LogError::Malformed { row: index, reason };

        if row.len() != LOG_HEADER.len() {
            return Err(malformed(format!("expected {} fields, found {}", LOG_HEADER.len(), row.len())));
        }

        let timestamp = NaiveDateTime::parse_from_str(&row[1], TIME_FORMAT)
            .map_err(|e| malformed(format!("bad time '{}': {}", &row[1], e)))?;
        let price = Decimal::from_str(&row[2])
            .map_err(|e| malformed(format!("bad price '{}': {}", &row[2], e)))?;
        let change = Decimal::from_str(&row[3])
            .map_err(|e| malformed(format!("bad change '{}': {}", &row[3], e)))?;

        Ok(Self {
            symbol: row[0].to_string(),
            timestamp,
            price,
            change,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TrendLog {
    path: PathBuf,
}

impl TrendLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the header first when the file is missing or empty.
    pub fn append(&self, record: &LogRecord) -> Result<(), LogError> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let is_new = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer.write_record(LOG_HEADER)?;
        }
        writer.write_record(record.to_row())?;
        writer.flush()?;
        Ok(())
    }

    /// All records in append order. A log that does not exist yet is empty.
    pub fn read_all(&self) -> Result<Vec<LogRecord>, LogError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        // short rows (e.g. a torn last line) reach `from_row` instead of failing in csv
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;
        reader
            .records()
            .enumerate()
            .map(|(i, row)| LogRecord::from_row(&row?, i as u64 + 1))
            .collect()
    }
}

use crate::error::{NotifyError, SinkError};
use crate::model::format_price;
use crate::monitor::trend::{Classification, TrendResult};
use crate::monitor::trend_log::{LogRecord, TrendLog};
use chrono::{Local, NaiveDateTime};
use log::{info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Outbound transport for alert notifications.
pub trait Notifier: Send + Sync {
    fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

impl AlertMessage {
    /// `None` for a stable trend.
    pub fn for_trend(result: &TrendResult) -> Option<Self> {
        let symbol = result.symbol.to_uppercase();
        let delta = result.delta;
        let current = result.current;

        match result.classification {
            Classification::Surge => Some(Self {
                subject: format!("{} Price Surge {}", symbol, signed(delta)),
                body: format!(
                    "{} increased by ${:.2} to ${}",
                    symbol,
                    delta.abs(),
                    format_price(current)
                ),
            }),
            Classification::Drop => Some(Self {
                subject: format!("{} Price Drop {}", symbol, signed(delta)),
                body: format!(
                    "{} dropped by ${:.2} to ${}",
                    symbol,
                    delta.abs(),
                    format_price(current)
                ),
            }),
            Classification::Stable => None,
        }
    }
}

/// Formats with an explicit sign and two decimals, e.g. `+3.50`.
pub fn signed(value: Decimal) -> String {
    if value.is_sign_negative() && !value.is_zero() {
        format!("-{:.2}", value.abs())
    } else {
        format!("+{:.2}", value.abs())
    }
}

#[derive(Debug)]
pub struct SinkOutcome {
    pub dispatched: bool,
    /// `None` when no dispatch was attempted.
    pub dispatch_ok: Option<bool>,
    pub logged: bool,
    pub record: LogRecord,
    pub errors: Vec<SinkError>,
}

/// Sends alerts for surges and drops and logs every evaluated trend.
pub struct AlertSink {
    notifier: Arc<dyn Notifier>,
    log: TrendLog,
}

impl AlertSink {
    pub fn new(notifier: Arc<dyn Notifier>, log: TrendLog) -> Self {
        Self { notifier, log }
    }

    pub fn log(&self) -> &TrendLog {
        &self.log
    }

    pub fn record(&self, result: &TrendResult) -> SinkOutcome {
        self.record_at(result, Local::now().naive_local())
    }

    /// Dispatch and append are independent: a failed send never skips the log row.
    pub fn record_at(&self, result: &TrendResult, at: NaiveDateTime) -> SinkOutcome {
        let mut errors = Vec::new();

        let dispatch_ok = AlertMessage::for_trend(result).map(|message| {
            match self.notifier.send(&message.subject, &message.body) {
                Ok(()) => {
                    info!("Alert sent: {}", message.subject);
                    true
                }
                Err(e) => {
                    warn!("Alert for {} failed: {}", result.symbol, e);
                    errors.push(SinkError::DispatchFailed(e));
                    false
                }
            }
        });

        let record = LogRecord::from_trend(result, at);
        let logged = match self.log.append(&record) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to append to {}: {}", self.log.path().display(), e);
                errors.push(SinkError::LogWriteFailed(e));
                false
            }
        };

        SinkOutcome {
            dispatched: dispatch_ok.is_some(),
            dispatch_ok,
            logged,
            record,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::trend::TrendEvaluator;
    use crate::model::PriceObservation;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::fs;
    use std::str::FromStr;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        fail: bool,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .unwrap()
                .push((subject.to_string(), body.to_string()));
            if self.fail {
                Err(NotifyError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn trend(symbol: &str, previous: &str, current: &str) -> TrendResult {
        let observations: Vec<PriceObservation> = [previous, current]
            .iter()
            .enumerate()
            .map(|(i, c)| PriceObservation {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
                close: d(c),
            })
            .collect();
        TrendEvaluator::default().evaluate(symbol, &observations).unwrap()
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn sink_with(notifier: Arc<RecordingNotifier>, dir: &tempfile::TempDir) -> AlertSink {
        AlertSink::new(notifier, TrendLog::new(dir.path().join("trend.csv")))
    }

    #[test]
    fn surge_is_dispatched_and_logged() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let sink = sink_with(notifier.clone(), &dir);

        let outcome = sink.record_at(&trend("MSFT", "98.00", "101.50"), noon());

        assert!(outcome.dispatched);
        assert_eq!(outcome.dispatch_ok, Some(true));
        assert!(outcome.logged);
        assert!(outcome.errors.is_empty());

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.contains("MSFT"));
        assert!(sent[0].0.contains("3.50"));
        assert_eq!(sent[0].1, "MSFT increased by $3.50 to $101.50");

        let contents = fs::read_to_string(sink.log().path()).unwrap();
        assert_eq!(
            contents.lines().last(),
            Some("MSFT,2024-03-15 12:00:00,101.50,3.50")
        );
    }

    #[test]
    fn drop_message_reports_magnitude() {
        let message = AlertMessage::for_trend(&trend("aapl", "100.00", "97.00")).unwrap();

        assert_eq!(message.subject, "AAPL Price Drop -3.00");
        assert_eq!(message.body, "AAPL dropped by $3.00 to $97.00");
    }

    #[test]
    fn body_keeps_price_precision() {
        let message = AlertMessage::for_trend(&trend("ethusdt", "2410.125", "2405.0625")).unwrap();

        assert_eq!(message.subject, "ETHUSDT Price Drop -5.06");
        assert_eq!(message.body, "ETHUSDT dropped by $5.06 to $2405.0625");
    }

    #[test]
    fn stable_is_logged_without_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let sink = sink_with(notifier.clone(), &dir);

        let outcome = sink.record_at(&trend("MSFT", "100.00", "102.00"), noon());

        assert!(!outcome.dispatched);
        assert_eq!(outcome.dispatch_ok, None);
        assert!(outcome.logged);
        assert!(notifier.sent().is_empty());
        assert_eq!(sink.log().read_all().unwrap().len(), 1);
    }

    #[test]
    fn failed_dispatch_still_logs() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::failing());
        let sink = sink_with(notifier.clone(), &dir);

        let outcome = sink.record_at(&trend("MSFT", "100.00", "105.00"), noon());

        assert!(outcome.dispatched);
        assert_eq!(outcome.dispatch_ok, Some(false));
        assert!(outcome.logged);
        assert_eq!(notifier.sent().len(), 1);
        assert!(matches!(outcome.errors.as_slice(), [SinkError::DispatchFailed(_)]));

        let records = sink.log().read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].change, d("5.00"));
    }

    #[test]
    fn failed_append_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let sink = AlertSink::new(
            notifier.clone(),
            TrendLog::new(dir.path().join("missing").join("trend.csv")),
        );

        let outcome = sink.record_at(&trend("MSFT", "100.00", "90.00"), noon());

        assert_eq!(outcome.dispatch_ok, Some(true));
        assert!(!outcome.logged);
        assert!(matches!(outcome.errors.as_slice(), [SinkError::LogWriteFailed(_)]));
    }

    #[test]
    fn every_record_appends_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let sink = sink_with(notifier.clone(), &dir);

        let trends = [
            trend("MSFT", "100.00", "103.00"),
            trend("MSFT", "103.00", "103.50"),
            trend("MSFT", "103.50", "99.00"),
        ];
        for t in &trends {
            sink.record_at(t, noon());
        }

        assert_eq!(sink.log().read_all().unwrap().len(), trends.len());
        assert_eq!(notifier.sent().len(), 2);
    }

    #[test]
    fn signed_formats_sign_and_decimals() {
        assert_eq!(signed(d("3.5")), "+3.50");
        assert_eq!(signed(d("-2.01")), "-2.01");
        assert_eq!(signed(d("-0.00")), "+0.00");
    }
}

//! Application settings: defaults, the dashboard selection and mail settings
//! read from the environment.

use crate::error::StockWatchError;
use crate::model::{ChartType, Interval, Period};
use std::env;
use std::time::Duration;

pub const DEFAULT_SYMBOL: &str = "BTCUSDT";

pub const DEFAULT_LOG_FILE: &str = "stock_trend_log.csv";

pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// Window of the moving-average overlay.
pub const SMA_PERIOD: usize = 20;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;
pub const DEFAULT_SMTP_TIMEOUT_SECS: u64 = 10;

pub const ENV_SMTP_HOST: &str = "STOCKWATCH_SMTP_HOST";
pub const ENV_SMTP_PORT: &str = "STOCKWATCH_SMTP_PORT";
pub const ENV_SMTP_USER: &str = "STOCKWATCH_SMTP_USER";
pub const ENV_SMTP_PASSWORD: &str = "STOCKWATCH_SMTP_PASSWORD";
pub const ENV_ALERT_TO: &str = "STOCKWATCH_ALERT_TO";
pub const ENV_SMTP_TIMEOUT: &str = "STOCKWATCH_SMTP_TIMEOUT_SECS";

/// What the dashboard shows. Never mutated in place; key bindings build a
/// new value with the `with_*` helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub symbol: String,
    pub period: Period,
    pub interval: Interval,
    pub chart_type: ChartType,
    pub show_moving_average: bool,
    pub show_company_info: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            period: Period::Mo1,
            interval: Interval::D1,
            chart_type: ChartType::Line,
            show_moving_average: false,
            show_company_info: false,
        }
    }
}

impl DashboardConfig {
    pub fn with_chart_type(&self, chart_type: ChartType) -> Self {
        Self {
            chart_type,
            ..self.clone()
        }
    }

    pub fn with_moving_average(&self, show_moving_average: bool) -> Self {
        Self {
            show_moving_average,
            ..self.clone()
        }
    }

    pub fn with_company_info(&self, show_company_info: bool) -> Self {
        Self {
            show_company_info,
            ..self.clone()
        }
    }
}

/// SMTP settings for alert mail. Credentials only ever come from the
/// environment.
#[derive(Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub recipient: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("recipient", &self.recipient)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MailConfig {
    /// Returns `Ok(None)` when user, password or recipient is unset.
    pub fn from_env() -> Result<Option<Self>, StockWatchError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, StockWatchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let (username, password, recipient) =
            match (value(ENV_SMTP_USER), value(ENV_SMTP_PASSWORD), value(ENV_ALERT_TO)) {
                (Some(u), Some(p), Some(r)) => (u, p, r),
                _ => return Ok(None),
            };

        let port = match value(ENV_SMTP_PORT) {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                StockWatchError::ConfigError(format!("{} is not a port number: {}", ENV_SMTP_PORT, raw))
            })?,
            None => DEFAULT_SMTP_PORT,
        };

        let timeout_secs = match value(ENV_SMTP_TIMEOUT) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(StockWatchError::ConfigError(format!(
                        "{} must be a positive number of seconds: {}",
                        ENV_SMTP_TIMEOUT, raw
                    )))
                }
            },
            None => DEFAULT_SMTP_TIMEOUT_SECS,
        };

        Ok(Some(Self {
            host: value(ENV_SMTP_HOST).unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            port,
            username,
            password,
            recipient,
            timeout: Duration::from_secs(timeout_secs),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn mail_disabled_without_credentials() {
        let config = MailConfig::from_lookup(lookup(&[(ENV_SMTP_USER, "me@example.com")])).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn mail_config_uses_defaults() {
        let config = MailConfig::from_lookup(lookup(&[
            (ENV_SMTP_USER, "me@example.com"),
            (ENV_SMTP_PASSWORD, "secret"),
            (ENV_ALERT_TO, "you@example.com"),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(config.host, DEFAULT_SMTP_HOST);
        assert_eq!(config.port, DEFAULT_SMTP_PORT);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_SMTP_TIMEOUT_SECS));
        assert!(!format!("{:?}", config).contains("secret"));
    }

    #[test]
    fn mail_config_rejects_bad_port() {
        let result = MailConfig::from_lookup(lookup(&[
            (ENV_SMTP_USER, "me@example.com"),
            (ENV_SMTP_PASSWORD, "secret"),
            (ENV_ALERT_TO, "you@example.com"),
            (ENV_SMTP_PORT, "smtp"),
        ]));

        assert!(matches!(result, Err(StockWatchError::ConfigError(_))));
    }

    #[test]
    fn mail_config_rejects_zero_timeout() {
        let result = MailConfig::from_lookup(lookup(&[
            (ENV_SMTP_USER, "me@example.com"),
            (ENV_SMTP_PASSWORD, "secret"),
            (ENV_ALERT_TO, "you@example.com"),
            (ENV_SMTP_TIMEOUT, "0"),
        ]));

        assert!(matches!(result, Err(StockWatchError::ConfigError(_))));
    }

    #[test]
    fn with_helpers_leave_base_untouched() {
        let base = DashboardConfig::default();
        let changed = base.with_chart_type(ChartType::Bar).with_moving_average(true);

        assert_eq!(base.chart_type, ChartType::Line);
        assert!(!base.show_moving_average);
        assert_eq!(changed.chart_type, ChartType::Bar);
        assert!(changed.show_moving_average);
        assert_eq!(changed.symbol, base.symbol);
    }
}

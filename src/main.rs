mod api;
mod cli;
mod config;
mod error;
mod model;
mod monitor;
mod ui;

use api::binance::BinanceSource;
use api::cache::CachedSource;
use api::mail::{LogNotifier, SmtpNotifier};
use config::MailConfig;
use env_logger::Builder;
use log::{info, warn, LevelFilter};
use monitor::alerts::{AlertSink, Notifier};
use monitor::trend::TrendEvaluator;
use monitor::trend_log::TrendLog;
use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use ui::dashboard::Dashboard;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // Configure logger
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("stockwatch", LevelFilter::Debug)
        .format(|buf, record| {
            let ts = chrono::Local::now().format("%H:%M:%S%.3f");
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr) // Keep logs separate from TUI
        .init();

    let settings = cli::parse_cli_args();
    info!("Starting Stockwatch for {}...", settings.dashboard.symbol);

    let mail = MailConfig::from_env()?;
    let mail_enabled = mail.is_some();
    let notifier: Arc<dyn Notifier> = match &mail {
        Some(mail) => {
            info!("Alert mail enabled: {} via {}:{}", mail.recipient, mail.host, mail.port);
            Arc::new(SmtpNotifier::new(mail)?)
        }
        None => {
            warn!("SMTP credentials not set; alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let sink = AlertSink::new(notifier, TrendLog::new(&settings.log_file));
    let source = CachedSource::new(BinanceSource::default(), settings.cache_ttl);

    let mut dashboard = Dashboard::new(
        settings.dashboard,
        source,
        TrendEvaluator::new(settings.rounding),
        sink,
    )
    .with_mail_enabled(mail_enabled)
    .with_auto_refresh(settings.refresh_every);

    if let Err(e) = dashboard.run().await {
        log::error!("Dashboard error: {}", e);
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}

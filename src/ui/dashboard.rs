use crate::api::cache::{CacheKey, CachedSource};
use crate::api::MarketDataSource;
use crate::config::{DashboardConfig, SMA_PERIOD};
use crate::model::{format_price, Candle, PriceObservation, SymbolInfo};
use crate::monitor::alerts::{signed, AlertSink, SinkOutcome};
use crate::monitor::indicators::sma_series;
use crate::monitor::trend::{Classification, TrendEvaluator, TrendResult};
use crate::monitor::trend_log::TIME_FORMAT;
use crate::ui::charts::{self, format_volume};
use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{debug, error, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use rust_decimal::prelude::ToPrimitive;
use std::error::Error;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

type DynError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Warning(String),
    Error(String),
}

impl Notice {
    fn style(&self) -> Style {
        match self {
            Notice::Warning(_) => Style::default().fg(Color::Yellow),
            Notice::Error(_) => Style::default().fg(Color::Red),
        }
    }

    fn text(&self) -> &str {
        match self {
            Notice::Warning(text) | Notice::Error(text) => text,
        }
    }
}

/// What the last refresh produced.
#[derive(Default)]
pub struct ViewState {
    pub candles: Vec<Candle>,
    pub sma: Vec<Option<f64>>,
    pub trend: Option<TrendResult>,
    pub outcome: Option<SinkOutcome>,
    /// Rows in the trend log after the last record.
    pub log_rows: Option<usize>,
    pub info: Option<SymbolInfo>,
    pub notice: Option<Notice>,
    pub refreshed_at: Option<DateTime<Local>>,
}

pub struct Dashboard<S> {
    config: DashboardConfig,
    source: CachedSource<S>,
    evaluator: TrendEvaluator,
    sink: Arc<AlertSink>,
    mail_enabled: bool,
    refresh_every: Option<Duration>,
    last_refresh: Instant,
    running: bool,
    pub view: ViewState,
}

impl<S: MarketDataSource> Dashboard<S> {
    pub fn new(
        config: DashboardConfig,
        source: CachedSource<S>,
        evaluator: TrendEvaluator,
        sink: AlertSink,
    ) -> Self {
        Self {
            config,
            source,
            evaluator,
            sink: Arc::new(sink),
            mail_enabled: false,
            refresh_every: None,
            last_refresh: Instant::now(),
            running: true,
            view: ViewState::default(),
        }
    }

    pub fn with_mail_enabled(mut self, mail_enabled: bool) -> Self {
        self.mail_enabled = mail_enabled;
        self
    }

    pub fn with_auto_refresh(mut self, refresh_every: Option<Duration>) -> Self {
        self.refresh_every = refresh_every;
        self
    }

    pub async fn run(&mut self) -> Result<(), DynError> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal).await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<(), DynError> {
        self.refresh().await;

        while self.running {
            terminal.draw(|f| self.draw(f))?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code).await;
                    }
                }
            }

            if let Some(every) = self.refresh_every {
                if self.last_refresh.elapsed() >= every {
                    self.refresh().await;
                }
            }
        }
        Ok(())
    }

    async fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('r') => {
                let key = CacheKey::new(&self.config.symbol, self.config.period, self.config.interval);
                self.source.invalidate(&key);
                self.refresh().await;
            }
            KeyCode::Char('c') => {
                self.config = self.config.with_chart_type(self.config.chart_type.next());
            }
            KeyCode::Char('m') => {
                self.config = self.config.with_moving_average(!self.config.show_moving_average);
            }
            KeyCode::Char('i') => {
                self.config = self.config.with_company_info(!self.config.show_company_info);
                if self.config.show_company_info && self.view.info.is_none() {
                    self.refresh_info().await;
                }
            }
            _ => {}
        }
    }

    /// Fetch, evaluate, then alert and log. Nothing is recorded when the
    /// fetch fails or there are fewer than two observations.
    pub async fn refresh(&mut self) {
        self.last_refresh = Instant::now();
        let symbol = self.config.symbol.clone();

        let candles = match self
            .source
            .fetch(&symbol, self.config.period, self.config.interval)
            .await
        {
            Ok(candles) => candles,
            Err(e) => {
                error!("Failed to load {}: {}", symbol, e);
                self.view.notice = Some(Notice::Error(format!("Failed to load {}: {}", symbol, e)));
                return;
            }
        };

        let closes: Vec<f64> = candles.iter().map(Candle::close_f64).collect();
        let observations: Vec<PriceObservation> = candles.iter().map(Candle::observation).collect();
        self.view.sma = sma_series(&closes, SMA_PERIOD);
        self.view.candles = candles;
        self.view.refreshed_at = Some(Local::now());
        self.view.notice = None;

        match self.evaluator.evaluate(&symbol, &observations) {
            Ok(trend) => {
                let (outcome, log_rows) = self.record(trend.clone()).await.unzip();
                self.view.outcome = outcome;
                self.view.log_rows = log_rows.flatten();
                self.view.trend = Some(trend);
            }
            Err(e) => {
                warn!("{}: {}", symbol, e);
                self.view.trend = None;
                self.view.outcome = None;
                self.view.log_rows = None;
                self.view.notice = Some(Notice::Warning(
                    "No data available. Try changing the interval or check the symbol.".to_string(),
                ));
            }
        }

        if self.config.show_company_info {
            self.refresh_info().await;
        }
    }

    /// Records the trend, then counts the log rows on the same blocking task.
    async fn record(&self, trend: TrendResult) -> Option<(SinkOutcome, Option<usize>)> {
        let sink = Arc::clone(&self.sink);
        let task = tokio::task::spawn_blocking(move || {
            let outcome = sink.record(&trend);
            let log_rows = match sink.log().read_all() {
                Ok(records) => Some(records.len()),
                Err(e) => {
                    warn!("Cannot read {}: {}", sink.log().path().display(), e);
                    None
                }
            };
            (outcome, log_rows)
        });
        match task.await {
            Ok((outcome, log_rows)) => {
                debug!(
                    "{} recorded: dispatched={} logged={}",
                    outcome.record.symbol, outcome.dispatched, outcome.logged
                );
                Some((outcome, log_rows))
            }
            Err(e) => {
                error!("Alert sink task failed: {}", e);
                None
            }
        }
    }

    async fn refresh_info(&mut self) {
        match self.source.info(&self.config.symbol).await {
            Ok(info) => self.view.info = Some(info),
            Err(e) => {
                warn!("Instrument info unavailable for {}: {}", self.config.symbol, e);
                self.view.info = None;
            }
        }
    }

    fn draw<B: Backend>(&self, f: &mut Frame<B>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
            ])
            .split(f.size());

        self.render_header(f, chunks[0]);
        self.render_main_content(f, chunks[1]);
        self.render_footer(f, chunks[2]);
    }

    fn render_header<B: Backend>(&self, f: &mut Frame<B>, area: Rect) {
        let refreshed = self
            .view
            .refreshed_at
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());

        let header = Paragraph::new(Line::from(vec![
            Span::styled(
                "Stockwatch ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("{} ", self.config.symbol),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(
                "| {} @ {} | {} | refreshed {}",
                self.config.period, self.config.interval, self.config.chart_type, refreshed
            )),
        ]))
        .block(Block::default().borders(Borders::ALL));

        f.render_widget(header, area);
    }

    fn render_main_content<B: Backend>(&self, f: &mut Frame<B>, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        let sma = self
            .config
            .show_moving_average
            .then_some(self.view.sma.as_slice());
        charts::render_price_chart(
            f,
            columns[0],
            &format!("{} Price Chart", self.config.symbol),
            &self.view.candles,
            sma,
            self.config.chart_type,
            self.config.interval,
        );

        let mut constraints = vec![Constraint::Length(8), Constraint::Min(5)];
        if self.config.show_company_info {
            constraints.push(Constraint::Length(9));
        }
        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(columns[1]);

        self.render_metrics(f, side[0]);
        charts::render_volume(f, side[1], &self.view.candles);
        if self.config.show_company_info {
            self.render_info(f, side[2]);
        }
    }

    fn metric_lines(&self) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        if let Some(trend) = &self.view.trend {
            let delta_color = if trend.delta.is_sign_negative() && !trend.delta.is_zero() {
                Color::Red
            } else {
                Color::Green
            };
            lines.push(Line::from(vec![
                Span::raw("Current Price  "),
                Span::styled(
                    format!("${}", format_price(trend.current)),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw("  "),
                Span::styled(signed(trend.delta), Style::default().fg(delta_color)),
            ]));

            let dispatch_ok = self.view.outcome.as_ref().and_then(|o| o.dispatch_ok);
            let status = match (trend.classification, dispatch_ok) {
                (Classification::Stable, _) => {
                    Span::styled("Stable. No alert sent.", Style::default().fg(Color::Blue))
                }
                (_, Some(false)) => Span::styled("Alert dispatch failed", Style::default().fg(Color::Red)),
                (Classification::Surge, _) if !self.mail_enabled => Span::styled(
                    "Price Surge alert logged (mail not configured)",
                    Style::default().fg(Color::Green),
                ),
                (Classification::Drop, _) if !self.mail_enabled => Span::styled(
                    "Price Drop alert logged (mail not configured)",
                    Style::default().fg(Color::Red),
                ),
                (Classification::Surge, _) => {
                    Span::styled("Price Surge Alert Sent!", Style::default().fg(Color::Green))
                }
                (Classification::Drop, _) => {
                    Span::styled("Price Drop Alert Sent!", Style::default().fg(Color::Red))
                }
            };
            lines.push(Line::from(status));
        }

        if let Some(outcome) = &self.view.outcome {
            if outcome.logged {
                let rows = self
                    .view
                    .log_rows
                    .map(|n| format!(" ({} rows)", n))
                    .unwrap_or_default();
                lines.push(Line::from(Span::styled(
                    format!(
                        "Logged {} at {} to {}{}",
                        format_price(outcome.record.price),
                        outcome.record.timestamp.format(TIME_FORMAT),
                        self.sink.log().path().display(),
                        rows
                    ),
                    Style::default().fg(Color::Gray),
                )));
            }
            for e in &outcome.errors {
                lines.push(Line::from(Span::styled(e.to_string(), Style::default().fg(Color::Red))));
            }
        }

        if let Some(notice) = &self.view.notice {
            lines.push(Line::from(Span::styled(notice.text().to_string(), notice.style())));
        }

        lines
    }

    fn render_metrics<B: Backend>(&self, f: &mut Frame<B>, area: Rect) {
        let metrics = Paragraph::new(self.metric_lines())
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Metrics"));
        f.render_widget(metrics, area);
    }

    fn render_info<B: Backend>(&self, f: &mut Frame<B>, area: Rect) {
        let lines = match &self.view.info {
            Some(info) => {
                let volume = format_volume(info.volume.round().to_u64().unwrap_or(0));
                let quote_volume = format_volume(info.quote_volume.round().to_u64().unwrap_or(0));
                vec![
                    Line::from(format!("Symbol: {}", info.symbol)),
                    Line::from(format!("Last Price: {}", format_price(info.last_price))),
                    Line::from(format!(
                        "24h High / Low: {} / {}",
                        format_price(info.high),
                        format_price(info.low)
                    )),
                    Line::from(format!("24h Change: {:.2}%", info.price_change_percent)),
                    Line::from(format!("24h Volume: {}", volume)),
                    Line::from(format!("24h Quote Volume: {}", quote_volume)),
                ]
            }
            None => vec![Line::from(Span::styled(
                "Instrument info unavailable.",
                Style::default().fg(Color::Yellow),
            ))],
        };

        let info = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Instrument Details"));
        f.render_widget(info, area);
    }

    fn render_footer<B: Backend>(&self, f: &mut Frame<B>, area: Rect) {
        let key = |k: &'static str| Span::styled(k, Style::default().add_modifier(Modifier::BOLD));
        let toggle = |on: bool| if on { "on" } else { "off" };

        let controls = vec![
            key("r"),
            Span::raw(" Refresh  "),
            key("c"),
            Span::raw(format!(" Chart: {}  ", self.config.chart_type)),
            key("m"),
            Span::raw(format!(" MA{}: {}  ", SMA_PERIOD, toggle(self.config.show_moving_average))),
            key("i"),
            Span::raw(format!(" Info: {}  ", toggle(self.config.show_company_info))),
            key("q"),
            Span::raw(" Quit"),
        ];

        let footer = Paragraph::new(Line::from(controls))
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::TOP));

        f.render_widget(footer, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NotifyError, StockWatchError};
    use crate::model::{Interval, Period};
    use crate::monitor::alerts::Notifier;
    use crate::monitor::trend_log::TrendLog;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::Mutex;

    struct StubSource {
        closes: Vec<&'static str>,
        fail: bool,
    }

    impl MarketDataSource for StubSource {
        async fn fetch(
            &self,
            _symbol: &str,
            _period: Period,
            _interval: Interval,
        ) -> Result<Vec<Candle>, StockWatchError> {
            if self.fail {
                return Err(StockWatchError::ConnectionClosed);
            }
            Ok(self
                .closes
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let close = Decimal::from_str(c).unwrap();
                    Candle {
                        open_time: Utc.timestamp_opt(1_700_000_000 + i as i64 * 86400, 0).unwrap(),
                        open: close,
                        high: close,
                        low: close,
                        close,
                        volume: Decimal::from(1000),
                    }
                })
                .collect())
        }

        async fn info(&self, symbol: &str) -> Result<SymbolInfo, StockWatchError> {
            Err(StockWatchError::ApiError {
                status: 400,
                message: format!("no info for {}", symbol),
            })
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        subjects: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, subject: &str, _body: &str) -> Result<(), NotifyError> {
            self.subjects.lock().unwrap().push(subject.to_string());
            Ok(())
        }
    }

    fn dashboard(
        source: StubSource,
        dir: &tempfile::TempDir,
    ) -> (Dashboard<StubSource>, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let sink = AlertSink::new(notifier.clone(), TrendLog::new(dir.path().join("trend.csv")));
        let config = DashboardConfig {
            symbol: "MSFT".to_string(),
            ..DashboardConfig::default()
        };
        let dashboard = Dashboard::new(
            config,
            CachedSource::new(source, Duration::from_secs(60)),
            TrendEvaluator::default(),
            sink,
        );
        (dashboard, notifier)
    }

    #[tokio::test]
    async fn refresh_alerts_and_logs_a_surge() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            closes: vec!["98.00", "101.50"],
            fail: false,
        };
        let (mut dashboard, notifier) = dashboard(source, &dir);

        dashboard.refresh().await;

        let trend = dashboard.view.trend.as_ref().unwrap();
        assert_eq!(trend.delta, Decimal::from_str("3.50").unwrap());
        assert_eq!(trend.classification, Classification::Surge);

        let outcome = dashboard.view.outcome.as_ref().unwrap();
        assert!(outcome.dispatched && outcome.logged);

        let subjects = notifier.subjects.lock().unwrap().clone();
        assert_eq!(subjects.len(), 1);
        assert!(subjects[0].contains("MSFT") && subjects[0].contains("3.50"));

        let contents = std::fs::read_to_string(dir.path().join("trend.csv")).unwrap();
        let row = contents.lines().nth(1).unwrap();
        assert!(row.starts_with("MSFT,"));
        assert!(row.ends_with(",101.50,3.50"));
    }

    #[tokio::test]
    async fn metrics_show_logged_row_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            closes: vec!["0.00001200", "0.00001234"],
            fail: false,
        };
        let (mut dashboard, notifier) = dashboard(source, &dir);

        dashboard.refresh().await;
        dashboard.refresh().await;

        assert_eq!(dashboard.view.log_rows, Some(2));
        assert!(notifier.subjects.lock().unwrap().is_empty());

        let text: String = dashboard
            .metric_lines()
            .iter()
            .flat_map(|line| line.spans.iter().map(|s| s.content.to_string()))
            .collect();
        assert!(text.contains("$0.00001234"));
        assert!(text.contains("Logged 0.00001234 at "));
        assert!(text.contains("(2 rows)"));
    }

    #[tokio::test]
    async fn single_observation_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            closes: vec!["98.00"],
            fail: false,
        };
        let (mut dashboard, notifier) = dashboard(source, &dir);

        dashboard.refresh().await;

        assert!(dashboard.view.trend.is_none());
        assert!(dashboard.view.outcome.is_none());
        assert!(matches!(dashboard.view.notice, Some(Notice::Warning(_))));
        assert!(notifier.subjects.lock().unwrap().is_empty());
        assert!(!dir.path().join("trend.csv").exists());
    }

    #[tokio::test]
    async fn failed_fetch_is_shown_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            closes: vec![],
            fail: true,
        };
        let (mut dashboard, _notifier) = dashboard(source, &dir);

        dashboard.refresh().await;

        assert!(matches!(dashboard.view.notice, Some(Notice::Error(_))));
        assert!(!dir.path().join("trend.csv").exists());
    }

    #[tokio::test]
    async fn config_toggles_replace_the_config() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            closes: vec!["1.00", "1.50"],
            fail: false,
        };
        let (mut dashboard, _notifier) = dashboard(source, &dir);

        dashboard.handle_key(KeyCode::Char('c')).await;
        dashboard.handle_key(KeyCode::Char('m')).await;

        assert_eq!(dashboard.config.chart_type, crate::model::ChartType::Bar);
        assert!(dashboard.config.show_moving_average);

        dashboard.handle_key(KeyCode::Char('i')).await;
        assert!(dashboard.config.show_company_info);
        assert!(dashboard.view.info.is_none());
    }

    #[tokio::test]
    async fn stable_refresh_shows_stable_status() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            closes: vec!["100.00", "101.00"],
            fail: false,
        };
        let (mut dashboard, notifier) = dashboard(source, &dir);

        dashboard.refresh().await;

        let text: Vec<String> = dashboard
            .metric_lines()
            .iter()
            .flat_map(|line| line.spans.iter().map(|s| s.content.to_string()))
            .collect();
        assert!(text.iter().any(|t| t.contains("Stable. No alert sent.")));
        assert!(notifier.subjects.lock().unwrap().is_empty());
    }
}
